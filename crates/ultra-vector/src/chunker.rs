//! Fixed-size overlapping text chunking.
//!
//! Splits file content into windows of at most `chunk_size` characters where
//! consecutive windows share `chunk_overlap` characters. Sizes count Unicode
//! scalar values, so a window never splits a character.

use ultra_core::{IndexConfig, UltraError};

/// A chunk borrowed from the source text.
///
/// # Examples
///
/// ```
/// use ultra_vector::chunker::TextChunk;
///
/// let chunk = TextChunk { index: 0, text: "fn main() {}" };
/// assert_eq!(chunk.index, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// Position among the chunks emitted for this text.
    pub index: usize,
    /// The chunk content.
    pub text: &'a str,
}

/// Splits text into overlapping fixed-size windows.
///
/// # Examples
///
/// ```
/// use ultra_vector::chunker::TextChunker;
///
/// let chunker = TextChunker::new(4, 1).unwrap();
/// let texts: Vec<&str> = chunker.chunks("abcdefghij").map(|c| c.text).collect();
/// assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, UltraError> {
        if chunk_size == 0 {
            return Err(UltraError::Config("chunk size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(UltraError::Config(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Create a chunker from the `[index]` configuration.
    ///
    /// # Errors
    ///
    /// Same as [`TextChunker::new`].
    pub fn from_config(config: &IndexConfig) -> Result<Self, UltraError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Lazily iterate over the chunks of `text`.
    ///
    /// The iterator is `Clone`, so a cloned iterator restarts from the same
    /// position. Whitespace-only windows are skipped.
    pub fn chunks<'a>(&self, text: &'a str) -> TextChunks<'a> {
        TextChunks {
            text,
            start: 0,
            index: 0,
            done: false,
            chunk_size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
        }
    }
}

/// Iterator returned by [`TextChunker::chunks`].
#[derive(Debug, Clone)]
pub struct TextChunks<'a> {
    text: &'a str,
    start: usize,
    index: usize,
    done: bool,
    chunk_size: usize,
    step: usize,
}

impl<'a> Iterator for TextChunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let window = &self.text[self.start..];
            let end = self.start + byte_offset(window, self.chunk_size);
            let piece = &self.text[self.start..end];

            if end == self.text.len() {
                self.done = true;
            } else {
                self.start += byte_offset(window, self.step);
            }

            if piece.trim().is_empty() {
                continue;
            }

            let chunk = TextChunk {
                index: self.index,
                text: piece,
            };
            self.index += 1;
            return Some(chunk);
        }
        None
    }
}

/// Byte offset of the `chars`-th character of `s`, or `s.len()` if shorter.
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}
