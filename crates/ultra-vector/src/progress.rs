//! Progress events emitted while indexing.

use tokio::sync::mpsc::UnboundedSender;
use ultra_core::IndexSummary;

/// One step of an indexing run, in emission order:
/// `Started`, zero or more `BatchCompleted`, then `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// Scanning finished; `total_files` candidate files were found.
    Started { total_files: usize },
    /// A batch of files was embedded and written.
    BatchCompleted {
        /// 1-based batch number.
        batch: usize,
        /// Files processed so far, across all batches.
        files_processed: usize,
        total_files: usize,
        /// Chunks written by this batch.
        chunks_written: usize,
    },
    /// The run completed successfully.
    Finished(IndexSummary),
}

/// Non-blocking sender that tolerates a missing or dropped receiver.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgressSink {
    tx: Option<UnboundedSender<IndexEvent>>,
}

impl ProgressSink {
    pub(crate) fn new(tx: Option<UnboundedSender<IndexEvent>>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: IndexEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn events_arrive_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ProgressSink::new(Some(tx));
        sink.emit(IndexEvent::Started { total_files: 2 });
        sink.emit(IndexEvent::Finished(IndexSummary::default()));
        drop(sink);

        assert_eq!(rx.try_recv().unwrap(), IndexEvent::Started { total_files: 2 });
        assert!(matches!(rx.try_recv().unwrap(), IndexEvent::Finished(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ProgressSink::new(Some(tx)).emit(IndexEvent::Started { total_files: 0 });
        ProgressSink::default().emit(IndexEvent::Started { total_files: 0 });
    }
}
