//! Voyage AI embeddings.
//!
//! Uses `input_type: "document"` for indexing and `input_type: "query"` for searching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ultra_core::UltraError;

use super::{expect_count, send_json, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const DEFAULT_MODEL: &str = "voyage-code-3";
const BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 200;

/// Client for the Voyage embedding API.
///
/// # Examples
///
/// ```
/// use ultra_vector::embedding::VoyageEmbeddings;
///
/// let client = VoyageEmbeddings::new("test-key");
/// assert_eq!(client.model(), "voyage-code-3");
/// ```
pub struct VoyageEmbeddings {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
}

impl std::fmt::Debug for VoyageEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoyageEmbeddings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimension: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

impl VoyageEmbeddings {
    /// Create a new client with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
        }
    }

    /// Use a different model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request a specific output dimension.
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, input: &'a [String], input_type: &'static str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            input,
            input_type,
            output_dimension: self.dimensions,
        }
    }

    async fn request(&self, input: &[String], input_type: &'static str) -> Result<Vec<Vec<f32>>, UltraError> {
        let builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(input, input_type));

        let response: EmbedResponse = send_json(builder, "Voyage").await?;
        expect_count("Voyage", input.len(), response.data.len())?;
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageEmbeddings {
    fn name(&self) -> &str {
        "voyage"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UltraError> {
        let input = [text.to_string()];
        self.request(&input, "query")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| UltraError::Embedding("empty response from Voyage API".into()))
    }

    /// Splits into sub-batches of 64 with 200ms delays for rate limiting.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UltraError> {
        let mut all = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            all.extend(self.request(batch, "document").await?);
        }
        Ok(all)
    }
}
