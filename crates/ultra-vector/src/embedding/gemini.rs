//! Google Gemini embeddings via `batchEmbedContents`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ultra_core::UltraError;

use super::{expect_count, send_json, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "text-embedding-004";
const MAX_INPUTS: usize = 100;

/// Client for the Gemini embedding API.
///
/// # Examples
///
/// ```
/// use ultra_vector::embedding::GeminiEmbeddings;
///
/// let client = GeminiEmbeddings::new("test-key");
/// assert_eq!(client.model(), "text-embedding-004");
/// ```
pub struct GeminiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
}

impl std::fmt::Debug for GeminiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEmbeddings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<ContentRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddings {
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

    /// Use a different model. A leading `models/` is accepted.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.trim_start_matches("models/").to_string();
        self
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request a specific output dimensionality.
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:batchEmbedContents", self.base_url, self.model)
    }

    fn build_request<'a>(&self, input: &'a [String], task_type: &'static str) -> BatchRequest<'a> {
        BatchRequest {
            requests: input
                .iter()
                .map(|text| ContentRequest {
                    model: format!("models/{}", self.model),
                    content: Content {
                        parts: [Part { text }],
                    },
                    task_type,
                    output_dimensionality: self.dimensions,
                })
                .collect(),
        }
    }

    async fn request(&self, input: &[String], task_type: &'static str) -> Result<Vec<Vec<f32>>, UltraError> {
        let builder = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.build_request(input, task_type));

        let response: BatchResponse = send_json(builder, "Gemini").await?;
        expect_count("Gemini", input.len(), response.embeddings.len())?;
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UltraError> {
        let input = [text.to_string()];
        self.request(&input, "RETRIEVAL_QUERY")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| UltraError::Embedding("empty response from Gemini API".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UltraError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_INPUTS) {
            all.extend(self.request(batch, "RETRIEVAL_DOCUMENT").await?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_format_is_correct() {
        let client = GeminiEmbeddings::new("k").with_model("models/gemini-embedding-001");
        let input = vec!["alpha".to_string(), "beta".to_string()];
        let json = serde_json::to_value(client.build_request(&input, "RETRIEVAL_DOCUMENT")).unwrap();

        let requests = json["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["model"], "models/gemini-embedding-001");
        assert_eq!(requests[0]["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(requests[1]["content"]["parts"][0]["text"], "beta");
        assert!(requests[0].get("outputDimensionality").is_none());
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:batchEmbedContents"
        );
    }

    #[test]
    fn response_parsing_works() {
        let json = r#"{"embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]}"#;
        let response: BatchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.embeddings.len(), 2);
        assert_eq!(response.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[test]
    fn missing_embeddings_field_parses_as_empty() {
        let response: BatchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.embeddings.is_empty());
    }
}
