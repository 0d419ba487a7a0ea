//! OpenAI embeddings, including Azure OpenAI deployments and
//! OpenAI-compatible servers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ultra_core::UltraError;

use super::{expect_count, send_json, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const OPENAI_MAX_INPUTS: usize = 2048;
const AZURE_MAX_INPUTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    OpenAi,
    Azure,
}

/// Client for `POST /embeddings` on OpenAI or an Azure OpenAI deployment.
///
/// # Examples
///
/// ```
/// use ultra_vector::embedding::{EmbeddingProvider, OpenAiEmbeddings};
///
/// let client = OpenAiEmbeddings::new("test-key").with_model("text-embedding-3-large");
/// assert_eq!(client.name(), "openai");
/// assert_eq!(client.model(), "text-embedding-3-large");
/// ```
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    api_version: Option<String>,
    dimensions: Option<usize>,
    flavor: Flavor,
}

impl std::fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("flavor", &self.flavor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Debug, Deserialize)]
struct EmbedDataItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    /// Create an OpenAI client with the default model.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: None,
            dimensions: None,
            flavor: Flavor::OpenAi,
        }
    }

    /// Create a client for an Azure OpenAI deployment.
    ///
    /// `endpoint` is the resource URL, e.g. `https://name.openai.azure.com`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ultra_vector::embedding::{EmbeddingProvider, OpenAiEmbeddings};
    ///
    /// let client = OpenAiEmbeddings::azure("https://x.openai.azure.com/", "embed", "key", "2024-02-01");
    /// assert_eq!(client.name(), "azure");
    /// ```
    pub fn azure(endpoint: &str, deployment: &str, api_key: &str, api_version: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: deployment.to_string(),
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_version: Some(api_version.to_string()),
            dimensions: None,
            flavor: Flavor::Azure,
        }
    }

    /// Use a different model (the deployment name for Azure).
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Point the client at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request truncated output vectors.
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.flavor {
            Flavor::OpenAi => format!("{}/embeddings", self.base_url),
            Flavor::Azure => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                self.base_url,
                self.model,
                self.api_version.as_deref().unwrap_or_default()
            ),
        }
    }

    fn max_inputs(&self) -> usize {
        match self.flavor {
            Flavor::OpenAi => OPENAI_MAX_INPUTS,
            Flavor::Azure => AZURE_MAX_INPUTS,
        }
    }

    fn build_request<'a>(&'a self, input: &'a [String]) -> EmbedRequest<'a> {
        EmbedRequest {
            model: (self.flavor == Flavor::OpenAi).then_some(self.model.as_str()),
            input,
            dimensions: self.dimensions,
            encoding_format: "float",
        }
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, UltraError> {
        let builder = self.client.post(self.endpoint()).json(&self.build_request(input));
        let builder = match self.flavor {
            Flavor::OpenAi => builder.bearer_auth(&self.api_key),
            Flavor::Azure => builder.header("api-key", &self.api_key),
        };

        let response: EmbedResponse = send_json(builder, self.vendor()).await?;
        let vectors = into_ordered(response);
        expect_count(self.vendor(), input.len(), vectors.len())?;
        Ok(vectors)
    }

    fn vendor(&self) -> &'static str {
        match self.flavor {
            Flavor::OpenAi => "OpenAI",
            Flavor::Azure => "Azure OpenAI",
        }
    }
}

/// Vectors sorted by the `index` the server reported.
fn into_ordered(response: EmbedResponse) -> Vec<Vec<f32>> {
    let mut data = response.data;
    data.sort_by_key(|item| item.index);
    data.into_iter().map(|item| item.embedding).collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn name(&self) -> &str {
        match self.flavor {
            Flavor::OpenAi => "openai",
            Flavor::Azure => "azure",
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UltraError> {
        let input = [text.to_string()];
        self.request(&input)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| UltraError::Embedding(format!("empty response from {}", self.vendor())))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UltraError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_inputs()) {
            all.extend(self.request(batch).await?);
        }
        Ok(all)
    }
}
