//! Embedding providers.
//!
//! The engine only depends on [`EmbeddingProvider`]. Vendor clients live in
//! submodules and are chosen at runtime by [`provider_from_config`] from the
//! `[embedding]` section of `.ultra-mcp.toml`.

mod gemini;
mod openai;
mod voyage;

pub use gemini::GeminiEmbeddings;
pub use openai::OpenAiEmbeddings;
pub use voyage::VoyageEmbeddings;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use ultra_core::{EmbeddingConfig, UltraError};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return one vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Embed a single search query.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UltraError>;

    /// Embed a batch of documents, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UltraError>;
}

/// Build the provider named by `config.provider`.
///
/// API keys come from the config or the vendor's environment variable.
///
/// # Errors
///
/// Returns [`UltraError::Config`] for an unknown provider or a missing key.
///
/// # Examples
///
/// ```
/// use ultra_core::EmbeddingConfig;
/// use ultra_vector::embedding::provider_from_config;
///
/// let config = EmbeddingConfig {
///     provider: "voyage".into(),
///     api_key: Some("test-key".into()),
///     ..EmbeddingConfig::default()
/// };
/// let provider = provider_from_config(&config).unwrap();
/// assert_eq!(provider.name(), "voyage");
/// ```
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>, UltraError> {
    build_provider(config, |name| std::env::var(name).ok())
}

fn build_provider(
    config: &EmbeddingConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Box<dyn EmbeddingProvider>, UltraError> {
    let provider: Box<dyn EmbeddingProvider> = match config.provider.as_str() {
        "openai" => {
            let key = resolve_api_key(config, &["OPENAI_API_KEY"], &env)?;
            let mut client = OpenAiEmbeddings::new(&key);
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client.with_dimensions(config.dimensions))
        }
        "azure" => {
            let key = resolve_api_key(config, &["AZURE_OPENAI_API_KEY"], &env)?;
            let endpoint = config
                .base_url
                .clone()
                .or_else(|| env("AZURE_OPENAI_ENDPOINT"))
                .ok_or_else(|| {
                    UltraError::Config(
                        "Azure endpoint not found: set embedding.base_url in .ultra-mcp.toml or AZURE_OPENAI_ENDPOINT env var".into(),
                    )
                })?;
            let deployment = config.model.as_deref().ok_or_else(|| {
                UltraError::Config("Azure requires embedding.model set to the deployment name".into())
            })?;
            Box::new(
                OpenAiEmbeddings::azure(&endpoint, deployment, &key, &config.api_version)
                    .with_dimensions(config.dimensions),
            )
        }
        "gemini" => {
            let key = resolve_api_key(config, &["GEMINI_API_KEY", "GOOGLE_API_KEY"], &env)?;
            let mut client = GeminiEmbeddings::new(&key);
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client.with_dimensions(config.dimensions))
        }
        "voyage" => {
            let key = resolve_api_key(config, &["VOYAGE_API_KEY"], &env)?;
            let mut client = VoyageEmbeddings::new(&key);
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client.with_dimensions(config.dimensions))
        }
        other => {
            return Err(UltraError::Config(format!(
                "unknown embedding provider '{other}': expected openai, azure, gemini or voyage"
            )))
        }
    };

    tracing::debug!(provider = provider.name(), "embedding provider ready");
    Ok(provider)
}

fn resolve_api_key(
    config: &EmbeddingConfig,
    env_vars: &[&str],
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, UltraError> {
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
        return Ok(key.clone());
    }
    env_vars
        .iter()
        .find_map(|name| env(name).filter(|k| !k.is_empty()))
        .ok_or_else(|| {
            UltraError::Config(format!(
                "embedding API key not found: set embedding.api_key in .ultra-mcp.toml or {} env var",
                env_vars.join(" / ")
            ))
        })
}

/// Send a request and decode a JSON response, mapping failures to
/// [`UltraError::Embedding`] tagged with `vendor`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    vendor: &str,
) -> Result<T, UltraError> {
    let response = request
        .send()
        .await
        .map_err(|e| UltraError::Embedding(format!("HTTP request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".into());
        return Err(UltraError::Embedding(format!(
            "{vendor} API returned {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| UltraError::Embedding(format!("failed to parse {vendor} response: {e}")))
}

/// Check that a sub-request returned one vector per input.
pub(crate) fn expect_count(vendor: &str, expected: usize, actual: usize) -> Result<(), UltraError> {
    if expected == actual {
        Ok(())
    } else {
        Err(UltraError::Embedding(format!(
            "{vendor} returned {actual} embeddings for {expected} inputs"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn config(provider: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.into(),
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn missing_api_key_names_env_var() {
        for (provider, var) in [
            ("openai", "OPENAI_API_KEY"),
            ("azure", "AZURE_OPENAI_API_KEY"),
            ("gemini", "GEMINI_API_KEY"),
            ("voyage", "VOYAGE_API_KEY"),
        ] {
            let err = build_provider(&config(provider), no_env).err().unwrap();
            let message = err.to_string();
            assert!(matches!(err, UltraError::Config(_)));
            assert!(message.contains("API key"), "{message}");
            assert!(message.contains(var), "{message}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut cfg = config("cohere");
        cfg.api_key = Some("k".into());
        let err = build_provider(&cfg, no_env).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider 'cohere'"));
    }

    #[test]
    fn key_is_read_from_environment() {
        let provider = build_provider(&config("gemini"), |name| {
            (name == "GOOGLE_API_KEY").then(|| "from-env".to_string())
        })
        .unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn config_key_wins_over_environment() {
        let mut cfg = config("openai");
        cfg.api_key = Some("from-config".into());
        let key = resolve_api_key(&cfg, &["OPENAI_API_KEY"], |_| Some("from-env".into())).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn azure_needs_endpoint_and_deployment() {
        let mut cfg = config("azure");
        cfg.api_key = Some("k".into());
        let err = build_provider(&cfg, no_env).err().unwrap();
        assert!(err.to_string().contains("AZURE_OPENAI_ENDPOINT"));

        cfg.base_url = Some("https://example.openai.azure.com".into());
        let err = build_provider(&cfg, no_env).err().unwrap();
        assert!(err.to_string().contains("deployment"));

        cfg.model = Some("embed-small".into());
        assert_eq!(build_provider(&cfg, no_env).unwrap().name(), "azure");
    }

    #[test]
    fn count_mismatch_is_an_embedding_error() {
        assert!(expect_count("OpenAI", 2, 2).is_ok());
        assert!(matches!(
            expect_count("OpenAI", 2, 1),
            Err(UltraError::Embedding(_))
        ));
    }
}
