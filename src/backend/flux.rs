//! Backend for the flux generation service.
//!
//! [`FluxBackend`] is the unauthenticated-GET profile: the prompt travels
//! as a URL-encoded query parameter and the response body is the image
//! bytes directly.

use super::{classify_status, GenerationBackend};
use crate::error::{GenError, Result};
use crate::request::BackendKind;
use async_trait::async_trait;
use reqwest::Client;

/// Backend for the flux service.
///
/// Endpoint: `GET {base}/generate?prompt=...&width=...&height=...`.
/// No authentication. The binary image is the response body.
///
/// # Example
///
/// ```
/// use genqueue::backend::FluxBackend;
///
/// let backend = FluxBackend::new("https://flux.example")
///     .with_size(768, 768)
///     .with_seed(42);
/// ```
#[derive(Debug, Clone)]
pub struct FluxBackend {
    base_url: String,
    model: Option<String>,
    width: u32,
    height: u32,
    seed: Option<u64>,
}

impl FluxBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: None,
            width: 1024,
            height: 1024,
            seed: None,
        }
    }

    /// Select a specific model variant. Default: the service's default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Output dimensions. Default: 1024x1024.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Fix the sampling seed for reproducible output.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the query pairs for one call. reqwest handles the encoding.
    fn query(&self, prompt: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("prompt", prompt.to_string()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
        ];
        if let Some(ref model) = self.model {
            pairs.push(("model", model.clone()));
        }
        if let Some(seed) = self.seed {
            pairs.push(("seed", seed.to_string()));
        }
        pairs
    }
}

#[async_trait]
impl GenerationBackend for FluxBackend {
    async fn generate(&self, client: &Client, prompt: &str) -> Result<Vec<u8>> {
        let url = format!("{}/generate", self.base_url.trim_end_matches('/'));
        let resp = client.get(&url).query(&self.query(prompt)).send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(GenError::Transport("backend returned an empty body".into()));
        }
        Ok(bytes.to_vec())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Flux
    }
}
