//! Backend for the sdxl generation service.
//!
//! [`SdxlBackend`] is the authenticated-POST profile: bearer credential in
//! the `Authorization` header, prompt in a JSON body, image bytes in the
//! response body directly.

use super::{classify_status, GenerationBackend};
use crate::error::{GenError, Result};
use crate::request::BackendKind;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for the sdxl service.
///
/// Endpoint: `POST {base}/v1/generate` with
/// `{"prompt": ..., "width": ..., "height": ...}`.
/// Authentication: `Authorization: Bearer {key}`.
///
/// # Example
///
/// ```
/// use genqueue::backend::SdxlBackend;
///
/// let backend = SdxlBackend::new("https://sdxl.example")
///     .with_api_key("sk-...")
///     .with_negative_prompt("blurry, low quality");
/// ```
#[derive(Clone)]
pub struct SdxlBackend {
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    negative_prompt: Option<String>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for SdxlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdxlBackend")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.len() > 6 {
                        format!("{}***", &k[..6])
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .field("model", &self.model)
            .finish()
    }
}

impl SdxlBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: None,
            negative_prompt: None,
            width: 1024,
            height: 1024,
        }
    }

    /// Set the bearer credential sent as `Authorization: Bearer {key}`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Select a specific model checkpoint.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Negative prompt appended to every call.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    /// Output dimensions. Default: 1024x1024.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Returns `true` if a credential has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the JSON body for one call.
    fn build_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "prompt": prompt,
            "width": self.width,
            "height": self.height,
        });
        if let Some(ref model) = self.model {
            body["model"] = json!(model);
        }
        if let Some(ref negative) = self.negative_prompt {
            body["negative_prompt"] = json!(negative);
        }
        body
    }

    /// Build the reqwest request with appropriate headers.
    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        req
    }
}

#[async_trait]
impl GenerationBackend for SdxlBackend {
    async fn generate(&self, client: &Client, prompt: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/generate", self.base_url.trim_end_matches('/'));
        let body = self.build_body(prompt);
        let resp = self.build_http_request(client, &url, &body).send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(GenError::Transport("backend returned an empty body".into()));
        }
        Ok(bytes.to_vec())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sdxl
    }
}
