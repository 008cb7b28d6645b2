//! Best-effort prompt enhancement with a guaranteed fallback.
//!
//! [`Enhancer`] rewrites a raw prompt into a richer one via an auxiliary
//! text service. Enhancement is a quality improvement, never a correctness
//! dependency: on any failure (timeout, transport error, empty or
//! implausible output) the raw prompt is returned unchanged and the
//! condition is logged. A request must never fail solely because the
//! auxiliary service is unavailable.

use crate::error::sanitize_message;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on one rewrite call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on the enhanced prompt length, in characters.
const DEFAULT_MAX_OUTPUT_CHARS: usize = 800;

/// Output longer than this multiple of the cap is treated as a failed
/// rewrite rather than truncated.
const REJECT_FACTOR: usize = 4;

/// The auxiliary text service: one call, text in, text out.
///
/// Implementations fail with transport or timeout errors only; the
/// [`Enhancer`] absorbs every failure.
#[async_trait]
pub trait RewriteService: Send + Sync {
    async fn rewrite(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Rewrite service backed by an Ollama-style `/api/generate` endpoint.
///
/// POST `{base}/api/generate` with `{"model", "prompt", "stream": false}`;
/// the rewritten text is the `response` field of the JSON reply.
#[derive(Debug, Clone)]
pub struct OllamaRewrite {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaRewrite {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl RewriteService for OllamaRewrite {
    async fn rewrite(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("rewrite service unreachable")?;

        if !resp.status().is_success() {
            anyhow::bail!("rewrite service returned HTTP {}", resp.status());
        }

        let reply: serde_json::Value = resp
            .json()
            .await
            .context("rewrite service returned invalid JSON")?;
        Ok(reply
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }
}

/// Result of one enhancement. `fallback` carries the reason the rewrite
/// output was not used, if it wasn't.
#[derive(Debug, Clone)]
pub struct Enhanced {
    pub text: String,
    pub fallback: Option<String>,
}

/// Wraps a [`RewriteService`] with a timeout, output sanitation, and the
/// fallback guarantee.
pub struct Enhancer {
    service: Arc<dyn RewriteService>,
    timeout: Duration,
    max_output_chars: usize,
}

impl Enhancer {
    pub fn new(service: Arc<dyn RewriteService>) -> Self {
        Self {
            service,
            timeout: DEFAULT_TIMEOUT,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }

    /// Bound on one rewrite call. Default: 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap on the enhanced prompt length. Default: 800 characters.
    pub fn with_max_output_chars(mut self, max: usize) -> Self {
        self.max_output_chars = max;
        self
    }

    /// Rewrite `raw` into a richer prompt. Always returns a usable string;
    /// never propagates an error.
    pub async fn enhance(&self, raw: &str) -> Enhanced {
        let result = tokio::time::timeout(self.timeout, self.service.rewrite(raw)).await;

        let text = match result {
            Err(_) => return self.fall_back(raw, "rewrite timed out".to_string()),
            Ok(Err(e)) => return self.fall_back(raw, sanitize_message(&e.to_string())),
            Ok(Ok(text)) => text,
        };

        let cleaned = sanitize_output(&text);
        if cleaned.is_empty() {
            return self.fall_back(raw, "rewrite produced empty output".to_string());
        }
        if cleaned.chars().count() > self.max_output_chars * REJECT_FACTOR {
            return self.fall_back(raw, "rewrite output implausibly long".to_string());
        }

        Enhanced {
            text: truncate_chars(cleaned, self.max_output_chars),
            fallback: None,
        }
    }

    fn fall_back(&self, raw: &str, reason: String) -> Enhanced {
        tracing::warn!(%reason, "prompt enhancement failed; using raw input");
        Enhanced {
            text: raw.to_string(),
            fallback: Some(reason),
        }
    }
}

impl std::fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enhancer")
            .field("timeout", &self.timeout)
            .field("max_output_chars", &self.max_output_chars)
            .finish()
    }
}

/// Strip formatting artifacts models wrap their output in: code fences,
/// surrounding quotes, stray whitespace. Newlines collapse to spaces.
fn sanitize_output(text: &str) -> String {
    let mut s = text.trim().to_string();

    if s.starts_with("```") && s.ends_with("```") && s.len() >= 6 {
        s = s[3..s.len() - 3].trim().to_string();
    }

    while s.chars().count() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s = s[1..s.len() - 1].trim().to_string();
    }

    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max` characters on a char boundary, trimming a trailing
/// partial word's whitespace.
fn truncate_chars(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut t = s;
            t.truncate(idx);
            t.trim_end().to_string()
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRewrite(String);

    #[async_trait]
    impl RewriteService for FixedRewrite {
        async fn rewrite(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingRewrite;

    #[async_trait]
    impl RewriteService for FailingRewrite {
        async fn rewrite(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    struct SlowRewrite;

    #[async_trait]
    impl RewriteService for SlowRewrite {
        async fn rewrite(&self, _prompt: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("never returned".into())
        }
    }

    #[tokio::test]
    async fn test_enhance_success() {
        let enhancer = Enhancer::new(Arc::new(FixedRewrite(
            "a majestic cat, golden hour, detailed fur".into(),
        )));
        let out = enhancer.enhance("a cat").await;
        assert_eq!(out.text, "a majestic cat, golden hour, detailed fur");
        assert!(out.fallback.is_none());
    }

    #[tokio::test]
    async fn test_enhance_falls_back_on_error() {
        let enhancer = Enhancer::new(Arc::new(FailingRewrite));
        let out = enhancer.enhance("a cat").await;
        assert_eq!(out.text, "a cat");
        assert!(out.fallback.is_some());
    }

    #[tokio::test]
    async fn test_enhance_falls_back_on_timeout() {
        let enhancer =
            Enhancer::new(Arc::new(SlowRewrite)).with_timeout(Duration::from_millis(20));
        let out = enhancer.enhance("a cat").await;
        assert_eq!(out.text, "a cat");
        assert_eq!(out.fallback.as_deref(), Some("rewrite timed out"));
    }

    #[tokio::test]
    async fn test_enhance_falls_back_on_empty_output() {
        let enhancer = Enhancer::new(Arc::new(FixedRewrite("  \"\"  ".into())));
        let out = enhancer.enhance("a cat").await;
        assert_eq!(out.text, "a cat");
        assert!(out.fallback.is_some());
    }

    #[tokio::test]
    async fn test_enhance_falls_back_on_implausibly_long_output() {
        let enhancer =
            Enhancer::new(Arc::new(FixedRewrite("word ".repeat(2000)))).with_max_output_chars(100);
        let out = enhancer.enhance("a cat").await;
        assert_eq!(out.text, "a cat");
        assert!(out.fallback.is_some());
    }

    #[tokio::test]
    async fn test_enhance_truncates_moderately_long_output() {
        let enhancer =
            Enhancer::new(Arc::new(FixedRewrite("b".repeat(150)))).with_max_output_chars(100);
        let out = enhancer.enhance("a cat").await;
        assert_eq!(out.text.chars().count(), 100);
        assert!(out.fallback.is_none());
    }

    #[test]
    fn test_sanitize_strips_fences_and_quotes() {
        assert_eq!(sanitize_output("```\na cat\n```"), "a cat");
        assert_eq!(sanitize_output("\"a cat\""), "a cat");
        assert_eq!(sanitize_output("'\"a cat\"'"), "a cat");
        assert_eq!(sanitize_output("  a cat  "), "a cat");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(
            sanitize_output("a cat\n  sitting on\ta wall"),
            "a cat sitting on a wall"
        );
    }

    #[test]
    fn test_truncate_chars_boundary() {
        assert_eq!(truncate_chars("hello world".into(), 5), "hello");
        assert_eq!(truncate_chars("héllo".into(), 3), "hél");
        assert_eq!(truncate_chars("short".into(), 100), "short");
    }
}
