//! Backend trait, failure classification, and the retry driver.
//!
//! The [`GenerationBackend`] trait abstracts over image generation
//! providers, each with its own transport profile. Built-in
//! implementations: [`FluxBackend`] (unauthenticated GET),
//! [`SdxlBackend`] (bearer-authenticated POST), [`MockBackend`] (tests).
//!
//! ```text
//! GenerationClient ──► with_backoff() ──► GenerationBackend::generate()
//!                                                  │
//!                                    ┌─────────────┴─────────────┐
//!                               FluxBackend                 SdxlBackend
//!                               GET /generate?prompt=       POST /v1/generate
//!                               no auth                     Authorization: Bearer
//! ```

pub mod backoff;
pub mod flux;
pub mod mock;
pub mod sdxl;

pub use backoff::{BackoffConfig, Jitter};
pub use flux::FluxBackend;
pub use mock::{MockBackend, MockOutcome};
pub use sdxl::SdxlBackend;

use crate::error::{sanitize_message, GenError, Result};
use crate::request::BackendKind;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Type alias for the callback invoked before each transport retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, std::time::Duration, &str) + Send)>;

/// Abstraction over image generation providers.
///
/// Implementors translate a prompt into the provider-specific HTTP request
/// and return the binary output directly. Failures must be classified into
/// the crate's error taxonomy so the retry driver can tell transient from
/// terminal.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as
/// `Arc<dyn GenerationBackend>`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Execute one generation call. No retry happens at this level.
    async fn generate(&self, client: &Client, prompt: &str) -> Result<Vec<u8>>;

    /// Which lane this backend serves.
    fn kind(&self) -> BackendKind;
}

/// Classify a non-success HTTP response into the error taxonomy.
///
/// 401/403 are credential rejections; 400/422 are malformed requests unless
/// the body carries a content-policy marker; 408/429 and 5xx mean the
/// backend is overloaded or down and may be retried.
pub(crate) fn classify_status(status: u16, body: &str) -> GenError {
    let clean = sanitize_message(body);
    match status {
        401 | 403 => GenError::Auth(clean),
        400 | 422 if looks_like_moderation(body) => GenError::ModerationRejected(clean),
        400 | 422 => GenError::InvalidInput(clean),
        408 | 429 => GenError::ServiceUnavailable { status, body: clean },
        s if s >= 500 => GenError::ServiceUnavailable { status, body: clean },
        _ => GenError::Transport(format!("unexpected HTTP {}: {}", status, clean)),
    }
}

fn looks_like_moderation(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    ["moderation", "content_policy", "content policy", "safety system", "nsfw"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Execute a generation call with transport-level retry and backoff.
///
/// Makes up to `config.attempts` calls. The first call is immediate;
/// before retry `n` the driver waits `config.wait_before(n)`. Only
/// retryable classifications (timeout, transport, service unavailable)
/// are retried -- authentication, malformed-request, and moderation
/// failures surface on first occurrence. On exhausting attempts the last
/// observed error surfaces.
///
/// `on_retry` is invoked before each wait with
/// `(retry_number, delay, reason)`.
pub async fn with_backoff(
    backend: &Arc<dyn GenerationBackend>,
    client: &Client,
    prompt: &str,
    config: &BackoffConfig,
    mut on_retry: RetryCallback<'_>,
) -> Result<Vec<u8>> {
    let attempts = config.attempts.max(1);
    let mut last_error: Option<GenError> = None;

    for call in 1..=attempts {
        if call > 1 {
            let retry = call - 1;
            let delay = config.wait_before(retry);
            let reason = last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();

            if let Some(ref mut cb) = on_retry {
                cb(retry, delay, &reason);
            }
            tracing::debug!(
                backend = %backend.kind(),
                retry,
                delay_ms = delay.as_millis() as u64,
                %reason,
                "retrying generation call"
            );

            tokio::time::sleep(delay).await;
        }

        match backend.generate(client, prompt).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                if call < attempts && e.is_retryable() {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    // Unreachable with attempts >= 1, but keep the loop honest.
    Err(last_error
        .unwrap_or_else(|| GenError::Transport("backoff loop exited unexpectedly".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_classify_auth() {
        assert_eq!(classify_status(401, "bad key").kind(), ErrorKind::Auth);
        assert_eq!(classify_status(403, "forbidden").kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_classify_moderation() {
        let err = classify_status(400, r#"{"error": "content_policy_violation"}"#);
        assert_eq!(err.kind(), ErrorKind::ModerationRejected);

        let err = classify_status(422, "prompt flagged by safety system");
        assert_eq!(err.kind(), ErrorKind::ModerationRejected);
    }

    #[test]
    fn test_classify_malformed_request() {
        let err = classify_status(400, "missing field 'prompt'");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_classify_overload() {
        assert_eq!(
            classify_status(429, "slow down").kind(),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            classify_status(503, "maintenance").kind(),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            classify_status(500, "boom").kind(),
            ErrorKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_classify_strips_credentials_from_body() {
        let err = classify_status(401, "rejected Bearer sk-secret123456");
        assert!(!err.to_string().contains("sk-secret123456"));
    }

    #[tokio::test]
    async fn test_backoff_retries_then_exhausts() {
        use crate::request::BackendKind;
        use std::time::Duration;

        let mock = Arc::new(MockBackend::failing(
            BackendKind::Flux,
            ErrorKind::Timeout,
            "",
        ));
        let backend: Arc<dyn GenerationBackend> = mock.clone();
        let config = BackoffConfig {
            attempts: 3,
            base: Duration::from_millis(5),
            factor: 2.0,
            cap: Duration::from_secs(1),
            jitter: Jitter::None,
        };

        let client = Client::new();
        let result = with_backoff(&backend, &client, "a cat", &config, None).await;

        assert!(matches!(result, Err(GenError::Timeout)));
        assert_eq!(mock.attempts(), 3, "3 attempts total");
    }

    #[tokio::test]
    async fn test_backoff_no_retry_on_auth() {
        use crate::request::BackendKind;

        let mock = Arc::new(MockBackend::failing(
            BackendKind::Sdxl,
            ErrorKind::Auth,
            "credential rejected",
        ));
        let backend: Arc<dyn GenerationBackend> = mock.clone();

        let client = Client::new();
        let result =
            with_backoff(&backend, &client, "a cat", &BackoffConfig::standard(), None).await;

        assert!(matches!(result, Err(GenError::Auth(_))));
        assert_eq!(mock.attempts(), 1, "terminal on first occurrence");
    }

    #[tokio::test]
    async fn test_backoff_recovers_after_transient_failure() {
        use crate::request::BackendKind;
        use std::time::Duration;

        let mock = Arc::new(MockBackend::new(
            BackendKind::Flux,
            vec![
                MockOutcome::fail(ErrorKind::ServiceUnavailable, "overloaded"),
                MockOutcome::ok(vec![0xFF, 0xD8]),
            ],
        ));
        let backend: Arc<dyn GenerationBackend> = mock.clone();
        let config = BackoffConfig {
            attempts: 3,
            base: Duration::from_millis(5),
            factor: 2.0,
            cap: Duration::from_secs(1),
            jitter: Jitter::None,
        };

        let client = Client::new();
        let bytes = with_backoff(&backend, &client, "a cat", &config, None)
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8]);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test]
    async fn test_backoff_callback_reports_increasing_delays() {
        use crate::request::BackendKind;
        use std::time::Duration;

        let mock = Arc::new(MockBackend::failing(
            BackendKind::Flux,
            ErrorKind::Timeout,
            "",
        ));
        let backend: Arc<dyn GenerationBackend> = mock.clone();
        let config = BackoffConfig {
            attempts: 3,
            base: Duration::from_millis(5),
            factor: 2.0,
            cap: Duration::from_secs(1),
            jitter: Jitter::None,
        };

        let mut delays: Vec<Duration> = Vec::new();
        let mut attempts: Vec<u32> = Vec::new();
        let mut cb = |attempt: u32, delay: Duration, _reason: &str| {
            attempts.push(attempt);
            delays.push(delay);
        };

        let client = Client::new();
        let _ = with_backoff(&backend, &client, "a cat", &config, Some(&mut cb)).await;

        assert_eq!(attempts, vec![1, 2]);
        assert_eq!(delays.len(), 2);
        assert!(delays[1] > delays[0], "backoff must increase");
    }
}
