//! Generation client: the registry of backend profiles and the shared
//! HTTP client, driving each call through the retry loop.

use crate::backend::{with_backoff, BackoffConfig, GenerationBackend, RetryCallback};
use crate::error::{GenError, Result};
use crate::request::BackendKind;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Issues generation calls against registered backends.
///
/// Owns one shared `reqwest::Client` configured with a connect timeout and
/// a separate, longer total-operation timeout; both bounds apply per
/// attempt, not per request lifetime.
///
/// # Example
///
/// ```
/// use genqueue::{GenerationClient, FluxBackend};
/// use std::sync::Arc;
///
/// let client = GenerationClient::builder()
///     .register(Arc::new(FluxBackend::new("https://flux.example")))
///     .build();
/// ```
pub struct GenerationClient {
    http: Client,
    backends: HashMap<BackendKind, Arc<dyn GenerationBackend>>,
    backoff: BackoffConfig,
}

impl GenerationClient {
    /// Create a new builder.
    pub fn builder() -> GenerationClientBuilder {
        GenerationClientBuilder {
            client: None,
            connect_timeout: None,
            timeout: None,
            backoff: None,
            backends: HashMap::new(),
        }
    }

    /// Whether a backend is registered for this kind.
    pub fn has_backend(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// The retry configuration in effect.
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Issue one generation call with retry. See
    /// [`with_backoff`](crate::backend::with_backoff) for the attempt
    /// discipline.
    pub async fn generate(&self, kind: BackendKind, prompt: &str) -> Result<Vec<u8>> {
        self.generate_with(kind, prompt, None).await
    }

    /// Like [`generate`](Self::generate), with a callback invoked before
    /// each transport retry.
    pub async fn generate_with(
        &self,
        kind: BackendKind,
        prompt: &str,
        on_retry: RetryCallback<'_>,
    ) -> Result<Vec<u8>> {
        let backend = self
            .backends
            .get(&kind)
            .ok_or_else(|| GenError::InvalidBackend(kind.to_string()))?;
        with_backoff(backend, &self.http, prompt, &self.backoff, on_retry).await
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&'static str> =
            self.backends.keys().map(BackendKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("GenerationClient")
            .field("backends", &kinds)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Builder for [`GenerationClient`].
pub struct GenerationClientBuilder {
    client: Option<Client>,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    backoff: Option<BackoffConfig>,
    backends: HashMap<BackendKind, Arc<dyn GenerationBackend>>,
}

impl GenerationClientBuilder {
    /// Register a backend under its own kind. Registering the same kind
    /// twice keeps the later one.
    pub fn register(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    /// Connect timeout for every attempt. Default: 10 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Total-operation timeout for every attempt. Default: 120 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry configuration. Default: [`BackoffConfig::standard()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Provide a custom HTTP client. The timeout settings above are
    /// ignored in that case; the custom client's own bounds apply.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> GenerationClient {
        let connect = self.connect_timeout.unwrap_or(Duration::from_secs(10));
        let total = self.timeout.unwrap_or(Duration::from_secs(120));
        let http = self.client.unwrap_or_else(|| {
            Client::builder()
                .connect_timeout(connect)
                .timeout(total)
                .build()
                .expect("Failed to build HTTP client")
        });
        GenerationClient {
            http,
            backends: self.backends,
            backoff: self.backoff.unwrap_or_else(BackoffConfig::standard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_generate_unregistered_backend() {
        let client = GenerationClient::builder().build();
        let err = client.generate(BackendKind::Flux, "a cat").await.unwrap_err();
        assert!(matches!(err, GenError::InvalidBackend(_)));
    }

    #[tokio::test]
    async fn test_generate_routes_to_registered_backend() {
        let client = GenerationClient::builder()
            .register(Arc::new(MockBackend::ok(BackendKind::Flux, vec![1, 2])))
            .register(Arc::new(MockBackend::ok(BackendKind::Sdxl, vec![3, 4])))
            .build();

        assert_eq!(
            client.generate(BackendKind::Flux, "x").await.unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            client.generate(BackendKind::Sdxl, "x").await.unwrap(),
            vec![3, 4]
        );
    }

    #[tokio::test]
    async fn test_generate_applies_retry_policy() {
        use crate::backend::Jitter;

        let mock = Arc::new(MockBackend::failing(
            BackendKind::Flux,
            ErrorKind::ServiceUnavailable,
            "down",
        ));
        let client = GenerationClient::builder()
            .register(mock.clone())
            .backoff(BackoffConfig {
                attempts: 3,
                base: Duration::from_millis(2),
                factor: 2.0,
                cap: Duration::from_secs(1),
                jitter: Jitter::None,
            })
            .build();

        let err = client.generate(BackendKind::Flux, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(mock.attempts(), 3);
    }

    #[test]
    fn test_has_backend() {
        let client = GenerationClient::builder()
            .register(Arc::new(MockBackend::ok(BackendKind::Flux, vec![0])))
            .build();
        assert!(client.has_backend(BackendKind::Flux));
        assert!(!client.has_backend(BackendKind::Sdxl));
    }

    #[test]
    fn test_debug_lists_backends() {
        let client = GenerationClient::builder()
            .register(Arc::new(MockBackend::ok(BackendKind::Sdxl, vec![0])))
            .build();
        let debug = format!("{:?}", client);
        assert!(debug.contains("sdxl"));
    }
}
