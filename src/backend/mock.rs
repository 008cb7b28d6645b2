//! Mock backend for testing without a live generation service.
//!
//! [`MockBackend`] returns pre-configured outcomes in order, allowing
//! downstream consumers to write deterministic tests against this crate.
//!
//! # Example
//!
//! ```
//! use genqueue::backend::{MockBackend, MockOutcome};
//! use genqueue::BackendKind;
//!
//! let mock = MockBackend::new(
//!     BackendKind::Flux,
//!     vec![MockOutcome::ok(vec![0xFF, 0xD8])],
//! );
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::GenerationBackend;
use crate::error::{ErrorKind, GenError, Result};
use crate::request::BackendKind;

/// One scripted result of a mock generation call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// The call succeeds with these output bytes.
    Bytes(Vec<u8>),
    /// The call fails with this classification.
    Fail { kind: ErrorKind, message: String },
}

impl MockOutcome {
    pub fn ok(bytes: Vec<u8>) -> Self {
        MockOutcome::Bytes(bytes)
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        MockOutcome::Fail {
            kind,
            message: message.into(),
        }
    }
}

/// A test backend that returns scripted outcomes in order.
///
/// Cycles back to the beginning when all outcomes have been consumed, so a
/// single `Fail` entry models an always-failing backend. The attempt
/// counter lets tests assert exactly how many calls were made.
#[derive(Debug)]
pub struct MockBackend {
    kind: BackendKind,
    script: Vec<MockOutcome>,
    cursor: AtomicUsize,
    delay: Option<Duration>,
}

impl MockBackend {
    /// Create a mock backend with the given scripted outcomes.
    pub fn new(kind: BackendKind, script: Vec<MockOutcome>) -> Self {
        assert!(
            !script.is_empty(),
            "MockBackend requires at least one outcome"
        );
        Self {
            kind,
            script,
            cursor: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// A mock that always succeeds with the same bytes.
    pub fn ok(kind: BackendKind, bytes: Vec<u8>) -> Self {
        Self::new(kind, vec![MockOutcome::Bytes(bytes)])
    }

    /// A mock that always fails with the same classification.
    pub fn failing(kind: BackendKind, error: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, vec![MockOutcome::fail(error, message)])
    }

    /// Sleep this long inside every call. Lets tests hold a lane busy
    /// long enough to observe queue positions and parallelism.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many generation calls this mock has served.
    pub fn attempts(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    fn next_outcome(&self) -> MockOutcome {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.script.len();
        self.script[idx].clone()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, _client: &Client, _prompt: &str) -> Result<Vec<u8>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_outcome() {
            MockOutcome::Bytes(bytes) => Ok(bytes),
            MockOutcome::Fail { kind, message } => Err(GenError::from_kind(kind, message)),
        }
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fixed_bytes() {
        let mock = MockBackend::ok(BackendKind::Flux, vec![1, 2, 3]);
        let client = Client::new();
        let bytes = mock.generate(&client, "a cat").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test]
    async fn test_mock_cycles_script() {
        let mock = MockBackend::new(
            BackendKind::Flux,
            vec![
                MockOutcome::fail(ErrorKind::Timeout, ""),
                MockOutcome::ok(vec![9]),
            ],
        );
        let client = Client::new();

        assert!(mock.generate(&client, "x").await.is_err());
        assert_eq!(mock.generate(&client, "x").await.unwrap(), vec![9]);
        // Cycles back to the failure.
        assert!(mock.generate(&client, "x").await.is_err());
        assert_eq!(mock.attempts(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure_classification() {
        let mock = MockBackend::failing(BackendKind::Sdxl, ErrorKind::Auth, "bad key");
        let client = Client::new();
        let err = mock.generate(&client, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_mock_delay_holds_call_open() {
        let mock =
            MockBackend::ok(BackendKind::Flux, vec![0]).with_delay(Duration::from_millis(20));
        let client = Client::new();
        let start = std::time::Instant::now();
        mock.generate(&client, "x").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
