use crate::request::RequestId;
use serde::Serialize;
use thiserror::Error;

/// Stable classification of an error, used when recording a failed request
/// and when deciding whether a generation attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown backend name. Local, immediate, never retried.
    InvalidBackend,
    /// Empty input or input exceeding the accepted length. Local, immediate.
    InvalidInput,
    /// Generation call exceeded its time bound. Retryable.
    Timeout,
    /// Network/connection failure. Retryable.
    Transport,
    /// Credential rejected by the backend. Terminal on first occurrence.
    Auth,
    /// Backend refused the prompt on content-policy grounds. Terminal.
    ModerationRejected,
    /// Backend signaled overload or downtime. Retryable.
    ServiceUnavailable,
    /// Internal invariant violation -- a programming-error signal,
    /// never caused by user input.
    InvalidTransition,
    /// Refused by the admission gate before a request was created.
    RateLimited,
    /// Output placement failed after a completed generation.
    Sink,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidBackend => "invalid-backend",
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::ModerationRejected => "moderation-rejected",
            ErrorKind::ServiceUnavailable => "service-unavailable",
            ErrorKind::InvalidTransition => "invalid-transition",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Sink => "sink",
        }
    }

    /// Whether the generation retry loop may try again after this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Transport | ErrorKind::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the queue, the generation client, and the orchestrator.
#[derive(Error, Debug)]
pub enum GenError {
    /// The backend name is not in the enumerated set.
    #[error("unknown backend '{0}'")]
    InvalidBackend(String),

    /// Empty or over-long input, or a malformed request rejected by a backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A generation or rewrite call exceeded its time bound.
    #[error("call timed out")]
    Timeout,

    /// Low-level HTTP transport failure (connection refused, reset, etc.).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend rejected the configured credential.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The backend refused the prompt on content-policy grounds.
    #[error("rejected by content policy: {0}")]
    ModerationRejected(String),

    /// The backend signaled overload or downtime (429, 5xx).
    #[error("backend unavailable (HTTP {status}): {body}")]
    ServiceUnavailable { status: u16, body: String },

    /// A lifecycle method was called on a request in the wrong state.
    #[error("invalid transition for {id}: {detail}")]
    InvalidTransition { id: RequestId, detail: String },

    /// The admission gate refused the actor; no request was created.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The output sink failed to place completed output.
    #[error("output placement failed: {0}")]
    Sink(String),
}

impl GenError {
    /// The stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenError::InvalidBackend(_) => ErrorKind::InvalidBackend,
            GenError::InvalidInput(_) => ErrorKind::InvalidInput,
            GenError::Timeout => ErrorKind::Timeout,
            GenError::Transport(_) => ErrorKind::Transport,
            GenError::Auth(_) => ErrorKind::Auth,
            GenError::ModerationRejected(_) => ErrorKind::ModerationRejected,
            GenError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            GenError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            GenError::RateLimited(_) => ErrorKind::RateLimited,
            GenError::Sink(_) => ErrorKind::Sink,
        }
    }

    /// Whether the generation retry loop may try again after this error.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Reconstruct an error from a recorded classification and message.
    ///
    /// Used by test doubles and by callers replaying stored failures.
    /// `Timeout` carries no message; `ServiceUnavailable` defaults to 503.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidBackend => GenError::InvalidBackend(message),
            ErrorKind::InvalidInput => GenError::InvalidInput(message),
            ErrorKind::Timeout => GenError::Timeout,
            ErrorKind::Transport => GenError::Transport(message),
            ErrorKind::Auth => GenError::Auth(message),
            ErrorKind::ModerationRejected => GenError::ModerationRejected(message),
            ErrorKind::ServiceUnavailable => GenError::ServiceUnavailable {
                status: 503,
                body: message,
            },
            ErrorKind::InvalidTransition => GenError::InvalidTransition {
                id: RequestId::new(0),
                detail: message,
            },
            ErrorKind::RateLimited => GenError::RateLimited(message),
            ErrorKind::Sink => GenError::Sink(message),
        }
    }
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenError::Timeout
        } else {
            // without_url: error text must not leak backend URLs into
            // stored messages.
            GenError::Transport(e.without_url().to_string())
        }
    }
}

/// Maximum length of a stored/reported error message.
const MAX_MESSAGE_CHARS: usize = 300;

/// Scrub a message before it is stored on a request or reported to a caller.
///
/// Masks bearer credentials and `sk-` style secrets, and truncates to a
/// bounded length.
pub fn sanitize_message(message: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut mask_next = false;
    for word in message.split_whitespace() {
        if mask_next {
            words.push("***".to_string());
            mask_next = false;
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") {
            mask_next = true;
            words.push(word.to_string());
            continue;
        }
        if word.len() > 8 && word.starts_with("sk-") {
            words.push("***".to_string());
            continue;
        }
        words.push(word.to_string());
    }
    let joined = words.join(" ");
    match joined.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => joined[..idx].to_string(),
        None => joined,
    }
}

pub type Result<T> = std::result::Result<T, GenError>;
