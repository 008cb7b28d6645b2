//! Request data model: identifiers, backend names, lifecycle states.
//!
//! The live [`Request`] is owned exclusively by the
//! [`RequestQueue`](crate::queue::RequestQueue); callers observe it through
//! [`RequestSnapshot`] copies so lifecycle invariants cannot be bypassed.

use crate::error::{ErrorKind, GenError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// The fixed set of generation backends.
///
/// Each variant maps to one transport profile: `Flux` is the
/// unauthenticated-GET profile, `Sdxl` the bearer-authenticated POST profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Flux,
    Sdxl,
}

impl BackendKind {
    /// All known backends, in declaration order.
    pub const ALL: [BackendKind; 2] = [BackendKind::Flux, BackendKind::Sdxl];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Flux => "flux",
            BackendKind::Sdxl => "sdxl",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flux" => Ok(BackendKind::Flux),
            "sdxl" => Ok(BackendKind::Sdxl),
            other => Err(GenError::InvalidBackend(other.to_string())),
        }
    }
}

/// Unique identifier of a submitted request. Assigned at enqueue, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(n: u64) -> Self {
        RequestId(n)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Lifecycle state of a request. Advances monotonically, never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Queued,
    Enhancing,
    Generating,
    Completed,
    Failed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Queued => "queued",
            RequestState::Enhancing => "enhancing",
            RequestState::Generating => "generating",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        }
    }

    /// `Completed` or `Failed` -- no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }

    /// Actively holding the backend's processing flag.
    pub fn is_active(&self) -> bool {
        matches!(self, RequestState::Enhancing | RequestState::Generating)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a request.
#[derive(Debug)]
pub(crate) enum Outcome {
    Output(Vec<u8>),
    Error { kind: ErrorKind, message: String },
}

/// One generation task, owned by the queue.
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) id: RequestId,
    pub(crate) kind: BackendKind,
    pub(crate) raw_input: String,
    pub(crate) effective_input: Option<String>,
    pub(crate) state: RequestState,
    pub(crate) outcome: Option<Outcome>,
    pub(crate) submitted_at: Instant,
    pub(crate) started_at: Option<Instant>,
    pub(crate) finished_at: Option<Instant>,
}

impl Request {
    pub(crate) fn new(id: RequestId, kind: BackendKind, raw_input: String) -> Self {
        Request {
            id,
            kind,
            raw_input,
            effective_input: None,
            state: RequestState::Queued,
            outcome: None,
            submitted_at: Instant::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn snapshot(&self) -> RequestSnapshot {
        let (error_kind, error_message, output) = match &self.outcome {
            Some(Outcome::Output(bytes)) => (None, None, Some(bytes.clone())),
            Some(Outcome::Error { kind, message }) => {
                (Some(*kind), Some(message.clone()), None)
            }
            None => (None, None, None),
        };
        RequestSnapshot {
            id: self.id,
            kind: self.kind,
            state: self.state,
            raw_input: self.raw_input.clone(),
            effective_input: self.effective_input.clone(),
            error_kind,
            error_message,
            output,
        }
    }

    /// Time spent waiting before processing started, if it started.
    pub(crate) fn wait_time(&self) -> Option<std::time::Duration> {
        self.started_at.map(|s| s - self.submitted_at)
    }
}

/// Caller-facing copy of a request's observable fields.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub kind: BackendKind,
    pub state: RequestState,
    pub raw_input: String,
    /// Set exactly once, before the generation call.
    pub effective_input: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// Present only on `Completed`.
    pub output: Option<Vec<u8>>,
}
