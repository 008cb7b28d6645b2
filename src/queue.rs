//! Per-backend FIFO lanes with mutual exclusion.
//!
//! Each backend name gets an independent ordered lane and a single
//! "processing" flag. The flag plus a head-of-lane check give strict
//! one-at-a-time semantics per backend without a global ordering, so a
//! long-running call on one backend never delays another backend's lane.
//!
//! All lifecycle mutation goes through this type. The lock is held only
//! across non-awaiting map operations.

use crate::error::{ErrorKind, GenError, Result};
use crate::request::{BackendKind, Outcome, Request, RequestId, RequestSnapshot, RequestState};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Maximum accepted input length, in characters.
pub const MAX_INPUT_CHARS: usize = 1000;

#[derive(Debug, Default)]
struct Lane {
    /// Insertion order = service order. Front is next to run or running.
    order: VecDeque<RequestId>,
    /// Exclusivity flag: at most one request of this lane is active.
    processing: bool,
}

#[derive(Debug, Default)]
struct Inner {
    lanes: HashMap<BackendKind, Lane>,
    requests: HashMap<RequestId, Request>,
}

/// In-memory request queue: one FIFO lane per backend, one processing flag
/// per lane, and the table of live requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("queue mutex poisoned")
    }

    /// Create a request in state `Queued` and append it to its backend's lane.
    ///
    /// Rejects unknown backend names with `InvalidBackend` and empty or
    /// over-long input with `InvalidInput`; neither creates a request.
    pub fn enqueue(&self, backend: &str, raw_input: &str) -> Result<RequestId> {
        let kind: BackendKind = backend.parse()?;
        let trimmed = raw_input.trim();
        if trimmed.is_empty() {
            return Err(GenError::InvalidInput("input is empty".into()));
        }
        if trimmed.chars().count() > MAX_INPUT_CHARS {
            return Err(GenError::InvalidInput(format!(
                "input exceeds {} characters",
                MAX_INPUT_CHARS
            )));
        }

        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut inner = self.lock();
        inner
            .requests
            .insert(id, Request::new(id, kind, trimmed.to_string()));
        inner.lanes.entry(kind).or_default().order.push_back(id);
        tracing::debug!(%id, backend = %kind, "request enqueued");
        Ok(id)
    }

    /// Atomic check-and-set admission into active processing.
    ///
    /// Succeeds only if the request is `Queued`, at the head of its lane,
    /// and the lane's processing flag is off. On success the flag flips on
    /// and the request advances to `Enhancing`. Safe under concurrent
    /// invocation for the same backend; losers observe `false` with no
    /// state change.
    pub fn try_start_processing(&self, id: RequestId) -> bool {
        let mut inner = self.lock();
        let (kind, state) = match inner.requests.get(&id) {
            Some(r) => (r.kind, r.state),
            None => return false,
        };
        if state != RequestState::Queued {
            return false;
        }
        match inner.lanes.get_mut(&kind) {
            Some(lane) if !lane.processing && lane.order.front() == Some(&id) => {
                lane.processing = true;
            }
            _ => return false,
        }
        if let Some(req) = inner.requests.get_mut(&id) {
            req.state = RequestState::Enhancing;
            req.started_at = Some(Instant::now());
            tracing::debug!(
                %id,
                backend = %kind,
                waited_ms = req.wait_time().map(|d| d.as_millis() as u64),
                "request entered processing"
            );
        }
        true
    }

    /// 1-based distance from the head of the request's lane
    /// (1 = next to run or running). `None` for unknown ids.
    pub fn queue_position(&self, id: RequestId) -> Option<usize> {
        let inner = self.lock();
        let kind = inner.requests.get(&id)?.kind;
        let lane = inner.lanes.get(&kind)?;
        lane.order.iter().position(|x| *x == id).map(|i| i + 1)
    }

    /// Record the effective input and advance `Enhancing → Generating`.
    pub fn mark_enhanced(&self, id: RequestId, effective_input: impl Into<String>) -> Result<()> {
        let mut inner = self.lock();
        let req = inner.requests.get_mut(&id).ok_or_else(|| unknown(id))?;
        if req.state != RequestState::Enhancing {
            return Err(GenError::InvalidTransition {
                id,
                detail: format!("mark_enhanced in state {}", req.state),
            });
        }
        req.effective_input = Some(effective_input.into());
        req.state = RequestState::Generating;
        Ok(())
    }

    /// Terminal transition `Generating → Completed`. Removes the request
    /// from its lane and releases the lane's processing flag.
    pub fn mark_completed(&self, id: RequestId, output: Vec<u8>) -> Result<()> {
        self.finish(
            id,
            Outcome::Output(output),
            &[RequestState::Generating],
            RequestState::Completed,
            "mark_completed",
        )
    }

    /// Terminal transition to `Failed`. Accepted from `Generating` and, as a
    /// safety valve for callers driving the queue directly, from `Enhancing`.
    /// Removes the request from its lane and releases the processing flag.
    pub fn mark_failed(
        &self,
        id: RequestId,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Result<()> {
        self.finish(
            id,
            Outcome::Error {
                kind,
                message: message.into(),
            },
            &[RequestState::Generating, RequestState::Enhancing],
            RequestState::Failed,
            "mark_failed",
        )
    }

    fn finish(
        &self,
        id: RequestId,
        outcome: Outcome,
        allowed: &[RequestState],
        terminal: RequestState,
        op: &'static str,
    ) -> Result<()> {
        let mut inner = self.lock();
        let kind = {
            let req = inner.requests.get_mut(&id).ok_or_else(|| unknown(id))?;
            if !allowed.contains(&req.state) {
                return Err(GenError::InvalidTransition {
                    id,
                    detail: format!("{} in state {}", op, req.state),
                });
            }
            req.state = terminal;
            req.outcome = Some(outcome);
            req.finished_at = Some(Instant::now());
            req.kind
        };
        if let Some(lane) = inner.lanes.get_mut(&kind) {
            if let Some(pos) = lane.order.iter().position(|x| *x == id) {
                lane.order.remove(pos);
            }
            lane.processing = false;
        }
        tracing::debug!(%id, backend = %kind, state = %terminal, "request finished");
        Ok(())
    }

    /// Copy of the request's observable fields, if it is still known.
    pub fn snapshot(&self, id: RequestId) -> Option<RequestSnapshot> {
        self.lock().requests.get(&id).map(Request::snapshot)
    }

    /// Remove a terminal request from the table, returning its final state.
    /// Non-terminal requests are left untouched and `None` is returned.
    pub fn remove_terminal(&self, id: RequestId) -> Option<RequestSnapshot> {
        let mut inner = self.lock();
        if !inner.requests.get(&id)?.state.is_terminal() {
            return None;
        }
        inner.requests.remove(&id).map(|req| req.snapshot())
    }

    /// Number of requests waiting or processing in a backend's lane.
    pub fn lane_len(&self, kind: BackendKind) -> usize {
        self.lock().lanes.get(&kind).map_or(0, |l| l.order.len())
    }

    /// Whether a backend currently has an active request.
    pub fn is_processing(&self, kind: BackendKind) -> bool {
        self.lock().lanes.get(&kind).is_some_and(|l| l.processing)
    }
}

fn unknown(id: RequestId) -> GenError {
    GenError::InvalidTransition {
        id,
        detail: "unknown request".into(),
    }
}
