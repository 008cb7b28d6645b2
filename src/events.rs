//! Event system for request lifecycle reporting.
//!
//! Provides an optional, non-intrusive way for callers to observe a
//! request's progress: queue position while waiting, enhancement fallback,
//! transport retries, and the terminal state. Implement [`EventHandler`]
//! to receive these events for progress messages or logging.

use crate::error::ErrorKind;
use crate::request::{BackendKind, RequestId};
use std::sync::Arc;

/// Events emitted while a request moves through the pipeline.
#[derive(Debug, Clone)]
pub enum Event {
    /// A request was admitted and appended to its backend's lane.
    Queued {
        id: RequestId,
        kind: BackendKind,
        /// 1-based lane position at enqueue time.
        position: usize,
    },
    /// Periodic position report while waiting for the lane.
    QueuePosition {
        id: RequestId,
        /// 1 means next to run.
        position: usize,
    },
    /// Prompt enhancement is starting.
    EnhanceStart { id: RequestId },
    /// Enhancement fell back to the raw input.
    EnhanceFallback {
        id: RequestId,
        /// Why the rewrite output was not used.
        reason: String,
    },
    /// The generation call is starting.
    GenerationStart { id: RequestId },
    /// A transport-level retry of the generation call.
    TransportRetry {
        id: RequestId,
        /// 1-based retry number within this request's attempt sequence.
        attempt: u32,
        /// How long the driver waits before this retry, in milliseconds.
        delay_ms: u64,
        /// Description of the failure that triggered the retry.
        reason: String,
    },
    /// The request reached `Completed`.
    Completed {
        id: RequestId,
        /// Size of the generated output in bytes.
        bytes: usize,
        /// Where the output sink placed the bytes, if placement succeeded.
        location: Option<String>,
    },
    /// The request reached `Failed`.
    Failed {
        id: RequestId,
        kind: ErrorKind,
        message: String,
    },
}

/// Handler for request lifecycle events.
///
/// This is entirely optional -- the orchestrator works without one.
///
/// # Example
///
/// ```
/// use genqueue::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::QueuePosition { id, position } => {
///                 println!("{}: position {} in queue", id, position)
///             }
///             Event::Completed { id, bytes, .. } => {
///                 println!("{}: done, {} bytes", id, bytes)
///             }
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Receives every event the pipeline emits for any request.
    fn on_event(&self, event: Event);
}

/// Forward an event to the handler, if one is configured.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(handler) = handler {
        handler.on_event(event);
    }
}

/// Adapter turning a plain closure into an [`EventHandler`].
///
/// # Example
///
/// ```
/// use genqueue::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::QueuePosition { id, position } = event {
///         println!("{} waiting at {}", id, position);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
