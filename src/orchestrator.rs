//! Orchestrator: admission, wait-for-turn, enhancement, generation,
//! finalization.
//!
//! One detached task drives each request to its terminal state. Caller
//! disconnection means "stop reporting", never "stop processing" -- the
//! backend's exclusivity flag is always released by exactly one terminal
//! mark.

use crate::client::GenerationClient;
use crate::enhancer::Enhancer;
use crate::error::{sanitize_message, ErrorKind, GenError, Result};
use crate::events::{emit, Event, EventHandler};
use crate::gate::{AdmissionGate, AllowAll};
use crate::queue::RequestQueue;
use crate::request::{RequestId, RequestSnapshot};
use crate::sink::{MemorySink, OutputSink};
use std::sync::Arc;
use std::time::Duration;

/// Default interval between `try_start_processing` polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Composes the queue, the enhancer, and the generation client.
///
/// Cheap to clone -- all collaborators are shared.
///
/// # Example
///
/// ```no_run
/// use genqueue::{
///     Enhancer, FluxBackend, GenerationClient, OllamaRewrite, Orchestrator,
/// };
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = GenerationClient::builder()
///         .register(Arc::new(FluxBackend::new("https://flux.example")))
///         .build();
///     let enhancer = Enhancer::new(Arc::new(OllamaRewrite::new(
///         "http://localhost:11434",
///         "llama3.2",
///     )));
///
///     let orch = Orchestrator::builder(client, enhancer).build();
///     let id = orch.submit("user-1", "flux", "a cat").await?;
///     if let Some(done) = orch.await_terminal(id).await {
///         println!("{}: {}", id, done.state);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    queue: Arc<RequestQueue>,
    client: Arc<GenerationClient>,
    enhancer: Arc<Enhancer>,
    gate: Arc<dyn AdmissionGate>,
    sink: Arc<dyn OutputSink>,
    event_handler: Option<Arc<dyn EventHandler>>,
    poll_interval: Duration,
}

impl Orchestrator {
    /// Create a new builder around a generation client and an enhancer.
    pub fn builder(client: GenerationClient, enhancer: Enhancer) -> OrchestratorBuilder {
        OrchestratorBuilder {
            client,
            enhancer,
            gate: None,
            sink: None,
            event_handler: None,
            poll_interval: None,
        }
    }

    /// Admit and enqueue one request, then drive it to terminal state in a
    /// detached task.
    ///
    /// Consults the admission gate first; a refusal returns `RateLimited`
    /// and creates no request. Unknown backend names and invalid input are
    /// rejected by the queue before anything is spawned.
    pub async fn submit(&self, actor: &str, backend: &str, raw_input: &str) -> Result<RequestId> {
        if !self.gate.allow(actor).await {
            tracing::info!(actor, "submission refused by admission gate");
            return Err(GenError::RateLimited(format!(
                "actor '{}' is over its limit",
                actor
            )));
        }

        let id = self.queue.enqueue(backend, raw_input)?;
        let position = self.queue.queue_position(id).unwrap_or(1);
        if let Some(snap) = self.queue.snapshot(id) {
            self.emit(Event::Queued {
                id,
                kind: snap.kind,
                position,
            });
            tracing::info!(%id, backend = %snap.kind, position, "request submitted");
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.drive(id).await;
        });
        Ok(id)
    }

    /// Poll the queue until the request reaches a terminal state, then
    /// return its final snapshot. `None` if the id is unknown or reaped.
    pub async fn await_terminal(&self, id: RequestId) -> Option<RequestSnapshot> {
        loop {
            let snap = self.queue.snapshot(id)?;
            if snap.state.is_terminal() {
                return Some(snap);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// The shared queue, for position checks and snapshots.
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    /// 1-based lane position of a request (1 = next to run or running).
    pub fn position(&self, id: RequestId) -> Option<usize> {
        self.queue.queue_position(id)
    }

    /// Drive one request through its whole lifecycle. Runs detached from
    /// the submitting caller; every exit path leaves the request terminal
    /// so the lane's processing flag is released.
    async fn drive(&self, id: RequestId) {
        // Wait for the lane. No upper bound: only the caller reaping the
        // request stops the wait.
        while !self.queue.try_start_processing(id) {
            match self.queue.queue_position(id) {
                Some(position) => self.emit(Event::QueuePosition { id, position }),
                None => {
                    tracing::debug!(%id, "request disappeared while waiting; driver exiting");
                    return;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let Some(snap) = self.queue.snapshot(id) else {
            return;
        };
        let kind = snap.kind;

        self.emit(Event::EnhanceStart { id });
        let enhanced = self.enhancer.enhance(&snap.raw_input).await;
        if let Some(ref reason) = enhanced.fallback {
            self.emit(Event::EnhanceFallback {
                id,
                reason: reason.clone(),
            });
        }
        if let Err(e) = self.queue.mark_enhanced(id, enhanced.text.clone()) {
            tracing::error!(%id, error = %e, "lifecycle violation while recording enhancement");
            let _ = self
                .queue
                .mark_failed(id, ErrorKind::InvalidTransition, e.to_string());
            return;
        }

        self.emit(Event::GenerationStart { id });
        let mut on_retry = |attempt: u32, delay: Duration, reason: &str| {
            self.emit(Event::TransportRetry {
                id,
                attempt,
                delay_ms: delay.as_millis() as u64,
                reason: reason.to_string(),
            });
        };

        match self
            .client
            .generate_with(kind, &enhanced.text, Some(&mut on_retry))
            .await
        {
            Ok(bytes) => {
                if let Err(e) = self.queue.mark_completed(id, bytes.clone()) {
                    tracing::error!(%id, error = %e, "lifecycle violation while completing");
                    return;
                }
                let location = match self.sink.place(id, &bytes).await {
                    Ok(location) => {
                        tracing::info!(%id, %location, bytes = bytes.len(), "output placed");
                        Some(location)
                    }
                    Err(e) => {
                        // The generation itself succeeded; placement failure
                        // does not fail the request.
                        tracing::error!(%id, error = %e, "output placement failed");
                        None
                    }
                };
                self.emit(Event::Completed {
                    id,
                    bytes: bytes.len(),
                    location,
                });
            }
            Err(e) => {
                let kind = e.kind();
                let message = sanitize_message(&e.to_string());
                if let Err(mark_err) = self.queue.mark_failed(id, kind, message.clone()) {
                    tracing::error!(%id, error = %mark_err, "lifecycle violation while failing");
                    return;
                }
                tracing::warn!(%id, error_kind = %kind, %message, "request failed");
                self.emit(Event::Failed { id, kind, message });
            }
        }
    }

    fn emit(&self, event: Event) {
        emit(&self.event_handler, event);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client)
            .field("enhancer", &self.enhancer)
            .field("poll_interval", &self.poll_interval)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    client: GenerationClient,
    enhancer: Enhancer,
    gate: Option<Arc<dyn AdmissionGate>>,
    sink: Option<Arc<dyn OutputSink>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    poll_interval: Option<Duration>,
}

impl OrchestratorBuilder {
    /// Set the admission gate. Default: [`AllowAll`].
    pub fn gate(mut self, gate: Arc<dyn AdmissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Set the output sink. Default: an in-memory sink.
    pub fn sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the event handler for lifecycle reporting.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Interval between wait-for-turn polls. Default: 2 seconds.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            queue: Arc::new(RequestQueue::new()),
            client: Arc::new(self.client),
            enhancer: Arc::new(self.enhancer),
            gate: self.gate.unwrap_or_else(|| Arc::new(AllowAll)),
            sink: self.sink.unwrap_or_else(|| Arc::new(MemorySink::new())),
            event_handler: self.event_handler,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }
}
