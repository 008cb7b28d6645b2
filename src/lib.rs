//! # genqueue
//!
//! Per-backend FIFO queueing and resilient dispatch for image generation
//! backends, with best-effort prompt enhancement.
//!
//! Each named backend gets an independent FIFO lane with strict
//! one-at-a-time processing, so a slow call on one backend never delays
//! another backend's queue. Before the generation call, the raw prompt is
//! rewritten by an auxiliary text service -- a quality improvement with a
//! guaranteed fallback, never a correctness dependency. The generation
//! call itself runs through a bounded retry loop with exponential backoff
//! and a retry/no-retry error classification.
//!
//! ## Core Concepts
//!
//! - **[`RequestQueue`]** -- per-backend lanes, processing flags, and the
//!   full request lifecycle (`Queued → Enhancing → Generating →
//!   Completed | Failed`).
//! - **[`Enhancer`]** -- wraps a [`RewriteService`] with a timeout, output
//!   sanitation, and the fallback guarantee.
//! - **[`GenerationClient`]** -- registry of [`GenerationBackend`]
//!   transport profiles plus the [`BackoffConfig`] retry policy.
//! - **[`Orchestrator`]** -- composes the three: admission gate, wait for
//!   the lane, enhance, generate, finalize, place output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use genqueue::{
//!     Enhancer, FluxBackend, GenerationClient, OllamaRewrite, Orchestrator,
//!     SdxlBackend,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GenerationClient::builder()
//!         .register(Arc::new(FluxBackend::new("https://flux.example")))
//!         .register(Arc::new(
//!             SdxlBackend::new("https://sdxl.example").with_api_key("sk-..."),
//!         ))
//!         .build();
//!     let enhancer = Enhancer::new(Arc::new(OllamaRewrite::new(
//!         "http://localhost:11434",
//!         "llama3.2",
//!     )));
//!
//!     let orch = Orchestrator::builder(client, enhancer).build();
//!     let id = orch.submit("user-1", "flux", "a cat").await?;
//!     if let Some(done) = orch.await_terminal(id).await {
//!         println!("{}: {}", id, done.state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod enhancer;
pub mod error;
pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod queue;
pub mod request;
pub mod sink;

pub use backend::{
    with_backoff, BackoffConfig, FluxBackend, GenerationBackend, Jitter, MockBackend,
    MockOutcome, RetryCallback, SdxlBackend,
};
pub use client::{GenerationClient, GenerationClientBuilder};
pub use enhancer::{Enhanced, Enhancer, OllamaRewrite, RewriteService};
pub use error::{sanitize_message, ErrorKind, GenError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use gate::{AdmissionGate, AllowAll};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use queue::{RequestQueue, MAX_INPUT_CHARS};
pub use request::{BackendKind, RequestId, RequestSnapshot, RequestState};
pub use sink::{MemorySink, OutputSink};
