//! Output sink: the external placement collaborator.
//!
//! Invoked only after a request reaches `Completed`. Placement failure
//! never un-completes the request; it is logged and reported separately.

use crate::request::RequestId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Where completed output bytes go. Returns a caller-meaningful location
/// (a path, a URL, an attachment id).
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn place(&self, id: RequestId, bytes: &[u8]) -> anyhow::Result<String>;
}

/// In-memory sink. The default collaborator; also what tests read back.
#[derive(Debug, Default)]
pub struct MemorySink {
    store: Mutex<HashMap<RequestId, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes placed for a request, if any.
    pub fn get(&self, id: RequestId) -> Option<Vec<u8>> {
        self.store.lock().expect("sink mutex poisoned").get(&id).cloned()
    }

    /// Number of placed outputs.
    pub fn len(&self) -> usize {
        self.store.lock().expect("sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn place(&self, id: RequestId, bytes: &[u8]) -> anyhow::Result<String> {
        self.store
            .lock()
            .expect("sink mutex poisoned")
            .insert(id, bytes.to_vec());
        Ok(format!("mem://{}", id))
    }
}
