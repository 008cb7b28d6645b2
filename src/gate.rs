//! Admission gate: the external rate-limiting collaborator.
//!
//! Consulted before a request is created; a refusal surfaces as
//! `RateLimited` without touching the queue.

use async_trait::async_trait;

/// Yes/no admission decision for an actor, consulted before `enqueue`.
///
/// This crate does not implement rate limiting; implementors plug in
/// whatever policy they run (token bucket, per-user quotas, ...).
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    async fn allow(&self, actor: &str) -> bool;
}

/// Gate that admits everyone. The default collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AdmissionGate for AllowAll {
    async fn allow(&self, _actor: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        tokio_test::block_on(async {
            assert!(AllowAll.allow("anyone").await);
        });
    }
}
