// LockManager port - per-key mutual exclusion with lease and fencing

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::domain::value_objects::ProductId;
use crate::InventoryError;

/// Lock key for all stock-affecting operations on one product.
pub fn product_lock_key(product_id: ProductId) -> String {
    format!("lock:product:{product_id}")
}

/// Proof of lock ownership.
///
/// The fencing token is generated per acquisition; unlock and extend only
/// act when the backend still associates the key with this token, so a
/// stale holder can never release someone else's lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    fencing_token: String,
}

impl LockToken {
    pub fn new(key: impl Into<String>, fencing_token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fencing_token: fencing_token.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fencing_token(&self) -> &str {
        &self.fencing_token
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out acquiring '{key}' after {waited_ms} ms")]
    Timeout { key: String, waited_ms: u64 },

    #[error("lock '{0}' is not held by this token")]
    NotHeld(String),

    #[error("lock backend failure: {0}")]
    Backend(String),
}

impl From<LockError> for InventoryError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { key, waited_ms } => InventoryError::LockAcquisition {
                key,
                reason: format!("wait timeout after {waited_ms} ms"),
            },
            LockError::NotHeld(key) => {
                InventoryError::LockBackend(format!("lease on '{key}' no longer held"))
            }
            LockError::Backend(reason) => InventoryError::LockBackend(reason),
        }
    }
}

/// Cross-process mutual exclusion keyed by string.
///
/// Acquisition is bounded by `wait_timeout`; the lease expires after
/// `lease_timeout` unless extended, so a crashed holder cannot block a key
/// forever. Implementations with a watchdog extend the lease themselves
/// while the token is outstanding.
#[async_trait]
pub trait LockManager: Send + Sync {
    async fn try_lock(
        &self,
        key: &str,
        wait_timeout: Duration,
        lease_timeout: Duration,
    ) -> Result<LockToken, LockError>;

    /// Releases a held lease. Idempotent: releasing an already-expired or
    /// re-acquired key is a no-op guarded by the fencing token.
    async fn unlock(&self, token: LockToken) -> Result<(), LockError>;

    /// Pushes the lease deadline out; fails with `NotHeld` if the token
    /// lost the key in the meantime.
    async fn extend(&self, token: &LockToken, lease_timeout: Duration) -> Result<(), LockError>;
}

/// Runs `f` under the lock on `key`, releasing on every exit path.
///
/// A failed release is logged and swallowed: the lease timeout will expire
/// the key, and the fencing token keeps a late release from clobbering the
/// next holder.
pub async fn with_lock<L, F, Fut, T>(
    manager: &L,
    key: &str,
    wait_timeout: Duration,
    lease_timeout: Duration,
    f: F,
) -> Result<T, InventoryError>
where
    L: LockManager + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, InventoryError>>,
{
    let token = manager.try_lock(key, wait_timeout, lease_timeout).await?;
    let result = f().await;
    if let Err(err) = manager.unlock(token).await {
        warn!(key, error = %err, "lock release failed; lease timeout will reclaim it");
    }
    result
}
