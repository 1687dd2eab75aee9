// In-memory LockManager - single-process binding for tests and local runs

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::{NoContext, Timestamp, Uuid};

use crate::application::ports::{LockError, LockManager, LockToken};

const ACQUIRE_POLL: Duration = Duration::from_millis(10);

struct HeldLock {
    fencing_token: String,
    expires_at: Instant,
}

/// Process-local lock manager with the same lease and fencing semantics
/// as the distributed binding.
#[derive(Default)]
pub struct InMemoryLockManager {
    locks: Mutex<HashMap<String, HeldLock>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self, key: &str, lease_timeout: Duration) -> Option<LockToken> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        let now = Instant::now();

        match locks.get(key) {
            Some(held) if held.expires_at > now => None,
            _ => {
                let fencing_token = Uuid::new_v7(Timestamp::now(NoContext)).to_string();
                locks.insert(
                    key.to_string(),
                    HeldLock {
                        fencing_token: fencing_token.clone(),
                        expires_at: now + lease_timeout,
                    },
                );
                Some(LockToken::new(key, fencing_token))
            }
        }
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn try_lock(
        &self,
        key: &str,
        wait_timeout: Duration,
        lease_timeout: Duration,
    ) -> Result<LockToken, LockError> {
        let deadline = Instant::now() + wait_timeout;

        loop {
            if let Some(token) = self.try_acquire(key, lease_timeout) {
                return Ok(token);
            }
            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited_ms: wait_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(ACQUIRE_POLL).await;
        }
    }

    async fn unlock(&self, token: LockToken) -> Result<(), LockError> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        match locks.get(token.key()) {
            Some(held) if held.fencing_token == token.fencing_token() => {
                locks.remove(token.key());
                Ok(())
            }
            _ => Err(LockError::NotHeld(token.key().to_string())),
        }
    }

    async fn extend(&self, token: &LockToken, lease_timeout: Duration) -> Result<(), LockError> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        match locks.get_mut(token.key()) {
            Some(held) if held.fencing_token == token.fencing_token() => {
                held.expires_at = Instant::now() + lease_timeout;
                Ok(())
            }
            _ => Err(LockError::NotHeld(token.key().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);
    const LEASE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let manager = InMemoryLockManager::new();

        let token = manager.try_lock("lock:product:p1", WAIT, LEASE).await.unwrap();
        let contender = manager.try_lock("lock:product:p1", WAIT, LEASE).await;
        assert!(matches!(contender, Err(LockError::Timeout { .. })));

        manager.unlock(token).await.unwrap();
        manager.try_lock("lock:product:p1", WAIT, LEASE).await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let manager = InMemoryLockManager::new();
        let _a = manager.try_lock("lock:product:p1", WAIT, LEASE).await.unwrap();
        let _b = manager.try_lock("lock:product:p2", WAIT, LEASE).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let manager = InMemoryLockManager::new();
        let stale = manager
            .try_lock("lock:product:p1", WAIT, Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        let fresh = manager
            .try_lock("lock:product:p1", WAIT, LEASE)
            .await
            .unwrap();

        // The stale holder's release must not evict the new holder.
        assert!(matches!(
            manager.unlock(stale).await,
            Err(LockError::NotHeld(_))
        ));
        manager.unlock(fresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_extend_pushes_the_lease_out() {
        let manager = InMemoryLockManager::new();
        let token = manager
            .try_lock("lock:product:p1", WAIT, Duration::from_millis(30))
            .await
            .unwrap();

        manager.extend(&token, LEASE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let contender = manager.try_lock("lock:product:p1", WAIT, LEASE).await;
        assert!(matches!(contender, Err(LockError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_unlock_is_fenced() {
        let manager = InMemoryLockManager::new();
        let token = manager.try_lock("lock:product:p1", WAIT, LEASE).await.unwrap();
        let forged = LockToken::new("lock:product:p1", "someone-else");

        assert!(matches!(
            manager.unlock(forged).await,
            Err(LockError::NotHeld(_))
        ));
        manager.unlock(token).await.unwrap();
    }
}
