// Redis LockManager - distributed lease with fencing tokens and watchdog

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::{NoContext, Timestamp, Uuid};

use crate::application::ports::{LockError, LockManager, LockToken};

const ACQUIRE_POLL: Duration = Duration::from_millis(50);
const MIN_WATCHDOG_PERIOD: Duration = Duration::from_millis(50);

// Release only the lease this token acquired.
const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end"#;

// Extend only while the lease is still ours.
const EXTEND_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end"#;

/// Redis-backed lock manager.
///
/// Acquisition is `SET key token NX PX lease` polled until the wait
/// timeout; release and extension are fencing-checked Lua scripts. With
/// the watchdog enabled, a background task renews the lease at a third of
/// its length while the token is outstanding, so a legitimately long
/// operation is not cut off mid-flight.
pub struct RedisLockManager {
    conn: ConnectionManager,
    watchdog_enabled: bool,
    watchdogs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RedisLockManager {
    pub async fn connect(url: &str, watchdog_enabled: bool) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(|e| LockError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(Self {
            conn,
            watchdog_enabled,
            watchdogs: Mutex::new(HashMap::new()),
        })
    }

    async fn acquire_once(
        &self,
        key: &str,
        fencing_token: &str,
        lease_timeout: Duration,
    ) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let response: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(fencing_token)
            .arg("NX")
            .arg("PX")
            .arg(lease_timeout.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(response.is_some())
    }

    fn spawn_watchdog(&self, token: &LockToken, lease_timeout: Duration) {
        let key = token.key().to_string();
        let fencing_token = token.fencing_token().to_string();
        let mut conn = self.conn.clone();
        let lease_ms = lease_timeout.as_millis() as u64;
        let period = (lease_timeout / 3).max(MIN_WATCHDOG_PERIOD);

        let handle = tokio::spawn(async move {
            let script = Script::new(EXTEND_SCRIPT);
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // immediate first tick

            loop {
                ticker.tick().await;
                let extended: i64 = match script
                    .key(&key)
                    .arg(&fencing_token)
                    .arg(lease_ms)
                    .invoke_async(&mut conn)
                    .await
                {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(key = %key, error = %err, "watchdog extend failed, retrying");
                        continue;
                    }
                };

                if extended == 0 {
                    debug!(key = %key, "lease no longer held, watchdog exiting");
                    return;
                }
            }
        });

        self.watchdogs
            .lock()
            .expect("watchdog table poisoned")
            .insert(token.fencing_token().to_string(), handle);
    }

    fn stop_watchdog(&self, fencing_token: &str) {
        if let Some(handle) = self
            .watchdogs
            .lock()
            .expect("watchdog table poisoned")
            .remove(fencing_token)
        {
            handle.abort();
        }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_lock(
        &self,
        key: &str,
        wait_timeout: Duration,
        lease_timeout: Duration,
    ) -> Result<LockToken, LockError> {
        let fencing_token = Uuid::new_v7(Timestamp::now(NoContext)).to_string();
        let deadline = Instant::now() + wait_timeout;

        loop {
            if self.acquire_once(key, &fencing_token, lease_timeout).await? {
                let token = LockToken::new(key, fencing_token);
                if self.watchdog_enabled {
                    self.spawn_watchdog(&token, lease_timeout);
                }
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
        self.stop_watchdog(token.fencing_token());

        let mut conn = self.conn.clone();
        let released: i64 = Script::new(UNLOCK_SCRIPT)
            .key(token.key())
            .arg(token.fencing_token())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        if released == 0 {
            return Err(LockError::NotHeld(token.key().to_string()));
        }
        Ok(())
    }

    async fn extend(&self, token: &LockToken, lease_timeout: Duration) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let extended: i64 = Script::new(EXTEND_SCRIPT)
            .key(token.key())
            .arg(token.fencing_token())
            .arg(lease_timeout.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        if extended == 0 {
            return Err(LockError::NotHeld(token.key().to_string()));
        }
        Ok(())
    }
}
