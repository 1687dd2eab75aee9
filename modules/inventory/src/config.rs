// Inventory configuration - immutable settings resolved once at startup

use std::time::Duration;

use crate::InventoryError;

/// All tunables of the inventory core.
///
/// Built once (defaults or environment) and passed by value into the
/// components that need it; nothing reads the environment afterwards.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub reservation: ReservationSettings,
    pub lock: LockSettings,
    pub sweeper: SweeperSettings,
    pub retry: RetrySettings,
    pub dlq: DlqSettings,
    pub low_stock: LowStockSettings,
}

#[derive(Debug, Clone)]
pub struct ReservationSettings {
    /// Lifespan of a reservation when the caller does not pass a TTL.
    pub default_ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    /// Maximum wait to acquire a product lock on the request path.
    pub wait_timeout: Duration,
    /// Maximum lock hold before the lease expires on its own.
    pub lease_timeout: Duration,
    /// Shorter wait used by the sweeper; contended products are skipped.
    pub sweep_wait_timeout: Duration,
    /// Auto-extend the lease while the protected operation runs.
    pub watchdog_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SweeperSettings {
    /// Time between expired-reservation sweeps.
    pub interval: Duration,
    /// Products scanned per repository page.
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Attempts per use-case invocation on optimistic version conflicts.
    pub max_attempts: u32,
    /// Exponential backoff base between attempts.
    pub backoff_base: Duration,
}

#[derive(Debug, Clone)]
pub struct DlqSettings {
    /// Delivery attempts before a message is diverted to the dead-letter
    /// channel.
    pub max_deliveries: u32,
}

#[derive(Debug, Clone)]
pub struct LowStockSettings {
    /// Threshold applied to products that do not set their own. Zero
    /// disables alerting.
    pub default_threshold: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            reservation: ReservationSettings {
                default_ttl: chrono::Duration::minutes(30),
            },
            lock: LockSettings {
                wait_timeout: Duration::from_secs(3),
                lease_timeout: Duration::from_secs(5),
                sweep_wait_timeout: Duration::from_secs(1),
                watchdog_enabled: true,
            },
            sweeper: SweeperSettings {
                interval: Duration::from_secs(300),
                page_size: 100,
            },
            retry: RetrySettings {
                max_attempts: 3,
                backoff_base: Duration::from_millis(50),
            },
            dlq: DlqSettings { max_deliveries: 3 },
            low_stock: LowStockSettings {
                default_threshold: 0,
            },
        }
    }
}

impl InventoryConfig {
    /// Loads the configuration from the environment, falling back to the
    /// defaults above for every unset key.
    pub fn from_env() -> Result<Self, InventoryError> {
        let defaults = Self::default();

        Ok(Self {
            reservation: ReservationSettings {
                default_ttl: chrono::Duration::seconds(env_i64(
                    "RESERVATION_DEFAULT_TTL_SECS",
                    defaults.reservation.default_ttl.num_seconds(),
                )?),
            },
            lock: LockSettings {
                wait_timeout: env_millis("LOCK_WAIT_TIMEOUT_MS", defaults.lock.wait_timeout)?,
                lease_timeout: env_millis("LOCK_LEASE_TIMEOUT_MS", defaults.lock.lease_timeout)?,
                sweep_wait_timeout: env_millis(
                    "SWEEPER_LOCK_WAIT_MS",
                    defaults.lock.sweep_wait_timeout,
                )?,
                watchdog_enabled: env_bool(
                    "LOCK_WATCHDOG_ENABLED",
                    defaults.lock.watchdog_enabled,
                )?,
            },
            sweeper: SweeperSettings {
                interval: env_millis("SWEEPER_INTERVAL_MS", defaults.sweeper.interval)?,
                page_size: env_u32("SWEEPER_PAGE_SIZE", defaults.sweeper.page_size)?,
            },
            retry: RetrySettings {
                max_attempts: env_u32(
                    "RETRY_OPTIMISTIC_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                )?,
                backoff_base: env_millis(
                    "RETRY_OPTIMISTIC_BACKOFF_BASE_MS",
                    defaults.retry.backoff_base,
                )?,
            },
            dlq: DlqSettings {
                max_deliveries: env_u32("DLQ_MAX_DELIVERIES", defaults.dlq.max_deliveries)?,
            },
            low_stock: LowStockSettings {
                default_threshold: env_u32(
                    "LOW_STOCK_DEFAULT_THRESHOLD",
                    defaults.low_stock.default_threshold,
                )?,
            },
        })
    }
}

fn env_raw(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u32(key: &str, default: u32) -> Result<u32, InventoryError> {
    match env_raw(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| InventoryError::Configuration {
            key: key.to_string(),
            reason: format!("expected unsigned integer, got '{raw}'"),
        }),
    }
}

fn env_i64(key: &str, default: i64) -> Result<i64, InventoryError> {
    match env_raw(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| InventoryError::Configuration {
            key: key.to_string(),
            reason: format!("expected integer, got '{raw}'"),
        }),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration, InventoryError> {
    match env_raw(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| InventoryError::Configuration {
                key: key.to_string(),
                reason: format!("expected milliseconds, got '{raw}'"),
            }),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, InventoryError> {
    match env_raw(key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(InventoryError::Configuration {
                key: key.to_string(),
                reason: format!("expected boolean, got '{raw}'"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = InventoryConfig::default();

        assert_eq!(config.reservation.default_ttl, chrono::Duration::minutes(30));
        assert_eq!(config.lock.wait_timeout, Duration::from_secs(3));
        assert_eq!(config.lock.lease_timeout, Duration::from_secs(5));
        assert!(config.lock.watchdog_enabled);
        assert_eq!(config.sweeper.interval, Duration::from_secs(300));
        assert_eq!(config.sweeper.page_size, 100);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_base, Duration::from_millis(50));
        assert_eq!(config.dlq.max_deliveries, 3);
        assert_eq!(config.low_stock.default_threshold, 0);
    }
}
