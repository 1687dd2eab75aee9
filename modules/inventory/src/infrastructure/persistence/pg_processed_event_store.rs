// PostgreSQL ProcessedEventStore - idempotency keys with conditional insert

use async_trait::async_trait;
use events::{DedupError, ProcessedEventStore};
use sqlx::PgPool;

/// PostgreSQL implementation of ProcessedEventStore.
///
/// `mark_processed` is a single conditional insert, so two concurrent
/// deliveries of the same event race safely: exactly one sees `true`.
pub struct PgProcessedEventStore {
    pool: PgPool,
}

impl PgProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PgProcessedEventStore {
    async fn mark_processed(&self, channel: &str, event_id: &str) -> Result<bool, DedupError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (channel, event_id, processed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (channel, event_id) DO NOTHING
            "#,
        )
        .bind(channel)
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DedupError::Backend(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_processed(&self, channel: &str, event_id: &str) -> Result<bool, DedupError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_events WHERE channel = $1 AND event_id = $2)",
        )
        .bind(channel)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DedupError::Backend(e.to_string()))?;

        Ok(exists)
    }
}
