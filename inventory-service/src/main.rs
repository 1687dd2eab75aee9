// Inventory service - startup wiring for the reservation core

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use inventory::application::event_handlers::{OrderCancelledHandler, OrderCreatedHandler};
use inventory::application::use_cases::{
    BatchReserveUseCase, ExpireReservationsUseCase, ReleaseOrderUseCase,
    ReleaseReservationUseCase, ReserveStockUseCase,
};
use inventory::infrastructure::locking::RedisLockManager;
use inventory::infrastructure::messaging::{KafkaEventPublisher, KafkaOrderConsumer};
use inventory::infrastructure::persistence::{PgProcessedEventStore, PgProductRepository};
use inventory::infrastructure::scheduler::ReservationSweeper;
use inventory::InventoryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let kafka_brokers =
        std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "127.0.0.1:9092".to_string());
    let consumer_group =
        std::env::var("KAFKA_CONSUMER_GROUP").unwrap_or_else(|_| "inventory-service".to_string());
    let outbound_topic = std::env::var("INVENTORY_EVENTS_TOPIC")
        .unwrap_or_else(|_| "inventory-events".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let config = InventoryConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let repo = Arc::new(PgProductRepository::new(pool.clone()));
    let processed = Arc::new(PgProcessedEventStore::new(pool.clone()));
    let lock = Arc::new(
        RedisLockManager::connect(&redis_url, config.lock.watchdog_enabled)
            .await
            .context("failed to connect to Redis")?,
    );
    let publisher = Arc::new(
        KafkaEventPublisher::new(&kafka_brokers, outbound_topic)
            .context("failed to create Kafka producer")?,
    );

    let reserve = Arc::new(ReserveStockUseCase::new(
        repo.clone(),
        lock.clone(),
        publisher.clone(),
        config.clone(),
    ));
    let release = Arc::new(ReleaseReservationUseCase::new(
        repo.clone(),
        lock.clone(),
        publisher.clone(),
        config.clone(),
    ));
    let batch_reserve = Arc::new(BatchReserveUseCase::new(reserve.clone(), release.clone()));
    let release_order = Arc::new(ReleaseOrderUseCase::new(repo.clone(), release.clone()));
    let expire = Arc::new(ExpireReservationsUseCase::new(
        repo.clone(),
        lock.clone(),
        publisher.clone(),
        config.clone(),
    ));

    let order_created = Arc::new(OrderCreatedHandler::new(batch_reserve, processed.clone()));
    let order_cancelled = Arc::new(OrderCancelledHandler::new(release_order));
    let consumer = KafkaOrderConsumer::new(
        &kafka_brokers,
        &consumer_group,
        order_created,
        order_cancelled,
        config.dlq.max_deliveries,
    )
    .context("failed to create order consumer")?;
    tokio::spawn(async move { consumer.run().await });

    let _sweeper = ReservationSweeper::new(expire, config.sweeper.interval).spawn();

    let app = Router::new().route("/health", get(health));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "inventory service listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}
