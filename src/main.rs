use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shulepay_backend::api::{self, AppState};
use shulepay_backend::cache::{init_cache_pool, CacheConfig, RedisCache};
use shulepay_backend::config::Config;
use shulepay_backend::database::ledger_repository::LedgerRepository;
use shulepay_backend::database::school_repository::SchoolRepository;
use shulepay_backend::database::student_repository::StudentRepository;
use shulepay_backend::database::{self, PoolConfig};
use shulepay_backend::events::receipts::{run_receipt_worker, ReceiptQueue};
use shulepay_backend::events::Notifier;
use shulepay_backend::ingest::resolver::SchoolResolver;
use shulepay_backend::ingest::traits::{LedgerStore, SchoolDirectory, StudentDirectory};
use shulepay_backend::ingest::PaymentPipeline;
use shulepay_backend::reconcile::gateway::{BankGateway, TokenStore};
use shulepay_backend::reconcile::TransactionSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Starting Shulepay Backend");
    info!("Environment: {}", config.server.environment);

    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await?;

    let redis_pool = init_cache_pool(CacheConfig {
        redis_url: config.redis.url.clone(),
        ..CacheConfig::default()
    })
    .await?;

    // Storage seams
    let schools: Arc<dyn SchoolDirectory> = Arc::new(SchoolRepository::new(pool.clone()));
    let students: Arc<dyn StudentDirectory> = Arc::new(StudentRepository::new(pool.clone()));
    let ledger: Arc<dyn LedgerStore> = Arc::new(LedgerRepository::new(pool.clone()));

    // Event fan-out and the receipt worker
    let notifier = Notifier::default();
    let (receipts, receipt_rx) = ReceiptQueue::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_receipt_worker(receipt_rx, shutdown_rx));

    // Bank gateway with the tenant-scoped token store
    let token_store = TokenStore::new(Arc::new(RedisCache::new(redis_pool)));
    let bank_source: Arc<dyn TransactionSource> =
        Arc::new(BankGateway::new(config.bank_api.clone(), token_store)?);

    let pipeline = Arc::new(PaymentPipeline::new(
        students,
        ledger.clone(),
        notifier.clone(),
        receipts,
    ));
    let resolver = Arc::new(SchoolResolver::new(schools.clone()));

    let state = AppState {
        config: config.clone(),
        pool,
        schools,
        resolver,
        pipeline,
        ledger,
        notifier,
        bank_source,
    };

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
}
