use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use carecall_api::app::{self, AppDeps};
use carecall_api::config::Config;
use carecall_api::jobs::{CleanupCallsJob, JobScheduler, PoolMetricsJob};
use carecall_api::middleware::{init_metrics, logging};
use carecall_api::services::{
    build_sender, AllowAllPolicy, TenantMembershipPolicy, VideoRoomService,
};
use domain::messaging::{Broker, BrokerOptions};
use domain::services::AccessPolicy;
use persistence::repositories::TenantRepository;
use shared::jwt::OfficeTokenVerifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    logging::init_logging(&config.logging);
    init_metrics();

    info!("Starting Carecall API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    })
    .await
    .context("failed to create database pool")?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    // Broadcast broker, run from its own task until shutdown.
    let broker = Arc::new(Broker::new(BrokerOptions::default()));
    let shutdown = CancellationToken::new();
    let broker_handle = {
        let broker = broker.clone();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = broker.run(cancel).await {
                error!("Broker run loop failed: {}", e);
            }
        })
    };
    broker.started().await;

    let access: Arc<dyn AccessPolicy> = if config.auth.disabled {
        info!("Office authentication DISABLED, all access checks pass");
        Arc::new(AllowAllPolicy)
    } else {
        Arc::new(TenantMembershipPolicy::new(TenantRepository::new(
            pool.clone(),
        )))
    };

    let office_verifier = if config.auth.disabled {
        None
    } else {
        Some(Arc::new(
            OfficeTokenVerifier::new(
                &config.auth.public_key,
                &config.auth.issuer,
                &config.auth.audience,
            )
            .context("failed to initialize office token verifier")?,
        ))
    };

    let rooms = Arc::new(
        VideoRoomService::new(&config.rooms).context("failed to initialize room service")?,
    );
    let notifier =
        build_sender(&config.notifications).context("failed to initialize notifications")?;
    info!(backend = %config.notifications.backend, "Notification backend ready");

    let mut scheduler = JobScheduler::new();
    scheduler.register(CleanupCallsJob::new(
        pool.clone(),
        config.calls.validity_secs,
        config.calls.cleanup_interval_secs,
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    let addr = config.socket_addr();
    let app = app::create_app(
        config,
        pool,
        AppDeps {
            broker: broker.clone(),
            access,
            rooms,
            notifier,
            office_verifier,
        },
    );

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    shutdown.cancel();
    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    let _ = broker_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
