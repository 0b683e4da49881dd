use std::net::SocketAddr;
use std::sync::Arc;

use kinofeed_migration::Migrator;
use sea_orm_migration::MigratorTrait;
use tokio::sync::watch;

use kinofeed_server::config::ServerConfig;
use kinofeed_server::scheduler::Scheduler;
use kinofeed_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();

    let db = kinofeed_db::connect(&config.database_url).await?;

    // Apply migrations on boot (idempotent).
    Migrator::up(&db, None).await?;
    let db = Arc::new(db);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(db.clone(), config.clone(), shutdown_rx).spawn();

    let app = kinofeed_server::app(AppState { db });

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    tracing::info!(%addr, "kinofeed-server HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // The scheduler saw the same signal; wait for its loop to wind down.
    let _ = scheduler.await;

    Ok(())
}
