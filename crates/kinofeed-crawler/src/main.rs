use anyhow::Context;
use tokio::sync::watch;
use uuid::Uuid;

use kinofeed_crawler::broker_client::BrokerClient;
use kinofeed_crawler::config::CrawlerConfig;
use kinofeed_crawler::site::SiteClient;
use kinofeed_crawler::worker::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = CrawlerConfig::from_env();
    let instance = Uuid::new_v4();
    tracing::info!(
        %instance,
        server = %config.server_url,
        site = %config.site_url,
        slots = config.slots,
        "kinofeed-crawler starting"
    );

    let client = reqwest::Client::builder()
        .user_agent("kinofeed-crawler")
        .timeout(config.request_timeout)
        .build()
        .context("build http client")?;
    let broker = BrokerClient::new(config.server_url.clone(), client.clone());
    let site = SiteClient::new(config.site_url.clone(), client.clone());

    broker.wait_until_ready().await;
    tracing::info!("server ready, starting worker slots");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = WorkerPool::new(
        broker,
        site,
        client,
        config.slots,
        config.poll_interval,
        shutdown_rx,
    );
    let handles = pool.spawn();

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
