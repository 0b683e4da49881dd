use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::broker;
use crate::config::ServerConfig;

/// Time-driven fan-out and maintenance. Runs inside the server process and
/// calls the broker directly; the HTTP fan-out endpoints invoke the same
/// functions manually.
pub struct Scheduler {
    db: Arc<DatabaseConnection>,
    config: ServerConfig,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: ServerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            db,
            config,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let Scheduler {
            db,
            config,
            mut shutdown,
        } = self;

        let mut sync = ticker(config.sync_interval);
        let mut refresh = ticker(config.refresh_interval);
        let mut maintenance = ticker(config.maintenance_interval);
        let mut gc = ticker(config.gc_interval);

        tracing::info!(
            sync_secs = config.sync_interval.as_secs(),
            refresh_secs = config.refresh_interval.as_secs(),
            maintenance_secs = config.maintenance_interval.as_secs(),
            gc_secs = config.gc_interval.as_secs(),
            "scheduler running"
        );

        loop {
            tokio::select! {
                _ = sync.tick() => sync_pass(&db).await,
                _ = refresh.tick() => refresh_pass(&db).await,
                _ = maintenance.tick() => maintenance_pass(&db, config.stuck_after_mins).await,
                _ = gc.tick() => gc_pass(&db, config.retention_mins).await,
                _ = shutdown.changed() => {
                    tracing::info!("scheduler stopped");
                    return;
                }
            }
        }
    }
}

/// First tick lands one full period after boot; boot itself is not a tick.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sync_pass(db: &DatabaseConnection) {
    match broker::fan_out_user_sync(db).await {
        Ok(created) => tracing::info!(created, "sync fan-out pass"),
        Err(e) => tracing::error!(error = %e, "sync fan-out pass failed"),
    }
}

async fn refresh_pass(db: &DatabaseConnection) {
    match broker::fan_out_media_refresh(db).await {
        Ok(created) => tracing::info!(created, "media refresh fan-out pass"),
        Err(e) => tracing::error!(error = %e, "media refresh fan-out pass failed"),
    }
}

async fn maintenance_pass(db: &DatabaseConnection, stuck_after_mins: u64) {
    match broker::requeue_stuck(db, chrono::Duration::minutes(stuck_after_mins as i64)).await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "requeued stuck jobs"),
        Err(e) => tracing::error!(error = %e, "stuck-job requeue failed"),
    }
}

async fn gc_pass(db: &DatabaseConnection, retention_mins: u64) {
    match broker::delete_older_than(db, chrono::Duration::minutes(retention_mins as i64)).await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "deleted old terminal jobs"),
        Err(e) => tracing::error!(error = %e, "job GC failed"),
    }
}
