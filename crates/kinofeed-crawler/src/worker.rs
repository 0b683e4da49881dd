use std::time::Duration;

use kinofeed_core::{Job, JobKind, JobSpec, JobStatus, MediaKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::broker_client::BrokerClient;
use crate::site::SiteClient;
use crate::{detail, notify, sync};

/// Fixed-size pool of claim slots. Each slot is one tokio task running
/// the claim -> dispatch -> report loop against the broker.
pub struct WorkerPool {
    broker: BrokerClient,
    site: SiteClient,
    webhook: reqwest::Client,
    slots: usize,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl WorkerPool {
    pub fn new(
        broker: BrokerClient,
        site: SiteClient,
        webhook: reqwest::Client,
        slots: usize,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            broker,
            site,
            webhook,
            slots,
            poll_interval,
            shutdown,
        }
    }

    /// Starts every slot. After the shutdown signal flips, each slot
    /// reports its in-flight job before its handle finishes.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        (0..self.slots)
            .map(|id| {
                let slot = Slot {
                    id,
                    broker: self.broker.clone(),
                    site: self.site.clone(),
                    webhook: self.webhook.clone(),
                    poll_interval: self.poll_interval,
                    shutdown: self.shutdown.clone(),
                };
                tokio::spawn(slot.run())
            })
            .collect()
    }
}

struct Slot {
    id: usize,
    broker: BrokerClient,
    site: SiteClient,
    webhook: reqwest::Client,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Slot {
    async fn run(mut self) {
        tracing::debug!(slot = self.id, "slot started");
        loop {
            if *self.shutdown.borrow() {
                tracing::info!(slot = self.id, "slot stopped");
                return;
            }
            match self.pass().await {
                // Something ran; go straight back for the next job.
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(slot = self.id, error = %format!("{e:#}"), "pass failed");
                }
            }
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!(slot = self.id, "slot stopped");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One poll: peek, claim, execute, report. `Ok(true)` when a job ran.
    async fn pass(&self) -> anyhow::Result<bool> {
        if !self.broker.peek(&JobKind::ALL).await? {
            return Ok(false);
        }
        let Some(job) = self.broker.claim(&JobKind::ALL).await? else {
            // Another slot won the claim between peek and claim.
            return Ok(false);
        };
        self.execute(job).await;
        Ok(true)
    }

    async fn execute(&self, job: Job) {
        tracing::info!(job = job.id, kind = %job.spec.kind(), slot = self.id, "job dispatched");
        let outcome = match self.dispatch(&job.spec).await {
            Ok(()) => JobStatus::Completed,
            Err(e) => {
                tracing::warn!(job = job.id, error = %format!("{e:#}"), "job failed");
                JobStatus::Error
            }
        };
        match self.broker.report(job.id, outcome).await {
            Ok(_) => tracing::info!(job = job.id, status = %outcome, "job finished"),
            Err(e) => {
                // Stuck-job recovery on the server will requeue it.
                tracing::warn!(job = job.id, error = %format!("{e:#}"), "could not report outcome");
            }
        }
    }

    async fn dispatch(&self, spec: &JobSpec) -> anyhow::Result<()> {
        match spec {
            JobSpec::SyncUserMovies { user } => {
                sync::run(&self.broker, &self.site, MediaKind::Movie, user).await
            }
            JobSpec::SyncUserSeries { user } => {
                sync::run(&self.broker, &self.site, MediaKind::Series, user).await
            }
            JobSpec::FetchMovieDetail { media_id } => {
                detail::run(&self.broker, &self.site, MediaKind::Movie, *media_id).await
            }
            JobSpec::FetchSeriesDetail { media_id } => {
                detail::run(&self.broker, &self.site, MediaKind::Series, *media_id).await
            }
            JobSpec::SendNotification {
                user,
                kind,
                media_id,
            } => notify::run(&self.broker, &self.webhook, user, *kind, *media_id).await,
        }
    }
}
