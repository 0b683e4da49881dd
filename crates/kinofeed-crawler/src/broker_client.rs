use std::time::Duration;

use anyhow::Context;
use kinofeed_core::{
    Job, JobKind, JobSpec, JobStatus, MediaDetail, MediaKind, MediaRecord, NewWatchedEntry,
    Tracker, WatchedEntry,
};
use reqwest::StatusCode;

/// Outcome of recording a watched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedOutcome {
    Created,
    /// Another run already recorded the same `(user, kind, media_id)`.
    AlreadyRecorded,
}

/// HTTP client for the server's broker and storage endpoints. Cheap to
/// clone; one instance is shared by all worker slots.
#[derive(Clone)]
pub struct BrokerClient {
    base_url: String,
    client: reqwest::Client,
}

impl BrokerClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Blocks until the server answers its health probe. The server may
    /// still be migrating when the crawler comes up.
    pub async fn wait_until_ready(&self) {
        loop {
            match self
                .client
                .get(format!("{}/healthz", self.base_url))
                .send()
                .await
            {
                Ok(res) if res.status().is_success() => return,
                Ok(res) => tracing::warn!(status = %res.status(), "server not ready, retrying"),
                Err(e) => tracing::warn!(error = %e, "server not reachable, retrying"),
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    fn types_param(kinds: &[JobKind]) -> String {
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub async fn peek(&self, kinds: &[JobKind]) -> anyhow::Result<bool> {
        let res = self
            .client
            .head(format!("{}/jobs/next", self.base_url))
            .query(&[("types", Self::types_param(kinds))])
            .send()
            .await
            .context("peek queued jobs")?;
        match res.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => anyhow::bail!("peek queued jobs: unexpected status {status}"),
        }
    }

    pub async fn claim(&self, kinds: &[JobKind]) -> anyhow::Result<Option<Job>> {
        let res = self
            .client
            .get(format!("{}/jobs/next", self.base_url))
            .query(&[("types", Self::types_param(kinds))])
            .send()
            .await
            .context("claim next job")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let job = res
            .error_for_status()
            .context("claim next job (status)")?
            .json::<Job>()
            .await
            .context("parse claimed job")?;
        Ok(Some(job))
    }

    pub async fn report(&self, id: i64, status: JobStatus) -> anyhow::Result<Job> {
        self.client
            .get(format!("{}/jobs/{}/status/{}", self.base_url, id, status))
            .send()
            .await
            .context("report job status")?
            .error_for_status()
            .context("report job status (status)")?
            .json::<Job>()
            .await
            .context("parse reported job")
    }

    pub async fn create_job(&self, spec: &JobSpec) -> anyhow::Result<Job> {
        self.client
            .post(format!("{}/jobs", self.base_url))
            .json(spec)
            .send()
            .await
            .context("create job")?
            .error_for_status()
            .context("create job (status)")?
            .json::<Job>()
            .await
            .context("parse created job")
    }

    /// Media ids already recorded as watched by this user.
    pub async fn watched_ids(&self, kind: MediaKind, user: &str) -> anyhow::Result<Vec<i64>> {
        let entries = self
            .client
            .get(format!("{}/library/watched/{}/{}", self.base_url, kind, user))
            .send()
            .await
            .context("fetch recorded activity")?
            .error_for_status()
            .context("fetch recorded activity (status)")?
            .json::<Vec<WatchedEntry>>()
            .await
            .context("parse recorded activity")?;
        Ok(entries.into_iter().map(|e| e.media_id).collect())
    }

    pub async fn add_watched(
        &self,
        kind: MediaKind,
        entry: &NewWatchedEntry,
    ) -> anyhow::Result<WatchedOutcome> {
        let res = self
            .client
            .post(format!("{}/library/watched/{}", self.base_url, kind))
            .json(entry)
            .send()
            .await
            .context("record watched item")?;
        if res.status() == StatusCode::CONFLICT {
            return Ok(WatchedOutcome::AlreadyRecorded);
        }
        res.error_for_status()
            .context("record watched item (status)")?;
        Ok(WatchedOutcome::Created)
    }

    pub async fn tracker(&self, user: &str) -> anyhow::Result<Option<Tracker>> {
        let res = self
            .client
            .get(format!("{}/library/trackers/{}", self.base_url, user))
            .send()
            .await
            .context("fetch tracker")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let tracker = res
            .error_for_status()
            .context("fetch tracker (status)")?
            .json::<Tracker>()
            .await
            .context("parse tracker")?;
        Ok(Some(tracker))
    }

    pub async fn media(&self, kind: MediaKind, id: i64) -> anyhow::Result<Option<MediaRecord>> {
        let res = self
            .client
            .get(format!("{}/library/media/{}/{}", self.base_url, kind, id))
            .send()
            .await
            .context("fetch media")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record = res
            .error_for_status()
            .context("fetch media (status)")?
            .json::<MediaRecord>()
            .await
            .context("parse media")?;
        Ok(Some(record))
    }

    pub async fn upsert_media(
        &self,
        kind: MediaKind,
        detail: &MediaDetail,
    ) -> anyhow::Result<MediaRecord> {
        self.client
            .put(format!("{}/library/media/{}", self.base_url, kind))
            .json(detail)
            .send()
            .await
            .context("store media detail")?
            .error_for_status()
            .context("store media detail (status)")?
            .json::<MediaRecord>()
            .await
            .context("parse stored media")
    }
}
