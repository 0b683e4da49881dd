use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::library::MediaKind;
use crate::ParseError;

/// Lifecycle state of a job.
///
/// Legal transitions: queued -> running -> {completed, error}; a running
/// job can fall back to queued through stuck-job recovery only. Completed
/// and error are terminal except for GC deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

/// Closed set of job types. Worker dispatch is an exhaustive match over
/// [`JobSpec`], so every type listed here has a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    SyncUserMovies,
    SyncUserSeries,
    FetchMovieDetail,
    FetchSeriesDetail,
    SendNotification,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::SyncUserMovies,
        JobKind::SyncUserSeries,
        JobKind::FetchMovieDetail,
        JobKind::FetchSeriesDetail,
        JobKind::SendNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SyncUserMovies => "sync_user_movies",
            JobKind::SyncUserSeries => "sync_user_series",
            JobKind::FetchMovieDetail => "fetch_movie_detail",
            JobKind::FetchSeriesDetail => "fetch_series_detail",
            JobKind::SendNotification => "send_notification",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync_user_movies" => Ok(JobKind::SyncUserMovies),
            "sync_user_series" => Ok(JobKind::SyncUserSeries),
            "fetch_movie_detail" => Ok(JobKind::FetchMovieDetail),
            "fetch_series_detail" => Ok(JobKind::FetchSeriesDetail),
            "send_notification" => Ok(JobKind::SendNotification),
            _ => Err(ParseError::UnknownKind(s.to_string())),
        }
    }
}

/// A job type together with its typed payload.
///
/// On the wire and in the store the payload travels as a JSON object under
/// the type tag, never as a delimited string, so handlers get their fields
/// without ad-hoc parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum JobSpec {
    SyncUserMovies { user: String },
    SyncUserSeries { user: String },
    FetchMovieDetail { media_id: i64 },
    FetchSeriesDetail { media_id: i64 },
    SendNotification { user: String, kind: MediaKind, media_id: i64 },
}

impl JobSpec {
    pub fn sync_user(kind: MediaKind, user: impl Into<String>) -> Self {
        match kind {
            MediaKind::Movie => JobSpec::SyncUserMovies { user: user.into() },
            MediaKind::Series => JobSpec::SyncUserSeries { user: user.into() },
        }
    }

    pub fn fetch_detail(kind: MediaKind, media_id: i64) -> Self {
        match kind {
            MediaKind::Movie => JobSpec::FetchMovieDetail { media_id },
            MediaKind::Series => JobSpec::FetchSeriesDetail { media_id },
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::SyncUserMovies { .. } => JobKind::SyncUserMovies,
            JobSpec::SyncUserSeries { .. } => JobKind::SyncUserSeries,
            JobSpec::FetchMovieDetail { .. } => JobKind::FetchMovieDetail,
            JobSpec::FetchSeriesDetail { .. } => JobKind::FetchSeriesDetail,
            JobSpec::SendNotification { .. } => JobKind::SendNotification,
        }
    }

    /// Payload column text for the store: the object under `payload` on
    /// the wire.
    pub fn payload_to_string(&self) -> Result<String, serde_json::Error> {
        let wire = serde_json::to_value(self)?;
        match wire.get("payload") {
            Some(payload) => serde_json::to_string(payload),
            None => serde_json::to_string(&serde_json::Value::Null),
        }
    }

    /// Rebuilds a spec from the store's `(kind, payload)` columns.
    pub fn from_columns(kind: &str, payload: &str) -> Result<Self, ParseError> {
        let kind: JobKind = kind.parse()?;
        let payload: serde_json::Value = serde_json::from_str(payload)?;
        let wire = serde_json::json!({ "type": kind.as_str(), "payload": payload });
        Ok(serde_json::from_value(wire)?)
    }
}

/// Wire form of a stored job. `type` and `payload` sit at the top level of
/// the JSON object next to the broker-owned fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub status: JobStatus,
    #[serde(flatten)]
    pub spec: JobSpec,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
