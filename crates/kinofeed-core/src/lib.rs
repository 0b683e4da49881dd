pub mod job;
pub mod library;

pub use job::{Job, JobKind, JobSpec, JobStatus};
pub use library::{
    MAX_COMMENT_LEN, MediaDetail, MediaKind, MediaRecord, NewTracker, NewWatchedEntry, Tracker,
    WatchedEntry,
};

/// A value outside one of the closed enumerations, or a payload that does
/// not match its job type. Servers map this to a client error, never a
/// silent drop.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown job status: {0:?}")]
    UnknownStatus(String),
    #[error("unknown job type: {0:?}")]
    UnknownKind(String),
    #[error("unknown media kind: {0:?}")]
    UnknownMediaKind(String),
    #[error("malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),
}
