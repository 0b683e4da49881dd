use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Longest accepted watched-record comment, in characters.
pub const MAX_COMMENT_LEN: usize = 1024;

/// Discriminant shared by media rows, watched records and detail jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Movie, MediaKind::Series];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaKind::Movie),
            "series" => Ok(MediaKind::Series),
            _ => Err(ParseError::UnknownMediaKind(s.to_string())),
        }
    }
}

/// A user whose site activity is followed. Sync fan-out iterates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub user_key: String,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTracker {
    pub user_key: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Detail fields for one media item as assembled by a detail-fetch job.
/// A row whose fields are all null is a stub awaiting its first fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDetail {
    pub id: i64,
    pub title: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub other_year: Option<i32>,
    pub poster_url: Option<String>,
    pub site_rating: Option<f64>,
    pub critics_rating: Option<f64>,
}

impl MediaDetail {
    /// A media row known only by id.
    pub fn stub(id: i64) -> Self {
        MediaDetail {
            id,
            title: None,
            year: None,
            other_year: None,
            poster_url: None,
            site_rating: None,
            critics_rating: None,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.title.is_none()
            && self.year.is_none()
            && self.other_year.is_none()
            && self.poster_url.is_none()
            && self.site_rating.is_none()
            && self.critics_rating.is_none()
    }
}

/// Stored media row: the detail plus its kind and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub kind: MediaKind,
    #[serde(flatten)]
    pub detail: MediaDetail,
    pub updated_at: DateTime<Utc>,
}

/// One user's interaction with one media item. Unique per
/// `(user_key, kind, media_id)`; a duplicate insert is a conflict, not an
/// overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedEntry {
    pub user_key: String,
    pub kind: MediaKind,
    pub media_id: i64,
    pub rating: Option<i32>,
    pub comment: Option<String>,
    pub favorite: bool,
    pub watched_at: DateTime<Utc>,
}

/// Insert form for a watched record; the kind arrives in the URL path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWatchedEntry {
    pub user_key: String,
    pub media_id: i64,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub watched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_round_trips_through_str() {
        for kind in MediaKind::ALL {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
        assert!("show".parse::<MediaKind>().is_err());
    }

    #[test]
    fn stub_has_no_detail() {
        let stub = MediaDetail::stub(628);
        assert!(stub.is_stub());

        let filled = MediaDetail {
            title: Some("Rejs".to_string()),
            ..MediaDetail::stub(628)
        };
        assert!(!filled.is_stub());
    }

    #[test]
    fn media_record_json_flattens_detail() {
        let record = MediaRecord {
            kind: MediaKind::Movie,
            detail: MediaDetail::stub(628),
            updated_at: chrono::DateTime::from_timestamp(1_756_000_000, 0).unwrap(),
        };
        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["kind"], "movie");
        assert_eq!(wire["id"], 628);
        assert_eq!(wire["title"], serde_json::Value::Null);
    }
}
