use kinofeed_core::MediaKind;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// One user's vote on one title, as the site reports it. `timestamp` is
/// epoch milliseconds; everything else may be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteDetail {
    #[serde(default)]
    pub rate: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub favorite: Option<bool>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub other_year: Option<i32>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// The site serves `{"rate": null}` for titles nobody has rated yet, so a
/// successful fetch can still carry no rating.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteRating {
    #[serde(default)]
    pub rate: Option<f64>,
}

/// Read-only client for the external site's JSON API. Every failure is
/// logged and surfaced as "no data"; the caller decides what that means
/// for its job.
#[derive(Clone)]
pub struct SiteClient {
    base_url: String,
    client: reqwest::Client,
}

/// The site keys votes under `film`/`serial` but serves ratings for both
/// kinds under `film`.
fn vote_segment(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "film",
        MediaKind::Series => "serial",
    }
}

impl SiteClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// The user's most recent votes (bounded window), newest first. Ids
    /// only; rows that do not carry one are dropped.
    pub async fn recent_votes(&self, kind: MediaKind, user: &str) -> Option<Vec<i64>> {
        let url = format!(
            "{}/api/v1/user/{}/vote/{}",
            self.base_url,
            user,
            vote_segment(kind)
        );
        let rows: Vec<serde_json::Value> = self.get_json(&url).await?;
        Some(
            rows.iter()
                .filter_map(|row| row.get(0).and_then(|v| v.as_i64()))
                .collect(),
        )
    }

    pub async fn vote_detail(&self, kind: MediaKind, user: &str, id: i64) -> Option<VoteDetail> {
        let url = format!(
            "{}/api/v1/user/{}/vote/{}/{}",
            self.base_url,
            user,
            vote_segment(kind),
            id
        );
        self.get_json(&url).await
    }

    pub async fn title_info(&self, id: i64) -> Option<TitleInfo> {
        let url = format!("{}/api/v1/title/{}/info", self.base_url, id);
        self.get_json(&url).await
    }

    pub async fn rating(&self, id: i64) -> Option<SiteRating> {
        let url = format!("{}/api/v1/film/{}/rating", self.base_url, id);
        self.get_json(&url).await
    }

    pub async fn critics_rating(&self, id: i64) -> Option<f64> {
        let url = format!("{}/api/v1/film/{}/critics/rating", self.base_url, id);
        let rating: Option<SiteRating> = self.get_json(&url).await;
        rating.and_then(|r| r.rate)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let res = match self.client.get(url).send().await {
            Ok(res) => res,
            Err(e) => {
                tracing::warn!(url, error = %e, "site fetch failed");
                return None;
            }
        };
        if !res.status().is_success() {
            tracing::warn!(url, status = %res.status(), "site fetch failed");
            return None;
        }
        match res.json::<T>().await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(url, error = %e, "site payload did not parse");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_segments_differ_per_kind() {
        assert_eq!(vote_segment(MediaKind::Movie), "film");
        assert_eq!(vote_segment(MediaKind::Series), "serial");
    }

    #[test]
    fn vote_detail_tolerates_sparse_payloads() {
        let vote: VoteDetail = serde_json::from_str(r#"{"timestamp": 1756000000000}"#).unwrap();
        assert_eq!(vote.rate, None);
        assert_eq!(vote.comment, None);
        assert_eq!(vote.favorite, None);
        assert_eq!(vote.timestamp, 1_756_000_000_000);

        assert!(serde_json::from_str::<VoteDetail>(r#"{"rate": 8}"#).is_err());
    }

    #[test]
    fn title_info_maps_site_field_names() {
        let info: TitleInfo = serde_json::from_str(
            r#"{"title": "Czterdziestolatek", "year": 1974, "otherYear": 1977,
                "posterPath": "/po/43/0668.jpg", "somethingElse": 1}"#,
        )
        .unwrap();
        assert_eq!(info.title.as_deref(), Some("Czterdziestolatek"));
        assert_eq!(info.year, Some(1974));
        assert_eq!(info.other_year, Some(1977));
        assert_eq!(info.poster_path.as_deref(), Some("/po/43/0668.jpg"));
    }
}
