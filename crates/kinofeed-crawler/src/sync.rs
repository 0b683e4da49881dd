use std::collections::HashSet;

use anyhow::Context;
use chrono::DateTime;
use kinofeed_core::{JobSpec, MediaKind, NewWatchedEntry};

use crate::broker_client::{BrokerClient, WatchedOutcome};
use crate::site::SiteClient;

/// Handler for sync-user jobs: diff the site's recent activity against the
/// recorded state and persist what is new.
///
/// An unreachable activity list (private profile, site hiccup) completes
/// the job with nothing to do; only a storage failure makes it an error.
/// Item-level failures are skipped so one bad row cannot starve the rest.
pub async fn run(
    broker: &BrokerClient,
    site: &SiteClient,
    kind: MediaKind,
    user: &str,
) -> anyhow::Result<()> {
    let Some(external_ids) = site.recent_votes(kind, user).await else {
        tracing::info!(user, %kind, "activity list unavailable, nothing to sync");
        return Ok(());
    };

    let known = broker.watched_ids(kind, user).await?;
    // No prior records at all: record history silently, without one
    // notification per pre-existing item.
    let first_sync = known.is_empty();
    let known: HashSet<i64> = known.into_iter().collect();

    let new_ids = plan_new_ids(&external_ids, &known);
    if new_ids.is_empty() {
        tracing::info!(user, %kind, "no new activity");
        return Ok(());
    }
    tracing::info!(user, %kind, new = new_ids.len(), first_sync, "new activity detected");

    for media_id in new_ids {
        if let Err(e) = record_item(broker, site, kind, user, media_id, first_sync).await {
            tracing::warn!(user, %kind, media_id, error = %format!("{e:#}"), "skipping item");
        }
    }
    Ok(())
}

/// External ids not yet recorded, in the order the site reported them.
/// The site window can repeat an id; each appears at most once.
pub fn plan_new_ids(external: &[i64], known: &HashSet<i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    external
        .iter()
        .copied()
        .filter(|id| !known.contains(id))
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Follow-up jobs for one newly recorded item: always a detail fetch,
/// plus a notification unless this is the user's first sync.
pub fn cascade_jobs(kind: MediaKind, user: &str, media_id: i64, first_sync: bool) -> Vec<JobSpec> {
    let mut jobs = vec![JobSpec::fetch_detail(kind, media_id)];
    if !first_sync {
        jobs.push(JobSpec::SendNotification {
            user: user.to_string(),
            kind,
            media_id,
        });
    }
    jobs
}

async fn record_item(
    broker: &BrokerClient,
    site: &SiteClient,
    kind: MediaKind,
    user: &str,
    media_id: i64,
    first_sync: bool,
) -> anyhow::Result<()> {
    let vote = site
        .vote_detail(kind, user, media_id)
        .await
        .context("vote detail unavailable")?;
    let watched_at = DateTime::from_timestamp_millis(vote.timestamp)
        .with_context(|| format!("timestamp {} out of range", vote.timestamp))?;

    let entry = NewWatchedEntry {
        user_key: user.to_string(),
        media_id,
        rating: vote.rate,
        comment: vote.comment,
        favorite: vote.favorite.unwrap_or(false),
        watched_at,
    };

    match broker.add_watched(kind, &entry).await? {
        WatchedOutcome::Created => {}
        WatchedOutcome::AlreadyRecorded => {
            // The run that won the insert owns the follow-up jobs too;
            // creating them here would notify twice.
            tracing::debug!(user, %kind, media_id, "already recorded by a concurrent run");
            return Ok(());
        }
    }

    for spec in cascade_jobs(kind, user, media_id, first_sync) {
        broker
            .create_job(&spec)
            .await
            .context("enqueue follow-up job")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinofeed_core::JobKind;

    #[test]
    fn diff_keeps_order_and_drops_known_ids() {
        let known: HashSet<i64> = [1].into_iter().collect();
        assert_eq!(plan_new_ids(&[1, 2, 3], &known), vec![2, 3]);
    }

    #[test]
    fn diff_is_empty_when_everything_is_known() {
        let known: HashSet<i64> = [1, 2, 3].into_iter().collect();
        assert!(plan_new_ids(&[3, 2, 1], &known).is_empty());
        assert!(plan_new_ids(&[], &known).is_empty());
    }

    #[test]
    fn diff_reports_a_repeated_id_once() {
        let known = HashSet::new();
        assert_eq!(plan_new_ids(&[5, 5, 7, 5], &known), vec![5, 7]);
    }

    #[test]
    fn cascade_always_fetches_detail() {
        let jobs = cascade_jobs(MediaKind::Series, "alice", 430_668, true);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind(), JobKind::FetchSeriesDetail);
    }

    #[test]
    fn cascade_notifies_only_after_first_sync() {
        let jobs = cascade_jobs(MediaKind::Movie, "alice", 628, false);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind(), JobKind::FetchMovieDetail);
        assert_eq!(
            jobs[1],
            JobSpec::SendNotification {
                user: "alice".to_string(),
                kind: MediaKind::Movie,
                media_id: 628,
            }
        );
    }
}
