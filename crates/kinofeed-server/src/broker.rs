use chrono::Utc;
use kinofeed_core::{Job, JobKind, JobSpec, JobStatus, MediaKind};
use kinofeed_db::entities::{jobs, media, trackers};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::error::ApiError;

/// How many times a lost claim race is retried before reporting "none".
/// Callers poll anyway, so a rare triple race only delays the job by one
/// poll interval.
const CLAIM_ATTEMPTS: usize = 3;

/// Legal status transitions. `Running -> Queued` happens only through
/// [`requeue_stuck`], never through [`set_status`].
pub fn transition_allowed(from: JobStatus, to: JobStatus) -> bool {
    matches!(
        (from, to),
        (JobStatus::Queued, JobStatus::Running)
            | (JobStatus::Running, JobStatus::Completed)
            | (JobStatus::Running, JobStatus::Error)
    )
}

/// Inserts a new QUEUED job. No dedup: duplicate jobs for the same logical
/// work are expected and handlers must tolerate them.
pub async fn create(db: &DatabaseConnection, spec: &JobSpec) -> Result<Job, ApiError> {
    let payload = spec
        .payload_to_string()
        .map_err(|e| ApiError::validation(format!("unserializable job payload: {e}")))?;

    let model = jobs::ActiveModel {
        id: NotSet,
        status: Set(JobStatus::Queued.as_str().to_string()),
        kind: Set(spec.kind().as_str().to_string()),
        payload: Set(payload),
        created_at: Set(Utc::now().into()),
        started_at: Set(None),
        finished_at: Set(None),
    }
    .insert(db)
    .await?;

    job_from_model(model)
}

/// True iff at least one QUEUED job of one of the given kinds exists.
/// Side-effect-free; lets a worker skip the claim round-trip when idle.
pub async fn peek(db: &DatabaseConnection, kinds: &[JobKind]) -> Result<bool, ApiError> {
    let count = jobs::Entity::find()
        .filter(jobs::Column::Status.eq(JobStatus::Queued.as_str()))
        .filter(jobs::Column::Kind.is_in(kinds.iter().map(|k| k.as_str())))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Claims the oldest QUEUED job of one of the given kinds: moves it to
/// RUNNING, stamps `started_at` and returns it.
///
/// The transition is a conditional update on `status = QUEUED` checked by
/// affected-row count, so two concurrent claimers cannot both win the same
/// job; the loser retries against the next candidate.
pub async fn claim(db: &DatabaseConnection, kinds: &[JobKind]) -> Result<Option<Job>, ApiError> {
    for _ in 0..CLAIM_ATTEMPTS {
        let candidate = jobs::Entity::find()
            .filter(jobs::Column::Status.eq(JobStatus::Queued.as_str()))
            .filter(jobs::Column::Kind.is_in(kinds.iter().map(|k| k.as_str())))
            .order_by_asc(jobs::Column::Id)
            .one(db)
            .await?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let won = jobs::Entity::update_many()
            .col_expr(
                jobs::Column::Status,
                Expr::value(JobStatus::Running.as_str()),
            )
            .col_expr(jobs::Column::StartedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(jobs::Column::Id.eq(candidate.id))
            .filter(jobs::Column::Status.eq(JobStatus::Queued.as_str()))
            .exec(db)
            .await?
            .rows_affected
            == 1;

        if !won {
            // Another claimer got there first; try the next candidate.
            continue;
        }

        let Some(model) = jobs::Entity::find_by_id(candidate.id).one(db).await? else {
            continue;
        };
        let job = job_from_model(model)?;
        tracing::debug!(job = job.id, kind = %job.spec.kind(), "job claimed");
        return Ok(Some(job));
    }

    Ok(None)
}

/// Transitions a job, stamping `started_at`/`finished_at` as the status
/// demands. Illegal transitions are rejected and leave the row untouched.
pub async fn set_status(
    db: &DatabaseConnection,
    id: i64,
    next: JobStatus,
) -> Result<Job, ApiError> {
    let Some(model) = jobs::Entity::find_by_id(id).one(db).await? else {
        return Err(ApiError::not_found(format!("job {id} does not exist")));
    };

    let current: JobStatus = model.status.parse().map_err(|e| corrupt_job(id, &e))?;
    if !transition_allowed(current, next) {
        return Err(ApiError::conflict(format!(
            "job {id} cannot move from {current} to {next}"
        )));
    }

    let mut active: jobs::ActiveModel = model.into();
    active.status = Set(next.as_str().to_string());
    match next {
        JobStatus::Running => active.started_at = Set(Some(Utc::now().into())),
        JobStatus::Completed => active.finished_at = Set(Some(Utc::now().into())),
        JobStatus::Queued | JobStatus::Error => {}
    }
    let model = active.update(db).await?;

    job_from_model(model)
}

/// Resets RUNNING jobs whose `started_at` is older than the cutoff back to
/// QUEUED with `started_at` cleared. The sole recovery path for a worker
/// that died mid-job; it cannot tell a dead worker from a slow one, so the
/// cutoff must sit comfortably above the slowest expected handler.
pub async fn requeue_stuck(
    db: &DatabaseConnection,
    older_than: chrono::Duration,
) -> Result<u64, ApiError> {
    let cutoff = (Utc::now() - older_than).fixed_offset();
    let result = jobs::Entity::update_many()
        .col_expr(jobs::Column::Status, Expr::value(JobStatus::Queued.as_str()))
        .col_expr(
            jobs::Column::StartedAt,
            Expr::value(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
        )
        .filter(jobs::Column::Status.eq(JobStatus::Running.as_str()))
        .filter(jobs::Column::StartedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Deletes COMPLETED and ERROR jobs created before `now - age`. QUEUED and
/// RUNNING jobs are exempt regardless of age: GC bounds storage growth, it
/// never discards pending work.
pub async fn delete_older_than(
    db: &DatabaseConnection,
    age: chrono::Duration,
) -> Result<u64, ApiError> {
    let cutoff = (Utc::now() - age).fixed_offset();
    let result = jobs::Entity::delete_many()
        .filter(jobs::Column::Status.is_in([
            JobStatus::Completed.as_str(),
            JobStatus::Error.as_str(),
        ]))
        .filter(jobs::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Creates one sync-movies and one sync-series job per tracker. A full scan
/// every time; duplicates across passes are tolerated downstream.
pub async fn fan_out_user_sync(db: &DatabaseConnection) -> Result<u64, ApiError> {
    let rows = trackers::Entity::find().all(db).await?;
    let mut created = 0u64;
    for tracker in rows {
        for kind in MediaKind::ALL {
            create(db, &JobSpec::sync_user(kind, tracker.user_key.clone())).await?;
            created += 1;
        }
    }
    Ok(created)
}

/// Creates one detail-fetch job per known media row.
pub async fn fan_out_media_refresh(db: &DatabaseConnection) -> Result<u64, ApiError> {
    let rows = media::Entity::find().all(db).await?;
    let mut created = 0u64;
    for row in rows {
        let kind: MediaKind = row
            .kind
            .parse()
            .map_err(|e| ApiError::Corrupt(format!("media {} {}: {e}", row.kind, row.id)))?;
        create(db, &JobSpec::fetch_detail(kind, row.id)).await?;
        created += 1;
    }
    Ok(created)
}

fn corrupt_job(id: i64, err: &kinofeed_core::ParseError) -> ApiError {
    ApiError::Corrupt(format!("job {id}: {err}"))
}

fn job_from_model(model: jobs::Model) -> Result<Job, ApiError> {
    let status: JobStatus = model.status.parse().map_err(|e| corrupt_job(model.id, &e))?;
    let spec = JobSpec::from_columns(&model.kind, &model.payload)
        .map_err(|e| corrupt_job(model.id, &e))?;
    Ok(Job {
        id: model.id,
        status,
        spec,
        created_at: model.created_at.with_timezone(&Utc),
        started_at: model.started_at.map(|t| t.with_timezone(&Utc)),
        finished_at: model.finished_at.map(|t| t.with_timezone(&Utc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinofeed_migration::Migrator;
    use sea_orm_migration::MigratorTrait;

    async fn test_db() -> DatabaseConnection {
        let mut options = sea_orm::ConnectOptions::new("sqlite::memory:");
        options.max_connections(1);
        let db = sea_orm::Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn sync_movies(user: &str) -> JobSpec {
        JobSpec::SyncUserMovies {
            user: user.to_string(),
        }
    }

    async fn backdate_started(db: &DatabaseConnection, id: i64, minutes: i64) {
        jobs::Entity::update_many()
            .col_expr(
                jobs::Column::StartedAt,
                Expr::value((Utc::now() - chrono::Duration::minutes(minutes)).fixed_offset()),
            )
            .filter(jobs::Column::Id.eq(id))
            .exec(db)
            .await
            .unwrap();
    }

    async fn backdate_created(db: &DatabaseConnection, id: i64, minutes: i64) {
        jobs::Entity::update_many()
            .col_expr(
                jobs::Column::CreatedAt,
                Expr::value((Utc::now() - chrono::Duration::minutes(minutes)).fixed_offset()),
            )
            .filter(jobs::Column::Id.eq(id))
            .exec(db)
            .await
            .unwrap();
    }

    #[test]
    fn transition_table_matches_state_machine() {
        use JobStatus::*;
        for from in [Queued, Running, Completed, Error] {
            for to in [Queued, Running, Completed, Error] {
                let allowed = transition_allowed(from, to);
                let expected = matches!(
                    (from, to),
                    (Queued, Running) | (Running, Completed) | (Running, Error)
                );
                assert_eq!(allowed, expected, "{from} -> {to}");
            }
        }
    }

    #[tokio::test]
    async fn create_starts_queued_with_timestamps_unset() {
        let db = test_db().await;
        let job = create(&db, &sync_movies("alice")).await.unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());
        assert_eq!(job.spec, sync_movies("alice"));
    }

    #[tokio::test]
    async fn claim_takes_oldest_matching_and_respects_allowlist() {
        let db = test_db().await;
        let first = create(&db, &sync_movies("alice")).await.unwrap();
        create(&db, &JobSpec::FetchMovieDetail { media_id: 628 })
            .await
            .unwrap();
        let third = create(&db, &sync_movies("bob")).await.unwrap();

        let allow = [JobKind::SyncUserMovies];
        let claimed = claim(&db, &allow).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(claimed.started_at.is_some());
        assert!(claimed.finished_at.is_none());

        let claimed = claim(&db, &allow).await.unwrap().unwrap();
        assert_eq!(claimed.id, third.id);

        // Detail job is outside the allow-list; the queue looks empty now.
        assert!(claim(&db, &allow).await.unwrap().is_none());
        assert!(!peek(&db, &allow).await.unwrap());
        assert!(peek(&db, &[JobKind::FetchMovieDetail]).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_yield_exactly_one_winner() {
        let db = test_db().await;
        let job = create(&db, &sync_movies("alice")).await.unwrap();

        let allow = [JobKind::SyncUserMovies];
        let (a, b) = tokio::join!(claim(&db, &allow), claim(&db, &allow));
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
        assert_eq!(a.or(b).unwrap().id, job.id);
    }

    #[tokio::test]
    async fn set_status_enforces_the_state_machine() {
        let db = test_db().await;
        let job = create(&db, &sync_movies("alice")).await.unwrap();

        // Completing a job that never ran skips RUNNING; rejected.
        let err = set_status(&db, job.id, JobStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let claimed = claim(&db, &[JobKind::SyncUserMovies])
            .await
            .unwrap()
            .unwrap();
        let done = set_status(&db, claimed.id, JobStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.finished_at.is_some());

        // Terminal states stay terminal.
        let err = set_status(&db, claimed.id, JobStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let err = set_status(&db, 999_999, JobStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn error_outcome_leaves_finished_at_unset() {
        let db = test_db().await;
        create(&db, &sync_movies("alice")).await.unwrap();
        let claimed = claim(&db, &[JobKind::SyncUserMovies])
            .await
            .unwrap()
            .unwrap();

        let failed = set_status(&db, claimed.id, JobStatus::Error).await.unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert!(failed.started_at.is_some());
        assert!(failed.finished_at.is_none());
    }

    #[tokio::test]
    async fn requeue_stuck_recovers_old_running_jobs_only() {
        let db = test_db().await;
        let stuck = create(&db, &sync_movies("alice")).await.unwrap();
        let fresh = create(&db, &sync_movies("bob")).await.unwrap();

        let allow = [JobKind::SyncUserMovies];
        claim(&db, &allow).await.unwrap().unwrap();
        claim(&db, &allow).await.unwrap().unwrap();
        backdate_started(&db, stuck.id, 10).await;

        let requeued = requeue_stuck(&db, chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(requeued, 1);

        // The stuck job is queued again with its start stamp cleared and is
        // claimable; the fresh one is still running.
        let reclaimed = claim(&db, &allow).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, stuck.id);

        let fresh_row = jobs::Entity::find_by_id(fresh.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh_row.status, JobStatus::Running.as_str());
    }

    #[tokio::test]
    async fn requeued_job_has_started_at_cleared() {
        let db = test_db().await;
        let job = create(&db, &sync_movies("alice")).await.unwrap();
        claim(&db, &[JobKind::SyncUserMovies])
            .await
            .unwrap()
            .unwrap();
        backdate_started(&db, job.id, 10).await;

        requeue_stuck(&db, chrono::Duration::minutes(5))
            .await
            .unwrap();

        let row = jobs::Entity::find_by_id(job.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, JobStatus::Queued.as_str());
        assert!(row.started_at.is_none());
    }

    #[tokio::test]
    async fn gc_deletes_terminal_jobs_and_spares_pending_ones() {
        let db = test_db().await;
        let done = create(&db, &sync_movies("a")).await.unwrap();
        let failed = create(&db, &sync_movies("b")).await.unwrap();
        let queued = create(&db, &sync_movies("c")).await.unwrap();
        let running = create(&db, &sync_movies("d")).await.unwrap();

        let allow = [JobKind::SyncUserMovies];
        for _ in 0..3 {
            claim(&db, &allow).await.unwrap().unwrap();
        }
        set_status(&db, done.id, JobStatus::Completed).await.unwrap();
        set_status(&db, failed.id, JobStatus::Error).await.unwrap();

        for job in [&done, &failed, &queued, &running] {
            backdate_created(&db, job.id, 60).await;
        }

        let deleted = delete_older_than(&db, chrono::Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let remaining: Vec<i64> = jobs::Entity::find()
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert!(remaining.contains(&queued.id));
        assert!(remaining.contains(&running.id));
        assert!(!remaining.contains(&done.id));
        assert!(!remaining.contains(&failed.id));
    }

    #[tokio::test]
    async fn fan_out_creates_jobs_per_tracker_and_media_row() {
        let db = test_db().await;
        for user in ["alice", "bob"] {
            trackers::ActiveModel {
                user_key: Set(user.to_string()),
                webhook_url: Set(None),
                created_at: Set(Utc::now().into()),
            }
            .insert(&db)
            .await
            .unwrap();
        }
        media::ActiveModel {
            kind: Set(MediaKind::Series.as_str().to_string()),
            id: Set(430_668),
            title: Set(None),
            year: Set(None),
            other_year: Set(None),
            poster_url: Set(None),
            site_rating: Set(None),
            critics_rating: Set(None),
            updated_at: Set(Utc::now().into()),
        }
        .insert(&db)
        .await
        .unwrap();

        assert_eq!(fan_out_user_sync(&db).await.unwrap(), 4);
        assert_eq!(fan_out_media_refresh(&db).await.unwrap(), 1);

        let refresh = claim(&db, &[JobKind::FetchSeriesDetail])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refresh.spec, JobSpec::FetchSeriesDetail { media_id: 430_668 });
    }
}
