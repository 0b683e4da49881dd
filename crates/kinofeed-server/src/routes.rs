use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use kinofeed_core::{
    Job, JobKind, JobSpec, JobStatus, MediaDetail, MediaKind, MediaRecord, NewTracker,
    NewWatchedEntry, Tracker, WatchedEntry,
};
use serde::Deserialize;

use crate::broker;
use crate::error::ApiError;
use crate::library;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/jobs", post(create_job))
        // HEAD must stay side-effect-free, so it gets its own handler
        // instead of axum's HEAD-falls-back-to-GET default.
        .route("/jobs/next", get(claim_next).head(peek_next))
        .route("/jobs/:id/status/:status", get(set_job_status))
        .route("/jobs/fan-out/sync-users", post(fan_out_sync_users))
        .route("/jobs/fan-out/refresh-media", post(fan_out_refresh_media))
        .route("/maintenance/requeue-stuck/:minutes", get(requeue_stuck))
        .route("/maintenance/delete-old/:minutes", get(delete_old))
        .route("/library/trackers", get(list_trackers).post(create_tracker))
        .route("/library/trackers/:user_key", get(get_tracker))
        .route("/library/watched/:kind", post(insert_watched))
        .route("/library/watched/:kind/:user_key", get(watched_for_user))
        .route("/library/media/:kind", put(upsert_media))
        .route("/library/media/:kind/:id", get(get_media))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let spec: JobSpec = serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("bad job spec: {e}")))?;
    let job = broker::create(&state.db, &spec).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
struct NextParams {
    #[serde(default)]
    types: String,
}

fn parse_types(raw: &str) -> Result<Vec<JobKind>, ApiError> {
    let mut kinds = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        kinds.push(part.parse::<JobKind>()?);
    }
    if kinds.is_empty() {
        return Err(ApiError::validation("types must name at least one job type"));
    }
    Ok(kinds)
}

async fn peek_next(
    State(state): State<AppState>,
    Query(params): Query<NextParams>,
) -> Result<StatusCode, ApiError> {
    let kinds = parse_types(&params.types)?;
    if broker::peek(&state.db, &kinds).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::not_found("no queued job matches the requested types"))
    }
}

async fn claim_next(
    State(state): State<AppState>,
    Query(params): Query<NextParams>,
) -> Result<Json<Job>, ApiError> {
    let kinds = parse_types(&params.types)?;
    match broker::claim(&state.db, &kinds).await? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::not_found("no queued job matches the requested types")),
    }
}

async fn set_job_status(
    State(state): State<AppState>,
    Path((id, status)): Path<(i64, String)>,
) -> Result<Json<Job>, ApiError> {
    let status: JobStatus = status.parse()?;
    let job = broker::set_status(&state.db, id, status).await?;
    Ok(Json(job))
}

async fn fan_out_sync_users(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created = broker::fan_out_user_sync(&state.db).await?;
    tracing::info!(created, "fanned out user sync jobs");
    Ok(Json(serde_json::json!({ "created": created })))
}

async fn fan_out_refresh_media(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created = broker::fan_out_media_refresh(&state.db).await?;
    tracing::info!(created, "fanned out media refresh jobs");
    Ok(Json(serde_json::json!({ "created": created })))
}

fn minutes_duration(minutes: i64) -> Result<chrono::Duration, ApiError> {
    if minutes < 0 {
        return Err(ApiError::validation("minutes must not be negative"));
    }
    // chrono caps durations at i64 milliseconds; a wilder value is a client error,
    // not a panic.
    chrono::Duration::try_minutes(minutes)
        .ok_or_else(|| ApiError::validation("minutes out of range"))
}

async fn requeue_stuck(
    State(state): State<AppState>,
    Path(minutes): Path<i64>,
) -> Result<Json<bool>, ApiError> {
    let count = broker::requeue_stuck(&state.db, minutes_duration(minutes)?).await?;
    if count > 0 {
        tracing::info!(count, "requeued stuck jobs");
    }
    Ok(Json(true))
}

async fn delete_old(
    State(state): State<AppState>,
    Path(minutes): Path<i64>,
) -> Result<Json<bool>, ApiError> {
    let count = broker::delete_older_than(&state.db, minutes_duration(minutes)?).await?;
    if count > 0 {
        tracing::info!(count, "deleted old terminal jobs");
    }
    Ok(Json(true))
}

async fn list_trackers(State(state): State<AppState>) -> Result<Json<Vec<Tracker>>, ApiError> {
    Ok(Json(library::list_trackers(&state.db).await?))
}

async fn create_tracker(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let new: NewTracker = serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("bad tracker: {e}")))?;
    let tracker = library::create_tracker(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(tracker)))
}

async fn get_tracker(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
) -> Result<Json<Tracker>, ApiError> {
    Ok(Json(library::get_tracker(&state.db, &user_key).await?))
}

async fn watched_for_user(
    State(state): State<AppState>,
    Path((kind, user_key)): Path<(String, String)>,
) -> Result<Json<Vec<WatchedEntry>>, ApiError> {
    let kind: MediaKind = kind.parse()?;
    Ok(Json(
        library::watched_for_user(&state.db, kind, &user_key).await?,
    ))
}

async fn insert_watched(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: MediaKind = kind.parse()?;
    let new: NewWatchedEntry = serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("bad watched record: {e}")))?;
    let entry = library::insert_watched(&state.db, kind, new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_media(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<MediaRecord>, ApiError> {
    let kind: MediaKind = kind.parse()?;
    Ok(Json(library::get_media(&state.db, kind, id).await?))
}

async fn upsert_media(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<MediaRecord>, ApiError> {
    let kind: MediaKind = kind.parse()?;
    let detail: MediaDetail = serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("bad media detail: {e}")))?;
    Ok(Json(library::upsert_media(&state.db, kind, detail).await?))
}
