use chrono::Utc;
use kinofeed_core::{
    MediaDetail, MediaKind, MediaRecord, NewTracker, NewWatchedEntry, Tracker, WatchedEntry,
    MAX_COMMENT_LEN,
};
use kinofeed_db::entities::{media, trackers, watched_entries};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::error::ApiError;

pub async fn list_trackers(db: &DatabaseConnection) -> Result<Vec<Tracker>, ApiError> {
    let rows = trackers::Entity::find()
        .order_by_asc(trackers::Column::UserKey)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(tracker_from_model).collect())
}

pub async fn get_tracker(db: &DatabaseConnection, user_key: &str) -> Result<Tracker, ApiError> {
    let row = trackers::Entity::find_by_id(user_key.to_string())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("tracker {user_key} does not exist")))?;
    Ok(tracker_from_model(row))
}

pub async fn create_tracker(
    db: &DatabaseConnection,
    new: NewTracker,
) -> Result<Tracker, ApiError> {
    let user_key = new.user_key.trim().to_string();
    if user_key.is_empty() {
        return Err(ApiError::validation("user_key must not be empty"));
    }

    let inserted = trackers::Entity::insert(trackers::ActiveModel {
        user_key: Set(user_key.clone()),
        webhook_url: Set(new.webhook_url),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::columns([trackers::Column::UserKey])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    if inserted == 0 {
        return Err(ApiError::conflict(format!(
            "tracker {user_key} already exists"
        )));
    }
    get_tracker(db, &user_key).await
}

pub async fn watched_for_user(
    db: &DatabaseConnection,
    kind: MediaKind,
    user_key: &str,
) -> Result<Vec<WatchedEntry>, ApiError> {
    let rows = watched_entries::Entity::find()
        .filter(watched_entries::Column::UserKey.eq(user_key))
        .filter(watched_entries::Column::Kind.eq(kind.as_str()))
        .order_by_desc(watched_entries::Column::WatchedAt)
        .all(db)
        .await?;
    rows.into_iter().map(watched_from_model).collect()
}

/// Records one watched item for a tracked user. The media row is stubbed
/// first when the id has never been seen; a `(user_key, kind, media_id)`
/// duplicate is a conflict, never an overwrite.
pub async fn insert_watched(
    db: &DatabaseConnection,
    kind: MediaKind,
    new: NewWatchedEntry,
) -> Result<WatchedEntry, ApiError> {
    if trackers::Entity::find_by_id(new.user_key.clone())
        .one(db)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "tracker {} does not exist",
            new.user_key
        )));
    }
    if let Some(comment) = &new.comment {
        if comment.chars().count() > MAX_COMMENT_LEN {
            return Err(ApiError::validation(format!(
                "comment exceeds {MAX_COMMENT_LEN} characters"
            )));
        }
    }

    ensure_media_stub(db, kind, new.media_id).await?;

    let inserted = watched_entries::Entity::insert(watched_entries::ActiveModel {
        user_key: Set(new.user_key.clone()),
        kind: Set(kind.as_str().to_string()),
        media_id: Set(new.media_id),
        rating: Set(new.rating),
        comment: Set(new.comment.clone()),
        favorite: Set(new.favorite),
        watched_at: Set(new.watched_at.into()),
    })
    .on_conflict(
        OnConflict::columns([
            watched_entries::Column::UserKey,
            watched_entries::Column::Kind,
            watched_entries::Column::MediaId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    if inserted == 0 {
        return Err(ApiError::conflict(format!(
            "{} {} already recorded for {}",
            kind, new.media_id, new.user_key
        )));
    }

    Ok(WatchedEntry {
        user_key: new.user_key,
        kind,
        media_id: new.media_id,
        rating: new.rating,
        comment: new.comment,
        favorite: new.favorite,
        watched_at: new.watched_at,
    })
}

pub async fn get_media(
    db: &DatabaseConnection,
    kind: MediaKind,
    id: i64,
) -> Result<MediaRecord, ApiError> {
    let row = media::Entity::find_by_id((kind.as_str().to_string(), id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{kind} {id} does not exist")))?;
    media_from_model(row)
}

/// Inserts or fully replaces the detail columns of one media row.
pub async fn upsert_media(
    db: &DatabaseConnection,
    kind: MediaKind,
    detail: MediaDetail,
) -> Result<MediaRecord, ApiError> {
    media::Entity::insert(media::ActiveModel {
        kind: Set(kind.as_str().to_string()),
        id: Set(detail.id),
        title: Set(detail.title),
        year: Set(detail.year),
        other_year: Set(detail.other_year),
        poster_url: Set(detail.poster_url),
        site_rating: Set(detail.site_rating),
        critics_rating: Set(detail.critics_rating),
        updated_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::columns([media::Column::Kind, media::Column::Id])
            .update_columns([
                media::Column::Title,
                media::Column::Year,
                media::Column::OtherYear,
                media::Column::PosterUrl,
                media::Column::SiteRating,
                media::Column::CriticsRating,
                media::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    get_media(db, kind, detail.id).await
}

/// Makes sure a media row exists for the id, inserting an all-null stub
/// when it does not. Existing detail is left untouched.
async fn ensure_media_stub(
    db: &DatabaseConnection,
    kind: MediaKind,
    id: i64,
) -> Result<(), ApiError> {
    let stub = MediaDetail::stub(id);
    media::Entity::insert(media::ActiveModel {
        kind: Set(kind.as_str().to_string()),
        id: Set(stub.id),
        title: Set(stub.title),
        year: Set(stub.year),
        other_year: Set(stub.other_year),
        poster_url: Set(stub.poster_url),
        site_rating: Set(stub.site_rating),
        critics_rating: Set(stub.critics_rating),
        updated_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::columns([media::Column::Kind, media::Column::Id])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    Ok(())
}

fn tracker_from_model(model: trackers::Model) -> Tracker {
    Tracker {
        user_key: model.user_key,
        webhook_url: model.webhook_url,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn watched_from_model(model: watched_entries::Model) -> Result<WatchedEntry, ApiError> {
    let kind: MediaKind = model
        .kind
        .parse()
        .map_err(|e| ApiError::Corrupt(format!("watched row for {}: {e}", model.user_key)))?;
    Ok(WatchedEntry {
        user_key: model.user_key,
        kind,
        media_id: model.media_id,
        rating: model.rating,
        comment: model.comment,
        favorite: model.favorite,
        watched_at: model.watched_at.with_timezone(&Utc),
    })
}

fn media_from_model(model: media::Model) -> Result<MediaRecord, ApiError> {
    let kind: MediaKind = model
        .kind
        .parse()
        .map_err(|e| ApiError::Corrupt(format!("media row {}: {e}", model.id)))?;
    Ok(MediaRecord {
        kind,
        detail: MediaDetail {
            id: model.id,
            title: model.title,
            year: model.year,
            other_year: model.other_year,
            poster_url: model.poster_url,
            site_rating: model.site_rating,
            critics_rating: model.critics_rating,
        },
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
