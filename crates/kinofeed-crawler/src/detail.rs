use anyhow::Context;
use kinofeed_core::{MediaDetail, MediaKind};

use crate::broker_client::BrokerClient;
use crate::site::SiteClient;

/// Handler for detail-fetch jobs: pull title info and ratings from the
/// site and upsert them into the media library.
///
/// Title info and the audience rating must both answer; the critics
/// rating is best-effort and stays null when unavailable.
pub async fn run(
    broker: &BrokerClient,
    site: &SiteClient,
    kind: MediaKind,
    media_id: i64,
) -> anyhow::Result<()> {
    let info = site
        .title_info(media_id)
        .await
        .context("title info unavailable")?;
    let rating = site
        .rating(media_id)
        .await
        .context("rating unavailable")?;
    let critics_rating = site.critics_rating(media_id).await;

    let detail = MediaDetail {
        id: media_id,
        title: info.title,
        year: info.year,
        other_year: info.other_year,
        poster_url: info.poster_path,
        site_rating: rating.rate,
        critics_rating,
    };
    broker
        .upsert_media(kind, &detail)
        .await
        .context("store media detail")?;
    tracing::info!(%kind, media_id, "media detail stored");
    Ok(())
}
