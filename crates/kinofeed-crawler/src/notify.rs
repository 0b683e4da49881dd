use anyhow::Context;
use kinofeed_core::{MediaKind, MediaRecord};

use crate::broker_client::BrokerClient;

/// Handler for notification jobs: announce one watched item on the
/// tracker's webhook.
///
/// A tracker without a webhook completes with nothing sent. A tracker or
/// media row that is missing entirely is an error; the job that should
/// have created them has not run.
pub async fn run(
    broker: &BrokerClient,
    client: &reqwest::Client,
    user: &str,
    kind: MediaKind,
    media_id: i64,
) -> anyhow::Result<()> {
    let tracker = broker
        .tracker(user)
        .await?
        .with_context(|| format!("tracker {user} not found"))?;
    let media = broker
        .media(kind, media_id)
        .await?
        .with_context(|| format!("media {kind}/{media_id} not found"))?;

    let Some(webhook_url) = tracker.webhook_url else {
        tracing::info!(user, %kind, media_id, "tracker has no webhook, nothing to send");
        return Ok(());
    };

    let message = render_message(user, &media);
    client
        .post(&webhook_url)
        .json(&serde_json::json!({ "content": message }))
        .send()
        .await
        .context("deliver webhook")?
        .error_for_status()
        .context("deliver webhook (status)")?;
    tracing::info!(user, %kind, media_id, "notification delivered");
    Ok(())
}

/// One-line announcement for the webhook. Falls back gracefully when the
/// detail fetch has not filled the title in yet.
pub fn render_message(user: &str, media: &MediaRecord) -> String {
    let title = media.detail.title.as_deref().unwrap_or("an unknown title");
    match media.detail.year {
        Some(year) => format!("{user} watched {title} ({year})"),
        None => format!("{user} watched {title}"),
    }
}
