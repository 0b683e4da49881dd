use std::time::Duration;

const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
const DEFAULT_SITE_URL: &str = "https://www.filmweb.pl";
const DEFAULT_SLOTS: u64 = 3;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn env_url(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .and_then(|v| normalize_url(&v))
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

fn secs(value: Option<u64>, min: u64, max: u64, default: u64) -> Duration {
    Duration::from_secs(value.map(|v| v.clamp(min, max)).unwrap_or(default))
}

/// Crawler settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Base URL of the kinofeed server (broker + storage endpoints).
    pub server_url: String,
    /// Base URL of the external media site.
    pub site_url: String,
    /// Number of concurrent worker slots.
    pub slots: usize,
    /// How long an idle slot sleeps between queue polls.
    pub poll_interval: Duration,
    /// Per-request timeout for every outbound HTTP call.
    pub request_timeout: Duration,
}

impl CrawlerConfig {
    pub fn from_env() -> Self {
        CrawlerConfig {
            server_url: env_url("KINOFEED_SERVER_URL", DEFAULT_SERVER_URL),
            site_url: env_url("KINOFEED_SITE_URL", DEFAULT_SITE_URL),
            slots: env_u64("KINOFEED_WORKER_SLOTS")
                .map(|v| v.clamp(1, 16))
                .unwrap_or(DEFAULT_SLOTS) as usize,
            poll_interval: secs(
                env_u64("KINOFEED_POLL_INTERVAL_SECS"),
                1,
                300,
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            request_timeout: secs(
                env_u64("KINOFEED_REQUEST_TIMEOUT_SECS"),
                1,
                600,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
        }
    }
}
