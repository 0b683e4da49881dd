use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://kinofeed.db?mode=rwc";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3 * 60;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_GC_INTERVAL_SECS: u64 = 20 * 60;
const DEFAULT_STUCK_AFTER_MINS: u64 = 5;
const DEFAULT_RETENTION_MINS: u64 = 20;

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

fn secs(value: Option<u64>, min: u64, max: u64, default: u64) -> Duration {
    Duration::from_secs(value.map(|v| v.clamp(min, max)).unwrap_or(default))
}

fn mins(value: Option<u64>, min: u64, max: u64, default: u64) -> u64 {
    value.map(|v| v.clamp(min, max)).unwrap_or(default)
}

/// Server settings, read from the environment once at startup and handed to
/// each component explicitly.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    /// How often a sync job pair is fanned out per tracker.
    pub sync_interval: Duration,
    /// How often a detail-refresh job is fanned out per known media row.
    pub refresh_interval: Duration,
    /// How often stuck RUNNING jobs are requeued.
    pub maintenance_interval: Duration,
    /// How often terminal jobs past retention are deleted.
    pub gc_interval: Duration,
    /// A RUNNING job older than this is considered stuck.
    pub stuck_after_mins: u64,
    /// Terminal jobs are kept this long before GC.
    pub retention_mins: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        ServerConfig {
            database_url: env_string("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            port: env_u64("KINOFEED_PORT")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(DEFAULT_PORT),
            sync_interval: secs(
                env_u64("KINOFEED_SYNC_INTERVAL_SECS"),
                10,
                24 * 60 * 60,
                DEFAULT_SYNC_INTERVAL_SECS,
            ),
            refresh_interval: secs(
                env_u64("KINOFEED_REFRESH_INTERVAL_SECS"),
                60,
                7 * 24 * 60 * 60,
                DEFAULT_REFRESH_INTERVAL_SECS,
            ),
            maintenance_interval: secs(
                env_u64("KINOFEED_MAINTENANCE_INTERVAL_SECS"),
                10,
                24 * 60 * 60,
                DEFAULT_MAINTENANCE_INTERVAL_SECS,
            ),
            gc_interval: secs(
                env_u64("KINOFEED_GC_INTERVAL_SECS"),
                10,
                24 * 60 * 60,
                DEFAULT_GC_INTERVAL_SECS,
            ),
            stuck_after_mins: mins(
                env_u64("KINOFEED_STUCK_AFTER_MINS"),
                1,
                24 * 60,
                DEFAULT_STUCK_AFTER_MINS,
            ),
            retention_mins: mins(
                env_u64("KINOFEED_RETENTION_MINS"),
                1,
                30 * 24 * 60,
                DEFAULT_RETENTION_MINS,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_clamps_and_defaults() {
        assert_eq!(secs(None, 10, 100, 30), Duration::from_secs(30));
        assert_eq!(secs(Some(5), 10, 100, 30), Duration::from_secs(10));
        assert_eq!(secs(Some(500), 10, 100, 30), Duration::from_secs(100));
        assert_eq!(secs(Some(60), 10, 100, 30), Duration::from_secs(60));
    }

    #[test]
    fn mins_clamps_and_defaults() {
        assert_eq!(mins(None, 1, 60, 5), 5);
        assert_eq!(mins(Some(0), 1, 60, 5), 1);
        assert_eq!(mins(Some(120), 1, 60, 5), 60);
    }
}
