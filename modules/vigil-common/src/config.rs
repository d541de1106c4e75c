use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // NATS
    pub nats_url: String,

    // Google OAuth (refresh-token flow)
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_refresh_token: String,

    // Poll intervals
    pub likes_poll_interval: Duration,
    pub subscriptions_poll_interval: Duration,
    pub watch_poll_interval: Duration,

    // Anomaly guard
    pub anomaly_floor: usize,
    pub anomaly_ratio: f64,

    // Quota backoff
    pub backoff_initial: Duration,
    pub backoff_max: Duration,

    // Upstream fetch
    pub fetch_timeout: Duration,
    pub max_pages: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            google_client_id: required_env("GOOGLE_CLIENT_ID"),
            google_client_secret: required_env("GOOGLE_CLIENT_SECRET"),
            google_refresh_token: required_env("GOOGLE_REFRESH_TOKEN"),
            likes_poll_interval: duration_env("LIKES_POLL_INTERVAL_SECS", 300),
            subscriptions_poll_interval: duration_env("SUBSCRIPTIONS_POLL_INTERVAL_SECS", 600),
            watch_poll_interval: duration_env("WATCH_POLL_INTERVAL_SECS", 900),
            anomaly_floor: parse_env("ANOMALY_FLOOR", 15),
            anomaly_ratio: parse_env("ANOMALY_RATIO", 0.03),
            backoff_initial: duration_env("BACKOFF_INITIAL_SECS", 15 * 60),
            backoff_max: duration_env("BACKOFF_MAX_SECS", 240 * 60),
            fetch_timeout: duration_env("FETCH_TIMEOUT_SECS", 30),
            max_pages: parse_env("MAX_FETCH_PAGES", 20),
        }
    }

    /// Log the non-secret parts of the config, plus whether secrets are set.
    pub fn log_redacted(&self) {
        tracing::info!(
            nats_url = self.nats_url.as_str(),
            database_url_set = !self.database_url.is_empty(),
            google_credentials_set = !self.google_refresh_token.is_empty(),
            likes_poll_secs = self.likes_poll_interval.as_secs(),
            subscriptions_poll_secs = self.subscriptions_poll_interval.as_secs(),
            watch_poll_secs = self.watch_poll_interval.as_secs(),
            anomaly_floor = self.anomaly_floor,
            anomaly_ratio = self.anomaly_ratio,
            backoff_initial_secs = self.backoff_initial.as_secs(),
            backoff_max_secs = self.backoff_max.as_secs(),
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn duration_env(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(parse_env(key, default_secs))
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
