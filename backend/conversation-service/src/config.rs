use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which persistence backend the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local maps. Used by tests and single-node demos.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!("unknown STORE_BACKEND '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// Upper bound on events returned by one fetch
    pub max_batch: usize,
    /// Longest a long-poll request may block
    pub long_poll_max_wait: Duration,
    /// Keep-alive interval for idle SSE streams
    pub stream_idle: Duration,
}

#[derive(Debug, Clone)]
pub struct JobsConfig {
    pub interest_expiry_days: i64,
    pub interest_expiry_interval: Duration,
    pub match_reconcile_interval: Duration,
    pub match_reconcile_batch: usize,
    pub idle_evict_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub port: u16,
    pub jwt_secret: String,
    pub events: EventsConfig,
    pub receipt_queue_capacity: usize,
    pub typing_events_per_minute: u32,
    pub jobs: JobsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let store_backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse::<StoreBackend>()?;

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL missing".into()));
        }

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.len() < 16 {
            return Err(AppError::Config(
                "JWT_SECRET must be at least 16 bytes".into(),
            ));
        }

        Ok(Self {
            store_backend,
            database_url,
            port: env_or("PORT", 8080),
            jwt_secret,
            events: EventsConfig {
                max_batch: env_or("EVENTS_MAX_BATCH", 100usize).max(1),
                long_poll_max_wait: Duration::from_millis(env_or(
                    "EVENTS_LONG_POLL_MAX_WAIT_MS",
                    25_000,
                )),
                stream_idle: Duration::from_millis(env_or("EVENTS_STREAM_IDLE_MS", 15_000).max(100)),
            },
            receipt_queue_capacity: env_or("RECEIPT_QUEUE_CAPACITY", 1024usize).max(1),
            typing_events_per_minute: env_or("TYPING_EVENTS_PER_MINUTE", 30),
            jobs: JobsConfig {
                interest_expiry_days: env_or("INTEREST_EXPIRY_DAYS", 30),
                interest_expiry_interval: job_interval("INTEREST_EXPIRY_INTERVAL_SECS", 3600),
                match_reconcile_interval: job_interval("MATCH_RECONCILE_INTERVAL_SECS", 300),
                match_reconcile_batch: env_or("MATCH_RECONCILE_BATCH", 200usize).max(1),
                idle_evict_interval: job_interval("IDLE_EVICT_INTERVAL_SECS", 60),
            },
        })
    }

    /// Defaults with an in-memory store, for tests and local demos.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            port: 8080,
            jwt_secret: jwt_secret.into(),
            events: EventsConfig {
                max_batch: 100,
                long_poll_max_wait: Duration::from_millis(25_000),
                stream_idle: Duration::from_millis(15_000),
            },
            receipt_queue_capacity: 1024,
            typing_events_per_minute: 30,
            jobs: JobsConfig {
                interest_expiry_days: 30,
                interest_expiry_interval: Duration::from_secs(3600),
                match_reconcile_interval: Duration::from_secs(300),
                match_reconcile_batch: 200,
                idle_evict_interval: Duration::from_secs(60),
            },
        }
    }
}

/// Parse an env var, falling back to `default` when unset or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Job period in whole seconds, never below one second.
fn job_interval(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(key, default_secs).max(1))
}
