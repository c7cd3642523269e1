//! Database connection pool management
//!
//! Provides unified database pool creation and configuration for all services

mod metrics;

use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use metrics::update_pool_metrics;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub use deadpool_postgres::PoolError;

pub type PgPool = Pool;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidUrl(String),

    #[error("failed to build pool: {0}")]
    Build(String),

    #[error("database connection verification failed: {0}")]
    Connect(String),

    #[error("database connection verification timed out after {0}s")]
    Timeout(u64),
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 16,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DbConfig {
    /// Build a DbConfig from `DB_*` environment variables.
    ///
    /// `database_url` is passed in by the caller, which owns `DATABASE_URL`.
    pub fn from_env(service_name: &str, database_url: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            database_url: database_url.to_string(),
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs),
        }
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            "Database Pool Configuration: max_connections={}, connect_timeout={}s, acquire_timeout={}s",
            self.max_connections, self.connect_timeout_secs, self.acquire_timeout_secs
        );
    }
}

/// Build a deadpool-postgres pool and verify one connection before returning it.
pub async fn create_pool(config: DbConfig) -> Result<PgPool, DbPoolError> {
    debug!(
        "Creating database pool: service={}, max={}, acquire_timeout={}s",
        config.service_name, config.max_connections, config.acquire_timeout_secs
    );

    let pg_config: PgConfig = config
        .database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| DbPoolError::InvalidUrl(e.to_string()))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(config.max_connections as usize)
        .wait_timeout(Some(Duration::from_secs(config.acquire_timeout_secs)))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| DbPoolError::Build(e.to_string()))?;

    let verify = async {
        let client = pool
            .get()
            .await
            .map_err(|e| DbPoolError::Connect(e.to_string()))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DbPoolError::Connect(e.to_string()))?;
        Ok::<(), DbPoolError>(())
    };

    match tokio::time::timeout(Duration::from_secs(config.connect_timeout_secs), verify).await {
        Ok(Ok(())) => {
            info!(
                service = %config.service_name,
                "Database pool created and verified successfully"
            );

            update_pool_metrics(&pool, &config.service_name);
            {
                let pool_clone = pool.clone();
                let service = config.service_name.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(30));
                    loop {
                        interval.tick().await;
                        update_pool_metrics(&pool_clone, &service);
                    }
                });
            }

            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(e)
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(DbPoolError::Timeout(config.connect_timeout_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.acquire_timeout_secs, 10);
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_overrides() {
        std::env::set_var("DB_MAX_CONNECTIONS", "4");
        std::env::remove_var("DB_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("DB_ACQUIRE_TIMEOUT_SECS");

        let config = DbConfig::from_env("conversation-service", "postgres://localhost/test");
        assert_eq!(config.service_name, "conversation-service");
        assert_eq!(config.database_url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.connect_timeout_secs, 5);

        std::env::remove_var("DB_MAX_CONNECTIONS");
    }

    #[test]
    #[serial_test::serial]
    fn test_config_ignores_unparseable_values() {
        std::env::set_var("DB_MAX_CONNECTIONS", "lots");
        let config = DbConfig::from_env("svc", "postgres://localhost/test");
        assert_eq!(config.max_connections, 16);
        std::env::remove_var("DB_MAX_CONNECTIONS");
    }

    #[tokio::test]
    async fn test_create_pool_rejects_invalid_url() {
        let config = DbConfig {
            database_url: "not a url ::".to_string(),
            ..DbConfig::default()
        };
        let err = create_pool(config).await.unwrap_err();
        assert!(matches!(err, DbPoolError::InvalidUrl(_)));
    }
}
