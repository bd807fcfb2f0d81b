//! Database configuration and connection pool creation
//!
//! Connecting is an explicit step: build a [`DatabaseConfig`] (usually from
//! the environment), call [`connect`], and hand connections from the pool to
//! the engine.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use crate::error::{DatabaseError, MigrationError, MigrationResult};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_SSL_MODE: &str = "prefer";

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: 30,
            idle_timeout: Some(600), // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
        }
    }
}

/// Where to connect
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionTarget {
    /// A full connection URL, as given by `DATABASE_URL`
    Url(String),
    /// Individual parameters, as given by the `DB_*` variables
    Params {
        host: String,
        port: u16,
        user: Option<String>,
        password: Option<String>,
        database: String,
        ssl_mode: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub target: ConnectionTarget,
    pub pool: PoolConfig,
}

impl DatabaseConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            target: ConnectionTarget::Url(url.into()),
            pool: PoolConfig::default(),
        }
    }

    /// Read the configuration from process environment variables.
    ///
    /// `DATABASE_URL` takes precedence; otherwise the target is assembled
    /// from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and
    /// `DB_SSLMODE`, of which only `DB_NAME` is required.
    pub fn from_env() -> MigrationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DatabaseConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> MigrationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = var("DATABASE_URL") {
            return Ok(Self::from_url(url));
        }

        let database = var("DB_NAME").ok_or_else(|| {
            MigrationError::configuration("DATABASE_URL or DB_NAME must be set")
        })?;

        let port = match var("DB_PORT") {
            Some(port) => port.trim().parse::<u16>().map_err(|_| {
                MigrationError::configuration(format!("DB_PORT '{}' is not a valid port", port))
            })?,
            None => DEFAULT_PORT,
        };

        let ssl_mode = var("DB_SSLMODE").unwrap_or_else(|| DEFAULT_SSL_MODE.to_string());
        PgSslMode::from_str(&ssl_mode).map_err(|_| {
            MigrationError::configuration(format!("DB_SSLMODE '{}' is not a valid SSL mode", ssl_mode))
        })?;

        Ok(Self {
            target: ConnectionTarget::Params {
                host: var("DB_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
                user: var("DB_USER"),
                password: lookup("DB_PASSWORD"),
                database,
                ssl_mode,
            },
            pool: PoolConfig::default(),
        })
    }

    /// Build sqlx connect options for this target
    pub fn connect_options(&self) -> MigrationResult<PgConnectOptions> {
        match &self.target {
            ConnectionTarget::Url(url) => PgConnectOptions::from_str(url).map_err(|e| {
                MigrationError::configuration(format!("invalid DATABASE_URL: {}", e))
            }),
            ConnectionTarget::Params {
                host,
                port,
                user,
                password,
                database,
                ssl_mode,
            } => {
                let ssl_mode = PgSslMode::from_str(ssl_mode).map_err(|_| {
                    MigrationError::configuration(format!("'{}' is not a valid SSL mode", ssl_mode))
                })?;

                let mut options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(database)
                    .ssl_mode(ssl_mode);
                if let Some(user) = user {
                    options = options.username(user);
                }
                if let Some(password) = password {
                    options = options.password(password);
                }
                Ok(options)
            }
        }
    }

    /// Connection target without credentials, for display
    pub fn display_target(&self) -> String {
        match &self.target {
            ConnectionTarget::Url(url) => url.clone(),
            ConnectionTarget::Params {
                host,
                port,
                user,
                database,
                ..
            } => match user {
                Some(user) => format!("postgres://{}@{}:{}/{}", user, host, port, database),
                None => format!("postgres://{}:{}/{}", host, port, database),
            },
        }
    }
}

/// Create a connection pool for the configured database
pub async fn connect(config: &DatabaseConfig) -> MigrationResult<PgPool> {
    let options = config.connect_options()?;
    let pool_config = &config.pool;

    tracing::debug!(
        "Creating database pool with config: max={}, min={}, timeout={}s, idle_timeout={:?}s, max_lifetime={:?}s",
        pool_config.max_connections,
        pool_config.min_connections,
        pool_config.acquire_timeout,
        pool_config.idle_timeout,
        pool_config.max_lifetime
    );

    let mut pool_options = PgPoolOptions::new()
        .max_connections(pool_config.max_connections)
        .min_connections(pool_config.min_connections)
        .acquire_timeout(Duration::from_secs(pool_config.acquire_timeout));

    if let Some(idle_timeout) = pool_config.idle_timeout {
        pool_options = pool_options.idle_timeout(Duration::from_secs(idle_timeout));
    }
    if let Some(max_lifetime) = pool_config.max_lifetime {
        pool_options = pool_options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    let pool = pool_options.connect_with(options).await.map_err(|e| {
        tracing::error!("Failed to create database pool: {}", e);
        MigrationError::Connection {
            source: DatabaseError::from(e),
        }
    })?;

    tracing::debug!("Database pool created with {} max connections", pool_config.max_connections);
    Ok(pool)
}
