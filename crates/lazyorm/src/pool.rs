//! Connection pool configuration and construction.

use std::fmt;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde::{Deserialize, Deserializer};
use tokio_postgres::NoTls;

use crate::error::{OrmError, OrmResult};

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_POOL_SIZE: usize = 10;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`create_pool`].
///
/// Deserializes from any serde source; `acquire_timeout` is given in seconds.
///
/// ```ignore
/// let config = PoolConfig::new("localhost", "app", "appdb")
///     .password("secret")
///     .pool_size(20)
///     .acquire_timeout(Duration::from_secs(5));
/// let db = lazyorm::Db::new(lazyorm::create_pool(&config)?);
/// ```
#[derive(Clone, Deserialize)]
pub struct PoolConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// How long `acquire` waits for a free connection.
    #[serde(default = "default_acquire_timeout", deserialize_with = "seconds")]
    pub acquire_timeout: Duration,
    /// Reported to the server as `application_name`.
    #[serde(default = "default_pool_name")]
    pub pool_name: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_acquire_timeout() -> Duration {
    DEFAULT_ACQUIRE_TIMEOUT
}

fn default_pool_name() -> String {
    "lazyorm".to_string()
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("pool_name", &self.pool_name)
            .finish()
    }
}

impl PoolConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: None,
            database: database.into(),
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            pool_name: default_pool_name(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    /// Read `LAZYORM_DB_HOST`, `_PORT`, `_USER`, `_PASSWORD`, `_NAME`, `_POOL_SIZE`,
    /// `_ACQUIRE_TIMEOUT_SECS` and `_POOL_NAME`.
    ///
    /// Load a `.env` file first (e.g. with `dotenvy`) if that is where they live.
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                OrmError::configuration(format!("environment variable {key} is not set"))
            })
        };
        let mut config = Self::new(
            required("LAZYORM_DB_HOST")?,
            required("LAZYORM_DB_USER")?,
            required("LAZYORM_DB_NAME")?,
        );
        if let Some(port) = lookup("LAZYORM_DB_PORT") {
            config.port = parse_var("LAZYORM_DB_PORT", &port)?;
        }
        config.password = lookup("LAZYORM_DB_PASSWORD");
        if let Some(size) = lookup("LAZYORM_DB_POOL_SIZE") {
            config.pool_size = parse_var("LAZYORM_DB_POOL_SIZE", &size)?;
        }
        if let Some(secs) = lookup("LAZYORM_DB_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout =
                Duration::from_secs(parse_var("LAZYORM_DB_ACQUIRE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(name) = lookup("LAZYORM_DB_POOL_NAME") {
            config.pool_name = name;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrmResult<()> {
        for (name, value) in [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(OrmError::configuration(format!("{name} must not be empty")));
            }
        }
        if self.port == 0 {
            return Err(OrmError::configuration("port must not be 0"));
        }
        if self.pool_size == 0 {
            return Err(OrmError::configuration("pool_size must be greater than 0"));
        }
        Ok(())
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.database)
            .application_name(&self.pool_name);
        if let Some(password) = &self.password {
            pg.password(password);
        }
        pg
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> OrmResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| OrmError::configuration(format!("{key} has an invalid value '{raw}'")))
}

fn manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

/// Build a pool from `config`. No connection is opened until the first `acquire`.
pub fn create_pool(config: &PoolConfig) -> OrmResult<Pool> {
    config.validate()?;
    let manager = Manager::from_config(config.pg_config(), NoTls, manager_config());
    let pool = build(manager, config.pool_size, config.acquire_timeout)?;
    tracing::info!(
        target: "lazyorm.sql",
        pool = %config.pool_name,
        host = %config.host,
        database = %config.database,
        size = config.pool_size,
        "connection pool created"
    );
    Ok(pool)
}

/// Build a pool from a `postgres://` URL with default sizing.
pub fn create_pool_from_url(database_url: &str) -> OrmResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| OrmError::configuration(e.to_string()))?;
    let manager = Manager::from_config(pg_config, NoTls, manager_config());
    build(manager, DEFAULT_POOL_SIZE, DEFAULT_ACQUIRE_TIMEOUT)
}

fn build(manager: Manager, max_size: usize, wait: Duration) -> OrmResult<Pool> {
    Pool::builder(manager)
        .max_size(max_size)
        .wait_timeout(Some(wait))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| OrmError::configuration(e.to_string()))
}
