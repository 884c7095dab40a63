//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `NOTESD_CONFIG`
//! environment variable. A missing file is not an error; every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `NOTESD_` override YAML values
//! 3. **DB_PROVIDER / DB_CONNECTION_STRING** - Special case: override `database.provider` and
//!    `database.connection_string` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `NOTESD_DATABASE__POOL__MAX_CONNECTIONS=4` sets `database.pool.max_connections`.
//!
//! ## Database selection
//!
//! Only the `Sqlite` provider is supported (matched case-insensitively). Any other provider makes
//! [`Config::load`] fail with an error naming the provider and the supported set, so the process
//! never starts against an unknown backend.
//!
//! Connection strings are accepted in two forms:
//!
//! - ADO-style key/value pairs: `Data Source=notes.db;Mode=ReadWriteCreate`
//! - SQLx URLs: `sqlite://notes.db?mode=rwc`, `sqlite::memory:`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! NOTESD_PORT=8080
//!
//! # Select the database (preferred method)
//! DB_PROVIDER=Sqlite
//! DB_CONNECTION_STRING="Data Source=/var/lib/notesd/notes.db"
//!
//! # Or use the prefixed form
//! NOTESD_DATABASE__CONNECTION_STRING="sqlite:///var/lib/notesd/notes.db"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use std::{fmt, str::FromStr, time::Duration};

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "NOTESD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Storage provider and connection settings
    pub database: DatabaseConfig,
    /// Environment only: filled from `DB_PROVIDER` and folded into `database` on load.
    /// Not part of the file format.
    #[serde(skip_serializing)]
    pub db_provider: Option<String>,
    /// Environment only: filled from `DB_CONNECTION_STRING` and folded into `database` on load.
    /// Not part of the file format.
    #[serde(skip_serializing)]
    pub db_connection_string: Option<String>,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database: DatabaseConfig::default(),
            db_provider: None,
            db_connection_string: None,
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

/// Storage provider selection and connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Provider name, e.g. "Sqlite"
    pub provider: String,
    /// Provider-specific connection string
    pub connection_string: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            provider: DatabaseProvider::Sqlite.to_string(),
            connection_string: "Data Source=notes.db".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the configured provider name
    pub fn provider(&self) -> Result<DatabaseProvider, Error> {
        self.provider.parse()
    }

    /// Build SQLite connect options from the connection string.
    ///
    /// Foreign keys are always enforced, since note deletion cascades through them.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions, Error> {
        let raw = self.connection_string.trim();
        let options = if raw.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(raw).map_err(|e| Error::InvalidConnectionString { message: e.to_string() })?;
            // Match the key/value form: create the file unless the URL pins a mode
            if raw.contains("mode=") { options } else { options.create_if_missing(true) }
        } else {
            parse_key_value_connection_string(raw)?
        };
        Ok(options.foreign_keys(true))
    }
}

/// Parse `Data Source=...;Mode=...` style connection strings.
fn parse_key_value_connection_string(raw: &str) -> Result<SqliteConnectOptions, Error> {
    let invalid = |message: String| Error::InvalidConnectionString { message };

    let mut data_source = None;
    let mut mode = None;
    let mut busy_timeout = None;

    for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected `key=value`, got `{pair}`")))?;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "data source" | "datasource" | "filename" => data_source = Some(value.to_string()),
            "mode" => mode = Some(value.to_ascii_lowercase()),
            "default timeout" | "command timeout" => {
                let secs: u64 = value.parse().map_err(|_| invalid(format!("`{key}` must be a number of seconds")))?;
                busy_timeout = Some(Duration::from_secs(secs));
            }
            other => return Err(invalid(format!("unsupported keyword `{other}`"))),
        }
    }

    let data_source = data_source.ok_or_else(|| invalid("missing `Data Source`".to_string()))?;

    let mut options = match mode.as_deref() {
        Some("memory") => SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| invalid(e.to_string()))?,
        _ if data_source == ":memory:" => SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| invalid(e.to_string()))?,
        None | Some("readwritecreate") => SqliteConnectOptions::new().filename(&data_source).create_if_missing(true),
        Some("readwrite") => SqliteConnectOptions::new().filename(&data_source),
        Some("readonly") => SqliteConnectOptions::new().filename(&data_source).read_only(true),
        Some(other) => return Err(invalid(format!("unsupported mode `{other}`"))),
    };

    if let Some(timeout) = busy_timeout {
        options = options.busy_timeout(timeout);
    }
    Ok(options)
}

/// Storage providers this build supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProvider {
    Sqlite,
}

impl DatabaseProvider {
    pub const ALL: &'static [DatabaseProvider] = &[DatabaseProvider::Sqlite];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseProvider::Sqlite => "Sqlite",
        }
    }
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnsupportedProvider {
                provider: s.to_string(),
                supported: Self::ALL.iter().map(|p| p.as_str()).collect(),
            })
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // DB_PROVIDER / DB_CONNECTION_STRING win over anything in the file
        if let Some(provider) = config.db_provider.take() {
            config.database.provider = provider;
        }
        if let Some(connection_string) = config.db_connection_string.take() {
            config.database.connection_string = connection_string;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Fail fast on settings the server cannot start with
    pub fn validate(&self) -> Result<(), Error> {
        self.database.provider()?;
        self.database.connect_options()?;

        if self.database.pool.max_connections == 0 {
            return Err(Error::Other(anyhow::anyhow!(
                "Config validation: database.pool.max_connections must be at least 1"
            )));
        }
        if self.database.pool.min_connections > self.database.pool.max_connections {
            return Err(Error::Other(anyhow::anyhow!(
                "Config validation: database.pool.min_connections ({}) cannot exceed max_connections ({})",
                self.database.pool.min_connections,
                self.database.pool.max_connections
            )));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("NOTESD_").ignore(&["config"]).split("__"))
            // Unprefixed database selection variables
            .merge(Env::raw().only(&["DB_PROVIDER", "DB_CONNECTION_STRING"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
