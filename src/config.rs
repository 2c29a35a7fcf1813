//! Configuration system for Staffroom.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `STAFFROOM_SERVER_HOST` - Server bind address
//! - `STAFFROOM_SERVER_PORT` - Server port
//! - `STAFFROOM_DATABASE_TYPE` - `sqlite` or `postgres`
//! - `STAFFROOM_DATABASE_URL` - Database connection URL (routed by scheme)
//! - `STAFFROOM_LOGGING_ENABLED` - Enable the tracing subscriber
//! - `STAFFROOM_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `STAFFROOM_AUTH_ENABLED` - Require bearer JWTs on API calls
//! - `STAFFROOM_JWT_SECRET` - JWT secret key for signing/validation
//! - `STAFFROOM_JWT_ISSUER` - JWT issuer claim
//! - `STAFFROOM_JWT_AUDIENCE` - JWT audience claim
//! - `STAFFROOM_TOKEN_EXPIRATION_SECS` - Token expiration time in seconds
//! - `STAFFROOM_MAX_CANDIDATES` - Maximum invitations per substitution request
//! - `STAFFROOM_JOBS_ENABLED` - Start the background job scheduler

use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{StaffroomError, StaffroomResult};

/// Global configuration singleton.
static CONFIG: OnceLock<StaffroomConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaffroomConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub substitutions: SubstitutionConfig,
    pub jobs: JobsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    pub sqlite_url: String,
    pub postgres_url: String,
    /// Pool size
    pub max_connections: u32,
    /// Create missing tables on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://staffroom.db".to_string(),
            postgres_url: "postgres://localhost/staffroom".to_string(),
            max_connections: 5,
            run_migrations: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// JWT authentication configuration.
///
/// When disabled, every request acts as the built-in administrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// JWT secret key (use `env:VAR_NAME` to read from environment)
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Token expiration time in seconds (default: 1 hour)
    pub token_expiration_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: String::new(),
            jwt_issuer: "staffroom".to_string(),
            jwt_audience: "staffroom-api".to_string(),
            token_expiration_secs: 3600,
        }
    }
}

/// Substitution workflow tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubstitutionConfig {
    /// Upper bound on invitations attached to one request
    pub max_candidates: u32,
    /// Put disabled invitations back to pending when the accepted substitute drops out
    pub reactivate_on_drop: bool,
    /// Staff with at least this many no-shows are left out of suggestions
    pub no_show_exclusion_threshold: u32,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            max_candidates: 20,
            reactivate_on_drop: true,
            no_show_exclusion_threshold: 3,
        }
    }
}

/// Background job schedules (six-field cron expressions).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub enabled: bool,
    pub rollover_cron: String,
    pub expiry_cron: String,
    pub purge_cron: String,
    /// Read notifications older than this are purged
    pub notification_retention_days: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rollover_cron: "0 5 * * * *".to_string(),
            expiry_cron: "0 20 * * * *".to_string(),
            purge_cron: "0 0 4 * * *".to_string(),
            notification_retention_days: 30,
        }
    }
}

fn config_error(e: config::ConfigError) -> StaffroomError {
    StaffroomError::ConfigError(e.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let defaults = StaffroomConfig::default();

    builder
        .set_default("server.host", defaults.server.host)?
        .set_default("server.port", i64::from(defaults.server.port))?
        .set_default("database.db_type", defaults.database.db_type)?
        .set_default("database.sqlite_url", defaults.database.sqlite_url)?
        .set_default("database.postgres_url", defaults.database.postgres_url)?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("database.run_migrations", defaults.database.run_migrations)?
        .set_default("logging.enabled", defaults.logging.enabled)?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("auth.enabled", defaults.auth.enabled)?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret)?
        .set_default("auth.jwt_issuer", defaults.auth.jwt_issuer)?
        .set_default("auth.jwt_audience", defaults.auth.jwt_audience)?
        .set_default(
            "auth.token_expiration_secs",
            defaults.auth.token_expiration_secs as i64,
        )?
        .set_default(
            "substitutions.max_candidates",
            i64::from(defaults.substitutions.max_candidates),
        )?
        .set_default(
            "substitutions.reactivate_on_drop",
            defaults.substitutions.reactivate_on_drop,
        )?
        .set_default(
            "substitutions.no_show_exclusion_threshold",
            i64::from(defaults.substitutions.no_show_exclusion_threshold),
        )?
        .set_default("jobs.enabled", defaults.jobs.enabled)?
        .set_default("jobs.rollover_cron", defaults.jobs.rollover_cron)?
        .set_default("jobs.expiry_cron", defaults.jobs.expiry_cron)?
        .set_default("jobs.purge_cron", defaults.jobs.purge_cron)?
        .set_default(
            "jobs.notification_retention_days",
            i64::from(defaults.jobs.notification_retention_days),
        )
}

fn with_env_overrides(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let database_url = env::var("STAFFROOM_DATABASE_URL").ok();

    builder
        .set_override_option("server.host", env::var("STAFFROOM_SERVER_HOST").ok())?
        .set_override_option("server.port", env_parsed::<i64>("STAFFROOM_SERVER_PORT"))?
        .set_override_option(
            "database.db_type",
            env::var("STAFFROOM_DATABASE_TYPE").ok(),
        )?
        .set_override_option(
            "database.sqlite_url",
            database_url
                .clone()
                .filter(|url| url.starts_with("sqlite")),
        )?
        .set_override_option(
            "database.postgres_url",
            database_url.filter(|url| url.starts_with("postgres")),
        )?
        .set_override_option(
            "logging.enabled",
            env_parsed::<bool>("STAFFROOM_LOGGING_ENABLED"),
        )?
        .set_override_option("logging.level", env::var("STAFFROOM_LOG_LEVEL").ok())?
        .set_override_option("auth.enabled", env_parsed::<bool>("STAFFROOM_AUTH_ENABLED"))?
        .set_override_option("auth.jwt_secret", env::var("STAFFROOM_JWT_SECRET").ok())?
        .set_override_option("auth.jwt_issuer", env::var("STAFFROOM_JWT_ISSUER").ok())?
        .set_override_option(
            "auth.jwt_audience",
            env::var("STAFFROOM_JWT_AUDIENCE").ok(),
        )?
        .set_override_option(
            "auth.token_expiration_secs",
            env_parsed::<i64>("STAFFROOM_TOKEN_EXPIRATION_SECS"),
        )?
        .set_override_option(
            "substitutions.max_candidates",
            env_parsed::<i64>("STAFFROOM_MAX_CANDIDATES"),
        )?
        .set_override_option("jobs.enabled", env_parsed::<bool>("STAFFROOM_JOBS_ENABLED"))
}

impl StaffroomConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    ///
    /// Later sources override earlier ones. The result is not validated; see
    /// [`StaffroomConfig::validate`].
    pub fn load() -> StaffroomResult<Self> {
        let builder = with_defaults(Config::builder()).map_err(config_error)?;
        let builder = builder.add_source(config::File::with_name("config").required(false));
        let builder = with_env_overrides(builder).map_err(config_error)?;

        let settings = builder
            .build()
            .map_err(|e| StaffroomError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| StaffroomError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StaffroomResult<()> {
        if self.server.port == 0 {
            return Err(StaffroomError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(StaffroomError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(StaffroomError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(StaffroomError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if self.auth.enabled && self.auth.jwt_secret.is_empty() {
            return Err(StaffroomError::ConfigError(
                "auth.jwt_secret is required when auth.enabled is true".to_string(),
            ));
        }

        if self.substitutions.max_candidates == 0 {
            return Err(StaffroomError::ConfigError(
                "substitutions.max_candidates must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The connection URL matching `database.db_type`.
    pub fn database_url(&self) -> &str {
        match self.database.db_type.as_str() {
            "postgres" => &self.database.postgres_url,
            _ => &self.database.sqlite_url,
        }
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> StaffroomResult<&'static StaffroomConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = StaffroomConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is valid.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| StaffroomError::ConfigError("configuration not initialized".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
pub fn init_config() -> StaffroomResult<&'static StaffroomConfig> {
    get_config()
}
