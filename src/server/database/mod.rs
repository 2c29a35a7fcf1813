//! Database abstraction over SQLite and Postgres.
//!
//! Queries are written once with numbered `$N` placeholders, which both
//! backends accept, and dispatched to the active pool through [`with_pool!`].
//! Row types mirror the tables created by [`Database::migrate`].

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{error, info, warn};

#[cfg(feature = "sqlite")]
use std::str::FromStr;
#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::{get_config, DatabaseConfig};
use crate::errors::{StaffroomError, StaffroomResult};

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one database backend: `sqlite` or `postgres`");

/// How long a SQLite connection waits for another writer before giving up.
#[cfg(feature = "sqlite")]
const SQLITE_BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Run the same body against whichever pool backs `$db`.
///
/// The body is expanded once per backend, so generic `sqlx` calls type-check
/// against the concrete driver in each arm.
macro_rules! with_pool {
    ($db:expr, $pool:ident => $body:expr) => {
        match $db {
            #[cfg(feature = "sqlite")]
            $crate::server::database::Database::SQLite($pool) => $body,
            #[cfg(feature = "postgres")]
            $crate::server::database::Database::Postgres($pool) => $body,
        }
    };
}

pub mod attendance;
pub mod departments;
pub mod notifications;
mod schema;
pub mod staff;
pub mod substitutions;
pub mod tasks;
pub mod timetable;

pub use attendance::{AttendanceFilter, AttendanceRecord};
pub use departments::Department;
pub use notifications::Notification;
pub use staff::{StaffFilter, StaffMember};
pub use substitutions::{
    AcceptOutcome, CancelOutcome, DropOutcome, HistoryRecord, Invitation, RequestFilter,
    SubstitutionRequest,
};
pub use tasks::{HrTask, TaskFilter};
pub use timetable::{TimetableEntry, TimetableFilter};

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

/// A `LIMIT`/`OFFSET` window over a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const MAX_PER_PAGE: u32 = 200;

    /// Build a window from 1-indexed page numbers, clamping silly values.
    pub fn new(page: u32, per_page: u32) -> Self {
        let per_page = per_page.clamp(1, Self::MAX_PER_PAGE);
        let page = page.max(1);
        Self {
            limit: i64::from(per_page),
            offset: i64::from(page - 1) * i64::from(per_page),
        }
    }
}

impl Database {
    /// Initialize the database connection based on the global configuration.
    ///
    /// Creates missing tables when `database.run_migrations` is set.
    pub async fn new() -> StaffroomResult<Arc<Self>> {
        let config = get_config()?;
        let db = Self::from_config(&config.database).await?;

        if config.database.run_migrations {
            db.migrate().await?;
        }

        Ok(Arc::new(db))
    }

    /// Connect using a database configuration section.
    pub async fn from_config(config: &DatabaseConfig) -> StaffroomResult<Self> {
        let url = match config.db_type.as_str() {
            "postgres" => &config.postgres_url,
            _ => &config.sqlite_url,
        };
        Self::connect(&config.db_type, url, config.max_connections).await
    }

    /// Connect to a specific backend.
    pub async fn connect(db_type: &str, url: &str, max_connections: u32) -> StaffroomResult<Self> {
        match db_type {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let options = SqliteConnectOptions::from_str(url)
                    .map_err(|e| {
                        StaffroomError::ConfigError(format!("invalid SQLite URL '{url}': {e}"))
                    })?
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .busy_timeout(SQLITE_BUSY_TIMEOUT);

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        StaffroomError::DatabaseError(format!("failed to connect to SQLite: {e}"))
                    })?;

                info!("Connected to SQLite at {url}");
                Ok(Database::SQLite(pool))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(StaffroomError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        StaffroomError::DatabaseError(format!(
                            "failed to connect to PostgreSQL: {e}"
                        ))
                    })?;

                info!("Connected to PostgreSQL");
                Ok(Database::Postgres(pool))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(StaffroomError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(StaffroomError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create every table and index that does not exist yet.
    pub async fn migrate(&self) -> StaffroomResult<()> {
        let statements = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => schema::SQLITE,
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => schema::POSTGRES,
        };

        with_pool!(self, pool => {
            for statement in statements {
                sqlx::query(*statement).execute(pool).await.map_err(|e| {
                    error!("Migration statement failed: {e}");
                    StaffroomError::DatabaseError(format!("migration failed: {e}"))
                })?;
            }
            Ok::<(), StaffroomError>(())
        })?;

        info!("Schema is up to date ({} statements)", statements.len());
        Ok(())
    }

    /// Cheap connectivity check for the health endpoint.
    pub async fn ping(&self) -> bool {
        with_pool!(self, pool => sqlx::query("SELECT 1").execute(pool).await.is_ok())
    }

    /// Backend name, as used in configuration.
    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }
}

/// New random identifier for a row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time as stored in timestamp columns.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Log a failed query under `op` and convert it into a crate error.
///
/// Constraint violations are the caller's fault and only warrant a warning.
pub(crate) fn query_failed(op: &'static str) -> impl Fn(sqlx::Error) -> StaffroomError {
    move |e| {
        match &e {
            sqlx::Error::RowNotFound => {}
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation() =>
            {
                warn!("{op} rejected by constraint: {db}");
            }
            _ => error!("{op} failed: {e}"),
        }
        StaffroomError::from(e)
    }
}

/// Total number of pages for a listing.
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}
