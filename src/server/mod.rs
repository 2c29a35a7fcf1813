//! HTTP service for staff operations.
//!
//! This module contains:
//! - `database`      → DB abstraction over SQLite/Postgres, schema and queries
//! - `handlers`      → Shared state, paging and the health handler
//! - `routes`        → Router builder
//! - `auth`          → JWT validation and the `Caller` extractor
//! - `api_error`     → Uniform JSON error responses
//! - `logging`       → Request logging middleware and domain events
//! - `validation`    → Request validation utilities
//! - `departments`, `staff`, `notifications`, `timetable`, `attendance`,
//!   `hr_tasks`, `substitutions` → one handler module per service

pub mod api_error;
pub mod attendance;
pub mod auth;
pub mod database;
pub mod departments;
pub mod handlers;
pub mod hr_tasks;
pub mod logging;
pub mod notifications;
pub mod routes;
pub mod staff;
pub mod substitutions;
pub mod timetable;
pub mod validation;

pub use api_error::{ApiError, ErrorCode};
pub use auth::{AuthError, AuthState, Caller, Claims, JwtValidator};
pub use database::Database;
pub use handlers::{AppState, Paginated};
pub use notifications::{notify, notify_many, Outgoing};
pub use routes::build_router;
pub use validation::{ValidationError, ValidationResult};
