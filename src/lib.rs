//! Staffroom - typed REST services for school staff operations
//!
//! Departments, the staff directory, timetable, attendance, HR tasks and
//! notifications over one relational schema, plus the substitution cover
//! workflow: a request fans out to per-candidate invitations, the first
//! acceptance wins and disables the rest, a drop reopens the request, and
//! closed covers roll into a history that tracks no-shows.
//!
//! # Features
//!
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//! - `background-jobs` - Scheduled rollover, expiry and purge jobs.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (sqlite)
//! staffroom = { path = "." }
//!
//! # PostgreSQL with scheduled jobs
//! staffroom = { path = ".", features = ["postgres", "background-jobs"] }
//! ```

#[macro_use]
mod macros;

// Domain modules (no I/O)
pub mod attendance;
pub mod config;
pub mod errors;
pub mod notification;
pub mod roles;
pub mod schedule;
pub mod substitution;
pub mod tasks;

// HTTP service and persistence
pub mod server;

// Scheduled maintenance (requires "background-jobs" feature)
#[cfg(feature = "background-jobs")]
pub mod jobs;
