//! Substitution rollover job.
//!
//! Filled cover requests whose date has passed are closed, their accepted
//! invitation becomes `completed` and a `completed` history record is written.
//! Requests that were explicitly marked as a no-show are already closed and
//! are not touched.

use chrono::Utc;
use tracing::debug;

use crate::server::database::{now, Database};

use super::JobError;

/// Close every filled request dated before today.
///
/// Returns the number of requests rolled into the history.
pub async fn run_substitution_rollover(db: &Database) -> Result<u64, JobError> {
    let today = Utc::now().date_naive();
    debug!("Rolling over filled substitution requests before {}", today);

    Ok(db.rollover_filled_requests(today, now()).await?)
}
