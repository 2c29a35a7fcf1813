//! Request expiry job.
//!
//! Open cover requests whose date has passed can no longer be filled. They
//! move to `expired` and their pending invitations are disabled.

use chrono::Utc;
use tracing::debug;

use crate::server::database::{now, Database};

use super::JobError;

/// Expire every open request dated before today.
///
/// Returns the number of requests expired.
pub async fn run_request_expiry(db: &Database) -> Result<u64, JobError> {
    let today = Utc::now().date_naive();
    debug!("Expiring open substitution requests before {}", today);

    Ok(db.expire_open_requests(today, now()).await?)
}
