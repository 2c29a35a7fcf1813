//! Notification purge job.
//!
//! Deletes read notifications older than the retention period. Unread
//! notifications are kept whatever their age.

use chrono::Duration;
use tracing::debug;

use crate::server::database::{now, Database};

use super::JobError;

/// Delete read notifications created more than `retention_days` ago.
///
/// Returns the number of notifications deleted.
pub async fn run_notification_purge(db: &Database, retention_days: u32) -> Result<u64, JobError> {
    let cutoff = now() - Duration::days(i64::from(retention_days));
    debug!("Purging read notifications created before {}", cutoff);

    Ok(db.purge_read_notifications(cutoff).await?)
}
