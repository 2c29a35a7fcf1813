//! Background job scheduler for Staffroom.
//!
//! Scheduled maintenance for the substitution workflow and notifications.
//! Requires the `background-jobs` feature to be enabled.
//!
//! # Available Jobs
//!
//! - **Substitution Rollover**: Closes filled cover requests whose date has
//!   passed and records them as completed in the history
//!
//! - **Request Expiry**: Expires open cover requests whose date has passed
//!   and disables their pending invitations
//!
//! - **Notification Purge**: Deletes read notifications older than the
//!   retention period
//!
//! # Usage
//!
//! ```rust,ignore
//! use staffroom::jobs::{JobScheduler, JobConfig};
//! use staffroom::server::Database;
//!
//! let db = Database::new().await?;
//! let scheduler = JobScheduler::new(db, JobConfig::from(&config.jobs)).await?;
//! scheduler.start().await?;
//! ```

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::{error, info};

use crate::config::JobsConfig;
use crate::server::database::Database;

mod notification_purge;
mod request_expiry;
mod substitution_rollover;

pub use notification_purge::run_notification_purge;
pub use request_expiry::run_request_expiry;
pub use substitution_rollover::run_substitution_rollover;

/// Configuration for background jobs.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Cron expression for the substitution rollover (default: every hour at minute 5)
    pub rollover_cron: String,
    /// Cron expression for request expiry (default: every hour at minute 20)
    pub expiry_cron: String,
    /// Cron expression for the notification purge (default: daily at 4 AM)
    pub purge_cron: String,
    /// Read notifications older than this many days are purged (default: 30)
    pub notification_retention_days: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::from(&JobsConfig::default())
    }
}

impl From<&JobsConfig> for JobConfig {
    fn from(config: &JobsConfig) -> Self {
        Self {
            rollover_cron: config.rollover_cron.clone(),
            expiry_cron: config.expiry_cron.clone(),
            purge_cron: config.purge_cron.clone(),
            notification_retention_days: config.notification_retention_days,
        }
    }
}

/// The scheduled maintenance tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceJob {
    SubstitutionRollover,
    RequestExpiry,
    NotificationPurge,
}

impl MaintenanceJob {
    pub const ALL: [MaintenanceJob; 3] = [
        MaintenanceJob::SubstitutionRollover,
        MaintenanceJob::RequestExpiry,
        MaintenanceJob::NotificationPurge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceJob::SubstitutionRollover => "substitution rollover",
            MaintenanceJob::RequestExpiry => "request expiry",
            MaintenanceJob::NotificationPurge => "notification purge",
        }
    }

    fn schedule<'a>(&self, config: &'a JobConfig) -> &'a str {
        match self {
            MaintenanceJob::SubstitutionRollover => &config.rollover_cron,
            MaintenanceJob::RequestExpiry => &config.expiry_cron,
            MaintenanceJob::NotificationPurge => &config.purge_cron,
        }
    }

    /// Run once. Returns the number of rows processed.
    pub async fn run(&self, db: &Database, config: &JobConfig) -> Result<u64, JobError> {
        match self {
            MaintenanceJob::SubstitutionRollover => run_substitution_rollover(db).await,
            MaintenanceJob::RequestExpiry => run_request_expiry(db).await,
            MaintenanceJob::NotificationPurge => {
                run_notification_purge(db, config.notification_retention_days).await
            }
        }
    }
}

/// Background job scheduler for Staffroom.
pub struct JobScheduler {
    scheduler: TokioJobScheduler,
    db: Arc<Database>,
    config: JobConfig,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub async fn new(db: Arc<Database>, config: JobConfig) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            db,
            config,
        })
    }

    /// Start the job scheduler with all maintenance jobs.
    pub async fn start(&self) -> Result<(), JobError> {
        info!("Starting Staffroom job scheduler");

        for job in MaintenanceJob::ALL {
            self.add_job(job).await?;
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Staffroom job scheduler started successfully");

        Ok(())
    }

    /// Stop the job scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down Staffroom job scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        Ok(())
    }

    async fn add_job(&self, kind: MaintenanceJob) -> Result<(), JobError> {
        let db = Arc::clone(&self.db);
        let config = self.config.clone();
        let schedule = kind.schedule(&self.config).to_string();

        let job = Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let db = Arc::clone(&db);
            let config = config.clone();
            Box::pin(async move {
                info!("Running {}", kind.name());

                match kind.run(&db, &config).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("{}: {} rows processed", kind.name(), count);
                        }
                    }
                    Err(e) => {
                        error!("{} failed: {}", kind.name(), e);
                    }
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Added {} job (schedule: {})", kind.name(), schedule);

        Ok(())
    }

    /// Run one job immediately (useful for testing or manual triggers).
    pub async fn run_now(&self, job: MaintenanceJob) -> Result<u64, JobError> {
        job.run(&self.db, &self.config).await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::errors::StaffroomError> for JobError {
    fn from(err: crate::errors::StaffroomError) -> Self {
        JobError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = JobConfig::default();
        assert_eq!(config.rollover_cron, "0 5 * * * *");
        assert_eq!(config.expiry_cron, "0 20 * * * *");
        assert_eq!(config.purge_cron, "0 0 4 * * *");
        assert_eq!(config.notification_retention_days, 30);
    }

    #[test]
    fn each_job_has_its_own_schedule() {
        let config = JobConfig::default();
        let schedules: Vec<&str> = MaintenanceJob::ALL
            .iter()
            .map(|job| job.schedule(&config))
            .collect();
        assert_eq!(schedules, ["0 5 * * * *", "0 20 * * * *", "0 0 4 * * *"]);
    }
}
