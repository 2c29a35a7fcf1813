//! Staffroom HTTP server.
//!
//! Loads configuration from `config.toml` and `STAFFROOM_*` environment
//! variables, opens the database, optionally starts the maintenance jobs
//! and serves the REST API until Ctrl+C or SIGTERM.

use std::error::Error;

use staffroom::config::{init_config, StaffroomConfig};
use staffroom::server::{build_router, AppState, Database};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = init_config()?;
    init_tracing(config);

    let db = Database::new().await?;
    info!(db_type = db.db_type(), "Database ready");

    #[cfg(feature = "background-jobs")]
    let mut scheduler = start_jobs(&db, config).await?;
    #[cfg(not(feature = "background-jobs"))]
    if config.jobs.enabled {
        warn!("jobs.enabled is set but the background-jobs feature is not compiled in");
    }

    let state = AppState::from_config(db, config)?;
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Staffroom listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    #[cfg(feature = "background-jobs")]
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            warn!("Job scheduler did not shut down cleanly: {}", e);
        }
    }

    info!("Staffroom stopped");
    Ok(())
}

/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(config: &StaffroomConfig) {
    if !config.logging.enabled {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("staffroom={}", config.logging.level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(feature = "background-jobs")]
async fn start_jobs(
    db: &std::sync::Arc<Database>,
    config: &StaffroomConfig,
) -> Result<Option<staffroom::jobs::JobScheduler>, Box<dyn Error>> {
    use staffroom::jobs::{JobConfig, JobScheduler};

    if !config.jobs.enabled {
        info!("Background jobs disabled");
        return Ok(None);
    }

    let scheduler =
        JobScheduler::new(std::sync::Arc::clone(db), JobConfig::from(&config.jobs)).await?;
    scheduler.start().await?;
    Ok(Some(scheduler))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
