pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod support;

pub use crate::config::StoreConfig;
pub use crate::errors::{AppError, AppResult};
pub use crate::models::{
    Dashboard, DashboardPatch, DeleteSummary, ImportMode, ImportSummary, ListStatistics, ListUsage, NewDashboard,
};
pub use crate::store::DashboardStore;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs JSON logging into a daily rolling file under `log_dir`.
/// `RUST_LOG` overrides the default `info` filter. Calling it again once a
/// subscriber is installed is a no-op.
pub fn init_tracing(log_dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(log_dir).map_err(|error| AppError::Io(error.to_string()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "dashboards.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    if LOG_GUARD.set(guard).is_err() {
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}
