use crate::paths::AppPaths;
use crate::{GrabError, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "pingrab=info";

/// Human-readable events on stderr plus a JSON-lines copy under the logs dir.
/// Returns the path of the JSON log.
pub fn init(paths: &AppPaths, run_id: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(paths.logs_dir())?;
    let log_path = paths.run_log_path(run_id);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().json().with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| GrabError::Logging(e.to_string()))?;

    Ok(log_path)
}
