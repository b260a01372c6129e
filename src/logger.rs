use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the tracing filter directives
const LOG_ENV: &str = "DOCKBOX_LOG";
const LOG_FILE: &str = "dockbox.log";

static INIT: OnceLock<()> = OnceLock::new();
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// Logs always go to the log file; `verbose` mirrors them to stderr.
pub fn init(verbose: bool) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    init_inner(verbose)?;
    let _ = INIT.set(());
    Ok(())
}

fn init_inner(verbose: bool) -> Result<()> {
    let log_path = determine_log_path()?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory at {}", parent.display()))?;
    }

    let (directory, file_name) = split_path(&log_path)?;
    let file_appender = rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .with(stderr_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

fn determine_log_path() -> Result<PathBuf> {
    let state_home = std::env::var("XDG_STATE_HOME").ok();
    if let Some(path) = log_path_in(state_home.as_deref(), home::home_dir()) {
        return Ok(path);
    }

    // Neither XDG_STATE_HOME nor a home directory is available
    Ok(std::env::current_dir()?.join(LOG_FILE))
}

fn log_path_in(state_home: Option<&str>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(state_home) = state_home
        && !state_home.is_empty()
    {
        return Some(PathBuf::from(state_home).join("dockbox").join(LOG_FILE));
    }

    home_dir.map(|home| {
        home.join(".local")
            .join("state")
            .join("dockbox")
            .join(LOG_FILE)
    })
}

fn split_path(path: &Path) -> Result<(PathBuf, &str)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid log file name"))?;

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_prefers_xdg_state_home() {
        let path = log_path_in(Some("/state"), Some(PathBuf::from("/home/me"))).unwrap();
        assert_eq!(path, PathBuf::from("/state/dockbox/dockbox.log"));
    }

    #[test]
    fn test_log_path_ignores_empty_state_home() {
        let path = log_path_in(Some(""), Some(PathBuf::from("/home/me"))).unwrap();
        assert_eq!(path, PathBuf::from("/home/me/.local/state/dockbox/dockbox.log"));
    }

    #[test]
    fn test_log_path_none_without_any_base() {
        assert!(log_path_in(None, None).is_none());
    }

    #[test]
    fn test_split_path() {
        let (dir, name) = split_path(Path::new("/state/dockbox/dockbox.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/state/dockbox"));
        assert_eq!(name, "dockbox.log");
    }
}
