//! Logging for sleuthctl
//!
//! Diagnostics go to a log file so they never interleave with the REPL.
//! Path discovery, in order:
//! 1. $SLEUTH_LOG_FILE (explicit override)
//! 2. $XDG_STATE_HOME/sleuth/sleuth.log
//! 3. ~/.local/state/sleuth/sleuth.log
//!
//! Without a writable log file, only warnings reach stderr.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_ENV: &str = "SLEUTH_LOG_FILE";

/// Overrides the level filter, `RUST_LOG` syntax
pub const LOG_FILTER_ENV: &str = "SLEUTH_LOG";

pub fn discover_log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(LOG_FILE_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        if !xdg_state.is_empty() {
            return Some(PathBuf::from(xdg_state).join("sleuth").join("sleuth.log"));
        }
    }

    dirs::home_dir().map(|home| {
        home.join(".local")
            .join("state")
            .join("sleuth")
            .join("sleuth.log")
    })
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Returns the log file in use, if any.
pub fn init(debug: bool) -> Option<PathBuf> {
    let level = if debug { "debug" } else { "info" };

    if let Some(path) = discover_log_path() {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
            let installed = tracing_subscriber::fmt()
                .with_env_filter(filter(level))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .is_ok();
            return installed.then_some(path);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(if debug { "debug" } else { "warn" }))
        .with_writer(std::io::stderr)
        .try_init();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-mutating cases share one test so they never race
    #[test]
    fn test_discover_log_path_priority() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.log");

        std::env::set_var(LOG_FILE_ENV, &explicit);
        std::env::set_var("XDG_STATE_HOME", dir.path());
        assert_eq!(discover_log_path(), Some(explicit));

        std::env::remove_var(LOG_FILE_ENV);
        assert_eq!(
            discover_log_path(),
            Some(dir.path().join("sleuth").join("sleuth.log"))
        );

        std::env::remove_var("XDG_STATE_HOME");
        if let Some(path) = discover_log_path() {
            assert!(path.ends_with(".local/state/sleuth/sleuth.log"));
        }
    }
}
