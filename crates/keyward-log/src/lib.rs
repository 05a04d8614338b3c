// ABOUTME: Shared logging setup for keyward binaries
// ABOUTME: Builds tracing dispatchers for stderr or a log directory; never touches stdout

use std::path::Path;
use tracing::{Dispatch, Level};
use tracing_subscriber::EnvFilter;

/// Logging to stderr. Default level given, RUST_LOG override.
pub fn stderr(level: Level) -> Dispatch {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .finish();

    Dispatch::new(subscriber)
}

/// File-based logging. Appends to `{dir}/{app_name}.log`, creating `dir` if needed.
pub fn file(dir: &Path, app_name: &str, level: Level) -> std::io::Result<Dispatch> {
    std::fs::create_dir_all(dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{app_name}.log")))?;

    let subscriber = tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_ansi(false)
        .finish();

    Ok(Dispatch::new(subscriber))
}

/// Log to `dir` when given, otherwise stderr.
/// If the log file can't be opened, warns on stderr and falls back to stderr logging.
pub fn dispatch(dir: Option<&Path>, app_name: &str, level: Level) -> Dispatch {
    let Some(dir) = dir else {
        return stderr(level);
    };

    match file(dir, app_name, level) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            let fallback = stderr(level);
            tracing::dispatcher::with_default(&fallback, || {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to set up file logging");
            });
            fallback
        }
    }
}
