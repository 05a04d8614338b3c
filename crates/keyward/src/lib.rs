// ABOUTME: keyward resolves SSH key fingerprints into restricted authorized_keys entries
// ABOUTME: Library behind the authorized-keys binary: matcher, entry builder, resolver, config

use std::future::Future;
use std::io::Write;
use std::process::ExitCode;

use keyward_store::SqliteIdentityStore;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, Dispatch, Level};

pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod matcher;
pub mod resolver;

pub use cli::Cli;
pub use config::Config;
pub use entry::{AuthorizedKeyEntry, EntryBuilder, Restriction};
pub use error::{ConfigError, EntryError, ResolveError, Result};
pub use matcher::{match_keys, ResolvedKey};
pub use resolver::{Resolution, Resolver, Stage};

/// Name used for the log file and diagnostics
pub const APP_NAME: &str = "authorized-keys";

/// Run one resolution for `cli`, writing entries to `out`.
///
/// `out` receives authorized_keys lines only. Diagnostics go to stderr or
/// the configured log directory.
pub async fn run<W: Write>(cli: Cli, out: &mut W) -> ExitCode {
    // Until the config says otherwise, log to stderr.
    let bootstrap = keyward_log::stderr(Level::INFO);

    let (target, config, dispatch) = match tracing::dispatcher::with_default(&bootstrap, || prepare(&cli)) {
        Ok(prepared) => prepared,
        Err(e) => return tracing::dispatcher::with_default(&bootstrap, || report(e)),
    };

    match execute(target, config, dispatch.clone(), out).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => tracing::dispatcher::with_default(&dispatch, || report(e)),
    }
}

/// Validate input and load configuration, before touching the store.
fn prepare(cli: &Cli) -> Result<(String, Config, Dispatch)> {
    let target = resolver::validate_target(cli.target())?.to_string();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.store_url {
        debug!("using store URL from command line");
        config.store.url = url.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log.dir = Some(dir.clone());
    }
    config.validate()?;

    let level = config.log_level()?;
    let dispatch = keyward_log::dispatch(config.log.dir.as_deref(), APP_NAME, level);
    tracing::dispatcher::with_default(&dispatch, || {
        debug!(store = ?config.store, "configuration loaded");
    });

    Ok((target, config, dispatch))
}

async fn execute<W: Write>(
    target: String,
    config: Config,
    dispatch: Dispatch,
    out: &mut W,
) -> Result<usize> {
    let task_dispatch = dispatch.clone();
    let (resolver, resolution) = guarded(async move {
        let builder = EntryBuilder::new(config.entry.command.clone())?;

        let store = SqliteIdentityStore::open(
            &config.store.url,
            &config.store.collection,
            config.lookup_timeout(),
        )
        .with_subscriber(task_dispatch.clone())
        .await?;

        let resolver =
            Resolver::new(store, builder, config.lookup_timeout()).with_dispatch(task_dispatch);
        let resolution = resolver.resolve(&target).await?;
        Ok::<_, ResolveError>((resolver, resolution))
    })
    .with_subscriber(dispatch)
    .await?;

    resolver.emit(&resolution, out)
}

/// Run `work` on its own task so a panic anywhere in it becomes
/// [`ResolveError::Internal`] instead of unwinding through the caller.
async fn guarded<T, F>(work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            error!("resolution task panicked");
            Err(ResolveError::Internal("resolver panicked".to_string()))
        }
        Err(e) => Err(ResolveError::Internal(e.to_string())),
    }
}

fn report(e: ResolveError) -> ExitCode {
    let code = e.exit_code();
    error!(error = %e, exit_code = code, "authorized-keys failed");
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_passes_result_through() {
        let value = guarded(async { Ok::<_, ResolveError>(7) }).await.expect("should succeed");
        assert_eq!(value, 7);

        let err = guarded(async { Err::<(), _>(ResolveError::InvalidInput) })
            .await
            .expect_err("error should pass through");
        assert_eq!(err.exit_code(), 64);
    }

    #[tokio::test]
    async fn test_guarded_turns_panic_into_internal_error() {
        let err = guarded(async {
            if true {
                panic!("store driver blew up");
            }
            Ok::<_, ResolveError>(())
        })
        .await
        .expect_err("panic should become an error");

        assert!(matches!(err, ResolveError::Internal(_)));
        assert_eq!(err.exit_code(), 70);
    }

    #[tokio::test]
    async fn test_unsafe_command_fails_inside_guarded_task() {
        let mut config = Config::default();
        config.store.url = "sqlite:/nonexistent/keyward.db".to_string();
        config.entry.command = "/bin/sh -c \"id\"".to_string();
        let mut out = Vec::new();

        let err = execute("SHA256:abc".to_string(), config, Dispatch::none(), &mut out)
            .await
            .expect_err("unsafe command should fail");

        assert!(matches!(err, ResolveError::Entry(EntryError::UnsafeCommand(_))));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_store_fails_before_output() {
        let mut config = Config::default();
        config.store.url = "sqlite:/nonexistent/keyward.db".to_string();
        let mut out = Vec::new();

        let err = execute("SHA256:abc".to_string(), config, Dispatch::none(), &mut out)
            .await
            .expect_err("missing database should fail");

        assert_eq!(err.exit_code(), 69);
        assert!(out.is_empty());
    }
}
