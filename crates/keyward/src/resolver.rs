// ABOUTME: Resolves an sshd-supplied fingerprint into restricted authorized_keys entries
// ABOUTME: Lookup -> decode -> match -> build; all entries are built before anything is written

use crate::entry::{AuthorizedKeyEntry, EntryBuilder};
use crate::error::{ResolveError, Result};
use crate::matcher::match_keys;
use keyward_store::{IdentityStore, StoreError};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Dispatch, Instrument};

/// Stages of a resolution, used to label log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Lookup,
    Decode,
    Match,
    Emit,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Lookup => "lookup",
            Stage::Decode => "decode",
            Stage::Match => "match",
            Stage::Emit => "emit",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful resolution. May hold zero entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Identity returned by the store, if any claimed the fingerprint
    pub identity_id: Option<String>,
    /// One entry per matching key, in the identity's key order
    pub entries: Vec<AuthorizedKeyEntry>,
}

impl Resolution {
    /// All entries as newline-terminated lines
    pub fn render(&self) -> String {
        self.entries.iter().map(|e| format!("{e}\n")).collect()
    }
}

/// Trim the target fingerprint; an empty target is invalid input.
pub fn validate_target(target: &str) -> Result<&str> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ResolveError::InvalidInput);
    }
    Ok(target)
}

/// Fingerprint resolver over an identity store.
///
/// Log events go to the resolver's own [`Dispatch`] (the default at
/// construction time unless replaced with [`Resolver::with_dispatch`]).
pub struct Resolver<S> {
    store: S,
    builder: EntryBuilder,
    lookup_timeout: Duration,
    dispatch: Dispatch,
}

impl<S: IdentityStore> Resolver<S> {
    pub fn new(store: S, builder: EntryBuilder, lookup_timeout: Duration) -> Self {
        Self {
            store,
            builder,
            lookup_timeout,
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Resolve `target` to the entries sshd should accept.
    ///
    /// No identity, or no matching key, is a successful empty resolution.
    pub async fn resolve(&self, target: &str) -> Result<Resolution> {
        let span = self.in_dispatch(|| tracing::info_span!("resolve", fingerprint = %target.trim()));
        self.run(target)
            .instrument(span)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    async fn run(&self, target: &str) -> Result<Resolution> {
        debug!(stage = %Stage::Start, "validating target");
        let target = validate_target(target).map_err(|e| failed(Stage::Start, e))?;

        info!(stage = %Stage::Lookup, "finding identity by key fingerprint");
        let identity = tokio::time::timeout(
            self.lookup_timeout,
            self.store.find_identity_by_key_fingerprint(target),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.lookup_timeout))
        .and_then(|found| found)
        .map_err(|e| failed(Stage::Lookup, e.into()))?;

        let Some(identity) = identity else {
            info!(stage = %Stage::Done, "no identity owns this fingerprint");
            return Ok(Resolution::default());
        };

        info!(
            stage = %Stage::Decode,
            identity = %identity.id,
            keys = identity.keys.len(),
            "found identity keys"
        );
        let matches = match_keys(target, &identity);

        match matches.len() {
            0 => info!(stage = %Stage::Match, identity = %identity.id, "no key matched"),
            1 => info!(stage = %Stage::Match, identity = %identity.id, "matched key"),
            n => warn!(
                stage = %Stage::Match,
                identity = %identity.id,
                matches = n,
                "several keys share this fingerprint, emitting all of them in key order"
            ),
        }

        let entries = matches
            .iter()
            .map(|resolved| self.builder.build(resolved))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| failed(Stage::Emit, e.into()))?;

        Ok(Resolution {
            identity_id: Some(identity.id.clone()),
            entries,
        })
    }

    /// Write the resolution as one buffered write followed by a flush.
    pub fn emit<W: Write>(&self, resolution: &Resolution, out: &mut W) -> Result<usize> {
        let rendered = resolution.render();
        out.write_all(rendered.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| self.in_dispatch(|| failed(Stage::Emit, ResolveError::Output(e))))?;

        let count = resolution.entries.len();
        self.in_dispatch(|| info!(stage = %Stage::Done, entries = count, "emitted entries"));
        Ok(count)
    }

    fn in_dispatch<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

fn failed(stage: Stage, err: ResolveError) -> ResolveError {
    error!(stage = %stage, error = %err, "resolution failed");
    err
}
