// ABOUTME: Builds restricted authorized_keys lines bound to a resolved identity
// ABOUTME: Every entry forces a single command and disables forwarding, X11, and PTY

use crate::error::EntryError;
use crate::matcher::ResolvedKey;
use std::fmt;

/// Forced command program used when none is configured
pub const DEFAULT_COMMAND: &str = "/git-command";

/// An authorized_keys restriction option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    NoAgentForwarding,
    NoX11Forwarding,
    NoPty,
    NoPortForwarding,
}

impl Restriction {
    /// The full set, in output order. Entries always carry all of them.
    pub const ALL: [Restriction; 4] = [
        Restriction::NoAgentForwarding,
        Restriction::NoX11Forwarding,
        Restriction::NoPty,
        Restriction::NoPortForwarding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Restriction::NoAgentForwarding => "no-agent-forwarding",
            Restriction::NoX11Forwarding => "no-X11-forwarding",
            Restriction::NoPty => "no-pty",
            Restriction::NoPortForwarding => "no-port-forwarding",
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorized_keys line.
///
/// Only [`EntryBuilder`] constructs entries, so every entry has the full
/// restriction set and a forced command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKeyEntry {
    key_type: String,
    key_data: String,
    forced_command: String,
}

impl AuthorizedKeyEntry {
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub fn key_data_base64(&self) -> &str {
        &self.key_data
    }

    pub fn forced_command(&self) -> &str {
        &self.forced_command
    }

    pub fn restrictions(&self) -> &'static [Restriction] {
        &Restriction::ALL
    }
}

impl fmt::Display for AuthorizedKeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for restriction in self.restrictions() {
            write!(f, "{restriction},")?;
        }
        write!(
            f,
            "command=\"{}\" {} {}",
            self.forced_command, self.key_type, self.key_data
        )
    }
}

/// Identity ids end up inside a double-quoted command, so only a
/// conservative character set is accepted.
pub fn is_safe_identity_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@'))
}

/// A command program path must be non-empty and free of quotes, backslashes,
/// and control characters.
pub fn is_safe_command(command: &str) -> bool {
    !command.trim().is_empty()
        && !command
            .chars()
            .any(|c| c == '"' || c == '\\' || c.is_control())
}

/// Builds entries whose forced command is `<command> <identity id>`
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    command: String,
}

impl EntryBuilder {
    pub fn new(command: impl Into<String>) -> Result<Self, EntryError> {
        let command = command.into();
        if !is_safe_command(&command) {
            return Err(EntryError::UnsafeCommand(command));
        }
        Ok(Self { command })
    }

    /// Build the entry for a matched key.
    ///
    /// The identity id is the only value taken from the store; key names,
    /// comments and stored fingerprints never reach the line.
    pub fn build(&self, resolved: &ResolvedKey<'_>) -> Result<AuthorizedKeyEntry, EntryError> {
        let id = &resolved.identity.id;
        if !is_safe_identity_id(id) {
            return Err(EntryError::UnsafeIdentityId(id.clone()));
        }

        Ok(AuthorizedKeyEntry {
            key_type: resolved.key.key_type().to_string(),
            key_data: resolved.key.to_base64(),
            forced_command: format!("{} {}", self.command, id),
        })
    }
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
        }
    }
}
