// ABOUTME: Command-line interface for the authorized-keys binary using clap
// ABOUTME: Takes the fingerprint by flag or positional argument plus config overrides

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "authorized-keys",
    version,
    about = "sshd AuthorizedKeysCommand: print restricted keys for a fingerprint",
    after_help = "Get a fingerprint with: ssh-keygen -lf ~/.ssh/id_ed25519.pub\n\
                  sshd_config: AuthorizedKeysCommand /usr/local/bin/authorized-keys %f"
)]
pub struct Cli {
    /// SSH public key fingerprint (SHA256:...)
    #[arg(short, long)]
    pub fingerprint: Option<String>,

    /// Fingerprint as a positional argument, used when --fingerprint is absent
    #[arg(value_name = "FINGERPRINT")]
    pub fingerprint_arg: Option<String>,

    /// Config file path
    #[arg(short, long, env = "KEYWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Identity store URL, overrides store.url
    #[arg(long, env = "KEYWARD_STORE_URL")]
    pub store_url: Option<String>,

    /// Log directory, overrides log.dir
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// The requested fingerprint; empty when none was supplied
    pub fn target(&self) -> &str {
        self.fingerprint
            .as_deref()
            .filter(|f| !f.is_empty())
            .or(self.fingerprint_arg.as_deref())
            .unwrap_or_default()
    }
}
