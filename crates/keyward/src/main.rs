// ABOUTME: Entry point for the authorized-keys binary (sshd AuthorizedKeysCommand)
// ABOUTME: Parses the CLI and runs a single resolution on a current-thread runtime

use clap::Parser;
use keyward::Cli;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    keyward::run(cli, &mut std::io::stdout()).await
}
