//! ldapsync: one directory sync run per invocation.
//!
//! Usage:
//!   ldapsync sync-files
//!   ldapsync sync-web
//!   ldapsync probe
//!   ldapsync check-directory
//!
//! Configuration comes from flags, the environment, or a `.env` file.
//! Exit codes: 0 success, 1 run failed (see the log directory), 2 invalid
//! configuration.

use clap::Parser;
use ldapsync_cli::{init_logging, Args};
use ldapsync_engine::{run, Command, ExitStatus};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("{e:#}");
    }

    let command = Command::from(args.command);
    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {e:#}");
            return ExitStatus::ConfigInvalid.into();
        }
    };

    run(&settings, command).await.into()
}
