//! openwebif - command-line control for Enigma2 receivers
//!
//! # Usage
//!
//! ```bash
//! openwebif --host vusolo2 status
//! openwebif zap "RTE One" --json
//! openwebif power deep-standby
//! RUST_LOG=openwebif=debug openwebif picon
//! ```

mod commands;

use clap::Parser;

use openwebif::cli::Cli;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    commands::run(cli).await.into()
}

/// Warnings only by default; `--verbose` or RUST_LOG for more
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter(None, level)
        .parse_default_env()
        .init();
}
