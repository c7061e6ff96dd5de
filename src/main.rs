//! Runs the channel demonstrations and prints their results.

use std::io;
use std::process;

use clap::Parser;
use handoff::cli::{self, Config};

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();

    let config = Config::parse();
    tracing::debug!(?config, "starting");

    let stdout = io::stdout();
    if let Err(err) = cli::run(&config, &mut stdout.lock()) {
        tracing::error!(%err, "demonstration failed");
        eprintln!("error: {err}");
        process::exit(1);
    }
}
