//! memsentinel - Main Entry Point
//!
//! Memory-forensics malware detection: preprocessing, model training,
//! scanning and report generation.

use clap::Parser;
use memsentinel::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memsentinel=info".into()),
        )
        .init();

    run(Cli::parse())
}
