//! QueryLens CLI binary.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use querylens::cli::args::LensArgs;
use querylens::cli::commands::execute_command;

#[tokio::main]
async fn main() {
    let args = LensArgs::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
