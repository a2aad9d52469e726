#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for the gacha simulator.

mod app;
mod args;
mod config;
mod render;
mod store;
mod transfer;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{app::Session, args::CliArgs, config::Config, store::JsonFileStore};

/// Entry point for the gacha simulator command-line interface.
fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = Config::load(args.config.as_deref())?.resolve(args.state, args.seed);
    init_tracing(&settings.log_level);

    let mut session = Session::open(JsonFileStore::new(&settings.state_path), settings.seed)
        .with_context(|| format!("failed to open state at {}", settings.state_path.display()))?;
    let output = session.run(args.command, args.gacha.as_deref())?;
    session.finish()?;
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
