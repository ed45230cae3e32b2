//! docdrop command-line entry point.

mod app;
mod cli;
mod config;
mod render;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with the status output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting docdrop");

    let mut config = config::Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config.upload);
    config.upload.validate()?;
    tracing::info!(
        endpoint = %config.upload.endpoint,
        parallel = config.upload.max_parallel_uploads,
        retries = config.upload.max_retries,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli.paths, config))
}
