mod app;
mod archive;
mod bepinex;
mod browse;
mod cli;
mod clone;
mod config;
mod error;
mod installer;
mod launcher;
mod layout;
mod manifest;
mod mod_id;
mod paths;
mod profile;
mod registry;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = cli::parse_args(&args)?;
    init_tracing(invocation.verbosity());
    cli::run(invocation)
}

fn init_tracing(verbosity: cli::Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
