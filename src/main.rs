use clap::Parser;
use swaggerware::cli::{run_cli, Cli};
use swaggerware::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    run_cli(Cli::parse())
}
