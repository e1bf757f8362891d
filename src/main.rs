use clap::Parser;
use valet::cli::{run_cli, Cli};
use valet::logging::{init_logging, LogConfig};
use valet::runtime_config::RuntimeConfig;

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;

    let rc = RuntimeConfig::from_env();
    may::config().set_stack_size(rc.stack_size);

    run_cli(Cli::parse(), &mut std::io::stdout().lock())
}
