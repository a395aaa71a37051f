//! omsctl - Order Management System deployment tool
//!
//! Main entry point for the omsctl command-line tool.

use omsctl::cli::{self, Cli};
use omsctl::{console, logging, ContextBuilder, ShutdownCoordinator};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse_args(std::env::args_os());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            console::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Create shutdown coordinator and install signal handlers
    let shutdown = ShutdownCoordinator::new();
    let _signal_handler = shutdown.install_signal_handlers();

    let mut builder = ContextBuilder::new()
        .with_config_path(cli.config.clone())
        .with_shutdown(shutdown);

    if cli.selected().needs_context() {
        let config = match builder.load_config().await {
            Ok(config) => config,
            Err(e) => {
                logging::init("warn", cli.verbose);
                return Err(e.into());
            }
        };
        logging::init(&config.logging.level, cli.verbose);
        builder = builder.with_config(config);
    } else {
        logging::init("warn", cli.verbose);
    }

    cli::run(&cli, builder).await?;
    Ok(())
}
