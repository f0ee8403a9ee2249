use clap::Parser;
use odin_cli::cli::{Cli, Command};
use odin_cli::config::OdinConfig;
use odin_cli::{commands, logging};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match OdinConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(report) => {
            eprintln!("Error: {report}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.log.filter);
    tracing::debug!(provider = %config.backend.provider, "loaded configuration");

    let result = match cli.command {
        Command::Run(args) => commands::run::execute(args, &config).await,
        Command::Ask(args) => commands::ask::execute(args, &config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("Error: {report}");
            ExitCode::FAILURE
        }
    }
}
