use anyhow::Result;
use clap::{CommandFactory, Parser};
use outreach::cli::{Cli, CliHandler};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug when both are set
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    if cli.debug {
        tracing::debug!("Debug mode enabled");
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let cli_handler = CliHandler::new(cli.config).await?;
    cli_handler.handle_command(command, cli.dry_run).await
}
