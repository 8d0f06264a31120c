use anyhow::Context;
use clap::Parser;
use cohort_match::cli::handle_config_command;
use cohort_match::cli::handle_index_command;
use cohort_match::cli::handle_match_command;
use cohort_match::cli::handle_serve_command;
use cohort_match::cli::Cli;
use cohort_match::cli::Commands;
use cohort_match::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::load().context("loading configuration")?,
    };

    cohort_match::logging::init_logging(&config.logging, cli.verbose)
        .context("initializing logging")?;
    info!("Configuration loaded successfully");

    match cli.command {
        Commands::Match {
            input,
            strategy,
            json,
        } => handle_match_command(&config, &input, strategy, json).await?,
        Commands::Serve { host, port, cors } => {
            handle_serve_command(&config, host, port, cors).await?;
        }
        Commands::Index(command) => handle_index_command(&config, command).await?,
        Commands::Config => handle_config_command(&config),
    }

    Ok(())
}
