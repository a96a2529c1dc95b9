mod cli;
mod commands;
mod formatting;
mod model_settings;
mod sessions;
mod storage;

use clap::Parser;
use cli::{Cli, Command};
use subtrends_core::{report_error, AppConfig, ErrorExt};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "subtrends=info,subtrends_core=info,reddit_client=info,llm_interface=info,news_service=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("Parsed arguments: {:?}", cli);

    let config = AppConfig::load(cli.config.as_deref()).map_err(|e| {
        report_error("load config", &e);
        anyhow::anyhow!(e.user_friendly_message())
    })?;

    match cli.command {
        Command::Groups => commands::list_groups(&config),
        Command::News(args) => commands::news(&config, args).await?,
        Command::Model { name } => commands::model(&config, name).await?,
        Command::History => commands::history(&config).await?,
        Command::Clear => commands::clear(&config).await?,
    }

    Ok(())
}
