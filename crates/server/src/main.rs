mod bootstrap;
mod relay;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gammon_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

/// Slack frontend for GNU Backgammon.
#[derive(Debug, Parser)]
#[command(
    name = "gammon-server",
    about = "Slack frontend for GNU Backgammon",
    after_help = "Examples:\n  gammon-server --slash-token TOKEN --webhook-url https://hooks.slack.com/...\n  gammon-server --config gammon.toml --max-games 4"
)]
struct Cli {
    #[arg(long, help = "Host address to bind")]
    host: Option<String>,
    #[arg(long, help = "Port to listen on")]
    port: Option<u16>,
    #[arg(long, help = "Slack token for the associated slash command")]
    slash_token: Option<String>,
    #[arg(long, help = "Slack incoming webhook URL")]
    webhook_url: Option<String>,
    #[arg(long, help = "Max instances of gnubg running to handle games")]
    max_games: Option<usize>,
    #[arg(long, help = "Path for the gnubg executable")]
    gnubg_path: Option<String>,
    #[arg(long, help = "Path to a gammon.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
    #[arg(long, help = "Log format (compact|pretty|json)")]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn into_load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                host: self.host,
                port: self.port,
                slash_token: self.slash_token,
                webhook_url: self.webhook_url,
                max_games: self.max_games,
                engine_executable: self.gnubg_path,
                log_level: self.log_level,
                log_format: self.log_format,
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use gammon_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config and initialize logging before any other operations
    let config = AppConfig::load(cli.into_load_options())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let address = format!("{}:{}", app.config.server.host, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        max_games = app.config.engine.max_games,
        "slackgammon relay listening"
    );

    let state = app.state.clone();
    axum::serve(listener, relay::router(app.state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        "relay stopping, terminating active sessions"
    );
    state.shutdown_sessions().await;

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
