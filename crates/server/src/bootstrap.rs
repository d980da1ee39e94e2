use std::sync::Arc;

use gammon_core::config::{AppConfig, ConfigError, LoadOptions};
use gammon_engine::process::GnubgEngine;
use gammon_slack::webhook::WebhookClient;
use thiserror::Error;
use tracing::info;

use crate::relay::RelayState;

pub struct Application {
    pub config: AppConfig,
    pub state: RelayState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("engine executable `{path}` not found: {source}")]
    EngineBinary { path: String, source: which::Error },
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Wire the relay together from an already-loaded config. Unrecoverable
/// misconfiguration (missing engine binary) is refused here, before the
/// listener ever binds.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let resolved = which::which(&config.engine.executable).map_err(|source| {
        BootstrapError::EngineBinary { path: config.engine.executable.clone(), source }
    })?;
    info!(
        event_name = "system.bootstrap.engine_located",
        executable = %resolved.display(),
        max_games = config.engine.max_games,
        "engine executable found"
    );

    let engine = Arc::new(GnubgEngine::new(&config.engine));
    let poster = Arc::new(WebhookClient::new(&config.slack));
    let state = RelayState::new(&config, engine, poster);

    Ok(Application { config, state })
}

#[cfg(test)]
mod tests {
    use gammon_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(executable: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                slash_token: Some("sekrit".to_owned()),
                webhook_url: Some("https://hooks.slack.com/services/T0/B0/XX".to_owned()),
                engine_executable: Some(executable.to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_a_slash_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slash_token: Some(String::new()),
                webhook_url: Some("https://hooks.slack.com/services/T0/B0/XX".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("bootstrap must fail").to_string();
        assert!(message.contains("slack.slash_token"));
    }

    #[test]
    fn bootstrap_refuses_a_missing_engine_binary() {
        let result = bootstrap(overrides("/nonexistent/gnubg"));
        assert!(matches!(result.err(), Some(BootstrapError::EngineBinary { .. })));
    }

    #[test]
    fn bootstrap_succeeds_with_a_resolvable_engine_binary() {
        let app = bootstrap(overrides("/bin/cat")).expect("bootstrap should succeed");
        assert_eq!(app.config.engine.executable, "/bin/cat");
    }
}
