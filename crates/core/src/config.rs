use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub slack: SlackConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub slash_token: SecretString,
    pub webhook_url: String,
    pub channel_fallback: String,
    pub bot_username: String,
    pub icon_emoji: String,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub executable: String,
    pub max_games: usize,
    pub idle_read_ms: u64,
    pub command_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Highest-precedence overrides, populated from CLI flags.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub slash_token: Option<String>,
    pub webhook_url: Option<String>,
    pub max_games: Option<usize>,
    pub engine_executable: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { host: "127.0.0.1".to_string(), port: 8080 },
            slack: SlackConfig {
                slash_token: String::new().into(),
                webhook_url: String::new(),
                channel_fallback: "#backgammon".to_string(),
                bot_username: "slackgammon".to_string(),
                icon_emoji: ":bg:".to_string(),
            },
            engine: EngineConfig {
                executable: "/usr/local/bin/gnubg".to_string(),
                max_games: 1,
                idle_read_ms: 100,
                command_timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("gammon.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(host) = server.host {
                self.server.host = host;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(slash_token_value) = slack.slash_token {
                self.slack.slash_token = slash_token_value.into();
            }
            if let Some(webhook_url) = slack.webhook_url {
                self.slack.webhook_url = webhook_url;
            }
            if let Some(channel_fallback) = slack.channel_fallback {
                self.slack.channel_fallback = channel_fallback;
            }
            if let Some(bot_username) = slack.bot_username {
                self.slack.bot_username = bot_username;
            }
            if let Some(icon_emoji) = slack.icon_emoji {
                self.slack.icon_emoji = icon_emoji;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(executable) = engine.executable {
                self.engine.executable = executable;
            }
            if let Some(max_games) = engine.max_games {
                self.engine.max_games = max_games;
            }
            if let Some(idle_read_ms) = engine.idle_read_ms {
                self.engine.idle_read_ms = idle_read_ms;
            }
            if let Some(command_timeout_secs) = engine.command_timeout_secs {
                self.engine.command_timeout_secs = command_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GAMMON_SERVER_HOST") {
            self.server.host = value;
        }
        if let Some(value) = read_env("GAMMON_SERVER_PORT") {
            self.server.port = parse_u16("GAMMON_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("GAMMON_SLACK_SLASH_TOKEN") {
            self.slack.slash_token = value.into();
        }
        if let Some(value) = read_env("GAMMON_SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = value;
        }
        if let Some(value) = read_env("GAMMON_SLACK_CHANNEL_FALLBACK") {
            self.slack.channel_fallback = value;
        }
        if let Some(value) = read_env("GAMMON_SLACK_BOT_USERNAME") {
            self.slack.bot_username = value;
        }
        if let Some(value) = read_env("GAMMON_SLACK_ICON_EMOJI") {
            self.slack.icon_emoji = value;
        }

        if let Some(value) = read_env("GAMMON_ENGINE_EXECUTABLE") {
            self.engine.executable = value;
        }
        if let Some(value) = read_env("GAMMON_ENGINE_MAX_GAMES") {
            self.engine.max_games = parse_usize("GAMMON_ENGINE_MAX_GAMES", &value)?;
        }
        if let Some(value) = read_env("GAMMON_ENGINE_IDLE_READ_MS") {
            self.engine.idle_read_ms = parse_u64("GAMMON_ENGINE_IDLE_READ_MS", &value)?;
        }
        if let Some(value) = read_env("GAMMON_ENGINE_COMMAND_TIMEOUT_SECS") {
            self.engine.command_timeout_secs =
                parse_u64("GAMMON_ENGINE_COMMAND_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("GAMMON_LOGGING_LEVEL").or_else(|| read_env("GAMMON_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GAMMON_LOGGING_FORMAT").or_else(|| read_env("GAMMON_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(slash_token) = overrides.slash_token {
            self.slack.slash_token = slash_token.into();
        }
        if let Some(webhook_url) = overrides.webhook_url {
            self.slack.webhook_url = webhook_url;
        }
        if let Some(max_games) = overrides.max_games {
            self.engine.max_games = max_games;
        }
        if let Some(engine_executable) = overrides.engine_executable {
            self.engine.executable = engine_executable;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_slack(&self.slack)?;
        validate_engine(&self.engine)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("gammon.toml"), PathBuf::from("config/gammon.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.host.trim().is_empty() {
        return Err(ConfigError::Validation("server.host must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.slash_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.slash_token is required. Get it from your Slack app's slash command configuration".to_string(),
        ));
    }

    let webhook_url = slack.webhook_url.trim();
    if webhook_url.is_empty() {
        return Err(ConfigError::Validation(
            "slack.webhook_url is required. Create an incoming webhook in your Slack workspace".to_string(),
        ));
    }
    if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.webhook_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.executable.trim().is_empty() {
        return Err(ConfigError::Validation("engine.executable must not be empty".to_string()));
    }

    if engine.max_games == 0 {
        return Err(ConfigError::Validation(
            "engine.max_games must be greater than zero".to_string(),
        ));
    }

    if engine.idle_read_ms == 0 || engine.idle_read_ms > 10_000 {
        return Err(ConfigError::Validation(
            "engine.idle_read_ms must be in range 1..=10000".to_string(),
        ));
    }

    if engine.command_timeout_secs == 0 || engine.command_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "engine.command_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    slack: Option<SlackPatch>,
    engine: Option<EnginePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    slash_token: Option<String>,
    webhook_url: Option<String>,
    channel_fallback: Option<String>,
    bot_username: Option<String>,
    icon_emoji: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    executable: Option<String>,
    max_games: Option<usize>,
    idle_read_ms: Option<u64>,
    command_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
