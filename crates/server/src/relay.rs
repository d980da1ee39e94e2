use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Form, Router};
use gammon_core::commands::{self, Command, Verb};
use gammon_core::config::AppConfig;
use gammon_core::errors::RelayError;
use gammon_engine::process::{EngineError, EngineHandle, GameEngine};
use gammon_engine::session::{SessionKey, SessionRegistry, ENGINE_OPPONENT};
use gammon_slack::payload::{CommandContext, SlashCommandPayload};
use gammon_slack::templates;
use gammon_slack::webhook::MessagePoster;
use secrecy::SecretString;
use tracing::{error, info, warn};

/// Shared relay state handed to every request handler. Cheap to clone; the
/// session registry inside is the only mutable state in the process.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    slash_token: SecretString,
    registry: SessionRegistry,
    engine: Arc<dyn GameEngine>,
    poster: Arc<dyn MessagePoster>,
}

enum RelayReply {
    /// Synchronous answer carried in the HTTP response body.
    Text(String),
    /// Empty acknowledgment; the real message goes out via the webhook.
    Ack,
}

pub fn router(state: RelayState) -> Router {
    Router::new().route("/slackgammon", post(slash_command)).with_state(state)
}

pub async fn slash_command(
    State(state): State<RelayState>,
    Form(payload): Form<SlashCommandPayload>,
) -> (StatusCode, String) {
    match state.handle(payload).await {
        Ok(RelayReply::Text(text)) => (StatusCode::OK, text),
        Ok(RelayReply::Ack) => (StatusCode::OK, String::new()),
        Err(relay_error) => (status_for(&relay_error), relay_error.user_message()),
    }
}

/// Failures still answer with a message-shaped body: Slack shows the body to
/// the issuing user whatever the status code says.
fn status_for(error: &RelayError) -> StatusCode {
    match error {
        RelayError::Auth => StatusCode::UNAUTHORIZED,
        RelayError::MissingParameter(_)
        | RelayError::BadCommand(_)
        | RelayError::BadChallenge(_) => StatusCode::BAD_REQUEST,
        RelayError::Capacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::AlreadyPlaying { .. }
        | RelayError::NoActiveGame { .. }
        | RelayError::NotYourTurn { .. } => StatusCode::FORBIDDEN,
        RelayError::Engine(_) => StatusCode::OK,
    }
}

impl RelayState {
    pub fn new(
        config: &AppConfig,
        engine: Arc<dyn GameEngine>,
        poster: Arc<dyn MessagePoster>,
    ) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                slash_token: config.slack.slash_token.clone(),
                registry: SessionRegistry::new(config.engine.max_games),
                engine,
                poster,
            }),
        }
    }

    pub async fn shutdown_sessions(&self) {
        self.inner.registry.shutdown().await;
    }

    async fn handle(&self, payload: SlashCommandPayload) -> Result<RelayReply, RelayError> {
        if !payload.verify_token(&self.inner.slash_token) {
            warn!(event_name = "relay.request.rejected", reason = "token", "token mismatch");
            return Err(RelayError::Auth);
        }

        let ctx = payload.require_context()?;
        let command = commands::parse_command(&ctx.text)?;

        match command.verb {
            Verb::Help => Ok(RelayReply::Text(commands::help_text())),
            Verb::Info => Ok(RelayReply::Text(self.info().await)),
            Verb::New => self.new_game(&ctx, &command).await,
            Verb::Quit => self.quit(&ctx).await,
            _ => self.gameplay(&ctx, &command).await,
        }
    }

    async fn info(&self) -> String {
        let games: Vec<(String, String)> = self
            .inner
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|key| (key.challenger, key.opponent))
            .collect();

        templates::info_summary(self.inner.registry.max_games(), &games)
    }

    async fn new_game(
        &self,
        ctx: &CommandContext,
        command: &Command,
    ) -> Result<RelayReply, RelayError> {
        let opponent = challenge_target(command)?;
        let key = SessionKey::new(&ctx.user_name, &opponent);

        // advisory pre-check so a doomed request does not pay for a spawn;
        // insert below remains the authoritative admission control
        self.inner.registry.check_admission(&key).await.map_err(RelayError::from)?;

        let mut handle = self.inner.engine.spawn().await.map_err(|engine_error| {
            error!(
                event_name = "relay.engine.spawn_failed",
                user_name = %ctx.user_name,
                error = %engine_error,
                "engine subprocess failed to start"
            );
            RelayError::Engine(engine_error.to_string())
        })?;

        let board = match setup_game(&mut *handle, &ctx.user_name, &opponent).await {
            Ok(board) => board,
            Err(engine_error) => {
                handle.terminate().await;
                error!(
                    event_name = "relay.engine.setup_failed",
                    user_name = %ctx.user_name,
                    error = %engine_error,
                    "engine session setup failed"
                );
                return Err(RelayError::Engine(engine_error.to_string()));
            }
        };

        self.inner.registry.insert(key, handle).await.map_err(RelayError::from)?;
        info!(
            event_name = "relay.session.started",
            challenger = %ctx.user_name,
            opponent = %opponent,
            channel_id = %ctx.channel_id,
            "new game started"
        );

        self.post_async(templates::new_game(&ctx.user_name, &opponent, &board), &ctx.channel_id);
        Ok(RelayReply::Ack)
    }

    async fn gameplay(
        &self,
        ctx: &CommandContext,
        command: &Command,
    ) -> Result<RelayReply, RelayError> {
        let session = self
            .inner
            .registry
            .find(&ctx.user_name)
            .await
            .ok_or_else(|| RelayError::NoActiveGame { player: ctx.user_name.clone() })?;

        let mut handle = session.handle.lock().await;

        let turn = match handle.exchange("show turn").await {
            Ok(turn) => turn,
            Err(engine_error) => {
                drop(handle);
                return Err(self.teardown(&ctx.user_name, engine_error).await);
            }
        };
        if command.verb.requires_turn() {
            let on_turn = turn.split_whitespace().next().unwrap_or_default();
            if on_turn != ctx.user_name {
                return Err(RelayError::NotYourTurn { player: ctx.user_name.clone() });
            }
        }

        let line = command.engine_line();
        let output = match handle.exchange(&line).await {
            Ok(output) => output,
            Err(engine_error) => {
                drop(handle);
                return Err(self.teardown(&ctx.user_name, engine_error).await);
            }
        };

        self.post_async(
            templates::command_output(&ctx.user_name, &line, &output),
            &ctx.channel_id,
        );

        // a "No game" reply means the command just finished the game
        match handle.exchange("show turn").await {
            Ok(turn) if turn.starts_with("No game") => {
                drop(handle);
                if let Some(finished) = self.inner.registry.remove(&ctx.user_name).await {
                    finished.handle.lock().await.terminate().await;
                    info!(
                        event_name = "relay.session.finished",
                        challenger = %finished.key.challenger,
                        opponent = %finished.key.opponent,
                        "game over, session released"
                    );
                }
            }
            Ok(_) => {}
            Err(engine_error) => {
                drop(handle);
                return Err(self.teardown(&ctx.user_name, engine_error).await);
            }
        }

        Ok(RelayReply::Ack)
    }

    async fn quit(&self, ctx: &CommandContext) -> Result<RelayReply, RelayError> {
        let session = self
            .inner
            .registry
            .remove(&ctx.user_name)
            .await
            .ok_or_else(|| RelayError::NoActiveGame { player: ctx.user_name.clone() })?;

        session.handle.lock().await.terminate().await;
        let opponent =
            session.key.opponent_of(&ctx.user_name).unwrap_or(ENGINE_OPPONENT).to_owned();
        info!(
            event_name = "relay.session.ended",
            quitter = %ctx.user_name,
            opponent = %opponent,
            "game quit"
        );

        self.post_async(templates::quit_notice(&ctx.user_name, &opponent), &ctx.channel_id);
        Ok(RelayReply::Ack)
    }

    /// Tear down the session after an engine failure. Engine state cannot be
    /// safely resumed, so there is no retry.
    async fn teardown(&self, player: &str, engine_error: EngineError) -> RelayError {
        if let Some(session) = self.inner.registry.remove(player).await {
            session.handle.lock().await.terminate().await;
        }
        error!(
            event_name = "relay.engine.failed",
            user_name = %player,
            error = %engine_error,
            "engine failure, session discarded"
        );
        RelayError::Engine(engine_error.to_string())
    }

    /// Slack expects the slash-command acknowledgment quickly; the formatted
    /// result travels separately through the incoming webhook.
    fn post_async(&self, text: String, channel: &str) {
        let poster = Arc::clone(&self.inner.poster);
        let channel = channel.to_owned();
        tokio::spawn(async move {
            if let Err(webhook_error) = poster.post(&text, &channel).await {
                warn!(
                    event_name = "relay.webhook.failed",
                    channel_id = %channel,
                    error = %webhook_error,
                    "failed to deliver webhook message"
                );
            }
        });
    }
}

fn challenge_target(command: &Command) -> Result<String, RelayError> {
    match command.args.first() {
        None => Ok(ENGINE_OPPONENT.to_owned()),
        Some(name) if name.as_str() == ENGINE_OPPONENT => Ok(ENGINE_OPPONENT.to_owned()),
        Some(name) => match name.strip_prefix('@') {
            Some(user) if !user.is_empty() => Ok(user.to_owned()),
            _ => Err(RelayError::BadChallenge(name.clone())),
        },
    }
}

async fn setup_game(
    handle: &mut dyn EngineHandle,
    challenger: &str,
    opponent: &str,
) -> Result<String, EngineError> {
    handle.exchange(&format!("set player 1 name {challenger}")).await?;
    if opponent != ENGINE_OPPONENT {
        handle.exchange("set player 0 human").await?;
        handle.exchange(&format!("set player 0 name {opponent}")).await?;
    }

    handle.exchange("new game").await
}
