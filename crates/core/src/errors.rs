use thiserror::Error;

use crate::commands::CommandParseError;

/// User-facing failure taxonomy for the relay.
///
/// The Slack integration contract expects a message-shaped response even on
/// failure, so every variant carries a stable user message alongside the
/// internal `Display` text used for logging.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("slash-command token mismatch")]
    Auth,
    #[error("missing required Slack parameter `{0}`")]
    MissingParameter(&'static str),
    #[error(transparent)]
    BadCommand(#[from] CommandParseError),
    #[error("invalid challenge target `{0}`")]
    BadChallenge(String),
    #[error("session limit of {max} reached")]
    Capacity { max: usize },
    #[error("`{player}` already has an active session")]
    AlreadyPlaying { player: String },
    #[error("no active session for `{player}`")]
    NoActiveGame { player: String },
    #[error("`{player}` issued a command out of turn")]
    NotYourTurn { player: String },
    #[error("engine failure: {0}")]
    Engine(String),
}

impl RelayError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth => "Missing or invalid token.".to_owned(),
            Self::MissingParameter(name) => {
                format!("Missing required Slack parameter: {name}")
            }
            Self::BadCommand(CommandParseError::Empty) => "No command provided.".to_owned(),
            Self::BadCommand(CommandParseError::UnknownVerb(_)) => "Invalid command.".to_owned(),
            Self::BadChallenge(_) => {
                "You must challenge gnubg or an existing slack user (e.g. @austin)".to_owned()
            }
            Self::Capacity { .. } => {
                "Max game limit reached. Try again after a game has finished.".to_owned()
            }
            Self::AlreadyPlaying { .. } => "You already have a game in progress.".to_owned(),
            Self::NoActiveGame { .. } => "You do not have a game in progress.".to_owned(),
            Self::NotYourTurn { .. } => "It's not your turn!".to_owned(),
            Self::Engine(_) => {
                "The backgammon engine failed and your game was abandoned. Start a new one with `new`."
                    .to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::CommandParseError;
    use crate::errors::RelayError;

    #[test]
    fn every_error_has_a_user_safe_message() {
        let errors = [
            RelayError::Auth,
            RelayError::MissingParameter("user_name"),
            RelayError::BadCommand(CommandParseError::Empty),
            RelayError::BadCommand(CommandParseError::UnknownVerb("teleport".to_owned())),
            RelayError::BadChallenge("#channel".to_owned()),
            RelayError::Capacity { max: 1 },
            RelayError::AlreadyPlaying { player: "austin".to_owned() },
            RelayError::NoActiveGame { player: "austin".to_owned() },
            RelayError::NotYourTurn { player: "austin".to_owned() },
            RelayError::Engine("stdout closed".to_owned()),
        ];

        for error in errors {
            assert!(!error.user_message().is_empty());
        }
    }

    #[test]
    fn engine_message_never_exposes_internal_detail() {
        let error = RelayError::Engine("broken pipe writing to stdin".to_owned());
        assert!(!error.user_message().contains("broken pipe"));
    }

    #[test]
    fn parse_errors_map_to_original_replies() {
        assert_eq!(
            RelayError::from(CommandParseError::Empty).user_message(),
            "No command provided."
        );
        assert_eq!(
            RelayError::from(CommandParseError::UnknownVerb("zap".to_owned())).user_message(),
            "Invalid command."
        );
    }
}
