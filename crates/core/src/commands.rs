use thiserror::Error;

/// The slash-command verbs the relay understands.
///
/// Gameplay verbs are passed through to the engine verbatim; the relay never
/// reinterprets the engine's own command grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Help,
    Info,
    New,
    Move,
    Roll,
    Double,
    Resign,
    Accept,
    Redouble,
    Reject,
    Quit,
}

pub struct VerbSpec {
    pub verb: Verb,
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub help: &'static str,
}

pub const VERBS: &[VerbSpec] = &[
    VerbSpec { verb: Verb::Help, name: "help", args: &[], help: "Print a list of all commands" },
    VerbSpec { verb: Verb::Info, name: "info", args: &[], help: "Print info about running games" },
    VerbSpec {
        verb: Verb::New,
        name: "new",
        args: &["player"],
        help: "Start a new game against <player> (default: gnubg)",
    },
    VerbSpec {
        verb: Verb::Move,
        name: "move",
        args: &["from1", "to1", "..."],
        help: "Move checkers",
    },
    VerbSpec { verb: Verb::Roll, name: "roll", args: &[], help: "Roll the dice" },
    VerbSpec { verb: Verb::Double, name: "double", args: &[], help: "Offer a double" },
    VerbSpec {
        verb: Verb::Resign,
        name: "resign",
        args: &[],
        help: "Offer to end the current game",
    },
    VerbSpec {
        verb: Verb::Accept,
        name: "accept",
        args: &[],
        help: "Accept a cube or resignation",
    },
    VerbSpec {
        verb: Verb::Redouble,
        name: "redouble",
        args: &[],
        help: "Accept the cube one level higher than it was offered",
    },
    VerbSpec {
        verb: Verb::Reject,
        name: "reject",
        args: &[],
        help: "Reject a cube or resignation",
    },
    VerbSpec { verb: Verb::Quit, name: "quit", args: &[], help: "Quit active game" },
];

impl Verb {
    pub fn parse(token: &str) -> Option<Self> {
        let normalized = token.to_ascii_lowercase();
        VERBS.iter().find(|spec| spec.name == normalized).map(|spec| spec.verb)
    }

    pub fn name(self) -> &'static str {
        VERBS
            .iter()
            .find(|spec| spec.verb == self)
            .map(|spec| spec.name)
            .unwrap_or("unknown")
    }

    /// Verbs that may only be issued by the player whose turn it is.
    pub fn requires_turn(self) -> bool {
        matches!(self, Self::Move | Self::Roll | Self::Double | Self::Resign)
    }

    /// Verbs forwarded to the engine as-is within an active session.
    pub fn is_gameplay(self) -> bool {
        matches!(
            self,
            Self::Move
                | Self::Roll
                | Self::Double
                | Self::Resign
                | Self::Accept
                | Self::Redouble
                | Self::Reject
        )
    }
}

/// A parsed slash-command invocation: verb plus pass-through arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Command {
    /// The line sent to the engine for gameplay verbs, e.g. `move 8 4`.
    pub fn engine_line(&self) -> String {
        let mut line = self.verb.name().to_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("no command provided")]
    Empty,
    #[error("invalid command `{0}`")]
    UnknownVerb(String),
}

pub fn parse_command(text: &str) -> Result<Command, CommandParseError> {
    let mut parts = text.split_whitespace();
    let token = parts.next().ok_or(CommandParseError::Empty)?;
    let verb = Verb::parse(token)
        .ok_or_else(|| CommandParseError::UnknownVerb(token.to_owned()))?;

    Ok(Command { verb, args: parts.map(str::to_owned).collect() })
}

/// Static usage text, identical on every call regardless of session state.
pub fn help_text() -> String {
    let mut text = String::from("Commands:");
    for spec in VERBS {
        text.push('\n');
        text.push_str(spec.name);
        for arg in spec.args {
            text.push_str(&format!(" <{arg}>"));
        }
        text.push_str(": ");
        text.push_str(spec.help);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::{help_text, parse_command, Command, CommandParseError, Verb};

    #[test]
    fn parses_known_verbs_case_insensitively() {
        assert_eq!(
            parse_command("Move 8 4 6 4"),
            Ok(Command {
                verb: Verb::Move,
                args: vec!["8".into(), "4".into(), "6".into(), "4".into()],
            })
        );
        assert_eq!(parse_command("roll"), Ok(Command { verb: Verb::Roll, args: vec![] }));
        assert_eq!(
            parse_command("new @austin"),
            Ok(Command { verb: Verb::New, args: vec!["@austin".into()] })
        );
    }

    #[test]
    fn rejects_empty_and_unknown_input() {
        assert_eq!(parse_command("   "), Err(CommandParseError::Empty));
        assert_eq!(
            parse_command("teleport 1 24"),
            Err(CommandParseError::UnknownVerb("teleport".to_owned()))
        );
    }

    #[test]
    fn engine_line_round_trips_verb_and_args() {
        let command = parse_command("move 8 4").expect("parse");
        assert_eq!(command.engine_line(), "move 8 4");
        let command = parse_command("ROLL").expect("parse");
        assert_eq!(command.engine_line(), "roll");
    }

    #[test]
    fn turn_policy_matches_verb_table() {
        for verb in [Verb::Move, Verb::Roll, Verb::Double, Verb::Resign] {
            assert!(verb.requires_turn(), "{} should require the turn", verb.name());
            assert!(verb.is_gameplay());
        }
        for verb in [Verb::Accept, Verb::Redouble, Verb::Reject] {
            assert!(!verb.requires_turn(), "{} should not require the turn", verb.name());
            assert!(verb.is_gameplay());
        }
        for verb in [Verb::Help, Verb::Info, Verb::New, Verb::Quit] {
            assert!(!verb.is_gameplay(), "{} is not a gameplay verb", verb.name());
        }
    }

    #[test]
    fn help_text_is_static_and_covers_every_verb() {
        let first = help_text();
        let second = help_text();
        assert_eq!(first, second);
        for spec in super::VERBS {
            assert!(first.contains(spec.name), "help text should mention `{}`", spec.name);
        }
        assert!(first.contains("new <player>: "));
    }
}
