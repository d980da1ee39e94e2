//! Engine subprocess integration for the slackgammon relay.
//!
//! - **Process** (`process`) - the `GameEngine`/`EngineHandle` traits and the
//!   gnubg implementation speaking its line-oriented text protocol
//! - **Sessions** (`session`) - the synchronized registry that owns one engine
//!   subprocess per active game and enforces the capacity bound
//!
//! The engine binary is an opaque external collaborator: commands are passed
//! through to it verbatim and its responses are relayed back untouched.

pub mod process;
pub mod session;

pub use process::{EngineError, EngineHandle, GameEngine, GnubgEngine};
pub use session::{ActiveSession, SessionError, SessionKey, SessionRegistry, ENGINE_OPPONENT};
