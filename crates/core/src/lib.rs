//! Core types for the slackgammon relay.
//!
//! This crate holds everything the relay needs before any I/O happens:
//! - **Configuration** (`config`) - layered defaults / TOML / env / CLI flags
//! - **Command grammar** (`commands`) - the slash-command verbs and parser
//! - **Errors** (`errors`) - the user-facing error taxonomy

pub mod commands;
pub mod config;
pub mod errors;
