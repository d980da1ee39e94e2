//! Slack integration for the slackgammon relay.
//!
//! - **Payload** (`payload`) - the slash-command POST contract and token check
//! - **Templates** (`templates`) - the channel message formats
//! - **Webhook** (`webhook`) - the incoming-webhook client behind the
//!   `MessagePoster` trait so tests can record instead of POSTing

pub mod payload;
pub mod templates;
pub mod webhook;

pub use payload::{CommandContext, SlashCommandPayload};
pub use webhook::{MessagePoster, WebhookClient, WebhookError};
