use gammon_core::errors::RelayError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// The form-encoded body Slack POSTs for a slash command.
///
/// Every field is optional at the wire level; `require_context` enforces the
/// fields the relay actually needs and names the first one missing. Unknown
/// fields are ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

/// The validated subset of a slash-command payload handlers work with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub text: String,
}

impl SlashCommandPayload {
    /// Compare the payload token against the configured shared secret.
    pub fn verify_token(&self, expected: &SecretString) -> bool {
        self.token.as_deref().is_some_and(|token| token == expected.expose_secret())
    }

    pub fn require_context(self) -> Result<CommandContext, RelayError> {
        let user_id = self.user_id.ok_or(RelayError::MissingParameter("user_id"))?;
        let user_name = self.user_name.ok_or(RelayError::MissingParameter("user_name"))?;
        let channel_id = self.channel_id.ok_or(RelayError::MissingParameter("channel_id"))?;

        Ok(CommandContext {
            user_id,
            user_name,
            channel_id,
            text: self.text.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use gammon_core::errors::RelayError;
    use secrecy::SecretString;

    use super::SlashCommandPayload;

    fn payload() -> SlashCommandPayload {
        SlashCommandPayload {
            token: Some("sekrit".to_owned()),
            text: Some("roll".to_owned()),
            user_id: Some("U1".to_owned()),
            user_name: Some("austin".to_owned()),
            channel_id: Some("C1".to_owned()),
            ..SlashCommandPayload::default()
        }
    }

    #[test]
    fn token_verification_rejects_mismatch_and_absence() {
        let expected = SecretString::from("sekrit".to_owned());

        assert!(payload().verify_token(&expected));
        assert!(!SlashCommandPayload { token: Some("wrong".to_owned()), ..payload() }
            .verify_token(&expected));
        assert!(!SlashCommandPayload { token: None, ..payload() }.verify_token(&expected));
    }

    #[test]
    fn require_context_names_the_first_missing_parameter() {
        let context = payload().require_context().expect("complete payload");
        assert_eq!(context.user_name, "austin");
        assert_eq!(context.text, "roll");

        let error = SlashCommandPayload { user_name: None, ..payload() }
            .require_context()
            .err()
            .expect("missing user_name");
        assert_eq!(error, RelayError::MissingParameter("user_name"));

        let error = SlashCommandPayload { channel_id: None, ..payload() }
            .require_context()
            .err()
            .expect("missing channel_id");
        assert_eq!(error, RelayError::MissingParameter("channel_id"));
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let context = SlashCommandPayload { text: None, ..payload() }
            .require_context()
            .expect("text is optional");
        assert_eq!(context.text, "");
    }

    #[test]
    fn form_decoding_ignores_unknown_fields() {
        let decoded: SlashCommandPayload = serde_urlencoded_like(
            "token=sekrit&user_id=U1&user_name=austin&channel_id=C1&text=new&trigger_id=13345",
        );
        assert_eq!(decoded.token.as_deref(), Some("sekrit"));
        assert_eq!(decoded.text.as_deref(), Some("new"));
    }

    // serde_json is the only serde data format in the dev-dependencies; a
    // key/value map exercises the same Deserialize impl axum's Form uses.
    fn serde_urlencoded_like(query: &str) -> SlashCommandPayload {
        let map: serde_json::Map<String, serde_json::Value> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (key.to_owned(), serde_json::Value::String(value.to_owned())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).expect("payload should decode")
    }
}
