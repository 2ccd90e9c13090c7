//! Runtime configuration for the trigger behaviour of one repository.

use regex::Regex;
use std::time::Duration;
use thiserror::Error;

/// Pattern matched against comment bodies to admit a pull request for
/// building. Matched against the whole body.
pub const DEFAULT_TRIGGER_PHRASE: &str = r".*ok\W+to\W+test.*";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid trigger phrase pattern: {0}")]
    InvalidPhrase(#[from] regex::Error),
    #[error("bot login must not be empty")]
    EmptyBotLogin,
}

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// The account the bot itself comments and reports statuses as. Comments
    /// from this login never trigger builds.
    bot_login: String,
    trigger_phrase: Regex,
    /// When a commit status cannot be set, fall back to posting the message
    /// as a pull request comment instead.
    pub comment_fallback: bool,
    pub poll_interval: Duration,
}

impl TriggerConfig {
    pub fn new(
        bot_login: impl Into<String>,
        trigger_phrase: &str,
        comment_fallback: bool,
        poll_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let bot_login = bot_login.into();
        if bot_login.is_empty() {
            return Err(ConfigError::EmptyBotLogin);
        }
        // Anchor the pattern so it must match the whole comment body.
        let trigger_phrase = Regex::new(&format!("^(?:{trigger_phrase})$"))?;
        Ok(TriggerConfig {
            bot_login,
            trigger_phrase,
            comment_fallback,
            poll_interval,
        })
    }

    /// Reads configuration from `PRBUILD_*` environment variables, applying
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_login =
            std::env::var("PRBUILD_BOT_LOGIN").unwrap_or_else(|_| "prbuild".to_string());
        let phrase = std::env::var("PRBUILD_TRIGGER_PHRASE")
            .unwrap_or_else(|_| DEFAULT_TRIGGER_PHRASE.to_string());
        let comment_fallback = std::env::var("PRBUILD_COMMENT_FALLBACK")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let poll_secs = std::env::var("PRBUILD_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        TriggerConfig::new(
            bot_login,
            &phrase,
            comment_fallback,
            Duration::from_secs(poll_secs),
        )
    }

    pub fn is_bot(&self, login: &str) -> bool {
        login == self.bot_login
    }

    pub fn is_trigger_phrase(&self, body: &str) -> bool {
        self.trigger_phrase.is_match(body)
    }
}
