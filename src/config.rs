//! Engine configuration loaded from TOML.

use crate::llm_client::{LlmConfig, LlmProvider};
use crate::wager::WagerPolicy;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Top-level configuration for the match engine.
///
/// Every section is optional in the file; missing values fall back to the
/// table defaults.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name of the local player's account.
    #[serde(default = "default_player")]
    player: String,

    /// Wager tiers and payout.
    #[serde(default)]
    wager: WagerPolicy,

    /// Computer opponent settings.
    #[serde(default)]
    advisor: AdvisorSettings,

    /// Peer protocol timings.
    #[serde(default)]
    protocol: ProtocolSettings,

    /// Optional LLM move suggestions. Without it the heuristic plays alone.
    #[serde(default)]
    llm: Option<LlmSettings>,
}

fn default_player() -> String {
    "player".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            player: default_player(),
            wager: WagerPolicy::default(),
            advisor: AdvisorSettings::default(),
            protocol: ProtocolSettings::default(),
            llm: None,
        }
    }
}

/// How the computer seat picks its moves.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct AdvisorSettings {
    /// Upper bound on a suggestion request, in milliseconds.
    #[serde(default = "default_suggestion_timeout_ms")]
    suggestion_timeout_ms: u64,

    /// Pause before the computer answers, in milliseconds.
    #[serde(default = "default_thinking_delay_ms")]
    thinking_delay_ms: u64,
}

fn default_suggestion_timeout_ms() -> u64 {
    4_000
}

fn default_thinking_delay_ms() -> u64 {
    600
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            suggestion_timeout_ms: default_suggestion_timeout_ms(),
            thinking_delay_ms: default_thinking_delay_ms(),
        }
    }
}

impl AdvisorSettings {
    /// Suggestion timeout as a duration.
    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_millis(self.suggestion_timeout_ms)
    }

    /// Thinking delay as a duration.
    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_delay_ms)
    }
}

/// Timings for matchmaking and play between peers.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Interval between SEEKING broadcasts, in milliseconds.
    #[serde(default = "default_seek_interval_ms")]
    seek_interval_ms: u64,

    /// Give up seeking after this many seconds.
    #[serde(default = "default_seek_timeout_secs")]
    seek_timeout_secs: u64,

    /// Report a stalled opponent after this many seconds.
    #[serde(default = "default_stall_timeout_secs")]
    stall_timeout_secs: u64,
}

fn default_seek_interval_ms() -> u64 {
    1_000
}

fn default_seek_timeout_secs() -> u64 {
    120
}

fn default_stall_timeout_secs() -> u64 {
    60
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            seek_interval_ms: default_seek_interval_ms(),
            seek_timeout_secs: default_seek_timeout_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

impl ProtocolSettings {
    /// Seek broadcast interval as a duration.
    pub fn seek_interval(&self) -> Duration {
        Duration::from_millis(self.seek_interval_ms)
    }

    /// Seek timeout as a duration.
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_secs(self.seek_timeout_secs)
    }

    /// Stall timeout as a duration.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

/// LLM provider and model used for move suggestions.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct LlmSettings {
    /// LLM provider (openai, anthropic or gemini).
    #[serde(default = "default_provider")]
    provider: LlmProvider,

    /// Model name.
    #[serde(default = "default_model")]
    model: String,

    /// Maximum tokens for a reply.
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
}

#[instrument]
fn default_provider() -> LlmProvider {
    LlmProvider::Gemini
}

#[instrument]
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

#[instrument]
fn default_max_tokens() -> u32 {
    64
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(player = %config.player, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Returns a copy with a different player name.
    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = player.into();
        self
    }

    /// Creates the LLM client configuration, if suggestions are enabled.
    ///
    /// Reads `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` or `GEMINI_API_KEY`
    /// depending on the provider.
    #[instrument(skip(self))]
    pub fn create_llm_config(&self) -> Result<Option<LlmConfig>, ConfigError> {
        let Some(llm) = &self.llm else {
            debug!("No LLM section; heuristic only");
            return Ok(None);
        };

        let var = match llm.provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
        };
        let api_key = std::env::var(var)
            .map_err(|_| ConfigError::new(format!("{} environment variable not set", var)))?;

        Ok(Some(LlmConfig::new(
            llm.provider,
            api_key,
            llm.model.clone(),
            llm.max_tokens,
        )))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = EngineConfig::from_toml("").expect("parse");
        assert_eq!(config.player(), "player");
        assert_eq!(config.wager(), &WagerPolicy::default());
        assert_eq!(config.advisor().suggestion_timeout(), Duration::from_secs(4));
        assert_eq!(config.protocol().stall_timeout(), Duration::from_secs(60));
        assert!(config.llm().is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml(
            r#"
            player = "minh"

            [advisor]
            thinking_delay_ms = 0

            [llm]
            provider = "anthropic"
            "#,
        )
        .expect("parse");
        assert_eq!(config.player(), "minh");
        assert_eq!(config.advisor().thinking_delay(), Duration::ZERO);
        assert_eq!(config.advisor().suggestion_timeout_ms(), &4_000);
        let llm = config.llm().as_ref().expect("llm section");
        assert_eq!(llm.provider(), &LlmProvider::Anthropic);
        assert_eq!(llm.max_tokens(), &64);
    }

    #[test]
    fn test_bad_toml_reports_location() {
        let err = EngineConfig::from_toml("player = [").unwrap_err();
        assert!(err.message.starts_with("Failed to parse config"));
        assert!(err.file.ends_with("config.rs"));
    }
}
