//! Configuration for a Theatre session
//!
//! Loaded from a TOML file, by default `<config dir>/theatre/config.toml`.
//! Every section is optional and falls back to the defaults below.

use crate::conversation::{ConversationState, SilencePolicy};
use crate::media::{AssetCatalog, Locator};
use crate::speech::RecognitionSettings;
use crate::{Result, TheatreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Clip locations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory the clip locators are relative to
    pub root: PathBuf,
    /// State name → clip file
    pub clips: BTreeMap<String, String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        let catalog = AssetCatalog::default();
        let clips = catalog
            .states()
            .filter_map(|state| {
                catalog
                    .locator(state)
                    .map(|locator| (state.to_string(), locator.to_string()))
            })
            .collect();
        Self {
            root: PathBuf::from("assets/clips"),
            clips,
        }
    }
}

/// Timers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Listening window before a silence timeout
    pub silence_timeout_ms: u64,
    /// Silent windows answered with a prompt before saying goodbye
    pub max_prompts: u32,
    /// Settle delay between session start and clip preloading
    pub preload_delay_ms: u64,
    /// Delay after a clip swap before checking that it is really playing
    pub interaction_check_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 10_000,
            max_prompts: 1,
            preload_delay_ms: 200,
            interaction_check_ms: 500,
        }
    }
}

/// Speech recogniser settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Recognition language
    pub language: String,
    /// Restart the recogniser when a turn ends without a result
    pub relisten: bool,
    /// Restarts allowed per listening window
    pub relisten_limit: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            relisten: true,
            relisten_limit: 3,
        }
    }
}

/// Session runtime settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// States preloaded when the session starts
    pub preload: Vec<ConversationState>,
    /// Event channel buffer size
    pub channel_buffer_size: usize,
    /// Transition history entries kept in the shared state
    pub history_limit: usize,
    /// How long `shutdown` waits for the session thread
    pub shutdown_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        use ConversationState::*;
        Self {
            preload: vec![Greeting, Listening, Goodbye, General, Fallback, Prompt, Weather],
            channel_buffer_size: 100,
            history_limit: 50,
            shutdown_timeout_ms: 2000,
        }
    }
}

/// Complete Theatre configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TheatreConfig {
    pub assets: AssetConfig,
    pub timing: TimingConfig,
    pub speech: SpeechConfig,
    pub session: SessionConfig,
}

impl TheatreConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("theatre").join("config.toml"))
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TheatreError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            TheatreError::ConfigError(msg) => {
                TheatreError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: TheatreConfig =
            toml::from_str(content).map_err(|e| TheatreError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the asset root directory
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets.root = root.into();
        self
    }

    /// Set the clip for a state
    pub fn with_clip(mut self, state: ConversationState, locator: impl Into<String>) -> Self {
        self.assets.clips.insert(state.to_string(), locator.into());
        self
    }

    /// Set the silence timeout
    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.timing.silence_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the preload settle delay
    pub fn with_preload_delay(mut self, delay: Duration) -> Self {
        self.timing.preload_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the autoplay check delay
    pub fn with_interaction_check(mut self, delay: Duration) -> Self {
        self.timing.interaction_check_ms = delay.as_millis() as u64;
        self
    }

    /// Disable restarting the recogniser within a listening window
    pub fn without_relisten(mut self) -> Self {
        self.speech.relisten = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.timing.silence_timeout_ms == 0 {
            return Err(TheatreError::ConfigError(
                "silence_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.speech.language.trim().is_empty() {
            return Err(TheatreError::ConfigError(
                "speech language must not be empty".to_string(),
            ));
        }
        if self.session.channel_buffer_size == 0 {
            return Err(TheatreError::ConfigError(
                "channel_buffer_size must be greater than zero".to_string(),
            ));
        }

        let catalog = self.catalog()?;
        for state in &self.session.preload {
            if !catalog.contains(*state) {
                return Err(TheatreError::ConfigError(format!(
                    "preloaded state {} has no clip",
                    state
                )));
            }
        }
        for required in [ConversationState::Greeting, ConversationState::Listening, ConversationState::Goodbye] {
            if !catalog.contains(required) {
                return Err(TheatreError::ConfigError(format!(
                    "a clip for {} is required",
                    required
                )));
            }
        }
        Ok(())
    }

    /// Build the state → clip table
    pub fn catalog(&self) -> Result<AssetCatalog> {
        let mut clips = Vec::with_capacity(self.assets.clips.len());
        for (name, file) in &self.assets.clips {
            let state: ConversationState = name.parse().map_err(TheatreError::ConfigError)?;
            if state == ConversationState::Idle {
                return Err(TheatreError::ConfigError("idle has no clip".to_string()));
            }
            if file.trim().is_empty() {
                return Err(TheatreError::ConfigError(format!("empty clip path for {}", state)));
            }
            clips.push((state, Locator::new(file.trim())));
        }
        Ok(AssetCatalog::new(clips))
    }

    pub fn silence_policy(&self) -> SilencePolicy {
        SilencePolicy {
            timeout: Duration::from_millis(self.timing.silence_timeout_ms),
            max_prompts: self.timing.max_prompts,
        }
    }

    pub fn recognition_settings(&self) -> RecognitionSettings {
        RecognitionSettings {
            language: self.speech.language.clone(),
            ..RecognitionSettings::default()
        }
    }

    pub fn preload_delay(&self) -> Duration {
        Duration::from_millis(self.timing.preload_delay_ms)
    }

    pub fn interaction_check(&self) -> Duration {
        Duration::from_millis(self.timing.interaction_check_ms)
    }
}
