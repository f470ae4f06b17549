//! Configuration management for VolMix GW
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::fs;

use crate::actions::{ActionKind, ActionSpec, DEFAULT_STEP_INTERVAL_MS, DEFAULT_STEP_PERCENT};
use crate::audio::DEFAULT_HINT_CAPACITY;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Case-insensitive substring of the keypad's input port name
    pub input_port: String,
}

/// Volume stepping defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_step_interval")]
    pub step_interval_ms: u64,
    #[serde(default = "default_step_size")]
    pub step_size: f32,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval(),
            step_size: default_step_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// One keypad button bound to a volume action
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonConfig {
    pub id: String,
    pub trigger: TriggerConfig,
    pub action: ActionKind,
    /// Step magnitude override in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
    /// Executable path of the target application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

impl ButtonConfig {
    pub fn action_spec(&self, audio: &AudioConfig) -> ActionSpec {
        ActionSpec {
            id: self.id.clone(),
            kind: self.action,
            step_percent: self.step.unwrap_or(audio.step_size),
            interval: Duration::from_millis(audio.step_interval_ms),
            application: self.application.clone(),
        }
    }
}

/// MIDI message that presses a button (channel is 1-16)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TriggerConfig {
    Note {
        note: u8,
        #[serde(default = "default_channel")]
        channel: u8,
    },
    Cc {
        cc: u8,
        #[serde(default = "default_channel")]
        channel: u8,
    },
}

impl TriggerConfig {
    pub fn channel(&self) -> u8 {
        match *self {
            TriggerConfig::Note { channel, .. } | TriggerConfig::Cc { channel, .. } => channel,
        }
    }

    fn number(&self) -> (&'static str, u8) {
        match *self {
            TriggerConfig::Note { note, .. } => ("note", note),
            TriggerConfig::Cc { cc, .. } => ("CC", cc),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to load config: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.trim().is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }

        if self.audio.step_interval_ms == 0 {
            anyhow::bail!("audio.step_interval_ms must be greater than 0");
        }
        if !(self.audio.step_size > 0.0) {
            anyhow::bail!("audio.step_size must be greater than 0 (got {})", self.audio.step_size);
        }

        let mut ids = HashSet::new();
        let mut triggers = HashSet::new();
        for button in &self.buttons {
            if button.id.is_empty() {
                anyhow::bail!("Button id cannot be empty");
            }
            if !ids.insert(button.id.as_str()) {
                anyhow::bail!("Duplicate button id '{}'", button.id);
            }
            self.validate_button(button)
                .with_context(|| format!("Invalid button '{}'", button.id))?;
            if !triggers.insert(button.trigger) {
                tracing::warn!("Button '{}' reuses a trigger; only the first binding fires", button.id);
            }
        }

        Ok(())
    }

    fn validate_button(&self, button: &ButtonConfig) -> Result<()> {
        let channel = button.trigger.channel();
        if channel == 0 || channel > 16 {
            anyhow::bail!("Invalid MIDI channel {} (must be 1-16)", channel);
        }

        let (kind, number) = button.trigger.number();
        if number > 127 {
            anyhow::bail!("Invalid {} number {} (must be 0-127)", kind, number);
        }

        if let Some(step) = button.step {
            if !(step > 0.0) {
                anyhow::bail!("Step must be greater than 0 (got {})", step);
            }
        }

        if matches!(&button.application, Some(path) if path.trim().is_empty()) {
            anyhow::bail!("Application path cannot be empty when set");
        }

        Ok(())
    }
}

// Default value functions
fn default_step_interval() -> u64 { DEFAULT_STEP_INTERVAL_MS }
fn default_step_size() -> f32 { DEFAULT_STEP_PERCENT }
fn default_cache_capacity() -> usize { DEFAULT_HINT_CAPACITY }
fn default_channel() -> u8 { 1 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
midi:
  input_port: "LPD8"
audio:
  step_interval_ms: 40
buttons:
  - id: "firefox-up"
    trigger: { type: note, note: 36 }
    action: increase
    application: 'C:\Program Files\Mozilla Firefox\firefox.exe'
  - id: "firefox-down"
    trigger: { type: cc, cc: 20, channel: 10 }
    action: decrease
    step: 5
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.midi.input_port, "LPD8");
        assert_eq!(config.audio.step_interval_ms, 40);
        assert_eq!(config.audio.step_size, 2.0);
        assert_eq!(config.audio.cache_capacity, 64);
        assert_eq!(config.buttons.len(), 2);
        assert_eq!(config.buttons[0].trigger, TriggerConfig::Note { note: 36, channel: 1 });
        assert_eq!(config.buttons[1].trigger, TriggerConfig::Cc { cc: 20, channel: 10 });
    }

    #[test]
    fn test_action_spec_from_button() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();

        let up = config.buttons[0].action_spec(&config.audio);
        assert_eq!(up.delta(), 2.0);
        assert_eq!(up.interval, Duration::from_millis(40));
        assert_eq!(
            up.application.as_deref(),
            Some(r"C:\Program Files\Mozilla Firefox\firefox.exe")
        );

        let down = config.buttons[1].action_spec(&config.audio);
        assert_eq!(down.delta(), -5.0);
        assert!(down.application.is_none());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml("midi:\n  input_port: pad\n").unwrap();
        assert!(config.buttons.is_empty());
        assert_eq!(config.audio.step_interval_ms, 50);
    }

    #[test]
    fn test_rejects_empty_input_port() {
        assert!(AppConfig::from_yaml("midi:\n  input_port: \"\"\n").is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let yaml = r#"
midi: { input_port: pad }
buttons:
  - { id: a, trigger: { type: note, note: 1 }, action: increase }
  - { id: a, trigger: { type: note, note: 2 }, action: decrease }
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("Duplicate button id"));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad = [
            "{ id: a, trigger: { type: note, note: 1, channel: 0 }, action: increase }",
            "{ id: a, trigger: { type: cc, cc: 1, channel: 17 }, action: increase }",
            "{ id: a, trigger: { type: note, note: 128 }, action: increase }",
            "{ id: a, trigger: { type: note, note: 1 }, action: increase, step: 0 }",
            "{ id: a, trigger: { type: note, note: 1 }, action: increase, step: -2 }",
        ];
        for button in bad {
            let yaml = format!("midi: {{ input_port: pad }}\nbuttons:\n  - {}\n", button);
            assert!(AppConfig::from_yaml(&yaml).is_err(), "accepted: {}", button);
        }
    }

    #[test]
    fn test_rejects_zero_interval() {
        let yaml = "midi: { input_port: pad }\naudio: { step_interval_ms: 0 }\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_unknown_action() {
        let yaml = r#"
midi: { input_port: pad }
buttons:
  - { id: a, trigger: { type: note, note: 1 }, action: mute }
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        let path = path.to_string_lossy().to_string();

        let config = AppConfig::from_yaml(SAMPLE)?;
        config.save(&path).await?;
        let loaded = AppConfig::load(&path).await?;

        assert_eq!(loaded.buttons.len(), 2);
        assert_eq!(loaded.buttons[1].step, Some(5.0));
        assert_eq!(loaded.audio.step_interval_ms, 40);
        Ok(())
    }
}
