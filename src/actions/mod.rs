//! Keypad actions driving per-application volume
//!
//! Each configured button owns one [`DeltaVolumeController`]. The controller
//! keeps the action's [`VolumeActionSettings`] in a [`SettingsStore`].

pub mod delta;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use delta::{ControllerState, DeltaVolumeController};
pub use settings::{MemorySettingsStore, SettingsStore, SledSettingsStore, VolumeActionSettings};

/// Default magnitude of one held-button step, in percent
pub const DEFAULT_STEP_PERCENT: f32 = 2.0;

/// Default interval between two held-button steps
pub const DEFAULT_STEP_INTERVAL_MS: u64 = 50;

/// Action variant bound to a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Increase,
    Decrease,
}

impl ActionKind {
    /// Signed step for a magnitude (sign of the input is ignored)
    pub fn signed_step(self, magnitude: f32) -> f32 {
        match self {
            ActionKind::Increase => magnitude.abs(),
            ActionKind::Decrease => -magnitude.abs(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Increase => "increase",
            ActionKind::Decrease => "decrease",
        }
    }
}

/// Everything a controller needs to know about its button
#[derive(Debug, Clone)]
pub struct ActionSpec {
    /// Stable id, also the settings key
    pub id: String,
    pub kind: ActionKind,
    /// Step magnitude in percent
    pub step_percent: f32,
    pub interval: Duration,
    /// Application selected by configuration, overriding stored settings
    pub application: Option<String>,
}

impl ActionSpec {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            step_percent: DEFAULT_STEP_PERCENT,
            interval: Duration::from_millis(DEFAULT_STEP_INTERVAL_MS),
            application: None,
        }
    }

    /// Signed per-tick delta
    pub fn delta(&self) -> f32 {
        self.kind.signed_step(self.step_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sign_follows_kind() {
        assert_eq!(ActionKind::Increase.signed_step(2.0), 2.0);
        assert_eq!(ActionKind::Increase.signed_step(-2.0), 2.0);
        assert_eq!(ActionKind::Decrease.signed_step(2.0), -2.0);
    }

    #[test]
    fn test_default_spec() {
        let spec = ActionSpec::new("down", ActionKind::Decrease);
        assert_eq!(spec.delta(), -DEFAULT_STEP_PERCENT);
        assert_eq!(spec.interval, Duration::from_millis(50));
    }
}
