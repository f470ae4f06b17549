//! Per-action settings and their persistence in sled

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::AudioApplication;

/// Prefix for action settings keys in the sled database
const SETTINGS_PREFIX: &str = "volume_action:";

/// Settings of one volume action
///
/// JSON shape: `{"SelectedApplicationExecutablePath": "...", "AllAudioApplications": [...] | null}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeActionSettings {
    #[serde(rename = "SelectedApplicationExecutablePath", default)]
    pub selected_executable_path: String,
    #[serde(rename = "AllAudioApplications", default)]
    pub known_applications: Option<Vec<AudioApplication>>,
}

impl VolumeActionSettings {
    /// Known application matching the selection, if any
    pub fn selected_application(&self) -> Option<&AudioApplication> {
        if self.selected_executable_path.is_empty() {
            return None;
        }
        self.known_applications
            .as_deref()?
            .iter()
            .find(|app| app.matches(&self.selected_executable_path))
    }

    /// Replace the known applications; select the first one if nothing is selected
    pub fn populate(&mut self, applications: Vec<AudioApplication>) {
        if self.selected_executable_path.is_empty() {
            if let Some(first) = applications.first() {
                self.selected_executable_path = first.executable_path().to_string();
            }
        }
        self.known_applications = Some(applications);
    }
}

/// Storage for action settings, keyed by action id
pub trait SettingsStore: Send + Sync {
    fn load(&self, action_id: &str) -> Result<Option<VolumeActionSettings>>;
    fn save(&self, action_id: &str, settings: &VolumeActionSettings) -> Result<()>;
}

/// Settings kept in memory only, used when the database cannot be opened
#[derive(Default)]
pub struct MemorySettingsStore {
    entries: parking_lot::Mutex<std::collections::HashMap<String, VolumeActionSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, action_id: &str) -> Result<Option<VolumeActionSettings>> {
        Ok(self.entries.lock().get(action_id).cloned())
    }

    fn save(&self, action_id: &str, settings: &VolumeActionSettings) -> Result<()> {
        self.entries.lock().insert(action_id.to_string(), settings.clone());
        Ok(())
    }
}

/// Settings persisted as JSON values in sled
pub struct SledSettingsStore {
    db: sled::Db,
}

impl SledSettingsStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("Failed to open settings database at: {}", path.display()))?;
        Ok(Self::new(db))
    }

    fn key(action_id: &str) -> String {
        format!("{}{}", SETTINGS_PREFIX, action_id)
    }
}

impl SettingsStore for SledSettingsStore {
    fn load(&self, action_id: &str) -> Result<Option<VolumeActionSettings>> {
        let Some(value) = self
            .db
            .get(Self::key(action_id))
            .context("Failed to read action settings from sled")?
        else {
            return Ok(None);
        };

        let settings = serde_json::from_slice(&value)
            .with_context(|| format!("Failed to parse settings of action '{}'", action_id))?;
        debug!("Restored settings for action '{}'", action_id);
        Ok(Some(settings))
    }

    fn save(&self, action_id: &str, settings: &VolumeActionSettings) -> Result<()> {
        let value = serde_json::to_vec(settings).context("Failed to serialize action settings")?;
        self.db
            .insert(Self::key(action_id).as_bytes(), value)
            .context("Failed to persist action settings to sled")?;
        self.db.flush().context("Failed to flush settings database")?;
        Ok(())
    }
}
