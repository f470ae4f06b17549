//! Identity record for an application holding an audio session

use serde::{Deserialize, Serialize};

/// An application known to own (or to have owned) an audio session
///
/// Only the executable path is stored; the display name is derived from it.
/// Serialized as `{"ExecutablePath": ..., "ApplicationName": ...}`, and the
/// name is ignored when reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ApplicationRecord", from = "ApplicationRecord")]
pub struct AudioApplication {
    executable_path: String,
}

impl AudioApplication {
    pub fn new(executable_path: impl Into<String>) -> Self {
        Self {
            executable_path: executable_path.into(),
        }
    }

    pub fn executable_path(&self) -> &str {
        &self.executable_path
    }

    /// Final path segment, e.g. `firefox.exe`
    pub fn display_name(&self) -> &str {
        display_name(&self.executable_path)
    }

    /// Case-insensitive comparison against another executable path
    pub fn matches(&self, executable_path: &str) -> bool {
        same_executable(&self.executable_path, executable_path)
    }
}

impl PartialEq for AudioApplication {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.executable_path)
    }
}

impl Eq for AudioApplication {}

/// Substring after the last path separator, or the whole path if there is none
pub fn display_name(executable_path: &str) -> &str {
    executable_path
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(executable_path)
}

/// Executable paths compare case-insensitively (Windows file system semantics)
pub fn same_executable(a: &str, b: &str) -> bool {
    a == b || path_key(a) == path_key(b)
}

/// Key used for case-insensitive lookups
pub(crate) fn path_key(executable_path: &str) -> String {
    executable_path.to_lowercase()
}

#[derive(Serialize, Deserialize)]
struct ApplicationRecord {
    #[serde(rename = "ExecutablePath")]
    executable_path: String,
    #[serde(rename = "ApplicationName", default)]
    application_name: String,
}

impl From<AudioApplication> for ApplicationRecord {
    fn from(app: AudioApplication) -> Self {
        let application_name = app.display_name().to_string();
        Self {
            executable_path: app.executable_path,
            application_name,
        }
    }
}

impl From<ApplicationRecord> for AudioApplication {
    fn from(record: ApplicationRecord) -> Self {
        Self::new(record.executable_path)
    }
}
