//! Where VolMix GW keeps its config, settings database and logs.
//!
//! - **Dev** (debug builds only): `volmix.yaml` in the working directory.
//! - **Portable**: a `.portable` marker next to the executable keeps every
//!   file beside it.
//! - **Installed** (default): `%APPDATA%\VolMix GW` or the platform's data dir.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application name used for directories in installed mode
const APP_NAME: &str = "VolMix GW";

/// Config file name in every mode
pub const CONFIG_FILE: &str = "volmix.yaml";

/// Example config shipped next to the executable
const EXAMPLE_CONFIG_FILE: &str = "volmix.example.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Dev,
    Portable,
    Installed,
}

/// Application paths for config, state, and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config: PathBuf,
    /// Holds the settings database
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub mode: PathMode,
}

impl AppPaths {
    /// Detect the paths for the running executable.
    ///
    /// Called before logging is initialized, hence `eprintln!` diagnostics.
    pub fn detect() -> Self {
        let exe_dir = executable_dir();
        let cwd = if cfg!(debug_assertions) {
            std::env::current_dir().ok()
        } else {
            None
        };

        let paths = Self::resolve(&exe_dir, cwd.as_deref(), dirs::data_dir());

        #[cfg(debug_assertions)]
        eprintln!("[paths] {:?} mode, config: {}", paths.mode, paths.config.display());

        paths
    }

    /// Resolve paths from the executable dir, a dev working dir and the data dir
    pub fn resolve(exe_dir: &Path, dev_dir: Option<&Path>, data_dir: Option<PathBuf>) -> Self {
        if let Some(dev_dir) = dev_dir.filter(|dir| dir.join(CONFIG_FILE).exists()) {
            return Self::rooted_at(dev_dir, ".state", PathMode::Dev);
        }

        if exe_dir.join(".portable").exists() {
            return Self::rooted_at(exe_dir, ".state", PathMode::Portable);
        }

        let app_data = data_dir
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no data directory, falling back to exe dir");
                exe_dir.to_path_buf()
            })
            .join(APP_NAME);
        Self::rooted_at(&app_data, "state", PathMode::Installed)
    }

    fn rooted_at(base: &Path, state: &str, mode: PathMode) -> Self {
        Self {
            config: base.join(CONFIG_FILE),
            state_dir: base.join(state),
            logs_dir: base.join("logs"),
            mode,
        }
    }

    pub fn is_portable(&self) -> bool {
        self.mode != PathMode::Installed
    }

    /// Directory holding the config file
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Create the state and log directories.
    ///
    /// In installed mode the config directory is created too, and a config
    /// shipped next to the executable is copied in when none exists yet.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.state_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        if !self.is_portable() {
            let base = self.base_dir();
            if !base.exists() {
                std::fs::create_dir_all(&base)
                    .with_context(|| format!("Failed to create {}", base.display()))?;
            }
            if !self.config.exists() {
                self.seed_config(&executable_dir())?;
            }
        }

        Ok(())
    }

    /// Copy the first shipped config found in `source_dir` to the config path
    fn seed_config(&self, source_dir: &Path) -> anyhow::Result<()> {
        for name in [CONFIG_FILE, EXAMPLE_CONFIG_FILE] {
            let candidate = source_dir.join(name);
            if candidate.exists() {
                info!("Copying {} to {}", candidate.display(), self.config.display());
                std::fs::copy(&candidate, &self.config).with_context(|| {
                    format!(
                        "Failed to copy config from {} to {}",
                        candidate.display(),
                        self.config.display()
                    )
                })?;
                return Ok(());
            }
        }

        info!("No config found, please create {}", self.config.display());
        Ok(())
    }

    /// Path of the sled settings database
    pub fn settings_db_path(&self) -> PathBuf {
        self.state_dir.join("settings.sled")
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_installed_mode_uses_data_dir() {
        let exe = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        let paths = AppPaths::resolve(exe.path(), None, Some(data.path().to_path_buf()));
        assert_eq!(paths.mode, PathMode::Installed);
        assert_eq!(paths.config, data.path().join("VolMix GW").join(CONFIG_FILE));
        assert_eq!(
            paths.settings_db_path(),
            data.path().join("VolMix GW").join("state").join("settings.sled")
        );
        assert!(!paths.is_portable());
    }

    #[test]
    fn test_portable_marker() {
        let exe = TempDir::new().unwrap();
        std::fs::write(exe.path().join(".portable"), "").unwrap();

        let paths = AppPaths::resolve(exe.path(), None, None);
        assert_eq!(paths.mode, PathMode::Portable);
        assert_eq!(paths.logs_dir, exe.path().join("logs"));
    }

    #[test]
    fn test_dev_dir_needs_config() {
        let exe = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        let paths = AppPaths::resolve(exe.path(), Some(cwd.path()), Some(data.path().to_path_buf()));
        assert_eq!(paths.mode, PathMode::Installed);

        std::fs::write(cwd.path().join(CONFIG_FILE), "midi: { input_port: pad }\n").unwrap();
        let paths = AppPaths::resolve(exe.path(), Some(cwd.path()), Some(data.path().to_path_buf()));
        assert_eq!(paths.mode, PathMode::Dev);
        assert_eq!(paths.state_dir, cwd.path().join(".state"));
    }

    #[test]
    fn test_seed_config_copies_example() {
        let exe = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        std::fs::write(exe.path().join(EXAMPLE_CONFIG_FILE), "midi: { input_port: pad }\n").unwrap();

        let paths = AppPaths::resolve(exe.path(), None, Some(data.path().to_path_buf()));
        std::fs::create_dir_all(paths.base_dir()).unwrap();
        paths.seed_config(exe.path()).unwrap();

        assert!(paths.config.exists());
    }
}
