//! Press-and-hold volume stepping for one button
//!
//! While the button is held the controller owns one [`VolumeControlHandle`]
//! and one periodic task. The task applies a signed delta every interval.
//! Releasing the button invalidates the handle before the task is stopped,
//! and the task is awaited so no tick runs after `button_up` returns.

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::settings::{SettingsStore, VolumeActionSettings};
use super::ActionSpec;
use crate::audio::application::same_executable;
use crate::audio::{SessionDirectory, SessionError, SessionResult, VolumeControlHandle};

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Armed,
    Disposed,
}

/// Handle and timer live and die together
struct Armed {
    handle: Arc<VolumeControlHandle>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

enum State {
    Idle,
    Armed(Armed),
    Disposed,
}

pub struct DeltaVolumeController {
    spec: ActionSpec,
    directory: Arc<SessionDirectory>,
    store: Arc<dyn SettingsStore>,
    settings: VolumeActionSettings,
    state: State,
}

impl DeltaVolumeController {
    /// Create a controller, restoring its settings or building fresh ones
    ///
    /// Fresh settings are populated from the current audio sessions. An
    /// application named by `spec.application` replaces the stored selection.
    pub fn new(spec: ActionSpec, directory: Arc<SessionDirectory>, store: Arc<dyn SettingsStore>) -> Self {
        let stored = match store.load(&spec.id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to load settings for action '{}': {:#}", spec.id, e);
                None
            }
        };

        let mut controller = Self {
            spec,
            directory,
            store,
            settings: stored.clone().unwrap_or_default(),
            state: State::Idle,
        };

        if stored.is_none() {
            if let Some(application) = controller.spec.application.clone() {
                controller.settings.selected_executable_path = application;
            }
            if let Err(e) = controller.refresh_applications() {
                warn!("Action '{}': cannot list audio applications: {}", controller.spec.id, e);
                controller.persist();
            }
        } else if let Some(application) = controller.spec.application.clone() {
            if !same_executable(&controller.settings.selected_executable_path, &application) {
                controller.select_application(application);
            }
        }

        debug!(
            "Action '{}' ({}) ready, target: '{}'",
            controller.spec.id,
            controller.spec.kind.as_str(),
            controller.settings.selected_executable_path
        );
        controller
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &ActionSpec {
        &self.spec
    }

    pub fn settings(&self) -> &VolumeActionSettings {
        &self.settings
    }

    pub fn state(&self) -> ControllerState {
        match self.state {
            State::Idle => ControllerState::Idle,
            State::Armed(_) => ControllerState::Armed,
            State::Disposed => ControllerState::Disposed,
        }
    }

    /// Start stepping the selected application's volume
    ///
    /// Returns `Ok(true)` once armed. A missing session leaves the controller
    /// idle and returns `Ok(false)`; a second press while armed replaces the
    /// handle and timer.
    pub async fn button_down(&mut self) -> SessionResult<bool> {
        if matches!(self.state, State::Disposed) {
            debug!("Action '{}' disposed, ignoring press", self.spec.id);
            return Ok(false);
        }
        self.disarm().await;

        let path = self.settings.selected_executable_path.clone();
        if path.is_empty() {
            warn!("Action '{}' has no application selected", self.spec.id);
            return Ok(false);
        }

        info!("Changing volume for {}", path);
        let Some(handle) = self.directory.find_handle(&path)? else {
            info!(
                "Action '{}': {}, volume left unchanged",
                self.spec.id,
                SessionError::SessionNotFound { path }
            );
            return Ok(false);
        };

        let handle = Arc::new(handle);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(step_volume(handle.clone(), self.spec.delta(), self.spec.interval, stop_rx));
        self.state = State::Armed(Armed { handle, stop_tx, task });
        Ok(true)
    }

    /// Stop stepping and release the session
    pub async fn button_up(&mut self) {
        self.disarm().await;
    }

    /// Stop and refuse further presses; safe to call repeatedly
    pub async fn dispose(&mut self) {
        self.disarm().await;
        if !matches!(self.state, State::Disposed) {
            debug!("Action '{}' disposed", self.spec.id);
            self.state = State::Disposed;
        }
    }

    /// Re-read the audio applications into the settings and save them
    pub fn refresh_applications(&mut self) -> SessionResult<()> {
        let applications = self.directory.applications()?;
        debug!("Action '{}': {} audio application(s)", self.spec.id, applications.len());
        self.settings.populate(applications);
        self.persist();
        Ok(())
    }

    /// Replace the settings wholesale with ones edited outside the config
    /// file, such as a settings UI, and save them
    pub fn receive_settings(&mut self, settings: VolumeActionSettings) {
        self.settings = settings;
        self.persist();
    }

    pub fn select_application(&mut self, executable_path: impl Into<String>) {
        self.settings.selected_executable_path = executable_path.into();
        info!(
            "Action '{}' now targets '{}'",
            self.spec.id, self.settings.selected_executable_path
        );
        self.persist();
    }

    async fn disarm(&mut self) {
        let State::Armed(armed) = std::mem::replace(&mut self.state, State::Idle) else {
            return;
        };

        // Invalidate first: waits for an in-flight tick, later ticks are no-ops
        armed.handle.release();
        let _ = armed.stop_tx.send(());
        if let Err(e) = armed.task.await {
            warn!("Volume task of action '{}' ended abnormally: {}", self.spec.id, e);
        }
        trace!("Action '{}' idle", self.spec.id);
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.spec.id, &self.settings) {
            warn!("Failed to save settings for action '{}': {:#}", self.spec.id, e);
        }
    }
}

impl Drop for DeltaVolumeController {
    fn drop(&mut self) {
        if let State::Armed(armed) = std::mem::replace(&mut self.state, State::Disposed) {
            armed.handle.release();
            armed.task.abort();
        }
    }
}

async fn step_volume(
    handle: Arc<VolumeControlHandle>,
    delta: f32,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                match handle.apply_delta_percent(delta) {
                    Some(level) => trace!("{} -> {:.1}%", handle.executable_path(), level),
                    None => trace!("{}: session gone, tick skipped", handle.executable_path()),
                }
            }
        }
    }
}
