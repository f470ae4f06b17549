//! Router - maps keypad button edges to volume controllers
//!
//! Owns one [`DeltaVolumeController`] per configured button and the table
//! from MIDI trigger to button id. A config reload disposes every controller
//! and builds the new set.
//!
//! Pads that report pressure as CC keep sending values above the press
//! threshold while held; only the first one arms the button.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::actions::{ControllerState, DeltaVolumeController, SettingsStore};
use crate::audio::{SessionDirectory, SessionError};
use crate::config::{AppConfig, TriggerConfig};
use crate::midi::ButtonEdge;

pub struct Router {
    directory: Arc<SessionDirectory>,
    store: Arc<dyn SettingsStore>,
    controllers: HashMap<String, DeltaVolumeController>,
    bindings: HashMap<TriggerConfig, String>,
    /// CC triggers between their first press value and their release
    held_cc: HashSet<TriggerConfig>,
}

impl Router {
    pub fn new(config: &AppConfig, directory: Arc<SessionDirectory>, store: Arc<dyn SettingsStore>) -> Self {
        let mut router = Self {
            directory,
            store,
            controllers: HashMap::new(),
            bindings: HashMap::new(),
            held_cc: HashSet::new(),
        };
        router.build(config);
        router
    }

    fn build(&mut self, config: &AppConfig) {
        for button in &config.buttons {
            if self.bindings.contains_key(&button.trigger) {
                warn!("Button '{}' ignored: trigger already bound", button.id);
                continue;
            }

            let controller = DeltaVolumeController::new(
                button.action_spec(&config.audio),
                self.directory.clone(),
                self.store.clone(),
            );
            self.bindings.insert(button.trigger, button.id.clone());
            self.controllers.insert(button.id.clone(), controller);
        }
        info!("Router ready with {} button(s)", self.controllers.len());
    }

    /// Dispatch a press or release to the bound controller
    pub async fn handle_edge(&mut self, edge: ButtonEdge) {
        let Some(id) = self.bindings.get(&edge.trigger) else {
            trace!("Unbound trigger {:?}", edge.trigger);
            return;
        };
        let Some(controller) = self.controllers.get_mut(id) else {
            return;
        };

        let is_cc = matches!(edge.trigger, TriggerConfig::Cc { .. });
        if !edge.pressed {
            if is_cc {
                self.held_cc.remove(&edge.trigger);
            }
            controller.button_up().await;
            return;
        }
        if is_cc && !self.held_cc.insert(edge.trigger) {
            trace!("Button '{}' still held", id);
            return;
        }

        match controller.button_down().await {
            Ok(true) => debug!("Button '{}' armed", id),
            Ok(false) => {}
            Err(SessionError::ProviderUnavailable(reason)) => {
                warn!("Button '{}': audio service unavailable: {}", id, reason);
            }
            Err(e) => warn!("Button '{}' failed: {}", id, e),
        }
    }

    /// Replace every controller with ones built from `config`
    pub async fn reload(&mut self, config: &AppConfig) {
        self.shutdown().await;
        self.controllers.clear();
        self.bindings.clear();
        self.build(config);
        self.refresh_applications();
    }

    /// Re-read the audio applications into every controller's settings
    pub fn refresh_applications(&mut self) {
        for (id, controller) in self.controllers.iter_mut() {
            if let Err(e) = controller.refresh_applications() {
                warn!("Button '{}': cannot refresh applications: {}", id, e);
                break;
            }
        }
    }

    /// Dispose every controller, releasing held sessions
    pub async fn shutdown(&mut self) {
        for controller in self.controllers.values_mut() {
            controller.dispose().await;
        }
        self.held_cc.clear();
    }

    pub fn controller(&self, id: &str) -> Option<&DeltaVolumeController> {
        self.controllers.get(id)
    }

    pub fn armed_count(&self) -> usize {
        self.controllers
            .values()
            .filter(|c| c.state() == ControllerState::Armed)
            .count()
    }

    pub fn button_count(&self) -> usize {
        self.controllers.len()
    }
}
