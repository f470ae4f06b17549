//! Revocable volume control handle bound to one audio session

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::error::SessionResult;
use super::provider::SessionVolume;

/// Exclusive, revocable access to one session's volume controls
///
/// Every operation returns `None` ("unknown") once the handle has been released
/// or the underlying session disappeared. A failed native call invalidates the
/// handle; it never reconnects.
pub struct VolumeControlHandle {
    process_id: u32,
    executable_path: String,
    /// `None` once released. Held for the whole read-modify-write of a delta.
    control: Mutex<Option<Box<dyn SessionVolume>>>,
}

impl VolumeControlHandle {
    pub fn new(process_id: u32, executable_path: String, control: Box<dyn SessionVolume>) -> Self {
        Self {
            process_id,
            executable_path,
            control: Mutex::new(Some(control)),
        }
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn executable_path(&self) -> &str {
        &self.executable_path
    }

    /// Whether the handle still holds its native control
    pub fn is_valid(&self) -> bool {
        self.control.lock().is_some()
    }

    /// Current level in `[0, 100]`
    pub fn level_percent(&self) -> Option<f32> {
        self.with_control("get volume", |control| control.volume())
            .map(|level| clamp_level(level) * 100.0)
    }

    /// Set the level, clamped to `[0, 100]`. Returns the level written.
    pub fn set_level_percent(&self, percent: f32) -> Option<f32> {
        if percent.is_nan() {
            return self.level_percent();
        }
        let level = clamp_level(percent / 100.0);
        self.with_control("set volume", |control| control.set_volume(level))
            .map(|()| level * 100.0)
    }

    /// Add `delta` percent to the current level, saturating at 0 and 100
    ///
    /// The read and the write happen under one lock, so two deltas on the same
    /// handle never interleave. Returns the new level in `[0, 100]`.
    pub fn apply_delta_percent(&self, delta: f32) -> Option<f32> {
        self.with_control("apply delta", |control| {
            let current = control.volume()?;
            if delta.is_nan() {
                return Ok(clamp_level(current));
            }
            let next = clamp_level(current + delta / 100.0);
            control.set_volume(next)?;
            Ok(next)
        })
        .map(|level| {
            trace!(pid = self.process_id, delta, level, "volume delta applied");
            level * 100.0
        })
    }

    pub fn mute(&self) -> Option<bool> {
        self.with_control("get mute", |control| control.mute())
    }

    /// Set mute state. Returns the state written.
    pub fn set_mute(&self, mute: bool) -> Option<bool> {
        self.with_control("set mute", |control| control.set_mute(mute))
            .map(|()| mute)
    }

    /// Release the native control. Idempotent.
    ///
    /// Waits for an operation in progress on another thread to finish first.
    pub fn release(&self) {
        if self.control.lock().take().is_some() {
            debug!(
                "Released volume handle for {} (pid {})",
                self.executable_path, self.process_id
            );
        }
    }

    fn with_control<T>(
        &self,
        op: &str,
        f: impl FnOnce(&dyn SessionVolume) -> SessionResult<T>,
    ) -> Option<T> {
        let mut guard = self.control.lock();
        let control = guard.as_deref()?;
        match f(control) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(
                    "{} failed for {} (pid {}): {}; invalidating handle",
                    op, self.executable_path, self.process_id, e
                );
                *guard = None;
                None
            }
        }
    }
}

impl Drop for VolumeControlHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for VolumeControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeControlHandle")
            .field("process_id", &self.process_id)
            .field("executable_path", &self.executable_path)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Saturate a normalized level into `[0, 1]`; NaN maps to 0
pub fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}
