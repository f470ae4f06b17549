//! Platform seams: audio session provider and process identity resolver
//!
//! The session directory only ever talks to the platform through these traits.
//! A native implementation lives in [`super::platform`]; tests plug in mocks.

use super::error::SessionResult;

/// Device role used to pick the default output endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceRole {
    /// Games, system notification sounds, voice commands
    Console,
    /// Music, movies, narration
    #[default]
    Multimedia,
    /// Voice communications
    Communications,
}

/// Volume controls of one native session
///
/// The value owns exactly one native reference; dropping it releases that
/// reference. Levels are normalized to `[0, 1]`.
pub trait SessionVolume: Send {
    /// Current master volume in `[0, 1]`
    fn volume(&self) -> SessionResult<f32>;

    /// Set master volume (callers pass a value already clamped to `[0, 1]`)
    fn set_volume(&self, level: f32) -> SessionResult<()>;

    /// Current mute state
    fn mute(&self) -> SessionResult<bool>;

    /// Set mute state
    fn set_mute(&self, mute: bool) -> SessionResult<()>;
}

/// One entry of a provider session listing
pub struct RawSession {
    /// Owning process id (0 for the system sounds session)
    pub process_id: u32,
    /// Control reference, released when dropped
    pub control: Box<dyn SessionVolume>,
}

impl std::fmt::Debug for RawSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSession")
            .field("process_id", &self.process_id)
            .finish_non_exhaustive()
    }
}

/// OS capability listing the active audio sessions of the default output device
pub trait AudioSessionProvider: Send + Sync {
    /// List the current sessions for the default render endpoint of `role`
    ///
    /// Fails only with `ProviderUnavailable`.
    fn list_sessions(&self, role: DeviceRole) -> SessionResult<Vec<RawSession>>;
}

/// Maps a process id to the full path of its executable
pub trait ProcessResolver: Send + Sync {
    /// Resolve `pid`, failing with `ProcessGone` if the process no longer exists
    fn resolve_executable_path(&self, pid: u32) -> SessionResult<String>;
}
