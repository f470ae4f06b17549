//! Application audio session manager
//!
//! Discovers which processes hold an audio output session, resolves an
//! executable path to a live volume handle, and applies bounded deltas.

pub mod application;
pub mod directory;
pub mod error;
pub mod handle;
pub mod platform;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use application::{display_name, AudioApplication};
pub use directory::{SessionDirectory, DEFAULT_HINT_CAPACITY};
pub use error::{SessionError, SessionResult};
pub use handle::{clamp_level, VolumeControlHandle};
pub use platform::system_directory;
pub use provider::{AudioSessionProvider, DeviceRole, ProcessResolver, RawSession, SessionVolume};
