//! Error taxonomy for the audio session layer

use thiserror::Error;

/// Errors raised while discovering sessions or driving a volume handle
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The process exited while its identity was being resolved
    #[error("process {pid} is gone")]
    ProcessGone { pid: u32 },

    /// No active session belongs to the requested executable
    #[error("no active audio session for '{path}'")]
    SessionNotFound { path: String },

    /// The handle was released or its session disappeared
    #[error("volume handle is no longer valid")]
    HandleInvalid,

    /// The native audio subsystem could not be reached
    #[error("audio provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl SessionError {
    /// Build a `ProviderUnavailable` from any displayable cause
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::ProviderUnavailable(cause.to_string())
    }
}

/// Result alias for the audio session layer
pub type SessionResult<T> = Result<T, SessionError>;
