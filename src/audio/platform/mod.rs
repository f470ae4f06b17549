//! Native session providers
//!
//! Only Windows Core Audio is supported. On other platforms the backend
//! reports `ProviderUnavailable` so the diagnostics commands still run.

#[cfg(windows)]
pub mod wasapi;

use std::sync::Arc;

use super::directory::SessionDirectory;
use super::error::SessionResult;
#[cfg(not(windows))]
use super::error::SessionError;
#[cfg(windows)]
use super::provider::{AudioSessionProvider, ProcessResolver};

/// Build a session directory on top of the platform's native provider
pub fn system_directory(hint_capacity: usize) -> SessionResult<Arc<SessionDirectory>> {
    #[cfg(windows)]
    {
        let provider: Arc<dyn AudioSessionProvider> = Arc::new(wasapi::WasapiSessionProvider::new()?);
        let resolver: Arc<dyn ProcessResolver> = Arc::new(wasapi::Win32ProcessResolver);
        Ok(Arc::new(SessionDirectory::with_hint_capacity(
            provider,
            resolver,
            hint_capacity,
        )))
    }

    #[cfg(not(windows))]
    {
        let _ = hint_capacity;
        Err(SessionError::ProviderUnavailable(format!(
            "per-application audio sessions are not supported on {}",
            std::env::consts::OS
        )))
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_platform_reports_unavailable() {
        let err = system_directory(8).err().expect("no native provider off Windows");
        assert!(matches!(err, SessionError::ProviderUnavailable(_)));
    }
}
