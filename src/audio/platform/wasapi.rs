//! Windows Core Audio session provider
//!
//! Device enumerator, endpoint, session manager and session enumerator are
//! owned interface values released on drop at the end of each listing. Each
//! listed session carries its own `ISimpleAudioVolume` reference.

use std::cell::Cell;
use tracing::debug;

use ::windows::core::{Interface, GUID, HRESULT, PWSTR};
use ::windows::Win32::Foundation::{CloseHandle, BOOL, HANDLE, RPC_E_CHANGED_MODE};
use ::windows::Win32::Media::Audio::{
    eCommunications, eConsole, eMultimedia, eRender, ERole, IAudioSessionControl2,
    IAudioSessionManager2, IMMDeviceEnumerator, ISimpleAudioVolume, MMDeviceEnumerator,
};
use ::windows::Win32::System::Com::{CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED};
use ::windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};

use crate::audio::error::{SessionError, SessionResult};
use crate::audio::provider::{AudioSessionProvider, DeviceRole, ProcessResolver, RawSession, SessionVolume};

/// Event context passed with every volume change (GUID_NULL)
const EVENT_CONTEXT: GUID = GUID::zeroed();

/// Longest image path accepted from `QueryFullProcessImageNameW`
const MAX_IMAGE_PATH: usize = 32_768;

thread_local! {
    static COM_READY: Cell<bool> = const { Cell::new(false) };
}

/// Join the multithreaded apartment once per thread
fn ensure_com() -> SessionResult<()> {
    COM_READY.with(|ready| {
        if ready.get() {
            return Ok(());
        }
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        apartment_status(hr)?;
        ready.set(true);
        Ok(())
    })
}

/// Map the `CoInitializeEx` result; only the MTA is accepted
///
/// `RPC_E_CHANGED_MODE` means the thread already joined a single-threaded
/// apartment, whose interface pointers must not cross threads.
fn apartment_status(hr: HRESULT) -> SessionResult<()> {
    if hr == RPC_E_CHANGED_MODE {
        return Err(SessionError::unavailable(
            "thread is in a single-threaded COM apartment; audio sessions need the MTA",
        ));
    }
    if hr.is_ok() {
        Ok(())
    } else {
        Err(SessionError::unavailable(::windows::core::Error::from(hr)))
    }
}

fn device_role(role: DeviceRole) -> ERole {
    match role {
        DeviceRole::Console => eConsole,
        DeviceRole::Multimedia => eMultimedia,
        DeviceRole::Communications => eCommunications,
    }
}

/// Session provider backed by `IAudioSessionManager2`
pub struct WasapiSessionProvider;

impl WasapiSessionProvider {
    pub fn new() -> SessionResult<Self> {
        ensure_com()?;
        Ok(Self)
    }
}

impl AudioSessionProvider for WasapiSessionProvider {
    fn list_sessions(&self, role: DeviceRole) -> SessionResult<Vec<RawSession>> {
        ensure_com()?;

        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(SessionError::unavailable)?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, device_role(role))
                .map_err(SessionError::unavailable)?;
            let manager: IAudioSessionManager2 = device
                .Activate(CLSCTX_ALL, None)
                .map_err(SessionError::unavailable)?;
            let session_enumerator = manager
                .GetSessionEnumerator()
                .map_err(SessionError::unavailable)?;
            let count = session_enumerator
                .GetCount()
                .map_err(SessionError::unavailable)?;

            let mut sessions = Vec::with_capacity(count.max(0) as usize);
            for index in 0..count {
                let control = match session_enumerator.GetSession(index) {
                    Ok(control) => control,
                    Err(e) => {
                        debug!("Session {} unavailable: {}", index, e);
                        continue;
                    }
                };

                let process_id = match control
                    .cast::<IAudioSessionControl2>()
                    .and_then(|control2| control2.GetProcessId())
                {
                    Ok(pid) => pid,
                    Err(e) => {
                        debug!("Session {} has no process id: {}", index, e);
                        continue;
                    }
                };

                match control.cast::<ISimpleAudioVolume>() {
                    Ok(volume) => sessions.push(RawSession {
                        process_id,
                        control: Box::new(ComVolume(volume)),
                    }),
                    Err(e) => debug!("Session {} has no volume control: {}", index, e),
                }
            }

            Ok(sessions)
        }
    }
}

/// Owned `ISimpleAudioVolume` reference
struct ComVolume(ISimpleAudioVolume);

// SAFETY: the interface is obtained on an MTA thread, and MTA interface
// pointers may be called from any thread of the process.
unsafe impl Send for ComVolume {}

impl SessionVolume for ComVolume {
    fn volume(&self) -> SessionResult<f32> {
        unsafe { self.0.GetMasterVolume() }.map_err(|_| SessionError::HandleInvalid)
    }

    fn set_volume(&self, level: f32) -> SessionResult<()> {
        unsafe { self.0.SetMasterVolume(level, &EVENT_CONTEXT) }.map_err(|_| SessionError::HandleInvalid)
    }

    fn mute(&self) -> SessionResult<bool> {
        unsafe { self.0.GetMute() }
            .map(|mute| mute.as_bool())
            .map_err(|_| SessionError::HandleInvalid)
    }

    fn set_mute(&self, mute: bool) -> SessionResult<()> {
        unsafe { self.0.SetMute(BOOL::from(mute), &EVENT_CONTEXT) }.map_err(|_| SessionError::HandleInvalid)
    }
}

/// Resolves process ids through `QueryFullProcessImageNameW`
pub struct Win32ProcessResolver;

impl ProcessResolver for Win32ProcessResolver {
    fn resolve_executable_path(&self, pid: u32) -> SessionResult<String> {
        let gone = |_| SessionError::ProcessGone { pid };

        unsafe {
            let process = ProcessHandle(
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), pid).map_err(gone)?,
            );

            let mut buffer = vec![0u16; MAX_IMAGE_PATH];
            let mut size = buffer.len() as u32;
            QueryFullProcessImageNameW(process.0, PROCESS_NAME_WIN32, PWSTR(buffer.as_mut_ptr()), &mut size)
                .map_err(gone)?;

            Ok(String::from_utf16_lossy(&buffer[..size as usize]))
        }
    }
}

/// Process handle closed on drop
struct ProcessHandle(HANDLE);

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::windows::Win32::Foundation::{E_OUTOFMEMORY, S_FALSE, S_OK};

    #[test]
    fn test_single_threaded_apartment_is_unavailable() {
        assert!(matches!(
            apartment_status(RPC_E_CHANGED_MODE),
            Err(SessionError::ProviderUnavailable(_))
        ));
    }

    #[test]
    fn test_multithreaded_apartment_is_accepted() {
        assert!(apartment_status(S_OK).is_ok());
        // Already initialized as MTA on this thread
        assert!(apartment_status(S_FALSE).is_ok());
        assert!(apartment_status(E_OUTOFMEMORY).is_err());
    }
}
