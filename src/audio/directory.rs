//! Session directory - discovery of applications holding an audio session
//!
//! Every call takes a fresh session listing from the provider. Session controls
//! that are not handed out are dropped (and thereby released) before the call
//! returns, on every path including early exits.
//!
//! The directory keeps a small advisory table of `executable path -> pid`. It
//! only decides which session to *try first* in [`SessionDirectory::find_handle`];
//! the hinted process is still resolved before it is accepted. Within one
//! listing only the first session of an executable is remembered, so a hint
//! never points past the session a full scan would pick.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::application::{path_key, same_executable, AudioApplication};
use super::error::{SessionError, SessionResult};
use super::handle::VolumeControlHandle;
use super::provider::{AudioSessionProvider, DeviceRole, ProcessResolver, RawSession};

/// Default bound of the advisory pid table
pub const DEFAULT_HINT_CAPACITY: usize = 64;

/// Live view of the audio sessions on the default output device
pub struct SessionDirectory {
    provider: Arc<dyn AudioSessionProvider>,
    resolver: Arc<dyn ProcessResolver>,
    role: DeviceRole,
    /// Lowercased executable path -> last pid seen for it
    pid_hints: DashMap<String, u32>,
    hint_capacity: usize,
}

impl SessionDirectory {
    pub fn new(provider: Arc<dyn AudioSessionProvider>, resolver: Arc<dyn ProcessResolver>) -> Self {
        Self::with_hint_capacity(provider, resolver, DEFAULT_HINT_CAPACITY)
    }

    pub fn with_hint_capacity(
        provider: Arc<dyn AudioSessionProvider>,
        resolver: Arc<dyn ProcessResolver>,
        hint_capacity: usize,
    ) -> Self {
        Self {
            provider,
            resolver,
            role: DeviceRole::Multimedia,
            pid_hints: DashMap::new(),
            hint_capacity: hint_capacity.max(1),
        }
    }

    /// Executable paths of all applications with an active session
    ///
    /// Provider order, first occurrence wins when an executable owns several
    /// sessions. System sessions (pid 0) and processes that exit mid-scan are
    /// skipped.
    pub fn enumerate_applications(&self) -> SessionResult<Vec<String>> {
        let sessions = self.list()?;
        let mut seen = HashSet::new();
        let mut paths: Vec<String> = Vec::with_capacity(sessions.len());

        for session in sessions {
            let Some((path, first)) = self.identify(&session, &mut seen) else {
                continue;
            };
            if !first {
                continue;
            }
            debug!("Discovered audio application {}", path);
            paths.push(path);
        }

        Ok(paths)
    }

    /// Same as [`enumerate_applications`](Self::enumerate_applications), as identity records
    pub fn applications(&self) -> SessionResult<Vec<AudioApplication>> {
        Ok(self
            .enumerate_applications()?
            .into_iter()
            .map(AudioApplication::new)
            .collect())
    }

    /// Open an exclusive handle on the first session owned by `executable_path`
    ///
    /// Matching is case-insensitive. `Ok(None)` when no live session matches.
    pub fn find_handle(&self, executable_path: &str) -> SessionResult<Option<VolumeControlHandle>> {
        let mut sessions = self.list()?;
        let key = path_key(executable_path);
        let mut seen = HashSet::new();

        if let Some(index) = self.hinted_index(&key, &sessions) {
            let session = sessions.remove(index);
            match self.resolve(session.process_id) {
                Some(path) if same_executable(&path, executable_path) => {
                    debug!("Session for {} found via pid hint", path);
                    return Ok(Some(open(session, path)));
                }
                _ => {
                    self.pid_hints.remove(&key);
                }
            }
        }

        for session in sessions {
            let Some((path, _)) = self.identify(&session, &mut seen) else {
                continue;
            };
            if same_executable(&path, executable_path) {
                debug!("Session for {} found (pid {})", path, session.process_id);
                return Ok(Some(open(session, path)));
            }
        }

        debug!("No active session for {}", executable_path);
        Ok(None)
    }

    /// Like [`find_handle`](Self::find_handle), with a missing session as `SessionNotFound`
    pub fn require_handle(&self, executable_path: &str) -> SessionResult<VolumeControlHandle> {
        self.find_handle(executable_path)?
            .ok_or_else(|| SessionError::SessionNotFound {
                path: executable_path.to_string(),
            })
    }

    /// Last pid seen for an executable (advisory only)
    pub fn cached_pid(&self, executable_path: &str) -> Option<u32> {
        self.pid_hints.get(&path_key(executable_path)).map(|pid| *pid)
    }

    fn list(&self) -> SessionResult<Vec<RawSession>> {
        match self.provider.list_sessions(self.role) {
            Ok(sessions) => Ok(sessions),
            Err(e) => {
                self.pid_hints.clear();
                warn!("Audio session listing failed: {}", e);
                Err(e)
            }
        }
    }

    fn hinted_index(&self, key: &str, sessions: &[RawSession]) -> Option<usize> {
        let pid = *self.pid_hints.get(key)?;
        sessions.iter().position(|s| s.process_id == pid && pid != 0)
    }

    /// Resolve a session's executable path, `None` for sessions to skip
    ///
    /// `seen` holds the executables already met in the current listing; the
    /// pid is remembered only for the first session of each, and the flag
    /// says whether this was that first session.
    fn identify(&self, session: &RawSession, seen: &mut HashSet<String>) -> Option<(String, bool)> {
        let pid = session.process_id;
        let path = self.resolve(pid)?;
        let first = seen.insert(path_key(&path));
        if first {
            self.remember(&path, pid);
        }
        Some((path, first))
    }

    fn resolve(&self, pid: u32) -> Option<String> {
        if pid == 0 {
            return None;
        }
        match self.resolver.resolve_executable_path(pid) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Skipping session of pid {}: {}", pid, e);
                None
            }
        }
    }

    fn remember(&self, path: &str, pid: u32) {
        let key = path_key(path);
        if self.pid_hints.len() >= self.hint_capacity && !self.pid_hints.contains_key(&key) {
            self.pid_hints.clear();
        }
        self.pid_hints.insert(key, pid);
    }
}

fn open(session: RawSession, path: String) -> VolumeControlHandle {
    VolumeControlHandle::new(session.process_id, path, session.control)
}
