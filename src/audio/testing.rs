//! In-memory audio system used by the session, handle and controller tests

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::{SessionError, SessionResult};
use super::handle::VolumeControlHandle;
use super::provider::{AudioSessionProvider, DeviceRole, ProcessResolver, RawSession, SessionVolume};

/// Shared state of one fake session
pub(crate) struct MockSession {
    level: Mutex<f32>,
    mute: Mutex<bool>,
    alive: AtomicBool,
    writes: Mutex<Vec<f32>>,
    live_refs: AtomicUsize,
    gate: Mutex<Gate>,
    gate_changed: Condvar,
    read_delay_us: AtomicU64,
}

#[derive(Default)]
struct Gate {
    closed: bool,
    blocked_reads: usize,
}

impl MockSession {
    pub(crate) fn level(&self) -> f32 {
        *self.level.lock()
    }

    /// Every level passed to `set_volume`, in order
    pub(crate) fn writes(&self) -> Vec<f32> {
        self.writes.lock().clone()
    }

    /// Control references not yet dropped
    pub(crate) fn live_refs(&self) -> usize {
        self.live_refs.load(Ordering::SeqCst)
    }

    pub(crate) fn revive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Hold every volume read until [`open_gate`](Self::open_gate)
    pub(crate) fn close_gate(&self) {
        self.gate.lock().closed = true;
    }

    pub(crate) fn open_gate(&self) {
        self.gate.lock().closed = false;
        self.gate_changed.notify_all();
    }

    /// Block until a volume read is parked at the closed gate
    pub(crate) fn wait_for_blocked_read(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.gate.lock();
        while gate.blocked_reads == 0 {
            if self.gate_changed.wait_until(&mut gate, deadline).timed_out() {
                return gate.blocked_reads > 0;
            }
        }
        true
    }

    /// Stall each volume read after the level is taken, widening any
    /// read-modify-write window
    pub(crate) fn set_read_delay(&self, delay: Duration) {
        self.read_delay_us.store(delay.as_micros() as u64, Ordering::SeqCst);
    }

    fn pass_gate(&self) {
        let mut gate = self.gate.lock();
        if !gate.closed {
            return;
        }
        gate.blocked_reads += 1;
        self.gate_changed.notify_all();
        while gate.closed {
            self.gate_changed.wait(&mut gate);
        }
        gate.blocked_reads -= 1;
    }

    fn check_alive(&self) -> SessionResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::HandleInvalid)
        }
    }
}

struct MockVolume {
    session: Arc<MockSession>,
}

impl MockVolume {
    fn new(session: Arc<MockSession>) -> Self {
        session.live_refs.fetch_add(1, Ordering::SeqCst);
        Self { session }
    }
}

impl Drop for MockVolume {
    fn drop(&mut self) {
        self.session.live_refs.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionVolume for MockVolume {
    fn volume(&self) -> SessionResult<f32> {
        self.session.pass_gate();
        self.session.check_alive()?;
        let level = *self.session.level.lock();
        let delay = self.session.read_delay_us.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
        Ok(level)
    }

    fn set_volume(&self, level: f32) -> SessionResult<()> {
        self.session.check_alive()?;
        *self.session.level.lock() = level;
        self.session.writes.lock().push(level);
        Ok(())
    }

    fn mute(&self) -> SessionResult<bool> {
        self.session.check_alive()?;
        Ok(*self.session.mute.lock())
    }

    fn set_mute(&self, mute: bool) -> SessionResult<()> {
        self.session.check_alive()?;
        *self.session.mute.lock() = mute;
        Ok(())
    }
}

struct Entry {
    pid: u32,
    session: Arc<MockSession>,
}

/// Fake session provider and process table in one
pub(crate) struct MockSystem {
    entries: Mutex<Vec<Entry>>,
    processes: Mutex<HashMap<u32, String>>,
    available: AtomicBool,
    resolve_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockSystem {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            processes: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            resolve_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        })
    }

    /// Register a running process with an audio session at `level`
    pub(crate) fn add_session(&self, pid: u32, path: &str, level: f32) -> Arc<MockSession> {
        let session = Arc::new(MockSession {
            level: Mutex::new(level),
            mute: Mutex::new(false),
            alive: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            live_refs: AtomicUsize::new(0),
            gate: Mutex::new(Gate::default()),
            gate_changed: Condvar::new(),
            read_delay_us: AtomicU64::new(0),
        });
        self.entries.lock().push(Entry {
            pid,
            session: session.clone(),
        });
        self.processes.lock().insert(pid, path.to_string());
        session
    }

    /// The process exits but its session is still listed
    pub(crate) fn kill_process(&self, pid: u32) {
        self.processes.lock().remove(&pid);
    }

    /// The session goes away; existing controls start failing
    pub(crate) fn end_session(&self, pid: u32) {
        let mut entries = self.entries.lock();
        for entry in entries.iter().filter(|e| e.pid == pid) {
            entry.session.alive.store(false, Ordering::SeqCst);
        }
        entries.retain(|e| e.pid != pid);
    }

    /// Reuse a process id for a different executable
    pub(crate) fn recycle_pid(&self, pid: u32, path: &str) {
        self.processes.lock().insert(pid, path.to_string());
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Open a handle directly, bypassing the session directory
    pub(crate) fn handle_for(&self, pid: u32) -> VolumeControlHandle {
        let entries = self.entries.lock();
        let entry = entries
            .iter()
            .find(|e| e.pid == pid)
            .expect("no mock session for pid");
        let path = self.processes.lock().get(&pid).cloned().unwrap_or_default();
        VolumeControlHandle::new(pid, path, Box::new(MockVolume::new(entry.session.clone())))
    }
}

impl AudioSessionProvider for MockSystem {
    fn list_sessions(&self, _role: DeviceRole) -> SessionResult<Vec<RawSession>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(SessionError::unavailable("mock audio service stopped"));
        }
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|e| RawSession {
                process_id: e.pid,
                control: Box::new(MockVolume::new(e.session.clone())),
            })
            .collect())
    }
}

impl ProcessResolver for MockSystem {
    fn resolve_executable_path(&self, pid: u32) -> SessionResult<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.processes
            .lock()
            .get(&pid)
            .cloned()
            .ok_or(SessionError::ProcessGone { pid })
    }
}
