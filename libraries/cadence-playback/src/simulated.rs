//! In-memory audio device
//!
//! Behaves like a clip-based output line without producing sound: a manual
//! clock moves the position of running output, reaching the end stops output
//! and fires the stop callback, and every call is recorded for inspection.
//! Clones share the same device, so a test can keep one clone to drive the
//! clock while the engine owns another.

use crate::device::{AudioDevice, AudioHandle, DeviceError, DeviceResult, StopCallback};
use crate::types::Track;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default length for tracks without a scripted length (3 minutes)
const DEFAULT_LENGTH_MICROS: u64 = 180_000_000;

/// A recorded device call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Open(Track),
    Start(Track),
    Stop(Track),
    Seek(Track, u64),
    Close(Track),
}

/// Scripted outcome for opening a path
#[derive(Debug, Clone, Copy)]
enum OpenScript {
    Length(u64),
    Unsupported,
    Unreadable,
}

struct Clip {
    track: Track,
    length: u64,
    position: u64,
    running: bool,
    callback: Option<Arc<dyn Fn() + Send + Sync>>,
}

#[derive(Default)]
struct DeviceState {
    scripts: HashMap<PathBuf, OpenScript>,
    clips: HashMap<u64, Clip>,
    next_id: u64,
    calls: Vec<DeviceCall>,
    max_open: usize,
    unavailable: bool,
    fail_seeks: bool,
    fail_starts: bool,
}

impl DeviceState {
    fn clip(&mut self, id: u64) -> Option<&mut Clip> {
        self.clips.get_mut(&id)
    }
}

/// Simulated output device
#[derive(Clone, Default)]
pub struct SimulatedDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    /// Create a device where every track opens with the default length
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the length of a track
    pub fn with_track(self, path: impl Into<PathBuf>, length_micros: u64) -> Self {
        self.lock()
            .scripts
            .insert(path.into(), OpenScript::Length(length_micros));
        self
    }

    /// Make opening a path fail with an unsupported format
    pub fn with_unsupported(self, path: impl Into<PathBuf>) -> Self {
        self.lock().scripts.insert(path.into(), OpenScript::Unsupported);
        self
    }

    /// Make opening a path fail with a read error
    pub fn with_unreadable(self, path: impl Into<PathBuf>) -> Self {
        self.lock().scripts.insert(path.into(), OpenScript::Unreadable);
        self
    }

    /// Refuse to open anything while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Fail every seek while set
    pub fn set_fail_seeks(&self, fail: bool) {
        self.lock().fail_seeks = fail;
    }

    /// Fail every start while set
    pub fn set_fail_starts(&self, fail: bool) {
        self.lock().fail_starts = fail;
    }

    /// Run the clock forward for all running output
    ///
    /// Output that reaches the end stops and notifies its subscriber.
    pub fn advance(&self, micros: u64) {
        let mut finished = Vec::new();
        {
            let mut state = self.lock();
            for clip in state.clips.values_mut().filter(|clip| clip.running) {
                clip.position = clip.position.saturating_add(micros).min(clip.length);
                if clip.position == clip.length {
                    clip.running = false;
                    finished.extend(clip.callback.clone());
                }
            }
        }
        for callback in finished {
            callback();
        }
    }

    /// Fire the stop callback of every open clip without changing its state
    ///
    /// Models an underrun or a device that reports stops spuriously.
    pub fn emit_spurious_stop(&self) {
        let callbacks: Vec<_> = self
            .lock()
            .clips
            .values()
            .filter_map(|clip| clip.callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.lock().clips.len()
    }

    /// Highest number of handles ever open at once
    pub fn max_open_handles(&self) -> usize {
        self.lock().max_open
    }

    /// Position of the most recently opened clip, if any
    pub fn position_micros(&self) -> Option<u64> {
        let state = self.lock();
        state
            .clips
            .iter()
            .max_by_key(|(id, _)| **id)
            .map(|(_, clip)| clip.position)
    }
}

impl AudioDevice for SimulatedDevice {
    fn open(&mut self, track: &Track) -> DeviceResult<Box<dyn AudioHandle>> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(DeviceError::Unavailable(
                "output line is held by another client".to_string(),
            ));
        }

        let length = match state.scripts.get(track.path()) {
            Some(OpenScript::Unsupported) => {
                return Err(DeviceError::UnsupportedFormat(track.display_name()));
            }
            Some(OpenScript::Unreadable) => return Err(DeviceError::Io(track.display_name())),
            Some(OpenScript::Length(length)) => *length,
            None => DEFAULT_LENGTH_MICROS,
        };

        let id = state.next_id;
        state.next_id += 1;
        state.calls.push(DeviceCall::Open(track.clone()));
        state.clips.insert(
            id,
            Clip {
                track: track.clone(),
                length,
                position: 0,
                running: false,
                callback: None,
            },
        );
        state.max_open = state.max_open.max(state.clips.len());

        Ok(Box::new(SimulatedHandle {
            id,
            device: self.clone(),
        }))
    }
}

/// Handle to a clip on a [`SimulatedDevice`]
struct SimulatedHandle {
    id: u64,
    device: SimulatedDevice,
}

impl SimulatedHandle {
    fn read<T>(&self, f: impl FnOnce(&Clip) -> T, closed: T) -> T {
        self.device.lock().clips.get(&self.id).map_or(closed, f)
    }

    fn closed() -> DeviceError {
        DeviceError::Unavailable("handle is closed".to_string())
    }
}

impl AudioHandle for SimulatedHandle {
    fn position_micros(&self) -> u64 {
        self.read(|clip| clip.position, 0)
    }

    fn length_micros(&self) -> u64 {
        self.read(|clip| clip.length, 0)
    }

    fn is_running(&self) -> bool {
        self.read(|clip| clip.running, false)
    }

    fn start(&mut self) -> DeviceResult<()> {
        let mut state = self.device.lock();
        let fail = state.fail_starts;
        let clip = state.clip(self.id).ok_or_else(Self::closed)?;
        if fail {
            return Err(DeviceError::Unavailable("start refused".to_string()));
        }
        clip.running = true;
        let track = clip.track.clone();
        state.calls.push(DeviceCall::Start(track));
        Ok(())
    }

    fn stop(&mut self) -> DeviceResult<()> {
        let callback = {
            let mut state = self.device.lock();
            let clip = state.clip(self.id).ok_or_else(Self::closed)?;
            let was_running = std::mem::replace(&mut clip.running, false);
            let track = clip.track.clone();
            let callback = if was_running { clip.callback.clone() } else { None };
            state.calls.push(DeviceCall::Stop(track));
            callback
        };
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    fn seek(&mut self, micros: u64) -> DeviceResult<()> {
        let mut state = self.device.lock();
        let fail = state.fail_seeks;
        let clip = state.clip(self.id).ok_or_else(Self::closed)?;
        if fail {
            return Err(DeviceError::Unavailable("seek refused".to_string()));
        }
        clip.position = micros.min(clip.length);
        let track = clip.track.clone();
        state.calls.push(DeviceCall::Seek(track, micros));
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.device.lock();
        if let Some(clip) = state.clips.remove(&self.id) {
            state.calls.push(DeviceCall::Close(clip.track));
        }
    }

    fn on_stop(&mut self, callback: StopCallback) {
        if let Some(clip) = self.device.lock().clip(self.id) {
            clip.callback = Some(Arc::from(callback));
        }
    }
}
