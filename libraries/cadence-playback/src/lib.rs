//! Cadence - Playback Engine
//!
//! Playlist, queue and transport control for a local audio player.
//!
//! This crate provides:
//! - Ordered playlist with a cursor and an up-next queue segment
//! - Shuffle with a restorable backup of the unshuffled order
//! - Repeat (wrap at the end of the playlist)
//! - Play, pause, stop, restart and seek over one open device handle
//! - Automatic advance when a track finishes naturally
//! - Display helpers (formatted times, entry roles, status snapshots)
//!
//! # Architecture
//!
//! `cadence-playback` does no decoding and no output of its own. The
//! platform supplies an [`AudioDevice`]; the engine owns at most one
//! [`AudioHandle`] from it at a time.
//!
//! Stop notifications arrive on the device's context and are only queued
//! there. Call [`PlaybackEngine::process_device_notices`] from the context
//! that owns the engine (a UI tick, a control loop) to act on them.
//!
//! # Example: Basic Playback
//!
//! Uses the in-memory device from the `simulated` feature.
//!
//! ```rust
//! use cadence_playback::{EngineConfig, PlaybackEngine, SimulatedDevice, Track};
//!
//! let device = SimulatedDevice::new();
//! let mut engine = PlaybackEngine::new(device.clone(), EngineConfig::default());
//!
//! engine.load(Track::new("/music/intro.wav")).unwrap();
//! engine.append_to_playlist(Track::new("/music/outro.wav")).unwrap();
//! engine.play().unwrap();
//!
//! // The track plays to the end on the device...
//! device.advance(180_000_000);
//!
//! // ...and the control context advances the playlist
//! engine.process_device_notices();
//! assert_eq!(engine.current_track(), Some(&Track::new("/music/outro.wav")));
//! ```
//!
//! # Example: Queue, Shuffle and Repeat
//!
//! ```rust
//! use cadence_playback::{EntryRole, PlaylistManager, Track};
//!
//! let mut playlist = PlaylistManager::default();
//! playlist.load_track(&Track::new("/music/a.wav")).unwrap();
//! playlist.append_to_playlist(Track::new("/music/b.wav")).unwrap();
//! playlist.insert_to_queue(Track::new("/music/next.wav")).unwrap();
//!
//! assert_eq!(playlist.entry_role(1), Some(EntryRole::Queued));
//!
//! playlist.toggle_repeat();
//! playlist.toggle_shuffle();
//! assert!(playlist.is_shuffled());
//! ```
//!
//! # Example: Platform Integration
//!
//! ```rust,no_run
//! use cadence_playback::{
//!     AudioDevice, AudioHandle, DeviceResult, EngineConfig, PlaybackEngine, StopCallback, Track,
//! };
//!
//! struct MyOutput;
//!
//! struct MyClip {
//!     position: u64,
//!     running: bool,
//!     on_stop: Option<StopCallback>,
//! }
//!
//! impl AudioDevice for MyOutput {
//!     fn open(&mut self, _track: &Track) -> DeviceResult<Box<dyn AudioHandle>> {
//!         // Decode the file and acquire an output line
//!         Ok(Box::new(MyClip { position: 0, running: false, on_stop: None }))
//!     }
//! }
//!
//! impl AudioHandle for MyClip {
//!     fn position_micros(&self) -> u64 { self.position }
//!     fn length_micros(&self) -> u64 { 180_000_000 }
//!     fn is_running(&self) -> bool { self.running }
//!     fn start(&mut self) -> DeviceResult<()> { self.running = true; Ok(()) }
//!     fn stop(&mut self) -> DeviceResult<()> {
//!         self.running = false;
//!         if let Some(callback) = &self.on_stop {
//!             callback();
//!         }
//!         Ok(())
//!     }
//!     fn seek(&mut self, micros: u64) -> DeviceResult<()> { self.position = micros; Ok(()) }
//!     fn close(&mut self) { self.on_stop = None; }
//!     fn on_stop(&mut self, callback: StopCallback) { self.on_stop = Some(callback); }
//! }
//!
//! let mut engine = PlaybackEngine::new(MyOutput, EngineConfig::default());
//! engine.load(Track::new("/music/song.wav")).ok();
//! engine.play().ok();
//! ```

pub mod device;
mod engine;
mod error;
mod events;
pub mod playlist;
pub mod session;
mod shuffle;
#[cfg(any(test, feature = "simulated"))]
mod simulated;
pub mod types;

// Public exports
pub use device::{AudioDevice, AudioHandle, DeviceError, DeviceResult, StopCallback};
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use playlist::{Advance, OrderMode, PlaylistManager, Snapshot};
pub use session::{PlaybackSession, SessionTiming, StopMarker, StopNotice, StopVerdict};
#[cfg(any(test, feature = "simulated"))]
pub use simulated::{DeviceCall, SimulatedDevice};
pub use types::{
    format_micros, EngineConfig, EntryRole, PlaybackState, StatusSnapshot, Track, Upcoming,
};
