//! Audio device abstraction
//!
//! Decoding and output belong to the platform. The engine only needs to open
//! a track, move its position, start and stop output, and hear about stops.

use crate::types::Track;
use thiserror::Error;

/// Device-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The track's encoding is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The track could not be read
    #[error("read failure: {0}")]
    Io(String),

    /// The output line could not be acquired or refused the operation
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Result type for device calls
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Callback fired by the device whenever output stops
///
/// Runs on a context owned by the device. It must not touch engine state
/// directly; the engine installs a callback that only forwards a notice.
pub type StopCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Opens tracks for playback
pub trait AudioDevice: Send {
    /// Open a track, returning a handle positioned at the start
    fn open(&mut self, track: &Track) -> DeviceResult<Box<dyn AudioHandle>>;
}

/// One open track on the output device
///
/// The device fires the stop callback for every stop, intentional or not:
/// an explicit `stop()` on running output, the end of the track, or an
/// underrun. Implementations may also fire it on position jumps.
pub trait AudioHandle: Send {
    /// Current playback position
    fn position_micros(&self) -> u64;

    /// Total track length
    fn length_micros(&self) -> u64;

    /// Whether output is running
    fn is_running(&self) -> bool;

    /// Start (or continue) output from the current position
    fn start(&mut self) -> DeviceResult<()>;

    /// Stop output, keeping the position
    fn stop(&mut self) -> DeviceResult<()>;

    /// Move the position
    fn seek(&mut self, micros: u64) -> DeviceResult<()>;

    /// Release the handle; no callbacks fire afterwards
    fn close(&mut self);

    /// Subscribe to stop notifications, replacing any previous subscriber
    fn on_stop(&mut self, callback: StopCallback);
}
