//! Error types for playback management

use thiserror::Error;

/// Playback errors
///
/// Every variant is recoverable: the operation that returned it left the
/// playlist and session exactly as they were before the call.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Track argument was missing (empty identifier)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The device could not decode the track
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The track could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// The output device could not be acquired or refused the operation
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// No track is currently loaded
    #[error("No track loaded")]
    NothingLoaded,

    /// Playlist is empty
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// Queue segment is empty
    #[error("Queue is empty")]
    EmptyQueue,
}

impl PlaybackError {
    /// Whether this error belongs to the device-unavailable class
    ///
    /// `NothingLoaded` is reported separately so callers can prompt for a
    /// track, but it is the same class of failure as a missing device.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_) | Self::NothingLoaded)
    }
}

impl From<crate::device::DeviceError> for PlaybackError {
    fn from(err: crate::device::DeviceError) -> Self {
        use crate::device::DeviceError;

        match err {
            DeviceError::UnsupportedFormat(msg) => Self::UnsupportedFormat(msg),
            DeviceError::Io(msg) => Self::Io(msg),
            DeviceError::Unavailable(msg) => Self::DeviceUnavailable(msg),
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
