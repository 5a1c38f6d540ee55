//! Playback Events
//!
//! Event-based communication for the presentation layer. Commands return
//! their own errors; events cover what a caller cannot see from a return
//! value, mostly the automatic advance after a track ends.

use crate::types::{PlaybackState, Track};
use serde::{Deserialize, Serialize};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback state changed (playing, paused, stopped)
    StateChanged {
        /// The new playback state
        state: PlaybackState,
    },

    /// A new track was opened on the device
    TrackChanged {
        /// The new (current) track
        track: Track,
        /// Track that was open before, if any
        previous: Option<Track>,
    },

    /// Track finished playing naturally (reached end)
    TrackFinished {
        /// The finished track
        track: Track,
    },

    /// Playlist or queue segment changed
    QueueChanged {
        /// New playlist length
        length: usize,
        /// New queue segment size
        queued: usize,
    },

    /// Repeat or shuffle toggled
    ModesChanged { repeat: bool, shuffle: bool },

    /// Error with no caller to report to (automatic advance)
    Error {
        /// Error message
        message: String,
    },
}
