//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PlaybackError, Result};

/// A playable item, identified by its file path
///
/// Equality is by value: two tracks with the same path are the same track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    path: PathBuf,
}

impl Track {
    /// Create a track from a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path used to open the track
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for display, falling back to the full path
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Whether the identifier is missing
    pub fn is_blank(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Reject blank tracks before any state is touched
    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_blank() {
            return Err(PlaybackError::InvalidInput(
                "no audio track was provided".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for Track {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for Track {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing loaded, or loaded and not running
    Stopped,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,
}

/// How an entry relates to the cursor, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryRole {
    /// The now-playing entry
    Current,

    /// Attributed to the queue segment
    Queued,

    /// Part of the base ordering
    Base,
}

/// The entry that will play after the current one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upcoming {
    pub track: Track,
    pub queued: bool,
}

/// Point-in-time view of the engine for periodic status polling
///
/// Fields are read one after another; nothing guarantees they describe the
/// same instant if a command runs between two polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub current_track: Option<Track>,
    pub state: PlaybackState,
    pub current_micros: u64,
    pub total_micros: u64,
    pub current_time: String,
    pub total_time: String,
    pub repeat: bool,
    pub shuffle: bool,
    pub cursor: usize,
    pub queue_count: usize,
}

/// Configuration for the playback engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial repeat mode (default: false)
    pub repeat: bool,

    /// Initial shuffle mode (default: false)
    pub shuffle: bool,

    /// Distance from the end that still counts as a finished track (default: 1s)
    pub end_of_track_tolerance_micros: u64,

    /// Seeks closer than this to the current position are ignored (default: 100ms)
    pub seek_debounce_micros: u64,

    /// Capacity of the device notice channel (default: 32)
    pub notice_capacity: usize,

    /// Suggested interval for status polling (default: 500ms)
    pub status_poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repeat: false,
            shuffle: false,
            end_of_track_tolerance_micros: 1_000_000,
            seek_debounce_micros: 100_000,
            notice_capacity: 32,
            status_poll_interval_ms: 500,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidInput(format!("invalid engine config: {e}")))
    }
}

/// Format a microsecond count as `MM:SS`
///
/// Truncates to whole seconds; minutes are not capped at 59.
pub fn format_micros(micros: u64) -> String {
    let total_seconds = micros / 1_000_000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
