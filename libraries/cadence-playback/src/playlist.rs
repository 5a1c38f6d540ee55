//! Playlist with cursor and spliced queue segment
//!
//! The playlist is one ordered list. Tracks queued with "play next" are
//! inserted right after the cursor and counted, so the queue segment is the
//! run `cursor + 1 ..= cursor + queue_count`:
//!
//! ```text
//! index:   0     1     2     3     4
//!         [A]   [B]   [X]   [Y]   [C]
//!          |     ^     ^-----^
//!          |   cursor  queue segment (queue_count = 2)
//!          base ordering continues after the segment
//! ```
//!
//! The count is maintained by construction, not derived from the entries, so
//! shuffling or removals can make the attribution drift. [`PlaylistManager::entry_role`]
//! is an approximation for display, not a guarantee.

use crate::error::{PlaybackError, Result};
use crate::shuffle::{random_index_excluding, shuffle_around};
use crate::types::{EntryRole, Track, Upcoming};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Saved ordering, captured when shuffle is switched on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tracks: Vec<Track>,
    pub cursor: usize,
}

/// Ordering mode of the playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderMode {
    /// Tracks play in list order
    Sequential,

    /// Tracks play in random order; `backup` restores the list when shuffle is switched off
    Shuffled { backup: Snapshot },
}

/// Outcome of resolving the next entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved; this track should be loaded and started
    Load(Track),

    /// Ran off the end with repeat and shuffle off; playback should stop
    EndOfPlaylist,
}

/// Owns the ordered track list, the cursor, and the queue segment
#[derive(Debug, Clone)]
pub struct PlaylistManager {
    tracks: Vec<Track>,
    cursor: usize,
    queue_count: usize,
    order: OrderMode,
    repeat: bool,
    rng: StdRng,
}

impl Default for PlaylistManager {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl PlaylistManager {
    /// Create an empty playlist with the given initial modes
    pub fn new(repeat: bool, shuffle: bool) -> Self {
        Self::with_rng(repeat, shuffle, StdRng::from_entropy())
    }

    /// Create an empty playlist with a deterministic random sequence
    pub fn with_seed(repeat: bool, shuffle: bool, seed: u64) -> Self {
        Self::with_rng(repeat, shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(repeat: bool, shuffle: bool, rng: StdRng) -> Self {
        let order = if shuffle {
            OrderMode::Shuffled {
                backup: Snapshot::default(),
            }
        } else {
            OrderMode::Sequential
        };

        Self {
            tracks: Vec::new(),
            cursor: 0,
            queue_count: 0,
            order,
            repeat,
            rng,
        }
    }

    // ===== Editing =====

    /// Point the cursor at `track`, appending it if it is not in the list yet
    ///
    /// Never inserts a duplicate. Returns the new cursor.
    pub fn load_track(&mut self, track: &Track) -> Result<usize> {
        track.validate()?;

        self.cursor = match self.position_of(track) {
            Some(index) => index,
            None => {
                self.tracks.push(track.clone());
                self.tracks.len() - 1
            }
        };
        Ok(self.cursor)
    }

    /// Insert `track` right after the cursor as a queued entry
    ///
    /// Duplicates are allowed. Returns the index it was inserted at.
    pub fn insert_to_queue(&mut self, track: Track) -> Result<usize> {
        track.validate()?;

        let index = (self.cursor + 1).min(self.tracks.len());
        self.tracks.insert(index, track);
        self.queue_count += 1;
        Ok(index)
    }

    /// Append `track` to the end of the list
    pub fn append_to_playlist(&mut self, track: Track) -> Result<()> {
        track.validate()?;

        self.tracks.push(track);
        Ok(())
    }

    /// Remove the entry right after the cursor from the queue segment
    pub fn remove_next_queued(&mut self) -> Result<Track> {
        if self.queue_count == 0 || self.tracks.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        let index = self.cursor + 1;
        if index >= self.tracks.len() {
            // Count outlived its entries (cursor moved onto the last one)
            return Err(PlaybackError::EmptyQueue);
        }

        self.queue_count -= 1;
        Ok(self.tracks.remove(index))
    }

    /// Empty the list, the queue segment, and any shuffle backup
    ///
    /// The shuffle flag itself survives.
    pub fn clear(&mut self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(PlaybackError::EmptyPlaylist);
        }

        self.tracks.clear();
        self.cursor = 0;
        self.queue_count = 0;
        if let OrderMode::Shuffled { backup } = &mut self.order {
            *backup = Snapshot::default();
        }
        Ok(())
    }

    // ===== Modes =====

    /// Flip shuffle mode, returning the new state
    ///
    /// Switching on saves the current order and moves the current entry to
    /// the front of a shuffled list. Switching off restores the saved order
    /// and finds the current entry in it again.
    pub fn toggle_shuffle(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.order, OrderMode::Sequential);

        match previous {
            OrderMode::Sequential => {
                let backup = Snapshot {
                    tracks: self.tracks.clone(),
                    cursor: self.cursor,
                };

                if self.tracks.len() > 1 {
                    shuffle_around(&mut self.tracks, self.cursor, &mut self.rng);
                    self.cursor = 0;
                }

                self.order = OrderMode::Shuffled { backup };
                true
            }
            OrderMode::Shuffled { backup } => {
                if !backup.tracks.is_empty() {
                    let current = self.current_track().cloned();
                    self.tracks = backup.tracks;
                    self.cursor = current
                        .and_then(|track| self.position_of(&track))
                        .unwrap_or(backup.cursor)
                        .min(self.tracks.len() - 1);
                }
                false
            }
        }
    }

    /// Flip repeat mode, returning the new state
    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    // ===== Navigation =====

    /// Resolve and move to the next entry
    ///
    /// Shuffle wins over repeat. Any successful move consumes one queued entry.
    pub fn advance_next(&mut self) -> Result<Advance> {
        if self.tracks.is_empty() {
            return Err(PlaybackError::EmptyPlaylist);
        }

        let len = self.tracks.len();
        let target = if self.is_shuffled() {
            random_index_excluding(len, self.cursor, &mut self.rng)
        } else if self.repeat {
            (self.cursor + 1) % len
        } else if self.cursor + 1 < len {
            self.cursor + 1
        } else {
            self.cursor = len - 1;
            return Ok(Advance::EndOfPlaylist);
        };

        self.cursor = target;
        self.queue_count = self.queue_count.saturating_sub(1);
        Ok(Advance::Load(self.tracks[self.cursor].clone()))
    }

    /// Move to the previous entry, or stay on the first one
    ///
    /// Returns the track to load and restart.
    pub fn advance_previous(&mut self) -> Result<Track> {
        if self.tracks.is_empty() {
            return Err(PlaybackError::EmptyPlaylist);
        }

        self.cursor = self.cursor.min(self.tracks.len() - 1).saturating_sub(1);
        Ok(self.tracks[self.cursor].clone())
    }

    // ===== Queries =====

    /// Track under the cursor
    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.cursor)
    }

    /// Cursor position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Size of the queue segment
    pub fn queue_count(&self) -> usize {
        self.queue_count
    }

    /// All entries in play order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether shuffle mode is on
    pub fn is_shuffled(&self) -> bool {
        matches!(self.order, OrderMode::Shuffled { .. })
    }

    /// Whether repeat mode is on
    pub fn is_repeat(&self) -> bool {
        self.repeat
    }

    /// Current ordering mode
    pub fn order_mode(&self) -> &OrderMode {
        &self.order
    }

    /// Display role of the entry at `index`
    ///
    /// Uses `cursor < index <= cursor + queue_count`, which can mislabel
    /// entries after shuffles or removals.
    pub fn entry_role(&self, index: usize) -> Option<EntryRole> {
        if index >= self.tracks.len() {
            return None;
        }

        let role = if index == self.cursor {
            EntryRole::Current
        } else if index > self.cursor && index <= self.cursor + self.queue_count {
            EntryRole::Queued
        } else {
            EntryRole::Base
        };
        Some(role)
    }

    /// Entry right after the cursor, and whether it is attributed to the queue
    pub fn upcoming(&self) -> Option<Upcoming> {
        let index = self.cursor + 1;
        self.tracks.get(index).map(|track| Upcoming {
            track: track.clone(),
            queued: self.entry_role(index) == Some(EntryRole::Queued),
        })
    }

    fn position_of(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t == track)
    }
}
