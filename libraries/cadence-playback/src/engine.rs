//! Playback engine - command façade
//!
//! Composes the playlist and the session behind one command set. Manual
//! skips and automatic "track ended" advances go through the same
//! [`PlaylistManager::advance_next`] path.
//!
//! The device reports stops on its own context. Those reports are only
//! queued there; [`PlaybackEngine::process_device_notices`] handles them on
//! the control context that owns the engine, which is the only place the
//! playlist is mutated.

use crate::{
    device::AudioDevice,
    error::Result,
    events::PlaybackEvent,
    playlist::{Advance, PlaylistManager},
    session::{PlaybackSession, SessionTiming, StopNotice, StopVerdict},
    types::{EngineConfig, EntryRole, PlaybackState, StatusSnapshot, Track, Upcoming},
};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

/// Central playback control
///
/// All commands take `&mut self`, so they cannot overlap; drive the engine
/// from a single control context and pump device notices from it.
pub struct PlaybackEngine<D: AudioDevice> {
    device: D,
    playlist: PlaylistManager,
    session: PlaybackSession,

    // Device stop notices, filled from the device context
    notice_tx: Sender<StopNotice>,
    notice_rx: Receiver<StopNotice>,

    // Event queue for the presentation layer
    pending_events: Vec<PlaybackEvent>,

    config: EngineConfig,
}

impl<D: AudioDevice> PlaybackEngine<D> {
    /// Create an engine with an empty playlist
    pub fn new(device: D, config: EngineConfig) -> Self {
        let playlist = PlaylistManager::new(config.repeat, config.shuffle);
        Self::with_playlist(device, config, playlist)
    }

    /// Create an engine around an existing playlist
    ///
    /// The playlist's own modes win over the ones in `config`.
    pub fn with_playlist(device: D, config: EngineConfig, playlist: PlaylistManager) -> Self {
        let (notice_tx, notice_rx) = bounded(config.notice_capacity.max(1));
        let session = PlaybackSession::new(SessionTiming {
            end_of_track_tolerance_micros: config.end_of_track_tolerance_micros,
            seek_debounce_micros: config.seek_debounce_micros,
        });

        Self {
            device,
            playlist,
            session,
            notice_tx,
            notice_rx,
            pending_events: Vec::new(),
            config,
        }
    }

    // ===== Playback Control =====

    /// Make `track` current and open it, without starting output
    ///
    /// The cursor only moves once the device has opened the track.
    pub fn load(&mut self, track: Track) -> Result<()> {
        track.validate()?;
        self.open(track.clone())?;
        self.playlist.load_track(&track)?;
        Ok(())
    }

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        self.with_state_change(PlaybackSession::play)
    }

    /// Pause playback
    pub fn pause(&mut self) -> Result<()> {
        self.with_state_change(PlaybackSession::pause)
    }

    /// Stop playback and rewind
    pub fn stop(&mut self) -> Result<()> {
        self.with_state_change(PlaybackSession::stop)
    }

    /// Restart the current track from the beginning
    pub fn restart(&mut self) -> Result<()> {
        self.with_state_change(PlaybackSession::restart)
    }

    /// Skip to next track
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<()> {
        match self.playlist.advance_next()? {
            Advance::Load(track) => {
                info!("Advancing to {} (index {})", track, self.playlist.cursor());
                self.open_and_start(track)
            }
            Advance::EndOfPlaylist => {
                info!("End of playlist reached, stopping");
                self.stop()
            }
        }
    }

    /// Go to previous track, or restart the first one
    pub fn previous(&mut self) -> Result<()> {
        let track = self.playlist.advance_previous()?;
        info!("Going back to {} (index {})", track, self.playlist.cursor());
        self.open_and_start(track)
    }

    /// Seek within the current track
    pub fn set_position(&mut self, micros: u64) -> Result<()> {
        self.session.set_position(micros)
    }

    // ===== Queue =====

    /// Queue `track` to play right after the current one
    pub fn insert_to_queue(&mut self, track: Track) -> Result<()> {
        let index = self.playlist.insert_to_queue(track)?;
        debug!("Queued entry at index {}", index);
        self.emit_queue_changed();
        Ok(())
    }

    /// Append `track` to the end of the playlist
    pub fn append_to_playlist(&mut self, track: Track) -> Result<()> {
        self.playlist.append_to_playlist(track)?;
        self.emit_queue_changed();
        Ok(())
    }

    /// Remove the next queued entry
    pub fn remove_next_queued(&mut self) -> Result<Track> {
        let removed = self.playlist.remove_next_queued()?;
        self.emit_queue_changed();
        Ok(removed)
    }

    /// Empty the playlist and release the device
    pub fn clear_all(&mut self) -> Result<()> {
        self.playlist.clear()?;

        if let Err(e) = self.with_state_change(PlaybackSession::stop) {
            warn!("Failed to stop output while clearing: {}", e);
        }
        self.session.release();

        info!("Playlist cleared");
        self.emit_queue_changed();
        Ok(())
    }

    // ===== Modes =====

    /// Toggle shuffle, returning the new state
    pub fn toggle_shuffle(&mut self) -> bool {
        let shuffle = self.playlist.toggle_shuffle();
        info!("Shuffle {}", if shuffle { "on" } else { "off" });
        self.emit_modes_changed();
        shuffle
    }

    /// Toggle repeat, returning the new state
    pub fn toggle_repeat(&mut self) -> bool {
        let repeat = self.playlist.toggle_repeat();
        info!("Repeat {}", if repeat { "on" } else { "off" });
        self.emit_modes_changed();
        repeat
    }

    // ===== Device notices =====

    /// Handle stop notices the device has queued since the last call
    ///
    /// Call this from the control context, e.g. on every UI tick. Natural
    /// completions advance the playlist; everything else is dropped. Returns
    /// the number of completions handled.
    pub fn process_device_notices(&mut self) -> usize {
        let mut completed = 0;

        while let Ok(notice) = self.notice_rx.try_recv() {
            match self.session.handle_stop(notice) {
                StopVerdict::Completed => {
                    completed += 1;
                    self.handle_track_finished();
                }
                verdict => debug!("Ignoring stop notice {:?}: {:?}", notice, verdict),
            }
        }

        completed
    }

    /// Release the device handle
    pub fn close(&mut self) {
        let before = self.session.state();
        self.session.release();
        if before != PlaybackState::Stopped {
            self.emit_state_changed(PlaybackState::Stopped);
        }
    }

    // ===== State Queries =====

    /// Track open on the device
    pub fn current_track(&self) -> Option<&Track> {
        self.session.current_track()
    }

    pub fn cursor_index(&self) -> usize {
        self.playlist.cursor()
    }

    pub fn queue_count(&self) -> usize {
        self.playlist.queue_count()
    }

    /// Copy of the playlist in play order
    pub fn playlist_snapshot(&self) -> Vec<Track> {
        self.playlist.tracks().to_vec()
    }

    /// Playlist (read-only)
    pub fn playlist(&self) -> &PlaylistManager {
        &self.playlist
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state()
    }

    pub fn repeat_mode(&self) -> bool {
        self.playlist.is_repeat()
    }

    pub fn shuffle_mode(&self) -> bool {
        self.playlist.is_shuffled()
    }

    /// Position in microseconds (0 if nothing open)
    pub fn current_time(&self) -> u64 {
        self.session.current_time()
    }

    /// Track length in microseconds (0 if nothing open)
    pub fn total_time(&self) -> u64 {
        self.session.total_time()
    }

    /// Position captured at the last pause, moved by seeks while paused
    pub fn pause_position(&self) -> u64 {
        self.session.pause_position()
    }

    pub fn formatted_current_time(&self) -> String {
        self.session.formatted_current_time()
    }

    pub fn formatted_total_time(&self) -> String {
        self.session.formatted_total_time()
    }

    pub fn formatted_pause_time(&self) -> &str {
        self.session.formatted_pause_time()
    }

    /// Display role of the playlist entry at `index`
    pub fn entry_role(&self, index: usize) -> Option<EntryRole> {
        self.playlist.entry_role(index)
    }

    /// Entry after the cursor
    pub fn upcoming(&self) -> Option<Upcoming> {
        self.playlist.upcoming()
    }

    /// Everything a periodic status poll needs
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            current_track: self.session.current_track().cloned(),
            state: self.session.state(),
            current_micros: self.current_time(),
            total_micros: self.total_time(),
            current_time: self.formatted_current_time(),
            total_time: self.formatted_total_time(),
            repeat: self.repeat_mode(),
            shuffle: self.shuffle_mode(),
            cursor: self.cursor_index(),
            queue_count: self.queue_count(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===== Events =====

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    // ===== Internal =====

    fn open(&mut self, track: Track) -> Result<()> {
        let previous = self.session.current_track().cloned();
        let before = self.session.state();

        let opened = self.session.open(&mut self.device, &track, &self.notice_tx);
        if before != PlaybackState::Stopped && self.session.state() == PlaybackState::Stopped {
            self.emit_state_changed(PlaybackState::Stopped);
        }
        opened?;

        info!("Loaded {}", track);
        self.pending_events
            .push(PlaybackEvent::TrackChanged { track, previous });
        Ok(())
    }

    fn open_and_start(&mut self, track: Track) -> Result<()> {
        self.open(track)?;
        self.play()
    }

    fn handle_track_finished(&mut self) {
        if let Some(track) = self.session.current_track().cloned() {
            info!("Track finished: {}", track);
            self.pending_events
                .push(PlaybackEvent::TrackFinished { track });
        }

        if let Err(e) = self.next() {
            warn!("Automatic advance failed: {}", e);
            self.pending_events.push(PlaybackEvent::Error {
                message: e.to_string(),
            });
        }
    }

    fn with_state_change(
        &mut self,
        op: impl FnOnce(&mut PlaybackSession) -> Result<()>,
    ) -> Result<()> {
        let before = self.session.state();
        let result = op(&mut self.session);
        let after = self.session.state();
        if after != before {
            self.emit_state_changed(after);
        }
        result
    }

    fn emit_state_changed(&mut self, state: PlaybackState) {
        self.pending_events
            .push(PlaybackEvent::StateChanged { state });
    }

    fn emit_queue_changed(&mut self) {
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.playlist.len(),
            queued: self.playlist.queue_count(),
        });
    }

    fn emit_modes_changed(&mut self) {
        self.pending_events.push(PlaybackEvent::ModesChanged {
            repeat: self.playlist.is_repeat(),
            shuffle: self.playlist.is_shuffled(),
        });
    }
}
