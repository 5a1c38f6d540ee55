//! Playback session for the currently open track
//!
//! Owns at most one device handle and the transport state around it. The
//! device reports every stop through an asynchronous callback, intentional
//! or not, so the session tags its own device operations and classifies each
//! stop notice when the control context gets around to handling it:
//!
//! ```text
//! device context                 control context
//!      │  stop callback                │
//!      │  StopNotice { generation }    │
//!      │──────────── channel ─────────>│ handle_stop()
//!      │                               │   stale generation   -> Stale
//!      │                               │   drained at the end -> Completed
//!      │                               │   marker Intentional -> Suppressed
//!      │                               │   otherwise          -> Dropped
//! ```

use crate::device::{AudioDevice, AudioHandle};
use crate::error::{PlaybackError, Result};
use crate::types::{format_micros, PlaybackState, Track};
use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, warn};

/// Stop notification forwarded from the device context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopNotice {
    /// Generation of the session that subscribed
    pub generation: u64,
}

/// Tag on the next expected stop notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopMarker {
    /// No programmatic operation is pending; a stop may be a completion
    #[default]
    Unmarked,

    /// The session stopped or moved output itself
    Intentional,
}

/// How a stop notice was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopVerdict {
    /// Track played to the end; the playlist should advance
    Completed,

    /// Caused by the session's own operation
    Suppressed,

    /// Neither intentional nor at the end (underrun, user stop)
    Dropped,

    /// From a handle that is no longer open
    Stale,
}

/// Session timing thresholds
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Distance from the end that still counts as finished
    pub end_of_track_tolerance_micros: u64,

    /// Seeks closer than this to the current position are ignored
    pub seek_debounce_micros: u64,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            end_of_track_tolerance_micros: 1_000_000,
            seek_debounce_micros: 100_000,
        }
    }
}

/// Live binding between the engine and one open device handle
pub struct PlaybackSession {
    handle: Option<Box<dyn AudioHandle>>,
    current: Option<Track>,
    paused: bool,
    pause_position_micros: u64,
    paused_time_text: String,
    marker: StopMarker,
    generation: u64,
    timing: SessionTiming,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(SessionTiming::default())
    }
}

impl PlaybackSession {
    /// Create an empty session
    pub fn new(timing: SessionTiming) -> Self {
        Self {
            handle: None,
            current: None,
            paused: false,
            pause_position_micros: 0,
            paused_time_text: String::new(),
            marker: StopMarker::Unmarked,
            generation: 0,
            timing,
        }
    }

    /// Open `track`, closing the previous handle first
    ///
    /// Stop notices from the new handle are sent to `notices`. On failure the
    /// session is left empty.
    pub fn open(
        &mut self,
        device: &mut dyn AudioDevice,
        track: &Track,
        notices: &Sender<StopNotice>,
    ) -> Result<()> {
        track.validate()?;

        self.release();

        let mut handle = device.open(track).map_err(|e| {
            warn!("Failed to open {}: {}", track, e);
            PlaybackError::from(e)
        })?;

        self.generation += 1;
        let notice = StopNotice {
            generation: self.generation,
        };
        let sender = notices.clone();
        handle.on_stop(Box::new(move || match sender.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Stop notice channel full, dropping notice {:?}", notice);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Stop notice receiver gone");
            }
        }));

        self.handle = Some(handle);
        self.current = Some(track.clone());
        self.paused = false;
        self.pause_position_micros = 0;
        self.paused_time_text.clear();
        self.marker = StopMarker::Unmarked;
        Ok(())
    }

    /// Close the open handle, if any
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.current = None;
        self.paused = false;
        self.pause_position_micros = 0;
        self.marker = StopMarker::Unmarked;
    }

    // ===== Transport =====

    /// Start or resume output
    pub fn play(&mut self) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(PlaybackError::NothingLoaded)?;
        if handle.is_running() {
            debug!("Already playing");
            return Ok(());
        }

        // Some devices report a stop when output jumps to the resume point
        self.marker = StopMarker::Intentional;

        let started = if self.paused {
            handle
                .seek(self.pause_position_micros)
                .and_then(|()| handle.start())
        } else {
            handle.start()
        };

        if let Err(e) = started {
            self.marker = StopMarker::Unmarked;
            warn!("Failed to start output: {}", e);
            return Err(e.into());
        }

        self.paused = false;
        Ok(())
    }

    /// Pause output, remembering the position
    pub fn pause(&mut self) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(PlaybackError::NothingLoaded)?;
        if !handle.is_running() {
            return Ok(());
        }

        self.marker = StopMarker::Intentional;
        let position = handle.position_micros();
        if let Err(e) = handle.stop() {
            self.marker = StopMarker::Unmarked;
            return Err(e.into());
        }

        self.pause_position_micros = position;
        self.paused = true;
        self.paused_time_text = format_micros(position);
        Ok(())
    }

    /// Stop output and rewind
    ///
    /// Leaves the marker unmarked: the notice is classified normally, and
    /// after the rewind it is not near the end, so it does not advance.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        self.marker = StopMarker::Unmarked;
        handle.stop()?;

        // Output is stopped from here on, even if the rewind fails
        self.paused = false;
        self.pause_position_micros = 0;
        handle.seek(0)?;
        Ok(())
    }

    /// Rewind and play from the start
    pub fn restart(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Ok(());
        }

        self.stop()?;
        if let Some(handle) = self.handle.as_mut() {
            handle.start()?;
        }
        Ok(())
    }

    /// Move the position, keeping the running/paused state
    ///
    /// Targets within the debounce window of the current position are ignored.
    pub fn set_position(&mut self, target_micros: u64) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        let current = handle.position_micros();
        if current.abs_diff(target_micros) <= self.timing.seek_debounce_micros {
            debug!("Ignoring seek to {}: within debounce window", format_micros(target_micros));
            return Ok(());
        }

        let was_running = handle.is_running();
        if was_running {
            self.marker = StopMarker::Intentional;
            if let Err(e) = handle.stop() {
                self.marker = StopMarker::Unmarked;
                return Err(e.into());
            }
        }

        if let Err(e) = handle.seek(target_micros) {
            warn!("Seek to {} failed: {}", format_micros(target_micros), e);
            if was_running {
                handle.start()?;
            }
            return Err(e.into());
        }

        if self.paused {
            self.pause_position_micros = target_micros;
        }

        if was_running && !self.paused {
            handle.start()?;
        }
        Ok(())
    }

    // ===== Notifications =====

    /// Classify a stop notice
    ///
    /// Consumes the marker. Only output that has drained at the end (not
    /// running, not paused, within tolerance) is a completion, whatever the
    /// marker says: several notices may be pending behind a single marker.
    pub fn handle_stop(&mut self, notice: StopNotice) -> StopVerdict {
        let Some(handle) = self.handle.as_ref() else {
            return StopVerdict::Stale;
        };
        if notice.generation != self.generation {
            return StopVerdict::Stale;
        }

        let marker = std::mem::take(&mut self.marker);
        let near_end = handle.length_micros().abs_diff(handle.position_micros())
            < self.timing.end_of_track_tolerance_micros;
        let drained = !self.paused && !handle.is_running() && near_end;

        match marker {
            _ if drained => StopVerdict::Completed,
            StopMarker::Intentional => StopVerdict::Suppressed,
            StopMarker::Unmarked => StopVerdict::Dropped,
        }
    }

    // ===== Queries =====

    /// Track open on the device
    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Whether a handle is open
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// Position in microseconds (0 if nothing open)
    pub fn current_time(&self) -> u64 {
        self.handle.as_ref().map_or(0, |h| h.position_micros())
    }

    /// Track length in microseconds (0 if nothing open)
    pub fn total_time(&self) -> u64 {
        self.handle.as_ref().map_or(0, |h| h.length_micros())
    }

    /// Whether output is running
    pub fn is_playing(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_running())
    }

    /// Whether the session is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Position captured at the last pause
    pub fn pause_position(&self) -> u64 {
        self.pause_position_micros
    }

    /// Transport state
    pub fn state(&self) -> PlaybackState {
        if self.is_playing() {
            PlaybackState::Playing
        } else if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Stopped
        }
    }

    /// Pending stop marker
    pub fn marker(&self) -> StopMarker {
        self.marker
    }

    pub fn formatted_current_time(&self) -> String {
        format_micros(self.current_time())
    }

    pub fn formatted_total_time(&self) -> String {
        format_micros(self.total_time())
    }

    /// `MM:SS` captured at the last pause (empty before the first pause)
    pub fn formatted_pause_time(&self) -> &str {
        &self.paused_time_text
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{DeviceCall, SimulatedDevice};
    use crossbeam_channel::{bounded, Receiver};

    const LENGTH: u64 = 120_000_000;

    fn setup() -> (
        SimulatedDevice,
        PlaybackSession,
        Sender<StopNotice>,
        Receiver<StopNotice>,
    ) {
        let device = SimulatedDevice::new().with_track("/music/a.wav", LENGTH);
        let (tx, rx) = bounded(16);
        (device, PlaybackSession::default(), tx, rx)
    }

    fn open(session: &mut PlaybackSession, device: &SimulatedDevice, tx: &Sender<StopNotice>) {
        let mut device = device.clone();
        session
            .open(&mut device, &Track::new("/music/a.wav"), tx)
            .unwrap();
    }

    #[test]
    fn play_without_track_fails() {
        let (device, mut session, _tx, _rx) = setup();
        let err = session.play().unwrap_err();
        assert!(matches!(err, PlaybackError::NothingLoaded));
        assert!(err.is_device_unavailable());
        assert!(matches!(session.pause(), Err(PlaybackError::NothingLoaded)));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn stop_restart_and_seek_without_track_are_noops() {
        let (device, mut session, _tx, _rx) = setup();
        session.stop().unwrap();
        session.restart().unwrap();
        session.set_position(5_000_000).unwrap();
        assert_eq!(session.current_time(), 0);
        assert_eq!(session.total_time(), 0);
        assert!(device.calls().is_empty());
    }

    #[test]
    fn open_failure_leaves_session_empty() {
        let mut device = SimulatedDevice::new().with_unsupported("/music/b.ogg");
        let (tx, _rx) = bounded(4);
        let mut session = PlaybackSession::default();

        session.open(&mut device, &Track::new("/music/a.wav"), &tx).unwrap();
        let err = session
            .open(&mut device, &Track::new("/music/b.ogg"), &tx)
            .unwrap_err();

        assert!(matches!(err, PlaybackError::UnsupportedFormat(_)));
        assert!(!session.is_loaded());
        assert!(session.current_track().is_none());
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn blank_track_is_rejected_before_release() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);

        let mut dev = device.clone();
        let err = session.open(&mut dev, &Track::new(""), &tx).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidInput(_)));
        assert!(session.is_loaded());
    }

    #[test]
    fn pause_and_resume() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);

        session.play().unwrap();
        device.advance(65_400_000);
        session.pause().unwrap();

        assert!(session.is_paused());
        assert!(!session.is_playing());
        assert_eq!(session.pause_position(), 65_400_000);
        assert_eq!(session.formatted_pause_time(), "01:05");

        let notice = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(notice), StopVerdict::Suppressed);

        device.clear_calls();
        session.play().unwrap();
        assert!(session.is_playing());
        assert!(!session.is_paused());
        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::Seek(Track::new("/music/a.wav"), 65_400_000),
                DeviceCall::Start(Track::new("/music/a.wav")),
            ]
        );
    }

    #[test]
    fn play_while_running_is_noop() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.clear_calls();

        session.play().unwrap();
        assert!(device.calls().is_empty());
    }

    #[test]
    fn natural_end_completes_after_play() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        assert_eq!(session.marker(), StopMarker::Intentional);

        device.advance(LENGTH);

        let notice = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(notice), StopVerdict::Completed);
        assert_eq!(session.marker(), StopMarker::Unmarked);
    }

    #[test]
    fn user_stop_is_not_a_completion() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(LENGTH - 500_000);

        session.stop().unwrap();
        assert_eq!(session.current_time(), 0);
        assert!(!session.is_paused());

        let notice = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(notice), StopVerdict::Dropped);
    }

    #[test]
    fn underrun_mid_track_is_dropped() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(10_000_000);
        // Consume the marker left by play()
        assert_eq!(
            session.handle_stop(StopNotice { generation: 1 }),
            StopVerdict::Suppressed
        );

        device.emit_spurious_stop();
        let notice = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(notice), StopVerdict::Dropped);
    }

    #[test]
    fn running_output_is_never_a_completion() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(30_000_000);

        // Two intentional stops, one marker
        session.pause().unwrap();
        session.play().unwrap();
        session.set_position(LENGTH - 800_000).unwrap();
        assert!(session.is_playing());

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(first), StopVerdict::Suppressed);
        assert_eq!(session.handle_stop(second), StopVerdict::Dropped);

        device.advance(800_000);
        let end = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(end), StopVerdict::Completed);
    }

    #[test]
    fn failed_rewind_still_leaves_session_stopped() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(30_000_000);
        session.pause().unwrap();
        device.set_fail_seeks(true);

        assert!(session.stop().is_err());

        assert!(!session.is_paused());
        assert!(!session.is_playing());
        assert_eq!(session.pause_position(), 0);
        assert_eq!(session.state(), PlaybackState::Stopped);
    }

    #[test]
    fn notices_from_closed_handles_are_stale() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(LENGTH);
        let old = rx.try_recv().unwrap();

        open(&mut session, &device, &tx);
        assert_eq!(session.handle_stop(old), StopVerdict::Stale);
        assert_eq!(device.max_open_handles(), 1);

        session.release();
        assert_eq!(
            session.handle_stop(StopNotice { generation: 2 }),
            StopVerdict::Stale
        );
    }

    #[test]
    fn restart_plays_from_zero() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(30_000_000);
        session.pause().unwrap();

        session.restart().unwrap();

        assert!(session.is_playing());
        assert!(!session.is_paused());
        assert_eq!(session.current_time(), 0);
        assert_eq!(session.pause_position(), 0);
    }

    #[test]
    fn set_position_debounces_small_moves() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(10_000_000);
        device.clear_calls();

        session.set_position(10_100_000).unwrap();
        session.set_position(9_900_000).unwrap();

        assert!(device.calls().is_empty());
        assert!(session.is_playing());
        assert_eq!(session.current_time(), 10_000_000);
    }

    #[test]
    fn set_position_while_playing_resumes() {
        let (device, mut session, tx, rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();

        session.set_position(50_000_000).unwrap();

        assert!(session.is_playing());
        assert_eq!(session.current_time(), 50_000_000);
        let notice = rx.try_recv().unwrap();
        assert_eq!(session.handle_stop(notice), StopVerdict::Suppressed);
    }

    #[test]
    fn set_position_while_paused_moves_resume_point() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(65_000_000);
        session.pause().unwrap();

        session.set_position(65_050_000).unwrap();
        assert_eq!(session.pause_position(), 65_000_000);

        session.set_position(70_000_000).unwrap();
        assert_eq!(session.pause_position(), 70_000_000);
        assert!(session.is_paused());
        assert!(!session.is_playing());
    }

    #[test]
    fn failed_seek_keeps_state() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        session.play().unwrap();
        device.advance(20_000_000);
        device.set_fail_seeks(true);

        assert!(session.set_position(80_000_000).is_err());
        assert!(session.is_playing());
        assert_eq!(session.current_time(), 20_000_000);
    }

    #[test]
    fn failed_start_is_reported() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        device.set_fail_starts(true);

        assert!(matches!(
            session.play(),
            Err(PlaybackError::DeviceUnavailable(_))
        ));
        assert!(!session.is_playing());
        assert_eq!(session.marker(), StopMarker::Unmarked);
    }

    #[test]
    fn drop_closes_handle() {
        let (device, mut session, tx, _rx) = setup();
        open(&mut session, &device, &tx);
        assert_eq!(device.open_handles(), 1);
        drop(session);
        assert_eq!(device.open_handles(), 0);
    }
}
