//! Boundary to the media playback engine
//!
//! Decoding and rendering happen elsewhere. The session only issues the
//! commands below and consumes the engine's event stream.

/// Engine playback state as reported by its events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Asynchronous notifications from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    IsPlayingChanged(bool),
    Error(String),
}

pub trait PlaybackEngine {
    /// Replace the current media with `url` and start playing it
    fn load(&mut self, url: &str);
    /// Stop and clear the current media
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    /// False when `pause` and `resume` have no effect
    fn can_pause(&self) -> bool {
        true
    }
    fn seek_to(&mut self, position_ms: u64);
    /// 0-100
    fn set_volume(&mut self, percent: u8);
    fn position_ms(&self) -> u64;
    /// `None` for live content
    fn duration_ms(&self) -> Option<u64>;
    fn is_playing(&self) -> bool;
    /// Drain events raised since the last call (non-blocking)
    fn poll_events(&mut self) -> Vec<EngineEvent>;
}

/// Point-in-time view of playback for the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    /// idle, buffering, playing, paused or ended
    pub state: &'static str,
}

impl PlaybackSnapshot {
    pub fn state_label(state: EngineState, is_playing: bool) -> &'static str {
        match state {
            EngineState::Idle => "idle",
            EngineState::Buffering => "buffering",
            EngineState::Ready if is_playing => "playing",
            EngineState::Ready => "paused",
            EngineState::Ended => "ended",
        }
    }
}
