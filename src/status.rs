use crate::engine::EngineState;
use crate::failover::FailoverState;
use std::fmt;

/// Discrete status token shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Buffering,
    Live,
    Paused,
    Retrying,
    /// Searching for another source
    Switching,
    /// All sources exhausted
    Offline,
    Ended,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Idle => "Idle",
            Status::Loading => "Loading...",
            Status::Buffering => "Buffering...",
            Status::Live => "LIVE",
            Status::Paused => "Paused",
            Status::Retrying => "Retrying...",
            Status::Switching => "Switching sources...",
            Status::Offline => "Offline",
            Status::Ended => "Ended",
        };
        f.write_str(text)
    }
}

/// Combine the failover state with what the engine last reported.
///
/// Failover activity takes precedence: an engine that is buffering while a
/// search runs is reported as switching.
pub fn derive_status(failover: FailoverState, engine: EngineState, is_playing: bool) -> Status {
    match failover {
        FailoverState::Idle => Status::Idle,
        FailoverState::Exhausted => Status::Offline,
        FailoverState::Retrying => Status::Retrying,
        FailoverState::SearchingForward | FailoverState::ManualSwitching => Status::Switching,
        FailoverState::Selecting => Status::Loading,
        FailoverState::Loaded => match engine {
            EngineState::Idle => Status::Loading,
            EngineState::Buffering => Status::Buffering,
            EngineState::Ready if is_playing => Status::Live,
            EngineState::Ready => Status::Paused,
            EngineState::Ended => Status::Ended,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffering_during_search_is_switching() {
        assert_eq!(
            derive_status(FailoverState::SearchingForward, EngineState::Buffering, false),
            Status::Switching
        );
        assert_eq!(
            derive_status(FailoverState::ManualSwitching, EngineState::Ready, true),
            Status::Switching
        );
    }

    #[test]
    fn test_loaded_follows_engine() {
        let loaded = |state, playing| derive_status(FailoverState::Loaded, state, playing);
        assert_eq!(loaded(EngineState::Idle, false), Status::Loading);
        assert_eq!(loaded(EngineState::Buffering, false), Status::Buffering);
        assert_eq!(loaded(EngineState::Ready, true), Status::Live);
        assert_eq!(loaded(EngineState::Ready, false), Status::Paused);
        assert_eq!(loaded(EngineState::Ended, false), Status::Ended);
    }

    #[test]
    fn test_failover_states_override_engine() {
        assert_eq!(derive_status(FailoverState::Exhausted, EngineState::Ready, true), Status::Offline);
        assert_eq!(derive_status(FailoverState::Retrying, EngineState::Buffering, false), Status::Retrying);
        assert_eq!(derive_status(FailoverState::Selecting, EngineState::Idle, false), Status::Loading);
        assert_eq!(derive_status(FailoverState::Idle, EngineState::Idle, false), Status::Idle);
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::Live.to_string(), "LIVE");
        assert_eq!(Status::Switching.to_string(), "Switching sources...");
    }
}
