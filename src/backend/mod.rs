mod output;
mod resolver;

pub use output::RodioBackend;
pub use resolver::MediaResolver;

use std::collections::VecDeque;
use std::fmt;

/// Lifecycle states reported by a backend, numbered like the embedded web player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    pub fn code(self) -> i8 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const INVALID_REFERENCE: Self = Self(2);
    pub const PLAYBACK_FAILURE: Self = Self(5);
    pub const NOT_FOUND: Self = Self(100);
    pub const EMBEDDING_FORBIDDEN: Self = Self(101);
    pub const EMBEDDING_FORBIDDEN_ALT: Self = Self(150);

    pub fn classify(self) -> ErrorClass {
        match self {
            Self::INVALID_REFERENCE
            | Self::NOT_FOUND
            | Self::EMBEDDING_FORBIDDEN
            | Self::EMBEDDING_FORBIDDEN_ALT => ErrorClass::Recoverable,
            _ => ErrorClass::Transient,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recoverable errors skip the entry; transient ones are retried in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Recoverable,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    Ready,
    State(PlayerState),
    Error(ErrorCode),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("playback backend is not ready")]
    NotReady,
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// External playback capability. Only the sequencer issues commands to it.
///
/// `load_by_id` and `cue_by_id` complete asynchronously; the outcome is
/// observed through `poll_event`. `play` and `pause` must be harmless when
/// nothing is loaded.
pub trait PlaybackBackend {
    fn load_by_id(&mut self, id: &str) -> Result<(), BackendError>;
    fn cue_by_id(&mut self, id: &str) -> Result<(), BackendError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn poll_event(&mut self) -> Option<BackendEvent>;
    fn name(&self) -> &str;
}

impl<T: PlaybackBackend + ?Sized> PlaybackBackend for Box<T> {
    fn load_by_id(&mut self, id: &str) -> Result<(), BackendError> {
        (**self).load_by_id(id)
    }

    fn cue_by_id(&mut self, id: &str) -> Result<(), BackendError> {
        (**self).cue_by_id(id)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        (**self).poll_event()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Silent stand-in used when no audio output can be opened.
///
/// It accepts every command and reports the matching lifecycle
/// transitions, but its media never ends.
pub struct NullBackend {
    ready: bool,
    loaded: Option<String>,
    state: PlayerState,
    events: VecDeque<BackendEvent>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            ready: false,
            loaded: None,
            state: PlayerState::Unstarted,
            events: VecDeque::from([BackendEvent::Ready]),
        }
    }

    fn transition(&mut self, state: PlayerState) {
        if self.state != state {
            self.state = state;
            self.events.push_back(BackendEvent::State(state));
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackBackend for NullBackend {
    fn load_by_id(&mut self, id: &str) -> Result<(), BackendError> {
        self.cue_by_id(id)
    }

    fn cue_by_id(&mut self, id: &str) -> Result<(), BackendError> {
        if !self.ready {
            return Err(BackendError::NotReady);
        }
        self.loaded = Some(id.to_string());
        self.state = PlayerState::Unstarted;
        self.transition(PlayerState::Cued);
        Ok(())
    }

    fn play(&mut self) {
        if self.loaded.is_some() {
            self.transition(PlayerState::Playing);
        }
    }

    fn pause(&mut self) {
        if self.state == PlayerState::Playing {
            self.transition(PlayerState::Paused);
        }
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        let event = self.events.pop_front()?;
        if event == BackendEvent::Ready {
            self.ready = true;
        }
        Some(event)
    }

    fn name(&self) -> &str {
        "Null backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_classify_like_the_web_player() {
        for code in [2, 100, 101, 150] {
            assert_eq!(ErrorCode(code).classify(), ErrorClass::Recoverable);
        }
        for code in [5, 0, 1, 404] {
            assert_eq!(ErrorCode(code).classify(), ErrorClass::Transient);
        }
    }

    #[test]
    fn player_state_codes_match_the_web_player() {
        assert_eq!(PlayerState::Unstarted.code(), -1);
        assert_eq!(PlayerState::Ended.code(), 0);
        assert_eq!(PlayerState::Cued.code(), 5);
    }

    #[test]
    fn null_backend_rejects_commands_before_ready() {
        let mut backend = NullBackend::new();
        assert!(matches!(backend.load_by_id("a"), Err(BackendError::NotReady)));
        backend.play();

        assert_eq!(backend.poll_event(), Some(BackendEvent::Ready));
        assert!(backend.load_by_id("a").is_ok());
        assert_eq!(
            backend.poll_event(),
            Some(BackendEvent::State(PlayerState::Cued))
        );
        backend.play();
        backend.pause();
        assert_eq!(
            backend.poll_event(),
            Some(BackendEvent::State(PlayerState::Playing))
        );
        assert_eq!(
            backend.poll_event(),
            Some(BackendEvent::State(PlayerState::Paused))
        );
        assert_eq!(backend.poll_event(), None);
    }
}
