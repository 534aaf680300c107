use super::{BackendError, BackendEvent, ErrorCode, MediaResolver, PlaybackBackend, PlayerState};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{debug, info, warn};

struct Resolved {
    ticket: u64,
    id: String,
    outcome: Result<Vec<u8>, ErrorCode>,
}

/// Load tickets and lifecycle bookkeeping, kept apart from the audio device.
///
/// Each load takes a new ticket; only the outcome carrying the latest ticket
/// is applied. A play request that arrives mid-load is remembered and
/// honoured when the load lands.
#[derive(Debug)]
struct Lifecycle {
    ready: bool,
    ticket: u64,
    pending: Option<u64>,
    play_when_loaded: bool,
    loaded: Option<String>,
    state: PlayerState,
    events: VecDeque<BackendEvent>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            ready: false,
            ticket: 0,
            pending: None,
            play_when_loaded: false,
            loaded: None,
            state: PlayerState::Unstarted,
            events: VecDeque::from([BackendEvent::Ready]),
        }
    }

    fn begin_load(&mut self) -> Result<u64, BackendError> {
        if !self.ready {
            return Err(BackendError::NotReady);
        }
        self.loaded = None;
        self.play_when_loaded = false;
        self.ticket += 1;
        self.pending = Some(self.ticket);
        self.transition(PlayerState::Buffering);
        Ok(self.ticket)
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.pending == Some(ticket)
    }

    /// Returns true when the sink should start right away.
    fn loaded(&mut self, id: String) -> bool {
        self.pending = None;
        self.loaded = Some(id);
        if self.play_when_loaded {
            self.transition(PlayerState::Playing);
            true
        } else {
            self.transition(PlayerState::Cued);
            false
        }
    }

    fn failed(&mut self, code: ErrorCode) {
        self.pending = None;
        self.transition(PlayerState::Unstarted);
        self.events.push_back(BackendEvent::Error(code));
    }

    /// Returns true when the sink should be resumed now.
    fn request_play(&mut self) -> bool {
        if self.pending.is_some() {
            self.play_when_loaded = true;
            return false;
        }
        if self.loaded.is_some() {
            self.transition(PlayerState::Playing);
            return true;
        }
        false
    }

    /// Returns true when the sink should be paused now.
    fn request_pause(&mut self) -> bool {
        self.play_when_loaded = false;
        if self.loaded.is_some() && self.state == PlayerState::Playing {
            self.transition(PlayerState::Paused);
            return true;
        }
        false
    }

    fn sink_drained(&mut self) {
        if self.state == PlayerState::Playing && self.loaded.is_some() {
            self.loaded = None;
            self.transition(PlayerState::Ended);
        }
    }

    fn next_event(&mut self) -> Option<BackendEvent> {
        let event = self.events.pop_front()?;
        if event == BackendEvent::Ready {
            self.ready = true;
        }
        Some(event)
    }

    fn transition(&mut self, state: PlayerState) {
        if self.state != state {
            self.state = state;
            self.events.push_back(BackendEvent::State(state));
        }
    }
}

fn decode(id: &str, outcome: Result<Vec<u8>, ErrorCode>) -> Result<Decoder<Cursor<Vec<u8>>>, ErrorCode> {
    let bytes = outcome?;
    Decoder::new(Cursor::new(bytes)).map_err(|err| {
        warn!("failed to decode {id}: {err}");
        ErrorCode::INVALID_REFERENCE
    })
}

/// Plays entries through the default audio output.
///
/// Media bytes are resolved on a worker thread so that loading never blocks
/// the caller; the decoded source is attached on the next `poll_event`.
pub struct RodioBackend {
    stream: OutputStream,
    sink: Sink,
    resolver: Arc<MediaResolver>,
    lifecycle: Lifecycle,
    resolved_tx: Sender<Resolved>,
    resolved_rx: Receiver<Resolved>,
}

impl RodioBackend {
    pub fn new(resolver: MediaResolver) -> Result<Self, BackendError> {
        let mut stream = with_silenced_stderr(|| {
            let builder = OutputStreamBuilder::from_default_device()
                .map_err(|err| BackendError::Output(err.to_string()))?;
            builder
                .with_error_callback(|_| {})
                .open_stream_or_fallback()
                .map_err(|err| BackendError::Output(err.to_string()))
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        let (resolved_tx, resolved_rx) = mpsc::channel();
        info!("audio output opened");

        Ok(Self {
            stream,
            sink,
            resolver: Arc::new(resolver),
            lifecycle: Lifecycle::new(),
            resolved_tx,
            resolved_rx,
        })
    }

    fn begin_load(&mut self, id: &str) -> Result<(), BackendError> {
        let ticket = self.lifecycle.begin_load()?;

        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();

        let id = id.to_string();
        let resolver = Arc::clone(&self.resolver);
        let resolved_tx = self.resolved_tx.clone();
        thread::spawn(move || {
            let outcome = resolver.resolve(&id);
            let _ = resolved_tx.send(Resolved {
                ticket,
                id,
                outcome,
            });
        });
        Ok(())
    }

    fn finish_load(&mut self, resolved: Resolved) {
        if !self.lifecycle.is_current(resolved.ticket) {
            debug!("discarding superseded load of {}", resolved.id);
            return;
        }

        match decode(&resolved.id, resolved.outcome) {
            Ok(source) => {
                self.sink.append(source);
                if self.lifecycle.loaded(resolved.id) {
                    self.sink.play();
                }
            }
            Err(code) => self.lifecycle.failed(code),
        }
    }
}

impl PlaybackBackend for RodioBackend {
    fn load_by_id(&mut self, id: &str) -> Result<(), BackendError> {
        self.begin_load(id)
    }

    fn cue_by_id(&mut self, id: &str) -> Result<(), BackendError> {
        self.begin_load(id)
    }

    fn play(&mut self) {
        if self.lifecycle.request_play() {
            self.sink.play();
        }
    }

    fn pause(&mut self) {
        if self.lifecycle.request_pause() {
            self.sink.pause();
        }
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        while let Ok(resolved) = self.resolved_rx.try_recv() {
            self.finish_load(resolved);
        }
        if self.sink.empty() {
            self.lifecycle.sink_drained();
        }
        self.lifecycle.next_event()
    }

    fn name(&self) -> &str {
        "System default output (CPAL)"
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> Lifecycle {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.next_event(), Some(BackendEvent::Ready));
        lifecycle
    }

    fn drain(lifecycle: &mut Lifecycle) -> Vec<BackendEvent> {
        std::iter::from_fn(|| lifecycle.next_event()).collect()
    }

    #[test]
    fn loads_are_refused_until_ready_is_delivered() {
        let mut lifecycle = Lifecycle::new();
        assert!(matches!(lifecycle.begin_load(), Err(BackendError::NotReady)));
        lifecycle.next_event();
        assert!(lifecycle.begin_load().is_ok());
    }

    #[test]
    fn superseded_ticket_is_not_current() {
        let mut lifecycle = ready();
        let first = lifecycle.begin_load().expect("first");
        let second = lifecycle.begin_load().expect("second");

        assert!(!lifecycle.is_current(first));
        assert!(lifecycle.is_current(second));

        lifecycle.loaded(String::from("b"));
        assert!(!lifecycle.is_current(second));
    }

    #[test]
    fn play_during_load_starts_once_loaded() {
        let mut lifecycle = ready();
        lifecycle.begin_load().expect("load");
        assert!(!lifecycle.request_play());
        assert!(lifecycle.loaded(String::from("a")));

        assert_eq!(
            drain(&mut lifecycle),
            vec![
                BackendEvent::State(PlayerState::Buffering),
                BackendEvent::State(PlayerState::Playing),
            ]
        );
    }

    #[test]
    fn pause_during_load_cancels_the_pending_play() {
        let mut lifecycle = ready();
        lifecycle.begin_load().expect("load");
        lifecycle.request_play();
        assert!(!lifecycle.request_pause());
        assert!(!lifecycle.loaded(String::from("a")));
        assert_eq!(lifecycle.state, PlayerState::Cued);
    }

    #[test]
    fn failed_load_reports_unstarted_then_error() {
        let mut lifecycle = ready();
        lifecycle.begin_load().expect("load");
        lifecycle.failed(ErrorCode::NOT_FOUND);

        assert_eq!(
            drain(&mut lifecycle),
            vec![
                BackendEvent::State(PlayerState::Buffering),
                BackendEvent::State(PlayerState::Unstarted),
                BackendEvent::Error(ErrorCode::NOT_FOUND),
            ]
        );
        assert!(!lifecycle.request_play());
    }

    #[test]
    fn drained_sink_ends_only_while_playing() {
        let mut lifecycle = ready();
        lifecycle.begin_load().expect("load");
        lifecycle.loaded(String::from("a"));
        lifecycle.sink_drained();
        assert_eq!(lifecycle.state, PlayerState::Cued);

        assert!(lifecycle.request_play());
        lifecycle.sink_drained();
        assert_eq!(lifecycle.state, PlayerState::Ended);
        assert!(lifecycle.loaded.is_none());

        drain(&mut lifecycle);
        lifecycle.sink_drained();
        assert!(drain(&mut lifecycle).is_empty());
    }

    #[test]
    fn undecodable_bytes_map_to_invalid_reference() {
        let garbage = decode("x", Ok(b"definitely not audio".to_vec()));
        assert_eq!(garbage.err(), Some(ErrorCode::INVALID_REFERENCE));

        let missing = decode("x", Err(ErrorCode::NOT_FOUND));
        assert_eq!(missing.err(), Some(ErrorCode::NOT_FOUND));
    }
}
