use crate::backend::{BackendEvent, ErrorClass, ErrorCode, PlaybackBackend, PlayerState};
use crate::model::{MediaEntry, MediaTable, Settings};
use crate::schedule::{Deferred, Scheduler};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerPolicy {
    /// Wait between loading an entry and asking the backend to play it.
    pub settle_delay: Duration,
    /// Pause between an entry ending and the next one loading.
    pub advance_delay: Duration,
    pub retry_delay: Duration,
    /// Consecutive transient errors tolerated on one entry before it is
    /// skipped. `None` retries forever.
    pub retry_limit: Option<u32>,
}

impl Default for SequencerPolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            advance_delay: Duration::from_millis(1000),
            retry_delay: Duration::from_millis(3000),
            retry_limit: Some(5),
        }
    }
}

impl From<&Settings> for SequencerPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            settle_delay: Duration::from_millis(settings.settle_delay_ms),
            advance_delay: Duration::from_millis(settings.advance_delay_ms),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            retry_limit: settings.retry_limit,
        }
    }
}

/// Owns the playback position and decides what the backend plays next.
///
/// All mutation happens through user commands, backend events and `tick`,
/// which the caller drives from a single loop.
pub struct Sequencer<B: PlaybackBackend> {
    table: MediaTable,
    backend: B,
    policy: SequencerPolicy,
    scheduler: Scheduler,
    now: Instant,
    current_index: usize,
    is_playing: bool,
    is_autoplay_enabled: bool,
    completed: BTreeSet<usize>,
    backend_ready: bool,
    transient_retries: u32,
    completion_pending: bool,
    complete: bool,
    dirty: bool,
}

impl<B: PlaybackBackend> Sequencer<B> {
    pub fn new(table: MediaTable, backend: B, policy: SequencerPolicy) -> Self {
        Self::with_clock(table, backend, policy, Instant::now())
    }

    pub fn with_clock(table: MediaTable, backend: B, policy: SequencerPolicy, now: Instant) -> Self {
        Self {
            table,
            backend,
            policy,
            scheduler: Scheduler::new(),
            now,
            current_index: 0,
            is_playing: false,
            is_autoplay_enabled: false,
            completed: BTreeSet::new(),
            backend_ready: false,
            transient_retries: 0,
            completion_pending: false,
            complete: false,
            dirty: true,
        }
    }

    pub fn table(&self) -> &MediaTable {
        &self.table
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_entry(&self) -> &MediaEntry {
        &self.table.entries()[self.current_index]
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_autoplay_enabled(&self) -> bool {
        self.is_autoplay_enabled
    }

    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    pub fn is_last(&self) -> bool {
        self.current_index == self.table.last_index()
    }

    pub fn is_backend_ready(&self) -> bool {
        self.backend_ready
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn pending_actions(&self) -> usize {
        self.scheduler.len()
    }

    /// One-shot: true only on the first call after the whole list finished.
    pub fn take_completion(&mut self) -> bool {
        std::mem::take(&mut self.completion_pending)
    }

    /// True when state changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn play_sequence(&mut self) {
        if self.is_last() && self.is_playing {
            info!("restarting sequence from the first entry");
            self.load_video(0);
        }

        self.is_autoplay_enabled = true;
        self.is_playing = true;
        self.dirty = true;
        self.backend.play();
    }

    pub fn stop_playback(&mut self) {
        self.is_autoplay_enabled = false;
        self.is_playing = false;
        self.dirty = true;
        self.backend.pause();
    }

    pub fn previous_video(&mut self) {
        if self.current_index > 0 {
            self.load_video(self.current_index - 1);
        }
    }

    pub fn next_video(&mut self) {
        if !self.is_last() {
            self.load_video(self.current_index + 1);
        }
    }

    /// Manual seek from the playlist rows.
    pub fn select(&mut self, index: usize) {
        self.load_video(index);
    }

    pub fn load_video(&mut self, index: usize) {
        let Some(entry) = self.table.get(index) else {
            debug!("ignoring load of index {index} outside the playlist");
            return;
        };
        let id = entry.id.clone();

        self.current_index = index;
        self.completed.retain(|done| *done < index);
        self.transient_retries = 0;
        self.dirty = true;

        if let Err(err) = self.backend.load_by_id(&id) {
            debug!("load of {id} dropped: {err}");
        }

        if self.is_autoplay_enabled {
            self.scheduler.schedule(
                self.now,
                self.policy.settle_delay,
                Deferred::PlayAfterLoad { index },
            );
        }
    }

    pub fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Ready => self.on_ready(),
            BackendEvent::State(state) => self.on_state(state),
            BackendEvent::Error(code) => self.on_error(code),
        }
    }

    /// Drains every pending backend event.
    pub fn pump_backend(&mut self) {
        while let Some(event) = self.backend.poll_event() {
            self.handle_event(event);
        }
    }

    /// Advances the clock and runs the deferred actions that came due.
    pub fn tick(&mut self, now: Instant) {
        self.now = now;
        for action in self.scheduler.take_due(now) {
            self.run_deferred(action);
        }
    }

    fn on_ready(&mut self) {
        info!("playback backend ready: {}", self.backend.name());
        self.backend_ready = true;
        self.dirty = true;
        let id = self.current_entry().id.clone();
        if let Err(err) = self.backend.cue_by_id(&id) {
            debug!("cue of {id} dropped: {err}");
        }
    }

    fn on_state(&mut self, state: PlayerState) {
        debug!("backend state {state:?} ({})", state.code());
        match state {
            PlayerState::Playing => {
                self.is_playing = true;
                self.transient_retries = 0;
                self.dirty = true;
            }
            PlayerState::Paused => {
                self.is_playing = false;
                self.dirty = true;
            }
            PlayerState::Ended => self.on_ended(),
            PlayerState::Unstarted | PlayerState::Buffering | PlayerState::Cued => {}
        }
    }

    fn on_ended(&mut self) {
        self.completed.insert(self.current_index);
        self.dirty = true;

        if !self.is_last() {
            self.scheduler.schedule(
                self.now,
                self.policy.advance_delay,
                Deferred::Advance {
                    from: self.current_index,
                },
            );
            return;
        }

        self.is_playing = false;
        self.is_autoplay_enabled = false;
        self.complete = true;
        self.completion_pending = true;
        info!("sequence complete");
    }

    fn on_error(&mut self, code: ErrorCode) {
        warn!(
            "backend error {code} on entry {} ({})",
            self.current_index,
            self.current_entry().id
        );

        match code.classify() {
            ErrorClass::Recoverable => self.skip_unplayable(),
            ErrorClass::Transient => {
                if let Some(limit) = self.policy.retry_limit
                    && self.transient_retries >= limit
                {
                    warn!("retry budget of {limit} exhausted, skipping entry");
                    self.skip_unplayable();
                    return;
                }
                self.transient_retries += 1;
                self.scheduler.schedule(
                    self.now,
                    self.policy.retry_delay,
                    Deferred::RetryLoad {
                        index: self.current_index,
                    },
                );
            }
        }
    }

    fn skip_unplayable(&mut self) {
        if self.is_last() {
            warn!("last entry is unplayable, sequence halted");
        }
        self.next_video();
    }

    fn run_deferred(&mut self, action: Deferred) {
        match action {
            Deferred::PlayAfterLoad { index } => {
                if !self.is_autoplay_enabled || self.current_index != index {
                    debug!("skipping stale {action:?}");
                    return;
                }
                self.backend.play();
            }
            Deferred::Advance { from } => {
                if self.current_index != from {
                    debug!("skipping stale {action:?}");
                    return;
                }
                self.next_video();
                if self.is_autoplay_enabled {
                    self.backend.play();
                }
            }
            Deferred::RetryLoad { index } => {
                if self.current_index != index {
                    debug!("skipping stale {action:?}");
                    return;
                }
                let id = self.current_entry().id.clone();
                info!("retrying {id}");
                if let Err(err) = self.backend.load_by_id(&id) {
                    debug!("retry of {id} dropped: {err}");
                }
                if self.is_autoplay_enabled {
                    self.backend.play();
                }
            }
        }
    }
}
