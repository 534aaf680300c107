use crate::backend::PlaybackBackend;
use crate::sequencer::Sequencer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub index: usize,
    pub number: String,
    pub title: String,
    pub source: String,
    pub active: bool,
    pub completed: bool,
}

/// Transport controls shown in the control bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Play,
    Stop,
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlsView {
    pub play_enabled: bool,
    pub play_label: &'static str,
    pub stop_enabled: bool,
    pub previous_enabled: bool,
    pub next_enabled: bool,
}

impl ControlsView {
    pub fn is_enabled(&self, control: Control) -> bool {
        match control {
            Control::Play => self.play_enabled,
            Control::Stop => self.stop_enabled,
            Control::Previous => self.previous_enabled,
            Control::Next => self.next_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistView {
    pub rows: Vec<RowView>,
    pub controls: ControlsView,
    pub progress: String,
    pub complete: bool,
}

/// Render model for the current sequencer state. Holds no state of its own.
pub fn project<B: PlaybackBackend>(sequencer: &Sequencer<B>) -> PlaylistView {
    let current = sequencer.current_index();
    let total = sequencer.table().len();

    let rows = sequencer
        .table()
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| RowView {
            index,
            number: format!("Video {}", index + 1),
            title: entry.title.clone(),
            source: entry.source.clone(),
            active: index == current,
            completed: index < current
                || (index == current && sequencer.completed().contains(&index)),
        })
        .collect();

    let playing = sequencer.is_playing();
    let complete = sequencer.is_complete();
    let controls = ControlsView {
        play_enabled: !playing && !complete,
        play_label: if playing { "Playing..." } else { "Play" },
        stop_enabled: playing || sequencer.is_autoplay_enabled(),
        previous_enabled: current != 0,
        next_enabled: current != sequencer.table().last_index(),
    };

    PlaylistView {
        rows,
        controls,
        progress: format!("{} of {total}", current + 1),
        complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEvent, ErrorCode, NullBackend, PlayerState};
    use crate::model::MediaTable;
    use crate::sequencer::SequencerPolicy;
    use std::time::{Duration, Instant};

    fn nitnem() -> (Sequencer<NullBackend>, Instant) {
        let start = Instant::now();
        let mut sequencer = Sequencer::with_clock(
            MediaTable::nitnem(),
            NullBackend::new(),
            SequencerPolicy::default(),
            start,
        );
        sequencer.pump_backend();
        (sequencer, start)
    }

    #[test]
    fn idle_view_enables_play_and_next_only() {
        let (sequencer, _) = nitnem();
        let view = project(&sequencer);

        assert_eq!(view.rows.len(), 8);
        assert!(view.rows[0].active);
        assert!(view.rows.iter().skip(1).all(|row| !row.active && !row.completed));
        assert_eq!(view.rows[0].number, "Video 1");
        assert_eq!(view.progress, "1 of 8");
        assert_eq!(
            view.controls,
            ControlsView {
                play_enabled: true,
                play_label: "Play",
                stop_enabled: false,
                previous_enabled: false,
                next_enabled: true,
            }
        );
    }

    #[test]
    fn playing_view_locks_play_and_enables_stop() {
        let (mut sequencer, _) = nitnem();
        sequencer.play_sequence();
        sequencer.pump_backend();
        let view = project(&sequencer);

        assert!(!view.controls.play_enabled);
        assert_eq!(view.controls.play_label, "Playing...");
        assert!(view.controls.stop_enabled);
    }

    #[test]
    fn finished_entry_shows_completed_after_advance() {
        let (mut sequencer, start) = nitnem();
        sequencer.play_sequence();
        sequencer.handle_event(BackendEvent::State(PlayerState::Ended));
        sequencer.tick(start + Duration::from_secs(1));
        let view = project(&sequencer);

        assert!(view.rows[0].completed);
        assert!(view.rows[1].active);
        assert!(!view.rows[1].completed);
        assert!(view.controls.previous_enabled);
        assert_eq!(view.progress, "2 of 8");
    }

    #[test]
    fn last_entry_disables_next() {
        let (mut sequencer, _) = nitnem();
        sequencer.select(7);
        let view = project(&sequencer);
        assert!(!view.controls.next_enabled);
        assert!(!view.controls.is_enabled(Control::Next));
        assert!(view.controls.is_enabled(Control::Previous));
        assert!(view.rows[7].active);
    }

    #[test]
    fn rows_before_the_active_one_show_completed() {
        let (mut sequencer, start) = nitnem();
        sequencer.play_sequence();
        sequencer.handle_event(BackendEvent::State(PlayerState::Ended));
        sequencer.tick(start + Duration::from_secs(1));
        sequencer.handle_event(BackendEvent::State(PlayerState::Ended));
        sequencer.tick(start + Duration::from_secs(2));
        sequencer.previous_video();
        sequencer.previous_video();

        let view = project(&sequencer);
        assert!(view.rows[0].active);
        assert!(view.rows.iter().all(|row| !row.completed));

        sequencer.select(3);
        sequencer.handle_event(BackendEvent::Error(ErrorCode::NOT_FOUND));
        let view = project(&sequencer);
        assert!(view.rows[4].active);
        assert!(!view.rows[4].completed);
        assert!(view.rows[..4].iter().all(|row| row.completed));
    }

    #[test]
    fn finished_playlist_disables_play_and_marks_every_row() {
        let (mut sequencer, _) = nitnem();
        sequencer.select(7);
        sequencer.play_sequence();
        sequencer.handle_event(BackendEvent::State(PlayerState::Ended));

        let view = project(&sequencer);
        assert!(view.complete);
        assert!(!view.controls.play_enabled);
        assert_eq!(view.controls.play_label, "Play");
        assert!(view.rows.iter().all(|row| row.completed));
    }

    #[test]
    fn projection_is_idempotent() {
        let (mut sequencer, _) = nitnem();
        sequencer.select(3);
        assert_eq!(project(&sequencer), project(&sequencer));
    }
}
