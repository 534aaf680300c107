#![no_main]

use libfuzzer_sys::fuzz_target;
use nitnem::backend::{BackendEvent, ErrorCode, NullBackend, PlayerState};
use nitnem::model::MediaTable;
use nitnem::sequencer::{Sequencer, SequencerPolicy};
use nitnem::view::project;
use std::time::{Duration, Instant};

fuzz_target!(|data: &[u8]| {
    let start = Instant::now();
    let mut sequencer = Sequencer::with_clock(
        MediaTable::nitnem(),
        NullBackend::new(),
        SequencerPolicy::default(),
        start,
    );
    let mut elapsed = 0u64;

    for byte in data {
        match byte % 10 {
            0 => sequencer.play_sequence(),
            1 => sequencer.stop_playback(),
            2 => sequencer.previous_video(),
            3 => sequencer.next_video(),
            4 => sequencer.select(usize::from(byte / 10)),
            5 => sequencer.handle_event(BackendEvent::State(PlayerState::Ended)),
            6 => sequencer.handle_event(BackendEvent::Error(ErrorCode(u16::from(byte / 10)))),
            7 => sequencer.pump_backend(),
            _ => {
                elapsed += u64::from(*byte) * 20;
                sequencer.tick(start + Duration::from_millis(elapsed));
            }
        }

        assert!(sequencer.current_index() < sequencer.table().len());
        assert!(sequencer.completed().iter().all(|index| *index <= sequencer.current_index()));
        let view = project(&sequencer);
        assert_eq!(view.rows.iter().filter(|row| row.active).count(), 1);
    }
});
