use std::time::{Duration, Instant};

/// Actions the sequencer defers. They are never cancelled, so each one
/// carries the index it was scheduled for and is re-checked when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    PlayAfterLoad { index: usize },
    Advance { from: usize },
    RetryLoad { index: usize },
}

#[derive(Debug)]
struct Pending {
    due: Instant,
    seq: u64,
    action: Deferred,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Vec<Pending>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, action: Deferred) {
        self.pending.push(Pending {
            due: now + delay,
            seq: self.next_seq,
            action,
        });
        self.next_seq += 1;
    }

    /// Removes and returns every action due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<Deferred> {
        let (mut due, waiting): (Vec<Pending>, Vec<Pending>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.due <= now);
        self.pending = waiting;
        due.sort_by_key(|pending| (pending.due, pending.seq));
        due.into_iter().map(|pending| pending.action).collect()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|pending| pending.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order_and_only_once() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(start, Duration::from_millis(300), Deferred::RetryLoad { index: 1 });
        scheduler.schedule(start, Duration::from_millis(100), Deferred::Advance { from: 0 });
        scheduler.schedule(start, Duration::from_millis(100), Deferred::PlayAfterLoad { index: 1 });

        assert!(scheduler.take_due(start).is_empty());
        assert_eq!(scheduler.next_due(), Some(start + Duration::from_millis(100)));

        let fired = scheduler.take_due(start + Duration::from_millis(150));
        assert_eq!(
            fired,
            vec![
                Deferred::Advance { from: 0 },
                Deferred::PlayAfterLoad { index: 1 }
            ]
        );
        assert_eq!(scheduler.len(), 1);

        let fired = scheduler.take_due(start + Duration::from_secs(1));
        assert_eq!(fired, vec![Deferred::RetryLoad { index: 1 }]);
        assert!(scheduler.is_empty());
    }
}
