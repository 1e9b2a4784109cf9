use std::{cmp::Reverse, collections::BinaryHeap};

use super::{error::TouchError, types::SessionId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Held finger that has not moved starts exploring.
    ExplorationDelay,
    /// Window for the second tap of a double tap.
    DoubleTap,
    /// Second tap held long enough to become a long activation.
    LongPress,
    /// Path gesture took too long and falls back to exploration.
    GestureTimeout,
}

const TIMER_KIND_COUNT: usize = 4;

impl TimerKind {
    fn slot(self) -> usize {
        match self {
            TimerKind::ExplorationDelay => 0,
            TimerKind::DoubleTap => 1,
            TimerKind::LongPress => 2,
            TimerKind::GestureTimeout => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueTimer {
    pub kind: TimerKind,
    pub session: SessionId,
    pub deadline_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct TimerEntry {
    deadline_ms: u64,
    seq: u64,
    session: SessionId,
    kind: TimerKind,
}

#[derive(Clone, Copy, Debug)]
struct ArmedTimer {
    seq: u64,
    deadline_ms: u64,
}

/// Deadline-ordered timers of one display. Each kind has at most one live
/// arming; rearming or cancelling leaves the old heap entry behind, which is
/// reported as a discarded race when it surfaces.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    armed: [Option<ArmedTimer>; TIMER_KIND_COUNT],
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, session: SessionId, kind: TimerKind, deadline_ms: u64) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.armed[kind.slot()] = Some(ArmedTimer { seq, deadline_ms });
        self.heap.push(Reverse(TimerEntry {
            deadline_ms,
            seq,
            session,
            kind,
        }));
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.armed[kind.slot()] = None;
    }

    pub fn cancel_all(&mut self) {
        self.armed = [None; TIMER_KIND_COUNT];
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.armed
            .iter()
            .flatten()
            .map(|armed| armed.deadline_ms)
            .min()
    }

    /// Pops the earliest entry with `deadline_ms <= limit_ms`. Stale entries
    /// come back as `TimerRaceDiscarded`.
    pub fn pop_due(&mut self, limit_ms: u64) -> Option<Result<DueTimer, TouchError>> {
        let Reverse(entry) = *self.heap.peek()?;
        if entry.deadline_ms > limit_ms {
            return None;
        }
        self.heap.pop();

        let slot = &mut self.armed[entry.kind.slot()];
        match slot {
            Some(armed) if armed.seq == entry.seq => {
                *slot = None;
                Some(Ok(DueTimer {
                    kind: entry.kind,
                    session: entry.session,
                    deadline_ms: entry.deadline_ms,
                }))
            }
            _ => Some(Err(TouchError::TimerRaceDiscarded {
                session: entry.session,
                kind: entry.kind,
            })),
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancel_all();
    }
}
