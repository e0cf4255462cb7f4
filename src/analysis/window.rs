//! Ring of time slots covering one trailing window.
//!
//! A window of span `W` is split into [`SLOTS`] slots of width `W / SLOTS`.
//! An event lands in the slot of its tick; a slot whose tick falls out of the
//! trailing `SLOTS` ticks is reset the next time it is written and ignored when
//! read. Record and query are O(SLOTS) regardless of traffic.

use std::time::Duration;

/// Number of slots per window.
pub const SLOTS: u64 = 10;

/// Event counts of one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
}

impl Counts {
    fn add(&mut self, other: &Counts) {
        self.total += other.total;
        self.success += other.success;
        self.failure += other.failure;
    }
}

/// Outcome of a completed backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    tick: u64,
    counts: Counts,
}

/// Rolling counters for one (key, span) pair.
#[derive(Debug, Clone)]
pub struct Window {
    span: Duration,
    width_nanos: u128,
    slots: [Slot; SLOTS as usize],
}

impl Window {
    /// Create an empty window covering `span`.
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            width_nanos: (span.as_nanos() / SLOTS as u128).max(1),
            slots: [Slot::default(); SLOTS as usize],
        }
    }

    /// The trailing span this window covers.
    pub fn span(&self) -> Duration {
        self.span
    }

    fn tick(&self, elapsed: Duration) -> u64 {
        (elapsed.as_nanos() / self.width_nanos) as u64
    }

    /// Record an outcome `elapsed` after the analysis epoch.
    pub fn record(&mut self, elapsed: Duration, outcome: Outcome) {
        let tick = self.tick(elapsed);
        let slot = &mut self.slots[(tick % SLOTS) as usize];
        if slot.tick != tick {
            *slot = Slot {
                tick,
                counts: Counts::default(),
            };
        }

        slot.counts.total += 1;
        match outcome {
            Outcome::Success => slot.counts.success += 1,
            Outcome::Failure => slot.counts.failure += 1,
        }
    }

    /// Sum of the slots still inside the window `elapsed` after the epoch.
    pub fn counts(&self, elapsed: Duration) -> Counts {
        let now = self.tick(elapsed);
        let mut sum = Counts::default();
        for slot in &self.slots {
            if slot.tick <= now && now - slot.tick < SLOTS {
                sum.add(&slot.counts);
            }
        }
        sum
    }
}
