//! Effective ordering key.
//!
//! `score = priority + fraction`, where the fraction grows with the time of
//! day and a per-process enqueue counter and always stays in `[0, 1)`, so it
//! orders records of equal priority by enqueue time without ever reordering
//! records of different priority.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, NaiveTime, Timelike};

/// Sub-second resolution of the time component (10µs ticks).
const TICKS_PER_SECOND: u64 = 100_000;
const NANOS_PER_TICK: u64 = 1_000_000_000 / TICKS_PER_SECOND;
/// Normalizes the raw value into (0, 1). A full day is 8.64e9 ticks.
const SCALE: f64 = 1e10;

/// Tiebreak generator holding the per-process enqueue counter.
///
/// The counter is not persisted; it only separates enqueues that land on
/// the same clock tick.
#[derive(Debug, Default)]
pub struct TieBreaker {
    counter: AtomicU64,
}

impl TieBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction for an enqueue happening now.
    pub fn next_fraction(&self) -> f64 {
        self.fraction_at(Local::now().time())
    }

    /// Fraction for an enqueue at the given local time of day.
    pub fn fraction_at(&self, time: NaiveTime) -> f64 {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        tiebreak_fraction(time, count)
    }

    /// Effective ordering key for a record of the given priority.
    pub fn score(&self, priority: i64) -> f64 {
        priority as f64 + self.next_fraction()
    }

    /// Number of fractions handed out so far.
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

/// `((seconds_since_midnight * 100000 + ticks + counter) / 1e10) mod 1.0`
pub fn tiebreak_fraction(time: NaiveTime, counter: u64) -> f64 {
    let seconds = time.num_seconds_from_midnight() as u64;
    // nanosecond() exceeds 1e9 during a leap second
    let ticks = (time.nanosecond() as u64 % 1_000_000_000) / NANOS_PER_TICK;
    let raw = seconds * TICKS_PER_SECOND + ticks + counter;
    (raw as f64 / SCALE) % 1.0
}
