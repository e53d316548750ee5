//! Timer-event list (spec 4.3 "Timer record", "Tick path") and the 64-bit
//! monotonic extension of the platform's narrower hardware counter.

use alloc::vec::Vec;

use crate::uefi::base::Event;

#[derive(Debug, Copy, Clone)]
pub struct TimerRecord {
    pub due_ticks: u64,
    pub period_ticks: u64,
}

/// A single global list of `(event, due_ticks, period_ticks)` ordered by
/// ascending `due_ticks` (spec 3 "Timer record ... linked in a single
/// global list ordered by ascending due_ticks"). A `Vec` kept sorted on
/// insert is the right structure here: the list is small (bounded by live
/// timer events) and the hot path is "pop every expired head", which is a
/// prefix scan either way.
pub struct TimerList {
    entries: Vec<(Event, u64, u64)>,
}

impl Default for TimerList {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerList {
    pub fn new() -> Self {
        TimerList { entries: Vec::new() }
    }

    /// Inserts or replaces this event's timer record, keeping the list
    /// sorted by due time.
    pub fn upsert(&mut self, event: Event, due_ticks: u64, period_ticks: u64) {
        self.remove(event);
        let pos = self.entries.partition_point(|(_, due, _)| *due <= due_ticks);
        self.entries.insert(pos, (event, due_ticks, period_ticks));
    }

    pub fn remove(&mut self, event: Event) {
        self.entries.retain(|(e, _, _)| *e != event);
    }

    /// Pops every entry whose due time is `<= now`, returning
    /// `(event, period_ticks)` pairs in due-time order.
    pub fn pop_expired(&mut self, now: u64) -> Vec<(Event, u64)> {
        let split = self.entries.partition_point(|(_, due, _)| *due <= now);
        self.entries.drain(..split).map(|(e, _, period)| (e, period)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extends a hardware tick counter narrower than 64 bits into a monotonic
/// 64-bit value by detecting wraparound (spec 4.3 "Tick path": "the
/// hardware counter ... is narrower than 64 bits -- a high-bit transition
/// detector extends it to a monotonic 64-bit value").
pub struct MonotonicExtender {
    counter_bits: u32,
    last_raw: u64,
    high: u64,
}

impl MonotonicExtender {
    pub fn new(counter_bits: u32) -> Self {
        MonotonicExtender { counter_bits, last_raw: 0, high: 0 }
    }

    fn width_mask(&self) -> u64 {
        if self.counter_bits >= 64 { u64::MAX } else { (1u64 << self.counter_bits) - 1 }
    }

    /// Feeds one freshly-read raw counter sample and returns the extended
    /// 64-bit value. Must be called at least once per wraparound period to
    /// detect the rollover.
    pub fn extend(&mut self, raw: u64) -> u64 {
        let raw = raw & self.width_mask();
        if self.counter_bits < 64 && raw < self.last_raw {
            self.high += self.width_mask() + 1;
        }
        self.last_raw = raw;
        self.high + raw
    }
}
