//! Task-priority-level scheduler (spec 4.1, component C2).
//!
//! `TplScheduler` tracks the single current priority and, on `restore`,
//! drains whichever per-priority event queues became pending while the
//! caller ran above them. It deliberately does not own the queues
//! themselves — `crate::event::EventTimerCore` does — so this module has
//! no dependency on the event type; `restore`'s `dispatch` callback is
//! how the event core plugs its FIFO queues into the scheduler's
//! priority-ordered drain loop.
//!
//! Mirrors the real ABI: `RaiseTPL`/`RestoreTPL` return/take a bare
//! `usize`, not a `Status` — raising below the current level or restoring
//! above it is an unconditional contract violation (spec 4.1 "Failure"),
//! not a recoverable error, so both panic rather than returning `Result`.

use log::trace;

use crate::config::tpl::{APPLICATION, HIGH_LEVEL};

/// Tracks current TPL, the pending-dispatch bitmask, and the
/// interrupt-enable state saved across crossing into `HIGH_LEVEL`.
pub struct TplScheduler {
    current: usize,
    pending_mask: u64,
    saved_interrupts_enabled: Option<bool>,
}

impl Default for TplScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TplScheduler {
    pub fn new() -> Self {
        TplScheduler { current: APPLICATION, pending_mask: 0, saved_interrupts_enabled: None }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// `RaiseTPL`. Returns the prior TPL. Panics if `new < current`
    /// (spec 4.1 "raise(new) requires new >= current").
    pub fn raise(&mut self, new: usize) -> usize {
        assert!(new >= self.current, "RaiseTPL: new {new} below current {}", self.current);
        let old = self.current;
        if new >= HIGH_LEVEL && old < HIGH_LEVEL {
            let enabled = unsafe { crate::arch::disable_interrupts() };
            self.saved_interrupts_enabled = Some(enabled);
        }
        self.current = new;
        trace!("RaiseTPL {old} -> {new}");
        old
    }

    /// Marks `tpl` as having a non-empty dispatch queue. Called by the
    /// event core when `SignalEvent` queues a notify at that priority.
    pub fn mark_pending(&mut self, tpl: usize) {
        self.pending_mask |= 1u64 << tpl;
    }

    /// Clears the pending bit for `tpl`. The event core calls this once
    /// its queue at that priority has been fully drained; exposed so a
    /// dispatch callback that drains more than one queue (none currently
    /// do) could clear them individually.
    pub fn clear_pending(&mut self, tpl: usize) {
        self.pending_mask &= !(1u64 << tpl);
    }

    fn highest_pending_above(&self, floor: usize) -> Option<usize> {
        let floor_mask = (1u64 << (floor + 1)) - 1;
        let masked = self.pending_mask & !floor_mask;
        if masked == 0 {
            None
        } else {
            Some(63 - masked.leading_zeros() as usize)
        }
    }

    /// `RestoreTPL`. Panics if `old > current` (spec 4.1 "restore(old) is
    /// only valid while old <= current"). While any priority strictly
    /// above `old` has a pending queue, raises to the highest such
    /// priority, re-enables interrupts if dropping back below
    /// `HIGH_LEVEL`, and invokes `dispatch(self, tpl)` so the event core
    /// can drain that priority's FIFO queue with `self.current()`
    /// already reporting `tpl` as required by spec 4.1 ("calling
    /// `notify_fn(event, ctx)` with the lock released and `notify_tpl`
    /// established as current"). The callback must call
    /// [`TplScheduler::clear_pending`] once it has drained the queue.
    pub fn restore(&mut self, old: usize, mut dispatch: impl FnMut(&mut Self, usize)) {
        assert!(old <= self.current, "RestoreTPL: old {old} above current {}", self.current);
        while let Some(tpl) = self.highest_pending_above(old) {
            let was_high = self.current >= HIGH_LEVEL;
            self.current = tpl;
            if was_high && tpl < HIGH_LEVEL {
                if let Some(enabled) = self.saved_interrupts_enabled.take() {
                    unsafe { crate::arch::set_interrupts_enabled(enabled) };
                }
            }
            dispatch(self, tpl);
        }
        self.current = old;
        if old < HIGH_LEVEL {
            if let Some(enabled) = self.saved_interrupts_enabled.take() {
                unsafe { crate::arch::set_interrupts_enabled(enabled) };
            }
        }
        trace!("RestoreTPL -> {old}");
    }
}
