//! Event objects and event groups (spec 4.3, component C4). The timer
//! list and tick path live in [`timer`]; this module owns event identity,
//! the flag-combination whitelist, notify-queue dispatch, and the
//! well-known event-group upgrade rules.

pub mod timer;

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::trace;

use crate::config::guid::{EVENT_GROUP_EXIT_BOOT_SERVICES, EVENT_GROUP_VIRTUAL_ADDRESS_CHANGE};
use crate::config::tpl::{APPLICATION, HIGH_LEVEL};
use crate::error::{CoreError, EventError, Result};
use crate::tpl::TplScheduler;
use crate::uefi::base::{Event, Guid, Status};

use timer::{TimerList, TimerRecord};

bitflags::bitflags! {
    /// Spec 4.3 "Create" whitelist, expressed as bits instead of an ad-hoc
    /// tuple match so the allowed-combination check is one mask compare.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct EventType: u32 {
        const TIMER          = 0x8000_0000;
        const NOTIFY_SIGNAL   = 0x0000_0200;
        const NOTIFY_WAIT     = 0x0000_0100;
        const RUNTIME         = 0x4000_0000;
        const EXIT_BOOT_SERVICES      = 0x0000_0201;
        const VIRTUAL_ADDRESS_CHANGE  = 0x6000_0202;
    }
}

impl EventType {
    fn is_notify(&self) -> bool {
        self.intersects(EventType::NOTIFY_SIGNAL | EventType::NOTIFY_WAIT)
    }

    /// Spec 4.3 "Create": `{timer alone; timer + notify_signal; timer +
    /// notify_wait; notify_wait; notify_signal; exit-boot-services;
    /// virtual-address-change; none}`.
    fn is_whitelisted(&self) -> bool {
        if self.contains(EventType::NOTIFY_SIGNAL) && self.contains(EventType::NOTIFY_WAIT) {
            return false;
        }
        let s = *self;
        s == EventType::TIMER
            || s == EventType::EXIT_BOOT_SERVICES
            || s == EventType::VIRTUAL_ADDRESS_CHANGE
            || s == EventType::empty()
            || s == EventType::TIMER | EventType::NOTIFY_SIGNAL
            || s == EventType::TIMER | EventType::NOTIFY_WAIT
            || s == EventType::NOTIFY_WAIT
            || s == EventType::NOTIFY_SIGNAL
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum EventState {
    Idle,
    Queued,
    Signaled,
}

pub type NotifyFn = extern "efiapi" fn(Event, *mut core::ffi::c_void);

struct EventRecord {
    ty: EventType,
    notify_tpl: usize,
    notify_fn: Option<NotifyFn>,
    notify_ctx: *mut core::ffi::c_void,
    group: Option<Guid>,
    signal_count: u64,
    state: EventState,
    timer: Option<TimerRecord>,
}

// SAFETY: events only ever run on the single boot-services thread; the raw
// context pointer is opaque payload the core never dereferences itself.
unsafe impl Send for EventRecord {}

/// Owns every live event, the per-TPL FIFO notify queues, the timer list,
/// and the monotonic tick counter. One instance backs the whole
/// `CreateEvent`/`SignalEvent`/`CheckEvent`/`WaitForEvent`/`SetTimer`/
/// `CloseEvent` surface.
pub struct EventTimerCore {
    events: Vec<(Event, EventRecord)>,
    /// FIFO queue per TPL level, indexed directly by level (spec 4.1/4.3:
    /// "events dispatch in the order they were queued since the last
    /// restore below that level").
    queues: [VecDeque<Event>; HIGH_LEVEL + 1],
    timers: TimerList,
    monotonic_count: u64,
    next_handle: usize,
}

impl EventTimerCore {
    pub fn new() -> Self {
        EventTimerCore {
            events: Vec::new(),
            queues: core::array::from_fn(|_| VecDeque::new()),
            timers: TimerList::new(),
            monotonic_count: 0,
            next_handle: 1,
        }
    }

    fn alloc_event_handle(&mut self) -> Event {
        let h = self.next_handle;
        self.next_handle += 1;
        Event(h as *mut core::ffi::c_void)
    }

    /// Unknown event handles are a contract breach (spec §7 "contract
    /// breaches ... return invalid-parameter immediately"), distinct from
    /// [`EventError::NotReady`] which means "this event exists but hasn't
    /// fired yet".
    fn find(&self, event: Event) -> Result<usize> {
        self.events.iter().position(|(e, _)| *e == event).ok_or(CoreError::Status(Status::INVALID_PARAMETER))
    }

    /// `CreateEvent`/`CreateEventEx` (spec 4.3 "Create").
    pub fn create(
        &mut self,
        mut ty: EventType,
        notify_tpl: usize,
        notify_fn: Option<NotifyFn>,
        notify_ctx: *mut core::ffi::c_void,
        group: Option<Guid>,
    ) -> Result<Event> {
        if let Some(g) = group {
            if g == EVENT_GROUP_EXIT_BOOT_SERVICES {
                ty = EventType::EXIT_BOOT_SERVICES;
            } else if g == EVENT_GROUP_VIRTUAL_ADDRESS_CHANGE {
                ty = EventType::VIRTUAL_ADDRESS_CHANGE;
            }
        }
        let implied_group = if ty == EventType::EXIT_BOOT_SERVICES {
            Some(EVENT_GROUP_EXIT_BOOT_SERVICES)
        } else if ty == EventType::VIRTUAL_ADDRESS_CHANGE {
            Some(EVENT_GROUP_VIRTUAL_ADDRESS_CHANGE)
        } else {
            group
        };

        if !ty.is_whitelisted() {
            return Err(CoreError::Event(EventError::InvalidFlagCombination));
        }
        if ty.is_notify() {
            if notify_fn.is_none() {
                return Err(CoreError::Event(EventError::MissingNotifyFunction));
            }
            if notify_tpl <= APPLICATION || notify_tpl >= HIGH_LEVEL {
                return Err(CoreError::Event(EventError::InvalidNotifyTpl));
            }
        }

        let handle = self.alloc_event_handle();
        self.events.push((
            handle,
            EventRecord {
                ty,
                notify_tpl,
                notify_fn,
                notify_ctx,
                group: implied_group,
                signal_count: 0,
                state: EventState::Idle,
                timer: None,
            },
        ));
        trace!("CreateEvent: {handle:?} type={ty:?}");
        Ok(handle)
    }

    fn queue(&mut self, idx: usize, tpl: &mut TplScheduler) {
        let (handle, rec) = &mut self.events[idx];
        if rec.state == EventState::Queued {
            return;
        }
        rec.state = EventState::Queued;
        self.queues[rec.notify_tpl].push_back(*handle);
        tpl.mark_pending(rec.notify_tpl);
    }

    /// `SignalEvent` (spec 4.3 "Signal"). Idempotent within a cycle: a
    /// second signal before the notify runs does not double-queue.
    pub fn signal(&mut self, event: Event, tpl: &mut TplScheduler) -> Result<()> {
        let idx = self.find(event)?;
        let already_signaled = self.events[idx].1.signal_count > 0;
        if !already_signaled {
            self.events[idx].1.signal_count += 1;
        }
        let ty = self.events[idx].1.ty;
        if ty.contains(EventType::NOTIFY_SIGNAL) {
            match self.events[idx].1.group {
                None => self.queue(idx, tpl),
                Some(g) => {
                    let members: Vec<usize> =
                        self.events.iter().enumerate().filter(|(_, (_, r))| r.group == Some(g)).map(|(i, _)| i).collect();
                    for m in members {
                        if self.events[m].1.signal_count == 0 {
                            self.events[m].1.signal_count += 1;
                        }
                        self.queue(m, tpl);
                    }
                }
            }
        }
        Ok(())
    }

    /// `CheckEvent` (spec 4.3 "Check"). For a `notify_wait` event this
    /// queues the notify synchronously before checking.
    pub fn check(&mut self, event: Event, tpl: &mut TplScheduler) -> Result<bool> {
        let idx = self.find(event)?;
        if self.events[idx].1.ty.contains(EventType::NOTIFY_WAIT) {
            self.queue(idx, tpl);
            self.drain_queue_for(idx, tpl);
        }
        if self.events[idx].1.signal_count > 0 {
            self.events[idx].1.signal_count = 0;
            Ok(true)
        } else {
            Err(CoreError::Event(EventError::NotReady))
        }
    }

    fn drain_queue_for(&mut self, idx: usize, tpl: &mut TplScheduler) {
        let notify_tpl = self.events[idx].1.notify_tpl;
        self.drain_queue_at(notify_tpl, tpl);
    }

    fn drain_queue_at(&mut self, level: usize, _tpl: &mut TplScheduler) {
        while let Some(handle) = self.queues[level].pop_front() {
            if let Ok(idx) = self.find(handle) {
                self.events[idx].1.state = EventState::Idle;
                let (notify_fn, ctx) = (self.events[idx].1.notify_fn, self.events[idx].1.notify_ctx);
                if let Some(f) = notify_fn {
                    f(handle, ctx);
                }
            }
        }
    }

    /// Callback passed to [`TplScheduler::restore`]; drains the priority's
    /// FIFO queue and clears its pending bit (spec 4.1's contract for the
    /// `dispatch` parameter).
    pub fn dispatch_pending(&mut self, tpl: &mut TplScheduler, level: usize) {
        self.drain_queue_at(level, tpl);
        tpl.clear_pending(level);
    }

    /// Signals every event registered against `group`, if any exist (spec
    /// 4.1/4.3 "`WaitForEvent`'s idle loop signals the idle-loop event
    /// group between polling passes" -- a no-op group with no members
    /// registered is not an error, just nothing to wake).
    pub fn signal_group(&mut self, group: Guid, tpl: &mut TplScheduler) {
        if let Some(handle) = self.events.iter().find(|(_, r)| r.group == Some(group)).map(|(h, _)| *h) {
            let _ = self.signal(handle, tpl);
        }
    }

    /// `WaitForEvent` (spec 4.3 "Wait"). Only valid at application TPL.
    pub fn wait(&mut self, events: &[Event], tpl: &mut TplScheduler, mut idle: impl FnMut()) -> Result<usize> {
        if tpl.current() != APPLICATION {
            return Err(CoreError::Event(EventError::UnsupportedAtCurrentTpl));
        }
        loop {
            for (i, e) in events.iter().enumerate() {
                if self.check(*e, tpl).is_ok() {
                    return Ok(i);
                }
            }
            idle();
        }
    }

    /// `SetTimer` (spec 4.3). `trigger_time` is UEFI's 100-ns wire unit;
    /// converted to hardware ticks via `timer_frequency_hz` before being
    /// handed to [`timer`]. If the computed due time has already passed it
    /// signals immediately so expiry always runs in notify-TPL context,
    /// never interrupt context.
    pub fn set_timer(
        &mut self,
        event: Event,
        periodic: bool,
        cancel: bool,
        trigger_time: u64,
        timer_frequency_hz: u64,
        now: u64,
        tpl: &mut TplScheduler,
    ) -> Result<()> {
        let idx = self.find(event)?;
        if !self.events[idx].1.ty.contains(EventType::TIMER) {
            return Err(CoreError::Event(EventError::InvalidFlagCombination));
        }
        if cancel {
            self.events[idx].1.timer = None;
            self.timers.remove(event);
            return Ok(());
        }
        let ticks = trigger_time.saturating_mul(timer_frequency_hz) / crate::config::timer::HUNDRED_NS_PER_SECOND;
        let period = if periodic { ticks.max(1) } else { 0 };
        let due = now + ticks;
        self.events[idx].1.timer = Some(TimerRecord { due_ticks: due, period_ticks: period });
        self.timers.upsert(event, due, period);
        if due <= now {
            self.signal(event, tpl)?;
        }
        Ok(())
    }

    /// Tick-path expiry processing (spec 4.3 "Tick path"), called with
    /// `now` already extended to a monotonic 64-bit value. Pops every
    /// expired timer, signals it, and reinserts periodic ones with their
    /// due time advanced (snapped to `now` if it fell behind).
    pub fn service_expired_timers(&mut self, now: u64, tpl: &mut TplScheduler) {
        self.monotonic_count = self.monotonic_count.wrapping_add(1);
        for (event, period) in self.timers.pop_expired(now) {
            let _ = self.signal(event, tpl);
            if period > 0 {
                let mut next_due = now.saturating_add(period);
                if next_due <= now {
                    next_due = now;
                }
                if let Ok(idx) = self.find(event) {
                    self.events[idx].1.timer = Some(TimerRecord { due_ticks: next_due, period_ticks: period });
                }
                self.timers.upsert(event, next_due, period);
            }
        }
    }

    pub fn monotonic_count(&self) -> u64 {
        self.monotonic_count
    }

    /// `CloseEvent` (spec 4.3 "Close"). Cancels any active timer and
    /// unlinks from whatever queue it is sitting in.
    pub fn close(&mut self, event: Event) -> Result<()> {
        let idx = self.find(event)?;
        self.timers.remove(event);
        let notify_tpl = self.events[idx].1.notify_tpl;
        self.queues[notify_tpl].retain(|e| *e != event);
        self.events.remove(idx);
        Ok(())
    }
}

impl Default for EventTimerCore {
    fn default() -> Self {
        Self::new()
    }
}
