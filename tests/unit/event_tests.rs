//! Black-box coverage of `EventTimerCore` (spec 4.3, component C4).

use core::ffi::c_void;

use dxe_core::config::tpl::{APPLICATION, CALLBACK, NOTIFY};
use dxe_core::event::{EventTimerCore, EventType};
use dxe_core::tpl::TplScheduler;
use dxe_core::uefi::base::Event;

static mut NOTIFY_COUNT: u32 = 0;

extern "efiapi" fn count_notify(_event: Event, _ctx: *mut c_void) {
    unsafe { NOTIFY_COUNT += 1 };
}

#[test]
fn create_rejects_disallowed_flag_combination() {
    let mut ev = EventTimerCore::new();
    let status = ev.create(EventType::NOTIFY_SIGNAL | EventType::NOTIFY_WAIT, CALLBACK, Some(count_notify), core::ptr::null_mut(), None);
    assert!(status.is_err());
}

#[test]
fn create_notify_event_requires_notify_fn() {
    let mut ev = EventTimerCore::new();
    let status = ev.create(EventType::NOTIFY_SIGNAL, CALLBACK, None, core::ptr::null_mut(), None);
    assert!(status.is_err());
}

#[test]
fn signal_queues_notify_and_restore_dispatches_it() {
    unsafe { NOTIFY_COUNT = 0 };
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::NOTIFY_SIGNAL, CALLBACK, Some(count_notify), core::ptr::null_mut(), None).unwrap();

    tpl.raise(NOTIFY);
    ev.signal(handle, &mut tpl).unwrap();
    tpl.restore(APPLICATION, |scheduler, level| ev.dispatch_pending(scheduler, level));

    assert_eq!(unsafe { NOTIFY_COUNT }, 1);
}

#[test]
fn double_signal_before_dispatch_does_not_double_notify() {
    unsafe { NOTIFY_COUNT = 0 };
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::NOTIFY_SIGNAL, CALLBACK, Some(count_notify), core::ptr::null_mut(), None).unwrap();

    tpl.raise(NOTIFY);
    ev.signal(handle, &mut tpl).unwrap();
    ev.signal(handle, &mut tpl).unwrap();
    tpl.restore(APPLICATION, |scheduler, level| ev.dispatch_pending(scheduler, level));

    assert_eq!(unsafe { NOTIFY_COUNT }, 1);
}

#[test]
fn check_event_reports_not_ready_until_signaled() {
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::empty(), CALLBACK, None, core::ptr::null_mut(), None).unwrap();
    assert!(ev.check(handle, &mut tpl).is_err());
    ev.signal(handle, &mut tpl).unwrap();
    assert_eq!(ev.check(handle, &mut tpl).unwrap(), true);
    // consumed: a second check without another signal reports not-ready again.
    assert!(ev.check(handle, &mut tpl).is_err());
}

#[test]
fn set_timer_with_due_time_already_passed_signals_immediately() {
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::TIMER, CALLBACK, None, core::ptr::null_mut(), None).unwrap();
    ev.set_timer(handle, false, false, 0, 10_000_000, 100, &mut tpl).unwrap();
    assert_eq!(ev.check(handle, &mut tpl).unwrap(), true);
}

#[test]
fn set_timer_converts_100ns_trigger_time_via_platform_frequency() {
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::TIMER, CALLBACK, None, core::ptr::null_mut(), None).unwrap();
    // 1 MHz platform counter: a trigger_time of 1_000_000 (100 ms in 100-ns
    // units) must convert to 100_000 ticks, not the 1_000_000 ticks a 10 MHz
    // identity conversion would wrongly produce.
    ev.set_timer(handle, false, false, 1_000_000, 1_000_000, 0, &mut tpl).unwrap();
    ev.service_expired_timers(99_999, &mut tpl);
    assert!(ev.check(handle, &mut tpl).is_err());
    ev.service_expired_timers(100_000, &mut tpl);
    assert_eq!(ev.check(handle, &mut tpl).unwrap(), true);
}

#[test]
fn service_expired_timers_reinserts_periodic_timer() {
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::TIMER, CALLBACK, None, core::ptr::null_mut(), None).unwrap();
    ev.set_timer(handle, true, false, 10, 10_000_000, 0, &mut tpl).unwrap();

    ev.service_expired_timers(10, &mut tpl);
    assert_eq!(ev.check(handle, &mut tpl).unwrap(), true);

    ev.service_expired_timers(20, &mut tpl);
    assert_eq!(ev.check(handle, &mut tpl).unwrap(), true);
}

#[test]
fn close_event_cancels_timer_so_it_never_fires_again() {
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::TIMER, CALLBACK, None, core::ptr::null_mut(), None).unwrap();
    ev.set_timer(handle, true, false, 10, 10_000_000, 0, &mut tpl).unwrap();
    ev.close(handle).unwrap();
    assert!(ev.check(handle, &mut tpl).is_err());
}

#[test]
fn wait_rejects_call_above_application_tpl() {
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let handle = ev.create(EventType::empty(), CALLBACK, None, core::ptr::null_mut(), None).unwrap();
    tpl.raise(NOTIFY);
    assert!(ev.wait(&[handle], &mut tpl, || {}).is_err());
}
