//! Black-box coverage of `TplScheduler` (spec 4.1) against its public API.

use dxe_core::config::tpl::{APPLICATION, CALLBACK, HIGH_LEVEL, NOTIFY};
use dxe_core::tpl::TplScheduler;

#[test]
fn starts_at_application_level() {
    let tpl = TplScheduler::new();
    assert_eq!(tpl.current(), APPLICATION);
}

#[test]
fn raise_returns_previous_level_and_updates_current() {
    let mut tpl = TplScheduler::new();
    let old = tpl.raise(NOTIFY);
    assert_eq!(old, APPLICATION);
    assert_eq!(tpl.current(), NOTIFY);
}

#[test]
#[should_panic]
fn raise_below_current_panics() {
    let mut tpl = TplScheduler::new();
    tpl.raise(NOTIFY);
    tpl.raise(CALLBACK);
}

#[test]
#[should_panic]
fn restore_above_current_panics() {
    let mut tpl = TplScheduler::new();
    tpl.raise(CALLBACK);
    tpl.restore(HIGH_LEVEL, |_, _| {});
}

#[test]
fn restore_drains_pending_queues_at_or_above_target_in_order() {
    let mut tpl = TplScheduler::new();
    tpl.raise(HIGH_LEVEL);
    tpl.mark_pending(NOTIFY);
    tpl.mark_pending(CALLBACK);

    let mut dispatched = Vec::new();
    tpl.restore(APPLICATION, |scheduler, level| {
        dispatched.push(level);
        scheduler.clear_pending(level);
    });

    assert_eq!(dispatched, vec![NOTIFY, CALLBACK]);
    assert_eq!(tpl.current(), APPLICATION);
}

#[test]
fn clear_pending_prevents_restore_from_redispatching_it() {
    let mut tpl = TplScheduler::new();
    tpl.raise(NOTIFY);
    tpl.mark_pending(CALLBACK);
    tpl.clear_pending(CALLBACK);

    let mut dispatched = Vec::new();
    tpl.restore(APPLICATION, |scheduler, level| {
        dispatched.push(level);
        scheduler.clear_pending(level);
    });
    assert!(dispatched.is_empty());
}
