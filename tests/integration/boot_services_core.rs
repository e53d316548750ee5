//! End-to-end exercise of the task-priority, memory, and event/timer
//! boot services through the real `BootServices` function-pointer table
//! `dispatcher::bring_up` builds, rather than the subsystems' own
//! `#[cfg(test)]` unit tests which call into `tpl`/`memory`/`event`
//! directly.

use dxe_core::dispatcher;
use dxe_core::platform::mock::MockPlatformHooks;
use dxe_core::uefi::base::{Handle, Status};
use dxe_core::uefi::table::boot::{AllocateType, MemoryDescriptor, MemoryType, TimerDelay};

fn initial_map() -> Vec<MemoryDescriptor> {
    vec![MemoryDescriptor { ty: MemoryType::ConventionalMemory as u32, pad: 0, physical_start: 0x10_0000, virtual_start: 0, number_of_pages: 256, attribute: 0 }]
}

#[test]
fn boot_services_table_drives_tpl_memory_and_timers() {
    dispatcher::teardown_for_test();
    let hooks: &'static MockPlatformHooks = Box::leak(Box::new(MockPlatformHooks::new(1_000_000, 32)));
    let system_table = dispatcher::bring_up(hooks, initial_map());

    // SAFETY: `system_table` was just built by `bring_up` and is leaked
    // for the process lifetime; `boot_services` is non-null before
    // `ExitBootServices`.
    let bs = unsafe { &*(*system_table).boot_services };

    // TPL: raising then restoring must round-trip to the starting level.
    let old = (bs.raise_tpl)(dxe_core::config::tpl::NOTIFY);
    assert_eq!(old, dxe_core::config::tpl::APPLICATION);
    (bs.restore_tpl)(old);

    // Pool allocation: a round-trip through a couple of size classes.
    for size in [8usize, 64, 4096] {
        let mut buffer: *mut u8 = core::ptr::null_mut();
        let status = (bs.allocate_pool)(MemoryType::BootServicesData, size, &mut buffer);
        assert!(status.is_success(), "allocate_pool({size}) failed: {status:?}");
        assert!(!buffer.is_null());
        unsafe { core::ptr::write_bytes(buffer, 0xAA, size) };
        let status = (bs.free_pool)(buffer);
        assert_eq!(status, Status::SUCCESS);
    }

    // Page allocation.
    let mut address: u64 = 0;
    let status = (bs.allocate_pages)(AllocateType::AllocateAnyPages, MemoryType::BootServicesData, 4, &mut address);
    assert!(status.is_success());
    assert_ne!(address, 0);
    let status = (bs.free_pages)(address, 4);
    assert_eq!(status, Status::SUCCESS);

    // A one-shot timer fires exactly once across several ticks, and
    // `CheckEvent` stops reporting it signaled once consumed.
    let mut event = dxe_core::uefi::base::Event::null();
    let status = (bs.create_event)(dxe_core::event::EventType::TIMER.bits(), 0, None, core::ptr::null_mut(), &mut event);
    assert_eq!(status, Status::SUCCESS);

    // `trigger_time` is 100-ns units; at this mock's 1 MHz counter frequency,
    // 100 converts to 10 ticks (10 us).
    let status = (bs.set_timer)(event, TimerDelay::TimerRelative, 100);
    assert_eq!(status, Status::SUCCESS);

    hooks.advance(5);
    dispatcher::timer_tick();
    assert_eq!((bs.check_event)(event), Status::NOT_READY);

    hooks.advance(10);
    dispatcher::timer_tick();
    assert_eq!((bs.check_event)(event), Status::SUCCESS);
    // Consumed: a second check before re-arming reports not-ready again.
    assert_eq!((bs.check_event)(event), Status::NOT_READY);

    let status = (bs.close_event)(event);
    assert_eq!(status, Status::SUCCESS);

    dispatcher::teardown_for_test();
}
