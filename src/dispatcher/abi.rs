//! The `extern "efiapi"` function bodies `dispatcher::tables` wires every
//! `BootServices`/`RuntimeServices` field to. Each one marshals raw ABI
//! arguments, reaches `CoreState` through [`super::with_core`], delegates
//! to the owning subsystem, and converts the result back to the wire
//! [`Status`] at the boundary (`CoreError::into`). No policy lives here
//! beyond that marshaling — matching the ABI-table-as-pure-data split the
//! rest of this crate's `uefi::table` follows in the opposite direction.

use alloc::vec::Vec;
use core::ffi::c_void;

use crate::error::{CoreError, ImageError};
use crate::image::{loader, runtime as runtime_image};
use crate::protocol::{self, ProtocolDatabase};
use crate::uefi::base::{Boolean, Char16, Event, Guid, Handle, Status, FALSE};
use crate::uefi::table::boot::{
    AllocateType, InterfaceType, LocateSearchType, MemoryDescriptor, MemoryType, OpenProtocolInformationEntry, TimerDelay,
};
use crate::uefi::table::runtime::ResetType;

use super::{with_core, CoreState};

fn status_of<T>(result: crate::error::Result<T>) -> Status {
    match result {
        Ok(_) => Status::SUCCESS,
        Err(e) => e.into(),
    }
}

// ---------------------------------------------------------------------
// Task Priority Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn raise_tpl(new_tpl: usize) -> usize {
    with_core(|s| s.tpl.raise(new_tpl))
}

pub extern "efiapi" fn restore_tpl(old_tpl: usize) {
    with_core(|s| {
        let CoreState { tpl, events, .. } = s;
        tpl.restore(old_tpl, |sched, level| events.dispatch_pending(sched, level));
    });
}

// ---------------------------------------------------------------------
// Memory Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn allocate_pages(alloc_type: AllocateType, memory_type: MemoryType, pages: usize, memory: *mut u64) -> Status {
    if memory.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: a non-null `memory` is caller-owned storage for one `u64`,
    // read only when `alloc_type` requires a requested address (spec 4.2
    // `AllocatePages`).
    let address = if alloc_type == AllocateType::AllocateAnyPages { None } else { Some(unsafe { *memory }) };
    with_core(|s| match s.memory.allocate_pages(alloc_type, memory_type, pages as u64, address) {
        Ok(start) => {
            unsafe { *memory = start };
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

pub extern "efiapi" fn free_pages(memory: u64, pages: usize) -> Status {
    with_core(|s| status_of(s.memory.free_pages(memory, pages as u64)))
}

pub extern "efiapi" fn get_memory_map(
    memory_map_size: *mut usize,
    memory_map: *mut MemoryDescriptor,
    map_key: *mut usize,
    descriptor_size: *mut usize,
    descriptor_version: *mut u32,
) -> Status {
    if memory_map_size.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| {
        let snapshot = s.memory.get_memory_map();
        let required = snapshot.descriptors.len() * snapshot.descriptor_size;
        // SAFETY: `memory_map_size` is non-null; `*memory_map_size` is the
        // caller's buffer capacity in bytes, per `GetMemoryMap`'s contract.
        let available = unsafe { *memory_map_size };
        unsafe { *memory_map_size = required };
        if available < required || memory_map.is_null() {
            return Status::BUFFER_TOO_SMALL;
        }
        // SAFETY: caller-provided buffer is at least `required` bytes;
        // callers must stride by `descriptor_size`, which is exactly
        // `size_of::<MemoryDescriptor>()` here, so a typed write is exact.
        unsafe {
            for (i, d) in snapshot.descriptors.iter().enumerate() {
                memory_map.add(i).write(*d);
            }
        }
        if !map_key.is_null() {
            unsafe { *map_key = snapshot.map_key as usize };
        }
        if !descriptor_size.is_null() {
            unsafe { *descriptor_size = snapshot.descriptor_size };
        }
        if !descriptor_version.is_null() {
            unsafe { *descriptor_version = 1 };
        }
        Status::SUCCESS
    })
}

pub extern "efiapi" fn allocate_pool(pool_type: MemoryType, size: usize, buffer: *mut *mut u8) -> Status {
    if buffer.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| match s.memory.allocate_pool(pool_type, size) {
        Ok(ptr) => {
            unsafe { *buffer = ptr.as_ptr() };
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

pub extern "efiapi" fn free_pool(buffer: *mut u8) -> Status {
    match core::ptr::NonNull::new(buffer) {
        Some(ptr) => with_core(|s| status_of(s.memory.free_pool(ptr))),
        None => Status::INVALID_PARAMETER,
    }
}

// ---------------------------------------------------------------------
// Event & Timer Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn create_event(
    ty: u32,
    notify_tpl: usize,
    notify_fn: Option<extern "efiapi" fn(Event, *mut c_void)>,
    notify_ctx: *mut c_void,
    event: *mut Event,
) -> Status {
    if event.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let Some(ty) = crate::event::EventType::from_bits(ty) else {
        return Status::INVALID_PARAMETER;
    };
    with_core(|s| match s.events.create(ty, notify_tpl, notify_fn, notify_ctx, None) {
        Ok(e) => {
            unsafe { *event = e };
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

pub extern "efiapi" fn create_event_ex(
    ty: u32,
    notify_tpl: usize,
    notify_fn: Option<extern "efiapi" fn(Event, *mut c_void)>,
    notify_ctx: *const c_void,
    event_group: *const Guid,
    event: *mut Event,
) -> Status {
    if event.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let Some(ty) = crate::event::EventType::from_bits(ty) else {
        return Status::INVALID_PARAMETER;
    };
    // SAFETY: a non-null `event_group` points at one caller-owned `Guid`.
    let group = if event_group.is_null() { None } else { Some(unsafe { *event_group }) };
    with_core(|s| match s.events.create(ty, notify_tpl, notify_fn, notify_ctx as *mut c_void, group) {
        Ok(e) => {
            unsafe { *event = e };
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

pub extern "efiapi" fn set_timer(event: Event, ty: TimerDelay, trigger_time: u64) -> Status {
    with_core(|s| {
        let (periodic, cancel) = match ty {
            TimerDelay::TimerCancel => (false, true),
            TimerDelay::TimerPeriodic => (true, false),
            TimerDelay::TimerRelative => (false, false),
        };
        let CoreState { events, tpl, now, timer_frequency_hz, .. } = s;
        status_of(events.set_timer(event, periodic, cancel, trigger_time, *timer_frequency_hz, *now, tpl))
    })
}

pub extern "efiapi" fn wait_for_event(number_of_events: usize, event: *mut Event, index: *mut usize) -> Status {
    if event.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: caller guarantees `event` is valid for `number_of_events`
    // `Event`s (spec 4.3 `WaitForEvent`).
    let events_slice = unsafe { core::slice::from_raw_parts(event, number_of_events) };
    with_core(|s| {
        let hooks = s.hooks;
        let CoreState { events, tpl, .. } = s;
        match events.wait(events_slice, tpl, || hooks.stall_microseconds(1000)) {
            Ok(i) => {
                if !index.is_null() {
                    unsafe { *index = i };
                }
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

pub extern "efiapi" fn signal_event(event: Event) -> Status {
    with_core(|s| {
        let CoreState { events, tpl, .. } = s;
        status_of(events.signal(event, tpl))
    })
}

pub extern "efiapi" fn close_event(event: Event) -> Status {
    with_core(|s| status_of(s.events.close(event)))
}

pub extern "efiapi" fn check_event(event: Event) -> Status {
    with_core(|s| {
        let CoreState { events, tpl, .. } = s;
        status_of(events.check(event, tpl))
    })
}

// ---------------------------------------------------------------------
// Protocol Handler Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn install_protocol_interface(handle: *mut Handle, guid: *const Guid, _interface_type: InterfaceType, interface: *mut c_void) -> Status {
    if handle.is_null() || guid.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: non-null `guid`/`handle` point at caller-owned values (spec
    // 4.4 `InstallProtocolInterface`).
    let g = unsafe { *guid };
    let requested = unsafe { *handle };
    let existing = if requested.is_null() { None } else { Some(requested) };
    with_core(|s| {
        let CoreState { protocols, events, tpl, .. } = s;
        match protocols.install(existing, g, interface, events, tpl) {
            Ok(h) => {
                unsafe { *handle = h };
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

/// Reinstalls, then re-drives `ConnectController` over `handle` so drivers
/// see the replaced interface (spec 9 open question a: "the dispatcher
/// re-drives `ConnectController` in handle-install order after
/// `ReinstallProtocolInterface` returns").
pub extern "efiapi" fn reinstall_protocol_interface(handle: Handle, guid: *const Guid, _old_interface: *mut c_void, new_interface: *mut c_void) -> Status {
    if guid.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *guid };
    with_core(|s| match s.protocols.reinstall(handle, g, new_interface) {
        Ok(()) => {
            let _ = protocol::connect_controller(&mut s.protocols, handle, None, core::ptr::null_mut(), false);
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

pub extern "efiapi" fn uninstall_protocol_interface(handle: Handle, guid: *const Guid, _interface: *mut c_void) -> Status {
    if guid.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *guid };
    with_core(|s| status_of(s.protocols.uninstall(handle, g)))
}

pub extern "efiapi" fn handle_protocol(handle: Handle, guid: *const Guid, interface: *mut *mut c_void) -> Status {
    if guid.is_null() || interface.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *guid };
    with_core(|s| match s.protocols.handle_protocol(handle, g) {
        Ok(p) => {
            unsafe { *interface = p };
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

/// The registration token handed back is the event's own identity rather
/// than `ProtocolDatabase`'s internal counter, since `LocateHandle`'s
/// `ByRegisterNotify` search key is what this crate's database actually
/// keys its pending-notification queue on.
pub extern "efiapi" fn register_protocol_notify(guid: *const Guid, event: Event, registration: *mut *mut c_void) -> Status {
    if guid.is_null() || registration.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *guid };
    with_core(|s| {
        let _ = s.protocols.register_protocol_notify(g, event);
        unsafe { *registration = event.0 };
        Status::SUCCESS
    })
}

pub extern "efiapi" fn locate_handle(
    search_type: LocateSearchType,
    protocol: *const Guid,
    search_key: *mut c_void,
    buffer_size: *mut usize,
    buffer: *mut Handle,
) -> Status {
    if buffer_size.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| {
        let handles: Vec<Handle> = match search_type {
            LocateSearchType::AllHandles => s.protocols.locate_handles(None),
            LocateSearchType::ByProtocol => {
                if protocol.is_null() {
                    return Status::INVALID_PARAMETER;
                }
                s.protocols.locate_handles(Some(unsafe { *protocol }))
            }
            LocateSearchType::ByRegisterNotify => match s.protocols.next_notified_handle(Event(search_key)) {
                Some(h) => alloc::vec![h],
                None => return Status::NOT_FOUND,
            },
        };
        if handles.is_empty() {
            return Status::NOT_FOUND;
        }
        let required = handles.len() * core::mem::size_of::<Handle>();
        let available = unsafe { *buffer_size };
        unsafe { *buffer_size = required };
        if available < required || buffer.is_null() {
            return Status::BUFFER_TOO_SMALL;
        }
        // SAFETY: just checked `buffer` is non-null and large enough.
        unsafe {
            for (i, h) in handles.iter().enumerate() {
                buffer.add(i).write(*h);
            }
        }
        Status::SUCCESS
    })
}

/// Device-path resolution is an external collaborator per spec scope; this
/// core tracks no device-path tree to walk.
pub extern "efiapi" fn locate_device_path(_protocol: *const Guid, _device_path: *mut *mut c_void, _device: *mut Handle) -> Status {
    Status::UNSUPPORTED
}

pub extern "efiapi" fn install_configuration_table(guid: *const Guid, table: *mut c_void) -> Status {
    if guid.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *guid };
    with_core(|s| match s.config_table.install(g, table) {
        Ok(()) => {
            super::tables::sync_configuration_table(s);
            Status::SUCCESS
        }
        Err(e) => e.into(),
    })
}

// ---------------------------------------------------------------------
// Image Services
// ---------------------------------------------------------------------

/// Device-path-based image resolution is out of scope (spec §1); `source`
/// is always taken from the caller-supplied buffer, never resolved from a
/// device path. `device_handle` is recorded as null on the loaded-image
/// protocol, matching the precedent `dispatcher::try_load_and_start_driver`
/// already sets for firmware-volume-sourced drivers; runtime-ness is not
/// derivable from a parsed PE/TE image here, so every image loaded through
/// this entry point is boot-services-only.
pub extern "efiapi" fn load_image(
    _boot_policy: Boolean,
    parent_image_handle: Handle,
    device_path: *mut c_void,
    source_buffer: *mut c_void,
    source_size: usize,
    image_handle: *mut Handle,
) -> Status {
    if source_buffer.is_null() || source_size == 0 || image_handle.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: caller guarantees `source_buffer` is valid for `source_size`
    // bytes (spec 4.5 `LoadImage`).
    let source = unsafe { core::slice::from_raw_parts(source_buffer as *const u8, source_size) };
    with_core(|s| {
        let system_table = s.system_table;
        let result = loader::load_image(
            source,
            parent_image_handle,
            Handle::null(),
            device_path,
            system_table,
            false,
            &mut s.memory,
            &mut s.protocols,
            &mut s.events,
            &mut s.tpl,
        );
        match result {
            Ok(loaded) => {
                let handle = loaded.handle;
                s.loaded_images.push(loaded);
                unsafe { *image_handle = handle };
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

/// `StartImage`. The entry point runs with the `CORE` guard dropped: it is
/// virtually every real driver's `Start`/entry routine to call straight
/// back into boot services (`AllocatePool`, `InstallProtocolInterface`,
/// ...) to publish its own protocols, and every one of those re-enters
/// `with_core`. Holding the guard across `entry_point` would deadlock the
/// single-threaded `spin::Mutex` on that call, so the image is pulled out
/// of `loaded_images` and the guard released *before* calling the entry
/// point, then re-acquired only to put the (now-started) image back.
pub extern "efiapi" fn start_image(image_handle: Handle, exit_data_size: *mut usize, exit_data: *mut *mut Char16) -> Status {
    if !exit_data_size.is_null() {
        unsafe { *exit_data_size = 0 };
    }
    if !exit_data.is_null() {
        unsafe { *exit_data = core::ptr::null_mut() };
    }
    let extracted = with_core(|s| {
        let idx = s.loaded_images.iter().position(|i| i.handle == image_handle)?;
        Some((s.loaded_images.remove(idx), s.hooks, s.system_table))
    });
    let Some((mut image, hooks, system_table)) = extracted else {
        return Status::INVALID_PARAMETER;
    };
    let status = loader::start_image(&mut image, hooks, system_table);
    with_core(|s| s.loaded_images.push(image));
    status
}

pub extern "efiapi" fn exit(image_handle: Handle, exit_status: Status, _exit_data_size: usize, _exit_data: *mut Char16) -> Status {
    with_core(|s| {
        let Some(idx) = s.loaded_images.iter().position(|i| i.handle == image_handle) else {
            return Status::INVALID_PARAMETER;
        };
        let image = s.loaded_images.remove(idx);
        match loader::exit_image(image, exit_status, &mut s.protocols, &mut s.memory) {
            Ok(status) => status,
            Err(e) => e.into(),
        }
    })
}

pub extern "efiapi" fn unload_image(image_handle: Handle) -> Status {
    with_core(|s| {
        let Some(idx) = s.loaded_images.iter().position(|i| i.handle == image_handle) else {
            return Status::INVALID_PARAMETER;
        };
        let image = s.loaded_images.remove(idx);
        if image.started {
            s.loaded_images.push(image);
            return CoreError::Image(ImageError::AlreadyStarted).into();
        }
        status_of(loader::unload_image(image, &mut s.protocols, &mut s.memory))
    })
}

/// `ExitBootServices` (spec 4.8 terminal handoff): rejects a stale map
/// key, signals the exit-boot-services event group and drains it,
/// disarms the tick interrupt, and nulls `SystemTable::boot_services` so
/// `SystemTable::boot_services()` reports the transition (spec 4.2
/// "subsequent boot-service calls are undefined").
pub extern "efiapi" fn exit_boot_services(_image_handle: Handle, map_key: usize) -> Status {
    with_core(|s| {
        if let Err(e) = s.memory.exit_boot_services(map_key as u64) {
            return e.into();
        }
        let CoreState { events, tpl, .. } = s;
        let current = tpl.current();
        events.signal_group(crate::config::guid::EVENT_GROUP_EXIT_BOOT_SERVICES, tpl);
        tpl.restore(current, |sched, level| events.dispatch_pending(sched, level));

        s.hooks.terminate_timers();
        s.boot_services_exited = true;
        unsafe { (*s.system_table).boot_services = core::ptr::null_mut() };
        super::tables::recompute_system_table_crc(s.system_table);
        Status::SUCCESS
    })
}

// ---------------------------------------------------------------------
// Miscellaneous Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn get_next_monotonic_count(count: *mut u64) -> Status {
    if count.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| {
        unsafe { *count = s.events.monotonic_count() };
        Status::SUCCESS
    })
}

pub extern "efiapi" fn stall(microseconds: usize) -> Status {
    with_core(|s| {
        s.hooks.stall_microseconds(microseconds);
        Status::SUCCESS
    })
}

pub extern "efiapi" fn set_watchdog_timer(timeout: usize, watchdog_code: u64, data_size: usize, watchdog_data: *const Char16) -> Status {
    with_core(|s| {
        let data = if watchdog_data.is_null() || data_size == 0 {
            None
        } else {
            // SAFETY: caller guarantees `watchdog_data` is valid for
            // `data_size` `Char16` units (spec 4.8 `SetWatchdogTimer`).
            Some(unsafe { core::slice::from_raw_parts(watchdog_data, data_size) })
        };
        s.hooks.set_watchdog(timeout, watchdog_code, data);
        Status::SUCCESS
    })
}

// ---------------------------------------------------------------------
// Driver Support Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn connect_controller(controller_handle: Handle, driver_image_handle: *mut Handle, remaining_device_path: *mut c_void, recursive: Boolean) -> Status {
    let handles: Option<[Handle; 1]> = if driver_image_handle.is_null() { None } else { Some([unsafe { *driver_image_handle }]) };
    with_core(|s| {
        status_of(protocol::connect_controller(
            &mut s.protocols,
            controller_handle,
            handles.as_ref().map(|h| h.as_slice()),
            remaining_device_path,
            recursive != FALSE,
        ))
    })
}

pub extern "efiapi" fn disconnect_controller(controller_handle: Handle, driver_image_handle: Handle, child_handle: Handle) -> Status {
    let driver = if driver_image_handle.is_null() { None } else { Some(driver_image_handle) };
    let child = if child_handle.is_null() { None } else { Some(child_handle) };
    with_core(|s| status_of(protocol::disconnect_controller(&mut s.protocols, controller_handle, driver, child)))
}

// ---------------------------------------------------------------------
// Open and Close Protocol Services
// ---------------------------------------------------------------------

/// `OpenProtocol`'s `by_driver|exclusive` path must evict conflicting
/// opens by calling `DisconnectController`, which itself needs `&mut
/// ProtocolDatabase` — the same database `open_protocol` is already
/// borrowing for the call. `ProtocolDatabase::open_protocol`'s `evict`
/// callback only ever runs synchronously, strictly before the method's
/// own remaining mutation, so a raw-pointer round-trip back to the same
/// exclusive borrow is sound here; see `protocol::database`'s own
/// `evict` contract.
pub extern "efiapi" fn open_protocol(handle: Handle, protocol_guid: *const Guid, interface: *mut *mut c_void, agent_handle: Handle, controller_handle: Handle, attributes: u32) -> Status {
    if protocol_guid.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *protocol_guid };
    with_core(|s| {
        let protocols_ptr: *mut ProtocolDatabase = &mut s.protocols;
        let result = s.protocols.open_protocol(handle, g, agent_handle, controller_handle, attributes, |evictee| {
            // SAFETY: see the doc comment above; `open_protocol` is not
            // reentered while this closure runs.
            let protocols = unsafe { &mut *protocols_ptr };
            protocol::disconnect_controller(protocols, evictee, None, None)
        });
        match result {
            Ok(ptr) => {
                if !interface.is_null() {
                    unsafe { *interface = ptr };
                }
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

pub extern "efiapi" fn close_protocol(handle: Handle, protocol_guid: *const Guid, agent_handle: Handle, controller_handle: Handle) -> Status {
    if protocol_guid.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *protocol_guid };
    with_core(|s| status_of(s.protocols.close_protocol(handle, g, agent_handle, controller_handle)))
}

pub extern "efiapi" fn open_protocol_information(handle: Handle, protocol_guid: *const Guid, entry_buffer: *mut *mut OpenProtocolInformationEntry, entry_count: *mut usize) -> Status {
    if protocol_guid.is_null() || entry_buffer.is_null() || entry_count.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *protocol_guid };
    with_core(|s| {
        let entries = match s.protocols.open_protocol_information(handle, g) {
            Ok(e) => e,
            Err(e) => return e.into(),
        };
        unsafe { *entry_count = entries.len() };
        if entries.is_empty() {
            unsafe { *entry_buffer = core::ptr::null_mut() };
            return Status::SUCCESS;
        }
        let byte_len = entries.len() * core::mem::size_of::<OpenProtocolInformationEntry>();
        match s.memory.allocate_pool(MemoryType::BootServicesData, byte_len) {
            Ok(ptr) => {
                let out = ptr.as_ptr() as *mut OpenProtocolInformationEntry;
                // SAFETY: `out` was just allocated with room for exactly
                // `entries.len()` elements of this type.
                unsafe {
                    for (i, e) in entries.iter().enumerate() {
                        out.add(i).write(*e);
                    }
                }
                unsafe { *entry_buffer = out };
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

// ---------------------------------------------------------------------
// Library Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn protocols_per_handle(handle: Handle, protocol_buffer: *mut *mut *const Guid, protocol_buffer_count: *mut usize) -> Status {
    if protocol_buffer.is_null() || protocol_buffer_count.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| {
        let guids = match s.protocols.protocols_per_handle(handle) {
            Ok(g) => g,
            Err(e) => return e.into(),
        };
        unsafe { *protocol_buffer_count = guids.len() };
        if guids.is_empty() {
            unsafe { *protocol_buffer = core::ptr::null_mut() };
            return Status::SUCCESS;
        }
        let byte_len = guids.len() * core::mem::size_of::<*const Guid>();
        match s.memory.allocate_pool(MemoryType::BootServicesData, byte_len) {
            Ok(ptr) => {
                let out = ptr.as_ptr() as *mut *const Guid;
                // Leaked so the `*const Guid` pointers this function hands
                // back stay valid after return; the pointer array itself
                // lives in the pool allocation the caller will `FreePool`.
                let leaked_guids: &'static [Guid] = alloc::boxed::Box::leak(guids.into_boxed_slice());
                // SAFETY: `out` has room for exactly `leaked_guids.len()`
                // pointers.
                unsafe {
                    for (i, g) in leaked_guids.iter().enumerate() {
                        out.add(i).write(g as *const Guid);
                    }
                }
                unsafe { *protocol_buffer = out };
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

pub extern "efiapi" fn locate_handle_buffer(
    search_type: LocateSearchType,
    protocol_guid: *const Guid,
    search_key: *mut c_void,
    no_handles: *mut usize,
    buffer: *mut *mut Handle,
) -> Status {
    if no_handles.is_null() || buffer.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| {
        let handles: Vec<Handle> = match search_type {
            LocateSearchType::AllHandles => s.protocols.locate_handles(None),
            LocateSearchType::ByProtocol => {
                if protocol_guid.is_null() {
                    return Status::INVALID_PARAMETER;
                }
                s.protocols.locate_handles(Some(unsafe { *protocol_guid }))
            }
            LocateSearchType::ByRegisterNotify => match s.protocols.next_notified_handle(Event(search_key)) {
                Some(h) => alloc::vec![h],
                None => Vec::new(),
            },
        };
        unsafe { *no_handles = handles.len() };
        if handles.is_empty() {
            unsafe { *buffer = core::ptr::null_mut() };
            return Status::NOT_FOUND;
        }
        let byte_len = handles.len() * core::mem::size_of::<Handle>();
        match s.memory.allocate_pool(MemoryType::BootServicesData, byte_len) {
            Ok(ptr) => {
                let out = ptr.as_ptr() as *mut Handle;
                // SAFETY: `out` has room for exactly `handles.len()` entries.
                unsafe {
                    for (i, h) in handles.iter().enumerate() {
                        out.add(i).write(*h);
                    }
                }
                unsafe { *buffer = out };
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

pub extern "efiapi" fn locate_protocol(protocol_guid: *const Guid, registration: *mut c_void, interface: *mut *mut c_void) -> Status {
    if protocol_guid.is_null() || interface.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let g = unsafe { *protocol_guid };
    with_core(|s| {
        let handle = if registration.is_null() {
            s.protocols.locate_handles(Some(g)).into_iter().next()
        } else {
            s.protocols.next_notified_handle(Event(registration))
        };
        match handle {
            Some(h) => match s.protocols.handle_protocol(h, g) {
                Ok(ptr) => {
                    unsafe { *interface = ptr };
                    Status::SUCCESS
                }
                Err(e) => e.into(),
            },
            None => Status::NOT_FOUND,
        }
    })
}

/// Real UEFI's `InstallMultipleProtocolInterfaces`/
/// `UninstallMultipleProtocolInterfaces` are variadic `(GUID, interface)*`
/// pairs, which `extern "efiapi"` cannot express (see
/// `uefi::table::boot`'s comment on the field). This entry point handles
/// the first pair only; `protocol::database::ProtocolDatabase`'s own
/// `uninstall_multiple` is the real multi-pair operation, exposed directly
/// to in-crate callers such as the dispatcher.
pub extern "efiapi" fn install_multiple_protocol_interfaces(handle: *mut Handle, protocol_guid: *const Guid, interface: *mut c_void) -> Status {
    install_protocol_interface(handle, protocol_guid, InterfaceType::NativeInterface, interface)
}

pub extern "efiapi" fn uninstall_multiple_protocol_interfaces(handle: Handle, protocol_guid: *const Guid, interface: *mut c_void) -> Status {
    uninstall_protocol_interface(handle, protocol_guid, interface)
}

// ---------------------------------------------------------------------
// 32-bit CRC Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn calculate_crc32(data: *const c_void, data_size: usize, crc32: *mut u32) -> Status {
    if data.is_null() || crc32.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: caller guarantees `data` is valid for `data_size` bytes.
    let bytes = unsafe { core::slice::from_raw_parts(data as *const u8, data_size) };
    unsafe { *crc32 = crate::crc32::calculate(bytes) };
    Status::SUCCESS
}

// ---------------------------------------------------------------------
// Miscellaneous Services (CopyMem/SetMem)
// ---------------------------------------------------------------------

pub extern "efiapi" fn copy_mem(destination: *mut c_void, source: *const c_void, length: usize) {
    if length == 0 {
        return;
    }
    // SAFETY: caller guarantees both ranges are valid for `length` bytes
    // (spec 4.8 `CopyMem`); the ranges may overlap, hence `copy` rather
    // than `copy_nonoverlapping`.
    unsafe { core::ptr::copy(source as *const u8, destination as *mut u8, length) };
}

pub extern "efiapi" fn set_mem(buffer: *mut c_void, size: usize, value: u8) {
    if size == 0 {
        return;
    }
    // SAFETY: caller guarantees `buffer` is valid for `size` bytes.
    unsafe { core::ptr::write_bytes(buffer as *mut u8, value, size) };
}

// ---------------------------------------------------------------------
// Runtime Services
// ---------------------------------------------------------------------

pub extern "efiapi" fn set_virtual_address_map(memory_map_size: usize, descriptor_size: usize, _descriptor_version: u32, virtual_map: *mut MemoryDescriptor) -> Status {
    if virtual_map.is_null() || descriptor_size == 0 {
        return Status::INVALID_PARAMETER;
    }
    let count = memory_map_size / descriptor_size;
    // SAFETY: caller passes back the exact memory map this core handed out
    // through `GetMemoryMap` (spec 4.2 contract for `SetVirtualAddressMap`),
    // so its stride matches `size_of::<MemoryDescriptor>()` and a typed
    // read of `count` elements is valid.
    let descriptors: Vec<MemoryDescriptor> = unsafe { core::slice::from_raw_parts(virtual_map, count) }.to_vec();
    with_core(|s| {
        let mut buffers: Vec<(Handle, &mut [u8])> = s.loaded_images.iter_mut().filter(|i| i.is_runtime).map(|i| (i.handle, i.buffer.as_mut_slice())).collect();
        let result = runtime_image::set_virtual_address_map(&s.runtime_images, &mut buffers, &descriptors);
        drop(buffers);
        match result {
            Ok(()) => {
                let CoreState { events, tpl, .. } = s;
                let current = tpl.current();
                events.signal_group(crate::config::guid::EVENT_GROUP_VIRTUAL_ADDRESS_CHANGE, tpl);
                tpl.restore(current, |sched, level| events.dispatch_pending(sched, level));
                Status::SUCCESS
            }
            Err(e) => e.into(),
        }
    })
}

const CONVERT_POINTER_OPTIONAL: usize = 0x0000_0001;

/// Address-range conversion tracking beyond what `SetVirtualAddressMap`
/// already replays directly against each runtime image's own relocation
/// log is out of this core's depth (no general "find the mapping that
/// contains this arbitrary pointer" table is kept). The one case spec'd
/// behavior requires — an optional null pointer — is still honored.
pub extern "efiapi" fn convert_pointer(debug_disposition: usize, address: *mut *mut c_void) -> Status {
    if address.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let optional = debug_disposition & CONVERT_POINTER_OPTIONAL != 0;
    // SAFETY: non-null `address` points at one caller-owned pointer.
    let ptr = unsafe { *address };
    if ptr.is_null() && optional {
        return Status::SUCCESS;
    }
    Status::NOT_FOUND
}

pub extern "efiapi" fn get_next_high_monotonic_count(high_count: *mut u32) -> Status {
    if high_count.is_null() {
        return Status::INVALID_PARAMETER;
    }
    with_core(|s| {
        s.high_monotonic_count = s.high_monotonic_count.wrapping_add(1);
        unsafe { *high_count = s.high_monotonic_count };
        Status::SUCCESS
    })
}

/// No platform reset backend is modeled in [`crate::platform::PlatformHooks`]
/// (spec §6 lists no such hook); a real platform integration would extend
/// the trait with one. Lacking it, this halts the processor, which is the
/// closest faithful behavior to "the system never returns from reset" that
/// this core can provide on its own.
pub extern "efiapi" fn reset_system(_reset_type: ResetType, _reset_status: Status, _data_size: usize, _reset_data: *const c_void) -> ! {
    loop {
        crate::arch::hlt();
    }
}
