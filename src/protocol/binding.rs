//! `ConnectController` / `DisconnectController` (spec 4.4), driven by the
//! Driver Binding Protocol (`crate::uefi::proto::driver_binding`).

use alloc::vec::Vec;
use core::ffi::c_void;

use log::debug;

use crate::error::{CoreError, ProtocolError, Result};
use crate::uefi::base::{Guid, Handle, Status};
use crate::uefi::proto::driver_binding::{DRIVER_BINDING_PROTOCOL_GUID, DevicePathProtocol, DriverBindingProtocol};
use crate::uefi::table::boot::OPEN_PROTOCOL_BY_DRIVER;

use super::database::ProtocolDatabase;

fn binding_guid() -> Guid {
    DRIVER_BINDING_PROTOCOL_GUID
}

/// One candidate driver, with its tie-break keys (spec 4.4 "ties are
/// broken by `driver_binding.version` descending, then by image-handle
/// age" -- `seen_order` is that age proxy, lower is older).
struct Candidate {
    driver_handle: Handle,
    binding: *mut DriverBindingProtocol,
    seen_order: usize,
}

fn candidates(db: &ProtocolDatabase, driver_image_handles: Option<&[Handle]>) -> Vec<Candidate> {
    let handles = match driver_image_handles {
        Some(hs) => hs.to_vec(),
        None => db.locate_handles(Some(binding_guid())),
    };
    let mut out: Vec<Candidate> = handles
        .into_iter()
        .enumerate()
        .filter_map(|(seen_order, h)| {
            db.handle_protocol(h, binding_guid()).ok().map(|iface| Candidate { driver_handle: h, binding: iface as *mut DriverBindingProtocol, seen_order })
        })
        .collect();
    out.sort_by(|a, b| {
        let va = unsafe { (*a.binding).version };
        let vb = unsafe { (*b.binding).version };
        vb.cmp(&va).then(a.seen_order.cmp(&b.seen_order))
    });
    out
}

/// `ConnectController`. Tries every candidate driver's `Supported` in
/// tie-break order and calls `Start` on every one that reports success
/// (spec 4.4 "for each one whose `Supported` call returns success on the
/// child path, call `Start`" — not just the first), then recurses into
/// any controllers bound drivers created as children (spec 4.4
/// "recursion walks child handles reported by the child-controller
/// OpenRefs").
pub fn connect_controller(
    db: &mut ProtocolDatabase,
    controller_handle: Handle,
    driver_image_handles: Option<&[Handle]>,
    remaining_device_path: *mut DevicePathProtocol,
    recursive: bool,
) -> Result<()> {
    let mut bound_any = false;
    for candidate in candidates(db, driver_image_handles) {
        let supported = unsafe { (*candidate.binding).supported };
        let status = supported(candidate.binding, controller_handle, remaining_device_path);
        if !status.is_success() {
            continue;
        }
        let start = unsafe { (*candidate.binding).start };
        let status = start(candidate.binding, controller_handle, remaining_device_path);
        if !status.is_success() {
            continue;
        }
        db.open_protocol(controller_handle, binding_guid(), candidate.driver_handle, controller_handle, OPEN_PROTOCOL_BY_DRIVER, |_| Ok(()))
            .ok();
        debug!("ConnectController: {controller_handle:?} bound by {:?}", candidate.driver_handle);
        bound_any = true;
    }
    if !bound_any {
        return Err(CoreError::Status(Status::NOT_FOUND));
    }
    if recursive {
        for child in db.child_controllers(controller_handle) {
            let _ = connect_controller(db, child, None, core::ptr::null_mut(), true);
        }
    }
    Ok(())
}

/// `DisconnectController`. Stops every matching driver binding on
/// `controller_handle`, or only `driver_image_handle` if given, passing
/// each driver's own `by_child_controller` children through as the
/// enumerated child-handle buffer (spec 4.4 "call that driver's `Stop`
/// with the enumerated child handles, which must internally close
/// `by_child_controller` references") -- `child_handle`, when given,
/// narrows that buffer to the single child being torn down.
pub fn disconnect_controller(
    db: &mut ProtocolDatabase,
    controller_handle: Handle,
    driver_image_handle: Option<Handle>,
    child_handle: Option<Handle>,
) -> Result<()> {
    let opens = db.driver_opens_on(controller_handle, driver_image_handle);
    if opens.is_empty() {
        return Err(CoreError::Protocol(ProtocolError::NotFound));
    }
    for (_, agent) in opens {
        let binding = db.handle_protocol(agent, binding_guid())? as *mut DriverBindingProtocol;
        let mut children = db.child_controllers_for_agent(controller_handle, agent);
        if let Some(h) = child_handle {
            children.retain(|c| *c == h);
        }
        let buf = if children.is_empty() { core::ptr::null_mut() } else { children.as_mut_ptr() };
        let stop = unsafe { (*binding).stop };
        let status = stop(binding, controller_handle, children.len(), buf);
        if !status.is_success() {
            return Err(CoreError::Status(status));
        }
        db.close_protocol(controller_handle, binding_guid(), agent, controller_handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTimerCore;
    use crate::tpl::TplScheduler;

    static mut SUPPORTED_CALLS: u32 = 0;
    static mut START_CALLS: u32 = 0;
    static mut STOP_CALLS: u32 = 0;

    extern "efiapi" fn supported_ok(_this: *mut DriverBindingProtocol, _c: Handle, _p: *mut DevicePathProtocol) -> Status {
        unsafe { SUPPORTED_CALLS += 1 };
        Status::SUCCESS
    }
    extern "efiapi" fn start_ok(_this: *mut DriverBindingProtocol, _c: Handle, _p: *mut DevicePathProtocol) -> Status {
        unsafe { START_CALLS += 1 };
        Status::SUCCESS
    }
    extern "efiapi" fn stop_ok(_this: *mut DriverBindingProtocol, _c: Handle, _n: usize, _b: *mut Handle) -> Status {
        unsafe { STOP_CALLS += 1 };
        Status::SUCCESS
    }
    extern "efiapi" fn supported_reject(_this: *mut DriverBindingProtocol, _c: Handle, _p: *mut DevicePathProtocol) -> Status {
        Status::UNSUPPORTED
    }

    fn install_binding(db: &mut ProtocolDatabase, version: u32, supported: extern "efiapi" fn(*mut DriverBindingProtocol, Handle, *mut DevicePathProtocol) -> Status) -> Handle {
        let mut ev = EventTimerCore::new();
        let mut tpl = TplScheduler::new();
        let binding = alloc::boxed::Box::leak(alloc::boxed::Box::new(DriverBindingProtocol {
            supported,
            start: start_ok,
            stop: stop_ok,
            version,
            image_handle: Handle::null(),
            driver_binding_handle: Handle::null(),
        }));
        db.install(None, binding_guid(), binding as *mut DriverBindingProtocol as *mut c_void, &mut ev, &mut tpl).unwrap()
    }

    #[test]
    fn connect_binds_first_supported_driver_and_opens_by_driver() {
        let mut db = ProtocolDatabase::new();
        let mut ev = EventTimerCore::new();
        let mut tpl = TplScheduler::new();
        let controller = db.install(None, Guid::new(9, 9, 9, [0; 8]), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        install_binding(&mut db, 1, supported_reject);
        let driver = install_binding(&mut db, 1, supported_ok);
        connect_controller(&mut db, controller, None, core::ptr::null_mut(), false).unwrap();
        assert!(db.driver_opens_on(controller, Some(driver)).iter().any(|(g, _)| *g == binding_guid()));
    }

    #[test]
    fn connect_fails_when_no_driver_supports_controller() {
        let mut db = ProtocolDatabase::new();
        let mut ev = EventTimerCore::new();
        let mut tpl = TplScheduler::new();
        let controller = db.install(None, Guid::new(9, 9, 9, [0; 8]), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        install_binding(&mut db, 1, supported_reject);
        assert!(connect_controller(&mut db, controller, None, core::ptr::null_mut(), false).is_err());
    }

    #[test]
    fn disconnect_stops_bound_driver_and_clears_open_ref() {
        let mut db = ProtocolDatabase::new();
        let mut ev = EventTimerCore::new();
        let mut tpl = TplScheduler::new();
        let controller = db.install(None, Guid::new(9, 9, 9, [0; 8]), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        let driver = install_binding(&mut db, 1, supported_ok);
        connect_controller(&mut db, controller, None, core::ptr::null_mut(), false).unwrap();
        disconnect_controller(&mut db, controller, Some(driver), None).unwrap();
        assert!(db.driver_opens_on(controller, Some(driver)).is_empty());
    }

    #[test]
    fn connect_binds_every_driver_whose_supported_succeeds_not_just_the_first() {
        let mut db = ProtocolDatabase::new();
        let mut ev = EventTimerCore::new();
        let mut tpl = TplScheduler::new();
        let controller = db.install(None, Guid::new(9, 9, 9, [0; 8]), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        let driver_a = install_binding(&mut db, 1, supported_ok);
        let driver_b = install_binding(&mut db, 2, supported_ok);
        connect_controller(&mut db, controller, None, core::ptr::null_mut(), false).unwrap();
        assert!(db.driver_opens_on(controller, Some(driver_a)).iter().any(|(g, _)| *g == binding_guid()));
        assert!(db.driver_opens_on(controller, Some(driver_b)).iter().any(|(g, _)| *g == binding_guid()));
    }

    #[test]
    fn disconnect_passes_only_the_stopped_driver_own_children_to_stop() {
        let mut db = ProtocolDatabase::new();
        let mut ev = EventTimerCore::new();
        let mut tpl = TplScheduler::new();
        let controller = db.install(None, Guid::new(9, 9, 9, [0; 8]), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        let driver_a = install_binding(&mut db, 1, supported_ok);
        let driver_b = install_binding(&mut db, 2, supported_ok);
        connect_controller(&mut db, controller, None, core::ptr::null_mut(), false).unwrap();

        let child_guid = Guid::new(7, 7, 7, [0; 8]);
        let child_a = db.install(None, child_guid, core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        let child_b = db.install(None, child_guid, core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
        db.open_protocol(child_a, child_guid, driver_a, controller, crate::uefi::table::boot::OPEN_PROTOCOL_BY_CHILD_CONTROLLER, |_| Ok(())).unwrap();
        db.open_protocol(child_b, child_guid, driver_b, controller, crate::uefi::table::boot::OPEN_PROTOCOL_BY_CHILD_CONTROLLER, |_| Ok(())).unwrap();

        assert_eq!(db.child_controllers_for_agent(controller, driver_a), alloc::vec![child_a]);
        disconnect_controller(&mut db, controller, Some(driver_a), None).unwrap();
        // driver_b's own child, opened under a different agent, is untouched.
        assert_eq!(db.child_controllers_for_agent(controller, driver_b), alloc::vec![child_b]);
    }
}
