//! Black-box coverage of `ProtocolDatabase` (spec 4.4, component C5).

use dxe_core::event::EventTimerCore;
use dxe_core::protocol::ProtocolDatabase;
use dxe_core::tpl::TplScheduler;
use dxe_core::uefi::base::{Guid, Handle};
use dxe_core::uefi::table::boot::{OPEN_PROTOCOL_BY_DRIVER, OPEN_PROTOCOL_GET_PROTOCOL};

fn guid(n: u32) -> Guid {
    Guid::new(n, 0, 0, [0; 8])
}

#[test]
fn install_same_guid_twice_on_one_handle_is_rejected() {
    let mut db = ProtocolDatabase::new();
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let h = db.install(None, guid(1), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    assert!(db.install(Some(h), guid(1), core::ptr::null_mut(), &mut ev, &mut tpl).is_err());
}

#[test]
fn uninstall_blocked_while_by_driver_open_ref_exists() {
    let mut db = ProtocolDatabase::new();
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let h = db.install(None, guid(1), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    let agent = db.install(None, guid(2), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    db.open_protocol(h, guid(1), agent, h, OPEN_PROTOCOL_BY_DRIVER, |_| Ok(())).unwrap();
    assert!(db.uninstall(h, guid(1)).is_err());
    db.close_protocol(h, guid(1), agent, h).unwrap();
    assert!(db.uninstall(h, guid(1)).is_ok());
}

#[test]
fn get_protocol_open_does_not_block_uninstall() {
    let mut db = ProtocolDatabase::new();
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let h = db.install(None, guid(1), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    let agent = db.install(None, guid(2), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    db.open_protocol(h, guid(1), agent, Handle::null(), OPEN_PROTOCOL_GET_PROTOCOL, |_| Ok(())).unwrap();
    assert!(db.uninstall(h, guid(1)).is_ok());
}

#[test]
fn locate_handles_filters_by_guid() {
    let mut db = ProtocolDatabase::new();
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let a = db.install(None, guid(1), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    let _b = db.install(None, guid(2), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    let handles = db.locate_handles(Some(guid(1)));
    assert_eq!(handles, vec![a]);
}

#[test]
fn register_protocol_notify_fires_on_later_install() {
    let mut db = ProtocolDatabase::new();
    let mut ev = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let event = ev.create(dxe_core::event::EventType::NOTIFY_SIGNAL, dxe_core::config::tpl::CALLBACK, Some(noop_notify), core::ptr::null_mut(), None).unwrap();
    db.register_protocol_notify(guid(1), event);
    assert!(db.next_notified_handle(event).is_none());
    let h = db.install(None, guid(1), core::ptr::null_mut(), &mut ev, &mut tpl).unwrap();
    assert_eq!(db.next_notified_handle(event), Some(h));
    assert_eq!(db.next_notified_handle(event), None);
}

extern "efiapi" fn noop_notify(_event: dxe_core::uefi::base::Event, _ctx: *mut core::ffi::c_void) {}
