//! End-to-end exercise of the protocol-database and driver-binding boot
//! services through the real `BootServices` table: install, locate,
//! register-for-notify, and `ConnectController` driving a driver-binding
//! protocol's `Supported`/`Start` callbacks.

use core::ffi::c_void;

use dxe_core::dispatcher;
use dxe_core::platform::mock::MockPlatformHooks;
use dxe_core::uefi::base::{Event, Guid, Handle, Status};
use dxe_core::uefi::proto::driver_binding::{DevicePathProtocol, DriverBindingProtocol, DRIVER_BINDING_PROTOCOL_GUID};
use dxe_core::uefi::table::boot::{InterfaceType, LocateSearchType, MemoryDescriptor, MemoryType};

fn initial_map() -> Vec<MemoryDescriptor> {
    vec![MemoryDescriptor { ty: MemoryType::ConventionalMemory as u32, pad: 0, physical_start: 0x10_0000, virtual_start: 0, number_of_pages: 256, attribute: 0 }]
}

const SOME_PROTOCOL_GUID: Guid = Guid::new(0x1234_5678, 0x9abc, 0xdef0, [0, 1, 2, 3, 4, 5, 6, 7]);

static mut START_CALLS: u32 = 0;
static mut NOTIFY_CALLS: u32 = 0;

extern "efiapi" fn supported_ok(_this: *mut DriverBindingProtocol, _controller: Handle, _path: *mut DevicePathProtocol) -> Status {
    Status::SUCCESS
}
extern "efiapi" fn start_ok(_this: *mut DriverBindingProtocol, _controller: Handle, _path: *mut DevicePathProtocol) -> Status {
    unsafe { START_CALLS += 1 };
    Status::SUCCESS
}
extern "efiapi" fn stop_ok(_this: *mut DriverBindingProtocol, _controller: Handle, _count: usize, _buf: *mut Handle) -> Status {
    Status::SUCCESS
}
extern "efiapi" fn on_notify(_event: Event, _ctx: *mut c_void) {
    unsafe { NOTIFY_CALLS += 1 };
}

#[test]
fn install_locate_notify_and_connect_controller_round_trip() {
    dispatcher::teardown_for_test();
    let hooks: &'static MockPlatformHooks = Box::leak(Box::new(MockPlatformHooks::new(1_000_000, 32)));
    let system_table = dispatcher::bring_up(hooks, initial_map());
    let bs = unsafe { &*(*system_table).boot_services };

    // Register for notify before the protocol exists, then install it and
    // confirm the notify callback actually ran.
    let mut notify_event = Event::null();
    let status = (bs.create_event)(dxe_core::event::EventType::NOTIFY_SIGNAL.bits(), dxe_core::config::tpl::CALLBACK, Some(on_notify), core::ptr::null_mut(), &mut notify_event);
    assert_eq!(status, Status::SUCCESS);

    let mut registration: *mut c_void = core::ptr::null_mut();
    let status = (bs.register_protocol_notify)(&SOME_PROTOCOL_GUID, notify_event, &mut registration);
    assert_eq!(status, Status::SUCCESS);

    let mut some_handle = Handle::null();
    let status = (bs.install_protocol_interface)(&mut some_handle, &SOME_PROTOCOL_GUID, InterfaceType::NativeInterface, core::ptr::null_mut());
    assert_eq!(status, Status::SUCCESS);
    assert!(!some_handle.is_null());

    // The callback is queued at CALLBACK TPL, not run inline; restoring
    // TPL down through it drains the queue (mirrors
    // `dispatcher::mod::timer_tick`'s own dispatch pattern).
    let old = (bs.raise_tpl)(dxe_core::config::tpl::APPLICATION);
    (bs.restore_tpl)(old);
    assert_eq!(unsafe { NOTIFY_CALLS }, 1);

    // `LocateHandle` by the registration token recovers the handle.
    let mut buffer_size = core::mem::size_of::<Handle>();
    let mut found = Handle::null();
    let status = (bs.locate_handle)(LocateSearchType::ByRegisterNotify, core::ptr::null(), registration, &mut buffer_size, &mut found);
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(found, some_handle);

    // Install a driver-binding protocol on a fresh handle and connect it
    // to a controller exposing `SOME_PROTOCOL_GUID`.
    let binding = Box::leak(Box::new(DriverBindingProtocol {
        supported: supported_ok,
        start: start_ok,
        stop: stop_ok,
        version: 10,
        image_handle: Handle::null(),
        driver_binding_handle: Handle::null(),
    }));
    let mut driver_handle = Handle::null();
    let status = (bs.install_protocol_interface)(&mut driver_handle, &DRIVER_BINDING_PROTOCOL_GUID, InterfaceType::NativeInterface, binding as *mut DriverBindingProtocol as *mut c_void);
    assert_eq!(status, Status::SUCCESS);

    let status = (bs.connect_controller)(some_handle, core::ptr::null_mut(), core::ptr::null_mut(), 0);
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(unsafe { START_CALLS }, 1);

    let status = (bs.disconnect_controller)(some_handle, driver_handle, Handle::null());
    assert_eq!(status, Status::SUCCESS);

    let status = (bs.close_event)(notify_event);
    assert_eq!(status, Status::SUCCESS);

    dispatcher::teardown_for_test();
}
