//! Driver Binding Protocol.
//!
//! Every driver capable of managing a controller installs one of these on
//! its own driver image handle. `ConnectController`/`DisconnectController`
//! (`crate::protocol::binding`) drive it.
//! Reference: UEFI Spec 2.10, Section 11.1.

use crate::uefi::base::*;

pub const DRIVER_BINDING_PROTOCOL_GUID: Guid = Guid::new(
    0x18a031ab,
    0xb443,
    0x4d1a,
    [0xa5, 0xc0, 0x0c, 0x09, 0x26, 0x1e, 0x9f, 0x71],
);

/// Opaque device-path pointer; the core does not interpret device-path
/// contents, only compares/copies them, per spec scope (concrete device
/// enumeration is an external collaborator).
pub type DevicePathProtocol = core::ffi::c_void;

#[repr(C)]
pub struct DriverBindingProtocol {
    pub supported: extern "efiapi" fn(
        this: *mut DriverBindingProtocol,
        controller_handle: Handle,
        remaining_device_path: *mut DevicePathProtocol,
    ) -> Status,
    pub start: extern "efiapi" fn(
        this: *mut DriverBindingProtocol,
        controller_handle: Handle,
        remaining_device_path: *mut DevicePathProtocol,
    ) -> Status,
    pub stop: extern "efiapi" fn(
        this: *mut DriverBindingProtocol,
        controller_handle: Handle,
        number_of_children: usize,
        child_handle_buffer: *mut Handle,
    ) -> Status,
    pub version: u32,
    pub image_handle: Handle,
    pub driver_binding_handle: Handle,
}
