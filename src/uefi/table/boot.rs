//! Boot Services Table.
//!
//! This struct is the wire-format ABI boundary described in spec §6: every
//! field is a function pointer that `crate::dispatcher::build_tables` points
//! at a `pub extern "efiapi" fn` implemented by the component that owns the
//! behavior (`crate::tpl` for TPL, `crate::memory` for allocation,
//! `crate::event` for events/timers, `crate::protocol` for the handle
//! database, `crate::image` for the loader). This file only carries the
//! layout — no logic lives here, matching the ABI-table-as-pure-data
//! convention the rest of this crate's `table` module follows.

use core::ffi::c_void;

use crate::uefi::{
    base::{Boolean, Char16, Event, Guid, Handle, Status},
    table::header::TableHeader,
};

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryType {
    ReservedMemoryType = 0,
    LoaderCode = 1,
    LoaderData = 2,
    BootServicesCode = 3,
    BootServicesData = 4,
    RuntimeServicesCode = 5,
    RuntimeServicesData = 6,
    ConventionalMemory = 7,
    UnusableMemory = 8,
    ACPIReclaimMemory = 9,
    ACPIMemoryNVS = 10,
    MemoryMappedIO = 11,
    MemoryMappedIOPortSpace = 12,
    PalCode = 13,
    PersistentMemory = 14,
    UnacceptedMemoryType = 15,
    MaxMemoryType = 16,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocateType {
    AllocateAnyPages = 0,
    AllocateMaxAddress = 1,
    AllocateAddress = 2,
    MaxAllocateType = 3,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InterfaceType {
    NativeInterface = 0,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocateSearchType {
    AllHandles = 0,
    ByRegisterNotify = 1,
    ByProtocol = 2,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerDelay {
    TimerCancel = 0,
    TimerPeriodic = 1,
    TimerRelative = 2,
}

// OpenProtocol attribute bits. Spec §4.4 "OpenProtocol policy".
pub const OPEN_PROTOCOL_BY_HANDLE_PROTOCOL: u32 = 0x0000_0001;
pub const OPEN_PROTOCOL_GET_PROTOCOL: u32 = 0x0000_0002;
pub const OPEN_PROTOCOL_TEST_PROTOCOL: u32 = 0x0000_0004;
pub const OPEN_PROTOCOL_BY_CHILD_CONTROLLER: u32 = 0x0000_0008;
pub const OPEN_PROTOCOL_BY_DRIVER: u32 = 0x0000_0010;
pub const OPEN_PROTOCOL_EXCLUSIVE: u32 = 0x0000_0020;

/// Spec §6 persisted format: `{type(u32), pad(u32), physical_start(u64),
/// virtual_start(u64), page_count(u64), attribute(u64)}`. The `pad` field is
/// required for correct `u64` alignment and is part of the wire contract,
/// not implementation padding — callers must still stride `GetMemoryMap`
/// buffers by the returned `descriptor_size`, not `size_of::<Self>()`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryDescriptor {
    pub ty: u32,
    pub pad: u32,
    pub physical_start: u64,
    pub virtual_start: u64,
    pub number_of_pages: u64,
    pub attribute: u64,
}

pub type CreateEventFn =
    extern "efiapi" fn(u32, usize, Option<extern "efiapi" fn(Event, *mut c_void)>, *mut c_void, *mut Event) -> Status;
pub type CreateEventExFn = extern "efiapi" fn(
    u32,
    usize,
    Option<extern "efiapi" fn(Event, *mut c_void)>,
    *const c_void,
    *const Guid,
    *mut Event,
) -> Status;

#[repr(C)]
pub struct BootServices {
    pub hdr: TableHeader,

    // Task Priority Services.
    pub raise_tpl: extern "efiapi" fn(usize) -> usize,
    pub restore_tpl: extern "efiapi" fn(usize),

    // Memory Services.
    pub allocate_pages: extern "efiapi" fn(AllocateType, MemoryType, usize, *mut u64) -> Status,
    pub free_pages: extern "efiapi" fn(u64, usize) -> Status,
    pub get_memory_map: extern "efiapi" fn(
        *mut usize,
        *mut MemoryDescriptor,
        *mut usize,
        *mut usize,
        *mut u32,
    ) -> Status,
    pub allocate_pool: extern "efiapi" fn(MemoryType, usize, *mut *mut u8) -> Status,
    pub free_pool: extern "efiapi" fn(*mut u8) -> Status,

    // Event & Timer Services.
    pub create_event: CreateEventFn,
    pub set_timer: extern "efiapi" fn(Event, TimerDelay, u64) -> Status,
    pub wait_for_event: extern "efiapi" fn(usize, *mut Event, *mut usize) -> Status,
    pub signal_event: extern "efiapi" fn(Event) -> Status,
    pub close_event: extern "efiapi" fn(Event) -> Status,
    pub check_event: extern "efiapi" fn(Event) -> Status,

    // Protocol Handler Services.
    pub install_protocol_interface:
        extern "efiapi" fn(*mut Handle, *const Guid, InterfaceType, *mut c_void) -> Status,
    pub reinstall_protocol_interface:
        extern "efiapi" fn(Handle, *const Guid, *mut c_void, *mut c_void) -> Status,
    pub uninstall_protocol_interface:
        extern "efiapi" fn(Handle, *const Guid, *mut c_void) -> Status,
    pub handle_protocol: extern "efiapi" fn(Handle, *const Guid, *mut *mut c_void) -> Status,
    pub reserved: *mut c_void,
    pub register_protocol_notify:
        extern "efiapi" fn(*const Guid, Event, *mut *mut c_void) -> Status,
    pub locate_handle: extern "efiapi" fn(
        LocateSearchType,
        *const Guid,
        *mut c_void,
        *mut usize,
        *mut Handle,
    ) -> Status,
    pub locate_device_path: extern "efiapi" fn(*const Guid, *mut *mut c_void, *mut Handle) -> Status,
    pub install_configuration_table: extern "efiapi" fn(*const Guid, *mut c_void) -> Status,

    // Image Services.
    pub load_image:
        extern "efiapi" fn(Boolean, Handle, *mut c_void, *mut c_void, usize, *mut Handle) -> Status,
    pub start_image: extern "efiapi" fn(Handle, *mut usize, *mut *mut Char16) -> Status,
    pub exit: extern "efiapi" fn(Handle, Status, usize, *mut Char16) -> Status,
    pub unload_image: extern "efiapi" fn(Handle) -> Status,
    pub exit_boot_services: extern "efiapi" fn(Handle, usize) -> Status,

    // Miscellaneous Services.
    pub get_next_monotonic_count: extern "efiapi" fn(*mut u64) -> Status,
    pub stall: extern "efiapi" fn(usize) -> Status,
    pub set_watchdog_timer: extern "efiapi" fn(usize, u64, usize, *const Char16) -> Status,

    // Driver Support Services.
    pub connect_controller: extern "efiapi" fn(Handle, *mut Handle, *mut c_void, Boolean) -> Status,
    pub disconnect_controller: extern "efiapi" fn(Handle, Handle, Handle) -> Status,

    // Open and Close Protocol Services.
    pub open_protocol:
        extern "efiapi" fn(Handle, *const Guid, *mut *mut c_void, Handle, Handle, u32) -> Status,
    pub close_protocol: extern "efiapi" fn(Handle, *const Guid, Handle, Handle) -> Status,
    pub open_protocol_information: extern "efiapi" fn(
        Handle,
        *const Guid,
        *mut *mut OpenProtocolInformationEntry,
        *mut usize,
    ) -> Status,

    // Library Services.
    pub protocols_per_handle:
        extern "efiapi" fn(Handle, *mut *mut *const Guid, *mut usize) -> Status,
    pub locate_handle_buffer: extern "efiapi" fn(
        LocateSearchType,
        *const Guid,
        *mut c_void,
        *mut usize,
        *mut *mut Handle,
    ) -> Status,
    pub locate_protocol: extern "efiapi" fn(*const Guid, *mut c_void, *mut *mut c_void) -> Status,
    // These are variadic (GUID, interface)* pairs in the real UEFI spec;
    // `extern "efiapi"` cannot express C variadics in Rust, so the ABI
    // surface is the first pair only and `crate::protocol::database`
    // exposes the real multi-pair operation as a safe Rust slice API for
    // in-crate callers (the dispatcher, driver bring-up) to use directly.
    pub install_multiple_protocol_interfaces:
        extern "efiapi" fn(*mut Handle, *const Guid, *mut c_void) -> Status,
    pub uninstall_multiple_protocol_interfaces:
        extern "efiapi" fn(Handle, *const Guid, *mut c_void) -> Status,

    // 32-bit CRC Services.
    pub calculate_crc32: extern "efiapi" fn(*const c_void, usize, *mut u32) -> Status,

    // Miscellaneous Services.
    pub copy_mem: extern "efiapi" fn(*mut c_void, *const c_void, usize),
    pub set_mem: extern "efiapi" fn(*mut c_void, usize, u8),
    pub create_event_ex: CreateEventExFn,
}

/// Spec §4.4 `OpenProtocolInformation` return element.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct OpenProtocolInformationEntry {
    pub agent_handle: Handle,
    pub controller_handle: Handle,
    pub attributes: u32,
    pub open_count: u32,
}
