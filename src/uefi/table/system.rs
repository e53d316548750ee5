//! EFI System Table.
//!
//! Reference: UEFI Spec 2.10, Section 4.3.

use super::{boot::BootServices, header::TableHeader, runtime::RuntimeServices};
use crate::uefi::base::*;

pub const SYSTEM_TABLE_SIGNATURE: u64 = 0x5453_5953_2049_4249; // "IBI SYST"
pub const SYSTEM_TABLE_REVISION_2_10: u32 = (2 << 16) | 100;

/// Spec: 12.3 - Simple Text Input Protocol. An external collaborator per
/// spec scope (concrete console rendering); the core only needs the layout
/// to place a valid pointer in `SystemTable::con_in`.
#[repr(C)]
pub struct SimpleTextInputProtocol {
    pub reset: extern "efiapi" fn(*mut Self, Boolean) -> Status,
    pub read_key_stroke: extern "efiapi" fn(*mut Self, *mut InputKey) -> Status,
    pub wait_for_key: Event,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: Char16,
}

/// Spec: 12.4 - Simple Text Output Protocol. Same external-collaborator
/// status as `SimpleTextInputProtocol` above.
#[repr(C)]
pub struct SimpleTextOutputProtocol {
    pub reset: extern "efiapi" fn(*mut Self, Boolean) -> Status,
    pub output_string: extern "efiapi" fn(*mut Self, *const Char16) -> Status,
    pub test_string: extern "efiapi" fn(*mut Self, *const Char16) -> Status,
    pub query_mode: extern "efiapi" fn(*mut Self, usize, *mut usize, *mut usize) -> Status,
    pub set_mode: extern "efiapi" fn(*mut Self, usize) -> Status,
    pub set_attribute: extern "efiapi" fn(*mut Self, usize) -> Status,
    pub clear_screen: extern "efiapi" fn(*mut Self) -> Status,
    pub set_cursor_position: extern "efiapi" fn(*mut Self, usize, usize) -> Status,
    pub enable_cursor: extern "efiapi" fn(*mut Self, Boolean) -> Status,
    pub mode: *mut SimpleTextOutputMode,
}

#[repr(C)]
pub struct SimpleTextOutputMode {
    pub max_mode: i32,
    pub mode: i32,
    pub attribute: i32,
    pub cursor_column: i32,
    pub cursor_row: i32,
    pub cursor_visible: Boolean,
}

/// Spec: 4.6 - EFI Configuration Table. `crate::config_table` (C6) owns the
/// backing array this type is an entry of.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct ConfigurationTable {
    pub vendor_guid: Guid,
    pub vendor_table: *mut core::ffi::c_void,
}

/// Spec: 4.3 - EFI System Table. Built once by
/// `crate::dispatcher::build_tables` during bring-up (spec 4.8 step 6) and
/// never reconstructed; `boot_services`/`runtime_services` are nulled only
/// by the terminal ExitBootServices handoff (spec 4.2).
#[repr(C)]
pub struct SystemTable {
    pub hdr: TableHeader,
    pub firmware_vendor: *const Char16,
    pub firmware_revision: u32,
    pub console_in_handle: Handle,
    pub con_in: *mut SimpleTextInputProtocol,
    pub console_out_handle: Handle,
    pub con_out: *mut SimpleTextOutputProtocol,
    pub standard_error_handle: Handle,
    pub std_err: *mut SimpleTextOutputProtocol,
    pub runtime_services: *mut RuntimeServices,
    pub boot_services: *mut BootServices,
    pub number_of_table_entries: usize,
    pub configuration_table: *mut ConfigurationTable,
}

impl SystemTable {
    /// Returns `None` once `boot_services` has been nulled by the terminal
    /// handoff, matching spec 4.2's "subsequent boot-service calls are
    /// undefined" rule at the one place callers can check for it safely.
    pub fn boot_services(&self) -> Option<&BootServices> {
        if self.boot_services.is_null() {
            None
        } else {
            Some(unsafe { &*self.boot_services })
        }
    }
}

// Well-known configuration-table vendor GUIDs (spec 4.6 / C6).
pub const ACPI_20_TABLE_GUID: Guid =
    Guid::new(0x8868e871, 0xe4f1, 0x11d3, [0xbc, 0x22, 0x00, 0x80, 0xc7, 0x3c, 0x88, 0x81]);
pub const ACPI_TABLE_GUID: Guid =
    Guid::new(0xeb9d2d30, 0x2d88, 0x11d3, [0x9a, 0x16, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d]);
pub const SMBIOS_TABLE_GUID: Guid =
    Guid::new(0xeb9d2d31, 0x2d88, 0x11d3, [0x9a, 0x16, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d]);
pub const SMBIOS3_TABLE_GUID: Guid =
    Guid::new(0xf2fd1544, 0x9794, 0x4a2c, [0x99, 0x2e, 0xe5, 0xbb, 0xcf, 0x20, 0xe3, 0x94]);
