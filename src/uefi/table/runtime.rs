//! EFI Runtime Services Table.
//!
//! Reference: UEFI Spec 2.10, Section 8 and 4.5.
//!
//! Variable storage, time services, and capsule update are external
//! collaborators per spec scope (persistent-storage semantics for variables
//! is an explicit Non-goal); their slots are kept as raw function-pointer
//! placeholders so the table layout matches the real ABI, but this crate
//! never calls through them. `set_virtual_address_map` is implemented
//! (`crate::image::runtime::set_virtual_address_map`) because it is the one
//! runtime service the image loader's relocation log exists to serve.

use super::header::TableHeader;
use crate::uefi::{base::*, table::boot::MemoryDescriptor};

pub type GetTimeFn = usize;
pub type SetTimeFn = usize;
pub type GetWakeupTimeFn = usize;
pub type SetWakeupTimeFn = usize;
pub type ConvertPointerFn = extern "efiapi" fn(usize, *mut *mut core::ffi::c_void) -> Status;
pub type GetVariableFn = usize;
pub type GetNextVariableNameFn = usize;
pub type SetVariableFn = usize;
pub type GetNextHighMonotonicCountFn = extern "efiapi" fn(*mut u32) -> Status;
pub type ResetSystemFn = extern "efiapi" fn(ResetType, Status, usize, *const core::ffi::c_void) -> !;
pub type UpdateCapsuleFn = usize;
pub type QueryCapsuleCapabilitiesFn = usize;
pub type QueryVariableInfoFn = usize;

pub type SetVirtualAddressMapFn =
    extern "efiapi" fn(usize, usize, u32, *mut MemoryDescriptor) -> Status;

#[repr(C)]
pub struct RuntimeServices {
    pub hdr: TableHeader,

    pub get_time: GetTimeFn,
    pub set_time: SetTimeFn,
    pub get_wakeup_time: GetWakeupTimeFn,
    pub set_wakeup_time: SetWakeupTimeFn,

    pub set_virtual_address_map: SetVirtualAddressMapFn,
    pub convert_pointer: ConvertPointerFn,

    pub get_variable: GetVariableFn,
    pub get_next_variable_name: GetNextVariableNameFn,
    pub set_variable: SetVariableFn,

    pub get_next_high_monotonic_count: GetNextHighMonotonicCountFn,
    pub reset_system: ResetSystemFn,

    pub update_capsule: UpdateCapsuleFn,
    pub query_capsule_capabilities: QueryCapsuleCapabilitiesFn,

    pub query_variable_info: QueryVariableInfoFn,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResetType {
    ResetCold = 0,
    ResetWarm = 1,
    ResetShutdown = 2,
    ResetPlatformSpecific = 3,
}
