//! Table construction (spec 4.8 step 6): builds the real
//! `BootServices`/`RuntimeServices`/`SystemTable` and wires every
//! function-pointer field to this crate's `abi` entry points. No logic
//! lives here beyond that wiring and CRC maintenance, matching the
//! ABI-table-as-pure-data split `uefi::table` itself follows.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::uefi::table::boot::BootServices;
use crate::uefi::table::header::{TableHeader, CRC32_OFFSET};
use crate::uefi::table::runtime::RuntimeServices;
use crate::uefi::table::system::{ConfigurationTable, SystemTable, SYSTEM_TABLE_REVISION_2_10, SYSTEM_TABLE_SIGNATURE};

use super::{abi, CoreState};

const BOOT_SERVICES_SIGNATURE: u64 = 0x5652_4553_544F_4F42; // "BOOTSERV"
const RUNTIME_SERVICES_SIGNATURE: u64 = 0x5652_4553_544E_5552; // "RUNTSERV"
const BOOT_SERVICES_REVISION: u32 = SYSTEM_TABLE_REVISION_2_10;
const RUNTIME_SERVICES_REVISION: u32 = SYSTEM_TABLE_REVISION_2_10;

// "dxe-core\0" as a wide string literal, since `firmware_vendor` is a
// `*const Char16`.
static FIRMWARE_VENDOR: [u16; 9] =
    [b'd' as u16, b'x' as u16, b'e' as u16, b'-' as u16, b'c' as u16, b'o' as u16, b'r' as u16, b'e' as u16, 0];

fn header(signature: u64, revision: u32, header_size: u32) -> TableHeader {
    TableHeader { signature, revision, header_size, crc32: 0, reserved: 0 }
}

/// Zeroes `ptr`'s `hdr.crc32` field, CRCs the whole `size_of::<T>()` byte
/// range, and writes the result back. Every table in this crate starts
/// with a `TableHeader`, so the offset is always [`CRC32_OFFSET`].
///
/// # Safety
/// `ptr` must point to a valid, fully-initialized `T` with a `TableHeader`
/// as its first field.
unsafe fn recompute_crc<T>(ptr: *mut T) {
    let bytes = core::slice::from_raw_parts_mut(ptr as *mut u8, core::mem::size_of::<T>());
    crate::crc32::fix_table_crc32(bytes, CRC32_OFFSET);
}

pub(crate) fn recompute_system_table_crc(ptr: *mut SystemTable) {
    // SAFETY: `ptr` is the live `SystemTable` this dispatcher built in
    // `build_tables` and never frees.
    unsafe { recompute_crc(ptr) };
}

/// Builds `BootServices`, `RuntimeServices`, and `SystemTable`, leaking
/// all three (spec 4.8: these live for the lifetime of the firmware
/// image, never freed through the normal allocator). Called exactly once,
/// from [`super::bring_up`].
pub(crate) fn build_tables(state: &mut CoreState) -> *mut SystemTable {
    let boot_services = Box::leak(Box::new(BootServices {
        hdr: header(BOOT_SERVICES_SIGNATURE, BOOT_SERVICES_REVISION, core::mem::size_of::<BootServices>() as u32),

        raise_tpl: abi::raise_tpl,
        restore_tpl: abi::restore_tpl,

        allocate_pages: abi::allocate_pages,
        free_pages: abi::free_pages,
        get_memory_map: abi::get_memory_map,
        allocate_pool: abi::allocate_pool,
        free_pool: abi::free_pool,

        create_event: abi::create_event,
        set_timer: abi::set_timer,
        wait_for_event: abi::wait_for_event,
        signal_event: abi::signal_event,
        close_event: abi::close_event,
        check_event: abi::check_event,

        install_protocol_interface: abi::install_protocol_interface,
        reinstall_protocol_interface: abi::reinstall_protocol_interface,
        uninstall_protocol_interface: abi::uninstall_protocol_interface,
        handle_protocol: abi::handle_protocol,
        reserved: core::ptr::null_mut(),
        register_protocol_notify: abi::register_protocol_notify,
        locate_handle: abi::locate_handle,
        locate_device_path: abi::locate_device_path,
        install_configuration_table: abi::install_configuration_table,

        load_image: abi::load_image,
        start_image: abi::start_image,
        exit: abi::exit,
        unload_image: abi::unload_image,
        exit_boot_services: abi::exit_boot_services,

        get_next_monotonic_count: abi::get_next_monotonic_count,
        stall: abi::stall,
        set_watchdog_timer: abi::set_watchdog_timer,

        connect_controller: abi::connect_controller,
        disconnect_controller: abi::disconnect_controller,

        open_protocol: abi::open_protocol,
        close_protocol: abi::close_protocol,
        open_protocol_information: abi::open_protocol_information,

        protocols_per_handle: abi::protocols_per_handle,
        locate_handle_buffer: abi::locate_handle_buffer,
        locate_protocol: abi::locate_protocol,
        install_multiple_protocol_interfaces: abi::install_multiple_protocol_interfaces,
        uninstall_multiple_protocol_interfaces: abi::uninstall_multiple_protocol_interfaces,

        calculate_crc32: abi::calculate_crc32,

        copy_mem: abi::copy_mem,
        set_mem: abi::set_mem,
        create_event_ex: abi::create_event_ex,
    }));
    unsafe { recompute_crc(boot_services as *mut BootServices) };

    let runtime_services = Box::leak(Box::new(RuntimeServices {
        hdr: header(RUNTIME_SERVICES_SIGNATURE, RUNTIME_SERVICES_REVISION, core::mem::size_of::<RuntimeServices>() as u32),

        get_time: 0,
        set_time: 0,
        get_wakeup_time: 0,
        set_wakeup_time: 0,

        set_virtual_address_map: abi::set_virtual_address_map,
        convert_pointer: abi::convert_pointer,

        get_variable: 0,
        get_next_variable_name: 0,
        set_variable: 0,

        get_next_high_monotonic_count: abi::get_next_high_monotonic_count,
        reset_system: abi::reset_system,

        update_capsule: 0,
        query_capsule_capabilities: 0,

        query_variable_info: 0,
    }));
    unsafe { recompute_crc(runtime_services as *mut RuntimeServices) };

    let system_table = Box::leak(Box::new(SystemTable {
        hdr: header(SYSTEM_TABLE_SIGNATURE, SYSTEM_TABLE_REVISION_2_10, core::mem::size_of::<SystemTable>() as u32),
        firmware_vendor: FIRMWARE_VENDOR.as_ptr(),
        firmware_revision: 1,
        console_in_handle: crate::uefi::base::Handle::null(),
        con_in: core::ptr::null_mut(),
        console_out_handle: crate::uefi::base::Handle::null(),
        con_out: core::ptr::null_mut(),
        standard_error_handle: crate::uefi::base::Handle::null(),
        std_err: core::ptr::null_mut(),
        runtime_services,
        boot_services,
        number_of_table_entries: 0,
        configuration_table: core::ptr::null_mut(),
    }));
    unsafe { recompute_crc(system_table as *mut SystemTable) };

    state.system_table = system_table;
    system_table
}

/// Rebuilds the leaked `configuration_table` array from
/// `state.config_table`'s current entries and repoints
/// `SystemTable::configuration_table`/`number_of_table_entries` at it
/// (spec 4.6 `InstallConfigurationTable`). The previous array is leaked
/// rather than freed: this crate has no page-table-backed arena for it,
/// and reclaiming small host-allocator blocks on every
/// `InstallConfigurationTable` call is not worth the bookkeeping for a
/// table array that only grows a handful of times during bring-up.
pub(crate) fn sync_configuration_table(state: &mut CoreState) {
    let entries: Vec<ConfigurationTable> = state.config_table.entries().to_vec();
    let count = entries.len();
    let leaked: &'static mut [ConfigurationTable] = Box::leak(entries.into_boxed_slice());
    // SAFETY: `state.system_table` is the table `build_tables` leaked and
    // never frees.
    unsafe {
        (*state.system_table).configuration_table = if count == 0 { core::ptr::null_mut() } else { leaked.as_mut_ptr() };
        (*state.system_table).number_of_table_entries = count;
    }
    recompute_system_table_crc(state.system_table);
}
