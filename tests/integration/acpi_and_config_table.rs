//! End-to-end exercise of the configuration-table boot service and its
//! interaction with `bring_up`'s automatic RSDP installation, which is
//! what actually makes ACPI tables reachable from `SystemTable` (spec
//! 4.7's "tables become visible to the OS when the RSDP is installed as
//! a configuration table").

use dxe_core::dispatcher;
use dxe_core::platform::mock::MockPlatformHooks;
use dxe_core::uefi::base::{Guid, Status};
use dxe_core::uefi::table::boot::{MemoryDescriptor, MemoryType};
use dxe_core::uefi::table::system::ACPI_20_TABLE_GUID;

fn initial_map() -> Vec<MemoryDescriptor> {
    vec![MemoryDescriptor { ty: MemoryType::ConventionalMemory as u32, pad: 0, physical_start: 0x10_0000, virtual_start: 0, number_of_pages: 256, attribute: 0 }]
}

const OTHER_GUID: Guid = Guid::new(0xaaaa_bbbb, 0xcccc, 0xdddd, [0, 1, 2, 3, 4, 5, 6, 7]);

#[test]
fn rsdp_is_visible_and_install_configuration_table_round_trips() {
    dispatcher::teardown_for_test();
    let hooks: &'static MockPlatformHooks = Box::leak(Box::new(MockPlatformHooks::new(1_000_000, 32)));
    let system_table = dispatcher::bring_up(hooks, initial_map());

    // SAFETY: `system_table` is the table `bring_up` just built and leaked.
    let st = unsafe { &*system_table };
    assert_eq!(st.number_of_table_entries, 1);
    let entries = unsafe { core::slice::from_raw_parts(st.configuration_table, st.number_of_table_entries) };
    assert_eq!(entries[0].vendor_guid, ACPI_20_TABLE_GUID);
    assert!(!entries[0].vendor_table.is_null());

    let bs = unsafe { &*st.boot_services };

    // A second, unrelated table installs cleanly and grows the array.
    let mut payload: u32 = 0xDEAD_BEEF;
    let status = (bs.install_configuration_table)(&OTHER_GUID, &mut payload as *mut u32 as *mut core::ffi::c_void);
    assert_eq!(status, Status::SUCCESS);

    let st = unsafe { &*system_table };
    assert_eq!(st.number_of_table_entries, 2);

    // Reinstalling the same GUID without first removing it is rejected.
    let mut other_payload: u32 = 1;
    let status = (bs.install_configuration_table)(&OTHER_GUID, &mut other_payload as *mut u32 as *mut core::ffi::c_void);
    assert_eq!(status, Status::ALREADY_STARTED);

    // Removing it (null pointer) shrinks the array back down.
    let status = (bs.install_configuration_table)(&OTHER_GUID, core::ptr::null_mut());
    assert_eq!(status, Status::SUCCESS);
    let st = unsafe { &*system_table };
    assert_eq!(st.number_of_table_entries, 1);

    dispatcher::teardown_for_test();
}
