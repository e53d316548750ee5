//! Black-box coverage of `ConfigTableRegistry` (spec 4.6, component C6),
//! distinct from the module's own inline unit tests.

use dxe_core::config_table::ConfigTableRegistry;
use dxe_core::uefi::base::Guid;

fn guid(n: u32) -> Guid {
    Guid::new(n, 0, 0, [0; 8])
}

#[test]
fn multiple_distinct_guids_coexist() {
    let mut reg = ConfigTableRegistry::new();
    reg.install(guid(1), 0x1000usize as *mut core::ffi::c_void).unwrap();
    reg.install(guid(2), 0x2000usize as *mut core::ffi::c_void).unwrap();
    assert_eq!(reg.entries().len(), 2);
    assert_eq!(reg.find(guid(1)), Some(0x1000usize as *mut core::ffi::c_void));
    assert_eq!(reg.find(guid(2)), Some(0x2000usize as *mut core::ffi::c_void));
}

#[test]
fn guid_can_be_reinstalled_after_removal() {
    let mut reg = ConfigTableRegistry::new();
    reg.install(guid(1), 0x1000usize as *mut core::ffi::c_void).unwrap();
    reg.install(guid(1), core::ptr::null_mut()).unwrap();
    reg.install(guid(1), 0x3000usize as *mut core::ffi::c_void).unwrap();
    assert_eq!(reg.find(guid(1)), Some(0x3000usize as *mut core::ffi::c_void));
}

#[test]
fn find_missing_guid_returns_none() {
    let reg = ConfigTableRegistry::new();
    assert!(reg.find(guid(7)).is_none());
}
