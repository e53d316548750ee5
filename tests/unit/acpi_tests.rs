//! Black-box coverage of `AcpiManager` (spec 4.7, component C9), distinct
//! from the module's own inline unit tests.

use dxe_core::acpi::AcpiManager;
use dxe_core::memory::MemoryManager;
use dxe_core::uefi::table::boot::{MemoryDescriptor, MemoryType};

fn manager() -> (MemoryManager, AcpiManager) {
    let mut mm = MemoryManager::new(vec![MemoryDescriptor {
        ty: MemoryType::ConventionalMemory as u32,
        pad: 0,
        virtual_start: 0,
        physical_start: 0,
        number_of_pages: 4096,
        attribute: 0,
    }]);
    let acpi = AcpiManager::new(&mut mm).unwrap();
    (mm, acpi)
}

fn rsdp_checksums_are_valid(rsdp: &[u8]) -> bool {
    let sum1: u8 = rsdp[0..20].iter().fold(0u8, |a, &b| a.wrapping_add(b));
    let sum2: u8 = rsdp.iter().fold(0u8, |a, &b| a.wrapping_add(b));
    sum1 == 0 && sum2 == 0
}

#[test]
fn rsdp_checksums_are_valid_on_construction() {
    let (_mm, acpi) = manager();
    assert!(rsdp_checksums_are_valid(acpi.rsdp()));
}

#[test]
fn install_dsdt_links_from_fadt() {
    let (mut mm, mut acpi) = manager();
    acpi.install_fadt(&mut mm, b"RUSTOS", b"FADTTBL0", 1).unwrap();
    let dsdt_id = acpi.install_dsdt(&mut mm, &[0u8; 16]).unwrap();
    assert!(dsdt_id > 0);
    assert!(acpi.fadt_checksum_is_zero());
}

#[test]
fn uninstall_with_unknown_id_is_rejected() {
    let (mut mm, mut acpi) = manager();
    assert!(acpi.uninstall(&mut mm, 0xdead_beef).is_err());
}

#[test]
fn generic_table_install_is_reachable_through_rsdt_and_xsdt_growth() {
    let (mut mm, mut acpi) = manager();
    let a = acpi.install_table(&mut mm, b"SSDT", &[9u8; 4]).unwrap();
    let b = acpi.install_table(&mut mm, b"SSDT", &[9u8; 4]).unwrap();
    assert_ne!(a, b);
    assert!(acpi.rsdt_checksum_is_zero());
    assert!(acpi.xsdt_checksum_is_zero());
}
