//! Black-box coverage of `MemoryManager` (spec 4.2, component C1) through
//! its public API, distinct from the module's own inline unit tests.

use dxe_core::memory::MemoryManager;
use dxe_core::uefi::table::boot::{AllocateType, MemoryDescriptor, MemoryType};

fn manager() -> MemoryManager {
    MemoryManager::new(vec![MemoryDescriptor {
        ty: MemoryType::ConventionalMemory as u32,
        pad: 0,
        physical_start: 0x10_0000,
        virtual_start: 0,
        number_of_pages: 256,
        attribute: 0,
    }])
}

#[test]
fn allocate_address_is_honored_when_free() {
    let mut mm = manager();
    let addr = mm.allocate_pages(AllocateType::AllocateAddress, MemoryType::LoaderData, 2, Some(0x10_0000)).unwrap();
    assert_eq!(addr, 0x10_0000);
}

#[test]
fn allocate_address_rejected_when_out_of_range() {
    let mut mm = manager();
    assert!(mm.allocate_pages(AllocateType::AllocateAddress, MemoryType::LoaderData, 2, Some(0xffff_ffff)).is_err());
}

#[test]
fn free_pages_is_rejected_for_unmatched_address() {
    let mut mm = manager();
    assert!(mm.free_pages(0x20_0000, 1).is_err());
}

#[test]
fn image_buffer_round_trips_through_free() {
    let mut mm = manager();
    let before: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
    let (start, buf) = mm.allocate_image_buffer(MemoryType::LoaderCode, 5000).unwrap();
    assert_eq!(buf.len(), 2 * 4096, "backing buffer is page-rounded");
    mm.free_image_buffer(start, 5000).unwrap();
    let after: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
    assert_eq!(before, after);
}

#[test]
fn pool_allocations_smaller_than_largest_size_class_do_not_grow_page_count() {
    let mut mm = manager();
    let before: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
    let ptr = mm.allocate_pool(MemoryType::BootServicesData, 64).unwrap();
    let after: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
    assert_eq!(before, after, "classed pool allocations are carved from pre-reserved pool pages");
    mm.free_pool(ptr).unwrap();
}
