//! Black-box coverage of `crate::image::loader` (spec 4.5, component C4)
//! below the ABI layer -- see `tests/integration/image_lifecycle_tests.rs`
//! for the full `BootServices` round trip.

use dxe_core::event::EventTimerCore;
use dxe_core::image::{load_image, unload_image};
use dxe_core::memory::MemoryManager;
use dxe_core::protocol::ProtocolDatabase;
use dxe_core::tpl::TplScheduler;
use dxe_core::uefi::base::Handle;
use dxe_core::uefi::proto::loaded_image::LOADED_IMAGE_PROTOCOL_GUID;
use dxe_core::uefi::table::boot::MemoryDescriptor;
use dxe_core::uefi::table::boot::MemoryType;

fn build_pe() -> Vec<u8> {
    let mut b = vec![0u8; 0x400];
    b[0..2].copy_from_slice(b"MZ");
    b[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    b[0x80..0x84].copy_from_slice(b"PE\0\0");
    let coff = 0x84;
    b[coff..coff + 2].copy_from_slice(&0x8664u16.to_le_bytes());
    b[coff + 2..coff + 4].copy_from_slice(&0u16.to_le_bytes());
    b[coff + 16..coff + 18].copy_from_slice(&224u16.to_le_bytes());
    b[coff + 18..coff + 20].copy_from_slice(&1u16.to_le_bytes());
    let opt = coff + 20;
    b[opt..opt + 2].copy_from_slice(&0x10bu16.to_le_bytes());
    b[opt + 16..opt + 20].copy_from_slice(&0u32.to_le_bytes());
    b[opt + 28..opt + 32].copy_from_slice(&0x400000u32.to_le_bytes());
    b[opt + 56..opt + 60].copy_from_slice(&0x400u32.to_le_bytes());
    b[opt + 60..opt + 64].copy_from_slice(&0x100u32.to_le_bytes());
    b[opt + 92..opt + 96].copy_from_slice(&0u32.to_le_bytes());
    b
}

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
fn load_image_rejects_non_pe_non_te_bytes() {
    let mut mm = manager();
    let mut protocols = ProtocolDatabase::new();
    let mut events = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let bytes = vec![0u8; 64];
    let result = load_image(&bytes, Handle::null(), Handle::null(), core::ptr::null_mut(), core::ptr::null_mut(), false, &mut mm, &mut protocols, &mut events, &mut tpl);
    assert!(result.is_err());
}

#[test]
fn load_image_installs_loaded_image_protocol_and_unload_releases_it() {
    let mut mm = manager();
    let mut protocols = ProtocolDatabase::new();
    let mut events = EventTimerCore::new();
    let mut tpl = TplScheduler::new();
    let bytes = build_pe();
    let loaded = load_image(&bytes, Handle::null(), Handle::null(), core::ptr::null_mut(), core::ptr::null_mut(), false, &mut mm, &mut protocols, &mut events, &mut tpl).unwrap();
    let handle = loaded.handle;

    assert!(protocols.handle_protocol(handle, LOADED_IMAGE_PROTOCOL_GUID).is_ok());

    let before: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
    unload_image(loaded, &mut protocols, &mut mm).unwrap();
    let after: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();

    assert_eq!(before, after, "unload must release the image's page range");
    assert!(protocols.handle_protocol(handle, LOADED_IMAGE_PROTOCOL_GUID).is_err());
}
