//! End-to-end exercise of `LoadImage`/`StartImage`/`Exit` through the real
//! `BootServices` table (spec 4.5), covering the full lifecycle a driver or
//! application actually goes through rather than the loader's own
//! `#[cfg(test)]` unit tests, which call `image::loader` functions
//! directly with a hand-built `LoadedImage`.

use core::ffi::c_void;

use dxe_core::dispatcher;
use dxe_core::platform::mock::MockPlatformHooks;
use dxe_core::uefi::base::{Handle, Status};
use dxe_core::uefi::table::boot::{MemoryDescriptor, MemoryType};
use dxe_core::uefi::proto::loaded_image::LOADED_IMAGE_PROTOCOL_GUID;

fn initial_map() -> Vec<MemoryDescriptor> {
    vec![MemoryDescriptor { ty: MemoryType::ConventionalMemory as u32, pad: 0, physical_start: 0x10_0000, virtual_start: 0, number_of_pages: 256, attribute: 0 }]
}

/// A minimal relocations-stripped PE32 with an entry RVA of zero -- the
/// loader computes a host-process pointer from the copied section data at
/// load time, so the RVA's bytes themselves are irrelevant to the tests
/// here; every test overrides `entry_point` through
/// `dispatcher::with_core` once the image is loaded.
fn build_pe() -> Vec<u8> {
    let mut b = vec![0u8; 0x400];
    b[0..2].copy_from_slice(b"MZ");
    b[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    b[0x80..0x84].copy_from_slice(b"PE\0\0");
    let coff = 0x84;
    b[coff..coff + 2].copy_from_slice(&0x8664u16.to_le_bytes());
    b[coff + 2..coff + 4].copy_from_slice(&0u16.to_le_bytes());
    b[coff + 16..coff + 18].copy_from_slice(&224u16.to_le_bytes());
    b[coff + 18..coff + 20].copy_from_slice(&1u16.to_le_bytes()); // relocations stripped
    let opt = coff + 20;
    b[opt..opt + 2].copy_from_slice(&0x10bu16.to_le_bytes()); // PE32 magic
    b[opt + 16..opt + 20].copy_from_slice(&0u32.to_le_bytes()); // entry RVA
    b[opt + 28..opt + 32].copy_from_slice(&0x400000u32.to_le_bytes()); // image base
    b[opt + 56..opt + 60].copy_from_slice(&0x400u32.to_le_bytes()); // size of image
    b[opt + 60..opt + 64].copy_from_slice(&0x100u32.to_le_bytes()); // size of headers
    b[opt + 92..opt + 96].copy_from_slice(&0u32.to_le_bytes()); // number of data directories
    b
}

extern "efiapi" fn entry_returns_success(_h: Handle, _st: *mut dxe_core::uefi::table::system::SystemTable) -> Status {
    Status::SUCCESS
}

#[test]
fn load_start_and_exit_uninstalls_loaded_image_protocol() {
    dispatcher::teardown_for_test();
    let hooks: &'static MockPlatformHooks = Box::leak(Box::new(MockPlatformHooks::new(1_000_000, 32)));
    let system_table = dispatcher::bring_up(hooks, initial_map());
    let bs = unsafe { &*(*system_table).boot_services };

    let bytes = build_pe();
    let mut image_handle = Handle::null();
    let status = (bs.load_image)(0, Handle::null(), core::ptr::null_mut(), bytes.as_ptr() as *mut c_void, bytes.len(), &mut image_handle);
    assert_eq!(status, Status::SUCCESS);
    assert!(!image_handle.is_null());

    // The loaded-image protocol is reachable right after LoadImage.
    let mut interface: *mut c_void = core::ptr::null_mut();
    let status = (bs.handle_protocol)(image_handle, &LOADED_IMAGE_PROTOCOL_GUID, &mut interface);
    assert_eq!(status, Status::SUCCESS);

    dispatcher::with_core(|s| {
        let img = s.loaded_images.iter_mut().find(|i| i.handle == image_handle).unwrap();
        img.entry_point = entry_returns_success;
    });

    let mut exit_data_size = 0usize;
    let mut exit_data: *mut u16 = core::ptr::null_mut();
    let status = (bs.start_image)(image_handle, &mut exit_data_size, &mut exit_data);
    assert_eq!(status, Status::SUCCESS);

    // StartImage returning is the common application idiom for "ran to
    // completion"; a well-behaved application still calls Exit(status)
    // from its own entry point before returning control. Do that here.
    let status = (bs.exit)(image_handle, Status::SUCCESS, 0, core::ptr::null_mut());
    assert_eq!(status, Status::SUCCESS);

    // The handle's loaded-image protocol must be gone: Exit on a started
    // image releases it exactly as UnloadImage would.
    let status = (bs.handle_protocol)(image_handle, &LOADED_IMAGE_PROTOCOL_GUID, &mut interface);
    assert_eq!(status, Status::NOT_FOUND);

    dispatcher::teardown_for_test();
}
