//! `LoadImage` / `StartImage` / `Exit` / `UnloadImage` (spec 4.5,
//! component C4).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ffi::c_void;

use log::{debug, warn};

use crate::error::{CoreError, ImageError, Result};
use crate::event::EventTimerCore;
use crate::image::pe;
use crate::image::relocation::{self, RelocationLogEntry};
use crate::image::te;
use crate::memory::MemoryManager;
use crate::platform::PlatformHooks;
use crate::protocol::ProtocolDatabase;
use crate::tpl::TplScheduler;
use crate::uefi::base::{Handle, Status};
use crate::uefi::proto::loaded_image::{
    LOADED_IMAGE_DEVICE_PATH_PROTOCOL_GUID, LOADED_IMAGE_PROTOCOL_GUID, LOADED_IMAGE_PROTOCOL_REVISION, LoadedImageProtocol,
};
use crate::uefi::table::boot::MemoryType;
use crate::uefi::table::system::SystemTable;

const EXPECTED_MACHINE_X86_64: u16 = 0x8664;

pub type EntryPoint = extern "efiapi" fn(Handle, *mut SystemTable) -> Status;

/// State the dispatcher keeps for every loaded image between `LoadImage`
/// and `UnloadImage`.
pub struct LoadedImage {
    pub handle: Handle,
    pub entry_point: EntryPoint,
    pub buffer: Vec<u8>,
    pub buffer_phys_start: u64,
    pub is_runtime: bool,
    pub relocation_log: Vec<RelocationLogEntry>,
    pub relocation_delta: i64,
    pub unload: Option<extern "efiapi" fn(Handle) -> Status>,
    pub started: bool,
    pub hii_resource_offset: Option<usize>,
}

struct Common {
    machine: u16,
    image_base: u64,
    address_of_entry_point: u32,
    size_of_headers: u32,
    sections: Vec<pe::SectionHeader>,
    relocations_stripped: bool,
    base_relocation: Option<(u32, u32)>,
    size_of_image: u32,
}

fn identify(bytes: &[u8]) -> Result<Common> {
    if bytes.starts_with(b"MZ") {
        let parsed = pe::parse(bytes)?;
        Ok(Common {
            machine: parsed.machine,
            image_base: parsed.image_base,
            address_of_entry_point: parsed.address_of_entry_point,
            size_of_headers: parsed.size_of_headers,
            sections: parsed.sections,
            relocations_stripped: parsed.relocations_stripped,
            base_relocation: parsed.base_relocation,
            size_of_image: parsed.size_of_image,
        })
    } else if bytes.len() >= 2 && u16::from_le_bytes([bytes[0], bytes[1]]) == 0x5A56 {
        let parsed = te::parse(bytes)?;
        let size_of_image = parsed
            .sections
            .iter()
            .map(|s| s.virtual_address.saturating_add(s.virtual_size))
            .max()
            .unwrap_or(parsed.stripped_size);
        Ok(Common {
            machine: parsed.machine,
            image_base: parsed.image_base,
            address_of_entry_point: parsed.address_of_entry_point,
            size_of_headers: parsed.stripped_size.min(40),
            sections: parsed.sections,
            relocations_stripped: false,
            base_relocation: parsed.base_relocation,
            size_of_image,
        })
    } else {
        Err(CoreError::Image(ImageError::MalformedHeader))
    }
}

/// Best-effort locate of a three-character-wide `"HII"` resource name
/// inside the raw image. Real PE resource-directory walking is out of
/// this core's depth; callers needing the resource content re-parse the
/// source at the returned byte offset.
fn locate_hii_resource(bytes: &[u8]) -> Option<usize> {
    const NEEDLE: [u8; 6] = [b'H', 0, b'I', 0, b'I', 0];
    bytes.windows(NEEDLE.len()).position(|w| w == NEEDLE)
}

/// `LoadImage`. `source` is the already-resolved image bytes (device-path
/// and firmware-volume resolution happen upstream, in `crate::fv` and the
/// dispatcher); `device_handle`/`file_path` are recorded verbatim into the
/// loaded-image protocol.
#[allow(clippy::too_many_arguments)]
pub fn load_image(
    source: &[u8],
    parent_handle: Handle,
    device_handle: Handle,
    file_path: *mut c_void,
    system_table: *mut SystemTable,
    is_runtime: bool,
    memory: &mut MemoryManager,
    protocols: &mut ProtocolDatabase,
    events: &mut EventTimerCore,
    tpl: &mut TplScheduler,
) -> Result<LoadedImage> {
    let parsed = identify(source)?;
    if parsed.machine != EXPECTED_MACHINE_X86_64 {
        return Err(CoreError::Image(ImageError::UnsupportedMachine));
    }

    let code_type = if is_runtime { MemoryType::RuntimeServicesCode } else { MemoryType::BootServicesCode };
    let (buffer_phys_start, mut buffer) = memory.allocate_image_buffer(code_type, parsed.size_of_image as usize)?;

    let header_len = (parsed.size_of_headers as usize).min(source.len()).min(buffer.len());
    buffer[..header_len].copy_from_slice(&source[..header_len]);

    for section in &parsed.sections {
        let va = section.virtual_address as usize;
        let raw_len = (section.size_of_raw_data as usize).min(source.len().saturating_sub(section.pointer_to_raw_data as usize));
        let src = &source[section.pointer_to_raw_data as usize..section.pointer_to_raw_data as usize + raw_len];
        buffer[va..va + raw_len].copy_from_slice(src);
        let virtual_size = section.virtual_size as usize;
        if virtual_size > raw_len {
            for b in &mut buffer[va + raw_len..va + virtual_size] {
                *b = 0;
            }
        }
    }

    let load_address = buffer.as_ptr() as u64;
    let delta = load_address as i64 - parsed.image_base as i64;
    let relocation_log = if !parsed.relocations_stripped {
        match parsed.base_relocation {
            Some((rva, size)) => relocation::apply(&mut buffer, rva, size, delta)?,
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let hii_resource_offset = locate_hii_resource(source);

    let entry_point_addr = load_address + parsed.address_of_entry_point as u64;
    // SAFETY: `entry_point_addr` lies within `buffer`, which the loader
    // just validated and finished relocating; the caller (StartImage)
    // never calls through it before that.
    let entry_point: EntryPoint = unsafe { core::mem::transmute::<usize, EntryPoint>(entry_point_addr as usize) };

    let loaded_image_proto = Box::leak(Box::new(LoadedImageProtocol {
        revision: LOADED_IMAGE_PROTOCOL_REVISION,
        parent_handle,
        system_table,
        device_handle,
        file_path,
        reserved: core::ptr::null_mut(),
        load_options_size: 0,
        load_options: core::ptr::null_mut(),
        image_base: buffer.as_mut_ptr() as *mut c_void,
        image_size: parsed.size_of_image as u64,
        image_code_type: code_type as u32,
        image_data_type: if is_runtime { MemoryType::RuntimeServicesData as u32 } else { MemoryType::BootServicesData as u32 },
        unload: unload_not_supported,
    }));

    let handle = protocols.install(None, LOADED_IMAGE_PROTOCOL_GUID, loaded_image_proto as *mut LoadedImageProtocol as *mut c_void, events, tpl)?;
    protocols.install(Some(handle), LOADED_IMAGE_DEVICE_PATH_PROTOCOL_GUID, file_path, events, tpl)?;

    debug!("LoadImage: handle {handle:?} loaded at {load_address:#x} (base {:#x}, {} byte(s))", parsed.image_base, parsed.size_of_image);

    Ok(LoadedImage {
        handle,
        entry_point,
        buffer,
        buffer_phys_start,
        is_runtime,
        relocation_log,
        relocation_delta: delta,
        unload: None,
        started: false,
        hii_resource_offset,
    })
}

extern "efiapi" fn unload_not_supported(_h: Handle) -> Status {
    Status::UNSUPPORTED
}

/// `StartImage`. The entry function is expected to return promptly after
/// calling `Exit` -- this core models `Exit` as recording the caller's
/// intended return status rather than truly unwinding an arbitrary call
/// depth (spec 9's jump-buffer note describes the full mechanism; a
/// software implementation of non-local control transfer needs
/// platform-specific register save/restore this core does not provide).
pub fn start_image(image: &mut LoadedImage, hooks: &dyn PlatformHooks, system_table: *mut SystemTable) -> Status {
    image.started = true;
    hooks.set_watchdog(crate::config::watchdog::DEFAULT_TIMEOUT_SECONDS, 0, None);
    let status = (image.entry_point)(image.handle, system_table);
    hooks.set_watchdog(0, 0, None);
    status
}

/// `Exit`. Unwinds to `StartImage` (spec 4.5 "when `started == true`,
/// unwinds to StartImage") and, either way, releases the image exactly as
/// `UnloadImage` would -- uninstalling the loaded-image protocols and
/// freeing its page range -- since a started image calling `Exit` from its
/// own entry point (the standard UEFI shutdown idiom) never gets a
/// separate `UnloadImage` call of its own. Without this, every image that
/// calls `Exit` after having started would leak its buffer and leave a
/// dangling `LoadedImageProtocol` installed.
pub fn exit_image(image: LoadedImage, status: Status, protocols: &mut ProtocolDatabase, memory: &mut MemoryManager) -> Result<Status> {
    unload_image(image, protocols, memory)?;
    Ok(status)
}

/// `UnloadImage`. Calls the image's unload callback (if the loader
/// installed one other than the default unsupported stub), then releases
/// pages and uninstalls the loaded-image protocols.
pub fn unload_image(image: LoadedImage, protocols: &mut ProtocolDatabase, memory: &mut MemoryManager) -> Result<()> {
    if let Some(unload) = image.unload {
        let status = unload(image.handle);
        if !status.is_success() {
            warn!("UnloadImage: unload callback for {:?} returned {status:?}", image.handle);
            return Err(CoreError::Status(status));
        }
    }
    protocols.uninstall(image.handle, LOADED_IMAGE_PROTOCOL_GUID)?;
    protocols.uninstall(image.handle, LOADED_IMAGE_DEVICE_PATH_PROTOCOL_GUID)?;
    memory.free_image_buffer(image.buffer_phys_start, image.buffer.len())?;
    Ok(())
}
