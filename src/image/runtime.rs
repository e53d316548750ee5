//! Runtime-image list consulted by `SetVirtualAddressMap`: every image
//! loaded as `RuntimeServicesCode`/`RuntimeServicesData` keeps its
//! relocation log here so the virtual-address transition can redo the
//! same fixups against the new (virtual) delta.

use alloc::vec::Vec;

use crate::error::Result;
use crate::image::relocation::{self, RelocationLogEntry};
use crate::uefi::base::Handle;
use crate::uefi::table::boot::MemoryDescriptor;

pub struct RuntimeImage {
    pub handle: Handle,
    pub physical_base: u64,
    pub relocation_log: Vec<RelocationLogEntry>,
}

#[derive(Default)]
pub struct RuntimeImageList {
    images: Vec<RuntimeImage>,
}

impl RuntimeImageList {
    pub fn new() -> Self {
        RuntimeImageList { images: Vec::new() }
    }

    pub fn register(&mut self, handle: Handle, physical_base: u64, relocation_log: Vec<RelocationLogEntry>) {
        self.images.push(RuntimeImage { handle, physical_base, relocation_log });
    }

    /// `SetVirtualAddressMap`'s per-image half: re-applies each runtime
    /// image's recorded fixups against `virtual_base - physical_base`.
    pub fn relocate_all(&self, image_buffers: &mut [(Handle, &mut [u8])], virtual_base_of: impl Fn(u64) -> u64) -> Result<()> {
        for img in &self.images {
            if let Some((_, buf)) = image_buffers.iter_mut().find(|(h, _)| *h == img.handle) {
                let delta = virtual_base_of(img.physical_base) as i64 - img.physical_base as i64;
                relocation::reapply(buf, &img.relocation_log, delta)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// `SetVirtualAddressMap`'s logic half: resolves each registered image's
/// physical base against the new memory map's virtual mappings, then
/// re-applies its relocation log. `crate::dispatcher` owns the ABI
/// plumbing (reading the caller's descriptor array out of raw memory,
/// locating each image's live buffer).
pub fn set_virtual_address_map(list: &RuntimeImageList, images: &mut [(Handle, &mut [u8])], memory_map: &[MemoryDescriptor]) -> Result<()> {
    list.relocate_all(images, |physical_base| {
        memory_map
            .iter()
            .find(|d| physical_base >= d.physical_start && physical_base < d.physical_start + d.number_of_pages * crate::config::memory::PAGE_SIZE)
            .map(|d| d.virtual_start + (physical_base - d.physical_start))
            .unwrap_or(physical_base)
    })
}
