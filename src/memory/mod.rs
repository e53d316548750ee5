//! Memory services (spec 4.2, component C3): the physical page allocator,
//! the pool allocator, and `GetMemoryMap`'s map-key versioning, unified
//! behind [`MemoryManager`] the way the dispatcher's `BootServices` table
//! wants them — one object fielding `AllocatePages`/`FreePages`/
//! `AllocatePool`/`FreePool`/`GetMemoryMap`/`ExitBootServices`.

pub mod pages;
pub mod pool;

use alloc::vec::Vec;
use core::ptr::NonNull;

use log::{debug, warn};

use crate::error::{CoreError, MemoryError, Result};
use crate::uefi::table::boot::{AllocateType, MemoryDescriptor, MemoryType};

pub use pages::PageAllocator;
pub use pool::PoolAllocator;

/// `GetMemoryMap`'s snapshot: the descriptor array, the key that
/// `ExitBootServices` must be called with, and the descriptor stride
/// (spec 4.2 "callers must stride by the returned `descriptor_size`").
pub struct MemoryMapSnapshot {
    pub descriptors: Vec<MemoryDescriptor>,
    pub map_key: u64,
    pub descriptor_size: usize,
}

pub struct MemoryManager {
    pages: PageAllocator,
    pool: PoolAllocator,
    map_key: u64,
    boot_services_exited: bool,
}

impl MemoryManager {
    pub fn new(initial_map: Vec<MemoryDescriptor>) -> Self {
        MemoryManager { pages: PageAllocator::new(initial_map), pool: PoolAllocator::new(), map_key: 0, boot_services_exited: false }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.boot_services_exited {
            Err(CoreError::Memory(MemoryError::BootServicesExited))
        } else {
            Ok(())
        }
    }

    fn bump_map_key(&mut self) {
        self.map_key = self.map_key.wrapping_add(1);
    }

    pub fn allocate_pages(&mut self, alloc_type: AllocateType, memory_type: MemoryType, pages: u64, address: Option<u64>) -> Result<u64> {
        self.ensure_active()?;
        let start = self.pages.allocate(alloc_type, memory_type, pages, address)?;
        self.bump_map_key();
        debug!("AllocatePages: {pages} page(s) of {memory_type:?} at {start:#x}");
        Ok(start)
    }

    pub fn free_pages(&mut self, address: u64, pages: u64) -> Result<()> {
        self.ensure_active()?;
        self.pages.free(address, pages)?;
        self.bump_map_key();
        debug!("FreePages: {pages} page(s) at {address:#x}");
        Ok(())
    }

    /// `AllocatePool`. Classed requests are served from the host/platform
    /// global allocator and never touch the page map; oversize requests
    /// additionally carve a symbolic page range so `GetMemoryMap` accounts
    /// for them correctly (spec 4.2 "oversize blocks ... remember their
    /// page count").
    pub fn allocate_pool(&mut self, owner_type: MemoryType, size: usize) -> Result<NonNull<u8>> {
        self.ensure_active()?;
        match pool::size_class_for(size) {
            Some(class) => self.pool.alloc_classed(owner_type, size, class),
            None => {
                let pages = pages::bytes_to_pages(pool::oversize_total_len(size))?;
                let start = self.pages.allocate(AllocateType::AllocateAnyPages, owner_type, pages, None)?;
                self.bump_map_key();
                match self.pool.alloc_oversize(owner_type, size, start, pages) {
                    Ok(ptr) => Ok(ptr),
                    Err(e) => {
                        warn!("AllocatePool: oversize backing allocation failed after reserving pages, rolling back");
                        let _ = self.pages.free(start, pages);
                        Err(e)
                    }
                }
            }
        }
    }

    pub fn free_pool(&mut self, ptr: NonNull<u8>) -> Result<()> {
        self.ensure_active()?;
        let info = self.pool.free(ptr)?;
        if let Some((start, pages)) = info.oversize {
            self.pages.free(start, pages)?;
            self.bump_map_key();
        }
        Ok(())
    }

    /// Reserves a symbolic page range of the requested `alloc_type` and
    /// returns it alongside a real, zeroed byte vector the caller can
    /// actually write into (the same split `allocate_pool`'s oversize path
    /// uses: `GetMemoryMap` sees the symbolic pages, the caller gets real
    /// bytes from the host/global allocator). `address` is the
    /// `AllocateMaxAddress` ceiling (e.g. below-4GiB for ACPI tables).
    pub fn allocate_backed_pages(&mut self, alloc_type: AllocateType, memory_type: MemoryType, byte_len: usize, address: Option<u64>) -> Result<(u64, Vec<u8>)> {
        self.ensure_active()?;
        let pages = pages::bytes_to_pages(byte_len)?;
        let start = self.pages.allocate(alloc_type, memory_type, pages, address)?;
        self.bump_map_key();
        let buffer = alloc::vec![0u8; (pages * crate::config::memory::PAGE_SIZE) as usize];
        Ok((start, buffer))
    }

    /// `allocate_backed_pages` specialized to `AllocateAnyPages`, used by
    /// the image loader.
    pub fn allocate_image_buffer(&mut self, memory_type: MemoryType, byte_len: usize) -> Result<(u64, Vec<u8>)> {
        self.allocate_backed_pages(AllocateType::AllocateAnyPages, memory_type, byte_len, None)
    }

    /// Releases the symbolic pages an image buffer reserved (spec
    /// `UnloadImage` / `Exit`'s page-release step). The caller drops its
    /// own backing `Vec<u8>` separately.
    pub fn free_image_buffer(&mut self, start: u64, byte_len: usize) -> Result<()> {
        self.ensure_active()?;
        let pages = pages::bytes_to_pages(byte_len)?;
        self.pages.free(start, pages)?;
        self.bump_map_key();
        Ok(())
    }

    pub fn get_memory_map(&self) -> MemoryMapSnapshot {
        MemoryMapSnapshot {
            descriptors: self.pages.snapshot(),
            map_key: self.map_key,
            descriptor_size: core::mem::size_of::<MemoryDescriptor>(),
        }
    }

    /// `ExitBootServices` (the memory half, spec 4.2 "stale map key").
    /// Rejects a stale key; on success, further allocation/free calls are
    /// permanently refused.
    pub fn exit_boot_services(&mut self, map_key: u64) -> Result<()> {
        if map_key != self.map_key {
            return Err(CoreError::Memory(MemoryError::StaleMapKey));
        }
        self.boot_services_exited = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn manager() -> MemoryManager {
        MemoryManager::new(vec![MemoryDescriptor {
            ty: MemoryType::ConventionalMemory as u32,
            pad: 0,
            physical_start: 0,
            virtual_start: 0,
            number_of_pages: 256,
            attribute: 0,
        }])
    }

    #[test]
    fn map_key_changes_on_every_page_allocation_and_free() {
        let mut mm = manager();
        let k0 = mm.get_memory_map().map_key;
        let start = mm.allocate_pages(AllocateType::AllocateAnyPages, MemoryType::LoaderData, 2, None).unwrap();
        let k1 = mm.get_memory_map().map_key;
        assert_ne!(k0, k1);
        mm.free_pages(start, 2).unwrap();
        let k2 = mm.get_memory_map().map_key;
        assert_ne!(k1, k2);
    }

    #[test]
    fn exit_boot_services_rejects_stale_key() {
        let mut mm = manager();
        let stale = mm.get_memory_map().map_key;
        mm.allocate_pages(AllocateType::AllocateAnyPages, MemoryType::LoaderData, 1, None).unwrap();
        assert!(mm.exit_boot_services(stale).is_err());
        let fresh = mm.get_memory_map().map_key;
        assert!(mm.exit_boot_services(fresh).is_ok());
    }

    #[test]
    fn allocation_refused_after_exit_boot_services() {
        let mut mm = manager();
        let key = mm.get_memory_map().map_key;
        mm.exit_boot_services(key).unwrap();
        assert!(mm.allocate_pages(AllocateType::AllocateAnyPages, MemoryType::LoaderData, 1, None).is_err());
    }

    #[test]
    fn pool_round_trip_no_page_leak_for_classed_size() {
        let mut mm = manager();
        let before = mm.get_memory_map().descriptors.len();
        let ptr = mm.allocate_pool(MemoryType::BootServicesData, 137).unwrap();
        unsafe {
            for i in 0..137u8 {
                *ptr.as_ptr().add(i as usize) = i;
            }
        }
        mm.free_pool(ptr).unwrap();
        let after = mm.get_memory_map().descriptors.len();
        assert_eq!(before, after);
    }

    #[test]
    fn oversize_pool_allocation_is_visible_in_memory_map_and_reclaimed_on_free() {
        let mut mm = manager();
        let baseline_pages: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
        let ptr = mm.allocate_pool(MemoryType::BootServicesData, 9000).unwrap();
        let after_alloc: u64 = mm
            .get_memory_map()
            .descriptors
            .iter()
            .filter(|d| d.ty == MemoryType::BootServicesData as u32)
            .map(|d| d.number_of_pages)
            .sum();
        assert!(after_alloc > 0);
        mm.free_pool(ptr).unwrap();
        let reclaimed: u64 = mm.get_memory_map().descriptors.iter().map(|d| d.number_of_pages).sum();
        assert_eq!(reclaimed, baseline_pages);
    }
}
