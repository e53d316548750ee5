//! Physical page allocator (spec 4.2, "Memory map").
//!
//! Owns the descriptor list itself: a sorted, gap-free, coalesced
//! `Vec<MemoryDescriptor>` covering the platform's initial map. This is pure
//! bookkeeping over address ranges — it never dereferences the addresses it
//! hands out, so it is fully exercisable on the host without any real
//! backing memory mapped at those addresses.

use alloc::vec::Vec;

use crate::config::memory::PAGE_SIZE;
use crate::error::{CoreError, MemoryError, Result};
use crate::uefi::table::boot::{AllocateType, MemoryDescriptor, MemoryType};

pub fn bytes_to_pages(bytes: usize) -> Result<u64> {
    if bytes == 0 {
        return Ok(0);
    }
    Ok((bytes as u64 + PAGE_SIZE - 1) / PAGE_SIZE)
}

fn descriptor_end(d: &MemoryDescriptor) -> u64 {
    d.physical_start + d.number_of_pages * PAGE_SIZE
}

fn is_conventional(d: &MemoryDescriptor) -> bool {
    d.ty == MemoryType::ConventionalMemory as u32
}

pub struct PageAllocator {
    map: Vec<MemoryDescriptor>,
}

impl PageAllocator {
    /// Takes ownership of the platform's initial memory map, sorting and
    /// coalescing it (spec 4.2 "the descriptor list ... is always
    /// coalesced: no two adjacent entries share type and attribute").
    pub fn new(mut initial: Vec<MemoryDescriptor>) -> Self {
        initial.sort_by_key(|d| d.physical_start);
        let mut pa = PageAllocator { map: initial };
        pa.coalesce();
        pa
    }

    fn coalesce(&mut self) {
        let mut i = 0;
        while i + 1 < self.map.len() {
            let (a, b) = (self.map[i], self.map[i + 1]);
            if a.ty == b.ty && a.attribute == b.attribute && descriptor_end(&a) == b.physical_start {
                self.map[i].number_of_pages += b.number_of_pages;
                self.map.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    pub fn snapshot(&self) -> Vec<MemoryDescriptor> {
        self.map.clone()
    }

    /// `AllocatePages` (spec 4.2). Returns the start address of a fresh
    /// range of `pages` pages, re-typed to `memory_type`.
    pub fn allocate(
        &mut self,
        alloc_type: AllocateType,
        memory_type: MemoryType,
        pages: u64,
        address: Option<u64>,
    ) -> Result<u64> {
        if pages == 0 {
            return Err(CoreError::Memory(MemoryError::InvalidAlignment));
        }
        let start = match alloc_type {
            AllocateType::AllocateAnyPages => self.find_lowest(pages)?,
            AllocateType::AllocateMaxAddress => {
                let bound = address.ok_or(CoreError::Memory(MemoryError::InvalidAlignment))?;
                self.find_highest_below(pages, bound)?
            }
            AllocateType::AllocateAddress => {
                let addr = address.ok_or(CoreError::Memory(MemoryError::InvalidAlignment))?;
                if addr % PAGE_SIZE != 0 {
                    return Err(CoreError::Memory(MemoryError::InvalidAlignment));
                }
                self.find_exact(pages, addr)?
            }
            AllocateType::MaxAllocateType => return Err(CoreError::Memory(MemoryError::InvalidAlignment)),
        };
        self.retype_range(start, pages, memory_type as u32, Some(MemoryType::ConventionalMemory as u32))?;
        Ok(start)
    }

    fn find_lowest(&self, pages: u64) -> Result<u64> {
        self.map
            .iter()
            .find(|d| is_conventional(d) && d.number_of_pages >= pages)
            .map(|d| d.physical_start)
            .ok_or(CoreError::Memory(MemoryError::OutOfResources))
    }

    fn find_highest_below(&self, pages: u64, max_address: u64) -> Result<u64> {
        let ceiling = (max_address + 1) / PAGE_SIZE * PAGE_SIZE;
        let mut best: Option<u64> = None;
        for d in self.map.iter().filter(|d| is_conventional(d)) {
            let usable_end = descriptor_end(d).min(ceiling);
            if usable_end <= d.physical_start {
                continue;
            }
            let span_pages = (usable_end - d.physical_start) / PAGE_SIZE;
            if span_pages < pages {
                continue;
            }
            let candidate = usable_end - pages * PAGE_SIZE;
            if best.map(|b| candidate > b).unwrap_or(true) {
                best = Some(candidate);
            }
        }
        best.ok_or(CoreError::Memory(MemoryError::OutOfResources))
    }

    fn find_exact(&self, pages: u64, address: u64) -> Result<u64> {
        let end = address + pages * PAGE_SIZE;
        self.map
            .iter()
            .find(|d| is_conventional(d) && d.physical_start <= address && end <= descriptor_end(d))
            .map(|_| address)
            .ok_or(CoreError::Memory(MemoryError::OutOfResources))
    }

    /// `FreePages` (spec 4.2). `address..address+pages*PAGE_SIZE` must lie
    /// entirely within one descriptor that is not already `Conventional`.
    pub fn free(&mut self, address: u64, pages: u64) -> Result<()> {
        if pages == 0 || address % PAGE_SIZE != 0 {
            return Err(CoreError::Memory(MemoryError::InvalidAlignment));
        }
        self.retype_range(address, pages, MemoryType::ConventionalMemory as u32, None)
    }

    /// Splits the descriptor covering `[start, start + pages*PAGE_SIZE)`
    /// into up to three pieces and retypes the middle one. If
    /// `required_old_type` is given the covering descriptor must already
    /// have that type (used by `allocate`, which only carves out of
    /// `Conventional` ranges); `free` instead rejects a covering descriptor
    /// that is already `Conventional`.
    fn retype_range(
        &mut self,
        start: u64,
        pages: u64,
        new_type: u32,
        required_old_type: Option<u32>,
    ) -> Result<()> {
        let end = start + pages * PAGE_SIZE;
        let idx = self
            .map
            .iter()
            .position(|d| d.physical_start <= start && end <= descriptor_end(d))
            .ok_or(CoreError::Memory(MemoryError::NotFound))?;
        let desc = self.map[idx];
        match required_old_type {
            Some(required) if desc.ty != required => return Err(CoreError::Memory(MemoryError::TypeMismatch)),
            None if desc.ty == MemoryType::ConventionalMemory as u32 => {
                return Err(CoreError::Memory(MemoryError::TypeMismatch));
            }
            _ => {}
        }

        let mut replacement = Vec::with_capacity(3);
        if desc.physical_start < start {
            replacement.push(MemoryDescriptor {
                ty: desc.ty,
                pad: 0,
                physical_start: desc.physical_start,
                virtual_start: 0,
                number_of_pages: (start - desc.physical_start) / PAGE_SIZE,
                attribute: desc.attribute,
            });
        }
        replacement.push(MemoryDescriptor {
            ty: new_type,
            pad: 0,
            physical_start: start,
            virtual_start: 0,
            number_of_pages: pages,
            attribute: desc.attribute,
        });
        let desc_end = descriptor_end(&desc);
        if end < desc_end {
            replacement.push(MemoryDescriptor {
                ty: desc.ty,
                pad: 0,
                physical_start: end,
                virtual_start: 0,
                number_of_pages: (desc_end - end) / PAGE_SIZE,
                attribute: desc.attribute,
            });
        }
        self.map.splice(idx..=idx, replacement);
        self.coalesce();
        Ok(())
    }
}
