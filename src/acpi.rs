//! ACPI table manager (spec 4.7, component C9): RSDP/RSDT/XSDT assembly,
//! FADT/FACS/DSDT cross-linking, and checksum maintenance.
//!
//! Every owned table lives in its own page allocation (mirroring the
//! image loader's split: symbolic pages for `GetMemoryMap`, real bytes
//! from the host/global allocator via [`crate::memory::MemoryManager`]).
//! RSDP/RSDT/XSDT additionally carry the below-4GiB address constraint
//! real ACPI consumers expect.

use alloc::vec::Vec;

use crate::error::{CoreError, AcpiError, Result};
use crate::memory::MemoryManager;
use crate::uefi::table::boot::{AllocateType, MemoryType};

const SDT_HEADER_LEN: usize = 36;
const RSDP_LEN: usize = 36;
const FADT_LEN: usize = 244;
const FACS_LEN: usize = 64;
const FADT_FIRMWARE_CTRL_OFF: usize = 36;
const FADT_DSDT_OFF: usize = 40;
const FADT_X_FIRMWARE_CTRL_OFF: usize = 132;
const FADT_X_DSDT_OFF: usize = 140;
const BELOW_4GIB: u64 = 0xFFFF_FFFF;

fn checksum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Recomputes byte 9 (the one checksum field covering the whole table) so
/// the standard 8-bit two's-complement sum of the table is zero.
fn fix_sdt_checksum(table: &mut [u8]) {
    table[9] = 0;
    let sum = checksum8(table);
    table[9] = sum.wrapping_neg();
}

fn write_sdt_header(table: &mut [u8], signature: &[u8; 4], length: u32, revision: u8) {
    table[0..4].copy_from_slice(signature);
    table[4..8].copy_from_slice(&length.to_le_bytes());
    table[8] = revision;
}

/// One table this manager owns, backed by its own page allocation.
struct OwnedTable {
    id: u64,
    phys_start: u64,
    buffer: Vec<u8>,
}

pub struct AcpiManager {
    next_id: u64,
    tables: Vec<OwnedTable>,
    fadt: Option<OwnedTable>,
    facs: Option<OwnedTable>,
    dsdt: Option<OwnedTable>,
    rsdp: Vec<u8>,
    rsdp_phys: u64,
    rsdt: Vec<u8>,
    rsdt_phys: u64,
    rsdt_capacity: usize,
    xsdt: Vec<u8>,
    xsdt_phys: u64,
    xsdt_capacity: usize,
}

impl AcpiManager {
    pub fn new(memory: &mut MemoryManager) -> Result<Self> {
        let growth = crate::config::acpi::TABLE_ARRAY_GROWTH_INCREMENT;
        let (rsdp_phys, rsdp) = memory.allocate_backed_pages(AllocateType::AllocateMaxAddress, MemoryType::ACPIReclaimMemory, RSDP_LEN, Some(BELOW_4GIB))?;
        let (rsdt_phys, rsdt) = memory.allocate_backed_pages(AllocateType::AllocateMaxAddress, MemoryType::ACPIReclaimMemory, SDT_HEADER_LEN + growth * 4, Some(BELOW_4GIB))?;
        let (xsdt_phys, xsdt) = memory.allocate_backed_pages(AllocateType::AllocateMaxAddress, MemoryType::ACPIReclaimMemory, SDT_HEADER_LEN + growth * 8, Some(BELOW_4GIB))?;

        let mut mgr = AcpiManager {
            next_id: 1,
            tables: Vec::new(),
            fadt: None,
            facs: None,
            dsdt: None,
            rsdp,
            rsdp_phys,
            rsdt,
            rsdt_phys,
            rsdt_capacity: growth,
            xsdt,
            xsdt_phys,
            xsdt_capacity: growth,
        };
        mgr.rewrite_rsdp();
        write_sdt_header(&mut mgr.rsdt, b"RSDT", SDT_HEADER_LEN as u32, crate::config::acpi::RSDT_REVISION);
        write_sdt_header(&mut mgr.xsdt, b"XSDT", SDT_HEADER_LEN as u32, crate::config::acpi::XSDT_REVISION);
        fix_sdt_checksum(&mut mgr.rsdt);
        fix_sdt_checksum(&mut mgr.xsdt);
        Ok(mgr)
    }

    fn rewrite_rsdp(&mut self) {
        self.rsdp[0..8].copy_from_slice(b"RSD PTR ");
        self.rsdp[15] = crate::config::acpi::RSDP_REVISION;
        self.rsdp[16..20].copy_from_slice(&(self.rsdt_phys as u32).to_le_bytes());
        self.rsdp[20..24].copy_from_slice(&(self.rsdp.len() as u32).to_le_bytes());
        self.rsdp[24..32].copy_from_slice(&self.xsdt_phys.to_le_bytes());
        self.rsdp[8] = 0;
        self.rsdp[32] = 0;
        let sum1 = checksum8(&self.rsdp[0..20]);
        self.rsdp[8] = sum1.wrapping_neg();
        let sum2 = checksum8(&self.rsdp);
        self.rsdp[32] = sum2.wrapping_neg();
    }

    /// RSDP bytes, for the dispatcher to publish as a configuration table
    /// once installed (spec 4.7 "tables become visible to the OS when the
    /// RSDP is installed as a configuration table").
    pub fn rsdp(&self) -> &[u8] {
        &self.rsdp
    }

    /// Adds one `u32`/`u64` pointer to RSDT/XSDT, growing both arrays with
    /// a fresh allocation (copying the old contents, releasing the old
    /// one) once capacity is exceeded.
    fn add_entry(&mut self, memory: &mut MemoryManager, phys_start: u64) -> Result<()> {
        let rsdt_entries = (self.rsdt.len() - SDT_HEADER_LEN) / 4;
        if rsdt_entries >= self.rsdt_capacity {
            self.grow_rsdt(memory)?;
        }
        self.rsdt.extend_from_slice(&(phys_start as u32).to_le_bytes());
        let len = self.rsdt.len() as u32;
        self.rsdt[4..8].copy_from_slice(&len.to_le_bytes());

        let xsdt_entries = (self.xsdt.len() - SDT_HEADER_LEN) / 8;
        if xsdt_entries >= self.xsdt_capacity {
            self.grow_xsdt(memory)?;
        }
        self.xsdt.extend_from_slice(&phys_start.to_le_bytes());
        let len = self.xsdt.len() as u32;
        self.xsdt[4..8].copy_from_slice(&len.to_le_bytes());

        fix_sdt_checksum(&mut self.rsdt);
        fix_sdt_checksum(&mut self.xsdt);
        self.rewrite_rsdp();
        Ok(())
    }

    fn grow_rsdt(&mut self, memory: &mut MemoryManager) -> Result<()> {
        let growth = crate::config::acpi::TABLE_ARRAY_GROWTH_INCREMENT;
        let new_capacity = self.rsdt_capacity + growth;
        let (new_phys, mut new_buf) = memory.allocate_backed_pages(AllocateType::AllocateMaxAddress, MemoryType::ACPIReclaimMemory, SDT_HEADER_LEN + new_capacity * 4, Some(BELOW_4GIB))?;
        new_buf[..self.rsdt.len()].copy_from_slice(&self.rsdt);
        let old_phys = self.rsdt_phys;
        let old_len = self.rsdt.len();
        memory.free_image_buffer(old_phys, old_len)?;
        self.rsdt = new_buf;
        self.rsdt_phys = new_phys;
        self.rsdt_capacity = new_capacity;
        Ok(())
    }

    fn grow_xsdt(&mut self, memory: &mut MemoryManager) -> Result<()> {
        let growth = crate::config::acpi::TABLE_ARRAY_GROWTH_INCREMENT;
        let new_capacity = self.xsdt_capacity + growth;
        let (new_phys, mut new_buf) = memory.allocate_backed_pages(AllocateType::AllocateMaxAddress, MemoryType::ACPIReclaimMemory, SDT_HEADER_LEN + new_capacity * 8, Some(BELOW_4GIB))?;
        new_buf[..self.xsdt.len()].copy_from_slice(&self.xsdt);
        let old_phys = self.xsdt_phys;
        let old_len = self.xsdt.len();
        memory.free_image_buffer(old_phys, old_len)?;
        self.xsdt = new_buf;
        self.xsdt_phys = new_phys;
        self.xsdt_capacity = new_capacity;
        Ok(())
    }

    fn remove_entry(&mut self, phys_start: u64) {
        let entries = (self.rsdt.len() - SDT_HEADER_LEN) / 4;
        if let Some(idx) = (0..entries).find(|&i| {
            let off = SDT_HEADER_LEN + i * 4;
            u32::from_le_bytes(self.rsdt[off..off + 4].try_into().unwrap()) as u64 == phys_start
        }) {
            let off = SDT_HEADER_LEN + idx * 4;
            self.rsdt.drain(off..off + 4);
            let len = self.rsdt.len() as u32;
            self.rsdt[4..8].copy_from_slice(&len.to_le_bytes());
        }
        let entries = (self.xsdt.len() - SDT_HEADER_LEN) / 8;
        if let Some(idx) = (0..entries).find(|&i| {
            let off = SDT_HEADER_LEN + i * 8;
            u64::from_le_bytes(self.xsdt[off..off + 8].try_into().unwrap()) == phys_start
        }) {
            let off = SDT_HEADER_LEN + idx * 8;
            self.xsdt.drain(off..off + 8);
            let len = self.xsdt.len() as u32;
            self.xsdt[4..8].copy_from_slice(&len.to_le_bytes());
        }
        fix_sdt_checksum(&mut self.rsdt);
        fix_sdt_checksum(&mut self.xsdt);
        self.rewrite_rsdp();
    }

    fn patch_fadt_pointers(&mut self) {
        if let Some(fadt) = &mut self.fadt {
            if let Some(facs) = &self.facs {
                fadt.buffer[FADT_FIRMWARE_CTRL_OFF..FADT_FIRMWARE_CTRL_OFF + 4].copy_from_slice(&(facs.phys_start as u32).to_le_bytes());
                fadt.buffer[FADT_X_FIRMWARE_CTRL_OFF..FADT_X_FIRMWARE_CTRL_OFF + 8].copy_from_slice(&facs.phys_start.to_le_bytes());
            } else {
                fadt.buffer[FADT_FIRMWARE_CTRL_OFF..FADT_FIRMWARE_CTRL_OFF + 4].fill(0);
                fadt.buffer[FADT_X_FIRMWARE_CTRL_OFF..FADT_X_FIRMWARE_CTRL_OFF + 8].fill(0);
            }
            if let Some(dsdt) = &self.dsdt {
                fadt.buffer[FADT_DSDT_OFF..FADT_DSDT_OFF + 4].copy_from_slice(&(dsdt.phys_start as u32).to_le_bytes());
                fadt.buffer[FADT_X_DSDT_OFF..FADT_X_DSDT_OFF + 8].copy_from_slice(&dsdt.phys_start.to_le_bytes());
            } else {
                fadt.buffer[FADT_DSDT_OFF..FADT_DSDT_OFF + 4].fill(0);
                fadt.buffer[FADT_X_DSDT_OFF..FADT_X_DSDT_OFF + 8].fill(0);
            }
            fix_sdt_checksum(&mut fadt.buffer);
        }
    }

    /// Installs the FADT. At most one may exist at a time; cross-links to
    /// FACS/DSDT if already installed.
    pub fn install_fadt(&mut self, memory: &mut MemoryManager, oem_id: &[u8; 6], oem_table_id: &[u8; 8], oem_revision: u32) -> Result<u64> {
        if self.fadt.is_some() {
            return Err(CoreError::Acpi(AcpiError::DuplicateFadt));
        }
        let (phys_start, mut buffer) = memory.allocate_backed_pages(AllocateType::AllocateAnyPages, MemoryType::ACPIReclaimMemory, FADT_LEN, None)?;
        write_sdt_header(&mut buffer, b"FACP", FADT_LEN as u32, 6);
        buffer[10..16].copy_from_slice(oem_id);
        buffer[16..24].copy_from_slice(oem_table_id);
        buffer[24..28].copy_from_slice(&oem_revision.to_le_bytes());
        let id = self.next_id;
        self.next_id += 1;
        self.fadt = Some(OwnedTable { id, phys_start, buffer });
        self.patch_fadt_pointers();

        self.rsdt[10..16].copy_from_slice(oem_id);
        self.xsdt[10..16].copy_from_slice(oem_id);

        self.add_entry(memory, phys_start)?;
        Ok(id)
    }

    /// Installs the FACS (ACPI-NVS memory, no generic SDT checksum field).
    /// Back-fills the FADT's firmware-control pointers if the FADT already
    /// exists, and re-checksums it.
    pub fn install_facs(&mut self, memory: &mut MemoryManager) -> Result<u64> {
        let (phys_start, mut buffer) = memory.allocate_backed_pages(AllocateType::AllocateAnyPages, MemoryType::ACPIMemoryNVS, FACS_LEN, None)?;
        buffer[0..4].copy_from_slice(b"FACS");
        buffer[4..8].copy_from_slice(&(FACS_LEN as u32).to_le_bytes());
        let id = self.next_id;
        self.next_id += 1;
        self.facs = Some(OwnedTable { id, phys_start, buffer });
        self.patch_fadt_pointers();
        Ok(id)
    }

    /// Installs the DSDT. Back-fills the FADT's DSDT pointers if the FADT
    /// already exists, and re-checksums it.
    pub fn install_dsdt(&mut self, memory: &mut MemoryManager, aml: &[u8]) -> Result<u64> {
        let (phys_start, mut buffer) = memory.allocate_backed_pages(AllocateType::AllocateAnyPages, MemoryType::ACPIReclaimMemory, SDT_HEADER_LEN + aml.len(), None)?;
        write_sdt_header(&mut buffer, b"DSDT", (SDT_HEADER_LEN + aml.len()) as u32, 2);
        buffer[SDT_HEADER_LEN..].copy_from_slice(aml);
        fix_sdt_checksum(&mut buffer);
        let id = self.next_id;
        self.next_id += 1;
        self.dsdt = Some(OwnedTable { id, phys_start, buffer });
        self.patch_fadt_pointers();
        Ok(id)
    }

    /// Installs a normal table (not FADT/FACS/DSDT), growing RSDT/XSDT.
    pub fn install_table(&mut self, memory: &mut MemoryManager, signature: &[u8; 4], body: &[u8]) -> Result<u64> {
        let len = SDT_HEADER_LEN + body.len();
        let (phys_start, mut buffer) = memory.allocate_backed_pages(AllocateType::AllocateAnyPages, MemoryType::ACPIReclaimMemory, len, None)?;
        write_sdt_header(&mut buffer, signature, len as u32, 1);
        buffer[SDT_HEADER_LEN..].copy_from_slice(body);
        fix_sdt_checksum(&mut buffer);
        let id = self.next_id;
        self.next_id += 1;
        self.tables.push(OwnedTable { id, phys_start, buffer });
        self.add_entry(memory, phys_start)?;
        Ok(id)
    }

    /// Uninstalls any table by the id `install_*` returned: releases its
    /// page allocation, removes it from RSDT/XSDT if it was a normal
    /// table, and clears FADT cross-links if it was FACS/DSDT.
    pub fn uninstall(&mut self, memory: &mut MemoryManager, id: u64) -> Result<()> {
        if let Some(pos) = self.tables.iter().position(|t| t.id == id) {
            let table = self.tables.remove(pos);
            self.remove_entry(table.phys_start);
            memory.free_image_buffer(table.phys_start, table.buffer.len())?;
            return Ok(());
        }
        if self.fadt.as_ref().is_some_and(|t| t.id == id) {
            let table = self.fadt.take().unwrap();
            self.remove_entry(table.phys_start);
            memory.free_image_buffer(table.phys_start, table.buffer.len())?;
            return Ok(());
        }
        if self.facs.as_ref().is_some_and(|t| t.id == id) {
            let table = self.facs.take().unwrap();
            memory.free_image_buffer(table.phys_start, table.buffer.len())?;
            self.patch_fadt_pointers();
            return Ok(());
        }
        if self.dsdt.as_ref().is_some_and(|t| t.id == id) {
            let table = self.dsdt.take().unwrap();
            memory.free_image_buffer(table.phys_start, table.buffer.len())?;
            self.patch_fadt_pointers();
            return Ok(());
        }
        Err(CoreError::Acpi(AcpiError::TableNotFound))
    }

    pub fn fadt_firmware_control(&self) -> Option<(u32, u64)> {
        self.fadt.as_ref().map(|t| {
            let lo = u32::from_le_bytes(t.buffer[FADT_FIRMWARE_CTRL_OFF..FADT_FIRMWARE_CTRL_OFF + 4].try_into().unwrap());
            let hi = u64::from_le_bytes(t.buffer[FADT_X_FIRMWARE_CTRL_OFF..FADT_X_FIRMWARE_CTRL_OFF + 8].try_into().unwrap());
            (lo, hi)
        })
    }

    pub fn fadt_checksum_is_zero(&self) -> bool {
        self.fadt.as_ref().is_some_and(|t| checksum8(&t.buffer) == 0)
    }

    pub fn rsdt_checksum_is_zero(&self) -> bool {
        checksum8(&self.rsdt) == 0
    }

    pub fn xsdt_checksum_is_zero(&self) -> bool {
        checksum8(&self.xsdt) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use crate::uefi::table::boot::MemoryDescriptor;

    fn manager() -> (MemoryManager, AcpiManager) {
        let mut mm = MemoryManager::new(vec![MemoryDescriptor {
            ty: MemoryType::ConventionalMemory as u32,
            pad: 0,
            physical_start: 0,
            virtual_start: 0,
            number_of_pages: 4096,
            attribute: 0,
        }]);
        let acpi = AcpiManager::new(&mut mm).unwrap();
        (mm, acpi)
    }

    #[test]
    fn rsdt_and_xsdt_checksums_start_valid() {
        let (_, acpi) = manager();
        assert!(acpi.rsdt_checksum_is_zero());
        assert!(acpi.xsdt_checksum_is_zero());
    }

    #[test]
    fn second_fadt_install_is_rejected() {
        let (mut mm, mut acpi) = manager();
        acpi.install_fadt(&mut mm, b"RUSTOS", b"FADTTBL0", 1).unwrap();
        assert!(acpi.install_fadt(&mut mm, b"RUSTOS", b"FADTTBL0", 1).is_err());
    }

    #[test]
    fn install_fadt_then_facs_cross_links_and_checksum_is_zero() {
        let (mut mm, mut acpi) = manager();
        acpi.install_fadt(&mut mm, b"RUSTOS", b"FADTTBL0", 1).unwrap();
        let facs_id = acpi.install_facs(&mut mm).unwrap();
        assert!(acpi.fadt_checksum_is_zero());
        let (_, x_firmware_ctrl) = acpi.fadt_firmware_control().unwrap();
        assert_ne!(x_firmware_ctrl, 0);

        acpi.uninstall(&mut mm, facs_id).unwrap();
        let (lo, hi) = acpi.fadt_firmware_control().unwrap();
        assert_eq!((lo, hi), (0, 0));
        assert!(acpi.fadt_checksum_is_zero());
    }

    #[test]
    fn install_table_grows_rsdt_past_capacity() {
        let (mut mm, mut acpi) = manager();
        let growth = crate::config::acpi::TABLE_ARRAY_GROWTH_INCREMENT;
        for _ in 0..=growth {
            acpi.install_table(&mut mm, b"SSDT", &[0u8; 8]).unwrap();
        }
        assert!(acpi.rsdt_checksum_is_zero());
        assert!(acpi.xsdt_checksum_is_zero());
        assert_eq!((acpi.rsdt.len() - SDT_HEADER_LEN) / 4, growth + 1);
    }

    #[test]
    fn uninstall_collapses_rsdt_entry_and_fixes_checksum() {
        let (mut mm, mut acpi) = manager();
        let a = acpi.install_table(&mut mm, b"SSDT", &[1u8; 4]).unwrap();
        acpi.install_table(&mut mm, b"SSDT", &[2u8; 4]).unwrap();
        acpi.uninstall(&mut mm, a).unwrap();
        assert_eq!((acpi.rsdt.len() - SDT_HEADER_LEN) / 4, 1);
        assert!(acpi.rsdt_checksum_is_zero());
    }
}
