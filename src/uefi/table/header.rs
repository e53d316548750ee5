//! Standard UEFI table header.
//!
//! Every top-level table (System, Boot, Runtime) starts with this
//! structure. Reference: UEFI Spec 2.10, Section 4.2.

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct TableHeader {
    /// Table-unique signature (e.g. the system table's "IBI SYST").
    pub signature: u64,
    /// Specification or table revision.
    pub revision: u32,
    /// Size of the header in bytes.
    pub header_size: u32,
    /// CRC32 of the table; zero while the checksum itself is computed.
    pub crc32: u32,
    /// Reserved, must be zero.
    pub reserved: u32,
}

/// Byte offset of `crc32` within `TableHeader`. Since `#[repr(C)]` places a
/// struct's first field at offset 0, this is also the offset within any
/// table that leads with a `TableHeader` (`SystemTable`, `BootServices`,
/// `RuntimeServices`).
pub const CRC32_OFFSET: usize = 16;
