//! CRC-32 (component C1, "CRC32 of system tables"). Backs both the
//! `CalculateCrc32` boot service and the dispatcher's own `hdr.crc32`
//! maintenance on `SystemTable`/`BootServices`/`RuntimeServices` whenever
//! their contents change (construction, and the terminal
//! `ExitBootServices` handoff's "recompute the system-table CRC").
//!
//! Standard IEEE 802.3 polynomial (the same one `CalculateCrc32` in every
//! UEFI implementation uses), computed table-free since this core never
//! needs it on a hot path.

const POLY: u32 = 0xEDB8_8320;

fn crc32_update(mut crc: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    crc
}

/// `CalculateCrc32`. The whole-buffer CRC, not a running one.
pub fn calculate(bytes: &[u8]) -> u32 {
    !crc32_update(!0u32, bytes)
}

/// Recomputes a table's `crc32` header field: zero it, CRC the whole
/// buffer with it zeroed (per the UEFI table-header convention), write
/// the result back. `crc32_offset` is the byte offset of the `u32` field
/// within `buffer` (`uefi::table::header::CRC32_OFFSET` for any table
/// starting with a `TableHeader`, but named explicitly since callers pass
/// the whole table, not just the header).
pub fn fix_table_crc32(buffer: &mut [u8], crc32_offset: usize) {
    buffer[crc32_offset..crc32_offset + 4].copy_from_slice(&0u32.to_le_bytes());
    let crc = calculate(buffer);
    buffer[crc32_offset..crc32_offset + 4].copy_from_slice(&crc.to_le_bytes());
}
