//! Terse Executable (TE) header parsing. TE strips the DOS stub and most
//! of the PE optional header, keeping only the fields a firmware loader
//! needs; RVAs in the data directories and section table are expressed
//! relative to the *original* PE image, offset by `stripped_size` so the
//! loader can translate them into offsets into the (shorter) TE buffer.

use alloc::vec::Vec;

use crate::error::{CoreError, ImageError, Result};
use crate::image::pe::SectionHeader;

const TE_SIGNATURE: u16 = 0x5A56; // "VZ"
const TE_HEADER_SIZE: u32 = 40;

#[derive(Debug, Clone)]
pub struct ParsedTe {
    pub machine: u16,
    pub image_base: u64,
    pub address_of_entry_point: u32,
    pub stripped_size: u32,
    pub sections: Vec<SectionHeader>,
    pub base_relocation: Option<(u32, u32)>,
}

fn u16_at(b: &[u8], off: usize) -> Result<u16> {
    b.get(off..off + 2).map(|s| u16::from_le_bytes([s[0], s[1]])).ok_or(CoreError::Image(ImageError::MalformedHeader))
}

fn u32_at(b: &[u8], off: usize) -> Result<u32> {
    b.get(off..off + 4).map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]])).ok_or(CoreError::Image(ImageError::MalformedHeader))
}

fn u64_at(b: &[u8], off: usize) -> Result<u64> {
    b.get(off..off + 8).map(|s| u64::from_le_bytes(s.try_into().unwrap())).ok_or(CoreError::Image(ImageError::MalformedHeader))
}

pub fn parse(bytes: &[u8]) -> Result<ParsedTe> {
    if u16_at(bytes, 0)? != TE_SIGNATURE {
        return Err(CoreError::Image(ImageError::MalformedHeader));
    }
    let machine = u16_at(bytes, 2)?;
    let number_of_sections = bytes.get(4).copied().ok_or(CoreError::Image(ImageError::MalformedHeader))? as usize;
    let stripped_size = u16_at(bytes, 6)? as u32;
    let address_of_entry_point = u32_at(bytes, 8)?;
    let image_base = u64_at(bytes, 16)?;
    let base_reloc_rva = u32_at(bytes, 24)?;
    let base_reloc_size = u32_at(bytes, 28)?;

    // RVAs recorded in the original PE are offset by (stripped_size -
    // TE_HEADER_SIZE); translate data-directory and section RVAs into
    // this buffer's own coordinate space up front so downstream code
    // never has to think about the adjustment again.
    let adjust = stripped_size.saturating_sub(TE_HEADER_SIZE);
    let base_relocation = if base_reloc_rva == 0 || base_reloc_size == 0 { None } else { Some((base_reloc_rva.saturating_sub(adjust), base_reloc_size)) };

    let section_table = TE_HEADER_SIZE as usize;
    let mut sections = Vec::with_capacity(number_of_sections);
    for i in 0..number_of_sections {
        let s = section_table + i * 40;
        sections.push(SectionHeader {
            virtual_size: u32_at(bytes, s + 8)?,
            virtual_address: u32_at(bytes, s + 12)?.saturating_sub(adjust),
            size_of_raw_data: u32_at(bytes, s + 16)?,
            pointer_to_raw_data: u32_at(bytes, s + 20)?.saturating_sub(adjust),
        });
    }

    Ok(ParsedTe { machine, image_base, address_of_entry_point, stripped_size, sections, base_relocation })
}
