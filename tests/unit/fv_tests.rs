//! Black-box coverage of the firmware-volume reader (spec 4.6, component
//! C8), distinct from the module's own inline unit tests -- this file
//! builds a volume with two real files rather than one, and exercises
//! `volume_attributes`, which the inline tests don't cover.

use dxe_core::fv::{next_file, read_file};
use dxe_core::uefi::base::Guid;

const FFS_FILE_HEADER_SIZE: usize = 24;
const SECTION_HEADER_SIZE: usize = 4;

fn push_file(out: &mut Vec<u8>, file_guid: Guid, file_type: u8, section_type: u8, payload: &[u8]) {
    let section_len = SECTION_HEADER_SIZE + payload.len();
    let mut section = vec![0u8; section_len];
    section[0..3].copy_from_slice(&(section_len as u32).to_le_bytes()[..3]);
    section[3] = section_type;
    section[SECTION_HEADER_SIZE..].copy_from_slice(payload);
    while section.len() % 4 != 0 {
        section.push(0);
    }

    let file_len = FFS_FILE_HEADER_SIZE + section.len();
    let mut file = vec![0u8; FFS_FILE_HEADER_SIZE];
    file[0..4].copy_from_slice(&file_guid.data1.to_le_bytes());
    file[4..6].copy_from_slice(&file_guid.data2.to_le_bytes());
    file[6..8].copy_from_slice(&file_guid.data3.to_le_bytes());
    file[8..16].copy_from_slice(&file_guid.data4);
    file[18] = file_type;
    file[20..23].copy_from_slice(&(file_len as u32).to_le_bytes()[..3]);
    file.extend_from_slice(&section);

    while out.len() % 8 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&file);
}

fn build_volume(attributes: u32, files: &[(Guid, u8, u8, &[u8])]) -> Vec<u8> {
    let mut v = vec![0u8; 0x40];
    v[0x2C..0x30].copy_from_slice(&attributes.to_le_bytes());
    v[0x30..0x32].copy_from_slice(&0x40u16.to_le_bytes());
    for (guid, ty, sec_ty, payload) in files {
        push_file(&mut v, *guid, *ty, *sec_ty, payload);
    }
    v
}

#[test]
fn volume_attributes_reads_the_header_field() {
    let volume = build_volume(0x0004_FEFF, &[]);
    assert_eq!(dxe_core::fv::volume_attributes(&volume).unwrap(), 0x0004_FEFF);
}

#[test]
fn next_file_enumerates_two_files_in_order() {
    let guid_a = Guid::new(1, 0, 0, [0; 8]);
    let guid_b = Guid::new(2, 0, 0, [0; 8]);
    let volume = build_volume(0, &[(guid_a, 0x07, 0x19, b"aaa"), (guid_b, 0x07, 0x19, b"bb")]);

    let first = next_file(&volume, None).unwrap().unwrap();
    assert_eq!(first.name, guid_a);
    let second = next_file(&volume, Some(first.data_end)).unwrap().unwrap();
    assert_eq!(second.name, guid_b);
    assert!(next_file(&volume, Some(second.data_end)).unwrap().is_none());
}

#[test]
fn read_file_finds_the_second_file_by_linear_scan() {
    let guid_a = Guid::new(1, 0, 0, [0; 8]);
    let guid_b = Guid::new(2, 0, 0, [0; 8]);
    let volume = build_volume(0, &[(guid_a, 0x07, 0x19, b"aaa"), (guid_b, 0x07, 0x19, b"bb")]);
    let file = read_file(&volume, guid_b).unwrap();
    assert_eq!(&volume[file.data_start + SECTION_HEADER_SIZE..file.data_start + SECTION_HEADER_SIZE + 2], b"bb");
}
