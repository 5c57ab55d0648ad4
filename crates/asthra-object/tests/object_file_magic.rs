//! End-to-end scenario: object-file magic. Emits a
//! relocatable ELF for an empty program, re-reads the bytes, and checks the
//! ELF magic plus the `.Asthra.gc` metadata section's magic.

use asthra_object::elf::{ElfMachine, ElfWriter};
use asthra_object::metadata::build_gc_section;

#[test]
fn empty_program_elf_has_expected_magics() {
    let mut writer = ElfWriter::new(ElfMachine::X86_64);
    writer.add_metadata_section(build_gc_section(&[]));

    let bytes = writer.write().expect("writing an empty-program object must succeed");

    assert_eq!(&bytes[0..4], &[0x7F, b'E', b'L', b'F']);

    let shstrtab = extract_shstrtab(&bytes);
    let gc_section = find_section(&bytes, &shstrtab, ".Asthra.gc").expect(".Asthra.gc section must exist");
    let magic = u32::from_le_bytes([gc_section[0], gc_section[1], gc_section[2], gc_section[3]]);
    assert_eq!(magic, 0x4147_4300);
}

fn extract_shstrtab(bytes: &[u8]) -> Vec<u8> {
    let shoff = u64::from_le_bytes(bytes[40..48].try_into().unwrap()) as usize;
    let shentsize = u16::from_le_bytes(bytes[58..60].try_into().unwrap()) as usize;
    let shnum = u16::from_le_bytes(bytes[60..62].try_into().unwrap()) as usize;
    let shstrndx = u16::from_le_bytes(bytes[62..64].try_into().unwrap()) as usize;

    let entry = shoff + shstrndx * shentsize;
    let offset = u64::from_le_bytes(bytes[entry + 24..entry + 32].try_into().unwrap()) as usize;
    let size = u64::from_le_bytes(bytes[entry + 32..entry + 40].try_into().unwrap()) as usize;
    let _ = shnum;
    bytes[offset..offset + size].to_vec()
}

fn find_section<'a>(bytes: &'a [u8], shstrtab: &[u8], name: &str) -> Option<&'a [u8]> {
    let shoff = u64::from_le_bytes(bytes[40..48].try_into().unwrap()) as usize;
    let shentsize = u16::from_le_bytes(bytes[58..60].try_into().unwrap()) as usize;
    let shnum = u16::from_le_bytes(bytes[60..62].try_into().unwrap()) as usize;

    for idx in 0..shnum {
        let entry = shoff + idx * shentsize;
        let name_off = u32::from_le_bytes(bytes[entry..entry + 4].try_into().unwrap()) as usize;
        let section_name = read_c_str(shstrtab, name_off);
        if section_name == name {
            let offset = u64::from_le_bytes(bytes[entry + 24..entry + 32].try_into().unwrap()) as usize;
            let size = u64::from_le_bytes(bytes[entry + 32..entry + 40].try_into().unwrap()) as usize;
            return Some(&bytes[offset..offset + size]);
        }
    }
    None
}

fn read_c_str(bytes: &[u8], offset: usize) -> String {
    let end = bytes[offset..].iter().position(|b| *b == 0).map(|p| offset + p).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[offset..end]).into_owned()
}
