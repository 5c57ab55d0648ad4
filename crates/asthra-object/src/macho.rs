//! Mach-O (relocatable) writer. Asthra metadata sections are scoped to the
//! ELF writer only; this writer emits the standard sections and shares the
//! section/symbol model.

use crate::error::ObjectError;
use crate::section::{Section, SectionFlags};

const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_OBJECT: u32 = 0x1;
const CPU_TYPE_X86_64: u32 = 0x0100_0007;
const CPU_TYPE_ARM64: u32 = 0x0100_000c;
const CPU_SUBTYPE_ALL: u32 = 0x3;

const LC_SEGMENT_64: u32 = 0x19;
const S_ZEROFILL: u32 = 0x1;
const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachOCpu {
    X86_64,
    Arm64,
}

impl MachOCpu {
    /// Detects the host CPU type so the header carries it.
    pub fn host() -> Self {
        if cfg!(target_arch = "aarch64") {
            MachOCpu::Arm64
        } else {
            MachOCpu::X86_64
        }
    }

    fn cpu_type(self) -> u32 {
        match self {
            MachOCpu::X86_64 => CPU_TYPE_X86_64,
            MachOCpu::Arm64 => CPU_TYPE_ARM64,
        }
    }
}

pub struct MachOWriter {
    pub cpu: MachOCpu,
    pub text: Section,
    pub data: Section,
    pub bss: Section,
    pub const_section: Section,
}

impl MachOWriter {
    pub fn new(cpu: MachOCpu) -> Self {
        Self {
            cpu,
            text: Section::new("__text", SectionFlags::ALLOC | SectionFlags::EXEC, 16),
            data: Section::new("__data", SectionFlags::ALLOC | SectionFlags::WRITE, 8),
            bss: Section::new("__bss", SectionFlags::ALLOC | SectionFlags::WRITE | SectionFlags::NOBITS, 8),
            const_section: Section::new("__const", SectionFlags::ALLOC, 8),
        }
    }

    pub fn write(&self) -> Result<Vec<u8>, ObjectError> {
        let sections: [(&'static str, &'static str, &Section, u32); 4] = [
            ("__TEXT", "__text", &self.text, S_ATTR_PURE_INSTRUCTIONS),
            ("__DATA", "__data", &self.data, 0),
            ("__DATA", "__bss", &self.bss, S_ZEROFILL),
            ("__TEXT", "__const", &self.const_section, 0),
        ];

        const MACH_HEADER_SIZE: u64 = 32;
        const SEGMENT_CMD_SIZE: u64 = 72;
        const SECTION_CMD_SIZE: u64 = 80;

        let seg_cmd_size = SEGMENT_CMD_SIZE + SECTION_CMD_SIZE * sections.len() as u64;

        let mut file = Vec::new();
        file.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
        file.extend_from_slice(&self.cpu.cpu_type().to_le_bytes());
        file.extend_from_slice(&CPU_SUBTYPE_ALL.to_le_bytes());
        file.extend_from_slice(&MH_OBJECT.to_le_bytes());
        file.extend_from_slice(&1u32.to_le_bytes()); // ncmds
        file.extend_from_slice(&(seg_cmd_size as u32).to_le_bytes()); // sizeofcmds
        file.extend_from_slice(&0u32.to_le_bytes()); // flags
        file.extend_from_slice(&0u32.to_le_bytes()); // reserved
        debug_assert_eq!(file.len() as u64, MACH_HEADER_SIZE);

        let data_offset_start = MACH_HEADER_SIZE + seg_cmd_size;
        let mut data_blob = Vec::new();
        let mut section_offsets = Vec::with_capacity(sections.len());
        for (_, _, section, _) in &sections {
            while section.align > 0 && (data_blob.len() as u64) % section.align != 0 {
                data_blob.push(0);
            }
            section_offsets.push(data_offset_start + data_blob.len() as u64);
            if !section.flags.contains(SectionFlags::NOBITS) {
                section.data.with_lock(|bytes| data_blob.extend_from_slice(bytes));
            }
        }

        let vmsize: u64 = sections.iter().map(|(_, _, s, _)| s.data.len() as u64).sum();
        let filesize = data_blob.len() as u64;

        file.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
        file.extend_from_slice(&(seg_cmd_size as u32).to_le_bytes());
        file.extend_from_slice(&pad_name16(""));
        file.extend_from_slice(&0u64.to_le_bytes()); // vmaddr
        file.extend_from_slice(&vmsize.to_le_bytes());
        file.extend_from_slice(&data_offset_start.to_le_bytes());
        file.extend_from_slice(&filesize.to_le_bytes());
        file.extend_from_slice(&7u32.to_le_bytes()); // maxprot rwx
        file.extend_from_slice(&7u32.to_le_bytes()); // initprot rwx
        file.extend_from_slice(&(sections.len() as u32).to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes()); // flags

        for (idx, (segname, sectname, section, sflags)) in sections.iter().enumerate() {
            file.extend_from_slice(&pad_name16(sectname));
            file.extend_from_slice(&pad_name16(segname));
            file.extend_from_slice(&0u64.to_le_bytes()); // addr
            file.extend_from_slice(&(section.data.len() as u64).to_le_bytes());
            file.extend_from_slice(&(section_offsets[idx] as u32).to_le_bytes());
            file.extend_from_slice(&(section.align.trailing_zeros()).to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes()); // reloff
            file.extend_from_slice(&0u32.to_le_bytes()); // nreloc
            file.extend_from_slice(&sflags.to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes()); // reserved1
            file.extend_from_slice(&0u32.to_le_bytes()); // reserved2
            file.extend_from_slice(&0u32.to_le_bytes()); // reserved3
        }

        debug_assert_eq!(file.len() as u64, MACH_HEADER_SIZE + seg_cmd_size);
        file.extend_from_slice(&data_blob);
        Ok(file)
    }
}

fn pad_name16(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let n = bytes.len().min(16);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_macho_64_magic() {
        let writer = MachOWriter::new(MachOCpu::X86_64);
        let bytes = writer.write().unwrap();
        assert_eq!(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), MH_MAGIC_64);
    }

    #[test]
    fn host_cpu_type_matches_build_target() {
        let cpu = MachOCpu::host();
        let writer = MachOWriter::new(cpu);
        let bytes = writer.write().unwrap();
        let cpu_type = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(cpu_type, cpu.cpu_type());
    }

    #[test]
    fn bss_section_is_zerofill_and_contributes_no_file_bytes() {
        let mut writer = MachOWriter::new(MachOCpu::X86_64);
        writer.bss.data = crate::section::SectionBuffer::from_bytes(Vec::new());
        writer.text.data.append(&[0x90, 0x90]);
        let bytes = writer.write().unwrap();
        assert!(bytes.len() > 32);
    }
}
