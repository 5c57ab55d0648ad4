//! ELF-64 (System V relocatable) writer.

use num_enum::TryFromPrimitive;

use crate::error::ObjectError;
use crate::section::{Relocation, Section, SectionFlags, Symbol, SymbolBinding, SymbolType};

pub const ELFMAG: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];
const EI_CLASS_64: u8 = 2;
const EI_DATA_LSB: u8 = 1;
const EI_VERSION_CURRENT: u8 = 1;
const ET_REL: u16 = 1;

const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_RELA: u32 = 4;
const SHT_NOBITS: u32 = 8;

/// Target machine for the ELF `e_machine` field. Named `EM_*` in C code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum ElfMachine {
    X86_64 = 62,
    Aarch64 = 183,
}

impl ElfMachine {
    fn code(self) -> u16 {
        self as u16
    }
}

/// Builds the standard ELF-64 relocatable object plus any Asthra metadata
/// sections layered on top.
pub struct ElfWriter {
    pub machine: ElfMachine,
    pub text: Section,
    pub data: Section,
    pub bss: Section,
    pub rodata: Section,
    pub metadata_sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<Relocation>,
}

impl ElfWriter {
    pub fn new(machine: ElfMachine) -> Self {
        Self {
            machine,
            text: Section::new(".text", SectionFlags::ALLOC | SectionFlags::EXEC, 16),
            data: Section::new(".data", SectionFlags::ALLOC | SectionFlags::WRITE, 8),
            bss: Section::new(".bss", SectionFlags::ALLOC | SectionFlags::WRITE | SectionFlags::NOBITS, 8),
            rodata: Section::new(".rodata", SectionFlags::ALLOC, 8),
            metadata_sections: Vec::new(),
            symbols: Vec::new(),
            relocations: Vec::new(),
        }
    }

    pub fn add_metadata_section(&mut self, section: Section) {
        self.metadata_sections.push(section);
    }

    /// Serializes the whole object file, returning its bytes. Structural
    /// errors abort the write entirely.
    pub fn write(&self) -> Result<Vec<u8>, ObjectError> {
        let (locals, globals): (Vec<&Symbol>, Vec<&Symbol>) =
            self.symbols.iter().partition(|s| s.binding == SymbolBinding::Local);
        let ordered_symbols: Vec<&Symbol> = locals.iter().chain(globals.iter()).copied().collect();
        let symtab_info = 1 + locals.len() as u32;

        let mut strtab = vec![0u8];
        let mut sym_name_offsets = Vec::with_capacity(ordered_symbols.len());
        for sym in &ordered_symbols {
            sym_name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
        }

        let mut symtab_bytes = vec![0u8; 24]; // null entry
        for (sym, name_off) in ordered_symbols.iter().zip(sym_name_offsets.iter()) {
            write_elf_sym(&mut symtab_bytes, *name_off, sym);
        }

        let mut rela_bytes = Vec::with_capacity(self.relocations.len() * 24);
        for rel in &self.relocations {
            rela_bytes.extend_from_slice(&rel.offset.to_le_bytes());
            let info = ((rel.symbol_index as u64) << 32) | (rel.reloc_type as u64 & 0xffff_ffff);
            rela_bytes.extend_from_slice(&info.to_le_bytes());
            rela_bytes.extend_from_slice(&rel.addend.to_le_bytes());
        }

        let symtab = Section::new(".symtab", SectionFlags::empty(), 8)
            .with_entsize(24)
            .with_initial_data(symtab_bytes);
        let strtab_section = Section::new(".strtab", SectionFlags::STRINGS, 1).with_initial_data(strtab);
        let rela_text = Section::new(".rela.text", SectionFlags::empty(), 8)
            .with_entsize(24)
            .with_initial_data(rela_bytes);

        let mut entries: Vec<(Section, u32, u32, u32, u32)> = Vec::new();
        // (section, sh_type, sh_link placeholder index, sh_info, sh_flags already in Section)
        entries.push((Section::new("", SectionFlags::empty(), 0), SHT_NULL, 0, 0, 0));
        entries.push((self.text.clone(), SHT_PROGBITS, 0, 0, 0));
        entries.push((self.data.clone(), SHT_PROGBITS, 0, 0, 0));
        entries.push((self.bss.clone(), SHT_NOBITS, 0, 0, 0));
        entries.push((self.rodata.clone(), SHT_PROGBITS, 0, 0, 0));
        for meta in &self.metadata_sections {
            entries.push((meta.clone(), SHT_PROGBITS, 0, 0, 0));
        }
        let symtab_idx = entries.len();
        entries.push((symtab, SHT_SYMTAB, 0, 0, 0));
        let strtab_idx = entries.len();
        entries.push((strtab_section, SHT_STRTAB, 0, 0, 0));
        let shstrtab_idx = entries.len();
        entries.push((Section::new(".shstrtab", SectionFlags::STRINGS, 1), SHT_STRTAB, 0, 0, 0));
        let rela_idx = entries.len();
        entries.push((rela_text, SHT_RELA, 0, 0, 0));

        entries[symtab_idx].2 = strtab_idx as u32;
        entries[symtab_idx].3 = symtab_info;
        entries[rela_idx].2 = symtab_idx as u32;
        entries[rela_idx].3 = 1; // .text is entry index 1
        entries[shstrtab_idx].3 = 0;

        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::with_capacity(entries.len());
        for (section, ..) in &entries {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        entries[shstrtab_idx].0 = entries[shstrtab_idx].0.clone().with_initial_data(shstrtab);

        const EHDR_SIZE: u64 = 64;
        const SHDR_SIZE: u64 = 64;

        let mut file = Vec::new();
        file.extend_from_slice(&ELFMAG);
        file.push(EI_CLASS_64);
        file.push(EI_DATA_LSB);
        file.push(EI_VERSION_CURRENT);
        file.extend_from_slice(&[0u8; 9]); // OSABI, ABIVERSION, padding
        file.extend_from_slice(&ET_REL.to_le_bytes());
        file.extend_from_slice(&self.machine.code().to_le_bytes());
        file.extend_from_slice(&1u32.to_le_bytes()); // e_version
        file.extend_from_slice(&0u64.to_le_bytes()); // e_entry
        file.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
        let shoff_patch_at = file.len();
        file.extend_from_slice(&0u64.to_le_bytes()); // e_shoff, patched below
        file.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        file.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        file.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
        file.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
        file.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
        file.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        file.extend_from_slice(&(shstrtab_idx as u16).to_le_bytes());
        debug_assert_eq!(file.len() as u64, EHDR_SIZE);

        let mut offsets = vec![0u64; entries.len()];
        for (idx, (section, sh_type, ..)) in entries.iter().enumerate() {
            if idx == 0 || *sh_type == SHT_NOBITS {
                offsets[idx] = file.len() as u64;
                continue;
            }
            while section.align > 0 && (file.len() as u64) % section.align != 0 {
                file.push(0);
            }
            offsets[idx] = file.len() as u64;
            section.data.with_lock(|bytes| file.extend_from_slice(bytes));
        }

        while (file.len() as u64) % 8 != 0 {
            file.push(0);
        }
        let shoff = file.len() as u64;
        file[shoff_patch_at..shoff_patch_at + 8].copy_from_slice(&shoff.to_le_bytes());

        for (idx, (section, sh_type, sh_link, sh_info, _flags)) in entries.iter().enumerate() {
            file.extend_from_slice(&name_offsets[idx].to_le_bytes());
            file.extend_from_slice(&sh_type.to_le_bytes());
            file.extend_from_slice(&elf_section_flags(section.flags).to_le_bytes());
            file.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
            file.extend_from_slice(&offsets[idx].to_le_bytes());
            file.extend_from_slice(&section.data.len().to_le_bytes());
            file.extend_from_slice(&sh_link.to_le_bytes());
            file.extend_from_slice(&sh_info.to_le_bytes());
            file.extend_from_slice(&section.align.to_le_bytes());
            file.extend_from_slice(&section.entsize.to_le_bytes());
        }

        Ok(file)
    }
}

fn elf_section_flags(flags: SectionFlags) -> u64 {
    let mut raw = 0u64;
    if flags.contains(SectionFlags::WRITE) {
        raw |= 1;
    }
    if flags.contains(SectionFlags::ALLOC) {
        raw |= 2;
    }
    if flags.contains(SectionFlags::EXEC) {
        raw |= 4;
    }
    if flags.contains(SectionFlags::STRINGS) {
        raw |= 32;
    }
    raw
}

fn write_elf_sym(out: &mut Vec<u8>, name_offset: u32, sym: &Symbol) {
    let bind = match sym.binding {
        SymbolBinding::Local => 0u8,
        SymbolBinding::Global => 1u8,
        SymbolBinding::Weak => 2u8,
    };
    let sym_type = match sym.sym_type {
        SymbolType::NoType => 0u8,
        SymbolType::Object => 1u8,
        SymbolType::Func => 2u8,
        SymbolType::Section => 3u8,
    };
    out.extend_from_slice(&name_offset.to_le_bytes());
    out.push((bind << 4) | sym_type);
    out.push(0); // st_other
    out.extend_from_slice(&sym.section_index.to_le_bytes());
    out.extend_from_slice(&sym.value.to_le_bytes());
    out.extend_from_slice(&sym.size.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_magic_and_class_and_machine() {
        let writer = ElfWriter::new(ElfMachine::X86_64);
        let bytes = writer.write().unwrap();
        assert_eq!(&bytes[0..4], &ELFMAG);
        assert_eq!(bytes[4], EI_CLASS_64);
        let machine = u16::from_le_bytes([bytes[18], bytes[19]]);
        assert_eq!(machine, ElfMachine::X86_64 as u16);
    }

    #[test]
    fn section_count_includes_nine_standard_sections() {
        let writer = ElfWriter::new(ElfMachine::X86_64);
        let bytes = writer.write().unwrap();
        let shnum = u16::from_le_bytes([bytes[60], bytes[61]]);
        assert_eq!(shnum, 9);
    }

    #[test]
    fn metadata_sections_increase_section_count() {
        let mut writer = ElfWriter::new(ElfMachine::X86_64);
        writer.add_metadata_section(Section::new(".Asthra.ffi", SectionFlags::empty(), 8));
        let bytes = writer.write().unwrap();
        let shnum = u16::from_le_bytes([bytes[60], bytes[61]]);
        assert_eq!(shnum, 10);
    }

    #[test]
    fn symbol_goes_into_symtab_and_strtab() {
        let mut writer = ElfWriter::new(ElfMachine::X86_64);
        writer.symbols.push(Symbol {
            name: "main".into(),
            value: 0,
            size: 16,
            section_index: 1,
            binding: SymbolBinding::Global,
            sym_type: SymbolType::Func,
        });
        let bytes = writer.write().unwrap();
        assert!(bytes.windows(4).any(|w| w == b"main"));
    }
}
