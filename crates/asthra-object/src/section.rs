//! Shared section/symbol/relocation model used by both the ELF and Mach-O
//! writers.

use std::sync::Mutex;

use bitflags::bitflags;

bitflags! {
    /// Section permission/role flags, independent of the on-disk encoding
    /// each format uses for them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        const ALLOC   = 1 << 0;
        const WRITE   = 1 << 1;
        const EXEC    = 1 << 2;
        const NOBITS  = 1 << 3;
        const STRINGS = 1 << 4;
    }
}

/// A section's payload bytes. Growth is explicit capacity-doubling rather than relying on
/// `Vec`'s own growth policy, and access is mutex-guarded because a
/// collaborator (a legacy peephole code generator) may populate the
/// instruction buffer asynchronously.
#[derive(Debug, Default)]
pub struct SectionBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl SectionBuffer {
    pub fn new() -> Self {
        Self { bytes: Mutex::new(Vec::new()) }
    }

    pub fn from_bytes(initial: Vec<u8>) -> Self {
        Self { bytes: Mutex::new(initial) }
    }

    /// Appends `data`, growing the backing store's capacity by doubling
    /// (seeding to 1 from zero) whenever the current capacity is exceeded.
    pub fn append(&self, data: &[u8]) {
        let mut guard = self.bytes.lock().expect("section buffer mutex poisoned");
        let needed = guard.len() + data.len();
        let mut capacity = guard.capacity();
        while needed > capacity {
            capacity = if capacity == 0 { 1 } else { capacity * 2 };
        }
        if capacity > guard.capacity() {
            guard.reserve(capacity - guard.len());
        }
        guard.extend_from_slice(data);
    }

    /// Returns the current byte length.
    pub fn len(&self) -> usize {
        self.bytes.lock().expect("section buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` against the buffer contents while holding the lock for the
    /// duration of the read.
    pub fn with_lock<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.bytes.lock().expect("section buffer mutex poisoned");
        f(&guard)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.lock().expect("section buffer mutex poisoned").clone()
    }
}

impl Clone for SectionBuffer {
    fn clone(&self) -> Self {
        Self::from_bytes(self.to_vec())
    }
}

/// A section pending serialization, independent of ELF/Mach-O specifics.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub flags: SectionFlags,
    pub align: u64,
    pub entsize: u64,
    pub data: SectionBuffer,
    /// Format-specific cross-link (ELF `sh_link`); unused by Mach-O.
    pub link: u32,
    /// Format-specific auxiliary field (ELF `sh_info`); unused by Mach-O.
    pub info: u32,
}

impl Section {
    pub fn new(name: impl Into<String>, flags: SectionFlags, align: u64) -> Self {
        Self {
            name: name.into(),
            flags,
            align,
            entsize: 0,
            data: SectionBuffer::new(),
            link: 0,
            info: 0,
        }
    }

    pub fn with_entsize(mut self, entsize: u64) -> Self {
        self.entsize = entsize;
        self
    }

    pub fn with_initial_data(mut self, bytes: Vec<u8>) -> Self {
        self.data = SectionBuffer::from_bytes(bytes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolBinding {
    Local,
    Global,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    NoType,
    Object,
    Func,
    Section,
}

/// A symbol-table entry, shared across formats. `section_index` is the
/// index into the writer's section list (`0` = undefined).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
    pub size: u64,
    pub section_index: u16,
    pub binding: SymbolBinding,
    pub sym_type: SymbolType,
}

impl Symbol {
    pub fn is_defined(&self) -> bool {
        self.section_index != 0
    }
}

/// A relocation entry against `.text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub offset: u64,
    pub symbol_index: u32,
    pub reloc_type: u32,
    pub addend: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_doubles_capacity_from_zero() {
        let buf = SectionBuffer::new();
        assert_eq!(buf.bytes.lock().unwrap().capacity(), 0);
        buf.append(&[1]);
        assert!(buf.bytes.lock().unwrap().capacity() >= 1);
        buf.append(&[2, 3, 4]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn with_lock_sees_appended_bytes() {
        let buf = SectionBuffer::new();
        buf.append(&[9, 8, 7]);
        let sum: u32 = buf.with_lock(|bytes| bytes.iter().map(|b| *b as u32).sum());
        assert_eq!(sum, 24);
    }

    #[test]
    fn symbol_undefined_when_section_index_zero() {
        let sym = Symbol {
            name: "foo".into(),
            value: 0,
            size: 0,
            section_index: 0,
            binding: SymbolBinding::Global,
            sym_type: SymbolType::Func,
        };
        assert!(!sym.is_defined());
    }
}
