//! Asthra-specific metadata sections. ELF-only.

use crate::section::{Section, SectionFlags};

const VERSION: u32 = 1;

/// Magics are 4 ASCII bytes read as a native 32-bit integer, i.e. big-endian / first-byte-most-significant.
const fn magic_u32(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Builds the header (4-byte magic + version) every metadata section
/// starts with.
fn header(magic: [u8; 4]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(&magic);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf
}

fn fixed_name(name: &str) -> [u8; 64] {
    let mut buf = [0u8; 64];
    let bytes = name.as_bytes();
    let n = bytes.len().min(64);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

pub const FFI_MAGIC: u32 = magic_u32(*b"AFFI");
pub const GC_MAGIC: u32 = magic_u32(*b"AGC\0");
pub const SECURITY_MAGIC: u32 = magic_u32(*b"ASEC");
pub const PATTERN_MAGIC: u32 = magic_u32(*b"APAT");
pub const STRING_MAGIC: u32 = magic_u32(*b"ASTR");
pub const SLICE_MAGIC: u32 = magic_u32(*b"ASLI");
pub const CONCURRENCY_MAGIC: u32 = magic_u32(*b"ACON");

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FfiParam {
    pub marshal_type: u32,
    pub transfer_type: u32,
    pub is_borrowed: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FfiEntry {
    pub name: String,
    pub param_count: u32,
    pub variadic_start: i32,
    pub calling_conv: u32,
    pub transfer_semantics: u32,
    pub address: u64,
    pub params: Vec<FfiParam>,
}

/// Builds `.Asthra.ffi` (magic `AFFI`).
pub fn build_ffi_section(entries: &[FfiEntry]) -> Section {
    let mut data = header(*b"AFFI");
    for entry in entries {
        data.extend_from_slice(&fixed_name(&entry.name));
        data.extend_from_slice(&entry.param_count.to_le_bytes());
        data.extend_from_slice(&entry.variadic_start.to_le_bytes());
        data.extend_from_slice(&entry.calling_conv.to_le_bytes());
        data.extend_from_slice(&entry.transfer_semantics.to_le_bytes());
        data.extend_from_slice(&entry.address.to_le_bytes());
        for param in &entry.params {
            data.extend_from_slice(&param.marshal_type.to_le_bytes());
            data.extend_from_slice(&param.transfer_type.to_le_bytes());
            data.push(param.is_borrowed as u8);
        }
    }
    Section::new(".Asthra.ffi", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GcEntry {
    pub address: u64,
    pub size: u64,
    pub type_id: u32,
    pub ownership_type: u32,
    pub is_mutable: bool,
}

/// Builds `.Asthra.gc` (magic `AGC\0`).
pub fn build_gc_section(entries: &[GcEntry]) -> Section {
    let mut data = header(*b"AGC\0");
    for entry in entries {
        data.extend_from_slice(&entry.address.to_le_bytes());
        data.extend_from_slice(&entry.size.to_le_bytes());
        data.extend_from_slice(&entry.type_id.to_le_bytes());
        data.extend_from_slice(&entry.ownership_type.to_le_bytes());
        data.push(entry.is_mutable as u8);
    }
    Section::new(".Asthra.gc", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SecurityEntry {
    pub address: u64,
    pub offset: u64,
    pub op_type: u32,
    pub memory_size: u64,
    pub flags: u32,
}

/// Builds `.Asthra.security_meta` (magic `ASEC`).
pub fn build_security_section(entries: &[SecurityEntry]) -> Section {
    let mut data = header(*b"ASEC");
    for entry in entries {
        data.extend_from_slice(&entry.address.to_le_bytes());
        data.extend_from_slice(&entry.offset.to_le_bytes());
        data.extend_from_slice(&entry.op_type.to_le_bytes());
        data.extend_from_slice(&entry.memory_size.to_le_bytes());
        data.extend_from_slice(&entry.flags.to_le_bytes());
    }
    Section::new(".Asthra.security_meta", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PatternArm {
    pub pattern_type: u32,
    pub target_address: u64,
    pub binding_count: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PatternEntry {
    pub address: u64,
    pub strategy: u32,
    pub arm_count: u32,
    pub is_exhaustive: bool,
    pub has_result_patterns: bool,
    pub arms: Vec<PatternArm>,
}

/// Builds `.Asthra.pattern_matching` (magic `APAT`).
pub fn build_pattern_section(entries: &[PatternEntry]) -> Section {
    let mut data = header(*b"APAT");
    for entry in entries {
        data.extend_from_slice(&entry.address.to_le_bytes());
        data.extend_from_slice(&entry.strategy.to_le_bytes());
        data.extend_from_slice(&entry.arm_count.to_le_bytes());
        data.push(entry.is_exhaustive as u8);
        data.push(entry.has_result_patterns as u8);
        for arm in &entry.arms {
            data.extend_from_slice(&arm.pattern_type.to_le_bytes());
            data.extend_from_slice(&arm.target_address.to_le_bytes());
            data.extend_from_slice(&arm.binding_count.to_le_bytes());
        }
    }
    Section::new(".Asthra.pattern_matching", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StringOpEntry {
    pub address: u64,
    pub op_type: u32,
    pub operand_count: u32,
    pub is_deterministic: bool,
    pub needs_allocation: bool,
    pub template_address: u64,
    pub expression_count: u32,
}

/// Builds `.Asthra.string_ops` (magic `ASTR`).
pub fn build_string_ops_section(entries: &[StringOpEntry]) -> Section {
    let mut data = header(*b"ASTR");
    for entry in entries {
        data.extend_from_slice(&entry.address.to_le_bytes());
        data.extend_from_slice(&entry.op_type.to_le_bytes());
        data.extend_from_slice(&entry.operand_count.to_le_bytes());
        data.push(entry.is_deterministic as u8);
        data.push(entry.needs_allocation as u8);
        data.extend_from_slice(&entry.template_address.to_le_bytes());
        data.extend_from_slice(&entry.expression_count.to_le_bytes());
    }
    Section::new(".Asthra.string_ops", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SliceMetaEntry {
    pub address: u64,
    pub op_type: u32,
    pub element_size: u64,
    pub is_mutable: bool,
    pub bounds_checking: bool,
    pub bounds_check_addr: u64,
    pub ffi_conversion: bool,
}

/// Builds `.Asthra.slice_meta` (magic `ASLI`).
pub fn build_slice_meta_section(entries: &[SliceMetaEntry]) -> Section {
    let mut data = header(*b"ASLI");
    for entry in entries {
        data.extend_from_slice(&entry.address.to_le_bytes());
        data.extend_from_slice(&entry.op_type.to_le_bytes());
        data.extend_from_slice(&entry.element_size.to_le_bytes());
        data.push(entry.is_mutable as u8);
        data.push(entry.bounds_checking as u8);
        data.extend_from_slice(&entry.bounds_check_addr.to_le_bytes());
        data.push(entry.ffi_conversion as u8);
    }
    Section::new(".Asthra.slice_meta", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConcurrencyEntry {
    pub address: u64,
    pub function_name: String,
    pub argument_count: u32,
    pub needs_handle: bool,
    pub scheduler_call: u32,
    pub memory_barrier: bool,
    pub atomic_operations: u32,
}

/// Builds `.Asthra.concurrency` (magic `ACON`).
pub fn build_concurrency_section(entries: &[ConcurrencyEntry]) -> Section {
    let mut data = header(*b"ACON");
    for entry in entries {
        data.extend_from_slice(&entry.address.to_le_bytes());
        data.extend_from_slice(&fixed_name(&entry.function_name));
        data.extend_from_slice(&entry.argument_count.to_le_bytes());
        data.push(entry.needs_handle as u8);
        data.extend_from_slice(&entry.scheduler_call.to_le_bytes());
        data.push(entry.memory_barrier as u8);
        data.extend_from_slice(&entry.atomic_operations.to_le_bytes());
    }
    Section::new(".Asthra.concurrency", SectionFlags::ALLOC, 8).with_initial_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffi_magic_matches_spec_literal() {
        assert_eq!(FFI_MAGIC, 0x4146_4649);
    }

    #[test]
    fn gc_section_header_has_magic_and_version_one() {
        let section = build_gc_section(&[]);
        let bytes = section.data.to_vec();
        assert_eq!(&bytes[0..4], b"AGC\0");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);
    }

    #[test]
    fn ffi_section_encodes_one_entry_with_params() {
        let entry = FfiEntry {
            name: "asthra_string_concat".into(),
            param_count: 2,
            variadic_start: -1,
            calling_conv: 0,
            transfer_semantics: 1,
            address: 0x1000,
            params: vec![FfiParam { marshal_type: 0, transfer_type: 0, is_borrowed: true }],
        };
        let section = build_ffi_section(&[entry]);
        assert!(section.data.len() > 8 + 64 + 4 + 4 + 4 + 4 + 8);
    }
}
