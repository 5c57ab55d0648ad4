//! Structural, C-compatibility, and debug-symbol validation passes.

use crate::error::{ObjectError, ObjectWarning};
use crate::section::{Section, Symbol, SymbolBinding, SymbolType};

const REQUIRED_SECTIONS: &[&str] =
    &[".text", ".data", ".bss", ".rodata", ".symtab", ".strtab", ".shstrtab", ".rela.text"];

/// Required at link time.
const REQUIRED_RUNTIME_SYMBOL: &str = "asthra_runtime_init_with_args";

/// Structural checks: magic, class, machine, alignment, required sections
/// present, metadata magics match, defined function symbols have non-zero
/// addresses. Any failure here fails the write.
pub fn validate_structure(
    magic: &[u8; 4],
    class: u8,
    machine: u16,
    expected_machine: u16,
    sections: &[Section],
    symbols: &[Symbol],
) -> Result<(), ObjectError> {
    if *magic != crate::elf::ELFMAG {
        return Err(ObjectError::BadMagic(*magic));
    }
    if class != 2 {
        return Err(ObjectError::WrongClass(class));
    }
    if machine != expected_machine {
        return Err(ObjectError::MachineMismatch { object: machine, expected: expected_machine });
    }
    for section in sections {
        if section.entsize > 0 && section.data.len() as u64 % section.entsize != 0 {
            return Err(ObjectError::Misaligned(section.name.clone(), section.data.len() as u64, section.entsize));
        }
    }
    for required in REQUIRED_SECTIONS {
        if !sections.iter().any(|s| s.name == *required) {
            return Err(ObjectError::MissingSection(required));
        }
    }
    for symbol in symbols {
        if symbol.is_defined() && symbol.sym_type == SymbolType::Func && symbol.value == 0 {
            return Err(ObjectError::UndefinedFunctionAddress(symbol.name.clone()));
        }
    }
    Ok(())
}

/// C-compatibility pass: warns on non-C-identifier symbol names and on the
/// absence of any System V ABI (global, C-shaped) function; errors if the
/// runtime init symbol is missing entirely.
pub fn validate_c_compatibility(symbols: &[Symbol]) -> Result<Vec<ObjectWarning>, ObjectError> {
    let mut warnings = Vec::new();
    let mut saw_sysv_function = false;

    for symbol in symbols {
        if !is_c_identifier(&symbol.name) {
            warnings.push(ObjectWarning::NonCIdentifierSymbol(symbol.name.clone()));
        }
        if symbol.sym_type == SymbolType::Func && symbol.binding == SymbolBinding::Global {
            saw_sysv_function = true;
        }
    }
    if !saw_sysv_function {
        warnings.push(ObjectWarning::NoSystemVAbiFunctions);
    }
    if !symbols.iter().any(|s| s.name == REQUIRED_RUNTIME_SYMBOL) {
        return Err(ObjectError::MissingRuntimeSymbol(REQUIRED_RUNTIME_SYMBOL));
    }
    Ok(warnings)
}

/// Debug-symbol pass: warns if no `.debug_*` sections exist.
pub fn validate_debug_symbols(sections: &[Section]) -> Option<ObjectWarning> {
    if sections.iter().any(|s| s.name.starts_with(".debug_")) {
        None
    } else {
        Some(ObjectWarning::NoDebugSections)
    }
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionFlags;

    fn func_symbol(name: &str, value: u64, binding: SymbolBinding) -> Symbol {
        Symbol { name: name.into(), value, size: 0, section_index: 1, binding, sym_type: SymbolType::Func }
    }

    #[test]
    fn missing_required_section_is_rejected() {
        let sections = vec![Section::new(".text", SectionFlags::ALLOC, 16)];
        let result = validate_structure(&crate::elf::ELFMAG, 2, 62, 62, &sections, &[]);
        assert!(matches!(result, Err(ObjectError::MissingSection(".data"))));
    }

    #[test]
    fn zero_address_defined_function_is_rejected() {
        let sections = minimal_sections();
        let symbols = vec![func_symbol("foo", 0, SymbolBinding::Global)];
        let result = validate_structure(&crate::elf::ELFMAG, 2, 62, 62, &sections, &symbols);
        assert!(matches!(result, Err(ObjectError::UndefinedFunctionAddress(_))));
    }

    #[test]
    fn missing_runtime_init_symbol_is_fatal() {
        let symbols = vec![func_symbol("main", 0x1000, SymbolBinding::Global)];
        let result = validate_c_compatibility(&symbols);
        assert!(matches!(result, Err(ObjectError::MissingRuntimeSymbol(_))));
    }

    #[test]
    fn non_c_identifier_symbol_is_a_warning_not_an_error() {
        let symbols = vec![
            func_symbol("asthra_runtime_init_with_args", 0x2000, SymbolBinding::Global),
            func_symbol("weird.name$here", 0x3000, SymbolBinding::Global),
        ];
        let warnings = validate_c_compatibility(&symbols).unwrap();
        assert!(warnings.contains(&ObjectWarning::NonCIdentifierSymbol("weird.name$here".into())));
    }

    fn minimal_sections() -> Vec<Section> {
        REQUIRED_SECTIONS.iter().map(|name| Section::new(*name, SectionFlags::empty(), 1)).collect()
    }
}
