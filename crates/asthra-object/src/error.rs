//! Object-file writer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("bad ELF magic: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported ELF class: expected 64-bit, got {0}")]
    WrongClass(u8),

    #[error("machine mismatch: object targets {object}, host/target expects {expected}")]
    MachineMismatch { object: u16, expected: u16 },

    #[error("section `{0}` has misaligned offset {1} for required alignment {2}")]
    Misaligned(String, u64, u64),

    #[error("missing required section `{0}`")]
    MissingSection(&'static str),

    #[error("metadata section `{section}` has bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMetadataMagic {
        section: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("function symbol `{0}` is defined but has a zero address")]
    UndefinedFunctionAddress(String),

    #[error("required runtime entry symbol `{0}` is missing")]
    MissingRuntimeSymbol(&'static str),

    #[error("i/o error writing object file: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal findings from the compatibility/debug-symbol passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectWarning {
    NonCIdentifierSymbol(String),
    NoSystemVAbiFunctions,
    NoDebugSections,
}
