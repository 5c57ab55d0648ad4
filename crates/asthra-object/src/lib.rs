//! Object-File Writer: emits ELF-64 or Mach-O relocatable
//! objects from a shared section/symbol/relocation model, plus the
//! Asthra-specific metadata sections and the validation passes that run
//! over a built object before it is trusted.
//!
//! # Modules
//!
//! - [`section`] -- shared `Section`/`Symbol`/`Relocation` model
//! - [`elf`] -- ELF-64 writer
//! - [`macho`] -- Mach-O writer
//! - [`metadata`] -- `.Asthra.*` metadata section encoders
//! - [`validate`] -- structural / C-compatibility / debug-symbol passes
//! - [`error`] -- `ObjectError`, `ObjectWarning`

pub mod elf;
pub mod error;
pub mod macho;
pub mod metadata;
pub mod section;
pub mod validate;

pub use elf::{ElfMachine, ElfWriter};
pub use error::{ObjectError, ObjectWarning};
pub use macho::{MachOCpu, MachOWriter};
pub use section::{Relocation, Section, SectionFlags, Symbol, SymbolBinding, SymbolType};
