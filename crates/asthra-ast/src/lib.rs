//! The typed AST and type-descriptor data model that the rest of the
//! workspace lowers from.
//!
//! # Modules
//!
//! - [`id`] -- stable ID newtypes
//! - [`span`] -- source location
//! - [`ty`] -- type descriptors and the type registry
//! - [`ops`] -- operator vocabulary
//! - [`ast`] -- the recursive expression/statement/declaration tree
//! - [`error`] -- error type for type-arena operations

pub mod ast;
pub mod error;
pub mod id;
pub mod ops;
pub mod span;
pub mod ty;

pub use ast::*;
pub use error::CoreError;
pub use id::{DeclId, FunctionId};
pub use ops::*;
pub use span::Span;
pub use ty::{EnumDesc, IntKind, StructDesc, TypeDesc, TypeId, TypeRegistry};
