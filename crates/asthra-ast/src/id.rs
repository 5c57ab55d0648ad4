//! Stable ID newtypes for the typed AST and type arena.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `NodeId` cannot be accidentally used where a `TypeId` is
//! expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a declaration within a [`crate::ast::Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclId(pub u32);

/// Identity of a function, used for mangling collisions and call resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decl_id_display() {
        assert_eq!(format!("{}", DeclId(7)), "7");
    }

    #[test]
    fn function_id_display() {
        assert_eq!(format!("{}", FunctionId(3)), "3");
    }

    #[test]
    fn ids_are_distinct_types() {
        let d = DeclId(1);
        let f = FunctionId(1);
        assert_eq!(d.0, f.0);
    }

    #[test]
    fn serde_roundtrip() {
        let d = DeclId(42);
        let json = serde_json::to_string(&d).unwrap();
        let back: DeclId = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
