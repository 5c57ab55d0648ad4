//! AST/type-arena error type.

use thiserror::Error;

/// Errors raised while building or querying the typed AST's type arena.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("duplicate type name: {name}")]
    DuplicateTypeName { name: String },

    #[error("unknown type id: {0}")]
    UnknownTypeId(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_type_name_message() {
        let e = CoreError::DuplicateTypeName {
            name: "Foo".to_string(),
        };
        assert_eq!(format!("{e}"), "duplicate type name: Foo");
    }
}
