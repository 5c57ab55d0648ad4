//! The type-descriptor system.
//!
//! Every type is registered once in a [`TypeRegistry`] and referenced
//! elsewhere by [`TypeId`], giving `O(1)` nominal identity comparison —
//! the same design as `lmlang-core`'s `TypeRegistry` (`type_id.rs`),
//! extended to cover wide integer widths, slices, tuples, `Option`, and
//! `Result`.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Unique identifier for a type in the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Integer width/signedness pairs the source language exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    Isize,
    Usize,
}

impl IntKind {
    /// Bit width used for the corresponding LLVM integer type. `Isize`/
    /// `Usize` are fixed at 64 bits.
    pub fn bit_width(self) -> u32 {
        match self {
            IntKind::I8 | IntKind::U8 => 8,
            IntKind::I16 | IntKind::U16 => 16,
            IntKind::I32 | IntKind::U32 => 32,
            IntKind::I64 | IntKind::U64 => 64,
            IntKind::I128 | IntKind::U128 => 128,
            IntKind::Isize | IntKind::Usize => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntKind::I8
                | IntKind::I16
                | IntKind::I32
                | IntKind::I64
                | IntKind::I128
                | IntKind::Isize
        )
    }
}

/// A type descriptor, as resolved and attached to AST nodes by the (external)
/// semantic analyzer. Mirrors tagged sum exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDesc {
    Int(IntKind),
    F32,
    F64,
    Bool,
    String,
    Char,
    Void,
    Never,
    Unit,
    Pointer {
        pointee: TypeId,
        mutable: bool,
    },
    Slice {
        element: TypeId,
    },
    Array {
        element: TypeId,
        size: u64,
    },
    Struct(StructDesc),
    Enum(EnumDesc),
    Tuple {
        elements: Vec<TypeId>,
    },
    Option {
        value_type: TypeId,
    },
    Result {
        ok_type: TypeId,
        err_type: TypeId,
    },
    Function {
        params: Vec<TypeId>,
        return_type: TypeId,
    },
}

/// Named struct definition. Field order is preserved (`IndexMap`), matching
/// declared-field order: a struct literal's fields are emitted in the order
/// they were declared, and each field's index equals that declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDesc {
    pub name: String,
    pub fields: IndexMap<String, TypeId>,
    pub packed: bool,
}

impl StructDesc {
    /// `O(fields)` lookup by name design note ("field
    /// counts are small").
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    pub fn field_type(&self, name: &str) -> Option<TypeId> {
        self.fields.get(name).copied()
    }
}

/// Named enum definition. Variant order gives the tag value (index 0.. in
/// declaration order) "32-bit tag".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDesc {
    pub name: String,
    pub variants: IndexMap<String, Option<TypeId>>,
}

impl EnumDesc {
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.get_index_of(name)
    }

    pub fn variant_payload(&self, name: &str) -> Option<TypeId> {
        self.variants.get(name).copied().flatten()
    }
}

/// Registry of all types in a compilation unit, providing nominal identity
/// via [`TypeId`]. Pre-registers the primitive types on construction, the
/// same as `TypeRegistry::new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: Vec<TypeDesc>,
    names: HashMap<String, TypeId>,
    next_id: u32,
}

macro_rules! builtin_ids {
    ($($name:ident = $idx:expr),* $(,)?) => {
        impl TypeId {
            $(pub const $name: TypeId = TypeId($idx);)*
        }
    };
}

builtin_ids! {
    I8 = 0, I16 = 1, I32 = 2, I64 = 3, I128 = 4,
    U8 = 5, U16 = 6, U32 = 7, U64 = 8, U128 = 9,
    ISIZE = 10, USIZE = 11,
    F32 = 12, F64 = 13,
    BOOL = 14, STRING = 15, CHAR = 16,
    VOID = 17, NEVER = 18, UNIT = 19,
}

impl TypeRegistry {
    const BUILTIN_COUNT: u32 = 20;

    pub fn new() -> Self {
        let types = vec![
            TypeDesc::Int(IntKind::I8),
            TypeDesc::Int(IntKind::I16),
            TypeDesc::Int(IntKind::I32),
            TypeDesc::Int(IntKind::I64),
            TypeDesc::Int(IntKind::I128),
            TypeDesc::Int(IntKind::U8),
            TypeDesc::Int(IntKind::U16),
            TypeDesc::Int(IntKind::U32),
            TypeDesc::Int(IntKind::U64),
            TypeDesc::Int(IntKind::U128),
            TypeDesc::Int(IntKind::Isize),
            TypeDesc::Int(IntKind::Usize),
            TypeDesc::F32,
            TypeDesc::F64,
            TypeDesc::Bool,
            TypeDesc::String,
            TypeDesc::Char,
            TypeDesc::Void,
            TypeDesc::Never,
            TypeDesc::Unit,
        ];
        TypeRegistry {
            types,
            names: HashMap::new(),
            next_id: Self::BUILTIN_COUNT,
        }
    }

    pub fn register(&mut self, ty: TypeDesc) -> TypeId {
        let id = TypeId(self.next_id);
        self.types.push(ty);
        self.next_id += 1;
        id
    }

    pub fn register_named(&mut self, name: &str, ty: TypeDesc) -> Result<TypeId, CoreError> {
        if self.names.contains_key(name) {
            return Err(CoreError::DuplicateTypeName {
                name: name.to_string(),
            });
        }
        let id = self.register(ty);
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDesc> {
        self.types.get(id.0 as usize)
    }

    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_count_matches_constructor() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.types.len(), TypeRegistry::BUILTIN_COUNT as usize);
        assert_eq!(reg.next_id, TypeRegistry::BUILTIN_COUNT);
    }

    #[test]
    fn builtin_ids_resolve_to_correct_descs() {
        let reg = TypeRegistry::new();
        assert!(matches!(reg.get(TypeId::I32), Some(TypeDesc::Int(IntKind::I32))));
        assert!(matches!(reg.get(TypeId::USIZE), Some(TypeDesc::Int(IntKind::Usize))));
        assert!(matches!(reg.get(TypeId::BOOL), Some(TypeDesc::Bool)));
        assert!(matches!(reg.get(TypeId::UNIT), Some(TypeDesc::Unit)));
        assert!(matches!(reg.get(TypeId::NEVER), Some(TypeDesc::Never)));
    }

    #[test]
    fn int_kind_bit_widths() {
        assert_eq!(IntKind::I8.bit_width(), 8);
        assert_eq!(IntKind::U64.bit_width(), 64);
        assert_eq!(IntKind::Isize.bit_width(), 64);
        assert_eq!(IntKind::I128.bit_width(), 128);
    }

    #[test]
    fn int_kind_signedness() {
        assert!(IntKind::I32.is_signed());
        assert!(!IntKind::U32.is_signed());
        assert!(IntKind::Isize.is_signed());
        assert!(!IntKind::Usize.is_signed());
    }

    #[test]
    fn register_returns_unique_ids_after_builtins() {
        let mut reg = TypeRegistry::new();
        let id1 = reg.register(TypeDesc::Array {
            element: TypeId::I32,
            size: 4,
        });
        assert_eq!(id1, TypeId(TypeRegistry::BUILTIN_COUNT));
    }

    #[test]
    fn register_named_rejects_duplicates() {
        let mut reg = TypeRegistry::new();
        reg.register_named("Point", TypeDesc::Unit).unwrap();
        let err = reg.register_named("Point", TypeDesc::Unit).unwrap_err();
        match err {
            CoreError::DuplicateTypeName { name } => assert_eq!(name, "Point"),
            _ => panic!("wrong error variant"),
        }
    }

    #[test]
    fn struct_field_index_matches_declared_order() {
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), TypeId::F64);
        fields.insert("y".to_string(), TypeId::F64);
        let s = StructDesc {
            name: "Point".to_string(),
            fields,
            packed: false,
        };
        assert_eq!(s.field_index("x"), Some(0));
        assert_eq!(s.field_index("y"), Some(1));
        assert_eq!(s.field_index("z"), None);
    }

    #[test]
    fn enum_variant_index_matches_declared_order() {
        let mut variants = IndexMap::new();
        variants.insert("North".to_string(), None);
        variants.insert("South".to_string(), None);
        let e = EnumDesc {
            name: "Dir".to_string(),
            variants,
        };
        assert_eq!(e.variant_index("North"), Some(0));
        assert_eq!(e.variant_index("South"), Some(1));
    }

    #[test]
    fn serde_roundtrip() {
        let mut reg = TypeRegistry::new();
        reg.register_named("Test", TypeDesc::Unit).unwrap();
        let json = serde_json::to_string(&reg).unwrap();
        let back: TypeRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.types.len(), reg.types.len());
        assert_eq!(back.get_by_name("Test"), Some(TypeId(TypeRegistry::BUILTIN_COUNT)));
    }
}
