//! The typed AST input contract.
//!
//! Unlike flat computational-graph IR (`lmlang-core::graph`),
//! this is a conventional recursive tree: each node owns its children
//! inline. `if`/`match`/`for`/`block` all nest their sub-statements
//! directly, and the semantic analyzer that produces this tree (out of
//! scope here) has no reason to flatten it into a dataflow graph the way
//! agent-oriented IR does.

use crate::span::Span;
use crate::ty::TypeId;
use crate::ops::{BinOp, UnaryOp};

/// A full compilation unit: the declaration list walked by C4 plus the type arena all type descriptors are interned in.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Module {
    pub name: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum DeclKind {
    Function(FunctionDecl),
    Impl(ImplBlock),
    Const(ConstDecl),
    /// Struct type declaration. The shape itself was already interned into
    /// the type registry by the semantic analyzer; this node exists only so
    /// the core accepts the variant, and is a no-op to lower.
    Struct { name: String },
    /// Enum type declaration, no-op to lower for the same reason.
    Enum { name: String },
    Extern(ExternDecl),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeId,
    pub body: Block,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

/// An `impl` block; each method is mangled relative to
/// `struct_name`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImplBlock {
    pub struct_name: String,
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MethodDecl {
    pub function: FunctionDecl,
    /// `true` for instance methods (implicit `self` is the first param,
    /// already reflected in `function.params`); `false` for associated
    /// (`Type::fn`) functions.
    pub is_instance: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub ty: TypeId,
    pub init: Expr,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExternDecl {
    pub name: String,
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
    pub variadic: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StmtKind {
    Let {
        name: String,
        ty: Option<TypeId>,
        init: Option<Expr>,
    },
    Assign {
        target: LValue,
        value: Expr,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    Block(Block),
    Expr(Expr),
    Break,
    Continue,
    Return(Option<Expr>),
    Match {
        subject: Expr,
        arms: Vec<MatchArm>,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Block,
    },
    /// Fire-and-forget call.
    Spawn(Expr),
    /// `spawn` bound to a handle.
    SpawnWithHandle {
        handle: String,
        call: Expr,
    },
    /// `unsafe { ... }` used as a statement.
    Unsafe(Block),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum LValue {
    Ident(String),
    Field { base: Box<Expr>, field: String },
    Index { base: Box<Expr>, index: Box<Expr> },
}

/// An expression node. `ty` is the resolved type descriptor the semantic
/// analyzer attached, or `None` when only a base-type token is available.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<TypeId>,
    pub span: Span,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ExprKind {
    IntLiteral(i128),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    CharLiteral(char),
    UnitLiteral,
    TupleLiteral(Vec<Expr>),
    ArrayLiteral(Vec<Expr>),
    StructLiteral {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        target: TypeId,
    },
    Field {
        base: Box<Expr>,
        field: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        base: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
    },
    Await {
        handle: Box<Expr>,
    },
    /// `unsafe { ... }` used as an expression; value is the last
    /// expression-statement in the block.
    Unsafe(Block),
    /// `sizeof T` — the operand is a type, not a value.
    SizeOf(TypeId),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Callee {
    /// Plain function call by name.
    Function(String),
    /// `Type::fn(args)`, mangled to `Type_fn`.
    Associated { type_name: String, method: String },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    Literal(LiteralPattern),
    EnumVariant {
        enum_name: String,
        variant: String,
        binding: Option<String>,
    },
    Wildcard,
    Identifier(String),
    /// Reserved; lowering must report "not yet implemented".
    Struct,
    /// Reserved; lowering must report "not yet implemented".
    Tuple,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum LiteralPattern {
    Int(i128),
    Float(f64),
    Str(String),
    Bool(bool),
    Char(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn dummy_span() -> Span {
        Span::new("t.asthra", 1, 1)
    }

    #[test]
    fn build_fibonacci_module() {
        // fn fib(n: i32) -> i32 { if n < 2 { return n; } return fib(n-1)+fib(n-2); }
        let n_ident = Expr {
            kind: ExprKind::Identifier("n".to_string()),
            ty: Some(TypeId::I32),
            span: dummy_span(),
        };
        let two = Expr {
            kind: ExprKind::IntLiteral(2),
            ty: Some(TypeId::I32),
            span: dummy_span(),
        };
        let cond = Expr {
            kind: ExprKind::Binary {
                op: BinOp::Cmp(crate::ops::CmpOp::Lt),
                lhs: Box::new(n_ident.clone()),
                rhs: Box::new(two),
            },
            ty: Some(TypeId::BOOL),
            span: dummy_span(),
        };
        let if_stmt = Stmt {
            kind: StmtKind::If {
                cond,
                then_block: Block {
                    stmts: vec![Stmt {
                        kind: StmtKind::Return(Some(n_ident)),
                        span: dummy_span(),
                    }],
                },
                else_block: None,
            },
            span: dummy_span(),
        };
        let func = FunctionDecl {
            name: "fib".to_string(),
            params: vec![Param {
                name: "n".to_string(),
                ty: TypeId::I32,
            }],
            return_type: TypeId::I32,
            body: Block {
                stmts: vec![if_stmt],
            },
        };
        let module = Module {
            name: "test".to_string(),
            decls: vec![Decl {
                kind: DeclKind::Function(func),
                span: dummy_span(),
            }],
        };
        assert_eq!(module.decls.len(), 1);
    }

    #[test]
    fn serde_roundtrip_module() {
        let module = Module {
            name: "m".to_string(),
            decls: vec![Decl {
                kind: DeclKind::Struct {
                    name: "Point".to_string(),
                },
                span: dummy_span(),
            }],
        };
        let json = serde_json::to_string(&module).unwrap();
        let back: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(back.decls.len(), 1);
    }

    #[test]
    fn reserved_patterns_distinguished_from_implemented() {
        let patterns = vec![
            Pattern::Wildcard,
            Pattern::Identifier("x".to_string()),
            Pattern::Struct,
            Pattern::Tuple,
        ];
        assert!(matches!(patterns[2], Pattern::Struct));
        assert!(matches!(patterns[3], Pattern::Tuple));
    }
}
