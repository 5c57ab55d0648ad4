//! LLVM lowering engine.
//!
//! Lowers a typed [`asthra_ast::Module`] to an LLVM IR module. Callers own
//! the `inkwell::context::Context` (LLVM's lifetime rules require it to
//! outlive everything produced from it), matching `lmlang_codegen::compile`'s
//! entry-point shape.
//!
//! # Modules
//!
//! - [`types`] -- C1, type descriptor to LLVM type mapping
//! - [`context`] -- shared lowering state (locals, loop stack, type cache)
//! - [`expr`] -- C2, expression lowering
//! - [`stmt`] -- C3, statement lowering
//! - [`function`] -- C4, function/const/impl-block lowering and mangling
//! - [`pattern`] -- C5 (match half)
//! - [`for_loop`] -- C5 (for half)
//! - [`runtime`] -- predeclared runtime builtins
//! - [`debug_info`] -- DWARF emission
//! - [`module`] -- top-level orchestration and verification

pub mod context;
pub mod debug_info;
pub mod error;
pub mod expr;
pub mod for_loop;
pub mod function;
pub mod module;
pub mod pattern;
pub mod runtime;
pub mod stmt;
pub mod types;

pub use error::CodegenError;
pub use module::{lower_module, LoweredModule};

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use std::path::Path;

    use asthra_ast::{
        Block, Decl, DeclKind, Expr, ExprKind, FunctionDecl, Module as AstModule, Param, Span,
        Stmt, StmtKind, TypeId, TypeRegistry,
    };

    fn span() -> Span {
        Span::new("t.asthra", 1, 1)
    }

    fn return_42() -> AstModule {
        let body = Block {
            stmts: vec![Stmt {
                kind: StmtKind::Return(Some(Expr {
                    kind: ExprKind::IntLiteral(42),
                    ty: Some(TypeId::I32),
                    span: span(),
                })),
                span: span(),
            }],
        };
        AstModule {
            name: "t".to_string(),
            decls: vec![Decl {
                kind: DeclKind::Function(FunctionDecl {
                    name: "answer".to_string(),
                    params: vec![],
                    return_type: TypeId::I32,
                    body,
                }),
                span: span(),
            }],
        }
    }

    #[test]
    fn lowers_a_trivial_function_and_verifies() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let ast_module = return_42();
        let result = lower_module(&context, &ast_module, &registry, false, Path::new("t.asthra"));
        assert!(result.is_ok());
        let ir = result.unwrap().module.print_to_string().to_string();
        assert!(ir.contains("define i32 @answer"));
        assert!(ir.contains("ret i32 42"));
    }

    #[test]
    fn main_function_gets_renamed_and_wrapped() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let body = Block {
            stmts: vec![Stmt {
                kind: StmtKind::Return(Some(Expr {
                    kind: ExprKind::IntLiteral(0),
                    ty: Some(TypeId::I32),
                    span: span(),
                })),
                span: span(),
            }],
        };
        let ast_module = AstModule {
            name: "t".to_string(),
            decls: vec![Decl {
                kind: DeclKind::Function(FunctionDecl {
                    name: "main".to_string(),
                    params: vec![],
                    return_type: TypeId::I32,
                    body,
                }),
                span: span(),
            }],
        };
        let lowered = lower_module(&context, &ast_module, &registry, false, Path::new("t.asthra")).unwrap();
        let ir = lowered.module.print_to_string().to_string();
        assert!(ir.contains("define i32 @asthra_main"));
        assert!(ir.contains("define i32 @main"));
        assert!(ir.contains("asthra_runtime_init_with_args"));
        assert!(ir.contains("asthra_runtime_cleanup"));
    }

    #[test]
    fn function_with_param_lowers_alloca_store() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let body = Block {
            stmts: vec![Stmt {
                kind: StmtKind::Return(Some(Expr {
                    kind: ExprKind::Identifier("n".to_string()),
                    ty: Some(TypeId::I32),
                    span: span(),
                })),
                span: span(),
            }],
        };
        let ast_module = AstModule {
            name: "t".to_string(),
            decls: vec![Decl {
                kind: DeclKind::Function(FunctionDecl {
                    name: "identity".to_string(),
                    params: vec![Param {
                        name: "n".to_string(),
                        ty: TypeId::I32,
                    }],
                    return_type: TypeId::I32,
                    body,
                }),
                span: span(),
            }],
        };
        let lowered = lower_module(&context, &ast_module, &registry, false, Path::new("t.asthra")).unwrap();
        let ir = lowered.module.print_to_string().to_string();
        assert!(ir.contains("alloca i32"));
        assert!(ir.contains("store i32"));
    }
}
