//! Top-level orchestration: walks a [`Module`]'s declarations in order,
//! lowering each to LLVM IR, then verifies the result.

use std::path::Path;

use inkwell::context::Context;
use inkwell::module::Module as InkwellModule;
use inkwell::values::FunctionValue;

use asthra_ast::{DeclKind, Module as AstModule, TypeRegistry};

use crate::context::LoweringContext;
use crate::debug_info::DebugCtx;
use crate::error::CodegenError;
use crate::function::{generate_main_wrapper, lower_const, lower_function, lower_impl_block};

/// The name the user's `main` function is renamed to before the C-ABI
/// wrapper takes over the `main` symbol.
const ENTRY_LINK_NAME: &str = "asthra_main";

pub struct LoweredModule<'ctx> {
    pub module: InkwellModule<'ctx>,
}

/// Lowers an entire compilation unit. The caller owns the LLVM [`Context`]
/// (inkwell's lifetime discipline requires it to outlive everything
/// produced here), matching `lmlang_codegen::compile`
/// call shape.
pub fn lower_module<'ctx>(
    context: &'ctx Context,
    ast_module: &AstModule,
    types: &TypeRegistry,
    enable_debug_info: bool,
    source_path: &Path,
) -> Result<LoweredModule<'ctx>, CodegenError> {
    let llvm_module = context.create_module(&ast_module.name);

    let debug = if enable_debug_info {
        Some(DebugCtx::new(&llvm_module, source_path, "asthra"))
    } else {
        None
    };

    let mut ctx = LoweringContext::new(context, llvm_module, types, debug);

    // Pass 1: declare every function signature up front so forward/mutually
    // recursive calls resolve regardless of declaration order.
    for decl in &ast_module.decls {
        declare_signatures(&mut ctx, &decl.kind)?;
    }

    let mut entry_function: Option<FunctionValue<'ctx>> = None;

    for decl in &ast_module.decls {
        match &decl.kind {
            DeclKind::Function(f) => {
                let link_name = if f.name == "main" { ENTRY_LINK_NAME } else { f.name.as_str() };
                let function = lower_function(&mut ctx, f, link_name)?;
                verify_or_delete(&mut ctx, function);
                if f.name == "main" {
                    entry_function = ctx.module.get_function(ENTRY_LINK_NAME);
                }
            }
            DeclKind::Impl(impl_block) => lower_impl_block(&mut ctx, impl_block)?,
            DeclKind::Const(c) => lower_const(&mut ctx, c)?,
            DeclKind::Extern(_) => { /* declared in pass 1 */ }
            DeclKind::Struct { .. } | DeclKind::Enum { .. } => { /* type-only, no-op */ }
        }
    }

    if entry_function.is_some() {
        let main_fn = generate_main_wrapper(&mut ctx, entry_function)?;
        verify_or_delete(&mut ctx, main_fn);
    }

    if let Some(debug) = &ctx.debug {
        debug.finalize();
    }

    if let Err(message) = ctx.module.verify() {
        return Err(CodegenError::LlvmError(message.to_string()));
    }

    Ok(LoweredModule { module: ctx.module })
}

fn declare_signatures<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    kind: &DeclKind,
) -> Result<(), CodegenError> {
    match kind {
        DeclKind::Function(f) => {
            let link_name = if f.name == "main" { ENTRY_LINK_NAME.to_string() } else { f.name.clone() };
            crate::function::declare_function_signature(ctx, f, &link_name)?;
        }
        DeclKind::Extern(e) => {
            let mut param_tys = Vec::with_capacity(e.params.len());
            for &p in &e.params {
                param_tys.push(crate::types::lower_type(ctx, p)?.into());
            }
            let fn_type = match ctx.types.get(e.return_type) {
                Some(asthra_ast::TypeDesc::Void) | Some(asthra_ast::TypeDesc::Never) => {
                    ctx.context.void_type().fn_type(&param_tys, e.variadic)
                }
                _ => crate::types::lower_type(ctx, e.return_type)?.fn_type(&param_tys, e.variadic),
            };
            let function = ctx.module.add_function(&e.name, fn_type, None);
            ctx.remember_function(&e.name, function);
        }
        DeclKind::Impl(impl_block) => {
            for method in &impl_block.methods {
                let link_name = crate::function::mangle_method(&impl_block.struct_name, &method.function.name);
                let mut param_tys = Vec::with_capacity(method.function.params.len());
                for p in &method.function.params {
                    param_tys.push(crate::types::lower_type(ctx, p.ty)?.into());
                }
                let fn_type = match ctx.types.get(method.function.return_type) {
                    Some(asthra_ast::TypeDesc::Void) | Some(asthra_ast::TypeDesc::Never) => {
                        ctx.context.void_type().fn_type(&param_tys, false)
                    }
                    _ => crate::types::lower_type(ctx, method.function.return_type)?.fn_type(&param_tys, false),
                };
                let function = ctx.module.add_function(&link_name, fn_type, None);
                ctx.remember_function(&link_name, function);
            }
        }
        _ => {}
    }
    Ok(())
}

fn verify_or_delete<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, function: FunctionValue<'ctx>) {
    if !function.verify(false) {
        tracing::warn!(name = %function.get_name().to_string_lossy(), "function failed verification, removing from module");
        unsafe {
            function.delete();
        }
    }
}
