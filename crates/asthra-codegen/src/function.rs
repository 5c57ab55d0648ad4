//! C4: Function & Top-Level Lowerer.

use inkwell::debug_info::AsDIScope;
use inkwell::values::{BasicValue, FunctionValue};
use inkwell::AddressSpace;

use asthra_ast::{ConstDecl, Expr, ExprKind, FunctionDecl, ImplBlock, TypeDesc};

use crate::context::LoweringContext;
use crate::error::CodegenError;
use crate::expr::lower_expr;
use crate::runtime::declare_lifecycle_hooks;
use crate::types::lower_type;

/// `Struct_instance_method`/`Struct_method` mangling.
pub fn mangle_method(struct_name: &str, method_name: &str) -> String {
    format!("{struct_name}_{method_name}")
}

/// Declares and defines a free function. Returns the `FunctionValue` so
/// `module.rs` can verify it and step 5, delete it from
/// the module if verification fails rather than leaving a malformed
/// definition behind.
pub fn lower_function<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    decl: &FunctionDecl,
    link_name: &str,
) -> Result<FunctionValue<'ctx>, CodegenError> {
    let function = declare_function_signature(ctx, decl, link_name)?;
    define_function_body(ctx, decl, function)?;
    Ok(function)
}

pub(crate) fn declare_function_signature<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    decl: &FunctionDecl,
    link_name: &str,
) -> Result<FunctionValue<'ctx>, CodegenError> {
    if let Some(existing) = ctx.module.get_function(link_name) {
        return Ok(existing);
    }
    let mut param_tys = Vec::with_capacity(decl.params.len());
    for p in &decl.params {
        param_tys.push(lower_type(ctx, p.ty)?.into());
    }
    let fn_type = match ctx.types.get(decl.return_type) {
        Some(TypeDesc::Void) | Some(TypeDesc::Never) => ctx.context.void_type().fn_type(&param_tys, false),
        _ => lower_type(ctx, decl.return_type)?.fn_type(&param_tys, false),
    };
    let function = ctx.module.add_function(link_name, fn_type, None);
    for (i, param) in decl.params.iter().enumerate() {
        function
            .get_nth_param(i as u32)
            .expect("declared parameter count matches signature")
            .set_name(&param.name);
    }
    ctx.remember_function(link_name, function);
    Ok(function)
}

fn define_function_body<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    decl: &FunctionDecl,
    function: FunctionValue<'ctx>,
) -> Result<(), CodegenError> {
    let entry = ctx.context.append_basic_block(function, "entry");
    ctx.builder.position_at_end(entry);
    ctx.current_function = Some(function);
    ctx.current_return_type = Some(decl.return_type);
    ctx.reset_locals();

    if let Some(debug) = &ctx.debug {
        let subprogram = debug.create_function(function, &decl.name, decl.body.stmts.first().map(|s| s.span.line).unwrap_or(1), decl.params.len());
        let _ = subprogram;
    }

    for (i, param) in decl.params.iter().enumerate() {
        let llvm_ty = lower_type(ctx, param.ty)?;
        let slot = ctx
            .builder
            .build_alloca(llvm_ty, &param.name)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        let value = function
            .get_nth_param(i as u32)
            .expect("declared parameter count matches signature");
        ctx.builder
            .build_store(slot, value)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        ctx.bind_local(&param.name, slot, param.ty);

        if let Some(debug) = &ctx.debug {
            if let Some(subprogram) = function.get_subprogram() {
                let di_ty = debug.basic_type(ctx.types, param.ty)?;
                let line = decl.body.stmts.first().map(|s| s.span.line).unwrap_or(1);
                let var = debug.create_parameter_variable(
                    subprogram.as_debug_info_scope(),
                    &param.name,
                    (i + 1) as u32,
                    line,
                    di_ty,
                );
                let block = ctx.builder.get_insert_block().expect("builder has an insert point");
                debug.emit_declare(slot, var, subprogram.as_debug_info_scope(), line, 1, block, &ctx.builder)?;
            }
        }
    }

    let tail_value = lower_body_with_tail(ctx, &decl.body)?;

    // A function whose body ends without an explicit `return` implicitly
    // returns `()`/`void`, a trailing expression's value, or (for `never`)
    // is unreachable: `return`/`match`'s trap arm already terminates any
    // path that actually produces a value.
    if ctx
        .builder
        .get_insert_block()
        .and_then(|b| b.get_terminator())
        .is_none()
    {
        match ctx.types.get(decl.return_type) {
            Some(TypeDesc::Void) | Some(TypeDesc::Unit) => {
                ctx.builder
                    .build_return(None)
                    .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
            }
            Some(TypeDesc::Never) => {
                ctx.builder
                    .build_unreachable()
                    .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
            }
            _ => match tail_value {
                Some(value) => {
                    let coerced = coerce_to_return_type(ctx, value, decl.return_type)?;
                    ctx.builder
                        .build_return(Some(&coerced as &dyn BasicValue))
                        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
                }
                None => {
                    return Err(CodegenError::InvariantViolation {
                        span: decl.body.stmts.last().map(|s| s.span.clone()).unwrap_or_else(asthra_ast::Span::synthetic),
                        message: format!("function '{}' does not return on all paths", decl.name),
                    });
                }
            },
        }
    }

    ctx.current_function = None;
    ctx.current_return_type = None;
    Ok(())
}

/// Lowers a function body, treating a trailing expression-statement with no
/// following `return` as the implicit return value (mirrors the way
/// `unsafe { ... }` expression blocks resolve their value).
fn lower_body_with_tail<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    body: &asthra_ast::Block,
) -> Result<Option<inkwell::values::BasicValueEnum<'ctx>>, CodegenError> {
    ctx.push_scope();
    let mut tail_value = None;
    for (i, stmt) in body.stmts.iter().enumerate() {
        if i + 1 == body.stmts.len() {
            if let asthra_ast::StmtKind::Expr(e) = &stmt.kind {
                tail_value = Some(lower_expr(ctx, e)?);
                continue;
            }
        }
        crate::stmt::lower_stmt(ctx, stmt)?;
    }
    ctx.pop_scope();
    Ok(tail_value)
}

/// Coerces a function's final value to its declared return type, sign- or
/// zero-extending/truncating integers per the return type's signedness.
fn coerce_to_return_type<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    value: inkwell::values::BasicValueEnum<'ctx>,
    return_type: asthra_ast::TypeId,
) -> Result<inkwell::values::BasicValueEnum<'ctx>, CodegenError> {
    let desc = ctx.types.get(return_type).cloned();
    match (value, desc) {
        (inkwell::values::BasicValueEnum::IntValue(i), Some(TypeDesc::Int(kind))) => {
            let dest = ctx.context.custom_width_int_type(kind.bit_width());
            ctx.builder
                .build_int_cast_sign_flag(i, dest, kind.is_signed(), "ret.cast")
                .map(Into::into)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (value, _) => Ok(value),
    }
}

/// Lowers every method in an `impl` block, mangling instance and associated
/// functions alike to `Struct_method`.
pub fn lower_impl_block<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    impl_block: &ImplBlock,
) -> Result<(), CodegenError> {
    for method in &impl_block.methods {
        let link_name = mangle_method(&impl_block.struct_name, &method.function.name);
        lower_function(ctx, &method.function, &link_name)?;
    }
    Ok(())
}

/// Folds a `const` initializer to an LLVM constant and installs it as a
/// global. Only a small constant-expression subset
/// is supported; anything else is `NonFoldableConst`.
pub fn lower_const<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, decl: &ConstDecl) -> Result<(), CodegenError> {
    let value = fold_const(ctx, &decl.init)?;
    let llvm_ty = lower_type(ctx, decl.ty)?;
    let global = ctx.module.add_global(llvm_ty, None, &decl.name);
    global.set_constant(true);
    global.set_initializer(&value);
    Ok(())
}

fn fold_const<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    expr: &Expr,
) -> Result<inkwell::values::BasicValueEnum<'ctx>, CodegenError> {
    match &expr.kind {
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::UnitLiteral => lower_expr(ctx, expr),
        ExprKind::Unary { op, operand } => {
            let inner = fold_const(ctx, operand)?;
            match (op, inner) {
                (asthra_ast::UnaryOp::Neg, inkwell::values::BasicValueEnum::IntValue(i)) => Ok(i.const_neg().into()),
                (asthra_ast::UnaryOp::Neg, inkwell::values::BasicValueEnum::FloatValue(f)) => Ok(f.const_neg().into()),
                (asthra_ast::UnaryOp::Not, inkwell::values::BasicValueEnum::IntValue(i)) => Ok(i.const_not().into()),
                (asthra_ast::UnaryOp::BitNot, inkwell::values::BasicValueEnum::IntValue(i)) => Ok(i.const_not().into()),
                _ => Err(CodegenError::NonFoldableConst {
                    span: expr.span.clone(),
                    message: "unary operator applied to a non-foldable constant operand".to_string(),
                }),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = fold_const(ctx, lhs)?;
            let r = fold_const(ctx, rhs)?;
            fold_const_binary(*op, l, r, expr)
        }
        // A reference to another `const` resolves to that global's already-
        // folded initializer.
        ExprKind::Identifier(name) => {
            let global = ctx.module.get_global(name).ok_or_else(|| CodegenError::UnresolvedIdentifier {
                span: expr.span.clone(),
                name: name.clone(),
            })?;
            global.get_initializer().ok_or_else(|| CodegenError::NonFoldableConst {
                span: expr.span.clone(),
                message: format!("const '{name}' has no initializer to fold"),
            })
        }
        _ => Err(CodegenError::NonFoldableConst {
            span: expr.span.clone(),
            message: "const initializer is not a compile-time constant expression".to_string(),
        }),
    }
}

fn fold_const_binary<'ctx>(
    op: asthra_ast::BinOp,
    l: inkwell::values::BasicValueEnum<'ctx>,
    r: inkwell::values::BasicValueEnum<'ctx>,
    expr: &Expr,
) -> Result<inkwell::values::BasicValueEnum<'ctx>, CodegenError> {
    use asthra_ast::{ArithOp, BinOp};
    match (op, l, r) {
        (BinOp::Arith(arith), inkwell::values::BasicValueEnum::IntValue(a), inkwell::values::BasicValueEnum::IntValue(b)) => {
            let v = match arith {
                ArithOp::Add => a.const_add(b),
                ArithOp::Sub => a.const_sub(b),
                ArithOp::Mul => a.const_mul(b),
                _ => {
                    return Err(CodegenError::NonFoldableConst {
                        span: expr.span.clone(),
                        message: "division/remainder are not folded at compile time".to_string(),
                    })
                }
            };
            Ok(v.into())
        }
        _ => Err(CodegenError::NonFoldableConst {
            span: expr.span.clone(),
            message: "unsupported constant-folding operator/operand combination".to_string(),
        }),
    }
}

/// Generates the C-ABI `main` that calls `asthra_runtime_init_with_args`,
/// invokes the renamed entry point (`asthra_main`), then
/// `asthra_runtime_cleanup`.
pub fn generate_main_wrapper<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    entry: Option<FunctionValue<'ctx>>,
) -> Result<FunctionValue<'ctx>, CodegenError> {
    let entry = entry.ok_or(CodegenError::NoEntryFunction)?;

    let (init, cleanup) = declare_lifecycle_hooks(ctx);

    let i32_ty = ctx.context.i32_type();
    let argv_ty = ctx.context.ptr_type(AddressSpace::default());
    let main_fn_ty = i32_ty.fn_type(&[i32_ty.into(), argv_ty.into()], false);
    let main_fn = ctx.module.add_function("main", main_fn_ty, None);
    let argc = main_fn.get_nth_param(0).unwrap().into_int_value();
    let argv = main_fn.get_nth_param(1).unwrap().into_pointer_value();

    let entry_bb = ctx.context.append_basic_block(main_fn, "entry");
    let init_failed_bb = ctx.context.append_basic_block(main_fn, "init.failed");
    let init_ok_bb = ctx.context.append_basic_block(main_fn, "init.ok");
    ctx.builder.position_at_end(entry_bb);

    let null_config = argv_ty.const_null();
    let init_call = ctx
        .builder
        .build_call(init, &[null_config.into(), argc.into(), argv.into()], "init.status")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    let init_status = init_call
        .try_as_basic_value()
        .left()
        .map(|v| v.into_int_value())
        .unwrap_or_else(|| i32_ty.const_int(0, false));
    let init_succeeded = ctx
        .builder
        .build_int_compare(inkwell::IntPredicate::EQ, init_status, i32_ty.const_int(0, false), "init.ok.cond")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_conditional_branch(init_succeeded, init_ok_bb, init_failed_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(init_failed_bb);
    ctx.builder
        .build_return(Some(&init_status as &dyn BasicValue))
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(init_ok_bb);
    let call_site = ctx
        .builder
        .build_call(entry, &[], "asthra_main.result")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    let exit_code = match call_site.try_as_basic_value().left() {
        Some(v) if v.is_int_value() => v.into_int_value(),
        _ => i32_ty.const_int(0, false),
    };

    ctx.builder
        .build_call(cleanup, &[], "")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    let exit_code_i32 = if exit_code.get_type().get_bit_width() == 32 {
        exit_code
    } else {
        ctx.builder
            .build_int_cast(exit_code, i32_ty, "exit.code")
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?
    };
    ctx.builder
        .build_return(Some(&exit_code_i32 as &dyn BasicValue))
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    Ok(main_fn)
}
