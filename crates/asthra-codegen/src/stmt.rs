//! C3: Statement Lowerer.

use inkwell::debug_info::AsDIScope;
use inkwell::values::BasicValue;

use asthra_ast::{Block, LValue, Stmt, StmtKind};

use crate::context::{LoopTargets, LoweringContext};
use crate::error::CodegenError;
use crate::expr::{lower_expr, lvalue_ptr_of_expr};
use crate::for_loop::lower_for;
use crate::pattern::lower_match;
use crate::types::lower_type;

/// Lowers a single statement. Control-flow statements that terminate the
/// current block (`return`/`break`/`continue`) leave the builder positioned
/// at a fresh unreachable block so any statements textually following them
/// in the same block lower without a "builder not positioned" failure,
/// the same pattern `lmlang_codegen::statement` follows for its terminal
/// nodes.
pub fn lower_stmt<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, stmt: &Stmt) -> Result<(), CodegenError> {
    match &stmt.kind {
        StmtKind::Let { name, ty, init } => lower_let(ctx, name, *ty, init.as_ref(), stmt),
        StmtKind::Assign { target, value } => lower_assign(ctx, target, value),
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => lower_if(ctx, cond, then_block, else_block.as_ref()),
        StmtKind::Block(block) => lower_block(ctx, block),
        StmtKind::Expr(e) => {
            lower_expr(ctx, e)?;
            Ok(())
        }
        StmtKind::Break => lower_break(ctx, stmt),
        StmtKind::Continue => lower_continue(ctx, stmt),
        StmtKind::Return(value) => lower_return(ctx, value.as_ref()),
        StmtKind::Match { subject, arms } => lower_match(ctx, subject, arms),
        StmtKind::For {
            binding,
            iterable,
            body,
        } => lower_for(ctx, binding, iterable, body),
        StmtKind::Spawn(call) => lower_spawn(ctx, call, None),
        StmtKind::SpawnWithHandle { handle, call } => lower_spawn(ctx, call, Some(handle)),
        StmtKind::Unsafe(block) => lower_block(ctx, block),
    }
}

/// Lowers every statement in a block within a fresh lexical scope.
pub fn lower_block<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, block: &Block) -> Result<(), CodegenError> {
    ctx.push_scope();
    for stmt in &block.stmts {
        lower_stmt(ctx, stmt)?;
    }
    ctx.pop_scope();
    Ok(())
}

fn lower_let<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    name: &str,
    declared_ty: Option<asthra_ast::TypeId>,
    init: Option<&asthra_ast::Expr>,
    stmt: &Stmt,
) -> Result<(), CodegenError> {
    let ty = declared_ty
        .or_else(|| init.and_then(|e| e.ty))
        .ok_or_else(|| CodegenError::MissingType {
            span: stmt.span.clone(),
            message: format!("'let {name}' has no declared or inferred type"),
        })?;
    let llvm_ty = lower_type(ctx, ty)?;
    let slot = ctx
        .builder
        .build_alloca(llvm_ty, name)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    if let Some(init_expr) = init {
        let value = lower_expr(ctx, init_expr)?;
        ctx.builder
            .build_store(slot, value)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    }
    ctx.bind_local(name, slot, ty);

    // Emit `llvm.dbg.declare` for the new local immediately after its
    // `alloca`, once debug info is enabled.
    if let Some(current_function) = ctx.current_function {
        if let (Some(debug), Some(subprogram)) = (
            ctx.debug.as_ref().map(|d| d as *const _),
            current_function.get_subprogram(),
        ) {
            let debug = unsafe { &*debug };
            let di_ty = debug.basic_type(ctx.types, ty)?;
            let line = stmt.span.line;
            let var = debug.create_auto_variable(subprogram.as_debug_info_scope(), name, line, di_ty);
            let block = ctx.builder.get_insert_block().expect("builder has an insert point");
            debug.emit_declare(
                slot,
                var,
                subprogram.as_debug_info_scope(),
                line,
                stmt.span.column,
                block,
                &ctx.builder,
            )?;
        }
    }
    Ok(())
}

fn lower_assign<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    target: &LValue,
    value: &asthra_ast::Expr,
) -> Result<(), CodegenError> {
    let ptr = match target {
        LValue::Ident(name) => ctx
            .lookup_local(name)
            .map(|(ptr, _)| ptr)
            .or_else(|| ctx.module.get_global(name).map(|g| g.as_pointer_value()))
            .ok_or_else(|| CodegenError::UnresolvedIdentifier {
                span: value.span.clone(),
                name: name.clone(),
            })?,
        LValue::Field { base, field } => {
            let synthetic = asthra_ast::Expr {
                kind: asthra_ast::ExprKind::Field {
                    base: base.clone(),
                    field: field.clone(),
                },
                ty: value.ty,
                span: value.span.clone(),
            };
            lvalue_ptr_of_expr(ctx, &synthetic)?
        }
        LValue::Index { base, index } => {
            let synthetic = asthra_ast::Expr {
                kind: asthra_ast::ExprKind::Index {
                    base: base.clone(),
                    index: index.clone(),
                },
                ty: value.ty,
                span: value.span.clone(),
            };
            lvalue_ptr_of_expr(ctx, &synthetic)?
        }
    };
    let v = lower_expr(ctx, value)?;
    ctx.builder
        .build_store(ptr, v)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    Ok(())
}

fn lower_if<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    cond: &asthra_ast::Expr,
    then_block: &Block,
    else_block: Option<&Block>,
) -> Result<(), CodegenError> {
    let function = current_function(ctx, &cond.span)?;
    let cond_val = lower_expr(ctx, cond)?.into_int_value();

    let then_bb = ctx.context.append_basic_block(function, "if.then");
    let else_bb = ctx.context.append_basic_block(function, "if.else");
    let merge_bb = ctx.context.append_basic_block(function, "if.merge");

    ctx.builder
        .build_conditional_branch(cond_val, then_bb, else_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(then_bb);
    lower_block(ctx, then_block)?;
    if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
        ctx.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    }

    ctx.builder.position_at_end(else_bb);
    if let Some(else_block) = else_block {
        lower_block(ctx, else_block)?;
    }
    if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
        ctx.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    }

    ctx.builder.position_at_end(merge_bb);
    Ok(())
}

fn lower_break<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, stmt: &Stmt) -> Result<(), CodegenError> {
    let targets = ctx.current_loop().ok_or_else(|| CodegenError::OutsideLoop {
        span: stmt.span.clone(),
        keyword: "break",
    })?;
    ctx.builder
        .build_unconditional_branch(targets.break_target)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    position_unreachable(ctx);
    Ok(())
}

fn lower_continue<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, stmt: &Stmt) -> Result<(), CodegenError> {
    let targets = ctx.current_loop().ok_or_else(|| CodegenError::OutsideLoop {
        span: stmt.span.clone(),
        keyword: "continue",
    })?;
    ctx.builder
        .build_unconditional_branch(targets.continue_target)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    position_unreachable(ctx);
    Ok(())
}

fn lower_return<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    value: Option<&asthra_ast::Expr>,
) -> Result<(), CodegenError> {
    let return_desc = ctx.current_return_type.and_then(|id| ctx.types.get(id)).cloned();
    match value {
        // `return ();` out of a `void`-returning function is `ret void`,
        // not a type-mismatched `ret {}`.
        Some(e)
            if matches!(e.kind, asthra_ast::ExprKind::UnitLiteral)
                && matches!(return_desc, Some(asthra_ast::TypeDesc::Void)) =>
        {
            ctx.builder
                .build_return(None)
                .map_err(|err| CodegenError::LlvmError(err.to_string()))?;
        }
        Some(e) => {
            let v = lower_expr(ctx, e)?;
            let v = coerce_return_value(ctx, v, return_desc);
            ctx.builder
                .build_return(Some(&v.as_basic_value_enum() as &dyn BasicValue))
                .map_err(|err| CodegenError::LlvmError(err.to_string()))?;
        }
        None => {
            ctx.builder
                .build_return(None)
                .map_err(|err| CodegenError::LlvmError(err.to_string()))?;
        }
    }
    position_unreachable(ctx);
    Ok(())
}

/// Sign- or zero-extends/truncates an integer return value to the
/// function's declared return width, per the return type's signedness.
fn coerce_return_value<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    value: inkwell::values::BasicValueEnum<'ctx>,
    return_desc: Option<asthra_ast::TypeDesc>,
) -> inkwell::values::BasicValueEnum<'ctx> {
    match (value, return_desc) {
        (inkwell::values::BasicValueEnum::IntValue(i), Some(asthra_ast::TypeDesc::Int(kind))) => {
            let dest = ctx.context.custom_width_int_type(kind.bit_width());
            match ctx.builder.build_int_cast_sign_flag(i, dest, kind.is_signed(), "ret.cast") {
                Ok(v) => v.into(),
                Err(_) => i.into(),
            }
        }
        (value, _) => value,
    }
}

fn lower_spawn<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    call: &asthra_ast::Expr,
    handle_name: Option<&str>,
) -> Result<(), CodegenError> {
    // The call is not executed inline; it's handed to the runtime scheduler,
    // which returns a task handle. A bare `spawn` discards the handle;
    // `spawn x := f()` binds it.
    let handle_val = lower_expr(ctx, call)?;
    if let Some(name) = handle_name {
        let handle_ty = call.ty.ok_or_else(|| CodegenError::MissingType {
            span: call.span.clone(),
            message: "spawned call missing resolved type for its handle".to_string(),
        })?;
        let llvm_ty = lower_type(ctx, handle_ty)?;
        let slot = ctx
            .builder
            .build_alloca(llvm_ty, name)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        ctx.builder
            .build_store(slot, handle_val)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        ctx.bind_local(name, slot, handle_ty);
    }
    Ok(())
}

fn current_function<'ctx>(
    ctx: &LoweringContext<'ctx, '_>,
    span: &asthra_ast::Span,
) -> Result<inkwell::values::FunctionValue<'ctx>, CodegenError> {
    ctx.current_function.ok_or_else(|| CodegenError::InvariantViolation {
        span: span.clone(),
        message: "statement lowered outside of a function body".to_string(),
    })
}

/// After emitting a block terminator, position the builder on a throwaway
/// block so subsequent lowering calls (dead code after `return`/`break`)
/// have somewhere valid to emit into without producing a malformed module.
fn position_unreachable<'ctx>(ctx: &mut LoweringContext<'ctx, '_>) {
    if let Some(function) = ctx.current_function {
        let dead = ctx.context.append_basic_block(function, "dead");
        ctx.builder.position_at_end(dead);
    }
}

pub(crate) fn push_loop<'ctx>(ctx: &mut LoweringContext<'ctx, '_>, targets: LoopTargets<'ctx>) {
    ctx.push_loop(targets);
}
