//! C5 (for half): For-Iterable classification.
//!
//! Three iterable shapes lower to a counting loop: an integer `range(a, b)`
//! call, a fixed-size array, and a dynamically-sized slice (bounded by its
//! runtime length field). A raw pointer has no statically or dynamically
//! known length, so iterating one is rejected outright.

use asthra_ast::{Block, Callee, Expr, ExprKind, TypeDesc, TypeId};

use crate::context::{LoopTargets, LoweringContext};
use crate::error::CodegenError;
use crate::expr::{lower_expr, lvalue_ptr_of_expr};
use crate::stmt::lower_block;
use crate::types::lower_type;

enum Iterable {
    /// `range(start, end)`: the loop variable is the counter itself.
    Range { start: Expr, end: Expr },
    /// A fixed-size array or slice: the loop variable is each element in
    /// turn, read through indexing.
    Indexed {
        element_ty: TypeId,
        base_ptr_kind: BasePtrKind,
        len: LenSource,
    },
}

enum BasePtrKind {
    /// Array value's own address; elements are reached by a two-index GEP.
    Array,
    /// Slice struct's first field holds the data pointer directly.
    Slice,
}

enum LenSource {
    Const(u64),
    /// Second field of the slice struct.
    Runtime,
}

pub fn lower_for<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    binding: &str,
    iterable: &Expr,
    body: &Block,
) -> Result<(), CodegenError> {
    let function = ctx.current_function.ok_or_else(|| CodegenError::InvariantViolation {
        span: iterable.span.clone(),
        message: "for loop lowered outside of a function body".to_string(),
    })?;

    let classified = classify(ctx, iterable)?;

    match classified {
        Iterable::Range { start, end } => lower_range_loop(ctx, function, binding, &start, &end, body),
        Iterable::Indexed {
            element_ty,
            base_ptr_kind,
            len,
        } => lower_indexed_loop(ctx, function, binding, iterable, element_ty, base_ptr_kind, len, body),
    }
}

fn classify(ctx: &LoweringContext<'_, '_>, iterable: &Expr) -> Result<Iterable, CodegenError> {
    if let ExprKind::Call {
        callee: Callee::Function(name),
        args,
    } = &iterable.kind
    {
        if name == "range" && args.len() == 2 {
            return Ok(Iterable::Range {
                start: args[0].clone(),
                end: args[1].clone(),
            });
        }
        if name == "range" && args.len() == 1 {
            let start = Expr {
                kind: ExprKind::IntLiteral(0),
                ty: args[0].ty,
                span: args[0].span.clone(),
            };
            return Ok(Iterable::Range {
                start,
                end: args[0].clone(),
            });
        }
    }

    let ty = iterable.ty.ok_or_else(|| CodegenError::MissingType {
        span: iterable.span.clone(),
        message: "for-loop iterable missing resolved type".to_string(),
    })?;
    match ctx.types.get(ty) {
        Some(TypeDesc::Array { element, size }) => Ok(Iterable::Indexed {
            element_ty: *element,
            base_ptr_kind: BasePtrKind::Array,
            len: LenSource::Const(*size),
        }),
        Some(TypeDesc::Slice { element }) => Ok(Iterable::Indexed {
            element_ty: *element,
            base_ptr_kind: BasePtrKind::Slice,
            len: LenSource::Runtime,
        }),
        Some(TypeDesc::Pointer { .. }) => Err(CodegenError::InvariantViolation {
            span: iterable.span.clone(),
            message: "cannot iterate a bare pointer: length is not recoverable".to_string(),
        }),
        _ => Err(CodegenError::TypeMapping {
            span: iterable.span.clone(),
            message: "for-loop iterable must be a range call, array, or slice".to_string(),
        }),
    }
}

fn lower_range_loop<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    function: inkwell::values::FunctionValue<'ctx>,
    binding: &str,
    start: &Expr,
    end: &Expr,
    body: &Block,
) -> Result<(), CodegenError> {
    let start_val = lower_expr(ctx, start)?.into_int_value();
    let end_val = lower_expr(ctx, end)?.into_int_value();
    let counter_ty = start_val.get_type();
    let counter_type_id = start.ty.unwrap_or(TypeId::I64);

    let slot = ctx
        .builder
        .build_alloca(counter_ty, binding)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_store(slot, start_val)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    let cond_bb = ctx.context.append_basic_block(function, "for.cond");
    let body_bb = ctx.context.append_basic_block(function, "for.body");
    let step_bb = ctx.context.append_basic_block(function, "for.step");
    let end_bb = ctx.context.append_basic_block(function, "for.end");

    ctx.builder
        .build_unconditional_branch(cond_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(cond_bb);
    let current = ctx
        .builder
        .build_load(counter_ty, slot, "for.current")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        .into_int_value();
    let continue_cond = ctx
        .builder
        .build_int_compare(inkwell::IntPredicate::SLT, current, end_val, "for.test")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_conditional_branch(continue_cond, body_bb, end_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(body_bb);
    ctx.push_scope();
    ctx.bind_local(binding, slot, counter_type_id);
    ctx.push_loop(LoopTargets {
        continue_target: step_bb,
        break_target: end_bb,
    });
    lower_block(ctx, body)?;
    ctx.pop_loop();
    ctx.pop_scope();
    if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
        ctx.builder
            .build_unconditional_branch(step_bb)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    }

    ctx.builder.position_at_end(step_bb);
    let current = ctx
        .builder
        .build_load(counter_ty, slot, "for.current")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        .into_int_value();
    let next = ctx
        .builder
        .build_int_add(current, counter_ty.const_int(1, false), "for.next")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_store(slot, next)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_unconditional_branch(cond_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(end_bb);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn lower_indexed_loop<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    function: inkwell::values::FunctionValue<'ctx>,
    binding: &str,
    iterable: &Expr,
    element_ty: TypeId,
    base_ptr_kind: BasePtrKind,
    len: LenSource,
    body: &Block,
) -> Result<(), CodegenError> {
    let base_ptr = lvalue_ptr_of_expr(ctx, iterable)?;
    let iterable_llvm_ty = lower_type(ctx, iterable.ty.unwrap())?;
    let element_llvm_ty = lower_type(ctx, element_ty)?;

    let data_ptr = match base_ptr_kind {
        BasePtrKind::Array => base_ptr,
        BasePtrKind::Slice => {
            let struct_ty = match iterable_llvm_ty {
                inkwell::types::BasicTypeEnum::StructType(t) => t,
                _ => unreachable!("slices always lower to struct types"),
            };
            let field_ptr = ctx
                .builder
                .build_struct_gep(struct_ty, base_ptr, 0, "slice.data.ptr")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
            ctx.builder
                .build_load(ctx.context.ptr_type(inkwell::AddressSpace::default()), field_ptr, "slice.data")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?
                .into_pointer_value()
        }
    };

    let len_val = match len {
        LenSource::Const(n) => ctx.context.i64_type().const_int(n, false),
        LenSource::Runtime => {
            let struct_ty = match iterable_llvm_ty {
                inkwell::types::BasicTypeEnum::StructType(t) => t,
                _ => unreachable!("slices always lower to struct types"),
            };
            let field_ptr = ctx
                .builder
                .build_struct_gep(struct_ty, base_ptr, 1, "slice.len.ptr")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
            ctx.builder
                .build_load(ctx.context.i64_type(), field_ptr, "slice.len")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?
                .into_int_value()
        }
    };

    let index_slot = ctx
        .builder
        .build_alloca(ctx.context.i64_type(), "for.idx")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_store(index_slot, ctx.context.i64_type().const_int(0, false))
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    let cond_bb = ctx.context.append_basic_block(function, "for.cond");
    let body_bb = ctx.context.append_basic_block(function, "for.body");
    let step_bb = ctx.context.append_basic_block(function, "for.step");
    let end_bb = ctx.context.append_basic_block(function, "for.end");

    ctx.builder
        .build_unconditional_branch(cond_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(cond_bb);
    let idx = ctx
        .builder
        .build_load(ctx.context.i64_type(), index_slot, "for.idx.val")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        .into_int_value();
    let cond = ctx
        .builder
        .build_int_compare(inkwell::IntPredicate::ULT, idx, len_val, "for.test")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_conditional_branch(cond, body_bb, end_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(body_bb);
    let idx = ctx
        .builder
        .build_load(ctx.context.i64_type(), index_slot, "for.idx.val")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        .into_int_value();
    let element_ptr = match base_ptr_kind {
        BasePtrKind::Array => unsafe {
            ctx.builder
                .build_gep(
                    iterable_llvm_ty,
                    data_ptr,
                    &[ctx.context.i64_type().const_int(0, false), idx],
                    "for.elem.ptr",
                )
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        },
        BasePtrKind::Slice => unsafe {
            ctx.builder
                .build_gep(element_llvm_ty, data_ptr, &[idx], "for.elem.ptr")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        },
    };

    ctx.push_scope();
    ctx.bind_local(binding, element_ptr, element_ty);
    ctx.push_loop(LoopTargets {
        continue_target: step_bb,
        break_target: end_bb,
    });
    lower_block(ctx, body)?;
    ctx.pop_loop();
    ctx.pop_scope();
    if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
        ctx.builder
            .build_unconditional_branch(step_bb)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    }

    ctx.builder.position_at_end(step_bb);
    let idx = ctx
        .builder
        .build_load(ctx.context.i64_type(), index_slot, "for.idx.val")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        .into_int_value();
    let next = ctx
        .builder
        .build_int_add(idx, ctx.context.i64_type().const_int(1, false), "for.idx.next")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_store(index_slot, next)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_unconditional_branch(cond_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(end_bb);
    Ok(())
}
