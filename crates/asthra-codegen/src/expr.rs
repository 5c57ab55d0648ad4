//! C2: Expression Lowerer.

use inkwell::types::BasicType;
use inkwell::values::{BasicValue, BasicValueEnum, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use asthra_ast::{ArithOp, BinOp, BitOp, Callee, CmpOp, Expr, ExprKind, LogicOp, ShiftOp, TypeDesc, TypeId, UnaryOp};

use crate::context::LoweringContext;
use crate::error::CodegenError;
use crate::runtime::declare_builtin;
use crate::types::lower_type;

/// Lowers an expression to its SSA value
pub fn lower_expr<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => {
            let ty = expr.ty.unwrap_or(TypeId::I32);
            let int_ty = match lower_type(ctx, ty)? {
                inkwell::types::BasicTypeEnum::IntType(t) => t,
                _ => ctx.context.i32_type(),
            };
            Ok(int_ty.const_int(*v as u64, true).into())
        }
        ExprKind::FloatLiteral(v) => Ok(ctx.context.f64_type().const_float(*v).into()),
        ExprKind::BoolLiteral(v) => Ok(ctx.context.bool_type().const_int(*v as u64, false).into()),
        ExprKind::CharLiteral(c) => Ok(ctx.context.i32_type().const_int(*c as u64, false).into()),
        ExprKind::StringLiteral(s) => lower_string_literal(ctx, s),
        ExprKind::UnitLiteral => Ok(ctx.context.struct_type(&[], false).const_named_struct(&[]).into()),
        ExprKind::TupleLiteral(elems) => lower_aggregate_literal(ctx, elems, expr),
        ExprKind::ArrayLiteral(elems) => lower_aggregate_literal(ctx, elems, expr),
        ExprKind::StructLiteral { fields, type_name } => {
            lower_struct_literal(ctx, type_name, fields, expr)
        }
        ExprKind::Identifier(name) => lower_identifier(ctx, name, expr),
        ExprKind::Unary { op, operand } => lower_unary(ctx, *op, operand, expr),
        ExprKind::Binary { op, lhs, rhs } => lower_binary(ctx, *op, lhs, rhs, expr),
        ExprKind::Cast { operand, target } => lower_cast(ctx, operand, *target),
        ExprKind::Field { base, field } => {
            let ptr = field_ptr(ctx, base, field, expr)?;
            load_from(ctx, ptr, expr)
        }
        ExprKind::Index { base, index } => {
            let ptr = index_ptr(ctx, base, index, expr)?;
            load_from(ctx, ptr, expr)
        }
        ExprKind::Slice { base, start, end } => lower_slice(ctx, base, start.as_deref(), end.as_deref(), expr),
        ExprKind::Call { callee, args } => lower_call(ctx, callee, args, expr),
        ExprKind::Await { handle } => lower_await(ctx, handle),
        ExprKind::Unsafe(block) => lower_unsafe_expr(ctx, block, expr),
        ExprKind::SizeOf(type_id) => lower_sizeof(ctx, *type_id),
    }
}

fn lower_string_literal<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    s: &str,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let name = ctx.next_string_literal_name();
    let global = ctx
        .builder
        .build_global_string_ptr(s, &name)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    Ok(global.as_pointer_value().as_basic_value_enum())
}

fn lower_aggregate_literal<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    elems: &[Expr],
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let mut values = Vec::with_capacity(elems.len());
    for e in elems {
        values.push(lower_expr(ctx, e)?);
    }
    let ty_id = expr.ty.ok_or_else(|| CodegenError::MissingType {
        span: expr.span.clone(),
        message: "aggregate literal missing resolved type".to_string(),
    })?;
    let llvm_ty = lower_type(ctx, ty_id)?;
    match llvm_ty {
        inkwell::types::BasicTypeEnum::StructType(st) => {
            let mut agg = st.get_undef().as_aggregate_value_enum();
            for (i, v) in values.into_iter().enumerate() {
                agg = ctx
                    .builder
                    .build_insert_value(agg, v, i as u32, "tuple.elem")
                    .map_err(|e| CodegenError::LlvmError(e.to_string()))?
                    .as_aggregate_value_enum();
            }
            Ok(agg.as_basic_value_enum())
        }
        inkwell::types::BasicTypeEnum::ArrayType(at) => {
            let mut agg = at.get_undef().as_aggregate_value_enum();
            for (i, v) in values.into_iter().enumerate() {
                agg = ctx
                    .builder
                    .build_insert_value(agg, v, i as u32, "array.elem")
                    .map_err(|e| CodegenError::LlvmError(e.to_string()))?
                    .as_aggregate_value_enum();
            }
            Ok(agg.as_basic_value_enum())
        }
        other => Ok(other.const_zero()),
    }
}

fn lower_struct_literal<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    type_name: &str,
    fields: &[(String, Expr)],
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let ty_id = ctx.types.get_by_name(type_name).ok_or_else(|| CodegenError::TypeMapping {
        span: expr.span.clone(),
        message: format!("unknown struct type '{type_name}'"),
    })?;
    let desc = ctx.types.get(ty_id).cloned();
    let struct_desc = match desc {
        Some(TypeDesc::Struct(s)) => s,
        _ => {
            return Err(CodegenError::TypeMapping {
                span: expr.span.clone(),
                message: format!("'{type_name}' is not a struct type"),
            })
        }
    };
    let llvm_ty = lower_type(ctx, ty_id)?;
    let struct_ty = match llvm_ty {
        inkwell::types::BasicTypeEnum::StructType(t) => t,
        _ => unreachable!("struct descriptors always lower to struct types"),
    };
    // Declared-field order governs emitted index.
    let mut agg = struct_ty.get_undef().as_aggregate_value_enum();
    for (name, value_expr) in fields {
        let idx = struct_desc.field_index(name).ok_or_else(|| CodegenError::TypeMapping {
            span: expr.span.clone(),
            message: format!("'{type_name}' has no field '{name}'"),
        })?;
        let value = lower_expr(ctx, value_expr)?;
        agg = ctx
            .builder
            .build_insert_value(agg, value, idx as u32, "struct.field")
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?
            .as_aggregate_value_enum();
    }
    Ok(agg.as_basic_value_enum())
}

fn lower_identifier<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    name: &str,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    if let Some((slot, ty)) = ctx.lookup_local(name) {
        let llvm_ty = lower_type(ctx, ty)?;
        return ctx
            .builder
            .build_load(llvm_ty, slot, name)
            .map_err(|e| CodegenError::LlvmError(e.to_string()));
    }
    if let Some(global) = ctx.module.get_global(name) {
        return ctx
            .builder
            .build_load(global.get_value_type(), global.as_pointer_value(), name)
            .map_err(|e| CodegenError::LlvmError(e.to_string()));
    }
    Err(CodegenError::UnresolvedIdentifier {
        span: expr.span.clone(),
        name: name.to_string(),
    })
}

fn lower_unary<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: UnaryOp,
    operand: &Expr,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    match op {
        UnaryOp::AddrOf => {
            let ptr = lvalue_ptr_of_expr(ctx, operand)?;
            Ok(ptr.as_basic_value_enum())
        }
        UnaryOp::Deref => {
            let ptr_val = lower_expr(ctx, operand)?;
            let ptr = ptr_val.into_pointer_value();
            let pointee_ty = expr.ty.ok_or_else(|| CodegenError::MissingType {
                span: expr.span.clone(),
                message: "dereference missing pointee type".to_string(),
            })?;
            let llvm_ty = lower_type(ctx, pointee_ty)?;
            ctx.builder
                .build_load(llvm_ty, ptr, "deref")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        UnaryOp::Neg => {
            let v = lower_expr(ctx, operand)?;
            match v {
                BasicValueEnum::IntValue(i) => ctx
                    .builder
                    .build_int_neg(i, "neg")
                    .map(Into::into)
                    .map_err(|e| CodegenError::LlvmError(e.to_string())),
                BasicValueEnum::FloatValue(f) => ctx
                    .builder
                    .build_float_neg(f, "fneg")
                    .map(Into::into)
                    .map_err(|e| CodegenError::LlvmError(e.to_string())),
                _ => Err(CodegenError::TypeMapping {
                    span: expr.span.clone(),
                    message: "unary '-' requires a numeric operand".to_string(),
                }),
            }
        }
        UnaryOp::Not => {
            let v = lower_expr(ctx, operand)?.into_int_value();
            ctx.builder
                .build_not(v, "lnot")
                .map(Into::into)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        UnaryOp::BitNot => {
            let v = lower_expr(ctx, operand)?.into_int_value();
            ctx.builder
                .build_not(v, "bnot")
                .map(Into::into)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
    }
}

fn lower_binary<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    // Short-circuit evaluation for `&&`/`||`:
    // the rhs block is only entered if the lhs doesn't already decide.
    if let BinOp::Logic(logic_op) = op {
        return lower_short_circuit(ctx, logic_op, lhs, rhs);
    }

    if let BinOp::Arith(arith_op) = op {
        return lower_arith_binary(ctx, arith_op, lhs, rhs, expr);
    }

    let l = lower_expr(ctx, lhs)?;
    let r = lower_expr(ctx, rhs)?;
    let is_float = matches!(l, BasicValueEnum::FloatValue(_));

    match op {
        BinOp::Cmp(cmp_op) => lower_cmp(ctx, cmp_op, l, r, is_float, signed_hint(lhs)),
        BinOp::Bit(bit_op) => lower_bit(ctx, bit_op, l, r),
        BinOp::Shift(shift_op) => lower_shift(ctx, shift_op, l, r, signed_hint(lhs)),
        BinOp::Arith(_) | BinOp::Logic(_) => unreachable!("handled above"),
    }
    .map_err(|_| CodegenError::TypeMapping {
        span: expr.span.clone(),
        message: "binary operator applied to incompatible operand types".to_string(),
    })
}

/// Dispatches `+`/`-`/`*`/`/`/`%` to the numeric path, or to one of the
/// non-numeric arithmetic forms the mapping table also defines: string
/// concatenation and pointer arithmetic.
fn lower_arith_binary<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: ArithOp,
    lhs: &Expr,
    rhs: &Expr,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let lhs_desc = lhs.ty.and_then(|t| ctx.types.get(t)).cloned();
    let rhs_desc = rhs.ty.and_then(|t| ctx.types.get(t)).cloned();

    if op == ArithOp::Add && matches!(lhs_desc, Some(TypeDesc::String)) && matches!(rhs_desc, Some(TypeDesc::String)) {
        return lower_string_concat(ctx, lhs, rhs);
    }

    if let Some(TypeDesc::Pointer { pointee, .. }) = lhs_desc.clone() {
        if matches!(rhs_desc, Some(TypeDesc::Int(_))) && matches!(op, ArithOp::Add | ArithOp::Sub) {
            return lower_pointer_offset(ctx, pointee, lhs, rhs, op, expr);
        }
        if op == ArithOp::Sub && matches!(rhs_desc, Some(TypeDesc::Pointer { .. })) {
            return lower_pointer_diff(ctx, pointee, lhs, rhs);
        }
    }
    if op == ArithOp::Add && matches!(lhs_desc, Some(TypeDesc::Int(_))) {
        if let Some(TypeDesc::Pointer { pointee, .. }) = rhs_desc {
            return lower_pointer_offset(ctx, pointee, rhs, lhs, op, expr);
        }
    }

    let l = lower_expr(ctx, lhs)?;
    let r = lower_expr(ctx, rhs)?;
    let is_float = matches!(l, BasicValueEnum::FloatValue(_));
    lower_arith(ctx, op, l, r, is_float, signed_hint(lhs)).map_err(|_| CodegenError::TypeMapping {
        span: expr.span.clone(),
        message: "arithmetic operator applied to incompatible operand types".to_string(),
    })
}

/// `string + string` calls the runtime concatenation helper; strings are
/// an opaque pointer, with no in-IR representation to splice.
fn lower_string_concat<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let l = lower_expr(ctx, lhs)?;
    let r = lower_expr(ctx, rhs)?;
    let function = declare_builtin(ctx, "string_concat").ok_or_else(|| CodegenError::UnresolvedIdentifier {
        span: lhs.span.clone(),
        name: "string_concat".to_string(),
    })?;
    let call = ctx
        .builder
        .build_call(function, &[l.into(), r.into()], "concat")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    call.try_as_basic_value().left().ok_or_else(|| CodegenError::TypeMapping {
        span: lhs.span.clone(),
        message: "string_concat runtime call produced no value".to_string(),
    })
}

/// `ptr + n`/`ptr - n`: a typed GEP over the pointee, offset by `n`
/// elements (negated for `-`).
fn lower_pointer_offset<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    pointee: TypeId,
    ptr_expr: &Expr,
    int_expr: &Expr,
    op: ArithOp,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let ptr_val = lower_expr(ctx, ptr_expr)?.into_pointer_value();
    let mut offset = lower_expr(ctx, int_expr)?.into_int_value();
    let elem_ty = lower_type(ctx, pointee)?;
    if op == ArithOp::Sub {
        offset = ctx
            .builder
            .build_int_neg(offset, "ptr.offset.neg")
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    } else if op != ArithOp::Add {
        return Err(CodegenError::TypeMapping {
            span: expr.span.clone(),
            message: "pointer arithmetic only supports '+'/'-' against an integer operand".to_string(),
        });
    }
    unsafe {
        ctx.builder
            .build_gep(elem_ty, ptr_val, &[offset], "ptr.offset")
            .map(|p| p.as_basic_value_enum())
            .map_err(|e| CodegenError::LlvmError(e.to_string()))
    }
}

/// `ptr - ptr`: the byte distance divided by the pointee's size, giving an
/// element count as `ptrdiff_t` does in C.
fn lower_pointer_diff<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    pointee: TypeId,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let l = lower_expr(ctx, lhs)?.into_pointer_value();
    let r = lower_expr(ctx, rhs)?.into_pointer_value();
    let elem_ty = lower_type(ctx, pointee)?;
    let i64_ty = ctx.context.i64_type();
    let l_int = ctx
        .builder
        .build_ptr_to_int(l, i64_ty, "ptr.diff.l")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    let r_int = ctx
        .builder
        .build_ptr_to_int(r, i64_ty, "ptr.diff.r")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    let byte_diff = ctx
        .builder
        .build_int_sub(l_int, r_int, "ptr.diff.bytes")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    let elem_size = elem_ty.size_of().ok_or_else(|| CodegenError::TypeMapping {
        span: lhs.span.clone(),
        message: "pointer difference on a pointee with no statically known size".to_string(),
    })?;
    ctx.builder
        .build_int_signed_div(byte_diff, elem_size, "ptr.diff")
        .map(|v| v.as_basic_value_enum())
        .map_err(|e| CodegenError::LlvmError(e.to_string()))
}

fn signed_hint(e: &Expr) -> bool {
    match e.ty {
        Some(TypeId::U8)
        | Some(TypeId::U16)
        | Some(TypeId::U32)
        | Some(TypeId::U64)
        | Some(TypeId::U128)
        | Some(TypeId::USIZE) => false,
        _ => true,
    }
}

fn lower_arith<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: ArithOp,
    l: BasicValueEnum<'ctx>,
    r: BasicValueEnum<'ctx>,
    is_float: bool,
    signed: bool,
) -> Result<BasicValueEnum<'ctx>, ()> {
    let b = &ctx.builder;
    if is_float {
        let (l, r) = (l.into_float_value(), r.into_float_value());
        let v = match op {
            ArithOp::Add => b.build_float_add(l, r, "fadd"),
            ArithOp::Sub => b.build_float_sub(l, r, "fsub"),
            ArithOp::Mul => b.build_float_mul(l, r, "fmul"),
            ArithOp::Div => b.build_float_div(l, r, "fdiv"),
            ArithOp::Rem => b.build_float_rem(l, r, "frem"),
        };
        v.map(Into::into).map_err(|_| ())
    } else {
        let (l, r) = (l.into_int_value(), r.into_int_value());
        let v = match (op, signed) {
            (ArithOp::Add, _) => b.build_int_add(l, r, "add"),
            (ArithOp::Sub, _) => b.build_int_sub(l, r, "sub"),
            (ArithOp::Mul, _) => b.build_int_mul(l, r, "mul"),
            (ArithOp::Div, true) => b.build_int_signed_div(l, r, "sdiv"),
            (ArithOp::Div, false) => b.build_int_unsigned_div(l, r, "udiv"),
            (ArithOp::Rem, true) => b.build_int_signed_rem(l, r, "srem"),
            (ArithOp::Rem, false) => b.build_int_unsigned_rem(l, r, "urem"),
        };
        v.map(Into::into).map_err(|_| ())
    }
}

fn lower_cmp<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: CmpOp,
    l: BasicValueEnum<'ctx>,
    r: BasicValueEnum<'ctx>,
    is_float: bool,
    signed: bool,
) -> Result<BasicValueEnum<'ctx>, ()> {
    let b = &ctx.builder;
    if is_float {
        let (l, r) = (l.into_float_value(), r.into_float_value());
        let pred = match op {
            CmpOp::Eq => FloatPredicate::OEQ,
            CmpOp::Ne => FloatPredicate::ONE,
            CmpOp::Lt => FloatPredicate::OLT,
            CmpOp::Le => FloatPredicate::OLE,
            CmpOp::Gt => FloatPredicate::OGT,
            CmpOp::Ge => FloatPredicate::OGE,
        };
        b.build_float_compare(pred, l, r, "fcmp").map(Into::into).map_err(|_| ())
    } else {
        let (l, r) = (l.into_int_value(), r.into_int_value());
        let pred = match (op, signed) {
            (CmpOp::Eq, _) => IntPredicate::EQ,
            (CmpOp::Ne, _) => IntPredicate::NE,
            (CmpOp::Lt, true) => IntPredicate::SLT,
            (CmpOp::Lt, false) => IntPredicate::ULT,
            (CmpOp::Le, true) => IntPredicate::SLE,
            (CmpOp::Le, false) => IntPredicate::ULE,
            (CmpOp::Gt, true) => IntPredicate::SGT,
            (CmpOp::Gt, false) => IntPredicate::UGT,
            (CmpOp::Ge, true) => IntPredicate::SGE,
            (CmpOp::Ge, false) => IntPredicate::UGE,
        };
        b.build_int_compare(pred, l, r, "icmp").map(Into::into).map_err(|_| ())
    }
}

fn lower_bit<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: BitOp,
    l: BasicValueEnum<'ctx>,
    r: BasicValueEnum<'ctx>,
) -> Result<BasicValueEnum<'ctx>, ()> {
    let (l, r) = (l.into_int_value(), r.into_int_value());
    let b = &ctx.builder;
    let v = match op {
        BitOp::And => b.build_and(l, r, "and"),
        BitOp::Or => b.build_or(l, r, "or"),
        BitOp::Xor => b.build_xor(l, r, "xor"),
    };
    v.map(Into::into).map_err(|_| ())
}

fn lower_shift<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: ShiftOp,
    l: BasicValueEnum<'ctx>,
    r: BasicValueEnum<'ctx>,
    signed: bool,
) -> Result<BasicValueEnum<'ctx>, ()> {
    let (l, r) = (l.into_int_value(), r.into_int_value());
    let b = &ctx.builder;
    let v = match op {
        ShiftOp::Shl => b.build_left_shift(l, r, "shl"),
        ShiftOp::Shr => b.build_right_shift(l, r, signed, "shr"),
    };
    v.map(Into::into).map_err(|_| ())
}

fn lower_short_circuit<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    op: LogicOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let function = ctx.current_function.ok_or_else(|| CodegenError::InvariantViolation {
        span: lhs.span.clone(),
        message: "short-circuit expression outside of a function body".to_string(),
    })?;
    let lhs_val = lower_expr(ctx, lhs)?.into_int_value();
    let lhs_block = ctx.builder.get_insert_block().expect("builder has an insert point");
    let rhs_block = ctx.context.append_basic_block(function, "sc.rhs");
    let merge_block = ctx.context.append_basic_block(function, "sc.merge");

    match op {
        LogicOp::And => {
            ctx.builder
                .build_conditional_branch(lhs_val, rhs_block, merge_block)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        }
        LogicOp::Or => {
            ctx.builder
                .build_conditional_branch(lhs_val, merge_block, rhs_block)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        }
    }

    ctx.builder.position_at_end(rhs_block);
    let rhs_val = lower_expr(ctx, rhs)?.into_int_value();
    let rhs_end_block = ctx.builder.get_insert_block().expect("builder has an insert point");
    ctx.builder
        .build_unconditional_branch(merge_block)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(merge_block);
    let phi = ctx
        .builder
        .build_phi(ctx.context.bool_type(), "sc.result")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    phi.add_incoming(&[(&lhs_val, lhs_block), (&rhs_val, rhs_end_block)]);
    Ok(phi.as_basic_value())
}

fn lower_cast<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    operand: &Expr,
    target: TypeId,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let v = lower_expr(ctx, operand)?;
    let target_ty = lower_type(ctx, target)?;
    let desc = ctx.types.get(target).cloned();
    match (v, &desc) {
        (BasicValueEnum::IntValue(i), Some(TypeDesc::Int(kind))) => {
            let dest_int = match target_ty {
                inkwell::types::BasicTypeEnum::IntType(t) => t,
                _ => unreachable!(),
            };
            ctx.builder
                .build_int_cast_sign_flag(i, dest_int, kind.is_signed(), "intcast")
                .map(Into::into)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (BasicValueEnum::IntValue(i), Some(TypeDesc::F32) | Some(TypeDesc::F64)) => {
            let dest_float = match target_ty {
                inkwell::types::BasicTypeEnum::FloatType(t) => t,
                _ => unreachable!(),
            };
            let signed = signed_hint(operand);
            if signed {
                ctx.builder.build_signed_int_to_float(i, dest_float, "sitofp")
            } else {
                ctx.builder.build_unsigned_int_to_float(i, dest_float, "uitofp")
            }
            .map(Into::into)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (BasicValueEnum::FloatValue(f), Some(TypeDesc::Int(kind))) => {
            let dest_int = match target_ty {
                inkwell::types::BasicTypeEnum::IntType(t) => t,
                _ => unreachable!(),
            };
            if kind.is_signed() {
                ctx.builder.build_float_to_signed_int(f, dest_int, "fptosi")
            } else {
                ctx.builder.build_float_to_unsigned_int(f, dest_int, "fptoui")
            }
            .map(Into::into)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (BasicValueEnum::FloatValue(f), Some(TypeDesc::F32) | Some(TypeDesc::F64)) => {
            let dest_float = match target_ty {
                inkwell::types::BasicTypeEnum::FloatType(t) => t,
                _ => unreachable!(),
            };
            ctx.builder
                .build_float_cast(f, dest_float, "fpcast")
                .map(Into::into)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (BasicValueEnum::PointerValue(p), _) => Ok(p.into()),
        (other, _) => Ok(other),
    }
}

fn field_ptr<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    base: &Expr,
    field: &str,
    expr: &Expr,
) -> Result<PointerValue<'ctx>, CodegenError> {
    let base_ptr = lvalue_ptr_of_expr(ctx, base)?;
    let base_ty = base.ty.ok_or_else(|| CodegenError::MissingType {
        span: expr.span.clone(),
        message: "field access on an expression with no resolved type".to_string(),
    })?;
    let desc = ctx.types.get(base_ty).cloned();
    let struct_desc = match desc {
        Some(TypeDesc::Struct(s)) => s,
        _ => {
            return Err(CodegenError::TypeMapping {
                span: expr.span.clone(),
                message: "field access on a non-struct type".to_string(),
            })
        }
    };
    let idx = struct_desc.field_index(field).ok_or_else(|| CodegenError::TypeMapping {
        span: expr.span.clone(),
        message: format!("no field named '{field}'"),
    })?;
    let struct_llvm_ty = lower_type(ctx, base_ty)?;
    let struct_ty = match struct_llvm_ty {
        inkwell::types::BasicTypeEnum::StructType(t) => t,
        _ => unreachable!(),
    };
    ctx.builder
        .build_struct_gep(struct_ty, base_ptr, idx as u32, "field.ptr")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))
}

fn index_ptr<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    base: &Expr,
    index: &Expr,
    expr: &Expr,
) -> Result<PointerValue<'ctx>, CodegenError> {
    let base_ptr = lvalue_ptr_of_expr(ctx, base)?;
    let base_ty = base.ty.ok_or_else(|| CodegenError::MissingType {
        span: expr.span.clone(),
        message: "indexing an expression with no resolved type".to_string(),
    })?;
    let elem_ty = match ctx.types.get(base_ty) {
        Some(TypeDesc::Array { element, .. }) | Some(TypeDesc::Slice { element }) => *element,
        _ => {
            return Err(CodegenError::TypeMapping {
                span: expr.span.clone(),
                message: "indexing a non-array/slice type".to_string(),
            })
        }
    };
    let elem_llvm_ty = lower_type(ctx, elem_ty)?;
    let index_val = lower_expr(ctx, index)?.into_int_value();
    unsafe {
        ctx.builder
            .build_gep(elem_llvm_ty, base_ptr, &[index_val], "index.ptr")
            .map_err(|e| CodegenError::LlvmError(e.to_string()))
    }
}

fn load_from<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    ptr: PointerValue<'ctx>,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let ty = expr.ty.ok_or_else(|| CodegenError::MissingType {
        span: expr.span.clone(),
        message: "load target missing resolved type".to_string(),
    })?;
    let llvm_ty = lower_type(ctx, ty)?;
    ctx.builder
        .build_load(llvm_ty, ptr, "load")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))
}

/// Resolves the address an lvalue expression denotes, used by
/// `&expr`/field/index chains and by `Assign` lowering in `stmt.rs`.
pub fn lvalue_ptr_of_expr<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    expr: &Expr,
) -> Result<PointerValue<'ctx>, CodegenError> {
    match &expr.kind {
        ExprKind::Identifier(name) => ctx
            .lookup_local(name)
            .map(|(ptr, _)| ptr)
            .or_else(|| ctx.module.get_global(name).map(|g| g.as_pointer_value()))
            .ok_or_else(|| CodegenError::UnresolvedIdentifier {
                span: expr.span.clone(),
                name: name.clone(),
            }),
        ExprKind::Field { base, field } => field_ptr(ctx, base, field, expr),
        ExprKind::Index { base, index } => index_ptr(ctx, base, index, expr),
        ExprKind::Unary {
            op: UnaryOp::Deref,
            operand,
        } => Ok(lower_expr(ctx, operand)?.into_pointer_value()),
        _ => Err(CodegenError::InvariantViolation {
            span: expr.span.clone(),
            message: "expression does not denote an addressable location".to_string(),
        }),
    }
}

fn lower_slice<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    base: &Expr,
    start: Option<&Expr>,
    end: Option<&Expr>,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let base_ty = base.ty.ok_or_else(|| CodegenError::MissingType {
        span: expr.span.clone(),
        message: "slice base missing resolved type".to_string(),
    })?;
    let elem_ty = match ctx.types.get(base_ty) {
        Some(TypeDesc::Array { element, .. }) | Some(TypeDesc::Slice { element }) => *element,
        _ => {
            return Err(CodegenError::TypeMapping {
                span: expr.span.clone(),
                message: "slicing a non-array/slice type".to_string(),
            })
        }
    };
    let elem_llvm_ty = lower_type(ctx, elem_ty)?;
    let base_ptr = lvalue_ptr_of_expr(ctx, base)?;
    let start_val = match start {
        Some(e) => lower_expr(ctx, e)?.into_int_value(),
        None => ctx.context.i64_type().const_int(0, false),
    };
    let start_ptr = unsafe {
        ctx.builder
            .build_gep(elem_llvm_ty, base_ptr, &[start_val], "slice.start")
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?
    };
    let length = match end {
        Some(e) => {
            let end_val = lower_expr(ctx, e)?.into_int_value();
            ctx.builder
                .build_int_sub(end_val, start_val, "slice.len")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        }
        None => ctx.context.i64_type().const_int(0, false),
    };
    let slice_ty = expr.ty.ok_or_else(|| CodegenError::MissingType {
        span: expr.span.clone(),
        message: "slice expression missing resolved type".to_string(),
    })?;
    let llvm_ty = lower_type(ctx, slice_ty)?;
    let struct_ty = match llvm_ty {
        inkwell::types::BasicTypeEnum::StructType(t) => t,
        _ => unreachable!("slices always lower to struct types"),
    };
    let agg = struct_ty.get_undef().as_aggregate_value_enum();
    let with_ptr = ctx
        .builder
        .build_insert_value(agg, start_ptr, 0, "slice.ptr")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    let with_len = ctx
        .builder
        .build_insert_value(with_ptr, length, 1, "slice.len.field")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    Ok(with_len.as_basic_value_enum())
}

fn lower_call<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    callee: &Callee,
    args: &[Expr],
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let name = match callee {
        Callee::Function(name) => name.clone(),
        // `Type::fn` mangles to `Type_fn`.
        Callee::Associated { type_name, method } => format!("{type_name}_{method}"),
    };

    let mut arg_values = Vec::with_capacity(args.len());
    for a in args {
        arg_values.push(lower_expr(ctx, a)?.into());
    }

    let function = ctx
        .module
        .get_function(&name)
        .or_else(|| declare_builtin(ctx, &name))
        .ok_or_else(|| CodegenError::UnresolvedIdentifier {
            span: expr.span.clone(),
            name,
        })?;

    let call_site = ctx
        .builder
        .build_call(function, &arg_values, "call")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    match call_site.try_as_basic_value().left() {
        Some(v) => Ok(v),
        None => Ok(ctx.context.struct_type(&[], false).const_named_struct(&[]).into()),
    }
}

fn lower_await<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    handle: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    // Await is a load from the handle's local slot: `spawn` already stored
    // the task's result there, so no runtime call is involved.
    let handle_ty = handle.ty.ok_or_else(|| CodegenError::MissingType {
        span: handle.span.clone(),
        message: "awaited handle missing resolved type".to_string(),
    })?;
    let slot = lvalue_ptr_of_expr(ctx, handle)?;
    let llvm_ty = lower_type(ctx, handle_ty)?;
    ctx.builder
        .build_load(llvm_ty, slot, "await")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))
}

fn lower_unsafe_expr<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    block: &asthra_ast::Block,
    expr: &Expr,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    // The value of an `unsafe { ... }` expression is its trailing
    // expression-statement; every other statement is lowered
    // for side effects via the statement lowerer.
    ctx.push_scope();
    let mut result = None;
    for (i, stmt) in block.stmts.iter().enumerate() {
        if i + 1 == block.stmts.len() {
            if let asthra_ast::StmtKind::Expr(e) = &stmt.kind {
                result = Some(lower_expr(ctx, e)?);
                continue;
            }
        }
        crate::stmt::lower_stmt(ctx, stmt)?;
    }
    ctx.pop_scope();
    result.ok_or_else(|| CodegenError::InvariantViolation {
        span: expr.span.clone(),
        message: "unsafe expression block has no trailing expression".to_string(),
    })
}

fn lower_sizeof<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    type_id: TypeId,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let llvm_ty = lower_type(ctx, type_id)?;
    let size = llvm_ty.size_of().ok_or_else(|| CodegenError::TypeMapping {
        span: asthra_ast::Span::synthetic(),
        message: "sizeof on a type with no statically known size".to_string(),
    })?;
    Ok(size.into())
}
