//! C5 (match half): Pattern Engine.
//!
//! Builds a chain of basic blocks, one per arm, each testing its pattern
//! (and optional guard) and falling through to the next arm on mismatch.
//! Enum-variant tags are always looked up from the subject's `EnumDesc` by
//! name — never hard-coded.

use inkwell::IntPredicate;

use asthra_ast::{Expr, LiteralPattern, MatchArm, Pattern, TypeDesc};

use crate::context::LoweringContext;
use crate::error::CodegenError;
use crate::expr::lower_expr;
use crate::stmt::lower_block;
use crate::types::lower_type;

pub fn lower_match<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    subject: &Expr,
    arms: &[MatchArm],
) -> Result<(), CodegenError> {
    let function = ctx.current_function.ok_or_else(|| CodegenError::InvariantViolation {
        span: subject.span.clone(),
        message: "match lowered outside of a function body".to_string(),
    })?;

    let subject_val = lower_expr(ctx, subject)?;
    let subject_ty = subject.ty.ok_or_else(|| CodegenError::MissingType {
        span: subject.span.clone(),
        message: "match subject missing resolved type".to_string(),
    })?;

    // Stash the subject in an alloca so enum-variant arms can GEP into its
    // payload field; cheap relative to the branch chain itself.
    let subject_llvm_ty = lower_type(ctx, subject_ty)?;
    let subject_slot = ctx
        .builder
        .build_alloca(subject_llvm_ty, "match.subject")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    ctx.builder
        .build_store(subject_slot, subject_val)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    let merge_bb = ctx.context.append_basic_block(function, "match.merge");
    let mut next_test_bb = ctx.context.append_basic_block(function, "match.arm0.test");
    ctx.builder
        .build_unconditional_branch(next_test_bb)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    for (i, arm) in arms.iter().enumerate() {
        let test_bb = next_test_bb;
        let body_bb = ctx.context.append_basic_block(function, &format!("match.arm{i}.body"));
        next_test_bb = if i + 1 < arms.len() {
            ctx.context.append_basic_block(function, &format!("match.arm{}.test", i + 1))
        } else {
            ctx.context.append_basic_block(function, "match.none")
        };

        ctx.builder.position_at_end(test_bb);
        ctx.push_scope();
        let matched = test_pattern(ctx, &arm.pattern, subject_ty, subject_slot, subject_val, arm)?;

        let guard_target_bb = if arm.guard.is_some() {
            ctx.context.append_basic_block(function, &format!("match.arm{i}.guard"))
        } else {
            body_bb
        };
        ctx.builder
            .build_conditional_branch(matched, guard_target_bb, next_test_bb)
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

        if let Some(guard) = &arm.guard {
            ctx.builder.position_at_end(guard_target_bb);
            let guard_val = lower_expr(ctx, guard)?.into_int_value();
            ctx.builder
                .build_conditional_branch(guard_val, body_bb, next_test_bb)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        }

        ctx.builder.position_at_end(body_bb);
        lower_block(ctx, &arm.body)?;
        if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
            ctx.builder
                .build_unconditional_branch(merge_bb)
                .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        }
        ctx.pop_scope();
    }

    // No arm matched: this is a non-exhaustive match, which the (external)
    // semantic analyzer is responsible for rejecting before codegen ever
    // sees it. Here it's an unreachable trap.
    ctx.builder.position_at_end(next_test_bb);
    ctx.builder
        .build_unreachable()
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    ctx.builder.position_at_end(merge_bb);
    Ok(())
}

/// Tests whether `pattern` matches the subject, binding any pattern
/// variables into the current (arm-local) scope as a side effect. Returns
/// the `i1` condition value.
fn test_pattern<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    pattern: &Pattern,
    subject_ty: asthra_ast::TypeId,
    subject_slot: inkwell::values::PointerValue<'ctx>,
    subject_val: inkwell::values::BasicValueEnum<'ctx>,
    arm: &MatchArm,
) -> Result<inkwell::values::IntValue<'ctx>, CodegenError> {
    match pattern {
        Pattern::Wildcard => Ok(ctx.context.bool_type().const_int(1, false)),
        Pattern::Identifier(name) => {
            ctx.bind_local(name, subject_slot, subject_ty);
            Ok(ctx.context.bool_type().const_int(1, false))
        }
        Pattern::Literal(lit) => test_literal_pattern(ctx, lit, subject_val),
        Pattern::EnumVariant {
            enum_name,
            variant,
            binding,
        } => test_enum_pattern(ctx, enum_name, variant, binding.as_deref(), subject_ty, subject_slot, arm),
        Pattern::Struct => Err(CodegenError::NotYetImplemented {
            span: arm.body.stmts.first().map(|s| s.span.clone()).unwrap_or_else(asthra_ast::Span::synthetic),
            message: "struct patterns are reserved and not yet lowered".to_string(),
        }),
        Pattern::Tuple => Err(CodegenError::NotYetImplemented {
            span: arm.body.stmts.first().map(|s| s.span.clone()).unwrap_or_else(asthra_ast::Span::synthetic),
            message: "tuple patterns are reserved and not yet lowered".to_string(),
        }),
    }
}

fn test_literal_pattern<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    lit: &LiteralPattern,
    subject_val: inkwell::values::BasicValueEnum<'ctx>,
) -> Result<inkwell::values::IntValue<'ctx>, CodegenError> {
    match (lit, subject_val) {
        (LiteralPattern::Int(v), inkwell::values::BasicValueEnum::IntValue(subj)) => {
            let constant = subj.get_type().const_int(*v as u64, true);
            ctx.builder
                .build_int_compare(IntPredicate::EQ, subj, constant, "pat.eq")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (LiteralPattern::Bool(v), inkwell::values::BasicValueEnum::IntValue(subj)) => {
            let constant = subj.get_type().const_int(*v as u64, false);
            ctx.builder
                .build_int_compare(IntPredicate::EQ, subj, constant, "pat.eq")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (LiteralPattern::Char(v), inkwell::values::BasicValueEnum::IntValue(subj)) => {
            let constant = subj.get_type().const_int(*v as u64, false);
            ctx.builder
                .build_int_compare(IntPredicate::EQ, subj, constant, "pat.eq")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (LiteralPattern::Float(v), inkwell::values::BasicValueEnum::FloatValue(subj)) => {
            let constant = ctx.context.f64_type().const_float(*v);
            ctx.builder
                .build_float_compare(inkwell::FloatPredicate::OEQ, subj, constant, "pat.eq")
                .map_err(|e| CodegenError::LlvmError(e.to_string()))
        }
        (LiteralPattern::Str(_), _) => {
            // String-literal patterns need a runtime comparison helper;
            // fall back to the predeclared `asthra_string_eq` hook.
            Err(CodegenError::NotYetImplemented {
                span: asthra_ast::Span::synthetic(),
                message: "string literal patterns require asthra_string_eq at link time".to_string(),
            })
        }
        _ => Err(CodegenError::TypeMapping {
            span: asthra_ast::Span::synthetic(),
            message: "literal pattern does not match subject's value kind".to_string(),
        }),
    }
}

fn test_enum_pattern<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    enum_name: &str,
    variant: &str,
    binding: Option<&str>,
    subject_ty: asthra_ast::TypeId,
    subject_slot: inkwell::values::PointerValue<'ctx>,
    arm: &MatchArm,
) -> Result<inkwell::values::IntValue<'ctx>, CodegenError> {
    let desc = ctx.types.get(subject_ty).cloned();
    let enum_desc = match desc {
        Some(TypeDesc::Enum(e)) if e.name == enum_name => e,
        _ => {
            return Err(CodegenError::TypeMapping {
                span: arm.body.stmts.first().map(|s| s.span.clone()).unwrap_or_else(asthra_ast::Span::synthetic),
                message: format!("subject is not enum '{enum_name}'"),
            })
        }
    };
    let variant_idx = enum_desc.variant_index(variant).ok_or_else(|| CodegenError::TypeMapping {
        span: asthra_ast::Span::synthetic(),
        message: format!("enum '{enum_name}' has no variant '{variant}'"),
    })? as u64;

    // Enums are a bare i32 tag in this phase, so the subject's slot holds
    // the tag directly; no payload field exists to GEP into.
    let tag = ctx
        .builder
        .build_load(ctx.context.i32_type(), subject_slot, "tag")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?
        .into_int_value();
    let expected = ctx.context.i32_type().const_int(variant_idx, false);
    let cond = ctx
        .builder
        .build_int_compare(IntPredicate::EQ, tag, expected, "pat.tag.eq")
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;

    if binding.is_some() {
        return Err(CodegenError::NotYetImplemented {
            span: arm.body.stmts.first().map(|s| s.span.clone()).unwrap_or_else(asthra_ast::Span::synthetic),
            message: format!("variant '{variant}' has no payload to bind in this phase"),
        });
    }

    Ok(cond)
}
