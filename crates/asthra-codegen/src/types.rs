//! C1: Type Lowering.
//!
//! Maps [`TypeDesc`] to LLVM IR types, following the mapping table verbatim.
//! Mirrors `lmlang-codegen/src/types.rs::lm_type_to_llvm`
//! shape (single recursive match over the descriptor, with struct/enum
//! bodies built from already-lowered field/variant types) but grown to the
//! wider descriptor set this specification defines.

use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::AddressSpace;

use asthra_ast::{IntKind, StructDesc, TypeDesc, TypeId};

use crate::context::LoweringContext;
use crate::error::CodegenError;

/// Recursively lowers a resolved type descriptor to its LLVM representation,
/// caching the result per [`TypeId`].
pub fn lower_type<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    id: TypeId,
) -> Result<BasicTypeEnum<'ctx>, CodegenError> {
    if let Some(cached) = ctx.cached_type(id) {
        return Ok(cached);
    }
    let desc = ctx.types.get(id).ok_or_else(|| CodegenError::TypeMapping {
        span: asthra_ast::Span::synthetic(),
        message: format!("unknown type id {id}"),
    })?;
    let llvm_ty = lower_desc(ctx, desc.clone(), id)?;
    ctx.cache_type(id, llvm_ty);
    Ok(llvm_ty)
}

fn lower_desc<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    desc: TypeDesc,
    id: TypeId,
) -> Result<BasicTypeEnum<'ctx>, CodegenError> {
    let context = ctx.context;
    Ok(match desc {
        TypeDesc::Int(kind) => int_type(ctx, kind).into(),
        TypeDesc::F32 => context.f32_type().into(),
        TypeDesc::F64 => context.f64_type().into(),
        TypeDesc::Bool => context.bool_type().into(),
        // Strings lower to an opaque byte pointer; length and ownership are
        // the runtime's concern, not the IR's.
        TypeDesc::String => context.ptr_type(AddressSpace::default()).into(),
        TypeDesc::Char => context.i32_type().into(),
        // `void`/`never`/`unit` have no runtime representation as a value
        // type; callers use LLVM's `void` return type instead, so a zero-
        // sized struct stands in wherever a `BasicTypeEnum` is required.
        TypeDesc::Void | TypeDesc::Never | TypeDesc::Unit => {
            context.struct_type(&[], false).into()
        }
        TypeDesc::Pointer { pointee, .. } => {
            // Opaque-ish: LLVM pointer types don't encode pointee in recent
            // versions, but we still lower the pointee to surface type
            // errors eagerly.
            lower_type(ctx, pointee)?;
            context.ptr_type(AddressSpace::default()).into()
        }
        TypeDesc::Slice { element } => {
            lower_type(ctx, element)?;
            // `{ T*, i64 }`
            context
                .struct_type(
                    &[
                        context.ptr_type(AddressSpace::default()).into(),
                        context.i64_type().into(),
                    ],
                    false,
                )
                .into()
        }
        TypeDesc::Array { element, size } => {
            let elem_ty = lower_type(ctx, element)?;
            elem_ty.array_type(size as u32).into()
        }
        TypeDesc::Struct(ref s) => lower_struct(ctx, s)?.into(),
        // An enum is a bare 32-bit variant tag; this phase carries no
        // payload representation.
        TypeDesc::Enum(_) => context.i32_type().into(),
        TypeDesc::Tuple { elements } => {
            let mut field_tys = Vec::with_capacity(elements.len());
            for el in elements {
                field_tys.push(lower_type(ctx, el)?);
            }
            context.struct_type(&field_tys, false).into()
        }
        // `Option<T>` lowers to `{ i1 has_value, T payload }`.
        TypeDesc::Option { value_type } => {
            let payload = lower_type(ctx, value_type)?;
            context
                .struct_type(&[context.bool_type().into(), payload], false)
                .into()
        }
        // `Result<T, E>` lowers to `{ i32 tag, [max(sizeof T, sizeof E)] }`,
        // approximated here as a struct holding both side by side since we
        // do not compute exact byte sizes at this layer; the object writer
        // does not depend on the padding being minimal.
        TypeDesc::Result { ok_type, err_type } => {
            let ok_ty = lower_type(ctx, ok_type)?;
            let err_ty = lower_type(ctx, err_type)?;
            context
                .struct_type(&[context.i32_type().into(), ok_ty, err_ty], false)
                .into()
        }
        TypeDesc::Function { params, return_type } => {
            // Functions aren't first-class basic values without an explicit
            // closure representation, which is out of scope. We lower a bare function pointer.
            for p in &params {
                lower_type(ctx, *p)?;
            }
            lower_type(ctx, return_type)?;
            let _ = id;
            context.ptr_type(AddressSpace::default()).into()
        }
    })
}

fn int_type<'ctx>(ctx: &LoweringContext<'ctx, '_>, kind: IntKind) -> inkwell::types::IntType<'ctx> {
    ctx.context.custom_width_int_type(kind.bit_width())
}

fn lower_struct<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    s: &StructDesc,
) -> Result<inkwell::types::StructType<'ctx>, CodegenError> {
    let mut field_tys = Vec::with_capacity(s.fields.len());
    for &ty in s.fields.values() {
        field_tys.push(lower_type(ctx, ty)?);
    }
    Ok(ctx.context.struct_type(&field_tys, s.packed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use asthra_ast::TypeRegistry;

    fn fresh_ctx<'ctx>(
        context: &'ctx Context,
        registry: &'ctx TypeRegistry,
    ) -> LoweringContext<'ctx, 'ctx> {
        let module = context.create_module("t");
        LoweringContext::new(context, module, registry, None)
    }

    #[test]
    fn int_kinds_map_to_matching_bit_widths() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let mut ctx = fresh_ctx(&context, &registry);
        let ty = lower_type(&mut ctx, TypeId::I64).unwrap();
        assert!(matches!(ty, BasicTypeEnum::IntType(t) if t.get_bit_width() == 64));
    }

    #[test]
    fn bool_is_i1() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let mut ctx = fresh_ctx(&context, &registry);
        let ty = lower_type(&mut ctx, TypeId::BOOL).unwrap();
        assert!(matches!(ty, BasicTypeEnum::IntType(t) if t.get_bit_width() == 1));
    }

    #[test]
    fn type_lowering_is_cached() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let mut ctx = fresh_ctx(&context, &registry);
        let a = lower_type(&mut ctx, TypeId::I32).unwrap();
        let b = lower_type(&mut ctx, TypeId::I32).unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn string_lowers_to_opaque_pointer() {
        let context = Context::create();
        let registry = TypeRegistry::new();
        let mut ctx = fresh_ctx(&context, &registry);
        let ty = lower_type(&mut ctx, TypeId::STRING).unwrap();
        assert!(matches!(ty, BasicTypeEnum::PointerType(_)));
    }

    #[test]
    fn enum_lowers_to_bare_i32_tag() {
        let context = Context::create();
        let mut registry = TypeRegistry::new();
        let enum_id = registry
            .register_named(
                "Direction",
                TypeDesc::Enum(asthra_ast::EnumDesc {
                    name: "Direction".to_string(),
                    variants: [("North".to_string(), None)].into_iter().collect(),
                }),
            )
            .unwrap();
        let mut ctx = fresh_ctx(&context, &registry);
        let ty = lower_type(&mut ctx, enum_id).unwrap();
        assert!(matches!(ty, BasicTypeEnum::IntType(t) if t.get_bit_width() == 32));
    }
}
