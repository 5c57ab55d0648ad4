//! Predeclared runtime builtins and the C-ABI `main` wrapper's runtime
//! hooks.
//!
//! `lmlang_codegen::runtime` predeclares its agent-runtime intrinsics on
//! first use (`get_or_declare`-style helper keyed by name). We follow the
//! same on-first-use declaration pattern for the fixed builtin set: `log`,
//! `panic`, `args`, `exit`, `string_concat`, plus the two lifecycle hooks
//! the `main` wrapper calls.

use inkwell::values::FunctionValue;
use inkwell::AddressSpace;

use crate::context::LoweringContext;

/// Declares (or returns the cached declaration for) one of the predeclared
/// runtime builtins callable from user code without an explicit `extern`.
pub fn declare_builtin<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
    name: &str,
) -> Option<FunctionValue<'ctx>> {
    if let Some(existing) = ctx.declared_function(name) {
        return Some(existing);
    }
    let context = ctx.context;
    let i8_ptr = context.ptr_type(AddressSpace::default());
    let i32_ty = context.i32_type();
    let void_ty = context.void_type();

    let function = match name {
        // fn log(msg: string)
        "log" => {
            let fn_type = void_ty.fn_type(&[i8_ptr.into()], false);
            ctx.module.add_function("asthra_simple_log", fn_type, None)
        }
        // fn panic(msg: string) -> never
        "panic" => {
            let fn_type = void_ty.fn_type(&[i8_ptr.into()], false);
            ctx.module.add_function("asthra_panic", fn_type, None)
        }
        // fn args() -> [string]
        "args" => {
            let fn_type = i8_ptr.fn_type(&[], false);
            ctx.module.add_function("asthra_runtime_get_args_simple", fn_type, None)
        }
        // fn exit(code: i32) -> never
        "exit" => {
            let fn_type = void_ty.fn_type(&[i32_ty.into()], false);
            ctx.module.add_function("asthra_exit", fn_type, None)
        }
        // fn string_concat(a: string, b: string) -> string
        "string_concat" => {
            let fn_type = i8_ptr.fn_type(&[i8_ptr.into(), i8_ptr.into()], false);
            ctx.module.add_function("asthra_string_concat", fn_type, None)
        }
        _ => return None,
    };
    ctx.remember_function(name, function);
    Some(function)
}

/// Declares `asthra_runtime_init_with_args`/`asthra_runtime_cleanup`, the
/// two lifecycle hooks the generated `main` wrapper calls around the
/// renamed entry point. `init` takes a config pointer (always `NULL` from
/// the wrapper), `argc`, and `argv`, returning a status code the wrapper
/// checks before calling the entry point.
pub fn declare_lifecycle_hooks<'ctx>(
    ctx: &mut LoweringContext<'ctx, '_>,
) -> (FunctionValue<'ctx>, FunctionValue<'ctx>) {
    let context = ctx.context;
    let i32_ty = context.i32_type();
    let config_ptr = context.ptr_type(AddressSpace::default());
    let i8_ptr_ptr = context.ptr_type(AddressSpace::default());

    let init = ctx.declared_function("asthra_runtime_init_with_args").unwrap_or_else(|| {
        let fn_type = i32_ty.fn_type(&[config_ptr.into(), i32_ty.into(), i8_ptr_ptr.into()], false);
        let f = ctx
            .module
            .add_function("asthra_runtime_init_with_args", fn_type, None);
        ctx.remember_function("asthra_runtime_init_with_args", f);
        f
    });
    let cleanup = ctx.declared_function("asthra_runtime_cleanup").unwrap_or_else(|| {
        let fn_type = void_ty_fn(ctx, &[]);
        let f = ctx.module.add_function("asthra_runtime_cleanup", fn_type, None);
        ctx.remember_function("asthra_runtime_cleanup", f);
        f
    });
    (init, cleanup)
}

fn void_ty_fn<'ctx>(
    ctx: &LoweringContext<'ctx, '_>,
    params: &[inkwell::types::BasicMetadataTypeEnum<'ctx>],
) -> inkwell::types::FunctionType<'ctx> {
    ctx.context.void_type().fn_type(params, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use asthra_ast::TypeRegistry;

    #[test]
    fn builtins_declare_once_and_are_cached() {
        let context = Context::create();
        let module = context.create_module("t");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);

        let first = declare_builtin(&mut ctx, "log").unwrap();
        let second = declare_builtin(&mut ctx, "log").unwrap();
        assert_eq!(first.get_name(), second.get_name());
    }

    #[test]
    fn unknown_builtin_returns_none() {
        let context = Context::create();
        let module = context.create_module("t");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);
        assert!(declare_builtin(&mut ctx, "does_not_exist").is_none());
    }

    #[test]
    fn lifecycle_hooks_declared_with_expected_names() {
        let context = Context::create();
        let module = context.create_module("t");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);
        let (init, cleanup) = declare_lifecycle_hooks(&mut ctx);
        assert_eq!(init.get_name().to_str().unwrap(), "asthra_runtime_init_with_args");
        assert_eq!(cleanup.get_name().to_str().unwrap(), "asthra_runtime_cleanup");
    }

    #[test]
    fn init_hook_takes_config_argc_argv_and_returns_status() {
        let context = Context::create();
        let module = context.create_module("t");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);
        let (init, _) = declare_lifecycle_hooks(&mut ctx);
        let fn_ty = init.get_type();
        assert_eq!(fn_ty.count_param_types(), 3);
        assert!(fn_ty.get_return_type().is_some());
    }

    #[test]
    fn log_and_args_declare_the_renamed_runtime_symbols() {
        let context = Context::create();
        let module = context.create_module("t");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);
        let log = declare_builtin(&mut ctx, "log").unwrap();
        let args = declare_builtin(&mut ctx, "args").unwrap();
        assert_eq!(log.get_name().to_str().unwrap(), "asthra_simple_log");
        assert_eq!(args.get_name().to_str().unwrap(), "asthra_runtime_get_args_simple");
    }

    #[test]
    fn string_concat_declares_a_two_pointer_helper() {
        let context = Context::create();
        let module = context.create_module("t");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);
        let concat = declare_builtin(&mut ctx, "string_concat").unwrap();
        assert_eq!(concat.get_name().to_str().unwrap(), "asthra_string_concat");
        assert_eq!(concat.get_type().count_param_types(), 2);
    }
}
