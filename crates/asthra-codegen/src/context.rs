//! Per-compilation-unit lowering state: the LLVM module/builder plus the
//! local-variable table and loop-context stack.
//!
//! `lmlang-codegen::codegen` tracks SSA values in a flat
//! `HashMap<NodeId, BasicValueEnum>` because its input is a dataflow graph.
//! Since our input is a lexically-scoped tree, the equivalent state is a
//! stack of scopes that push on block entry and pop on exit: entering a
//! block may shadow an outer binding, and leaving it must restore the prior
//! one.

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::basic_block::BasicBlock;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};

use asthra_ast::{TypeId, TypeRegistry};

use crate::debug_info::DebugCtx;

/// A single lexical scope of named local slots.
type Scope<'ctx> = HashMap<String, (PointerValue<'ctx>, TypeId)>;

/// `(continue_target, break_target)` pair, pushed per enclosing loop.
#[derive(Clone, Copy)]
pub struct LoopTargets<'ctx> {
    pub continue_target: BasicBlock<'ctx>,
    pub break_target: BasicBlock<'ctx>,
}

/// All mutable state threaded through expression/statement lowering for one
/// compilation unit.
pub struct LoweringContext<'ctx, 'a> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub types: &'a TypeRegistry,

    /// Entry-block allocas for the function currently being lowered.
    locals: Vec<Scope<'ctx>>,
    /// Loop-context stack.
    loop_stack: Vec<LoopTargets<'ctx>>,
    /// Cache of LLVM types already materialized per [`TypeId`].
    llvm_type_cache: HashMap<TypeId, BasicTypeEnum<'ctx>>,
    /// Predeclared runtime builtins and user globals, declared on first use.
    declared_functions: HashMap<String, FunctionValue<'ctx>>,
    /// The function currently being lowered, if any.
    pub current_function: Option<FunctionValue<'ctx>>,
    /// The declared return type of the function currently being lowered.
    pub current_return_type: Option<TypeId>,
    /// Monotonic counter giving string-literal globals unique names.
    string_literal_counter: u32,
    /// Debug-info builder, present only when debug info is enabled.
    pub debug: Option<DebugCtx<'ctx>>,
}

impl<'ctx, 'a> LoweringContext<'ctx, 'a> {
    pub fn new(
        context: &'ctx Context,
        module: Module<'ctx>,
        types: &'a TypeRegistry,
        debug: Option<DebugCtx<'ctx>>,
    ) -> Self {
        let builder = context.create_builder();
        LoweringContext {
            context,
            module,
            builder,
            types,
            locals: Vec::new(),
            loop_stack: Vec::new(),
            llvm_type_cache: HashMap::new(),
            declared_functions: HashMap::new(),
            current_function: None,
            current_return_type: None,
            string_literal_counter: 0,
            debug,
        }
    }

    // -- Local-variable table --------------------------------------------

    /// Clears the local table; called at function entry.
    pub fn reset_locals(&mut self) {
        self.locals.clear();
        self.locals.push(Scope::new());
    }

    pub fn push_scope(&mut self) {
        self.locals.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        self.locals.pop();
    }

    pub fn bind_local(&mut self, name: impl Into<String>, slot: PointerValue<'ctx>, ty: TypeId) {
        self.locals
            .last_mut()
            .expect("bind_local called with no active scope")
            .insert(name.into(), (slot, ty));
    }

    /// Innermost-scope-first lookup, so inner `let`s shadow outer ones.
    pub fn lookup_local(&self, name: &str) -> Option<(PointerValue<'ctx>, TypeId)> {
        for scope in self.locals.iter().rev() {
            if let Some(&(slot, ty)) = scope.get(name) {
                return Some((slot, ty));
            }
        }
        None
    }

    // -- Loop-context stack ------------------------------------------------

    pub fn push_loop(&mut self, targets: LoopTargets<'ctx>) {
        self.loop_stack.push(targets);
    }

    pub fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub fn current_loop(&self) -> Option<LoopTargets<'ctx>> {
        self.loop_stack.last().copied()
    }

    // -- Type cache ---------------------------------------------------------

    pub fn cached_type(&self, id: TypeId) -> Option<BasicTypeEnum<'ctx>> {
        self.llvm_type_cache.get(&id).copied()
    }

    pub fn cache_type(&mut self, id: TypeId, ty: BasicTypeEnum<'ctx>) {
        self.llvm_type_cache.insert(id, ty);
    }

    // -- Declared functions --------------------------------------------------

    pub fn declared_function(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        self.declared_functions.get(name).copied()
    }

    pub fn remember_function(&mut self, name: impl Into<String>, f: FunctionValue<'ctx>) {
        self.declared_functions.insert(name.into(), f);
    }

    pub fn next_string_literal_name(&mut self) -> String {
        let n = self.string_literal_counter;
        self.string_literal_counter += 1;
        format!(".str.{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;

    #[test]
    fn locals_shadow_on_nested_scope() {
        let context = Context::create();
        let module = context.create_module("test");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);
        ctx.reset_locals();

        let fn_type = context.void_type().fn_type(&[], false);
        let function = ctx.module.add_function("f", fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        ctx.builder.position_at_end(entry);

        let slot_outer = ctx.builder.build_alloca(context.i32_type(), "x").unwrap();
        ctx.bind_local("x", slot_outer, TypeId::I32);

        ctx.push_scope();
        let slot_inner = ctx.builder.build_alloca(context.i64_type(), "x").unwrap();
        ctx.bind_local("x", slot_inner, TypeId::I64);
        let (_, ty) = ctx.lookup_local("x").unwrap();
        assert_eq!(ty, TypeId::I64);
        ctx.pop_scope();

        let (_, ty) = ctx.lookup_local("x").unwrap();
        assert_eq!(ty, TypeId::I32);
    }

    #[test]
    fn loop_stack_push_pop() {
        let context = Context::create();
        let module = context.create_module("test");
        let registry = TypeRegistry::new();
        let mut ctx = LoweringContext::new(&context, module, &registry, None);

        let fn_type = context.void_type().fn_type(&[], false);
        let function = ctx.module.add_function("f", fn_type, None);
        let bb1 = context.append_basic_block(function, "a");
        let bb2 = context.append_basic_block(function, "b");

        assert!(ctx.current_loop().is_none());
        ctx.push_loop(LoopTargets {
            continue_target: bb1,
            break_target: bb2,
        });
        assert!(ctx.current_loop().is_some());
        ctx.pop_loop();
        assert!(ctx.current_loop().is_none());
    }
}
