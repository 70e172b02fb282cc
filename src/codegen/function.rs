//! Pass 3: emit bodies for every function and resource
//! method declared in passes 1 and 2.
//!
//! Entry block, one alloca per parameter, save/restore of the enclosing
//! function across nested emission, generalized to also emit resource
//! method bodies, whose first parameter is an implicit `this` and whose
//! next parameters are contributed by indexer path segments.

use inkwell::values::BasicValueEnum;

use crate::ast;
use crate::codegen::expression::resolve_type_ref;
use crate::codegen::statement::{block_always_returns, lower_block};
use crate::codegen::CodegenContext;
use crate::symbols::{PathSegment, VariableSymbol};
use crate::types::ResoType;

fn unit_value<'ctx>(ctx: &CodegenContext<'ctx>) -> BasicValueEnum<'ctx> {
    ctx.context.const_struct(&[], false).into()
}

/// Emit bodies for every top-level function in one compilation unit.
/// `main` additionally calls the GC initializer before its body runs.
pub fn emit_function_bodies<'ctx>(ctx: &CodegenContext<'ctx>, unit: &ast::CompilationUnit) {
    ctx.symbols.push_file(unit.file);
    for item in &unit.items {
        if let ast::TopLevelItem::Function(def) = item {
            emit_one_function(ctx, def);
        }
    }
    ctx.symbols.pop_file();
}

fn emit_one_function<'ctx>(ctx: &CodegenContext<'ctx>, def: &ast::FunctionDef) -> Option<()> {
    let symbol = ctx.symbols.lookup_function(&def.name)?;
    let function = symbol.ir_value?;

    let previous = ctx.enter_function(function);
    let entry = ctx.context.append_basic_block(function, "entry");
    ctx.builder.position_at_end(entry);

    if def.name == "main" {
        ctx.builder.build_call(ctx.gc_init_fn(), &[], "").ok()?;
    }

    ctx.symbols.enter_function_scope(symbol.return_type.clone());
    for (index, param) in def.params.iter().enumerate() {
        let param_ty = symbol.params[index].clone();
        let llvm_ty = ctx.llvm_type(&param_ty);
        let pointer = ctx.builder.build_alloca(llvm_ty, &param.name).ok()?;
        let arg = function.get_nth_param(index as u32)?;
        ctx.builder.build_store(pointer, arg).ok()?;
        let var = VariableSymbol::new(param.name.clone(), param_ty, pointer, false, true);
        let _ = ctx.symbols.define_variable(var);
    }

    lower_block(ctx, &def.body);
    ensure_terminated(ctx, &symbol.return_type, &def.body);

    match ctx.symbols.exit_scope() {
        Ok(()) => {}
        Err(kind) => ctx.diagnostics.borrow_mut().report(kind, def.span),
    }
    ctx.restore_function(previous);
    Some(())
}

/// Emit bodies for every resource method declared on resources in one
/// compilation unit.
pub fn emit_resource_method_bodies<'ctx>(ctx: &CodegenContext<'ctx>, unit: &ast::CompilationUnit) {
    ctx.symbols.push_file(unit.file);
    for item in &unit.items {
        if let ast::TopLevelItem::Resource(def) = item {
            emit_one_resource(ctx, def);
        }
    }
    ctx.symbols.pop_file();
}

fn emit_one_resource<'ctx>(ctx: &CodegenContext<'ctx>, def: &ast::ResourceDef) {
    let Some(resource_id) = ctx.registry.lookup_by_name(&def.name) else {
        return;
    };
    for group in &def.paths {
        let path: Option<Vec<PathSegment>> = group
            .segments
            .iter()
            .map(|seg| match seg {
                ast::PathSegmentDef::Ident(name) => Some(PathSegment::Ident(name.clone())),
                ast::PathSegmentDef::Indexer { name, ty } => {
                    resolve_type_ref(ctx, ty).map(|resolved| PathSegment::Indexer {
                        name: name.clone(),
                        ty: resolved,
                    })
                }
            })
            .collect();
        let Some(path) = path else { continue };
        let path_str = crate::symbols::path_to_string(&path);
        for method in &group.methods {
            emit_one_method(ctx, resource_id, &path_str, method);
        }
    }
}

fn emit_one_method<'ctx>(
    ctx: &CodegenContext<'ctx>,
    resource_id: crate::types::ResourceTypeId,
    path_str: &str,
    method: &ast::MethodDef,
) -> Option<()> {
    let symbol = ctx.registry.find_method(resource_id, path_str, &method.name)?;
    let function = symbol.ir_value?;

    let previous = ctx.enter_function(function);
    let entry = ctx.context.append_basic_block(function, "entry");
    ctx.builder.position_at_end(entry);
    ctx.symbols.enter_function_scope(symbol.return_type.clone());

    let mut index = 0u32;
    let this_ty = ResoType::Resource(resource_id);
    let this_ptr = ctx.builder.build_alloca(ctx.llvm_type(&this_ty), "this").ok()?;
    ctx.builder
        .build_store(this_ptr, function.get_nth_param(index)?)
        .ok()?;
    let _ = ctx.symbols.define_variable(VariableSymbol::new("this", this_ty, this_ptr, true, true));
    index += 1;

    for (name, ty) in symbol.indexer_params() {
        let llvm_ty = ctx.llvm_type(ty);
        let pointer = ctx.builder.build_alloca(llvm_ty, name).ok()?;
        ctx.builder.build_store(pointer, function.get_nth_param(index)?).ok()?;
        let _ = ctx
            .symbols
            .define_variable(VariableSymbol::new(name, ty.clone(), pointer, false, true));
        index += 1;
    }

    for param in &method.params {
        let param_ty = symbol.params[index as usize].clone();
        let llvm_ty = ctx.llvm_type(&param_ty);
        let pointer = ctx.builder.build_alloca(llvm_ty, &param.name).ok()?;
        ctx.builder.build_store(pointer, function.get_nth_param(index)?).ok()?;
        let _ = ctx
            .symbols
            .define_variable(VariableSymbol::new(param.name.clone(), param_ty, pointer, false, true));
        index += 1;
    }

    lower_block(ctx, &method.body);
    ensure_terminated(ctx, &symbol.return_type, &method.body);

    match ctx.symbols.exit_scope() {
        Ok(()) => {}
        Err(kind) => ctx.diagnostics.borrow_mut().report(kind, method.span),
    }
    ctx.restore_function(previous);
    Some(())
}

/// If the body doesn't provably end in a `return` on every path and the
/// current insertion block has no terminator, synthesize an implicit
/// return: const unit for `()`, const zero for `main`'s `i32`, otherwise a
/// `ReturnMissingValue` diagnostic.
fn ensure_terminated<'ctx>(ctx: &CodegenContext<'ctx>, return_type: &ResoType, body: &ast::Block) {
    if block_always_returns(body) {
        return;
    }
    let Some(current) = ctx.builder.get_insert_block() else {
        return;
    };
    if current.get_terminator().is_some() {
        return;
    }
    if *return_type == ResoType::Unit {
        let _ = ctx.builder.build_return(Some(&unit_value(ctx)));
        return;
    }
    let is_main = ctx
        .current_function()
        .map(|f| f.get_name().to_string_lossy() == "main")
        .unwrap_or(false);
    if is_main && matches!(return_type, ResoType::Int(crate::types::IntWidth::I32)) {
        let i32_ty = ctx.llvm_type(return_type).into_int_type();
        let zero = i32_ty.const_int(0, false);
        let _ = ctx.builder.build_return(Some(&zero));
        return;
    }
    ctx.diagnostics.borrow_mut().report(
        crate::diagnostics::ErrorKind::ReturnMissingValue {
            expected: return_type.to_string(),
        },
        body.span,
    );
    let _ = ctx.builder.build_unreachable();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenOptions;
    use crate::diagnostics::{ErrorKind, Span};
    use crate::types::{IntWidth, TypeRegistry};
    use inkwell::context::Context;
    use inkwell::values::InstructionOpcode;
    use std::rc::Rc;

    fn harness<'ctx>(
        context: &'ctx Context,
        name: &str,
        fn_type: inkwell::types::FunctionType<'ctx>,
    ) -> CodegenContext<'ctx> {
        let registry = Rc::new(TypeRegistry::new());
        let ctx = CodegenContext::new(context, "function_test", registry, CodegenOptions::default());
        let function = ctx.module.add_function(name, fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        ctx.builder.position_at_end(entry);
        ctx.enter_function(function);
        ctx
    }

    fn empty_block() -> ast::Block {
        ast::Block {
            stmts: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn falling_off_a_unit_function_synthesizes_a_unit_return() {
        let context = Context::create();
        let fn_type = context.struct_type(&[], false).fn_type(&[], false);
        let ctx = harness(&context, "f", fn_type);

        ensure_terminated(&ctx, &ResoType::Unit, &empty_block());

        let block = ctx.builder.get_insert_block().unwrap();
        assert!(block.get_terminator().is_some());
        assert!(!ctx.diagnostics.borrow().had_errors());
    }

    #[test]
    fn falling_off_main_synthesizes_a_const_zero_return() {
        let context = Context::create();
        let fn_type = context.i32_type().fn_type(&[], false);
        let ctx = harness(&context, "main", fn_type);

        ensure_terminated(&ctx, &ResoType::Int(IntWidth::I32), &empty_block());

        let block = ctx.builder.get_insert_block().unwrap();
        let terminator = block.get_terminator().expect("implicit return synthesized");
        assert_eq!(terminator.get_opcode(), InstructionOpcode::Return);
        let returned = terminator
            .get_operand(0)
            .expect("return carries a value")
            .left()
            .expect("operand is a value, not a block")
            .into_int_value();
        assert_eq!(returned.get_zero_extended_constant(), Some(0));
        assert!(!ctx.diagnostics.borrow().had_errors());
    }

    #[test]
    fn falling_off_a_non_main_non_unit_function_reports_return_missing_value() {
        let context = Context::create();
        let fn_type = context.i32_type().fn_type(&[], false);
        let ctx = harness(&context, "helper", fn_type);

        ensure_terminated(&ctx, &ResoType::Int(IntWidth::I32), &empty_block());

        let block = ctx.builder.get_insert_block().unwrap();
        let terminator = block.get_terminator().expect("unreachable still terminates the block");
        assert_eq!(terminator.get_opcode(), InstructionOpcode::Unreachable);
        assert!(ctx
            .diagnostics
            .borrow()
            .entries()
            .iter()
            .any(|d| matches!(d.kind, ErrorKind::ReturnMissingValue { .. })));
    }

    #[test]
    fn ensure_terminated_is_a_noop_once_the_block_already_returns() {
        let context = Context::create();
        let fn_type = context.i32_type().fn_type(&[], false);
        let ctx = harness(&context, "helper", fn_type);
        let block = ast::Block {
            stmts: vec![ast::Stmt::Return {
                value: None,
                span: Span::default(),
            }],
            span: Span::default(),
        };

        ensure_terminated(&ctx, &ResoType::Int(IntWidth::I32), &block);

        assert!(ctx.builder.get_insert_block().unwrap().get_terminator().is_none());
    }
}
