//! Lowers [`ast::Stmt`].
//!
//! One function per statement kind, entry-block allocas via a scratch
//! builder positioned at the function's first instruction, generalized to
//! this crate's deferred value algebra and multi-file visibility model.

use inkwell::values::BasicValueEnum;

use crate::ast;
use crate::codegen::expression::{lower_expr, resolve_type_ref};
use crate::codegen::{concretize, CodegenContext, LoopContext};
use crate::diagnostics::{ErrorKind, Span};
use crate::symbols::VariableSymbol;
use crate::types::ResoType;
use crate::value::ConcreteResoValue;

fn unit_value<'ctx>(ctx: &CodegenContext<'ctx>) -> BasicValueEnum<'ctx> {
    ctx.context.const_struct(&[], false).into()
}

/// Alloca in the function's entry block regardless of which block is
/// currently open, so every local lives for the whole function the way LLVM
/// expects.
fn entry_alloca<'ctx>(
    ctx: &CodegenContext<'ctx>,
    llvm_ty: inkwell::types::BasicTypeEnum<'ctx>,
    name: &str,
) -> Option<inkwell::values::PointerValue<'ctx>> {
    let function = ctx.current_function()?;
    let entry = function.get_first_basic_block()?;
    let scratch = ctx.context.create_builder();
    match entry.get_first_instruction() {
        Some(first) => scratch.position_before(&first),
        None => scratch.position_at_end(entry),
    }
    scratch.build_alloca(llvm_ty, name).ok()
}

/// Lower one statement. Returns `Some(())` on success, `None` if a diagnostic
/// was already reported and the caller should stop lowering this block.
pub fn lower_stmt<'ctx>(ctx: &CodegenContext<'ctx>, stmt: &ast::Stmt) -> Option<()> {
    match stmt {
        ast::Stmt::VarDecl {
            name,
            declared_type,
            is_constant,
            init,
            span,
        } => lower_var_decl(ctx, name, declared_type.as_ref(), *is_constant, init, *span),
        ast::Stmt::Assign { target, op, value, span } => lower_assign(ctx, target, *op, value, *span),
        ast::Stmt::Expr(expr) => {
            lower_expr(ctx, expr)?;
            Some(())
        }
        ast::Stmt::If(if_stmt) => lower_if(ctx, if_stmt),
        ast::Stmt::While(while_stmt) => lower_while(ctx, while_stmt),
        ast::Stmt::Break(span) => lower_break(ctx, *span),
        ast::Stmt::Continue(span) => lower_continue(ctx, *span),
        ast::Stmt::Return { value, span } => lower_return(ctx, value.as_ref(), *span),
        ast::Stmt::Block(block) => lower_block(ctx, block),
    }
}

fn lower_var_decl<'ctx>(
    ctx: &CodegenContext<'ctx>,
    name: &str,
    declared_type: Option<&ast::TypeRef>,
    is_constant: bool,
    init: &ast::Expr,
    span: Span,
) -> Option<()> {
    let init_value = lower_expr(ctx, init)?;
    let target_ty = match declared_type {
        Some(ty) => resolve_type_ref(ctx, ty)?,
        None => init_value.default_type(ctx.options.pointer_width).or_else(|| {
            ctx.diagnostics.borrow_mut().report(
                ErrorKind::TypeMismatch {
                    expected: "a type annotation or an inferable initializer".to_string(),
                    actual: "a value with no default type".to_string(),
                },
                span,
            );
            None
        })?,
    };
    if !init_value.can_concretize_to(&target_ty, &ctx.registry, ctx.options.pointer_width) {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::TypeMismatch {
                expected: target_ty.to_string(),
                actual: init_value
                    .default_type(ctx.options.pointer_width)
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "an unresolvable value".to_string()),
            },
            span,
        );
        return None;
    }
    let concrete = concretize::concretize(ctx, init_value, &target_ty, span)?;

    let llvm_ty = ctx.llvm_type(&target_ty);
    let pointer = entry_alloca(ctx, llvm_ty, name)?;
    ctx.builder.build_store(pointer, concrete.ir_value).ok()?;

    let symbol = VariableSymbol::new(name, target_ty, pointer, is_constant, true);
    match ctx.symbols.define_variable(symbol) {
        Ok(()) => Some(()),
        Err(kind) => {
            ctx.diagnostics.borrow_mut().report(kind, span);
            None
        }
    }
}

fn lower_assign<'ctx>(
    ctx: &CodegenContext<'ctx>,
    target: &ast::AssignTarget,
    op: ast::AssignOp,
    value: &ast::Expr,
    span: Span,
) -> Option<()> {
    let (pointer, target_ty) = match target {
        ast::AssignTarget::Variable { name, span: var_span } => {
            let Some(var) = ctx.symbols.find_variable(name) else {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::UndefinedVariable { name: name.clone() },
                    *var_span,
                );
                return None;
            };
            if var.is_constant {
                if matches!(op, ast::AssignOp::Assign) {
                    match ctx.symbols.initialize_variable(name) {
                        Ok(()) => {}
                        Err(kind) => {
                            ctx.diagnostics.borrow_mut().report(kind, *var_span);
                            return None;
                        }
                    }
                } else {
                    ctx.diagnostics.borrow_mut().report(
                        ErrorKind::ConstReassignment { name: name.clone() },
                        *var_span,
                    );
                    return None;
                }
            } else if matches!(op, ast::AssignOp::Assign) {
                let _ = ctx.symbols.initialize_variable(name);
            }
            (var.pointer, var.reso_type.clone())
        }
        ast::AssignTarget::Field { receiver, field, span: field_span } => {
            let owner_value = lower_expr(ctx, receiver)?;
            let resource_id = match owner_value.default_type(ctx.options.pointer_width) {
                Some(ResoType::Resource(id)) => id,
                other => {
                    ctx.diagnostics.borrow_mut().report(
                        ErrorKind::TypeMismatch {
                            expected: "a resource".to_string(),
                            actual: other.map(|t| t.to_string()).unwrap_or_default(),
                        },
                        *field_span,
                    );
                    return None;
                }
            };
            let owner = concretize::concretize(ctx, owner_value, &ResoType::Resource(resource_id), *field_span)?;
            let (field_idx, field_ty, declaring_file, visibility) = {
                let data = ctx.registry.get(resource_id);
                let Some(idx) = data.field_index(field) else {
                    let name = data.name.clone();
                    drop(data);
                    ctx.diagnostics.borrow_mut().report(
                        ErrorKind::TypeMismatch {
                            expected: format!("a field named '{field}'"),
                            actual: name,
                        },
                        *field_span,
                    );
                    return None;
                };
                let ty = data.field_type(field).cloned().expect("index implies presence");
                (idx, ty, data.file, data.visibility)
            };
            if !visibility.is_accessible_from(declaring_file, ctx.symbols.current_file()) {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::VisibilityViolation { name: field.clone() },
                    *field_span,
                );
                return None;
            }
            let struct_ty = ctx.resource_struct_type(resource_id);
            let field_ptr = ctx
                .builder
                .build_struct_gep(struct_ty, owner.ir_value.into_pointer_value(), field_idx as u32, "field_ptr")
                .ok()?;
            (field_ptr, field_ty)
        }
    };

    let rhs_value = lower_expr(ctx, value)?;
    let new_value = if let Some(arith) = op.as_arith() {
        let current = load_current(ctx, pointer, &target_ty)?;
        combine_arith(ctx, arith, current, rhs_value, &target_ty, span)?
    } else if let Some(bitwise) = op.as_bitwise() {
        let current = load_current(ctx, pointer, &target_ty)?;
        combine_bitwise(ctx, bitwise, current, rhs_value, &target_ty, span)?
    } else {
        if !rhs_value.can_concretize_to(&target_ty, &ctx.registry, ctx.options.pointer_width) {
            ctx.diagnostics.borrow_mut().report(
                ErrorKind::TypeMismatch {
                    expected: target_ty.to_string(),
                    actual: rhs_value
                        .default_type(ctx.options.pointer_width)
                        .map(|t| t.to_string())
                        .unwrap_or_default(),
                },
                span,
            );
            return None;
        }
        concretize::concretize(ctx, rhs_value, &target_ty, span)?
    };

    ctx.builder.build_store(pointer, new_value.ir_value).ok()?;
    Some(())
}

fn load_current<'ctx>(
    ctx: &CodegenContext<'ctx>,
    pointer: inkwell::values::PointerValue<'ctx>,
    ty: &ResoType,
) -> Option<ConcreteResoValue<'ctx>> {
    let llvm_ty = ctx.llvm_type(ty);
    let loaded = ctx.builder.build_load(llvm_ty, pointer, "current").ok()?;
    Some(ConcreteResoValue::new(ty.clone(), loaded, Span::default()))
}

fn combine_arith<'ctx>(
    ctx: &CodegenContext<'ctx>,
    op: crate::value::ArithOp,
    current: ConcreteResoValue<'ctx>,
    rhs: crate::value::ResoValue<'ctx>,
    target_ty: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let combined = crate::value::ResoValue::Arithmetic(crate::value::ArithmeticValue {
        op,
        left: Box::new(crate::value::ResoValue::Concrete(current)),
        right: Box::new(rhs),
        span,
    });
    concretize::concretize(ctx, combined, target_ty, span)
}

fn combine_bitwise<'ctx>(
    ctx: &CodegenContext<'ctx>,
    op: crate::value::BitwiseOp,
    current: ConcreteResoValue<'ctx>,
    rhs: crate::value::ResoValue<'ctx>,
    target_ty: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let combined = crate::value::ResoValue::Bitwise(crate::value::BitwiseValue {
        op,
        left: Box::new(crate::value::ResoValue::Concrete(current)),
        right: Box::new(rhs),
        span,
    });
    concretize::concretize(ctx, combined, target_ty, span)
}

/// All branches of a block return iff its last statement does (conservative,
/// but earlier `return`s already stop lowering of the rest of the block via
/// the unreachable-code warning path).
pub(crate) fn block_always_returns(block: &ast::Block) -> bool {
    match block.stmts.last() {
        Some(ast::Stmt::Return { .. }) => true,
        Some(ast::Stmt::If(if_stmt)) => {
            if_stmt.else_block.is_some()
                && if_stmt.branches.iter().all(|(_, b)| block_always_returns(b))
                && if_stmt
                    .else_block
                    .as_ref()
                    .is_some_and(block_always_returns)
        }
        Some(ast::Stmt::Block(inner)) => block_always_returns(inner),
        _ => false,
    }
}

fn lower_if<'ctx>(ctx: &CodegenContext<'ctx>, if_stmt: &ast::IfStmt) -> Option<()> {
    let function = ctx.current_function()?;
    let needs_merge = !(if_stmt.else_block.is_some()
        && if_stmt.branches.iter().all(|(_, b)| block_always_returns(b))
        && if_stmt.else_block.as_ref().is_some_and(block_always_returns));
    let merge_block = if needs_merge {
        Some(ctx.context.append_basic_block(function, "if_merge"))
    } else {
        None
    };

    lower_if_chain(ctx, &if_stmt.branches, if_stmt.else_block.as_ref(), merge_block)?;

    if let Some(merge) = merge_block {
        ctx.builder.position_at_end(merge);
    }
    Some(())
}

fn lower_if_chain<'ctx>(
    ctx: &CodegenContext<'ctx>,
    branches: &[(ast::Expr, ast::Block)],
    else_block: Option<&ast::Block>,
    merge_block: Option<inkwell::basic_block::BasicBlock<'ctx>>,
) -> Option<()> {
    let Some(((cond, body), rest)) = branches.split_first() else {
        return match else_block {
            Some(block) => {
                let function = ctx.current_function()?;
                let body_block = ctx.context.append_basic_block(function, "else_body");
                ctx.builder.build_unconditional_branch(body_block).ok()?;
                ctx.builder.position_at_end(body_block);
                lower_block(ctx, block)?;
                if let Some(merge) = merge_block {
                    if ctx.builder.get_insert_block()?.get_terminator().is_none() {
                        ctx.builder.build_unconditional_branch(merge).ok()?;
                    }
                }
                Some(())
            }
            None => {
                if let Some(merge) = merge_block {
                    ctx.builder.build_unconditional_branch(merge).ok()?;
                }
                Some(())
            }
        };
    };

    let condition = lower_expr(ctx, cond)?;
    let condition = concretize::concretize(ctx, condition, &ResoType::Bool, cond.span())?;

    let function = ctx.current_function()?;
    let then_block = ctx.context.append_basic_block(function, "if_then");
    let next_block = ctx.context.append_basic_block(function, "if_next");
    ctx.builder
        .build_conditional_branch(condition.ir_value.into_int_value(), then_block, next_block)
        .ok()?;

    ctx.builder.position_at_end(then_block);
    lower_block(ctx, body)?;
    if let Some(merge) = merge_block {
        if ctx.builder.get_insert_block()?.get_terminator().is_none() {
            ctx.builder.build_unconditional_branch(merge).ok()?;
        }
    }

    ctx.builder.position_at_end(next_block);
    lower_if_chain(ctx, rest, else_block, merge_block)
}

fn lower_while<'ctx>(ctx: &CodegenContext<'ctx>, while_stmt: &ast::WhileStmt) -> Option<()> {
    let function = ctx.current_function()?;
    let header_block = ctx.context.append_basic_block(function, "while_header");
    let body_block = ctx.context.append_basic_block(function, "while_body");
    let exit_block = ctx.context.append_basic_block(function, "while_exit");

    ctx.builder.build_unconditional_branch(header_block).ok()?;
    ctx.builder.position_at_end(header_block);
    let condition = lower_expr(ctx, &while_stmt.condition)?;
    let condition = concretize::concretize(ctx, condition, &ResoType::Bool, while_stmt.condition.span())?;
    ctx.builder
        .build_conditional_branch(condition.ir_value.into_int_value(), body_block, exit_block)
        .ok()?;

    ctx.builder.position_at_end(body_block);
    ctx.push_loop(LoopContext {
        continue_block: header_block,
        break_block: exit_block,
    });
    lower_block(ctx, &while_stmt.body)?;
    ctx.pop_loop();
    if ctx.builder.get_insert_block()?.get_terminator().is_none() {
        ctx.builder.build_unconditional_branch(header_block).ok()?;
    }

    ctx.builder.position_at_end(exit_block);
    Some(())
}

fn lower_break<'ctx>(ctx: &CodegenContext<'ctx>, span: Span) -> Option<()> {
    let Some(loop_ctx) = ctx.innermost_loop() else {
        ctx.diagnostics
            .borrow_mut()
            .report(ErrorKind::LoopControlOutsideLoop { keyword: "break" }, span);
        return None;
    };
    ctx.builder.build_unconditional_branch(loop_ctx.break_block).ok()?;
    Some(())
}

fn lower_continue<'ctx>(ctx: &CodegenContext<'ctx>, span: Span) -> Option<()> {
    let Some(loop_ctx) = ctx.innermost_loop() else {
        ctx.diagnostics
            .borrow_mut()
            .report(ErrorKind::LoopControlOutsideLoop { keyword: "continue" }, span);
        return None;
    };
    ctx.builder.build_unconditional_branch(loop_ctx.continue_block).ok()?;
    Some(())
}

fn lower_return<'ctx>(ctx: &CodegenContext<'ctx>, value: Option<&ast::Expr>, span: Span) -> Option<()> {
    if !ctx.symbols.in_function() {
        ctx.diagnostics.borrow_mut().report(ErrorKind::ReturnOutsideFunction, span);
        return None;
    }
    let expected = ctx.symbols.current_return_type().expect("in_function checked above");

    match value {
        None => {
            if expected != ResoType::Unit {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::ReturnMissingValue {
                        expected: expected.to_string(),
                    },
                    span,
                );
                return None;
            }
            ctx.builder.build_return(Some(&unit_value(ctx))).ok()?;
        }
        Some(expr) => {
            let value = lower_expr(ctx, expr)?;
            if !value.can_concretize_to(&expected, &ctx.registry, ctx.options.pointer_width) {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::ReturnWrongType {
                        expected: expected.to_string(),
                        actual: value
                            .default_type(ctx.options.pointer_width)
                            .map(|t| t.to_string())
                            .unwrap_or_default(),
                    },
                    span,
                );
                return None;
            }
            let concrete = concretize::concretize(ctx, value, &expected, span)?;
            ctx.builder.build_return(Some(&concrete.ir_value)).ok()?;
        }
    }
    Some(())
}

/// Lower every statement in order; stop (and warn once) as soon as the
/// current block already has a terminator, since anything after it is dead
/// code.
pub fn lower_block<'ctx>(ctx: &CodegenContext<'ctx>, block: &ast::Block) -> Option<()> {
    ctx.symbols.enter_block_scope();
    ctx.diagnostics.borrow_mut().reset_unreachable_latch();
    for stmt in &block.stmts {
        if let Some(current) = ctx.builder.get_insert_block() {
            if current.get_terminator().is_some() {
                ctx.diagnostics.borrow_mut().warn_unreachable_once(block.span);
                break;
            }
        }
        lower_stmt(ctx, stmt);
    }
    match ctx.symbols.exit_scope() {
        Ok(()) => Some(()),
        Err(kind) => {
            ctx.diagnostics.borrow_mut().report(kind, block.span);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenOptions;
    use crate::types::{IntWidth, TypeRegistry};
    use inkwell::context::Context;
    use std::rc::Rc;

    fn returning_block() -> ast::Block {
        ast::Block {
            stmts: vec![ast::Stmt::Return {
                value: None,
                span: Span::default(),
            }],
            span: Span::default(),
        }
    }

    fn non_returning_block() -> ast::Block {
        ast::Block {
            stmts: vec![ast::Stmt::Expr(ast::Expr::NullLiteral { span: Span::default() })],
            span: Span::default(),
        }
    }

    #[test]
    fn block_ending_in_return_always_returns() {
        assert!(block_always_returns(&returning_block()));
    }

    #[test]
    fn block_ending_in_an_expression_does_not_always_return() {
        assert!(!block_always_returns(&non_returning_block()));
    }

    #[test]
    fn nested_block_wrapping_a_return_always_returns() {
        let wrapper = ast::Block {
            stmts: vec![ast::Stmt::Block(returning_block())],
            span: Span::default(),
        };
        assert!(block_always_returns(&wrapper));
    }

    #[test]
    fn if_without_else_never_always_returns() {
        let if_stmt = ast::IfStmt {
            branches: vec![(ast::Expr::BoolLiteral { value: true, span: Span::default() }, returning_block())],
            else_block: None,
            span: Span::default(),
        };
        let wrapper = ast::Block {
            stmts: vec![ast::Stmt::If(if_stmt)],
            span: Span::default(),
        };
        assert!(!block_always_returns(&wrapper));
    }

    #[test]
    fn if_else_where_every_branch_returns_always_returns() {
        let if_stmt = ast::IfStmt {
            branches: vec![(ast::Expr::BoolLiteral { value: true, span: Span::default() }, returning_block())],
            else_block: Some(returning_block()),
            span: Span::default(),
        };
        let wrapper = ast::Block {
            stmts: vec![ast::Stmt::If(if_stmt)],
            span: Span::default(),
        };
        assert!(block_always_returns(&wrapper));
    }

    #[test]
    fn if_else_with_one_non_returning_arm_does_not_always_return() {
        let if_stmt = ast::IfStmt {
            branches: vec![(ast::Expr::BoolLiteral { value: true, span: Span::default() }, non_returning_block())],
            else_block: Some(returning_block()),
            span: Span::default(),
        };
        let wrapper = ast::Block {
            stmts: vec![ast::Stmt::If(if_stmt)],
            span: Span::default(),
        };
        assert!(!block_always_returns(&wrapper));
    }

    fn harness<'ctx>(context: &'ctx Context, module_name: &str) -> (CodegenContext<'ctx>, inkwell::values::FunctionValue<'ctx>) {
        let registry = Rc::new(TypeRegistry::new());
        let ctx = CodegenContext::new(context, module_name, registry, CodegenOptions::default());
        let fn_type = context.i32_type().fn_type(&[], false);
        let function = ctx.module.add_function("f", fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        ctx.builder.position_at_end(entry);
        ctx.enter_function(function);
        (ctx, function)
    }

    #[test]
    fn if_else_where_both_branches_return_elides_the_merge_block() {
        let context = Context::create();
        let (ctx, function) = harness(&context, "stmt_test_elide");
        ctx.symbols.enter_function_scope(ResoType::Int(IntWidth::I32));

        let span = Span::default();
        let then_block = ast::Block {
            stmts: vec![ast::Stmt::Return {
                value: Some(ast::Expr::IntLiteral { text: "1".into(), span }),
                span,
            }],
            span,
        };
        let else_block = ast::Block {
            stmts: vec![ast::Stmt::Return {
                value: Some(ast::Expr::IntLiteral { text: "0".into(), span }),
                span,
            }],
            span,
        };
        let if_stmt = ast::IfStmt {
            branches: vec![(ast::Expr::BoolLiteral { value: true, span }, then_block)],
            else_block: Some(else_block),
            span,
        };

        let blocks_before = function.get_basic_blocks().len();
        lower_if(&ctx, &if_stmt).expect("lowers");
        let blocks_after = function.get_basic_blocks().len();

        // if_then, if_next, else_body — no if_merge since both arms return.
        assert_eq!(blocks_after - blocks_before, 3);
        assert!(function
            .get_basic_blocks()
            .iter()
            .all(|b| b.get_name().to_str().unwrap() != "if_merge"));
    }

    #[test]
    fn if_without_else_keeps_the_merge_block() {
        let context = Context::create();
        let (ctx, _function) = harness(&context, "stmt_test_merge");
        ctx.symbols.enter_function_scope(ResoType::Unit);

        let span = Span::default();
        let if_stmt = ast::IfStmt {
            branches: vec![(
                ast::Expr::BoolLiteral { value: true, span },
                ast::Block { stmts: Vec::new(), span },
            )],
            else_block: None,
            span,
        };

        lower_if(&ctx, &if_stmt).expect("lowers");
        assert!(ctx
            .current_function()
            .unwrap()
            .get_basic_blocks()
            .iter()
            .any(|b| b.get_name().to_str().unwrap() == "if_merge"));
    }
}
