//! Lowers [`ast::Expr`] into a [`ResoValue`], deferred where the value
//! algebra allows it and eagerly concretized everywhere else.
//!
//! One function per expression shape, `?`-propagating through
//! `Option`/`Result`, generalized from "always concrete" to "concrete or
//! deferred" per this crate's value algebra. Literal decoding (integer
//! bases, float exponents, string/char escapes) uses the `unescape` crate
//! for escape-sequence handling and otherwise follows the literal grammar
//! directly.

use inkwell::values::BasicMetadataValueEnum;

use crate::ast;
use crate::codegen::{builtins, concretize, convert, vector, CodegenContext};
use crate::diagnostics::{ErrorKind, Span};
use crate::symbols::PathSegment;
use crate::types::{IntWidth, ResoType, ResourceTypeId};
use crate::value::{
    ArithmeticValue, BitwiseValue, ComparisonValue, ConcreteResoValue, FloatLiteral, IntLiteral,
    LogicalOp, ResoValue, TernaryValue, UnaryValue, VectorCtorValue,
};

/// Resolve a source-level type reference, instantiating `Vector<T>`/`String`
/// on first use.
pub fn resolve_type_ref<'ctx>(ctx: &CodegenContext<'ctx>, ty: &ast::TypeRef) -> Option<ResoType> {
    if ty.name == "Vector" {
        if ty.generics.len() != 1 {
            ctx.diagnostics.borrow_mut().report(
                ErrorKind::UnknownType {
                    name: format!("Vector<{} type argument(s)>", ty.generics.len()),
                },
                ty.span,
            );
            return None;
        }
        let element = resolve_type_ref(ctx, &ty.generics[0])?;
        return Some(ResoType::Resource(builtins::ensure_vector_type(ctx, element)));
    }
    if ty.name == "String" {
        return Some(ResoType::Resource(builtins::ensure_string_type(ctx)));
    }
    match crate::types::resolve_type_by_name(&ty.name, &ctx.registry) {
        Some(t) => Some(t),
        None => {
            ctx.diagnostics
                .borrow_mut()
                .report(ErrorKind::UnknownType { name: ty.name.clone() }, ty.span);
            None
        }
    }
}

pub fn lower_expr<'ctx>(ctx: &CodegenContext<'ctx>, expr: &ast::Expr) -> Option<ResoValue<'ctx>> {
    match expr {
        ast::Expr::IntLiteral { text, span } => lower_int_literal(ctx, text, *span),
        ast::Expr::FloatLiteral { text, span } => lower_float_literal(ctx, text, *span),
        ast::Expr::BoolLiteral { value, span } => {
            let bool_ty = ctx.llvm_type(&ResoType::Bool).into_int_type();
            let ir = bool_ty.const_int(*value as u64, false);
            Some(ResoValue::Concrete(ConcreteResoValue::new(
                ResoType::Bool,
                ir.into(),
                *span,
            )))
        }
        ast::Expr::CharLiteral { text, span } => lower_char_literal(ctx, text, *span),
        ast::Expr::StringLiteral { text, span } => lower_string_literal(ctx, text, *span),
        ast::Expr::NullLiteral { span } => {
            let ptr_ty = ctx.context.ptr_type(inkwell::AddressSpace::default());
            Some(ResoValue::Concrete(ConcreteResoValue::new(
                ResoType::Null,
                ptr_ty.const_null().into(),
                *span,
            )))
        }
        ast::Expr::Identifier { name, span } => lower_identifier(ctx, name, *span),
        ast::Expr::Arithmetic { op, left, right, span } => {
            let left = lower_expr(ctx, left)?;
            let right = lower_expr(ctx, right)?;
            Some(ResoValue::Arithmetic(ArithmeticValue {
                op: *op,
                left: Box::new(left),
                right: Box::new(right),
                span: *span,
            }))
        }
        ast::Expr::Bitwise { op, left, right, span } => {
            let left = lower_expr(ctx, left)?;
            let right = lower_expr(ctx, right)?;
            Some(ResoValue::Bitwise(BitwiseValue {
                op: *op,
                left: Box::new(left),
                right: Box::new(right),
                span: *span,
            }))
        }
        ast::Expr::Comparison { op, left, right, span } => {
            let left = lower_expr(ctx, left)?;
            let right = lower_expr(ctx, right)?;
            Some(ResoValue::Comparison(ComparisonValue {
                op: *op,
                left: Box::new(left),
                right: Box::new(right),
                span: *span,
            }))
        }
        ast::Expr::Logical { op, left, right, span } => lower_logical(ctx, *op, left, right, *span),
        ast::Expr::Unary { op, operand, span } => {
            let operand = lower_expr(ctx, operand)?;
            Some(ResoValue::Unary(UnaryValue {
                op: *op,
                operand: Box::new(operand),
                span: *span,
            }))
        }
        ast::Expr::Ternary {
            condition,
            if_true,
            if_false,
            span,
        } => {
            let condition = lower_expr(ctx, condition)?;
            let if_true = lower_expr(ctx, if_true)?;
            let if_false = lower_expr(ctx, if_false)?;
            Some(ResoValue::Ternary(TernaryValue {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
                span: *span,
            }))
        }
        ast::Expr::Conversion { expr, target, span } => lower_conversion(ctx, expr, target, *span),
        ast::Expr::FieldAccess { receiver, field, span } => {
            lower_field_access(ctx, receiver, field, *span)
        }
        ast::Expr::MethodCall {
            receiver,
            path,
            method,
            args,
            span,
        } => lower_method_call(ctx, receiver, path, method, args, *span),
        ast::Expr::Call { callee, args, span } => lower_call(ctx, callee, args, *span),
        ast::Expr::ResourceInit {
            type_name,
            generics,
            fields,
            span,
        } => lower_resource_init(ctx, type_name, generics, fields, *span),
        ast::Expr::VectorCtor { element_type, span } => {
            let element = resolve_type_ref(ctx, element_type)?;
            builtins::ensure_vector_type(ctx, element);
            Some(ResoValue::VectorCtor(VectorCtorValue {
                type_name: "Vector".to_string(),
                span: *span,
            }))
        }
    }
}

// -- literal decoding --------------------------------------------------------

fn lower_int_literal<'ctx>(ctx: &CodegenContext<'ctx>, text: &str, span: Span) -> Option<ResoValue<'ctx>> {
    let Some((magnitude, negative)) = parse_int_literal(text) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::BadLiteral {
                reason: format!("invalid integer literal '{text}'"),
            },
            span,
        );
        return None;
    };
    Some(ResoValue::IntLiteral(IntLiteral {
        magnitude,
        negative,
        span,
    }))
}

/// `[-]([0x|0b|0o]digits)` with `_` separators allowed anywhere. A leading `-` folds directly into the literal rather than going
/// through `UnaryOp::Neg`, so `i8` can still represent `-128`.
fn parse_int_literal(text: &str) -> Option<(u64, bool)> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let cleaned: String = rest.chars().filter(|c| *c != '_').collect();
    let (radix, digits) = if let Some(d) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        (16, d)
    } else if let Some(d) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        (2, d)
    } else if let Some(d) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        (8, d)
    } else {
        (10, cleaned.as_str())
    };
    if digits.is_empty() {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    Some((magnitude, negative))
}

fn lower_float_literal<'ctx>(ctx: &CodegenContext<'ctx>, text: &str, span: Span) -> Option<ResoValue<'ctx>> {
    let Some(value) = parse_float_literal(text) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::BadLiteral {
                reason: format!("invalid floating-point literal '{text}'"),
            },
            span,
        );
        return None;
    };
    if !value.is_finite() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::BadLiteral {
                reason: format!("floating-point literal '{text}' must be finite"),
            },
            span,
        );
        return None;
    }
    Some(ResoValue::FloatLiteral(FloatLiteral { value, span }))
}

fn parse_float_literal(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<f64>().ok()
}

fn lower_char_literal<'ctx>(ctx: &CodegenContext<'ctx>, text: &str, span: Span) -> Option<ResoValue<'ctx>> {
    let Some(c) = decode_char_literal(text) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::BadLiteral {
                reason: format!("invalid character literal '{text}'"),
            },
            span,
        );
        return None;
    };
    let char_ty = ctx.llvm_type(&ResoType::Char).into_int_type();
    let ir = char_ty.const_int(c as u64, false);
    Some(ResoValue::Concrete(ConcreteResoValue::new(
        ResoType::Char,
        ir.into(),
        span,
    )))
}

fn decode_char_literal(text: &str) -> Option<char> {
    let unescaped = unescape::unescape(text)?;
    let mut chars = unescaped.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(c)
}

fn decode_string_literal(text: &str) -> Option<Vec<u8>> {
    Some(unescape::unescape(text)?.into_bytes())
}

/// Synthesize a `String` instance whose `data` field is a `Vector<u8>`
/// pointing directly at the interned global byte array, size and capacity
/// both `len(bytes) + 1` to include a trailing NUL.
fn lower_string_literal<'ctx>(ctx: &CodegenContext<'ctx>, text: &str, span: Span) -> Option<ResoValue<'ctx>> {
    let Some(bytes) = decode_string_literal(text) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::BadLiteral {
                reason: format!("invalid escape sequence in string literal '{text}'"),
            },
            span,
        );
        return None;
    };
    let mut with_nul = bytes;
    with_nul.push(0);
    let global_ptr = ctx.global_string(&with_nul);
    let usize_llvm = ctx.llvm_type(&ResoType::Int(IntWidth::USize)).into_int_type();
    let len = usize_llvm.const_int(with_nul.len() as u64, false);

    let vector_u8 = builtins::ensure_vector_type(ctx, ResoType::Int(IntWidth::U8));
    let data_vector = vector::emit_from_existing_buffer(ctx, vector_u8, global_ptr, len, span)?;

    let string_id = builtins::ensure_string_type(ctx);
    let struct_ty = ctx.resource_struct_type(string_id);
    let struct_size = struct_ty.size_of()?;
    let instance_ptr = ctx
        .builder
        .build_call(ctx.gc_malloc_fn(), &[struct_size.into()], "string_instance")
        .ok()?
        .try_as_basic_value()
        .left()?
        .into_pointer_value();
    let field_ptr = ctx
        .builder
        .build_struct_gep(struct_ty, instance_ptr, 0, "data_ptr")
        .ok()?;
    ctx.builder.build_store(field_ptr, data_vector.ir_value).ok()?;

    Some(ResoValue::Concrete(ConcreteResoValue::new(
        ResoType::Resource(string_id),
        instance_ptr.into(),
        span,
    )))
}

// -- identifiers / short-circuit logic ---------------------------------------

fn lower_identifier<'ctx>(ctx: &CodegenContext<'ctx>, name: &str, span: Span) -> Option<ResoValue<'ctx>> {
    match ctx.symbols.find_readable_variable(name) {
        Ok(var) => {
            let llvm_ty = ctx.llvm_type(&var.reso_type);
            let loaded = ctx.builder.build_load(llvm_ty, var.pointer, name).ok()?;
            Some(ResoValue::Concrete(ConcreteResoValue::new(
                var.reso_type.clone(),
                loaded,
                span,
            )))
        }
        Err(kind) => {
            ctx.diagnostics.borrow_mut().report(kind, span);
            None
        }
    }
}

fn unit_value<'ctx>(ctx: &CodegenContext<'ctx>) -> inkwell::values::BasicValueEnum<'ctx> {
    ctx.context.const_struct(&[], false).into()
}

/// `a and b` / `a or b`: real control flow, never evaluating `b` unless `a`'s
/// value doesn't already decide the result.
fn lower_logical<'ctx>(
    ctx: &CodegenContext<'ctx>,
    op: LogicalOp,
    left: &ast::Expr,
    right: &ast::Expr,
    span: Span,
) -> Option<ResoValue<'ctx>> {
    let left_value = lower_expr(ctx, left)?;
    let left_concrete = concretize::concretize(ctx, left_value, &ResoType::Bool, span)?;
    let function = ctx.current_function()?;
    let entry_block = ctx.builder.get_insert_block()?;

    let rhs_block = ctx.context.append_basic_block(function, "logical_rhs");
    let merge_block = ctx.context.append_basic_block(function, "logical_merge");
    let bool_ty = ctx.llvm_type(&ResoType::Bool).into_int_type();
    let short_circuit_value: inkwell::values::IntValue = match op {
        LogicalOp::And => bool_ty.const_int(0, false),
        LogicalOp::Or => bool_ty.const_int(1, false),
    };
    let left_ir = left_concrete.ir_value.into_int_value();
    match op {
        LogicalOp::And => ctx
            .builder
            .build_conditional_branch(left_ir, rhs_block, merge_block)
            .ok()?,
        LogicalOp::Or => ctx
            .builder
            .build_conditional_branch(left_ir, merge_block, rhs_block)
            .ok()?,
    };

    ctx.builder.position_at_end(rhs_block);
    let right_value = lower_expr(ctx, right)?;
    let right_concrete = concretize::concretize(ctx, right_value, &ResoType::Bool, span)?;
    let rhs_end_block = ctx.builder.get_insert_block()?;
    ctx.builder.build_unconditional_branch(merge_block).ok()?;

    ctx.builder.position_at_end(merge_block);
    let phi = ctx.builder.build_phi(bool_ty, "logical_result").ok()?;
    phi.add_incoming(&[
        (&short_circuit_value, entry_block),
        (&right_concrete.ir_value, rhs_end_block),
    ]);
    Some(ResoValue::Concrete(ConcreteResoValue::new(
        ResoType::Bool,
        phi.as_basic_value(),
        span,
    )))
}

// -- conversions, field access, calls ----------------------------------------

fn lower_conversion<'ctx>(
    ctx: &CodegenContext<'ctx>,
    expr: &ast::Expr,
    target: &ast::TypeRef,
    span: Span,
) -> Option<ResoValue<'ctx>> {
    let value = lower_expr(ctx, expr)?;
    let dst = resolve_type_ref(ctx, target)?;
    let concrete = concretize::concretize_to_default(ctx, value)?;
    convert::create_conversion(ctx, concrete, &dst, span).map(ResoValue::Concrete)
}

fn resource_id_of<'ctx>(
    ctx: &CodegenContext<'ctx>,
    value: &ResoValue<'ctx>,
    span: Span,
) -> Option<ResourceTypeId> {
    match value.default_type(ctx.options.pointer_width) {
        Some(ResoType::Resource(id)) => Some(id),
        Some(other) => {
            ctx.diagnostics.borrow_mut().report(
                ErrorKind::TypeMismatch {
                    expected: "a resource".to_string(),
                    actual: other.to_string(),
                },
                span,
            );
            None
        }
        None => {
            ctx.diagnostics.borrow_mut().report(
                ErrorKind::TypeMismatch {
                    expected: "a resource".to_string(),
                    actual: "a value with no default type".to_string(),
                },
                span,
            );
            None
        }
    }
}

/// Lower `expr`, check it can reach `target`, then concretize. Reports
/// `ArgConvertFail` (not `target`'s own mismatch kind) so call sites can point
/// at the argument index.
fn lower_arg<'ctx>(
    ctx: &CodegenContext<'ctx>,
    expr: &ast::Expr,
    target: &ResoType,
    index: usize,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let value = lower_expr(ctx, expr)?;
    if !value.can_concretize_to(target, &ctx.registry, ctx.options.pointer_width) {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::ArgConvertFail {
                index,
                expected: target.to_string(),
            },
            span,
        );
        return None;
    }
    concretize::concretize(ctx, value, target, expr.span())
}

fn lower_field_access<'ctx>(
    ctx: &CodegenContext<'ctx>,
    receiver: &ast::Expr,
    field: &str,
    span: Span,
) -> Option<ResoValue<'ctx>> {
    let owner_value = lower_expr(ctx, receiver)?;
    let resource_id = resource_id_of(ctx, &owner_value, span)?;
    let owner = concretize::concretize(ctx, owner_value, &ResoType::Resource(resource_id), span)?;

    let (field_idx, field_ty) = {
        let data = ctx.registry.get(resource_id);
        if !data.visibility.is_accessible_from(data.file, ctx.symbols.current_file()) {
            let name = data.name.clone();
            drop(data);
            ctx.diagnostics
                .borrow_mut()
                .report(ErrorKind::VisibilityViolation { name }, span);
            return None;
        }
        let Some(idx) = data.field_index(field) else {
            let name = data.name.clone();
            drop(data);
            ctx.diagnostics.borrow_mut().report(
                ErrorKind::TypeMismatch {
                    expected: format!("a field named '{field}'"),
                    actual: name,
                },
                span,
            );
            return None;
        };
        let ty = data.field_type(field).cloned().expect("index implies presence");
        (idx, ty)
    };

    let struct_ty = ctx.resource_struct_type(resource_id);
    let receiver_ptr = owner.ir_value.into_pointer_value();
    let field_ptr = ctx
        .builder
        .build_struct_gep(struct_ty, receiver_ptr, field_idx as u32, &format!("{field}_ptr"))
        .ok()?;
    let field_llvm = ctx.llvm_type(&field_ty);
    let loaded = ctx.builder.build_load(field_llvm, field_ptr, field).ok()?;
    Some(ResoValue::Concrete(ConcreteResoValue::new(field_ty, loaded, span)))
}

/// Render a call-site path the same way [`crate::symbols::path_to_string`]
/// renders a declared one: indexer *values* don't participate in the lookup
/// key, only the fact that a segment is an indexer does.
fn call_site_path_string(path: &[ast::PathAccess]) -> String {
    path.iter()
        .map(|seg| match seg {
            ast::PathAccess::Ident(name) => name.clone(),
            ast::PathAccess::Indexer(_) => PathSegment::Indexer {
                name: String::new(),
                ty: ResoType::Unit,
            }
            .to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn lower_method_call<'ctx>(
    ctx: &CodegenContext<'ctx>,
    receiver: &ast::Expr,
    path: &[ast::PathAccess],
    method: &str,
    args: &[ast::Expr],
    span: Span,
) -> Option<ResoValue<'ctx>> {
    let owner_value = lower_expr(ctx, receiver)?;
    let resource_id = resource_id_of(ctx, &owner_value, span)?;
    let owner = concretize::concretize(ctx, owner_value, &ResoType::Resource(resource_id), span)?;

    let path_str = call_site_path_string(path);
    let Some(method_symbol) = ctx.registry.find_method(resource_id, &path_str, method) else {
        let name = ctx.registry.get(resource_id).name.clone();
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::TypeMismatch {
                expected: format!("a method '{path_str}.{method}' on '{name}'"),
                actual: "no such method".to_string(),
            },
            span,
        );
        return None;
    };

    let resource_file = ctx.registry.get(resource_id).file;
    if !method_symbol
        .visibility
        .is_accessible_from(resource_file, ctx.symbols.current_file())
    {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::VisibilityViolation {
                name: method.to_string(),
            },
            span,
        );
        return None;
    }

    let indexer_types: Vec<ResoType> = method_symbol
        .path
        .iter()
        .filter_map(|seg| match seg {
            PathSegment::Indexer { ty, .. } => Some(ty.clone()),
            PathSegment::Ident(_) => None,
        })
        .collect();
    let indexer_exprs: Vec<&ast::Expr> = path
        .iter()
        .filter_map(|seg| match seg {
            ast::PathAccess::Indexer(e) => Some(e),
            ast::PathAccess::Ident(_) => None,
        })
        .collect();
    if indexer_exprs.len() != indexer_types.len() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::ArgCountMismatch {
                expected: indexer_types.len(),
                actual: indexer_exprs.len(),
            },
            span,
        );
        return None;
    }

    let mut concrete_args = Vec::with_capacity(method_symbol.params.len().saturating_sub(1));
    for (i, (expr, ty)) in indexer_exprs.iter().zip(indexer_types.iter()).enumerate() {
        concrete_args.push(lower_arg(ctx, expr, ty, i, span)?);
    }

    let explicit_param_types = &method_symbol.params[1 + indexer_types.len()..];
    if explicit_param_types.len() != args.len() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::ArgCountMismatch {
                expected: explicit_param_types.len(),
                actual: args.len(),
            },
            span,
        );
        return None;
    }
    for (i, (arg_expr, param_ty)) in args.iter().zip(explicit_param_types.iter()).enumerate() {
        concrete_args.push(lower_arg(ctx, arg_expr, param_ty, indexer_types.len() + i, span)?);
    }

    let return_type = method_symbol.return_type.clone();

    if let Some(call_builder) = &method_symbol.call_builder {
        return call_builder(ctx, Some(owner), &concrete_args, span).map(ResoValue::Concrete);
    }

    let function = method_symbol
        .ir_value
        .expect("non-builtin method must have an ir_value by body-emission time");
    let mut call_args: Vec<BasicMetadataValueEnum> = vec![owner.ir_value.into()];
    call_args.extend(concrete_args.iter().map(|a| a.ir_value.into()));
    let call_site = ctx.builder.build_call(function, &call_args, "call").ok()?;
    let ir_value = call_site
        .try_as_basic_value()
        .left()
        .unwrap_or_else(|| unit_value(ctx));
    Some(ResoValue::Concrete(ConcreteResoValue::new(return_type, ir_value, span)))
}

fn lower_call<'ctx>(ctx: &CodegenContext<'ctx>, callee: &str, args: &[ast::Expr], span: Span) -> Option<ResoValue<'ctx>> {
    let Some(symbol) = ctx.symbols.lookup_function(callee) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::UndefinedVariable {
                name: callee.to_string(),
            },
            span,
        );
        return None;
    };
    if !symbol
        .visibility
        .is_accessible_from(symbol.file, ctx.symbols.current_file())
    {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::VisibilityViolation {
                name: callee.to_string(),
            },
            span,
        );
        return None;
    }
    if symbol.params.len() != args.len() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::ArgCountMismatch {
                expected: symbol.params.len(),
                actual: args.len(),
            },
            span,
        );
        return None;
    }

    let mut concrete_args = Vec::with_capacity(args.len());
    for (i, (arg_expr, param_ty)) in args.iter().zip(symbol.params.iter()).enumerate() {
        concrete_args.push(lower_arg(ctx, arg_expr, param_ty, i, span)?);
    }

    if let Some(call_builder) = &symbol.call_builder {
        return call_builder(ctx, None, &concrete_args, span).map(ResoValue::Concrete);
    }

    let function = symbol
        .ir_value
        .expect("non-builtin function must have an ir_value by body-emission time");
    let call_args: Vec<BasicMetadataValueEnum> = concrete_args.iter().map(|a| a.ir_value.into()).collect();
    let call_site = ctx.builder.build_call(function, &call_args, "call").ok()?;
    let ir_value = call_site
        .try_as_basic_value()
        .left()
        .unwrap_or_else(|| unit_value(ctx));
    Some(ResoValue::Concrete(ConcreteResoValue::new(
        symbol.return_type.clone(),
        ir_value,
        span,
    )))
}

/// GC-allocate a resource instance and store each field in declaration
/// order. Uses `GC_malloc_atomic` when no field is itself a pointer (a
/// nested resource or `Null`), since the collector never needs to trace
/// through it.
fn lower_resource_init<'ctx>(
    ctx: &CodegenContext<'ctx>,
    type_name: &str,
    generics: &[ast::TypeRef],
    fields: &[ast::Expr],
    span: Span,
) -> Option<ResoValue<'ctx>> {
    let generic_tys: Vec<ResoType> = generics
        .iter()
        .map(|g| resolve_type_ref(ctx, g))
        .collect::<Option<_>>()?;
    let file = ctx.symbols.current_file();
    let resource_id = ctx
        .registry
        .get_or_create(type_name, generic_tys, crate::symbols::Visibility::Global, file);

    let field_types: Vec<ResoType> = {
        let data = ctx.registry.get(resource_id);
        data.fields.iter().map(|(_, t)| t.clone()).collect()
    };
    if fields.len() != field_types.len() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::ArgCountMismatch {
                expected: field_types.len(),
                actual: fields.len(),
            },
            span,
        );
        return None;
    }

    let mut concrete_fields = Vec::with_capacity(field_types.len());
    for (i, (field_expr, field_ty)) in fields.iter().zip(field_types.iter()).enumerate() {
        concrete_fields.push(lower_arg(ctx, field_expr, field_ty, i, span)?);
    }

    let all_value_fields = field_types
        .iter()
        .all(|t| !matches!(t, ResoType::Resource(_) | ResoType::Null));
    let struct_ty = ctx.resource_struct_type(resource_id);
    let struct_size = struct_ty.size_of()?;
    let gc_fn = if all_value_fields {
        ctx.gc_malloc_atomic_fn()
    } else {
        ctx.gc_malloc_fn()
    };
    let instance_ptr = ctx
        .builder
        .build_call(gc_fn, &[struct_size.into()], "instance")
        .ok()?
        .try_as_basic_value()
        .left()?
        .into_pointer_value();

    for (i, field_value) in concrete_fields.iter().enumerate() {
        let field_ptr = ctx
            .builder
            .build_struct_gep(struct_ty, instance_ptr, i as u32, &format!("field{i}_ptr"))
            .ok()?;
        ctx.builder.build_store(field_ptr, field_value.ir_value).ok()?;
    }

    Some(ResoValue::Concrete(ConcreteResoValue::new(
        ResoType::Resource(resource_id),
        instance_ptr.into(),
        span,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenOptions;
    use crate::symbols::VariableSymbol;
    use crate::types::TypeRegistry;
    use inkwell::context::Context;
    use inkwell::values::InstructionOpcode;
    use std::rc::Rc;

    /// Builds a function taking one `bool` parameter, stores it into a
    /// variable named `a` so later reads are real `load` instructions the
    /// IR builder cannot constant-fold away.
    fn harness_with_bool_param<'ctx>(
        context: &'ctx Context,
        module_name: &str,
    ) -> (CodegenContext<'ctx>, inkwell::values::FunctionValue<'ctx>) {
        let registry = Rc::new(TypeRegistry::new());
        let ctx = CodegenContext::new(context, module_name, registry, CodegenOptions::default());
        let fn_type = context.i32_type().fn_type(&[context.bool_type().into()], false);
        let function = ctx.module.add_function("f", fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        ctx.builder.position_at_end(entry);
        ctx.enter_function(function);
        ctx.symbols.enter_function_scope(ResoType::Unit);

        let bool_ty = ctx.llvm_type(&ResoType::Bool);
        let pointer = ctx.builder.build_alloca(bool_ty, "a").unwrap();
        ctx.builder.build_store(pointer, function.get_nth_param(0).unwrap()).unwrap();
        let _ = ctx
            .symbols
            .define_variable(VariableSymbol::new("a", ResoType::Bool, pointer, false, true));

        (ctx, function)
    }

    #[test]
    fn logical_and_emits_real_control_flow_with_a_merging_phi() {
        let context = Context::create();
        let (ctx, function) = harness_with_bool_param(&context, "logical_and");
        let span = Span::default();
        let left = ast::Expr::Identifier { name: "a".into(), span };
        let right = ast::Expr::BoolLiteral { value: true, span };

        let blocks_before = function.get_basic_blocks().len();
        let result = lower_logical(&ctx, LogicalOp::And, &left, &right, span).expect("lowers");
        let blocks_after = function.get_basic_blocks().len();

        // logical_rhs, logical_merge.
        assert_eq!(blocks_after - blocks_before, 2);
        let merge = ctx.builder.get_insert_block().unwrap();
        let first = merge.get_first_instruction().expect("phi is present");
        assert_eq!(first.get_opcode(), InstructionOpcode::Phi);
        match result {
            ResoValue::Concrete(c) => assert_eq!(c.reso_type, ResoType::Bool),
            _ => panic!("logical expressions always concretize to bool"),
        }
    }

    #[test]
    fn logical_or_emits_real_control_flow_with_a_merging_phi() {
        let context = Context::create();
        let (ctx, function) = harness_with_bool_param(&context, "logical_or");
        let span = Span::default();
        let left = ast::Expr::Identifier { name: "a".into(), span };
        let right = ast::Expr::BoolLiteral { value: false, span };

        let blocks_before = function.get_basic_blocks().len();
        lower_logical(&ctx, LogicalOp::Or, &left, &right, span).expect("lowers");
        let blocks_after = function.get_basic_blocks().len();

        assert_eq!(blocks_after - blocks_before, 2);
        let merge = ctx.builder.get_insert_block().unwrap();
        let first = merge.get_first_instruction().expect("phi is present");
        assert_eq!(first.get_opcode(), InstructionOpcode::Phi);
    }

    #[test]
    fn int_literal_parses_hex_and_underscore_separators() {
        assert_eq!(parse_int_literal("0xFF_00"), Some((0xFF00, false)));
        assert_eq!(parse_int_literal("-0b1010"), Some((0b1010, true)));
        assert_eq!(parse_int_literal("not_a_number"), None);
    }

    #[test]
    fn float_literal_rejects_non_finite_results() {
        let context = Context::create();
        let (ctx, _function) = harness_with_bool_param(&context, "float_lit");
        let result = lower_float_literal(&ctx, "1e999", Span::default());
        assert!(result.is_none());
        assert!(ctx.diagnostics.borrow().had_errors());
    }
}
