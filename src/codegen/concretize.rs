//! `concretize(target)` for every [`ResoValue`] variant.
//!
//! Kept as a free function rather than a method on `ResoValue` (see
//! `value`'s module doc) since emitting IR needs `&CodegenContext`. Follows a
//! type-then-operator dispatch table, generalized from a single
//! signed-integer lattice to the full signed/unsigned/float one the
//! language's type system supports.

use inkwell::values::BasicValueEnum;
use inkwell::{FloatPredicate, IntPredicate};

use crate::codegen::{convert, vector, CodegenContext};
use crate::diagnostics::{ErrorKind, Span};
use crate::types::ResoType;
use crate::value::{ArithOp, BitwiseOp, CmpOp, ResoValue, UnaryOp};
use crate::value::ConcreteResoValue;

/// `concretizeToDefault`: `concretize(value.defaultType)`, erroring (not
/// panicking — this is a normal compile error, e.g. a naked `Vector<T>()`)
/// when there is no default.
pub fn concretize_to_default<'ctx>(
    ctx: &CodegenContext<'ctx>,
    value: ResoValue<'ctx>,
) -> Option<ConcreteResoValue<'ctx>> {
    let span = value.span();
    let Some(default) = value.default_type(ctx.options.pointer_width) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::TypeMismatch {
                expected: "a type with a default".to_string(),
                actual: "a value with no default type".to_string(),
            },
            span,
        );
        return None;
    };
    concretize(ctx, value, &default, span)
}

/// `concretize(target)`. Assumes the caller already knows
/// `value.can_concretize_to(target, ...)` holds (or is willing to see a
/// reported error and a `None` here if not); this function does not
/// re-derive that check, it just emits IR for the cases it can.
pub fn concretize<'ctx>(
    ctx: &CodegenContext<'ctx>,
    value: ResoValue<'ctx>,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    match value {
        ResoValue::Concrete(c) => {
            if c.reso_type == *target {
                Some(ConcreteResoValue::new(target.clone(), c.ir_value, span))
            } else {
                convert::create_conversion(ctx, c, target, span)
            }
        }
        ResoValue::IntLiteral(lit) => concretize_int_literal(ctx, &lit, target, span),
        ResoValue::FloatLiteral(lit) => concretize_float_literal(ctx, &lit, target, span),
        ResoValue::Arithmetic(a) => concretize_arithmetic(ctx, a, target, span),
        ResoValue::Bitwise(b) => concretize_bitwise(ctx, b, target, span),
        ResoValue::Comparison(c) => concretize_comparison(ctx, c, span),
        ResoValue::Unary(u) => concretize_unary(ctx, u, target, span),
        ResoValue::Ternary(t) => concretize_ternary(ctx, t, target, span),
        ResoValue::VectorCtor(v) => match target {
            ResoType::Resource(id) if ctx.registry.get(*id).name == v.type_name => {
                vector::emit_constructor(ctx, *id, span)
            }
            _ => {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::TypeMismatch {
                        expected: target.to_string(),
                        actual: v.type_name,
                    },
                    span,
                );
                None
            }
        },
    }
}

fn concretize_int_literal<'ctx>(
    ctx: &CodegenContext<'ctx>,
    lit: &crate::value::IntLiteral,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    if !lit.is_in_range(target, ctx.options.pointer_width) {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::BadLiteral {
                reason: format!("integer literal does not fit in '{target}'"),
            },
            span,
        );
        return None;
    }
    let int_ty = ctx.llvm_type(target).into_int_type();
    let magnitude = int_ty.const_int(lit.magnitude, false);
    let value = if lit.negative {
        ctx.builder.build_int_neg(magnitude, "neg_lit").ok()?
    } else {
        magnitude
    };
    Some(ConcreteResoValue::new(target.clone(), value.into(), span))
}

fn concretize_float_literal<'ctx>(
    ctx: &CodegenContext<'ctx>,
    lit: &crate::value::FloatLiteral,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    if !target.is_float() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::TypeMismatch {
                expected: target.to_string(),
                actual: "floating-point literal".to_string(),
            },
            span,
        );
        return None;
    }
    let float_ty = ctx.llvm_type(target).into_float_type();
    Some(ConcreteResoValue::new(
        target.clone(),
        float_ty.const_float(lit.value).into(),
        span,
    ))
}

/// Result-type unification policy for binary arithmetic/bitwise/comparison:
/// try the right operand's default type first, then the left's; error
/// "ambiguous" if neither concretizes to the other's.
fn unify_operand_type<'ctx>(
    ctx: &CodegenContext<'ctx>,
    left: &ResoValue<'ctx>,
    right: &ResoValue<'ctx>,
    span: Span,
) -> Option<ResoType> {
    let pw = ctx.options.pointer_width;
    if let Some(rt) = right.default_type(pw) {
        if left.can_concretize_to(&rt, &ctx.registry, pw) {
            return Some(rt);
        }
    }
    if let Some(lt) = left.default_type(pw) {
        if right.can_concretize_to(&lt, &ctx.registry, pw) {
            return Some(lt);
        }
    }
    ctx.diagnostics.borrow_mut().report(
        ErrorKind::AmbiguousOperandTypes {
            left: left.default_type(pw).map(|t| t.to_string()).unwrap_or_default(),
            right: right.default_type(pw).map(|t| t.to_string()).unwrap_or_default(),
        },
        span,
    );
    None
}

fn concretize_arithmetic<'ctx>(
    ctx: &CodegenContext<'ctx>,
    a: crate::value::ArithmeticValue<'ctx>,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    if !target.is_numeric() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::NonNumericOperand {
                actual: target.to_string(),
            },
            span,
        );
        return None;
    }
    let left = concretize(ctx, *a.left, target, span)?;
    let right = concretize(ctx, *a.right, target, span)?;

    let ir = if target.is_float() {
        arithmetic_float(ctx, a.op, left.ir_value, right.ir_value)?
    } else if target.is_signed_int() {
        arithmetic_signed_int(ctx, a.op, left.ir_value, right.ir_value)?
    } else {
        arithmetic_unsigned_int(ctx, a.op, left.ir_value, right.ir_value)?
    };
    Some(ConcreteResoValue::new(target.clone(), ir, span))
}

fn arithmetic_signed_int<'ctx>(
    ctx: &CodegenContext<'ctx>,
    op: ArithOp,
    left: BasicValueEnum<'ctx>,
    right: BasicValueEnum<'ctx>,
) -> Option<BasicValueEnum<'ctx>> {
    let l = left.into_int_value();
    let r = right.into_int_value();
    let b = &ctx.builder;
    Some(
        match op {
            ArithOp::Add => b.build_int_add(l, r, "add").ok()?,
            ArithOp::Sub => b.build_int_sub(l, r, "sub").ok()?,
            ArithOp::Mul => b.build_int_mul(l, r, "mul").ok()?,
            ArithOp::Div => b.build_int_signed_div(l, r, "sdiv").ok()?,
            ArithOp::Rem => b.build_int_signed_rem(l, r, "srem").ok()?,
            ArithOp::Mod => {
                // `a mod b` (signed): `srem(a,b)`, fixed up by `+ b` when the
                // remainder is nonzero and signs of `a`/`b` differ.
                let rem = b.build_int_signed_rem(l, r, "srem").ok()?;
                let zero = l.get_type().const_zero();
                let is_zero = b.build_int_compare(IntPredicate::EQ, rem, zero, "rem_is_zero").ok()?;
                let sign_l = b.build_int_compare(IntPredicate::SLT, l, zero, "sign_l").ok()?;
                let sign_r = b.build_int_compare(IntPredicate::SLT, r, zero, "sign_r").ok()?;
                let signs_differ = b.build_xor(sign_l, sign_r, "signs_differ").ok()?;
                let not_zero = b.build_not(is_zero, "rem_nonzero").ok()?;
                let needs_fixup = b.build_and(not_zero, signs_differ, "needs_fixup").ok()?;
                let fixed = b.build_int_add(rem, r, "mod_fixed").ok()?;
                b.build_select(needs_fixup, fixed, rem, "mod").ok()?.into_int_value()
            }
        }
        .into(),
    )
}

fn arithmetic_unsigned_int<'ctx>(
    ctx: &CodegenContext<'ctx>,
    op: ArithOp,
    left: BasicValueEnum<'ctx>,
    right: BasicValueEnum<'ctx>,
) -> Option<BasicValueEnum<'ctx>> {
    let l = left.into_int_value();
    let r = right.into_int_value();
    let b = &ctx.builder;
    Some(
        match op {
            ArithOp::Add => b.build_int_add(l, r, "add").ok()?,
            ArithOp::Sub => b.build_int_sub(l, r, "sub").ok()?,
            ArithOp::Mul => b.build_int_mul(l, r, "mul").ok()?,
            ArithOp::Div => b.build_int_unsigned_div(l, r, "udiv").ok()?,
            // unsigned `mod` == `urem`, no fixup.
            ArithOp::Rem | ArithOp::Mod => b.build_int_unsigned_rem(l, r, "urem").ok()?,
        }
        .into(),
    )
}

fn arithmetic_float<'ctx>(
    ctx: &CodegenContext<'ctx>,
    op: ArithOp,
    left: BasicValueEnum<'ctx>,
    right: BasicValueEnum<'ctx>,
) -> Option<BasicValueEnum<'ctx>> {
    let l = left.into_float_value();
    let r = right.into_float_value();
    let b = &ctx.builder;
    Some(
        match op {
            ArithOp::Add => b.build_float_add(l, r, "fadd").ok()?,
            ArithOp::Sub => b.build_float_sub(l, r, "fsub").ok()?,
            ArithOp::Mul => b.build_float_mul(l, r, "fmul").ok()?,
            ArithOp::Div => b.build_float_div(l, r, "fdiv").ok()?,
            ArithOp::Rem => b.build_float_rem(l, r, "frem").ok()?,
            ArithOp::Mod => {
                // Same fix-up law as the signed-integer case, using `frem`
                // and an unordered-not-equal zero check.
                let rem = b.build_float_rem(l, r, "frem").ok()?;
                let zero = r.get_type().const_zero();
                let is_nonzero = b
                    .build_float_compare(FloatPredicate::UNE, rem, zero, "rem_nonzero")
                    .ok()?;
                let sign_l = b.build_float_compare(FloatPredicate::OLT, l, zero, "sign_l").ok()?;
                let sign_r = b.build_float_compare(FloatPredicate::OLT, r, zero, "sign_r").ok()?;
                let signs_differ = b.build_xor(sign_l, sign_r, "signs_differ").ok()?;
                let needs_fixup = b.build_and(is_nonzero, signs_differ, "needs_fixup").ok()?;
                let fixed = b.build_float_add(rem, r, "mod_fixed").ok()?;
                b.build_select(needs_fixup, fixed, rem, "mod").ok()?.into_float_value()
            }
        }
        .into(),
    )
}

fn concretize_bitwise<'ctx>(
    ctx: &CodegenContext<'ctx>,
    bw: crate::value::BitwiseValue<'ctx>,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    if !target.is_integer() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::NonIntegerOperand {
                actual: target.to_string(),
            },
            span,
        );
        return None;
    }
    let left = concretize(ctx, *bw.left, target, span)?;
    let l = left.ir_value.into_int_value();
    let b = &ctx.builder;

    if bw.op.is_shift() {
        // Shift amount is concretized independently of the result type.
        let right = concretize_to_default(ctx, *bw.right)?;
        let r = right.ir_value.into_int_value();
        let ir = match bw.op {
            BitwiseOp::Shl => b.build_left_shift(l, r, "shl").ok()?,
            // logical for unsigned, arithmetic for signed.
            BitwiseOp::Shr if target.is_signed_int() => {
                b.build_right_shift(l, r, true, "ashr").ok()?
            }
            BitwiseOp::Shr => b.build_right_shift(l, r, false, "lshr").ok()?,
            BitwiseOp::And | BitwiseOp::Or | BitwiseOp::Xor => unreachable!("not a shift op"),
        };
        return Some(ConcreteResoValue::new(target.clone(), ir.into(), span));
    }

    let right = concretize(ctx, *bw.right, target, span)?;
    let r = right.ir_value.into_int_value();
    let ir = match bw.op {
        BitwiseOp::And => b.build_and(l, r, "and").ok()?,
        BitwiseOp::Or => b.build_or(l, r, "or").ok()?,
        BitwiseOp::Xor => b.build_xor(l, r, "xor").ok()?,
        BitwiseOp::Shl | BitwiseOp::Shr => unreachable!("handled above"),
    };
    Some(ConcreteResoValue::new(target.clone(), ir.into(), span))
}

fn concretize_comparison<'ctx>(
    ctx: &CodegenContext<'ctx>,
    cmp: crate::value::ComparisonValue<'ctx>,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let operand_ty = unify_operand_type(ctx, &cmp.left, &cmp.right, span)?;
    let left = concretize(ctx, *cmp.left, &operand_ty, span)?;
    let right = concretize(ctx, *cmp.right, &operand_ty, span)?;
    let b = &ctx.builder;

    let ir: BasicValueEnum = if operand_ty.is_float() {
        let predicate = match cmp.op {
            CmpOp::Lt => FloatPredicate::OLT,
            CmpOp::Le => FloatPredicate::OLE,
            CmpOp::Gt => FloatPredicate::OGT,
            CmpOp::Ge => FloatPredicate::OGE,
            CmpOp::Eq => FloatPredicate::OEQ,
            CmpOp::Ne => FloatPredicate::ONE,
        };
        b.build_float_compare(
            predicate,
            left.ir_value.into_float_value(),
            right.ir_value.into_float_value(),
            "fcmp",
        )
        .ok()?
        .into()
    } else if matches!(cmp.op, CmpOp::Eq | CmpOp::Ne)
        || operand_ty.is_integer()
        || operand_ty == ResoType::Char
    {
        // Integers (signed or unsigned ordering), `char` (always unsigned
        // ordering) and non-numeric types
        // restricted to `==`/`!=` all go through `icmp`.
        let predicate = match (cmp.op, operand_ty.is_signed_int()) {
            (CmpOp::Lt, true) => IntPredicate::SLT,
            (CmpOp::Lt, false) => IntPredicate::ULT,
            (CmpOp::Le, true) => IntPredicate::SLE,
            (CmpOp::Le, false) => IntPredicate::ULE,
            (CmpOp::Gt, true) => IntPredicate::SGT,
            (CmpOp::Gt, false) => IntPredicate::UGT,
            (CmpOp::Ge, true) => IntPredicate::SGE,
            (CmpOp::Ge, false) => IntPredicate::UGE,
            (CmpOp::Eq, _) => IntPredicate::EQ,
            (CmpOp::Ne, _) => IntPredicate::NE,
        };
        match left.ir_value {
            BasicValueEnum::PointerValue(lp) => b
                .build_int_compare(predicate, lp, right.ir_value.into_pointer_value(), "icmp")
                .ok()?
                .into(),
            _ => b
                .build_int_compare(
                    predicate,
                    left.ir_value.into_int_value(),
                    right.ir_value.into_int_value(),
                    "icmp",
                )
                .ok()?
                .into(),
        }
    } else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::NonNumericOperand {
                actual: operand_ty.to_string(),
            },
            span,
        );
        return None;
    };

    Some(ConcreteResoValue::new(ResoType::Bool, ir, span))
}

fn concretize_unary<'ctx>(
    ctx: &CodegenContext<'ctx>,
    u: crate::value::UnaryValue<'ctx>,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    match u.op {
        UnaryOp::Not => {
            if *target != ResoType::Bool {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::NonBooleanCondition {
                        actual: target.to_string(),
                    },
                    span,
                );
                return None;
            }
            let operand = concretize(ctx, *u.operand, &ResoType::Bool, span)?;
            let bool_ty = ctx.llvm_type(&ResoType::Bool).into_int_type();
            let ones = bool_ty.const_all_ones();
            let ir = ctx
                .builder
                .build_xor(operand.ir_value.into_int_value(), ones, "not")
                .ok()?;
            Some(ConcreteResoValue::new(ResoType::Bool, ir.into(), span))
        }
        UnaryOp::BitNot => {
            if !target.is_integer() {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::NonIntegerOperand {
                        actual: target.to_string(),
                    },
                    span,
                );
                return None;
            }
            let operand = concretize(ctx, *u.operand, target, span)?;
            let int_ty = ctx.llvm_type(target).into_int_type();
            let ones = int_ty.const_all_ones();
            let ir = ctx
                .builder
                .build_xor(operand.ir_value.into_int_value(), ones, "bitnot")
                .ok()?;
            Some(ConcreteResoValue::new(target.clone(), ir.into(), span))
        }
        UnaryOp::Plus => concretize(ctx, *u.operand, target, span),
        UnaryOp::Neg => {
            if !target.is_numeric() {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::NonNumericOperand {
                        actual: target.to_string(),
                    },
                    span,
                );
                return None;
            }
            let operand = concretize(ctx, *u.operand, target, span)?;
            let ir: BasicValueEnum = if target.is_float() {
                ctx.builder
                    .build_float_neg(operand.ir_value.into_float_value(), "fneg")
                    .ok()?
                    .into()
            } else {
                ctx.builder
                    .build_int_neg(operand.ir_value.into_int_value(), "neg")
                    .ok()?
                    .into()
            };
            Some(ConcreteResoValue::new(target.clone(), ir, span))
        }
    }
}

/// `t if cond else f`: real control flow with a PHI merge,
/// not `select` — either branch may itself contain further control flow
/// (e.g. a nested ternary or, once method calls lower, side effects).
fn concretize_ternary<'ctx>(
    ctx: &CodegenContext<'ctx>,
    t: crate::value::TernaryValue<'ctx>,
    target: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let condition = concretize(ctx, *t.condition, &ResoType::Bool, span)?;
    let function = ctx.current_function()?;

    let true_block = ctx.context.append_basic_block(function, "ternary_true");
    let false_block = ctx.context.append_basic_block(function, "ternary_false");
    let merge_block = ctx.context.append_basic_block(function, "ternary_merge");

    ctx.builder
        .build_conditional_branch(condition.ir_value.into_int_value(), true_block, false_block)
        .ok()?;

    ctx.builder.position_at_end(true_block);
    let true_value = concretize(ctx, *t.if_true, target, span)?;
    let true_end_block = ctx.builder.get_insert_block()?;
    ctx.builder.build_unconditional_branch(merge_block).ok()?;

    ctx.builder.position_at_end(false_block);
    let false_value = concretize(ctx, *t.if_false, target, span)?;
    let false_end_block = ctx.builder.get_insert_block()?;
    ctx.builder.build_unconditional_branch(merge_block).ok()?;

    ctx.builder.position_at_end(merge_block);
    let phi = ctx.builder.build_phi(ctx.llvm_type(target), "ternary_result").ok()?;
    phi.add_incoming(&[
        (&true_value.ir_value, true_end_block),
        (&false_value.ir_value, false_end_block),
    ]);
    Some(ConcreteResoValue::new(target.clone(), phi.as_basic_value(), span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenOptions;
    use crate::types::{IntWidth, TypeRegistry};
    use crate::value::{IntLiteral, TernaryValue};
    use inkwell::context::Context;
    use inkwell::values::InstructionOpcode;
    use std::rc::Rc;

    fn harness<'ctx>(
        context: &'ctx Context,
        module_name: &str,
        params: &[inkwell::types::BasicMetadataTypeEnum<'ctx>],
    ) -> (CodegenContext<'ctx>, inkwell::values::FunctionValue<'ctx>) {
        let registry = Rc::new(TypeRegistry::new());
        let ctx = CodegenContext::new(context, module_name, registry, CodegenOptions::default());
        let fn_type = context.i32_type().fn_type(params, false);
        let function = ctx.module.add_function("f", fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        ctx.builder.position_at_end(entry);
        ctx.enter_function(function);
        (ctx, function)
    }

    #[test]
    fn signed_mod_fixes_up_when_remainder_nonzero_and_signs_differ() {
        let context = Context::create();
        let (ctx, _function) = harness(&context, "mod_signed", &[]);
        let i32_ty = context.i32_type();
        let left = i32_ty.const_int((-7i64) as u64, true);
        let right = i32_ty.const_int(3, false);

        let result = arithmetic_signed_int(&ctx, ArithOp::Mod, left.into(), right.into()).unwrap();
        assert_eq!(result.into_int_value().get_sign_extended_constant(), Some(2));
    }

    #[test]
    fn signed_mod_is_plain_srem_when_signs_agree() {
        let context = Context::create();
        let (ctx, _function) = harness(&context, "mod_signed_agree", &[]);
        let i32_ty = context.i32_type();
        let left = i32_ty.const_int(7, false);
        let right = i32_ty.const_int(3, false);

        let result = arithmetic_signed_int(&ctx, ArithOp::Mod, left.into(), right.into()).unwrap();
        assert_eq!(result.into_int_value().get_sign_extended_constant(), Some(1));
    }

    #[test]
    fn unsigned_mod_is_plain_urem_with_no_fixup() {
        let context = Context::create();
        let (ctx, _function) = harness(&context, "mod_unsigned", &[]);
        let i32_ty = context.i32_type();
        let left = i32_ty.const_int(7, false);
        let right = i32_ty.const_int(3, false);

        let result = arithmetic_unsigned_int(&ctx, ArithOp::Mod, left.into(), right.into()).unwrap();
        assert_eq!(result.into_int_value().get_zero_extended_constant(), Some(1));
    }

    #[test]
    fn float_mod_fixes_up_when_remainder_nonzero_and_signs_differ() {
        let context = Context::create();
        let (ctx, _function) = harness(&context, "mod_float", &[]);
        let f64_ty = context.f64_type();
        let left = f64_ty.const_float(-7.0);
        let right = f64_ty.const_float(3.0);

        let result = arithmetic_float(&ctx, ArithOp::Mod, left.into(), right.into()).unwrap();
        let (value, _) = result.into_float_value().get_constant().expect("folds to a constant");
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn signed_right_shift_is_arithmetic() {
        let context = Context::create();
        let (ctx, function) = harness(&context, "shr_signed", &[context.i32_type().into()]);
        let span = Span::default();
        let param = function.get_nth_param(0).unwrap().into_int_value();
        let left = ResoValue::Concrete(ConcreteResoValue::new(ResoType::Int(IntWidth::I32), param.into(), span));
        let right = ResoValue::IntLiteral(IntLiteral {
            magnitude: 1,
            negative: false,
            span,
        });
        let bw = crate::value::BitwiseValue {
            op: BitwiseOp::Shr,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };

        let result = concretize_bitwise(&ctx, bw, &ResoType::Int(IntWidth::I32), span).expect("lowers");
        let instr = result.ir_value.into_int_value().as_instruction_value().expect("not folded, param is runtime");
        assert_eq!(instr.get_opcode(), InstructionOpcode::AShr);
    }

    #[test]
    fn unsigned_right_shift_is_logical() {
        let context = Context::create();
        let (ctx, function) = harness(&context, "shr_unsigned", &[context.i32_type().into()]);
        let span = Span::default();
        let param = function.get_nth_param(0).unwrap().into_int_value();
        let left = ResoValue::Concrete(ConcreteResoValue::new(ResoType::Int(IntWidth::U32), param.into(), span));
        let right = ResoValue::IntLiteral(IntLiteral {
            magnitude: 1,
            negative: false,
            span,
        });
        let bw = crate::value::BitwiseValue {
            op: BitwiseOp::Shr,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };

        let result = concretize_bitwise(&ctx, bw, &ResoType::Int(IntWidth::U32), span).expect("lowers");
        let instr = result.ir_value.into_int_value().as_instruction_value().expect("not folded, param is runtime");
        assert_eq!(instr.get_opcode(), InstructionOpcode::LShr);
    }

    #[test]
    fn ternary_merges_both_arms_through_a_phi() {
        let context = Context::create();
        let (ctx, function) = harness(&context, "ternary", &[context.bool_type().into()]);
        let span = Span::default();
        let param = function.get_nth_param(0).unwrap().into_int_value();
        let condition = ResoValue::Concrete(ConcreteResoValue::new(ResoType::Bool, param.into(), span));
        let t = TernaryValue {
            condition: Box::new(condition),
            if_true: Box::new(ResoValue::IntLiteral(IntLiteral {
                magnitude: 1,
                negative: false,
                span,
            })),
            if_false: Box::new(ResoValue::IntLiteral(IntLiteral {
                magnitude: 0,
                negative: false,
                span,
            })),
            span,
        };

        let blocks_before = function.get_basic_blocks().len();
        let result = concretize_ternary(&ctx, t, &ResoType::Int(IntWidth::I32), span).expect("lowers");
        let blocks_after = function.get_basic_blocks().len();

        // ternary_true, ternary_false, ternary_merge.
        assert_eq!(blocks_after - blocks_before, 3);
        let merge = ctx.builder.get_insert_block().unwrap();
        let first = merge.get_first_instruction().expect("phi is present");
        assert_eq!(first.get_opcode(), InstructionOpcode::Phi);
        assert_eq!(result.reso_type, ResoType::Int(IntWidth::I32));
    }

    #[test]
    fn char_comparison_uses_unsigned_predicates() {
        let context = Context::create();
        let char_llvm_ty = context.i32_type();
        let (ctx, function) = harness(&context, "char_cmp", &[char_llvm_ty.into()]);
        let span = Span::default();
        let param = function.get_nth_param(0).unwrap().into_int_value();
        let left = ResoValue::Concrete(ConcreteResoValue::new(ResoType::Char, param.into(), span));
        let right = ResoValue::Concrete(ConcreteResoValue::new(ResoType::Char, char_llvm_ty.const_int(3, false).into(), span));
        let cmp = crate::value::ComparisonValue {
            op: CmpOp::Lt,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };

        let result = concretize_comparison(&ctx, cmp, span).expect("lowers");
        assert_eq!(result.reso_type, ResoType::Bool);
        // the left operand is a function parameter (not a constant), so the
        // icmp survives folding and its predicate can be read back off the IR.
        let ir_text = ctx.module.print_to_string().to_string();
        assert!(ir_text.contains("icmp ult"), "expected an unsigned icmp, got:\n{ir_text}");
    }
}
