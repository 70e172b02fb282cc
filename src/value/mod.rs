//! The untyped-literal / deferred-concretization value algebra.
//!
//! This is a tagged sum with two operations, `can_concretize(target) ->
//! bool` and `concretize(target) -> Concrete?`, rather than a class
//! hierarchy, so `ResoValue` is one enum. `concretize` itself lives in
//! `codegen::concretize` (a free function, not a method) because emitting IR
//! needs `&CodegenContext`, and `value` must not depend on `codegen` (the
//! dependency runs the other way: `codegen` lowers `value::ResoValue`s).
//!
//! Other designs in this space separate type checking from codegen entirely
//! (a typed AST that's fully concrete by the time codegen sees it); this one
//! instead keeps literals and binary/unary combinations deferred until a
//! target type is known, using an operand-first, match-on-LLVM-type
//! dispatch style for the eventual concretization.

use inkwell::values::BasicValueEnum;

use crate::diagnostics::Span;
use crate::types::{ResoType, TypeRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BitwiseOp {
    pub fn is_shift(self) -> bool {
        matches!(self, BitwiseOp::Shl | BitwiseOp::Shr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A value guaranteed to have a resolved concrete type and a materialized IR
/// value.
#[derive(Clone)]
pub struct ConcreteResoValue<'ctx> {
    pub reso_type: ResoType,
    pub ir_value: BasicValueEnum<'ctx>,
    pub span: Span,
}

impl<'ctx> ConcreteResoValue<'ctx> {
    pub fn new(reso_type: ResoType, ir_value: BasicValueEnum<'ctx>, span: Span) -> Self {
        ConcreteResoValue {
            reso_type,
            ir_value,
            span,
        }
    }
}

pub struct IntLiteral {
    /// Absolute magnitude; magnitudes up to `u64::MAX` are allowed.
    pub magnitude: u64,
    pub negative: bool,
    pub span: Span,
}

impl IntLiteral {
    /// Whether this literal's magnitude fits in `target`'s range.
    pub fn is_in_range(&self, target: &ResoType, pointer_width: u32) -> bool {
        let ResoType::Int(width) = target else {
            return false;
        };
        let (min, max) = width.range(pointer_width);
        if self.negative {
            -(self.magnitude as i128) >= min
        } else {
            (self.magnitude as u128) <= max
        }
    }

    pub fn as_i128(&self) -> i128 {
        if self.negative {
            -(self.magnitude as i128)
        } else {
            self.magnitude as i128
        }
    }
}

pub struct FloatLiteral {
    pub value: f64,
    pub span: Span,
}

impl FloatLiteral {
    /// Floating literals forbid NaN/±∞.
    pub fn is_well_formed(&self) -> bool {
        self.value.is_finite()
    }
}

pub struct ArithmeticValue<'ctx> {
    pub op: ArithOp,
    pub left: Box<ResoValue<'ctx>>,
    pub right: Box<ResoValue<'ctx>>,
    pub span: Span,
}

pub struct BitwiseValue<'ctx> {
    pub op: BitwiseOp,
    pub left: Box<ResoValue<'ctx>>,
    pub right: Box<ResoValue<'ctx>>,
    pub span: Span,
}

pub struct ComparisonValue<'ctx> {
    pub op: CmpOp,
    pub left: Box<ResoValue<'ctx>>,
    pub right: Box<ResoValue<'ctx>>,
    pub span: Span,
}

pub struct UnaryValue<'ctx> {
    pub op: UnaryOp,
    pub operand: Box<ResoValue<'ctx>>,
    pub span: Span,
}

pub struct TernaryValue<'ctx> {
    pub condition: Box<ResoValue<'ctx>>,
    pub if_true: Box<ResoValue<'ctx>>,
    pub if_false: Box<ResoValue<'ctx>>,
    pub span: Span,
}

/// `v.add(...)`-shaped naked constructor call, e.g. `Vector<u8>()`, before a
/// target type has fixed its element type further.
pub struct VectorCtorValue {
    pub type_name: String,
    pub span: Span,
}

pub enum ResoValue<'ctx> {
    Concrete(ConcreteResoValue<'ctx>),
    IntLiteral(IntLiteral),
    FloatLiteral(FloatLiteral),
    Arithmetic(ArithmeticValue<'ctx>),
    Bitwise(BitwiseValue<'ctx>),
    Comparison(ComparisonValue<'ctx>),
    Unary(UnaryValue<'ctx>),
    Ternary(TernaryValue<'ctx>),
    VectorCtor(VectorCtorValue),
}

impl<'ctx> ResoValue<'ctx> {
    pub fn span(&self) -> Span {
        match self {
            ResoValue::Concrete(c) => c.span,
            ResoValue::IntLiteral(l) => l.span,
            ResoValue::FloatLiteral(l) => l.span,
            ResoValue::Arithmetic(a) => a.span,
            ResoValue::Bitwise(b) => b.span,
            ResoValue::Comparison(c) => c.span,
            ResoValue::Unary(u) => u.span,
            ResoValue::Ternary(t) => t.span,
            ResoValue::VectorCtor(v) => v.span,
        }
    }

    /// The type this value would take on if nothing more specific is known,
    /// or `None` if it "cannot stand alone".
    pub fn default_type(&self, pointer_width: u32) -> Option<ResoType> {
        match self {
            ResoValue::Concrete(c) => Some(c.reso_type.clone()),
            ResoValue::IntLiteral(_) => Some(ResoType::Int(crate::types::IntWidth::I32)),
            ResoValue::FloatLiteral(_) => Some(ResoType::Float(crate::types::FloatWidth::F64)),
            ResoValue::Arithmetic(a) => {
                unify_default(a.left.default_type(pointer_width), a.right.default_type(pointer_width))
            }
            ResoValue::Bitwise(b) => {
                if b.op.is_shift() {
                    b.left.default_type(pointer_width)
                } else {
                    unify_default(b.left.default_type(pointer_width), b.right.default_type(pointer_width))
                }
            }
            ResoValue::Comparison(_) => Some(ResoType::Bool),
            ResoValue::Unary(u) => match u.op {
                UnaryOp::Not => Some(ResoType::Bool),
                _ => u.operand.default_type(pointer_width),
            },
            ResoValue::Ternary(t) => unify_default(
                t.if_true.default_type(pointer_width),
                t.if_false.default_type(pointer_width),
            ),
            ResoValue::VectorCtor(_) => None,
        }
    }

    /// Whether this value can concretize to `target`.
    pub fn can_concretize_to(
        &self,
        target: &ResoType,
        registry: &TypeRegistry<'_>,
        pointer_width: u32,
    ) -> bool {
        match self {
            ResoValue::Concrete(c) => {
                c.reso_type == *target
                    || crate::types::allowed_conversion(&c.reso_type, target, pointer_width)
                        .is_some()
            }
            ResoValue::IntLiteral(lit) => {
                target.is_integer() && lit.is_in_range(target, pointer_width)
            }
            ResoValue::FloatLiteral(lit) => target.is_float() && lit.is_well_formed(),
            ResoValue::Arithmetic(a) => {
                target.is_numeric()
                    && a.left.can_concretize_to(target, registry, pointer_width)
                    && a.right.can_concretize_to(target, registry, pointer_width)
            }
            ResoValue::Bitwise(b) => {
                if b.op.is_shift() {
                    target.is_integer() && b.left.can_concretize_to(target, registry, pointer_width)
                } else {
                    target.is_integer()
                        && b.left.can_concretize_to(target, registry, pointer_width)
                        && b.right.can_concretize_to(target, registry, pointer_width)
                }
            }
            ResoValue::Comparison(_) => *target == ResoType::Bool,
            ResoValue::Unary(u) => match u.op {
                UnaryOp::Not => *target == ResoType::Bool,
                UnaryOp::BitNot => {
                    target.is_integer() && u.operand.can_concretize_to(target, registry, pointer_width)
                }
                UnaryOp::Plus | UnaryOp::Neg => {
                    target.is_numeric() && u.operand.can_concretize_to(target, registry, pointer_width)
                }
            },
            ResoValue::Ternary(t) => {
                t.if_true.can_concretize_to(target, registry, pointer_width)
                    && t.if_false.can_concretize_to(target, registry, pointer_width)
            }
            ResoValue::VectorCtor(v) => match target {
                ResoType::Resource(id) => registry.get(*id).name == v.type_name,
                _ => false,
            },
        }
    }
}

fn unify_default(left: Option<ResoType>, right: Option<ResoType>) -> Option<ResoType> {
    match (left, right) {
        (Some(l), Some(r)) if l == r => Some(l),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;

    fn span() -> Span {
        Span::new(1, 1)
    }

    #[test]
    fn int_literal_in_range() {
        let lit = IntLiteral {
            magnitude: 300,
            negative: false,
            span: span(),
        };
        assert!(!lit.is_in_range(&ResoType::Int(IntWidth::I8), 64));
        assert!(lit.is_in_range(&ResoType::Int(IntWidth::I32), 64));
    }

    #[test]
    fn negative_int_literal_respects_signed_min() {
        let lit = IntLiteral {
            magnitude: 128,
            negative: true,
            span: span(),
        };
        assert!(lit.is_in_range(&ResoType::Int(IntWidth::I8), 64));
        let lit = IntLiteral {
            magnitude: 129,
            negative: true,
            span: span(),
        };
        assert!(!lit.is_in_range(&ResoType::Int(IntWidth::I8), 64));
    }

    #[test]
    fn float_literal_rejects_nan_and_infinite() {
        assert!(!FloatLiteral {
            value: f64::NAN,
            span: span()
        }
        .is_well_formed());
        assert!(!FloatLiteral {
            value: f64::INFINITY,
            span: span()
        }
        .is_well_formed());
        assert!(FloatLiteral {
            value: 1.5,
            span: span()
        }
        .is_well_formed());
    }

    #[test]
    fn naked_vector_ctor_has_no_default_type() {
        let ctor = ResoValue::VectorCtor(VectorCtorValue {
            type_name: "Vector".to_string(),
            span: span(),
        });
        assert_eq!(ctor.default_type(64), None);
    }

    #[test]
    fn arithmetic_concretizes_when_both_operands_fit_target() {
        let left = ResoValue::IntLiteral(IntLiteral {
            magnitude: 1,
            negative: false,
            span: span(),
        });
        let right = ResoValue::IntLiteral(IntLiteral {
            magnitude: 2,
            negative: false,
            span: span(),
        });
        let registry = TypeRegistry::new();
        let add = ResoValue::Arithmetic(ArithmeticValue {
            op: ArithOp::Add,
            left: Box::new(left),
            right: Box::new(right),
            span: span(),
        });
        assert!(add.can_concretize_to(&ResoType::Int(IntWidth::I64), &registry, 64));
        assert!(!add.can_concretize_to(&ResoType::Bool, &registry, 64));
    }
}
