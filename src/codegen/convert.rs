//! Emits the actual LLVM conversion instruction chosen by
//! [`crate::types::allowed_conversion`].

use inkwell::values::BasicValueEnum;

use crate::codegen::CodegenContext;
use crate::diagnostics::{ErrorKind, Span};
use crate::types::{allowed_conversion, ConversionKind, ResoType};
use crate::value::ConcreteResoValue;

pub fn create_conversion<'ctx>(
    ctx: &CodegenContext<'ctx>,
    src: ConcreteResoValue<'ctx>,
    dst: &ResoType,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let Some(kind) = allowed_conversion(&src.reso_type, dst, ctx.options.pointer_width) else {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::TypeMismatch {
                expected: dst.to_string(),
                actual: src.reso_type.to_string(),
            },
            span,
        );
        return None;
    };

    let dst_llvm = ctx.llvm_type(dst);
    let name = "conv";

    let ir_value: BasicValueEnum = match kind {
        ConversionKind::Identity => {
            return Some(ConcreteResoValue::new(dst.clone(), src.ir_value, span));
        }
        ConversionKind::SignExtend => ctx
            .builder
            .build_int_s_extend(src.ir_value.into_int_value(), dst_llvm.into_int_type(), name)
            .ok()?
            .into(),
        ConversionKind::ZeroExtend => ctx
            .builder
            .build_int_z_extend(src.ir_value.into_int_value(), dst_llvm.into_int_type(), name)
            .ok()?
            .into(),
        ConversionKind::Truncate => ctx
            .builder
            .build_int_truncate(src.ir_value.into_int_value(), dst_llvm.into_int_type(), name)
            .ok()?
            .into(),
        ConversionKind::SignedIntToFloat => ctx
            .builder
            .build_signed_int_to_float(
                src.ir_value.into_int_value(),
                dst_llvm.into_float_type(),
                name,
            )
            .ok()?
            .into(),
        ConversionKind::UnsignedIntToFloat => ctx
            .builder
            .build_unsigned_int_to_float(
                src.ir_value.into_int_value(),
                dst_llvm.into_float_type(),
                name,
            )
            .ok()?
            .into(),
        ConversionKind::FloatToSignedInt => ctx
            .builder
            .build_float_to_signed_int(
                src.ir_value.into_float_value(),
                dst_llvm.into_int_type(),
                name,
            )
            .ok()?
            .into(),
        ConversionKind::FloatToUnsignedInt => ctx
            .builder
            .build_float_to_unsigned_int(
                src.ir_value.into_float_value(),
                dst_llvm.into_int_type(),
                name,
            )
            .ok()?
            .into(),
        ConversionKind::FloatExtend => ctx
            .builder
            .build_float_ext(src.ir_value.into_float_value(), dst_llvm.into_float_type(), name)
            .ok()?
            .into(),
        ConversionKind::FloatTruncate => ctx
            .builder
            .build_float_trunc(
                src.ir_value.into_float_value(),
                dst_llvm.into_float_type(),
                name,
            )
            .ok()?
            .into(),
    };

    Some(ConcreteResoValue::new(dst.clone(), ir_value, span))
}
