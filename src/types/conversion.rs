//! The conversion matrix.
//!
//! This module only decides *which* LLVM instruction family a conversion
//! needs (`ConversionKind`); the actual `inkwell` instruction is built in
//! `codegen::convert`, which is where the registry/builder access lives.
//! Keeping the matrix itself free of `inkwell` keeps it trivially unit
//! testable.

use crate::types::ResoType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionKind {
    /// Same type; no instruction needed.
    Identity,
    SignExtend,
    ZeroExtend,
    Truncate,
    SignedIntToFloat,
    UnsignedIntToFloat,
    FloatToSignedInt,
    FloatToUnsignedInt,
    FloatExtend,
    FloatTruncate,
}

/// Determine the allowed conversion from `src` to `dst`, or `None` if the
/// pair is forbidden:
///
/// - int↔int of different widths (sign/zero-extend widening, truncating narrowing)
/// - int↔float (signed→fp, unsigned→fp, fp→signed, fp→unsigned)
/// - float↔float (widen = fpext, narrow = fptrunc)
/// - char↔any numeric (char treated as unsigned 32-bit)
/// - forbidden: bool↔numeric, ()↔anything, Null↔anything, non-reference↔reference
pub fn allowed_conversion(
    src: &ResoType,
    dst: &ResoType,
    pointer_width: u32,
) -> Option<ConversionKind> {
    use ResoType::*;

    if src == dst {
        return Some(ConversionKind::Identity);
    }

    // char is treated as an unsigned 32-bit integer for conversion purposes,
    // so route it through the int/float logic below by a virtual width of
    // 32 unsigned bits.
    let as_numeric = |t: &ResoType| -> Option<(bool, bool, u32)> {
        // (is_float, is_signed, bits)
        match t {
            Int(w) => Some((false, w.is_signed(), w.bits(pointer_width))),
            Float(w) => Some((
                true,
                true,
                match w {
                    crate::types::FloatWidth::F32 => 32,
                    crate::types::FloatWidth::F64 => 64,
                },
            )),
            Char => Some((false, false, 32)),
            _ => None,
        }
    };

    match (src, dst) {
        (Bool, _) | (_, Bool) => None,
        (Unit, _) | (_, Unit) => None,
        (Null, _) | (_, Null) => None,
        (Resource(_), _) | (_, Resource(_)) => None,
        (Generic(_), _) | (_, Generic(_)) => None,
        _ => {
            let (src_float, src_signed, src_bits) = as_numeric(src)?;
            let (dst_float, dst_signed, dst_bits) = as_numeric(dst)?;
            match (src_float, dst_float) {
                (false, false) => {
                    if src_bits == dst_bits {
                        Some(ConversionKind::Identity)
                    } else if src_bits < dst_bits {
                        if src_signed {
                            Some(ConversionKind::SignExtend)
                        } else {
                            Some(ConversionKind::ZeroExtend)
                        }
                    } else {
                        Some(ConversionKind::Truncate)
                    }
                }
                (false, true) => {
                    if src_signed {
                        Some(ConversionKind::SignedIntToFloat)
                    } else {
                        Some(ConversionKind::UnsignedIntToFloat)
                    }
                }
                (true, false) => {
                    if dst_signed {
                        Some(ConversionKind::FloatToSignedInt)
                    } else {
                        Some(ConversionKind::FloatToUnsignedInt)
                    }
                }
                (true, true) => {
                    if src_bits == dst_bits {
                        Some(ConversionKind::Identity)
                    } else if src_bits < dst_bits {
                        Some(ConversionKind::FloatExtend)
                    } else {
                        Some(ConversionKind::FloatTruncate)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FloatWidth, IntWidth};

    #[test]
    fn bool_never_converts() {
        assert_eq!(
            allowed_conversion(&ResoType::Bool, &ResoType::Int(IntWidth::I32), 64),
            None
        );
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::I32), &ResoType::Bool, 64),
            None
        );
    }

    #[test]
    fn unit_and_null_never_convert() {
        assert_eq!(
            allowed_conversion(&ResoType::Unit, &ResoType::Int(IntWidth::I32), 64),
            None
        );
        assert_eq!(
            allowed_conversion(&ResoType::Null, &ResoType::Int(IntWidth::I32), 64),
            None
        );
    }

    #[test]
    fn widening_and_narrowing_ints() {
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::I8), &ResoType::Int(IntWidth::I32), 64),
            Some(ConversionKind::SignExtend)
        );
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::U8), &ResoType::Int(IntWidth::U32), 64),
            Some(ConversionKind::ZeroExtend)
        );
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::I64), &ResoType::Int(IntWidth::I8), 64),
            Some(ConversionKind::Truncate)
        );
    }

    #[test]
    fn int_float_roundtrip_kinds() {
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::I32), &ResoType::Float(FloatWidth::F64), 64),
            Some(ConversionKind::SignedIntToFloat)
        );
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::U32), &ResoType::Float(FloatWidth::F64), 64),
            Some(ConversionKind::UnsignedIntToFloat)
        );
        assert_eq!(
            allowed_conversion(&ResoType::Float(FloatWidth::F64), &ResoType::Int(IntWidth::I32), 64),
            Some(ConversionKind::FloatToSignedInt)
        );
    }

    #[test]
    fn char_is_unsigned_32_for_conversions() {
        assert_eq!(
            allowed_conversion(&ResoType::Char, &ResoType::Int(IntWidth::I64), 64),
            Some(ConversionKind::ZeroExtend)
        );
        assert_eq!(
            allowed_conversion(&ResoType::Int(IntWidth::I64), &ResoType::Char, 64),
            Some(ConversionKind::Truncate)
        );
    }

    #[test]
    fn reference_like_resource_types_never_convert_to_non_reference() {
        let registry = crate::types::TypeRegistry::new();
        let id = registry.get_or_create(
            "Foo",
            vec![],
            crate::symbols::Visibility::Global,
            crate::types::FileId(0),
        );
        assert_eq!(
            allowed_conversion(&ResoType::Resource(id), &ResoType::Int(IntWidth::I32), 64),
            None
        );
    }
}
