//! The type lattice: primitive kinds, literal types, resource types and the
//! registry that hands out stable handles for them.
//!
//! A `Type` enum plus textual resolution from a source-level type name,
//! generalized from a flat `Integer`/`FloatingPoint` primitive split to the
//! full signed/unsigned fixed-width lattice this language's type system
//! needs, with resource types interned in a registry of stable handles
//! rather than an un-cached `Struct(String, Vec<(String, Type)>)`.

mod conversion;
mod registry;

pub use conversion::{allowed_conversion, ConversionKind};
pub use registry::{FileId, ResourceTypeData, ResourceTypeId, TypeRegistry};

use std::fmt;

/// Width/signedness of a fixed-width integer primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    ISize,
    U8,
    U16,
    U32,
    U64,
    USize,
}

impl IntWidth {
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntWidth::I8 | IntWidth::I16 | IntWidth::I32 | IntWidth::I64 | IntWidth::ISize
        )
    }

    /// Bit width of this integer kind. `isize`/`usize` take their width from
    /// the target pointer width, supplied by the
    /// caller rather than baked into the registry.
    pub fn bits(self, pointer_width: u32) -> u32 {
        match self {
            IntWidth::I8 | IntWidth::U8 => 8,
            IntWidth::I16 | IntWidth::U16 => 16,
            IntWidth::I32 | IntWidth::U32 => 32,
            IntWidth::I64 | IntWidth::U64 => 64,
            IntWidth::ISize | IntWidth::USize => pointer_width,
        }
    }

    /// Inclusive `[min, max]` range this integer kind can represent, as
    /// `i128`/`u128` pairs wide enough to hold any fixed-width extreme.
    pub fn range(self, pointer_width: u32) -> (i128, u128) {
        let bits = self.bits(pointer_width);
        if self.is_signed() {
            let max = (1i128 << (bits - 1)) - 1;
            let min = -(1i128 << (bits - 1));
            (min, max as u128)
        } else {
            let max = if bits == 128 {
                u128::MAX
            } else {
                (1u128 << bits) - 1
            };
            (0, max)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::ISize => "isize",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
            IntWidth::USize => "usize",
        }
    }

    pub fn from_name(name: &str) -> Option<IntWidth> {
        Some(match name {
            "i8" => IntWidth::I8,
            "i16" => IntWidth::I16,
            "i32" => IntWidth::I32,
            "i64" => IntWidth::I64,
            "isize" => IntWidth::ISize,
            "u8" => IntWidth::U8,
            "u16" => IntWidth::U16,
            "u32" => IntWidth::U32,
            "u64" => IntWidth::U64,
            "usize" => IntWidth::USize,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn name(self) -> &'static str {
        match self {
            FloatWidth::F32 => "f32",
            FloatWidth::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<FloatWidth> {
        Some(match name {
            "f32" => FloatWidth::F32,
            "f64" => FloatWidth::F64,
            _ => return None,
        })
    }
}

/// The canonical semantic type of the language.
///
/// `Generic(index)` only ever appears inside the signature of a method
/// belonging to a generic resource; it is resolved against the receiver's
/// concrete generic arguments at the call site and never escapes into a
/// `ConcreteResoValue`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ResoType {
    Int(IntWidth),
    Float(FloatWidth),
    Bool,
    /// 32-bit Unicode scalar value. Neither signed nor unsigned for predicate
    /// selection, but treated as an unsigned 32-bit integer for conversions.
    Char,
    Null,
    /// Zero-sized unit type, `()`.
    Unit,
    Resource(ResourceTypeId),
    Generic(usize),
}

impl ResoType {
    pub fn is_integer(&self) -> bool {
        matches!(self, ResoType::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ResoType::Float(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_signed_int(&self) -> bool {
        matches!(self, ResoType::Int(w) if w.is_signed())
    }

    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, ResoType::Int(w) if !w.is_signed())
    }
}

impl fmt::Display for ResoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResoType::Int(w) => write!(f, "{}", w.name()),
            ResoType::Float(w) => write!(f, "{}", w.name()),
            ResoType::Bool => write!(f, "bool"),
            ResoType::Char => write!(f, "char"),
            ResoType::Null => write!(f, "Null"),
            ResoType::Unit => write!(f, "()"),
            ResoType::Resource(id) => write!(f, "#{id:?}"),
            ResoType::Generic(i) => write!(f, "T{i}"),
        }
    }
}

/// Resolve a type by its textual (source-level) name. Returns `None` (and
/// the caller reports `UnknownType`) if
/// `name` is neither a primitive nor a registered resource/type name.
pub fn resolve_type_by_name(name: &str, registry: &TypeRegistry<'_>) -> Option<ResoType> {
    if let Some(w) = IntWidth::from_name(name) {
        return Some(ResoType::Int(w));
    }
    if let Some(w) = FloatWidth::from_name(name) {
        return Some(ResoType::Float(w));
    }
    match name {
        "bool" => return Some(ResoType::Bool),
        "char" => return Some(ResoType::Char),
        "Null" => return Some(ResoType::Null),
        "()" | "unit" | "void" => return Some(ResoType::Unit),
        _ => {}
    }
    registry.lookup_by_name(name).map(ResoType::Resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_width_ranges_are_symmetric_around_sign() {
        assert_eq!(IntWidth::I8.range(64), (-128, 127));
        assert_eq!(IntWidth::U8.range(64), (0, 255));
        assert_eq!(IntWidth::ISize.range(32), IntWidth::I32.range(64));
    }

    #[test]
    fn resolve_type_by_name_finds_primitives() {
        let registry = TypeRegistry::new();
        assert_eq!(
            resolve_type_by_name("i32", &registry),
            Some(ResoType::Int(IntWidth::I32))
        );
        assert_eq!(
            resolve_type_by_name("f64", &registry),
            Some(ResoType::Float(FloatWidth::F64))
        );
        assert_eq!(resolve_type_by_name("bogus", &registry), None);
    }
}
