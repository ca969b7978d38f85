// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Concrete types after template instantiation.

use std::fmt;

/// Builtin scalar kinds. `int`, `uint` and `real` are aliases resolved by the
/// front-end to their 32-bit forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// Saturating signed 8-bit.
    Sat8,
    Sat16,
    /// Saturating unsigned 8-bit.
    USat8,
    USat16,
    Real32,
    Real64,
    /// Unsigned 64-bit counter used for container indices and lengths.
    Index,
}

impl ScalarKind {
    /// Size in bytes of one scalar slot.
    pub fn size(self) -> u32 {
        match self {
            ScalarKind::Bool
            | ScalarKind::Int8
            | ScalarKind::UInt8
            | ScalarKind::Sat8
            | ScalarKind::USat8 => 1,
            ScalarKind::Int16 | ScalarKind::UInt16 | ScalarKind::Sat16 | ScalarKind::USat16 => 2,
            ScalarKind::Int32 | ScalarKind::UInt32 | ScalarKind::Real32 => 4,
            ScalarKind::Int64 | ScalarKind::UInt64 | ScalarKind::Real64 | ScalarKind::Index => 8,
        }
    }

    pub fn is_real(self) -> bool {
        matches!(self, ScalarKind::Real32 | ScalarKind::Real64)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, ScalarKind::Bool)
    }

    pub fn is_integer(self) -> bool {
        !self.is_real() && !self.is_bool()
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::Int8
                | ScalarKind::Int16
                | ScalarKind::Int32
                | ScalarKind::Int64
                | ScalarKind::Sat8
                | ScalarKind::Sat16
                | ScalarKind::Real32
                | ScalarKind::Real64
        )
    }

    /// Saturating kinds clamp instead of wrapping.
    pub fn is_saturating(self) -> bool {
        matches!(
            self,
            ScalarKind::Sat8 | ScalarKind::Sat16 | ScalarKind::USat8 | ScalarKind::USat16
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8",
            ScalarKind::Int16 => "int16",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt8 => "uint8",
            ScalarKind::UInt16 => "uint16",
            ScalarKind::UInt32 => "uint32",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Sat8 => "sat8",
            ScalarKind::Sat16 => "sat16",
            ScalarKind::USat8 => "usat8",
            ScalarKind::USat16 => "usat16",
            ScalarKind::Real32 => "real32",
            ScalarKind::Real64 => "real64",
            ScalarKind::Index => "index",
        }
    }

    /// Parse a source spelling, aliases included.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ScalarKind::Bool,
            "int8" => ScalarKind::Int8,
            "int16" => ScalarKind::Int16,
            "int" | "int32" => ScalarKind::Int32,
            "int64" => ScalarKind::Int64,
            "uint8" => ScalarKind::UInt8,
            "uint16" => ScalarKind::UInt16,
            "uint" | "uint32" => ScalarKind::UInt32,
            "uint64" => ScalarKind::UInt64,
            "sat8" => ScalarKind::Sat8,
            "sat16" => ScalarKind::Sat16,
            "usat8" => ScalarKind::USat8,
            "usat16" => ScalarKind::USat16,
            "real" | "real32" => ScalarKind::Real32,
            "real64" => ScalarKind::Real64,
            "index" => ScalarKind::Index,
            _ => return None,
        })
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved source type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Void,
    Scalar(ScalarKind),
    /// A user class, by name.
    Class(String),
    /// `simd{T}` container declared with a length, e.g. `simd{int} res = max_x`.
    Container(Box<Type>),
}

impl Type {
    pub fn int() -> Type {
        Type::Scalar(ScalarKind::Int32)
    }

    pub fn real() -> Type {
        Type::Scalar(ScalarKind::Real32)
    }

    pub fn bool() -> Type {
        Type::Scalar(ScalarKind::Bool)
    }

    pub fn index() -> Type {
        Type::Scalar(ScalarKind::Index)
    }

    pub fn class(name: impl Into<String>) -> Type {
        Type::Class(name.into())
    }

    pub fn container(elem: Type) -> Type {
        Type::Container(Box::new(elem))
    }

    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self {
            Type::Scalar(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Type::Container(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Scalar(k) => write!(f, "{}", k),
            Type::Class(name) => write!(f, "{}", name),
            Type::Container(elem) => write!(f, "simd{{{}}}[]", elem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_32_bit_kinds() {
        assert_eq!(ScalarKind::parse("int"), Some(ScalarKind::Int32));
        assert_eq!(ScalarKind::parse("real"), Some(ScalarKind::Real32));
        assert_eq!(ScalarKind::parse("uint"), Some(ScalarKind::UInt32));
        assert_eq!(ScalarKind::parse("float"), None);
    }

    #[test]
    fn sizes_follow_bit_width() {
        assert_eq!(ScalarKind::Int8.size(), 1);
        assert_eq!(ScalarKind::USat16.size(), 2);
        assert_eq!(ScalarKind::Real32.size(), 4);
        assert_eq!(ScalarKind::Index.size(), 8);
    }

    #[test]
    fn display_container() {
        assert_eq!(Type::container(Type::int()).to_string(), "simd{int32}[]");
    }
}
