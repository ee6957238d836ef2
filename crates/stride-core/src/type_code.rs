//! Element type tags and their interoperability type codes
//!
//! A [`TypeCode`] is a category plus a kind. The kind is the byte width of
//! one value (of one component, for complex; of one character, for
//! character types). Each supported combination maps to exactly one signed
//! byte in the descriptor header.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    Integer,
    Unsigned,
    Real,
    Complex,
    Logical,
    Character,
    /// User-defined structure; layout comes from a [`crate::DerivedType`]
    Derived,
    /// Not yet determined (unlimited polymorphic before a mold is applied)
    Other,
}

/// Interoperability type byte values.
pub mod codes {
    pub const CFI_TYPE_OTHER: i8 = -1;
    pub const CFI_TYPE_INT8: i8 = 7;
    pub const CFI_TYPE_INT16: i8 = 8;
    pub const CFI_TYPE_INT32: i8 = 9;
    pub const CFI_TYPE_INT64: i8 = 10;
    pub const CFI_TYPE_INT128: i8 = 11;
    pub const CFI_TYPE_INT_LEAST16: i8 = 13;
    pub const CFI_TYPE_INT_LEAST32: i8 = 14;
    pub const CFI_TYPE_INT_LEAST64: i8 = 15;
    pub const CFI_TYPE_HALF_FLOAT: i8 = 25;
    pub const CFI_TYPE_BFLOAT: i8 = 26;
    pub const CFI_TYPE_FLOAT: i8 = 27;
    pub const CFI_TYPE_DOUBLE: i8 = 28;
    pub const CFI_TYPE_EXTENDED_DOUBLE: i8 = 29;
    pub const CFI_TYPE_FLOAT128: i8 = 31;
    pub const CFI_TYPE_HALF_FLOAT_COMPLEX: i8 = 32;
    pub const CFI_TYPE_BFLOAT_COMPLEX: i8 = 33;
    pub const CFI_TYPE_FLOAT_COMPLEX: i8 = 34;
    pub const CFI_TYPE_DOUBLE_COMPLEX: i8 = 35;
    pub const CFI_TYPE_EXTENDED_DOUBLE_COMPLEX: i8 = 36;
    pub const CFI_TYPE_FLOAT128_COMPLEX: i8 = 38;
    pub const CFI_TYPE_BOOL: i8 = 39;
    pub const CFI_TYPE_CHAR: i8 = 40;
    pub const CFI_TYPE_STRUCT: i8 = 42;
    pub const CFI_TYPE_CHAR16: i8 = 43;
    pub const CFI_TYPE_CHAR32: i8 = 44;
    pub const CFI_TYPE_UINT8: i8 = 45;
    pub const CFI_TYPE_UINT16: i8 = 46;
    pub const CFI_TYPE_UINT32: i8 = 47;
    pub const CFI_TYPE_UINT64: i8 = 48;
    pub const CFI_TYPE_UINT128: i8 = 49;
}

use codes::*;

/// Category and kind of an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeCode {
    category: TypeCategory,
    kind: u8,
}

impl TypeCode {
    /// Type of a derived (structure) value.
    pub const DERIVED: TypeCode = TypeCode::new(TypeCategory::Derived, 0);
    /// Undetermined type.
    pub const OTHER: TypeCode = TypeCode::new(TypeCategory::Other, 0);

    /// Build a type code. The pair is not validated; see [`TypeCode::is_supported`].
    pub const fn new(category: TypeCategory, kind: u8) -> Self {
        Self { category, kind }
    }

    pub const fn integer(kind: u8) -> Self {
        Self::new(TypeCategory::Integer, kind)
    }

    pub const fn unsigned(kind: u8) -> Self {
        Self::new(TypeCategory::Unsigned, kind)
    }

    pub const fn real(kind: u8) -> Self {
        Self::new(TypeCategory::Real, kind)
    }

    pub const fn complex(kind: u8) -> Self {
        Self::new(TypeCategory::Complex, kind)
    }

    pub const fn logical(kind: u8) -> Self {
        Self::new(TypeCategory::Logical, kind)
    }

    pub const fn character(kind: u8) -> Self {
        Self::new(TypeCategory::Character, kind)
    }

    pub fn category(&self) -> TypeCategory {
        self.category
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    /// Whether this category/kind pair has an interoperability code.
    pub fn is_supported(&self) -> bool {
        self.to_raw().is_some()
    }

    /// Interoperability type byte.
    pub fn to_raw(&self) -> Option<i8> {
        use TypeCategory::*;
        let raw = match (self.category, self.kind) {
            (Integer, 1) => CFI_TYPE_INT8,
            (Integer, 2) => CFI_TYPE_INT16,
            (Integer, 4) => CFI_TYPE_INT32,
            (Integer, 8) => CFI_TYPE_INT64,
            (Integer, 16) => CFI_TYPE_INT128,
            (Unsigned, 1) => CFI_TYPE_UINT8,
            (Unsigned, 2) => CFI_TYPE_UINT16,
            (Unsigned, 4) => CFI_TYPE_UINT32,
            (Unsigned, 8) => CFI_TYPE_UINT64,
            (Unsigned, 16) => CFI_TYPE_UINT128,
            (Real, 2) => CFI_TYPE_HALF_FLOAT,
            (Real, 3) => CFI_TYPE_BFLOAT,
            (Real, 4) => CFI_TYPE_FLOAT,
            (Real, 8) => CFI_TYPE_DOUBLE,
            (Real, 10) => CFI_TYPE_EXTENDED_DOUBLE,
            (Real, 16) => CFI_TYPE_FLOAT128,
            (Complex, 2) => CFI_TYPE_HALF_FLOAT_COMPLEX,
            (Complex, 3) => CFI_TYPE_BFLOAT_COMPLEX,
            (Complex, 4) => CFI_TYPE_FLOAT_COMPLEX,
            (Complex, 8) => CFI_TYPE_DOUBLE_COMPLEX,
            (Complex, 10) => CFI_TYPE_EXTENDED_DOUBLE_COMPLEX,
            (Complex, 16) => CFI_TYPE_FLOAT128_COMPLEX,
            (Logical, 1) => CFI_TYPE_BOOL,
            (Logical, 2) => CFI_TYPE_INT_LEAST16,
            (Logical, 4) => CFI_TYPE_INT_LEAST32,
            (Logical, 8) => CFI_TYPE_INT_LEAST64,
            (Character, 1) => CFI_TYPE_CHAR,
            (Character, 2) => CFI_TYPE_CHAR16,
            (Character, 4) => CFI_TYPE_CHAR32,
            (Derived, _) => CFI_TYPE_STRUCT,
            (Other, _) => CFI_TYPE_OTHER,
            _ => return None,
        };
        Some(raw)
    }

    /// Decode an interoperability type byte.
    pub fn from_raw(raw: i8) -> Option<Self> {
        let code = match raw {
            CFI_TYPE_INT8 => Self::integer(1),
            CFI_TYPE_INT16 => Self::integer(2),
            CFI_TYPE_INT32 => Self::integer(4),
            CFI_TYPE_INT64 => Self::integer(8),
            CFI_TYPE_INT128 => Self::integer(16),
            CFI_TYPE_UINT8 => Self::unsigned(1),
            CFI_TYPE_UINT16 => Self::unsigned(2),
            CFI_TYPE_UINT32 => Self::unsigned(4),
            CFI_TYPE_UINT64 => Self::unsigned(8),
            CFI_TYPE_UINT128 => Self::unsigned(16),
            CFI_TYPE_HALF_FLOAT => Self::real(2),
            CFI_TYPE_BFLOAT => Self::real(3),
            CFI_TYPE_FLOAT => Self::real(4),
            CFI_TYPE_DOUBLE => Self::real(8),
            CFI_TYPE_EXTENDED_DOUBLE => Self::real(10),
            CFI_TYPE_FLOAT128 => Self::real(16),
            CFI_TYPE_HALF_FLOAT_COMPLEX => Self::complex(2),
            CFI_TYPE_BFLOAT_COMPLEX => Self::complex(3),
            CFI_TYPE_FLOAT_COMPLEX => Self::complex(4),
            CFI_TYPE_DOUBLE_COMPLEX => Self::complex(8),
            CFI_TYPE_EXTENDED_DOUBLE_COMPLEX => Self::complex(10),
            CFI_TYPE_FLOAT128_COMPLEX => Self::complex(16),
            CFI_TYPE_BOOL => Self::logical(1),
            CFI_TYPE_INT_LEAST16 => Self::logical(2),
            CFI_TYPE_INT_LEAST32 => Self::logical(4),
            CFI_TYPE_INT_LEAST64 => Self::logical(8),
            CFI_TYPE_CHAR => Self::character(1),
            CFI_TYPE_CHAR16 => Self::character(2),
            CFI_TYPE_CHAR32 => Self::character(4),
            CFI_TYPE_STRUCT => Self::DERIVED,
            CFI_TYPE_OTHER => Self::OTHER,
            _ => return None,
        };
        Some(code)
    }

    /// Bytes of one element, when the code alone determines it.
    ///
    /// `None` for character (depends on the length), derived and other types.
    pub fn element_bytes(&self) -> Option<usize> {
        if !self.is_supported() {
            return None;
        }
        let storage = storage_bytes(self.kind as usize);
        match self.category {
            TypeCategory::Integer | TypeCategory::Unsigned | TypeCategory::Real | TypeCategory::Logical => {
                Some(storage)
            }
            TypeCategory::Complex => Some(2 * storage),
            TypeCategory::Character | TypeCategory::Derived | TypeCategory::Other => None,
        }
    }

    /// Natural alignment of one element (of one component, for complex).
    pub fn alignment(&self) -> usize {
        match self.category {
            TypeCategory::Derived | TypeCategory::Other => 1,
            _ => storage_bytes(self.kind as usize).clamp(1, 16),
        }
    }

    /// Whether the category stores integers (and can carry bounds).
    pub fn is_integer(&self) -> bool {
        matches!(self.category, TypeCategory::Integer | TypeCategory::Unsigned)
    }
}

/// Storage width of a kind: bfloat (3) occupies two bytes, x87 extended (10) sixteen.
fn storage_bytes(kind: usize) -> usize {
    match kind {
        3 => 2,
        10 => 16,
        k => k,
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.category {
            TypeCategory::Integer => "INTEGER",
            TypeCategory::Unsigned => "UNSIGNED",
            TypeCategory::Real => "REAL",
            TypeCategory::Complex => "COMPLEX",
            TypeCategory::Logical => "LOGICAL",
            TypeCategory::Character => "CHARACTER",
            TypeCategory::Derived => return f.write_str("TYPE(derived)"),
            TypeCategory::Other => return f.write_str("TYPE(*)"),
        };
        write!(f, "{name}({})", self.kind)
    }
}
