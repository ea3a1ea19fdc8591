//! Field model for wire schemas
//!
//! A message schema is an ordered list of fields. Each field is a scalar, a
//! fixed-length array of scalars, or a variable-length ("blob") payload.
//! Field ids are 12-bit and scoped to the message; types are encoded in a
//! 3-bit code on the wire.

use crate::{ProtocolError, Result};

/// Position value for the unpositioned trailing variable field
///
/// In packed layout the last variable field has no length prefix; its
/// payload trails the fixed part and its length is whatever remains of the
/// message. Real field positions start at 2, so 0 is unambiguous.
pub const UNPOSITIONED: u16 = 0;

/// Wire field type (3-bit code on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    /// Variable-length payload. Occupies a 2-byte length slot in the fixed
    /// part; the payload itself trails the fixed part.
    Var = 4,
    Int128 = 5,
}

impl FieldType {
    /// Parse a 3-bit wire type code
    pub fn from_wire(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Int8),
            1 => Ok(Self::Int16),
            2 => Ok(Self::Int32),
            3 => Ok(Self::Int64),
            4 => Ok(Self::Var),
            5 => Ok(Self::Int128),
            other => Err(ProtocolError::UnknownFieldType(other)),
        }
    }

    /// Wire type code for this type
    #[inline]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    /// Bytes one element of this type occupies in the fixed part
    ///
    /// Variable fields occupy their 2-byte length slot.
    #[inline]
    pub const fn elem_size(self) -> u16 {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Int64 => 8,
            Self::Var => 2,
            Self::Int128 => 16,
        }
    }

    /// Layout alignment: element size, except variable fields align to 2
    #[inline]
    pub const fn alignment(self) -> u16 {
        match self {
            Self::Var => 2,
            other => other.elem_size(),
        }
    }

    /// Whether this is a variable-length payload type
    #[inline]
    pub const fn is_var(self) -> bool {
        matches!(self, Self::Var)
    }

    /// String name of this type
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Var => "var",
            Self::Int128 => "int128",
        }
    }
}

/// A single field in a message schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field id, 0..=4095, unique within the message
    pub field_id: u16,
    /// Wire type
    pub ftype: FieldType,
    /// Element count: 1 for scalars, the declared length for arrays
    pub n_elems: u16,
    /// Byte offset in the fixed part, assigned by position computation.
    /// [`UNPOSITIONED`] for the trailing variable field in packed layout.
    pub pos: u16,
}

impl Field {
    /// Create a scalar field (position unassigned)
    pub const fn scalar(field_id: u16, ftype: FieldType) -> Self {
        Self {
            field_id,
            ftype,
            n_elems: 1,
            pos: UNPOSITIONED,
        }
    }

    /// Create a fixed-length array field (position unassigned)
    pub const fn array(field_id: u16, ftype: FieldType, n_elems: u16) -> Self {
        Self {
            field_id,
            ftype,
            n_elems,
            pos: UNPOSITIONED,
        }
    }

    /// Whether this field is a variable-length payload
    #[inline]
    pub const fn is_var(&self) -> bool {
        self.ftype.is_var()
    }

    /// Whether this field is an array (element count above 1)
    #[inline]
    pub const fn is_array(&self) -> bool {
        self.n_elems > 1
    }

    /// Total bytes this field occupies in the fixed part
    #[inline]
    pub const fn byte_size(&self) -> u32 {
        self.ftype.elem_size() as u32 * self.n_elems as u32
    }
}
