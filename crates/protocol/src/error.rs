//! Protocol error types
//!
//! Errors that can occur while parsing wire descriptors or resolving rpc-id
//! namespaces. All of these are raised at schema-exchange time and are fatal
//! to the handshake; the connection layer is expected to drop or reset the
//! connection on any of them.

use thiserror::Error;

/// Errors that can occur during schema parsing and id mapping
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is too short for the structure it claims to contain
    #[error("short buffer: expected at least {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    /// Descriptor violates the wire format
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// More array-length words than fields
    #[error("descriptor declares {n_arrays} arrays for {n_fields} fields")]
    TooManyArrays { n_arrays: usize, n_fields: usize },

    /// Array element count outside (0, 4096]
    #[error("field {field_id} has invalid array length {len}")]
    BadArrayLength { field_id: u16, len: u16 },

    /// Unrecognized 3-bit type code in a field word
    #[error("unknown field type code {0}")]
    UnknownFieldType(u8),

    /// Namespace path does not resolve to an id-range declaration
    #[error("bad namespace path: {0}")]
    BadNamespacePath(String),

    /// Range spec string failed to parse
    #[error("bad id range spec: {0}")]
    BadRangeSpec(String),

    /// Local message number exceeds the capacity of the declared id ranges
    #[error("local id {local_id} exceeds id-space capacity {capacity}")]
    IdSpaceExhausted { local_id: u16, capacity: u32 },
}

impl ProtocolError {
    /// Create a short buffer error
    #[inline]
    pub fn short(expected: usize, actual: usize) -> Self {
        Self::ShortBuffer { expected, actual }
    }

    /// Create a malformed descriptor error
    #[inline]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDescriptor(msg.into())
    }

    /// Create a bad namespace path error
    #[inline]
    pub fn bad_path(msg: impl Into<String>) -> Self {
        Self::BadNamespacePath(msg.into())
    }

    /// Create a bad range spec error
    #[inline]
    pub fn bad_ranges(msg: impl Into<String>) -> Self {
        Self::BadRangeSpec(msg.into())
    }
}
