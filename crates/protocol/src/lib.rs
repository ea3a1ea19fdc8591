//! Skew Protocol - Self-describing wire schemas for the skew pipeline
//!
//! Agents and the reducer are versioned independently: the set of fields a
//! sender puts on the wire may differ from the set the receiver was compiled
//! with. To bridge that gap, every connection starts with a schema exchange:
//! the sender transmits a compact binary descriptor for each message type it
//! intends to send, and the receiver parses it into a [`Descriptor`] with
//! fully computed byte positions.
//!
//! This crate provides the foundational pieces of that exchange:
//! - `Field` / `FieldType` - the field model (scalars, arrays, blobs)
//! - `Descriptor` - a parsed message schema with computed byte layout
//! - `DescriptorReader` - wire descriptor parsing and position assignment
//! - `IdMapping` - allocation of sub-schema message numbers into the shared
//!   global rpc-id space
//!
//! # Design Principles
//!
//! - **No interpretation of semantics**: descriptors describe layout only;
//!   what a field *means* is the caller's business.
//! - **Validate at the boundary**: every descriptor read from the wire is
//!   bounds-checked and range-checked before anything downstream sees it.
//! - **No allocations after parse**: a `Descriptor` is built once per
//!   connection and read many times.

mod descriptor;
mod error;
mod field;
mod idmap;
mod reader;
pub mod wire;

pub use descriptor::Descriptor;
pub use error::ProtocolError;
pub use field::{Field, FieldType, UNPOSITIONED};
pub use idmap::{IdMapping, Namespace, NAMESPACE_SCHEMA};
pub use reader::DescriptorReader;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Descriptor header length in bytes: flags, rpc-id, field count, array count
pub const DESCRIPTOR_HEADER_LEN: usize = 8;

/// Highest field id representable in a 12-bit field word
pub const MAX_FIELD_ID: u16 = 4095;

/// Largest declared array element count accepted from the wire
pub const MAX_ARRAY_LEN: u16 = 4096;

// Test modules - only compiled during testing
#[cfg(test)]
mod descriptor_test;
