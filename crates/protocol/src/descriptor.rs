//! Descriptor - a parsed message schema with computed byte layout

use crate::field::Field;
use crate::DESCRIPTOR_HEADER_LEN;

/// A message schema: ordered fields, types, and computed byte positions
///
/// Descriptors come from two places: parsed off the wire during the
/// per-connection schema exchange, or declared in code for the messages the
/// receiver was compiled with. Either way a descriptor is built once and
/// lives for the connection's lifetime.
///
/// Positions are assigned separately by
/// [`DescriptorReader::compute_positions`](crate::DescriptorReader::compute_positions);
/// a freshly constructed descriptor has `size == 0` and all fields
/// unpositioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub(crate) rpc_id: u32,
    pub(crate) fields: Vec<Field>,
    pub(crate) n_var_fields: u16,
    pub(crate) dynamic_size: bool,
    pub(crate) size: u16,
}

impl Descriptor {
    /// Create a descriptor from declared fields
    ///
    /// Variable-field count and the dynamic-size flag are derived from the
    /// field list. Positions remain unassigned.
    pub fn new(rpc_id: u32, fields: Vec<Field>) -> Self {
        let n_var_fields = fields.iter().filter(|f| f.is_var()).count() as u16;
        Self {
            rpc_id,
            fields,
            n_var_fields,
            dynamic_size: n_var_fields > 0,
            size: 0,
        }
    }

    /// Message rpc-id
    #[inline]
    pub fn rpc_id(&self) -> u32 {
        self.rpc_id
    }

    /// Fields in declaration order
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of variable-length fields
    #[inline]
    pub fn n_var_fields(&self) -> u16 {
        self.n_var_fields
    }

    /// Whether messages of this schema carry variable-length payloads
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic_size
    }

    /// Fixed-part byte length (0 until positions are computed)
    #[inline]
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Look up a field by id
    pub fn field(&self, field_id: u16) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    /// Variable-length fields in declaration order
    pub fn var_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_var())
    }

    /// Re-encode this descriptor into its wire form
    ///
    /// Produces bytes accepted by [`DescriptorReader::read`](crate::DescriptorReader::read).
    /// Used for identity registration (the receiver presents its own schema
    /// as the peer schema) and for tests. Wire descriptors carry 16-bit
    /// rpc-ids; callers map global ids into that space via
    /// [`IdMapping`](crate::IdMapping) before encoding.
    pub fn to_wire(&self) -> Vec<u8> {
        let n_arrays = self.fields.iter().filter(|f| f.is_array()).count();
        let mut buf =
            Vec::with_capacity(DESCRIPTOR_HEADER_LEN + 2 * (self.fields.len() + n_arrays));

        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&(self.rpc_id as u16).to_le_bytes());
        buf.extend_from_slice(&(self.fields.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(n_arrays as u16).to_le_bytes());

        for f in &self.fields {
            let mut word = f.field_id & 0x0fff;
            word |= (f.ftype.to_wire() as u16) << 12;
            if f.is_array() {
                word |= 1 << 15;
            }
            buf.extend_from_slice(&word.to_le_bytes());
        }
        for f in self.fields.iter().filter(|f| f.is_array()) {
            buf.extend_from_slice(&f.n_elems.to_le_bytes());
        }

        buf
    }
}
