//! Wire descriptor parsing and position assignment
//!
//! # Wire Format
//!
//! A descriptor is sent once per connection, before steady-state traffic:
//!
//! ```text
//! [u16 flags (must be 0)]
//! [u16 rpc_id]
//! [u16 n_fields]
//! [u16 n_arrays]
//! [n_fields field words]     bit 15: is_array
//!                            bits 14..12: type code
//!                            bits 11..0: field id
//! [n_arrays length words]    element counts, in field order
//! ```
//!
//! All accesses are bounds-checked; malformed descriptors return errors and
//! are fatal to the handshake.

use crate::field::{Field, FieldType, UNPOSITIONED};
use crate::wire::read_u16;
use crate::{Descriptor, ProtocolError, Result, DESCRIPTOR_HEADER_LEN, MAX_ARRAY_LEN};

/// Parses raw binary schemas into descriptors and computes field layouts
pub struct DescriptorReader;

impl DescriptorReader {
    /// Parse a wire descriptor
    ///
    /// Positions are not assigned; callers that need byte layout follow up
    /// with [`compute_positions`](Self::compute_positions). Descriptors used
    /// only for rpc-id bookkeeping skip that step.
    ///
    /// # Errors
    ///
    /// - buffer shorter than the 8-byte header, or than the declared word counts
    /// - nonzero flags
    /// - more array words than fields, or array/field count mismatch
    /// - array length outside `(0, 4096]`
    /// - unrecognized type code
    pub fn read(buf: &[u8]) -> Result<Descriptor> {
        if buf.len() < DESCRIPTOR_HEADER_LEN {
            return Err(ProtocolError::short(DESCRIPTOR_HEADER_LEN, buf.len()));
        }

        let flags = read_u16(buf, 0)?;
        if flags != 0 {
            return Err(ProtocolError::malformed(format!(
                "unsupported descriptor flags {flags:#06x}"
            )));
        }

        let rpc_id = read_u16(buf, 2)? as u32;
        let n_fields = read_u16(buf, 4)? as usize;
        let n_arrays = read_u16(buf, 6)? as usize;

        if n_arrays > n_fields {
            return Err(ProtocolError::TooManyArrays { n_arrays, n_fields });
        }

        let need = DESCRIPTOR_HEADER_LEN + 2 * (n_fields + n_arrays);
        if buf.len() < need {
            return Err(ProtocolError::short(need, buf.len()));
        }

        let mut fields = Vec::with_capacity(n_fields);
        let mut array_flags = Vec::with_capacity(n_fields);
        for i in 0..n_fields {
            let word = read_u16(buf, DESCRIPTOR_HEADER_LEN + 2 * i)?;
            let is_array = word & 0x8000 != 0;
            let ftype = FieldType::from_wire(((word >> 12) & 0x7) as u8)?;
            let field_id = word & 0x0fff;
            array_flags.push(is_array);
            fields.push(Field {
                field_id,
                ftype,
                n_elems: 1,
                pos: UNPOSITIONED,
            });
        }

        let declared_arrays = array_flags.iter().filter(|&&a| a).count();
        if declared_arrays != n_arrays {
            return Err(ProtocolError::malformed(format!(
                "{declared_arrays} fields flagged as arrays but {n_arrays} length words declared"
            )));
        }

        let array_words = DESCRIPTOR_HEADER_LEN + 2 * n_fields;
        let mut next_array = 0usize;
        for (field, is_array) in fields.iter_mut().zip(array_flags) {
            if !is_array {
                continue;
            }
            let len = read_u16(buf, array_words + 2 * next_array)?;
            next_array += 1;
            if len == 0 || len > MAX_ARRAY_LEN {
                return Err(ProtocolError::BadArrayLength {
                    field_id: field.field_id,
                    len,
                });
            }
            field.n_elems = len;
        }

        Ok(Descriptor::new(rpc_id, fields))
    }

    /// Assign byte positions to every field and compute the fixed-part size
    ///
    /// Two modes exist because a peer's wire descriptor needs full positions
    /// including the trailing-payload convention, while locally declared
    /// schemas describe a struct whose variable fields are plain length
    /// slots:
    ///
    /// - `packed_strings = true` (peer/wire layout): the fixed part starts at
    ///   offset 4 when variable fields are present (2-byte rpc-id prelude
    ///   plus the 2-byte total-length field), and the *last* variable field
    ///   stays [`UNPOSITIONED`] - its payload trails the fixed part and its
    ///   length is whatever remains of the message.
    /// - `packed_strings = false` (native layout): the fixed part starts at
    ///   offset 2 and every variable field gets a positioned length slot.
    ///
    /// Fields are walked in declaration order. Alignment is 2 for variable
    /// fields, otherwise the element size, applied relative to the starting
    /// offset. The running offset never decreases and the final offset
    /// becomes the descriptor's `size`.
    pub fn compute_positions(desc: &mut Descriptor, packed_strings: bool) -> Result<()> {
        let base: u32 = if packed_strings && desc.n_var_fields > 0 {
            4
        } else {
            2
        };

        let mut rel: u32 = 0;
        let mut vars_left = desc.n_var_fields;
        for field in desc.fields.iter_mut() {
            if field.is_var() {
                vars_left -= 1;
                if packed_strings && vars_left == 0 {
                    field.pos = UNPOSITIONED;
                    continue;
                }
            }
            let align = field.ftype.alignment() as u32;
            rel = rel.div_ceil(align) * align;
            if base + rel + field.byte_size() > u16::MAX as u32 {
                return Err(ProtocolError::malformed(format!(
                    "fixed part exceeds {} bytes",
                    u16::MAX
                )));
            }
            field.pos = (base + rel) as u16;
            rel += field.byte_size();
        }

        desc.size = (base + rel) as u16;
        Ok(())
    }
}
