//! Copy plans - the data a transform executes
//!
//! A plan is built once per distinct peer schema by the
//! [`TransformBuilder`](crate::TransformBuilder) and executed for every
//! message of that schema. Scalar fields become [`CopyOp`]s; variable-length
//! payloads become [`BlobDetails`] entries walked in wire order.

/// A single fixed-field copy: `size` bytes from `src_pos` to `dst_pos`
///
/// Sizes are restricted to 1, 2, 4, or 8 bytes. 128-bit fields are emitted
/// as two 8-byte ops; array fields as one op per element. The 2-byte length
/// prefixes of matched non-trailing blobs ride this same mechanism instead
/// of a separate code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOp {
    /// Offset in the peer (wire) fixed part
    pub src_pos: u16,
    /// Offset in the target (native) fixed part
    pub dst_pos: u16,
    /// Bytes to copy: 1, 2, 4, or 8
    pub size: u16,
}

/// Per variable-length field transform metadata
///
/// Entries appear in the peer's declaration order. Unmatched entries before
/// the last matched one are kept with `should_write = false`: their lengths
/// still have to be read to locate the payloads that follow them. Entries
/// after the last matched one are trimmed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobDetails {
    /// Offset of this blob's 2-byte length prefix in the peer fixed part;
    /// `None` for the trailing field, whose length is implicit
    pub src_pos: Option<u16>,
    /// Index of the destination blob slot (target variable-field ordinal)
    pub dst_slot: u16,
    /// Offset of the destination length slot in the target fixed part
    pub dst_len_pos: u16,
    /// Whether the target has a matching field
    pub should_write: bool,
    /// True only for the trailing variable field
    pub length_is_remainder: bool,
}

/// A compiled copy plan for one (peer schema, target schema) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    /// Rpc-id of the target message this plan produces
    pub(crate) target_rpc_id: u32,
    /// Fixed-field and length-prefix copies
    pub(crate) ops: Vec<CopyOp>,
    /// Variable-field entries in wire order, trimmed after the last match
    pub(crate) blobs: Vec<BlobDetails>,
    /// Peer fixed-part byte length; payloads start here
    pub(crate) peer_fixed_size: u16,
    /// Target fixed-part byte length; the output buffer size
    pub(crate) target_size: u16,
    /// Offset of the peer's total-length field, when the message is dynamic
    pub(crate) len_pos: Option<u16>,
    /// Number of blob slots the target declares
    pub(crate) n_target_blobs: usize,
}

impl CopyPlan {
    /// Whether the plan carries a trailing implicit-length blob
    pub(crate) fn has_remainder_blob(&self) -> bool {
        self.blobs.iter().any(|b| b.length_is_remainder)
    }
}
