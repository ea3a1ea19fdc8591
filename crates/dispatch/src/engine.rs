//! Transform engine - executes copy plans
//!
//! A transform turns one wire message into the receiver's native layout:
//! scalar fields are copied into a fixed-layout output buffer, variable
//! payloads become [`BlobSpan`] windows into the source buffer, and the total
//! consumed length is returned. The engine here is the interpreted copy-list
//! executor; runtime code generation would satisfy the same [`Transform`]
//! contract and remains interchangeable behind it.

use std::fmt;
use std::sync::Arc;

use skew_protocol::wire::read_u16;

use crate::plan::CopyPlan;
use crate::{DispatchError, Result};

/// A non-owning window into the source buffer for one variable payload
///
/// Spans are resolved to byte slices only for the duration of one dispatch
/// call; nothing here owns the underlying bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobSpan {
    /// Payload offset in the source buffer
    pub pos: u32,
    /// Payload length in bytes
    pub len: u16,
}

impl BlobSpan {
    /// Resolve this span against the source buffer it was produced from
    #[inline]
    pub fn resolve<'a>(&self, src: &'a [u8]) -> Option<&'a [u8]> {
        src.get(self.pos as usize..self.pos as usize + self.len as usize)
    }
}

/// The `(src, dst) -> length` transform contract
///
/// `src` is one steady-state message starting at its 2-byte rpc-id;
/// `fixed_out` is the target-layout output buffer of [`output_size`] bytes;
/// `blobs_out` has [`blob_slots`] entries, one per target variable field.
/// Returns the total message length consumed from `src`.
///
/// [`output_size`]: Transform::output_size
/// [`blob_slots`]: Transform::blob_slots
pub trait Transform: Send + Sync {
    /// Execute the transform for one message
    fn apply(
        &self,
        src: &[u8],
        fixed_out: &mut [u8],
        blobs_out: &mut [Option<BlobSpan>],
    ) -> Result<u16>;

    /// Bytes of target-layout output this transform produces
    fn output_size(&self) -> u16;

    /// Number of blob slots the target layout declares
    fn blob_slots(&self) -> usize;
}

/// Interpreted copy-list executor
///
/// Runs the plan's scalar copies in a loop, then walks the variable payloads
/// trailing the peer fixed part in wire order.
pub struct CopyListTransform {
    plan: CopyPlan,
}

impl CopyListTransform {
    pub(crate) fn new(plan: CopyPlan) -> Self {
        Self { plan }
    }

    #[cfg(test)]
    pub(crate) fn plan(&self) -> &CopyPlan {
        &self.plan
    }

    /// Total message length per the peer's layout
    ///
    /// Dynamic messages carry it in the fixed part at `len_pos`; otherwise a
    /// trailing blob extends to the end of the presented buffer, or the
    /// message is exactly the fixed part.
    fn total_length(&self, src: &[u8]) -> Result<u16> {
        match self.plan.len_pos {
            Some(pos) if pos as usize + 2 <= self.plan.peer_fixed_size as usize => {
                Ok(read_u16(src, pos as usize)?)
            }
            _ if self.plan.has_remainder_blob() => u16::try_from(src.len())
                .map_err(|_| DispatchError::malformed("message exceeds 64KiB")),
            _ => Ok(self.plan.peer_fixed_size),
        }
    }
}

impl Transform for CopyListTransform {
    fn apply(
        &self,
        src: &[u8],
        fixed_out: &mut [u8],
        blobs_out: &mut [Option<BlobSpan>],
    ) -> Result<u16> {
        let fixed = self.plan.peer_fixed_size as usize;
        if src.len() < fixed {
            return Err(DispatchError::need_more(fixed, src.len()));
        }

        let total = self.total_length(src)?;
        if (total as usize) < fixed {
            return Err(DispatchError::malformed(format!(
                "declared length {total} shorter than fixed part {fixed}"
            )));
        }
        if total as usize > src.len() {
            return Err(DispatchError::need_more(total as usize, src.len()));
        }

        for op in &self.plan.ops {
            let sp = op.src_pos as usize;
            let dp = op.dst_pos as usize;
            let n = op.size as usize;
            let chunk = src
                .get(sp..sp + n)
                .ok_or_else(|| DispatchError::malformed("copy source out of bounds"))?;
            fixed_out
                .get_mut(dp..dp + n)
                .ok_or_else(|| DispatchError::malformed("copy destination out of bounds"))?
                .copy_from_slice(chunk);
        }

        let mut cursor = fixed;
        for blob in &self.plan.blobs {
            let len = match blob.src_pos {
                Some(pos) => read_u16(src, pos as usize)?,
                // Trailing field: length is whatever remains of the message
                None => (total as usize - cursor) as u16,
            };
            if cursor + len as usize > total as usize {
                return Err(DispatchError::malformed(format!(
                    "payload of {len} bytes at {cursor} extends past message length {total}"
                )));
            }
            if blob.should_write {
                if let Some(slot) = blobs_out.get_mut(blob.dst_slot as usize) {
                    *slot = Some(BlobSpan {
                        pos: cursor as u32,
                        len,
                    });
                }
                if blob.length_is_remainder {
                    // Explicit prefixes arrive via the scalar copy list; the
                    // implicit trailing length is only known now
                    let dp = blob.dst_len_pos as usize;
                    fixed_out
                        .get_mut(dp..dp + 2)
                        .ok_or_else(|| {
                            DispatchError::malformed("length slot out of bounds")
                        })?
                        .copy_from_slice(&len.to_le_bytes());
                }
            }
            cursor += len as usize;
        }

        Ok(total)
    }

    fn output_size(&self) -> u16 {
        self.plan.target_size
    }

    fn blob_slots(&self) -> usize {
        self.plan.n_target_blobs
    }
}

/// A reconciled transform for one rpc-id, ready for handler registration
///
/// Cloning shares the compiled plan; it is torn down once the last reference
/// is released.
#[derive(Clone)]
pub struct TransformRecord {
    target_rpc_id: u32,
    transform: Arc<dyn Transform>,
    fixed_size: u16,
    min_buffer_size: u16,
}

impl TransformRecord {
    pub(crate) fn new(
        target_rpc_id: u32,
        transform: Arc<dyn Transform>,
        fixed_size: u16,
        min_buffer_size: u16,
    ) -> Self {
        Self {
            target_rpc_id,
            transform,
            fixed_size,
            min_buffer_size,
        }
    }

    /// Rpc-id of the target message this transform produces
    #[inline]
    pub fn target_rpc_id(&self) -> u32 {
        self.target_rpc_id
    }

    /// Peer fixed-part byte length
    #[inline]
    pub fn fixed_size(&self) -> u16 {
        self.fixed_size
    }

    /// Bytes that must be buffered before the transform can run
    #[inline]
    pub fn min_buffer_size(&self) -> u16 {
        self.min_buffer_size
    }

    /// The compiled transform
    #[inline]
    pub fn transform(&self) -> &Arc<dyn Transform> {
        &self.transform
    }
}

impl fmt::Debug for TransformRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRecord")
            .field("target_rpc_id", &self.target_rpc_id)
            .field("fixed_size", &self.fixed_size)
            .field("min_buffer_size", &self.min_buffer_size)
            .finish_non_exhaustive()
    }
}
