//! TransformBuilder - schema reconciliation
//!
//! The single place where schema skew between independently evolving senders
//! and the receiver is reconciled. For each peer wire descriptor the builder
//! looks up the locally compiled ("target") schema with the same rpc-id,
//! matches fields by id, and compiles a copy plan. Reconciliation is
//! relatively expensive, so records are memoized in a bounded LRU cache
//! keyed by the exact peer-descriptor bytes.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace};

use skew_protocol::{Descriptor, DescriptorReader, Field};

use crate::engine::{CopyListTransform, TransformRecord};
use crate::plan::{BlobDetails, CopyOp, CopyPlan};
use crate::{DispatchError, Result};

/// Default capacity of the peer-schema-to-transform cache
///
/// A connection negotiates one schema per message type it sends; capacity is
/// generous for that and small enough that a hostile peer cycling schemas
/// cannot grow memory unboundedly.
pub const DEFAULT_XFORM_CACHE_CAPACITY: usize = 64;

/// Reconciles peer schemas against locally compiled target schemas
pub struct TransformBuilder {
    targets: HashMap<u32, Descriptor>,
    cache: LruCache<Vec<u8>, TransformRecord>,
}

impl TransformBuilder {
    /// Create a builder with the default cache capacity
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_XFORM_CACHE_CAPACITY)
    }

    /// Create a builder with an explicit cache capacity
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            targets: HashMap::new(),
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Register a locally compiled target schema
    ///
    /// The target's layout is fixed and already known, so positions are
    /// computed in native (non-packed) mode.
    ///
    /// # Errors
    ///
    /// `DuplicateRpcId` if a schema is already registered for this rpc-id.
    pub fn add_descriptor(&mut self, mut descriptor: Descriptor) -> Result<()> {
        if self.targets.contains_key(&descriptor.rpc_id()) {
            return Err(DispatchError::DuplicateRpcId(descriptor.rpc_id()));
        }
        DescriptorReader::compute_positions(&mut descriptor, false)?;
        debug!(
            rpc_id = descriptor.rpc_id(),
            n_fields = descriptor.fields().len(),
            size = descriptor.size(),
            "registered target schema"
        );
        self.targets.insert(descriptor.rpc_id(), descriptor);
        Ok(())
    }

    /// Whether a target schema is registered for this rpc-id
    pub fn has_descriptor(&self, rpc_id: u32) -> bool {
        self.targets.contains_key(&rpc_id)
    }

    /// Reconcile a peer wire descriptor into a transform record
    ///
    /// Memoized: byte-identical peer descriptors return the cached record.
    ///
    /// # Errors
    ///
    /// - descriptor parse failures (propagated from the reader)
    /// - `UnknownTargetRpcId` if no target schema carries the peer's rpc-id
    /// - `PeerTooSmall` if matched fields extend past the peer's fixed size
    pub fn get_xform(&mut self, peer_bytes: &[u8]) -> Result<TransformRecord> {
        if let Some(record) = self.cache.get(peer_bytes) {
            trace!(rpc_id = record.target_rpc_id(), "transform cache hit");
            return Ok(record.clone());
        }

        let plan = self.build_plan(peer_bytes)?;
        let fixed_size = plan.peer_fixed_size;
        let target_rpc_id = plan.target_rpc_id;
        let record = TransformRecord::new(
            target_rpc_id,
            Arc::new(CopyListTransform::new(plan)),
            fixed_size,
            fixed_size,
        );
        self.cache.put(peer_bytes.to_vec(), record.clone());
        Ok(record)
    }

    /// Compile a copy plan from raw peer-descriptor bytes
    pub(crate) fn build_plan(&self, peer_bytes: &[u8]) -> Result<CopyPlan> {
        let mut peer = DescriptorReader::read(peer_bytes)?;
        DescriptorReader::compute_positions(&mut peer, true)?;

        let target = self
            .targets
            .get(&peer.rpc_id())
            .ok_or(DispatchError::UnknownTargetRpcId(peer.rpc_id()))?;

        let mut ops = Vec::new();
        let mut min_size: u32 = 0;

        for tf in target.fields().iter().filter(|f| !f.is_var()) {
            let matched = peer
                .fields()
                .iter()
                .find(|pf| pf.field_id == tf.field_id && !pf.is_var() && pf.ftype == tf.ftype);
            let Some(pf) = matched else { continue };

            let elem = tf.ftype.elem_size();
            let n_elems = tf.n_elems.min(pf.n_elems);
            push_copies(&mut ops, pf.pos, tf.pos, elem, n_elems);
            min_size = min_size.max(pf.pos as u32 + elem as u32 * n_elems as u32);
        }

        let blobs = self.build_blob_plan(&peer, target, &mut ops, &mut min_size);

        if min_size > peer.size() as u32 {
            return Err(DispatchError::PeerTooSmall {
                needed: min_size,
                declared: peer.size(),
            });
        }

        let len_pos = if peer.is_dynamic() { Some(2) } else { None };
        debug!(
            rpc_id = peer.rpc_id(),
            n_ops = ops.len(),
            n_blobs = blobs.len(),
            peer_size = peer.size(),
            target_size = target.size(),
            "built wire transform"
        );

        Ok(CopyPlan {
            target_rpc_id: target.rpc_id(),
            ops,
            blobs,
            peer_fixed_size: peer.size(),
            target_size: target.size(),
            len_pos,
            n_target_blobs: target.n_var_fields() as usize,
        })
    }

    /// Match peer variable fields against target variable fields
    ///
    /// Peer blobs are walked in declaration order; the last one has no length
    /// prefix. Matched non-trailing blobs also enqueue a 2-byte scalar copy
    /// of their length prefix into the target length slot, reusing the copy
    /// list instead of a separate code path. The list is trimmed after the
    /// last matched entry.
    fn build_blob_plan(
        &self,
        peer: &Descriptor,
        target: &Descriptor,
        ops: &mut Vec<CopyOp>,
        min_size: &mut u32,
    ) -> Vec<BlobDetails> {
        let peer_vars: Vec<&Field> = peer.var_fields().collect();
        let target_vars: Vec<&Field> = target.var_fields().collect();

        let mut blobs = Vec::with_capacity(peer_vars.len());
        let mut last_matched = None;

        for (i, pv) in peer_vars.iter().enumerate() {
            let is_trailing = i + 1 == peer_vars.len();
            let mut details = BlobDetails {
                src_pos: (!is_trailing).then_some(pv.pos),
                dst_slot: 0,
                dst_len_pos: 0,
                should_write: false,
                length_is_remainder: is_trailing,
            };

            if let Some((slot, tv)) = target_vars
                .iter()
                .enumerate()
                .find(|(_, tv)| tv.field_id == pv.field_id)
            {
                details.should_write = true;
                details.dst_slot = slot as u16;
                details.dst_len_pos = tv.pos;
                if !is_trailing {
                    ops.push(CopyOp {
                        src_pos: pv.pos,
                        dst_pos: tv.pos,
                        size: 2,
                    });
                }
                last_matched = Some(i);
            }
            if !is_trailing {
                // The length prefix must be readable even for unmatched
                // blobs: payloads behind them cannot be located otherwise
                *min_size = (*min_size).max(pv.pos as u32 + 2);
            }

            blobs.push(details);
        }

        match last_matched {
            Some(i) => blobs.truncate(i + 1),
            None => blobs.clear(),
        }
        blobs
    }
}

impl Default for TransformBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit copy ops for one matched field, element by element
///
/// Op sizes are restricted to 1, 2, 4, or 8 bytes; 128-bit elements are
/// split into two 8-byte copies.
fn push_copies(ops: &mut Vec<CopyOp>, src: u16, dst: u16, elem: u16, n_elems: u16) {
    for i in 0..n_elems {
        let sp = src + i * elem;
        let dp = dst + i * elem;
        if elem == 16 {
            ops.push(CopyOp {
                src_pos: sp,
                dst_pos: dp,
                size: 8,
            });
            ops.push(CopyOp {
                src_pos: sp + 8,
                dst_pos: dp + 8,
                size: 8,
            });
        } else {
            ops.push(CopyOp {
                src_pos: sp,
                dst_pos: dp,
                size: elem,
            });
        }
    }
}
