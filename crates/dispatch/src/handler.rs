//! Handler - per-connection message dispatch
//!
//! A handler owns the dispatch table for one connection: rpc-id to
//! (transform, callback). The channel layer feeds it contiguous bytes via
//! [`Handler::handle`] / [`Handler::handle_multiple`] and re-presents any
//! unconsumed tail on the next call; the handler never blocks for more data,
//! it signals insufficiency through [`DispatchError::NeedMoreData`].

use std::collections::HashMap;

use tracing::{debug, warn};

use skew_protocol::wire::{read_u16, read_u64};
use skew_protocol::Descriptor;

use crate::builder::TransformBuilder;
use crate::engine::{BlobSpan, TransformRecord};
use crate::{DispatchError, Result, RPC_ID_LEN, TIMESTAMP_PREFIX_LEN};

/// Callback invoked synchronously inside `handle` for each message
pub type Callback = Box<dyn FnMut(&MessageView<'_>)>;

/// Per-message framing options
///
/// Mirrors the channel layer's wire flags: when `timestamp` is set, every
/// message carries an 8-byte timestamp prefix ahead of its rpc-id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchFlags {
    pub timestamp: bool,
}

impl DispatchFlags {
    /// Flags for a timestamp-prefixed stream
    pub const fn timestamped() -> Self {
        Self { timestamp: true }
    }
}

/// What to do with a steady-state rpc-id that has no registered entry
///
/// `Fail` treats it as a protocol fault. `Skip` supports forward/backward
/// wire compatibility: the unknown message's length is unknowable, so the
/// handler reports [`DispatchError::SkippedRpcId`] and the caller stops
/// parsing the current read without resetting the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownPolicy {
    #[default]
    Fail,
    Skip,
}

/// Declares the messages a service speaks
///
/// Used with [`Handler::add_identity`] when the sender is known to already
/// speak the compiled-in wire format.
pub trait WireService {
    /// Service name, for logs
    fn name(&self) -> &'static str;

    /// Descriptors of every message this service declares
    fn messages(&self) -> &[Descriptor];
}

/// A transformed message as seen by callbacks
///
/// `fixed` is the natively-laid-out struct buffer; blob accessors resolve
/// windows into the read buffer. Everything here borrows from the current
/// dispatch call and is valid only until the callback returns.
pub struct MessageView<'a> {
    rpc_id: u16,
    timestamp: Option<u64>,
    fixed: &'a [u8],
    src: &'a [u8],
    blobs: &'a [Option<BlobSpan>],
}

impl<'a> MessageView<'a> {
    /// Wire rpc-id of this message
    #[inline]
    pub fn rpc_id(&self) -> u16 {
        self.rpc_id
    }

    /// Timestamp prefix, when the stream carries one
    #[inline]
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// The natively-laid-out fixed part
    #[inline]
    pub fn fixed(&self) -> &'a [u8] {
        self.fixed
    }

    /// Number of blob slots the target layout declares
    #[inline]
    pub fn blob_slots(&self) -> usize {
        self.blobs.len()
    }

    /// Resolve a blob slot to its payload
    ///
    /// `None` when the slot index is out of range or the peer did not send
    /// the field. The slice borrows the read buffer; copy it out if it must
    /// outlive the callback.
    pub fn blob(&self, slot: usize) -> Option<&'a [u8]> {
        self.blobs.get(slot)?.as_ref()?.resolve(self.src)
    }

    /// Read a u16 field from the fixed part
    #[inline]
    pub fn u16_at(&self, pos: u16) -> skew_protocol::Result<u16> {
        read_u16(self.fixed, pos as usize)
    }

    /// Read a u32 field from the fixed part
    #[inline]
    pub fn u32_at(&self, pos: u16) -> skew_protocol::Result<u32> {
        skew_protocol::wire::read_u32(self.fixed, pos as usize)
    }

    /// Read a u64 field from the fixed part
    #[inline]
    pub fn u64_at(&self, pos: u16) -> skew_protocol::Result<u64> {
        read_u64(self.fixed, pos as usize)
    }
}

struct HandlerEntry {
    record: TransformRecord,
    /// Reused per call; unmatched target fields keep their zeroed default
    fixed_scratch: Vec<u8>,
    blob_scratch: Vec<Option<BlobSpan>>,
    callback: Callback,
}

/// Per-connection dispatch table
///
/// Owned by exactly one connection and driven from that connection's single
/// processing thread; no internal locking.
pub struct Handler {
    entries: HashMap<u16, HandlerEntry>,
    unknown_policy: UnknownPolicy,
    last_timestamp: Option<u64>,
}

impl Handler {
    /// Create a handler that fails on unknown rpc-ids
    pub fn new() -> Self {
        Self::with_unknown_policy(UnknownPolicy::Fail)
    }

    /// Create a handler with an explicit unknown-rpc-id policy
    pub fn with_unknown_policy(unknown_policy: UnknownPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            unknown_policy,
            last_timestamp: None,
        }
    }

    /// Register a transform and callback for its rpc-id
    ///
    /// # Errors
    ///
    /// `DuplicateRpcId` if an entry already exists for this rpc-id.
    pub fn add<F>(&mut self, record: TransformRecord, callback: F) -> Result<()>
    where
        F: FnMut(&MessageView<'_>) + 'static,
    {
        let rpc_id = record.target_rpc_id() as u16;
        if self.entries.contains_key(&rpc_id) {
            return Err(DispatchError::DuplicateRpcId(record.target_rpc_id()));
        }

        let transform = record.transform();
        let entry = HandlerEntry {
            fixed_scratch: vec![0; transform.output_size() as usize],
            blob_scratch: vec![None; transform.blob_slots()],
            record,
            callback: Box::new(callback),
        };
        self.entries.insert(rpc_id, entry);
        Ok(())
    }

    /// Register identity transforms for every message a service declares
    ///
    /// Used when the sender is known to already speak the compiled-in wire
    /// format: the peer schema is the re-encoded target schema, so no
    /// negotiation is needed. Descriptors the builder does not yet know are
    /// registered on the way.
    pub fn add_identity<S, F>(
        &mut self,
        builder: &mut TransformBuilder,
        service: &S,
        callback: F,
    ) -> Result<()>
    where
        S: WireService,
        F: FnMut(&MessageView<'_>) + Clone + 'static,
    {
        for descriptor in service.messages() {
            if !builder.has_descriptor(descriptor.rpc_id()) {
                builder.add_descriptor(descriptor.clone())?;
            }
            let record = builder.get_xform(&descriptor.to_wire())?;
            self.add(record, callback.clone())?;
        }
        debug!(
            service = service.name(),
            n_messages = service.messages().len(),
            "registered identity transforms"
        );
        Ok(())
    }

    /// Dispatch one message from the front of `msg`
    ///
    /// Returns the number of bytes consumed, including any timestamp prefix.
    ///
    /// # Errors
    ///
    /// - `NeedMoreData` when the buffer is shorter than the prefix, the
    ///   rpc-id, or the known message's declared size - soft, retry once
    ///   more bytes arrive, nothing consumed
    /// - `UnknownRpcId` / `SkippedRpcId` per the configured policy
    /// - `MalformedMessage` when the message violates its own layout
    pub fn handle(&mut self, msg: &[u8], flags: DispatchFlags) -> Result<usize> {
        let mut offset = 0;
        let mut timestamp = None;

        if flags.timestamp {
            if msg.len() < TIMESTAMP_PREFIX_LEN {
                return Err(DispatchError::need_more(TIMESTAMP_PREFIX_LEN, msg.len()));
            }
            let ts = read_u64(msg, 0)?;
            timestamp = Some(ts);
            self.last_timestamp = Some(ts);
            offset = TIMESTAMP_PREFIX_LEN;
        }

        if msg.len() < offset + RPC_ID_LEN {
            return Err(DispatchError::need_more(offset + RPC_ID_LEN, msg.len()));
        }
        let rpc_id = read_u16(msg, offset)?;

        let Some(entry) = self.entries.get_mut(&rpc_id) else {
            return match self.unknown_policy {
                UnknownPolicy::Fail => {
                    warn!(rpc_id, "unknown rpc-id in message stream");
                    Err(DispatchError::UnknownRpcId(rpc_id))
                }
                UnknownPolicy::Skip => {
                    debug!(rpc_id, "skipping unregistered rpc-id");
                    Err(DispatchError::SkippedRpcId(rpc_id))
                }
            };
        };

        // The transform source starts at the rpc-id; field positions
        // account for that prelude
        let src = &msg[offset..];
        let min = entry.record.min_buffer_size() as usize;
        if src.len() < min {
            return Err(DispatchError::need_more(offset + min, msg.len()));
        }

        let HandlerEntry {
            record,
            fixed_scratch,
            blob_scratch,
            callback,
        } = entry;
        fixed_scratch.fill(0);
        blob_scratch.fill(None);

        let consumed = record.transform().apply(src, fixed_scratch, blob_scratch)?;
        if consumed as usize > src.len() {
            return Err(DispatchError::malformed(format!(
                "transform consumed {consumed} of {} available bytes",
                src.len()
            )));
        }

        let view = MessageView {
            rpc_id,
            timestamp,
            fixed: fixed_scratch,
            src,
            blobs: blob_scratch,
        };
        (callback)(&view);

        Ok(offset + consumed as usize)
    }

    /// Dispatch as many complete messages as `msg` holds
    ///
    /// Returns the total bytes consumed if at least one message succeeded;
    /// otherwise propagates the first failure. Supports many small messages
    /// packed into one read.
    pub fn handle_multiple(&mut self, msg: &[u8], flags: DispatchFlags) -> Result<usize> {
        let mut offset = 0;

        while offset < msg.len() {
            match self.handle(&msg[offset..], flags) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(e) if offset == 0 => return Err(e),
                Err(e) => {
                    debug!(error = %e, consumed = offset, "stopping multi-message parse");
                    break;
                }
            }
        }

        Ok(offset)
    }

    /// Timestamp of the most recent prefixed message
    #[inline]
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Number of registered rpc-ids
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any rpc-id is registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured unknown-rpc-id policy
    #[inline]
    pub fn unknown_policy(&self) -> UnknownPolicy {
        self.unknown_policy
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}
