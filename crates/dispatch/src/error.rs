//! Dispatch error types
//!
//! Two families share this enum. Handshake-time failures (duplicate or
//! unknown target rpc-ids, malformed peer descriptors, incompatible sizes)
//! are fatal: the connection layer should drop or reset the connection.
//! Steady-state conditions (`NeedMoreData`, `SkippedRpcId`) are soft signals
//! the channel layer acts on without treating them as protocol faults.

use skew_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while building transforms or dispatching messages
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Steady-state message carries an rpc-id with no registered entry and
    /// the handler is configured to fail on unknown ids
    #[error("unknown rpc-id {0} in message stream")]
    UnknownRpcId(u16),

    /// Steady-state message carries an unregistered rpc-id under the skip
    /// policy. Its length is unknowable, so the caller should stop parsing
    /// the current read; this is not a protocol fault.
    #[error("skipped unregistered rpc-id {0}")]
    SkippedRpcId(u16),

    /// A schema or handler entry was registered twice for one rpc-id
    #[error("duplicate rpc-id {0}")]
    DuplicateRpcId(u32),

    /// Peer sent a schema for a message the receiver was not compiled with
    #[error("peer schema references unknown rpc-id {0}")]
    UnknownTargetRpcId(u32),

    /// Not enough buffered bytes for a known message; retry once more bytes
    /// arrive
    #[error("need more data: expected {expected} bytes, have {actual}")]
    NeedMoreData { expected: usize, actual: usize },

    /// Matched fields extend past the peer's declared fixed size
    #[error("peer fixed size {declared} too small for matched fields ({needed} bytes)")]
    PeerTooSmall { needed: u32, declared: u16 },

    /// Message violates its own declared layout
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Peer descriptor failed to parse
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl DispatchError {
    /// Create a need-more-data error
    #[inline]
    pub fn need_more(expected: usize, actual: usize) -> Self {
        Self::NeedMoreData { expected, actual }
    }

    /// Create a malformed message error
    #[inline]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    /// Whether this is the soft "retry once more bytes arrive" condition
    #[inline]
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, Self::NeedMoreData { .. })
    }

    /// Whether this condition is fatal to the connection
    ///
    /// Fatal errors surface during the handshake or indicate the peer speaks
    /// a schema the receiver cannot reconcile; the connection layer should
    /// reset. Soft conditions (`NeedMoreData`, `SkippedRpcId`,
    /// `MalformedMessage`) propagate as return codes and are handled by the
    /// channel layer's own policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownRpcId(_)
                | Self::DuplicateRpcId(_)
                | Self::UnknownTargetRpcId(_)
                | Self::PeerTooSmall { .. }
                | Self::Protocol(_)
        )
    }
}
