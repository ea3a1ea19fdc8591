//! Skew Dispatch - schema negotiation and per-connection message dispatch
//!
//! The receiving side of the skew wire protocol. A connection starts with a
//! schema exchange: for every message type the peer intends to send, its wire
//! descriptor is fed to the [`TransformBuilder`], which reconciles it against
//! the locally compiled schema for the same rpc-id and produces a
//! [`TransformRecord`] - a copy plan that moves each wire field into the
//! receiver's native struct layout. Steady-state bytes then flow through a
//! [`Handler`], which extracts rpc-ids, runs the cached transform, and
//! invokes the registered callback.
//!
//! ```text
//! bytes → Handler → rpc-id lookup → Transform → native struct → callback
//!                        ↑
//!          TransformBuilder (once, at schema-exchange time)
//! ```
//!
//! # Design Principles
//!
//! - **Layout only**: transforms copy bytes between layouts; message
//!   semantics belong to the callbacks.
//! - **Single-threaded**: a Handler/TransformBuilder pair is owned by one
//!   connection and runs on that connection's processing thread. No internal
//!   locking; sharing across threads needs external synchronization.
//! - **Non-blocking**: insufficient buffered bytes is a soft
//!   [`DispatchError::NeedMoreData`], never a wait. The channel layer
//!   re-presents unconsumed tails on the next call.
//! - **Opaque transforms**: the [`Transform`] trait exposes only the
//!   `(src, dst) -> length` contract, so the interpreted copy-list executor
//!   shipped here and a generated one are interchangeable.

mod builder;
mod engine;
mod error;
mod handler;
mod plan;

pub use builder::{TransformBuilder, DEFAULT_XFORM_CACHE_CAPACITY};
pub use engine::{BlobSpan, CopyListTransform, Transform, TransformRecord};
pub use error::DispatchError;
pub use handler::{
    Callback, DispatchFlags, Handler, MessageView, UnknownPolicy, WireService,
};
pub use plan::{BlobDetails, CopyOp};

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Byte length of the per-message timestamp prefix
pub const TIMESTAMP_PREFIX_LEN: usize = 8;

/// Byte length of the rpc-id that leads every steady-state message
pub const RPC_ID_LEN: usize = 2;

#[cfg(test)]
mod engine_test;
