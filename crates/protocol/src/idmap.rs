//! IdMapping - rpc-id namespace allocation
//!
//! Independently-numbered sub-schemas share one flat rpc-id space. Each
//! package declares, through the well-known namespace schema among its
//! dependencies, a comma-separated list of integer ranges it owns
//! (`"100-149,300,400-449"`). An [`IdMapping`] parses that declaration and
//! maps a sub-schema's local message numbers into the global space without
//! collision.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

/// Name of the well-known namespace schema among a package's dependencies
pub const NAMESPACE_SCHEMA: &str = "namespace";

/// A declared namespace tree node
///
/// Namespaces nest by name; the leaf entry for a package carries its id-range
/// declaration. Trees are typically declared in the collector's TOML config,
/// hence the serde derives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace name, matched during path walks
    pub name: String,

    /// Nested sub-namespaces
    #[serde(default)]
    pub children: Vec<Namespace>,

    /// Id-range declaration for leaf entries, e.g. `"100-149,300"`
    #[serde(default)]
    pub id_ranges: Option<String>,
}

impl Namespace {
    /// Create a leaf namespace with an id-range declaration
    pub fn leaf(name: impl Into<String>, id_ranges: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            id_ranges: Some(id_ranges.into()),
        }
    }

    /// Create an inner namespace from its children
    pub fn group(name: impl Into<String>, children: Vec<Namespace>) -> Self {
        Self {
            name: name.into(),
            children,
            id_ranges: None,
        }
    }

    /// Look up a direct child by name
    pub fn child(&self, name: &str) -> Option<&Namespace> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Maps a sub-schema's local message numbers into the global rpc-id space
///
/// Built from ordered `(first, last)` inclusive intervals. Local id `n` lands
/// at the `n`-th slot counting across the intervals in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMapping {
    first: Vec<u32>,
    last: Vec<u32>,
}

impl IdMapping {
    /// Parse a range spec: comma-separated `a-b` intervals or single values
    ///
    /// # Errors
    ///
    /// `BadRangeSpec` on empty specs, unparseable integers, or inverted
    /// intervals (`first > last`).
    pub fn from_ranges(spec: &str) -> Result<Self> {
        let mut first = Vec::new();
        let mut last = Vec::new();

        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(ProtocolError::bad_ranges(format!(
                    "empty interval in {spec:?}"
                )));
            }
            let (a, b) = match part.split_once('-') {
                Some((a, b)) => (a.trim(), b.trim()),
                None => (part, part),
            };
            let a: u32 = a
                .parse()
                .map_err(|_| ProtocolError::bad_ranges(format!("bad integer {a:?} in {spec:?}")))?;
            let b: u32 = b
                .parse()
                .map_err(|_| ProtocolError::bad_ranges(format!("bad integer {b:?} in {spec:?}")))?;
            if a > b {
                return Err(ProtocolError::bad_ranges(format!(
                    "inverted interval {part:?} in {spec:?}"
                )));
            }
            first.push(a);
            last.push(b);
        }

        if first.is_empty() {
            return Err(ProtocolError::bad_ranges("empty range spec"));
        }

        Ok(Self { first, last })
    }

    /// Resolve a package's id mapping from its declared dependencies
    ///
    /// Locates the well-known [`NAMESPACE_SCHEMA`] root among `deps`, walks
    /// nested sub-namespaces along `path`, and parses the leaf's id-range
    /// declaration.
    pub fn resolve(deps: &[Namespace], path: &[&str]) -> Result<Self> {
        let mut node = deps
            .iter()
            .find(|n| n.name == NAMESPACE_SCHEMA)
            .ok_or_else(|| {
                ProtocolError::bad_path(format!("no {NAMESPACE_SCHEMA:?} schema among dependencies"))
            })?;

        for segment in path {
            node = node.child(segment).ok_or_else(|| {
                ProtocolError::bad_path(format!(
                    "namespace {:?} has no child {segment:?}",
                    node.name
                ))
            })?;
        }

        let spec = node.id_ranges.as_deref().ok_or_else(|| {
            ProtocolError::bad_path(format!("namespace {:?} declares no id ranges", node.name))
        })?;

        Self::from_ranges(spec)
    }

    /// Total number of ids the declared intervals can hold
    pub fn capacity(&self) -> u32 {
        self.first
            .iter()
            .zip(&self.last)
            .map(|(f, l)| l - f + 1)
            .sum()
    }

    /// Map a local message number to its global rpc-id
    ///
    /// Walks the intervals in order, accumulating consumed capacity, and
    /// returns the offset within the first interval that still has room.
    ///
    /// # Errors
    ///
    /// `IdSpaceExhausted` if `local_id` exceeds the total interval capacity.
    pub fn map(&self, local_id: u16) -> Result<u32> {
        let local = local_id as u32;
        let mut consumed: u32 = 0;

        for (&f, &l) in self.first.iter().zip(&self.last) {
            let cap = l - f + 1;
            if local < consumed + cap {
                return Ok(f + (local - consumed));
            }
            consumed += cap;
        }

        Err(ProtocolError::IdSpaceExhausted {
            local_id,
            capacity: consumed,
        })
    }
}
