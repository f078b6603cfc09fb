//! # Array Store Interface
//!
//! ## Role
//! The boundary to the backing columnar array storage. The traversal engine
//! never touches bytes on disk itself; it issues node lookups and range reads
//! through the [`ArrayStore`] trait and leaves layout, compression, and file
//! lifecycle to the implementation.
//!
//! ## Design
//! - Nodes are addressed by hierarchical slash-separated paths
//!   (`genotype/data`, `annotation/info/DP`).
//! - A variable-length attribute stores its per-variant element counts in a
//!   companion node whose final path segment carries an `@` prefix
//!   (`genotype/@data`). Companion nodes are not directly addressable by
//!   callers; [`check_path`] rejects paths containing `@`.
//! - Range reads accept an optional boolean mask per axis, letting the engine
//!   push sample and flat-array selections down into the copy loop instead of
//!   filtering afterwards.
//! - All reads are blocking and issued one at a time from a single traversal;
//!   implementations only need to support repeated sequential calls.

pub mod memory;

use bitvec::prelude::*;

use crate::error::{Result, VarwalkError};

pub use memory::{MemStore, MemStoreBuilder};

/// Well-known node holding one identifier per variant; its length defines the
/// store's total variant count.
pub const VARIANT_ID: &str = "variant.id";

/// Well-known node holding one identifier per sample; its length defines the
/// store's total sample count.
pub const SAMPLE_ID: &str = "sample.id";

/// Opaque handle to a storage node, valid for the lifetime of the store
pub type NodeId = usize;

/// Physical value kind of a storage node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// Unsigned byte cells (genotype call passes)
    UInt8,
    /// 32-bit integer cells
    Int32,
    /// 64-bit float cells
    Float64,
    /// UTF-8 string cells
    Utf8,
    /// Single-bit boolean cells
    Bit1,
}

/// Typed buffer exchanged between the store and the engine.
///
/// One buffer kind per logical value family; the store converts its physical
/// representation into the requested buffer during the copy (bytes widen to
/// integers, bit cells become booleans, factor codes stay integer).
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Int(Vec<i32>),
    Float(Vec<f64>),
    Str(Vec<String>),
    Bool(Vec<bool>),
}

impl ArrayData {
    /// Number of cells currently held
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Int(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Str(v) => v.len(),
            ArrayData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cells, keeping the buffer's kind and capacity
    pub fn clear(&mut self) {
        match self {
            ArrayData::Int(v) => v.clear(),
            ArrayData::Float(v) => v.clear(),
            ArrayData::Str(v) => v.clear(),
            ArrayData::Bool(v) => v.clear(),
        }
    }

    /// Integer cells, if this is an integer buffer
    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            ArrayData::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Float cells, if this is a float buffer
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            ArrayData::Float(v) => Some(v),
            _ => None,
        }
    }

    /// String cells, if this is a string buffer
    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            ArrayData::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean cells, if this is a boolean buffer
    pub fn as_bools(&self) -> Option<&[bool]> {
        match self {
            ArrayData::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// Per-axis boolean masks for a region read. `None` selects the whole axis.
pub type AxisMasks<'a> = [Option<&'a BitSlice<u64, Lsb0>>];

/// Backing array storage consumed by the traversal engine.
///
/// Implementations must support repeated sequential reads from one traversal;
/// the engine never calls them concurrently.
pub trait ArrayStore {
    /// Look up a node by path, if it exists
    fn find_node(&self, path: &str) -> Option<NodeId>;

    /// Path this node was registered under
    fn path(&self, node: NodeId) -> &str;

    /// Number of axes
    fn rank(&self, node: NodeId) -> usize;

    /// Per-axis extents, one entry per axis
    fn extents(&self, node: NodeId) -> &[usize];

    /// Total cell count across all axes
    fn total_count(&self, node: NodeId) -> u64;

    /// Physical value kind of the node's cells
    fn value_kind(&self, node: NodeId) -> ValueKind;

    /// Level table for categorical integer nodes, if any
    fn factor_levels(&self, node: NodeId) -> Option<&[String]>;

    /// Read `count` consecutive integer cells from a rank-1 node starting at
    /// `start`. Used for length-index scans, where the node is always a flat
    /// integer vector.
    fn read_ints(&self, node: NodeId, start: u64, count: usize, out: &mut [i32]) -> Result<()>;

    /// Read a rectangular region, applying per-axis masks during the copy.
    ///
    /// `start` and `count` must both have `rank` entries; `masks` holds at
    /// most `rank` entries and each present mask must have length equal to
    /// the corresponding `count`. Cells are appended to `out` in row-major
    /// order (last axis fastest); `out` is cleared first and also selects
    /// the conversion target.
    fn read_region(
        &self,
        node: NodeId,
        start: &[u64],
        count: &[usize],
        masks: &AxisMasks<'_>,
        out: &mut ArrayData,
    ) -> Result<()>;

    /// Read `count` raw bytes starting at flat cell offset `offset`,
    /// ignoring the node's axis structure. Streaming read used for
    /// genotype call-pass decoding.
    fn read_bytes_at(&self, node: NodeId, offset: u64, count: usize, out: &mut [u8]) -> Result<()>;

    /// Look up a node by path, failing with a descriptive error if absent
    fn require_node(&self, path: &str) -> Result<NodeId> {
        self.find_node(path).ok_or_else(|| VarwalkError::UnknownAttribute {
            name: path.to_string(),
        })
    }
}

/// Companion length-index path: `@` prefixed onto the final path segment.
///
/// `genotype/data` maps to `genotype/@data`; a bare name `DP` maps to `@DP`.
pub fn companion_path(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => format!("{}/@{}", &path[..pos], &path[pos + 1..]),
        None => format!("@{}", path),
    }
}

/// Reject attribute paths that try to address hidden companion nodes
pub fn check_path(path: &str) -> Result<()> {
    if path.contains('@') {
        return Err(VarwalkError::UnknownAttribute {
            name: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_path() {
        assert_eq!(companion_path("genotype/data"), "genotype/@data");
        assert_eq!(companion_path("annotation/info/DP"), "annotation/info/@DP");
        assert_eq!(companion_path("DP"), "@DP");
    }

    #[test]
    fn test_check_path_rejects_hidden_nodes() {
        assert!(check_path("genotype/data").is_ok());
        assert!(check_path("genotype/@data").is_err());
    }

    #[test]
    fn test_array_data_accessors() {
        let data = ArrayData::Int(vec![1, 2, 3]);
        assert_eq!(data.len(), 3);
        assert_eq!(data.as_ints(), Some(&[1, 2, 3][..]));
        assert!(data.as_floats().is_none());

        let mut data = ArrayData::Str(vec!["a".to_string()]);
        data.clear();
        assert!(data.is_empty());
        assert!(matches!(data, ArrayData::Str(_)));
    }
}
