//! # In-Memory Array Store
//!
//! ## Role
//! Reference [`ArrayStore`] backend holding every node as a flat row-major
//! buffer. Serves as the test fixture backend and as the storage adapter for
//! data that is already resident in memory.
//!
//! ## Design
//! Nodes are registered through [`MemStoreBuilder`], which validates that the
//! supplied buffer length matches the product of the declared extents. Masked
//! region reads walk the region with one nested loop per rank (rank is at
//! most 3 for every shape class the engine traverses).

use std::collections::HashMap;

use bitvec::prelude::*;

use crate::error::{Result, VarwalkError};
use crate::store::{ArrayData, ArrayStore, AxisMasks, NodeId, ValueKind};

/// Physical cell storage for one node
#[derive(Clone, Debug)]
enum NodeData {
    U8(Vec<u8>),
    I32(Vec<i32>),
    F64(Vec<f64>),
    Str(Vec<String>),
    Bits(BitVec<u64, Lsb0>),
}

impl NodeData {
    fn len(&self) -> usize {
        match self {
            NodeData::U8(v) => v.len(),
            NodeData::I32(v) => v.len(),
            NodeData::F64(v) => v.len(),
            NodeData::Str(v) => v.len(),
            NodeData::Bits(v) => v.len(),
        }
    }

    fn kind(&self) -> ValueKind {
        match self {
            NodeData::U8(_) => ValueKind::UInt8,
            NodeData::I32(_) => ValueKind::Int32,
            NodeData::F64(_) => ValueKind::Float64,
            NodeData::Str(_) => ValueKind::Utf8,
            NodeData::Bits(_) => ValueKind::Bit1,
        }
    }
}

/// One registered node
#[derive(Clone, Debug)]
struct MemNode {
    path: String,
    extents: Vec<usize>,
    levels: Option<Vec<String>>,
    data: NodeData,
}

/// In-memory columnar store
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    nodes: Vec<MemNode>,
    by_path: HashMap<String, NodeId>,
}

impl MemStore {
    /// Start building a store
    pub fn builder() -> MemStoreBuilder {
        MemStoreBuilder::default()
    }

    fn node(&self, id: NodeId) -> &MemNode {
        &self.nodes[id]
    }

    /// Append one cell at flat position `flat` to `out`, converting to the
    /// buffer's kind
    fn push_cell(&self, node: &MemNode, flat: usize, out: &mut ArrayData) -> Result<()> {
        match (&node.data, out) {
            (NodeData::U8(v), ArrayData::Int(o)) => o.push(v[flat] as i32),
            (NodeData::I32(v), ArrayData::Int(o)) => o.push(v[flat]),
            (NodeData::I32(v), ArrayData::Bool(o)) => o.push(v[flat] != 0),
            (NodeData::F64(v), ArrayData::Float(o)) => o.push(v[flat]),
            (NodeData::Str(v), ArrayData::Str(o)) => o.push(v[flat].clone()),
            (NodeData::Bits(v), ArrayData::Bool(o)) => o.push(v[flat]),
            (data, out) => {
                return Err(VarwalkError::store(format!(
                    "cannot read {:?} cells of '{}' into a {} buffer",
                    data.kind(),
                    node.path,
                    match out {
                        ArrayData::Int(_) => "integer",
                        ArrayData::Float(_) => "float",
                        ArrayData::Str(_) => "string",
                        ArrayData::Bool(_) => "boolean",
                    }
                )))
            }
        }
        Ok(())
    }
}

impl ArrayStore for MemStore {
    fn find_node(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    fn path(&self, node: NodeId) -> &str {
        &self.node(node).path
    }

    fn rank(&self, node: NodeId) -> usize {
        self.node(node).extents.len()
    }

    fn extents(&self, node: NodeId) -> &[usize] {
        &self.node(node).extents
    }

    fn total_count(&self, node: NodeId) -> u64 {
        self.node(node).data.len() as u64
    }

    fn value_kind(&self, node: NodeId) -> ValueKind {
        self.node(node).data.kind()
    }

    fn factor_levels(&self, node: NodeId) -> Option<&[String]> {
        self.node(node).levels.as_deref()
    }

    fn read_ints(&self, node: NodeId, start: u64, count: usize, out: &mut [i32]) -> Result<()> {
        let n = self.node(node);
        let start = start as usize;
        let end = start
            .checked_add(count)
            .filter(|&e| e <= n.data.len())
            .ok_or_else(|| {
                VarwalkError::store(format!(
                    "read of [{}, {}) past the end of '{}' ({} cells)",
                    start,
                    start + count,
                    n.path,
                    n.data.len()
                ))
            })?;
        match &n.data {
            NodeData::I32(v) => out[..count].copy_from_slice(&v[start..end]),
            _ => {
                return Err(VarwalkError::store(format!(
                    "'{}' is not an integer node",
                    n.path
                )))
            }
        }
        Ok(())
    }

    fn read_region(
        &self,
        node: NodeId,
        start: &[u64],
        count: &[usize],
        masks: &AxisMasks<'_>,
        out: &mut ArrayData,
    ) -> Result<()> {
        let n = self.node(node);
        let rank = n.extents.len();
        if start.len() != rank || count.len() != rank {
            return Err(VarwalkError::store(format!(
                "region rank {} does not match rank {} of '{}'",
                start.len(),
                rank,
                n.path
            )));
        }
        for axis in 0..rank {
            if start[axis] as usize + count[axis] > n.extents[axis] {
                return Err(VarwalkError::store(format!(
                    "axis {} region [{}, {}) exceeds extent {} of '{}'",
                    axis,
                    start[axis],
                    start[axis] as usize + count[axis],
                    n.extents[axis],
                    n.path
                )));
            }
        }

        out.clear();
        let mask = |axis: usize, i: usize| -> bool {
            match masks.get(axis).copied().flatten() {
                Some(m) => m[i],
                None => true,
            }
        };

        // Row-major walk, last axis fastest.
        match rank {
            1 => {
                for i in 0..count[0] {
                    if mask(0, i) {
                        self.push_cell(n, start[0] as usize + i, out)?;
                    }
                }
            }
            2 => {
                for i in 0..count[0] {
                    if !mask(0, i) {
                        continue;
                    }
                    let row = (start[0] as usize + i) * n.extents[1];
                    for j in 0..count[1] {
                        if mask(1, j) {
                            self.push_cell(n, row + start[1] as usize + j, out)?;
                        }
                    }
                }
            }
            3 => {
                for i in 0..count[0] {
                    if !mask(0, i) {
                        continue;
                    }
                    let plane = (start[0] as usize + i) * n.extents[1];
                    for j in 0..count[1] {
                        if !mask(1, j) {
                            continue;
                        }
                        let row = (plane + start[1] as usize + j) * n.extents[2];
                        for k in 0..count[2] {
                            if mask(2, k) {
                                self.push_cell(n, row + start[2] as usize + k, out)?;
                            }
                        }
                    }
                }
            }
            _ => {
                return Err(VarwalkError::store(format!(
                    "unsupported rank {} for '{}'",
                    rank, n.path
                )))
            }
        }
        Ok(())
    }

    fn read_bytes_at(&self, node: NodeId, offset: u64, count: usize, out: &mut [u8]) -> Result<()> {
        let n = self.node(node);
        let start = offset as usize;
        match &n.data {
            NodeData::U8(v) => {
                if start + count > v.len() {
                    return Err(VarwalkError::store(format!(
                        "byte read of [{}, {}) past the end of '{}' ({} cells)",
                        start,
                        start + count,
                        n.path,
                        v.len()
                    )));
                }
                out[..count].copy_from_slice(&v[start..start + count]);
                Ok(())
            }
            _ => Err(VarwalkError::store(format!(
                "'{}' does not hold byte cells",
                n.path
            ))),
        }
    }
}

/// Builder registering nodes into a [`MemStore`]
#[derive(Debug, Default)]
pub struct MemStoreBuilder {
    store: MemStore,
}

impl MemStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, path: &str, extents: Vec<usize>, levels: Option<Vec<String>>, data: NodeData) -> Self {
        let expected: usize = extents.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "node '{}': {} cells supplied for extents {:?}",
            path,
            data.len(),
            extents
        );
        let id = self.store.nodes.len();
        self.store.by_path.insert(path.to_string(), id);
        self.store.nodes.push(MemNode {
            path: path.to_string(),
            extents,
            levels,
            data,
        });
        self
    }

    /// Register a 32-bit integer node
    pub fn ints(self, path: &str, extents: impl Into<Vec<usize>>, data: Vec<i32>) -> Self {
        self.add(path, extents.into(), None, NodeData::I32(data))
    }

    /// Register an unsigned-byte node (genotype call passes)
    pub fn bytes(self, path: &str, extents: impl Into<Vec<usize>>, data: Vec<u8>) -> Self {
        self.add(path, extents.into(), None, NodeData::U8(data))
    }

    /// Register a 64-bit float node
    pub fn floats(self, path: &str, extents: impl Into<Vec<usize>>, data: Vec<f64>) -> Self {
        self.add(path, extents.into(), None, NodeData::F64(data))
    }

    /// Register a UTF-8 string node
    pub fn strings(self, path: &str, extents: impl Into<Vec<usize>>, data: Vec<String>) -> Self {
        self.add(path, extents.into(), None, NodeData::Str(data))
    }

    /// Register a single-bit boolean node
    pub fn bools(self, path: &str, extents: impl Into<Vec<usize>>, data: Vec<bool>) -> Self {
        let bits: BitVec<u64, Lsb0> = data.iter().copied().collect();
        self.add(path, extents.into(), None, NodeData::Bits(bits))
    }

    /// Register a categorical integer node with its level table
    pub fn factor(
        self,
        path: &str,
        extents: impl Into<Vec<usize>>,
        codes: Vec<i32>,
        levels: Vec<String>,
    ) -> Self {
        self.add(path, extents.into(), Some(levels), NodeData::I32(codes))
    }

    pub fn build(self) -> MemStore {
        self.store
    }
}
