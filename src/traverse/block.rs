//! # Block Materialization
//!
//! ## Role
//! Allocates the correctly shaped output block for one traversal step and
//! caches shape metadata by run length: consecutive variants with equal run
//! lengths reuse the same dimensions and buffer, with the contents
//! overwritten on every read.
//!
//! Run-length cardinality is bounded by the attribute's shape (a handful of
//! distinct ploidies or field lengths in practice), so the cache never needs
//! eviction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::ArrayData;
use crate::traverse::descriptor::{AttributeDescriptor, Dim, LogicalKind};

/// One materialized traversal step: dims plus a typed cell buffer.
///
/// Shape metadata is stable per run length; `data` holds the most recent
/// read only and is never carried across steps.
#[derive(Clone, Debug)]
pub struct MaterializedBlock {
    /// Run length this block was shaped for
    pub run_length: usize,
    /// Block dimensions; empty for vector-shaped blocks
    pub dims: Vec<Dim>,
    /// Cells one read fills
    pub cells: usize,
    /// Logical cell type
    pub logical: LogicalKind,
    /// Level table for factor blocks
    pub levels: Option<Arc<[String]>>,
    /// Cell buffer for the current step
    pub data: ArrayData,
}

impl MaterializedBlock {
    /// Allocate an empty block shaped for `run_length`.
    ///
    /// A run length of 0 (a variant owing no elements) produces a block
    /// with no dims and no cells.
    pub fn alloc(desc: &AttributeDescriptor, run_length: usize) -> Self {
        let (dims, cells) = if run_length == 0 && desc.index_node().is_some() {
            (Vec::new(), 0)
        } else {
            (desc.dims(run_length), desc.cell_count(run_length))
        };
        Self {
            run_length,
            dims,
            cells,
            logical: desc.logical(),
            levels: desc.levels().cloned(),
            data: desc.logical().empty_buffer(cells),
        }
    }

    /// Whether this step carries no cells
    pub fn is_empty(&self) -> bool {
        self.cells == 0
    }
}

/// Shape cache keyed by run length
#[derive(Debug, Default)]
pub struct BlockCache {
    blocks: HashMap<usize, MaterializedBlock>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached block for `run_length`, allocating on first sight
    pub fn block_for(
        &mut self,
        desc: &AttributeDescriptor,
        run_length: usize,
    ) -> &mut MaterializedBlock {
        self.blocks
            .entry(run_length)
            .or_insert_with(|| MaterializedBlock::alloc(desc, run_length))
    }

    /// Cached block for `run_length`, if one was already materialized
    pub fn get(&self, run_length: usize) -> Option<&MaterializedBlock> {
        self.blocks.get(&run_length)
    }

    /// Number of distinct run lengths seen
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::Selection;
    use crate::store::MemStore;
    use crate::traverse::descriptor::ShapeClass;

    fn format_descriptor() -> (MemStore, AttributeDescriptor) {
        let store = MemStore::builder()
            .ints("variant.id", [3], vec![1, 2, 3])
            .strings("sample.id", [2], vec!["S1".into(), "S2".into()])
            .ints("annotation/format/AD/data", [6, 2], vec![0; 12])
            .ints("annotation/format/AD/@data", [3], vec![2, 2, 2])
            .build();
        let desc = AttributeDescriptor::new(
            &store,
            ShapeClass::FormatVariable,
            "annotation/format/AD/data",
            3,
            2,
            std::sync::Arc::new(Selection::all(2)),
        )
        .unwrap();
        (store, desc)
    }

    #[test]
    fn test_alloc_shapes_by_run_length() {
        let (_store, desc) = format_descriptor();
        let block = MaterializedBlock::alloc(&desc, 2);
        assert_eq!(block.cells, 4);
        assert_eq!(block.dims.len(), 2);
        assert_eq!(block.dims[1].len, 2);
        assert!(matches!(block.data, ArrayData::Int(_)));
    }

    #[test]
    fn test_zero_run_length_is_empty() {
        let (_store, desc) = format_descriptor();
        let block = MaterializedBlock::alloc(&desc, 0);
        assert!(block.is_empty());
        assert!(block.dims.is_empty());
    }

    #[test]
    fn test_cache_reuses_shapes() {
        let (_store, desc) = format_descriptor();
        let mut cache = BlockCache::new();

        cache.block_for(&desc, 2).data = ArrayData::Int(vec![7; 4]);
        cache.block_for(&desc, 3);
        assert_eq!(cache.len(), 2);

        // Same run length returns the same cached entry, contents intact
        // until the next read overwrites them.
        let again = cache.block_for(&desc, 2);
        assert_eq!(again.data.as_ints().unwrap(), &[7; 4]);
    }
}
