//! # Length-Index Mapping
//!
//! Converts a variant-level selection into an element-level view of a
//! variable-length attribute's flat data array. A length-index node stores
//! one element count per variant; the flat array concatenates every
//! variant's elements in variant order, so a variant selection maps to a
//! contiguous spanned range plus a per-element keep/skip mask inside it.
//!
//! The scan streams the length index in bounded chunks so the peak working
//! memory stays fixed no matter how many variants the store holds.

use bitvec::prelude::*;

use crate::error::{Result, VarwalkError};
use crate::select::Selection;
use crate::store::{ArrayStore, NodeId};

/// Chunk cap for streaming length-index scans
pub const INDEX_CHUNK: usize = 16384;

/// Element-level view of one variable-length attribute under a variant
/// selection
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexMap {
    /// First flat-array element any selected variant touches
    pub flat_start: u64,
    /// Elements spanned from `flat_start` through the last selected
    /// variant's last element
    pub flat_count: u64,
    /// Keep/skip flag per spanned element; skipped variants inside the span
    /// contribute `false` runs
    pub flat_selection: BitVec<u64, Lsb0>,
    /// Element count per selected variant, in variant order (negative raw
    /// entries normalized to 0)
    pub lengths: Vec<i32>,
}

/// Map a variant selection onto a length-index node.
///
/// `selection == None` selects every variant: the whole index is read once
/// and the full flat range is marked kept. Otherwise the index is streamed
/// in [`INDEX_CHUNK`]-sized pieces: entries before the first selected
/// variant only accumulate `flat_start`, entries in the spanned range emit
/// lengths and per-element flags, and entries after the last selected
/// variant are never read.
pub fn map_index(
    store: &dyn ArrayStore,
    index_node: NodeId,
    selection: Option<&Selection>,
) -> Result<IndexMap> {
    if store.rank(index_node) != 1 {
        return Err(VarwalkError::invalid_dimension(store.path(index_node)));
    }
    let total = store.total_count(index_node);

    let mut out = IndexMap::default();

    let selection = match selection {
        None => {
            // No selection: one pass over the whole index, everything kept.
            out.lengths = vec![0i32; total as usize];
            store.read_ints(index_node, 0, total as usize, &mut out.lengths)?;
            for len in &mut out.lengths {
                if *len < 0 {
                    *len = 0;
                }
                out.flat_count += *len as u64;
            }
            out.flat_selection = BitVec::repeat(true, out.flat_count as usize);
            return Ok(out);
        }
        Some(sel) => sel,
    };

    if selection.len() as u64 != total {
        return Err(VarwalkError::SelectionSizeMismatch {
            axis: "variant",
            expected: total,
            actual: selection.len(),
        });
    }

    let (first, last) = match (selection.first_selected(), selection.last_selected()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(out), // nothing selected: all outputs empty
    };
    let mut buffer = vec![0i32; INDEX_CHUNK.min(total as usize).max(1)];

    // Lengths strictly before the first selected variant only shift the
    // flat-array start.
    let mut pos = 0usize;
    while pos < first {
        let chunk = (first - pos).min(INDEX_CHUNK);
        store.read_ints(index_node, pos as u64, chunk, &mut buffer[..chunk])?;
        for &len in &buffer[..chunk] {
            if len > 0 {
                out.flat_start += len as u64;
            }
        }
        pos += chunk;
    }

    // Spanned range: first selected through last selected, inclusive.
    out.lengths.reserve(selection.count_selected());
    while pos <= last {
        let chunk = (last - pos + 1).min(INDEX_CHUNK);
        store.read_ints(index_node, pos as u64, chunk, &mut buffer[..chunk])?;
        for (i, &raw) in buffer[..chunk].iter().enumerate() {
            let len = raw.max(0);
            let keep = selection.get(pos + i);
            if keep {
                out.lengths.push(len);
            }
            for _ in 0..len {
                out.flat_selection.push(keep);
            }
        }
        pos += chunk;
    }
    out.flat_count = out.flat_selection.len() as u64;

    Ok(out)
}
