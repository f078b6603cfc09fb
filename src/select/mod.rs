//! # Selections
//!
//! ## Role
//! Boolean selections over the variant and sample axes, shared read-only by
//! every attribute descriptor and cursor in a traversal.
//!
//! ## Design
//! A [`Selection`] is a fixed-length bit vector; its length must equal the
//! store's declared axis count, which is validated once when the selection is
//! resolved against the store. Cursors and descriptors hold `Arc<Selection>`
//! so a multi-attribute traversal shares one buffer without copying.

pub mod index_map;

use std::sync::Arc;

use bitvec::prelude::*;

use crate::error::{Result, VarwalkError};
use crate::store::{ArrayStore, SAMPLE_ID, VARIANT_ID};

pub use index_map::{map_index, IndexMap, INDEX_CHUNK};

/// Fixed-length boolean selection over one axis
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    bits: BitVec<u64, Lsb0>,
}

impl Selection {
    /// Selection including every position
    pub fn all(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(true, len),
        }
    }

    /// Selection excluding every position
    pub fn none(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
        }
    }

    /// Build from explicit flags
    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            bits: flags.iter().copied().collect(),
        }
    }

    /// Build by predicate over positions `0..len`
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        Self {
            bits: (0..len).map(|i| f(i)).collect(),
        }
    }

    /// Axis length (total positions, selected or not)
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Whether position `i` is selected
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.bits[i]
    }

    /// Number of selected positions
    pub fn count_selected(&self) -> usize {
        self.bits.count_ones()
    }

    /// First selected position, if any
    pub fn first_selected(&self) -> Option<usize> {
        self.bits.first_one()
    }

    /// Last selected position, if any
    pub fn last_selected(&self) -> Option<usize> {
        self.bits.last_one()
    }

    /// Borrow as a bit slice (for masked store reads)
    pub fn as_bits(&self) -> &BitSlice<u64, Lsb0> {
        self.bits.as_bitslice()
    }

    /// Positions of all selected entries, in order
    pub fn iter_selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }
}

impl FromIterator<bool> for Selection {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

/// Variant- and sample-axis selections for one traversal.
///
/// `None` on either axis means "all selected"; the concrete length is
/// resolved against the store's `variant.id` / `sample.id` nodes when a
/// traversal is initialized.
#[derive(Clone, Debug, Default)]
pub struct Selections {
    pub variant: Option<Arc<Selection>>,
    pub sample: Option<Arc<Selection>>,
}

impl Selections {
    /// Select every variant and every sample
    pub fn everything() -> Self {
        Self::default()
    }

    /// Restrict the variant axis
    pub fn with_variants(mut self, sel: Selection) -> Self {
        self.variant = Some(Arc::new(sel));
        self
    }

    /// Restrict the sample axis
    pub fn with_samples(mut self, sel: Selection) -> Self {
        self.sample = Some(Arc::new(sel));
        self
    }

    /// Resolve the variant selection against the store's declared count
    pub fn resolve_variant(&self, store: &dyn ArrayStore) -> Result<Arc<Selection>> {
        let node = store.require_node(VARIANT_ID)?;
        resolve_axis(self.variant.as_ref(), store.total_count(node), "variant")
    }

    /// Resolve the sample selection against the store's declared count
    pub fn resolve_sample(&self, store: &dyn ArrayStore) -> Result<Arc<Selection>> {
        let node = store.require_node(SAMPLE_ID)?;
        resolve_axis(self.sample.as_ref(), store.total_count(node), "sample")
    }
}

fn resolve_axis(
    sel: Option<&Arc<Selection>>,
    total: u64,
    axis: &'static str,
) -> Result<Arc<Selection>> {
    match sel {
        Some(sel) => {
            if sel.len() as u64 != total {
                return Err(VarwalkError::SelectionSizeMismatch {
                    axis,
                    expected: total,
                    actual: sel.len(),
                });
            }
            Ok(Arc::clone(sel))
        }
        None => Ok(Arc::new(Selection::all(total as usize))),
    }
}
