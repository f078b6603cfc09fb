//! # Variant Cursor
//!
//! ## Role
//! Stateful iterator over one attribute's variants. Tracks the current
//! variant, the flat-array offset of its first element, and the run length
//! it owes, advancing incrementally instead of re-mapping the whole length
//! index on every step.
//!
//! ## Invariant
//! `flat_offset` always equals the sum of run lengths of every preceding
//! variant, selected or not: skipped variants never surface data but still
//! occupy storage, so their lengths are read and accumulated while skipping.
//!
//! Each attribute owns its cursor exclusively. Two attributes traversing the
//! same variant sequence in lockstep still need separate cursors because
//! their run lengths differ.

use std::sync::Arc;

use crate::error::Result;
use crate::select::Selection;
use crate::store::{ArrayStore, NodeId};

/// Traversal state of a cursor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    /// Created but not yet reset
    Uninitialized,
    /// Standing on a selected variant
    Positioned,
    /// Past the last variant
    Exhausted,
}

/// Iterator state over one attribute's selected variants
#[derive(Clone, Debug)]
pub struct VariantCursor {
    /// Total variant count (selected or not)
    total: usize,
    /// Shared variant selection
    selection: Arc<Selection>,
    /// Companion length-index node, if the attribute is variable-length
    index: Option<NodeId>,
    state: CursorState,
    /// Current variant in the full numbering
    cur: usize,
    /// Position within the selected subsequence (0-based)
    selected_pos: usize,
    /// Flat-array offset of the current variant's first element
    flat_offset: u64,
    /// Elements the current variant owes
    run_length: usize,
}

impl VariantCursor {
    /// Create an unpositioned cursor; call [`reset`](Self::reset) before use
    pub fn new(total: usize, selection: Arc<Selection>, index: Option<NodeId>) -> Self {
        Self {
            total,
            selection,
            index,
            state: CursorState::Uninitialized,
            cur: 0,
            selected_pos: 0,
            flat_offset: 0,
            run_length: 0,
        }
    }

    /// Move to the first selected variant. Returns whether one exists.
    pub fn reset(&mut self, store: &dyn ArrayStore) -> Result<bool> {
        self.cur = 0;
        self.selected_pos = 0;
        self.flat_offset = 0;
        if self.total == 0 {
            self.state = CursorState::Exhausted;
            self.run_length = 0;
            return Ok(false);
        }

        self.run_length = match self.index {
            Some(index) => self.read_length(store, index, 0)?,
            None => 1,
        };
        self.state = CursorState::Positioned;

        if !self.selection.get(0) {
            // Variant 0 is unselected: walk to the first selected one.
            let more = self.step(store)?;
            self.selected_pos = 0;
            return Ok(more);
        }
        Ok(true)
    }

    /// Advance to the next selected variant. Returns whether one exists;
    /// `false` leaves the cursor exhausted.
    pub fn advance(&mut self, store: &dyn ArrayStore) -> Result<bool> {
        let more = self.step(store)?;
        if more {
            self.selected_pos += 1;
        }
        Ok(more)
    }

    /// Shared advancement: accumulate the outgoing run, skip unselected
    /// variants while accounting for their storage footprint, read the new
    /// run length.
    fn step(&mut self, store: &dyn ArrayStore) -> Result<bool> {
        self.cur += 1;

        match self.index {
            Some(index) => {
                self.flat_offset += self.run_length as u64;
                while self.cur < self.total && !self.selection.get(self.cur) {
                    let skipped = self.read_length(store, index, self.cur)?;
                    self.flat_offset += skipped as u64;
                    self.cur += 1;
                }
                if self.cur < self.total {
                    self.run_length = self.read_length(store, index, self.cur)?;
                } else {
                    self.run_length = 0;
                    self.state = CursorState::Exhausted;
                }
            }
            None => {
                while self.cur < self.total && !self.selection.get(self.cur) {
                    self.cur += 1;
                }
                self.flat_offset = self.cur as u64;
                if self.cur < self.total {
                    self.run_length = 1;
                } else {
                    self.run_length = 0;
                    self.state = CursorState::Exhausted;
                }
            }
        }

        Ok(self.cur < self.total)
    }

    /// One normalized length-index entry (negative raw values become 0)
    fn read_length(&self, store: &dyn ArrayStore, index: NodeId, at: usize) -> Result<usize> {
        let mut raw = [0i32; 1];
        store.read_ints(index, at as u64, 1, &mut raw)?;
        Ok(raw[0].max(0) as usize)
    }

    /// Current variant in the full, unselected numbering
    pub fn current_variant(&self) -> usize {
        self.cur
    }

    /// 0-based position of the current variant within the selected
    /// subsequence
    pub fn selected_position(&self) -> usize {
        self.selected_pos
    }

    /// Flat-array offset of the current variant's first element
    pub fn flat_offset(&self) -> u64 {
        self.flat_offset
    }

    /// Elements the current variant owes
    pub fn run_length(&self) -> usize {
        self.run_length
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    pub(crate) fn is_positioned(&self) -> bool {
        self.state == CursorState::Positioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn indexed_store(lengths: Vec<i32>) -> (MemStore, NodeId) {
        let n = lengths.len();
        let store = MemStore::builder()
            .ints("fmt/@data", [n], lengths)
            .build();
        let node = store.find_node("fmt/@data").unwrap();
        (store, node)
    }

    #[test]
    fn test_reset_lands_on_first_selected() {
        let (store, index) = indexed_store(vec![2, 3, 1, 4]);
        let sel = Arc::new(Selection::from_flags(&[false, false, true, true]));
        let mut cursor = VariantCursor::new(4, sel, Some(index));

        assert!(cursor.reset(&store).unwrap());
        assert_eq!(cursor.current_variant(), 2);
        assert_eq!(cursor.selected_position(), 0);
        // Variants 0 and 1 occupy 2 + 3 elements before the first selected.
        assert_eq!(cursor.flat_offset(), 5);
        assert_eq!(cursor.run_length(), 1);
    }

    #[test]
    fn test_offset_accounts_for_skipped_variants() {
        let (store, index) = indexed_store(vec![2, 3, 1, 4, 2]);
        let sel = Arc::new(Selection::from_flags(&[true, false, false, true, true]));
        let mut cursor = VariantCursor::new(5, sel, Some(index));

        assert!(cursor.reset(&store).unwrap());
        assert_eq!(cursor.current_variant(), 0);
        assert_eq!(cursor.flat_offset(), 0);
        assert_eq!(cursor.run_length(), 2);

        assert!(cursor.advance(&store).unwrap());
        assert_eq!(cursor.current_variant(), 3);
        // 2 (variant 0) + 3 + 1 (skipped variants 1 and 2)
        assert_eq!(cursor.flat_offset(), 6);
        assert_eq!(cursor.run_length(), 4);
        assert_eq!(cursor.selected_position(), 1);

        assert!(cursor.advance(&store).unwrap());
        assert_eq!(cursor.flat_offset(), 10);
        assert_eq!(cursor.run_length(), 2);

        assert!(!cursor.advance(&store).unwrap());
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.run_length(), 0);
    }

    #[test]
    fn test_negative_lengths_normalize_to_zero() {
        let (store, index) = indexed_store(vec![-1, 2, -3, 1]);
        let sel = Arc::new(Selection::all(4));
        let mut cursor = VariantCursor::new(4, sel, Some(index));

        assert!(cursor.reset(&store).unwrap());
        assert_eq!(cursor.run_length(), 0);

        assert!(cursor.advance(&store).unwrap());
        assert_eq!(cursor.flat_offset(), 0);
        assert_eq!(cursor.run_length(), 2);

        assert!(cursor.advance(&store).unwrap());
        assert_eq!(cursor.flat_offset(), 2);
        assert_eq!(cursor.run_length(), 0);
    }

    #[test]
    fn test_unindexed_cursor_tracks_position() {
        let store = MemStore::builder().ints("x", [1], vec![0]).build();
        let sel = Arc::new(Selection::from_flags(&[false, true, false, true]));
        let mut cursor = VariantCursor::new(4, sel, None);

        assert!(cursor.reset(&store).unwrap());
        assert_eq!(cursor.current_variant(), 1);
        assert_eq!(cursor.flat_offset(), 1);
        assert_eq!(cursor.run_length(), 1);

        assert!(cursor.advance(&store).unwrap());
        assert_eq!(cursor.current_variant(), 3);
        assert_eq!(cursor.flat_offset(), 3);

        assert!(!cursor.advance(&store).unwrap());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_no_selected_variant_exhausts_on_reset() {
        let (store, index) = indexed_store(vec![1, 1]);
        let sel = Arc::new(Selection::none(2));
        let mut cursor = VariantCursor::new(2, sel, Some(index));
        assert!(!cursor.reset(&store).unwrap());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_lockstep_between_two_cursors() {
        // Two attributes with different run lengths walk the same selection.
        let (store_a, index_a) = indexed_store(vec![1, 5, 2, 0, 3]);
        let (store_b, index_b) = indexed_store(vec![4, 1, 1, 2, 2]);
        let sel = Arc::new(Selection::from_flags(&[true, false, true, true, false]));

        let mut a = VariantCursor::new(5, Arc::clone(&sel), Some(index_a));
        let mut b = VariantCursor::new(5, Arc::clone(&sel), Some(index_b));
        assert_eq!(a.reset(&store_a).unwrap(), b.reset(&store_b).unwrap());
        assert_eq!(a.current_variant(), b.current_variant());

        loop {
            let more_a = a.advance(&store_a).unwrap();
            let more_b = b.advance(&store_b).unwrap();
            assert_eq!(more_a, more_b);
            assert_eq!(a.current_variant(), b.current_variant());
            assert_eq!(a.selected_position(), b.selected_position());
            if !more_a {
                break;
            }
        }
    }
}
