//! # Sliding-Window Driver
//!
//! ## Role
//! Maintains a rolling window of materialized blocks over the selected
//! variants and fires the callback once per `shift` slides. The buffer is
//! primed with the first `window_size - 1` variants; every slide evicts the
//! oldest block set, reads one more variant, appends it, and advances every
//! cursor in lockstep.
//!
//! Cursor exhaustion while the window is still being primed means the
//! cursors fell out of lockstep with the selected-variant count and is a
//! hard failure.

use std::collections::VecDeque;

use tracing::info_span;

use crate::apply::{IndexMode, Traversal};
use crate::error::{Result, VarwalkError};
use crate::traverse::MaterializedBlock;

/// Owned blocks for one variant across all attributes, in attribute order
type BlockSet = Vec<MaterializedBlock>;

/// One buffered variant: its position in the full numbering plus its blocks
#[derive(Debug)]
struct WindowEntry {
    variant: usize,
    blocks: BlockSet,
}

/// Rolling buffer of the last `window_size` materialized block sets
#[derive(Debug)]
pub struct SlidingWindowBuffer {
    window: VecDeque<WindowEntry>,
    window_size: usize,
}

impl SlidingWindowBuffer {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Block sets currently buffered, oldest first
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Whether the buffer holds a complete window
    pub fn is_full(&self) -> bool {
        self.window.len() == self.window_size
    }

    /// Full-numbering position of the oldest buffered variant
    pub fn first_variant(&self) -> Option<usize> {
        self.window.front().map(|e| e.variant)
    }

    /// Materialize the first `window_size - 1` variants, consuming the
    /// traversal's cursors that many times. Exhaustion mid-prime is a
    /// lockstep fault: the selected-variant count promised more variants.
    pub fn prime(&mut self, traversal: &mut Traversal<'_>) -> Result<()> {
        for _ in 1..self.window_size {
            if !self.slide(traversal)? {
                return Err(VarwalkError::lockstep(
                    "cursor exhausted while priming the window",
                ));
            }
        }
        Ok(())
    }

    /// Evict the oldest block set if the window is full, materialize and
    /// read one more variant, append it, and advance every cursor.
    /// Returns whether further variants remain.
    pub fn slide(&mut self, traversal: &mut Traversal<'_>) -> Result<bool> {
        let variant = traversal.current_variant();
        let blocks = traversal.snapshot()?;
        if self.is_full() {
            self.window.pop_front();
        }
        self.window.push_back(WindowEntry { variant, blocks });
        traversal.advance_all()
    }

    fn get(&self, pos: usize) -> &BlockSet {
        &self.window[pos].blocks
    }
}

/// One fired window handed to the callback
pub struct WindowStep<'a> {
    /// Step index per the traversal's [`IndexMode`]; for
    /// [`IndexMode::Absolute`] this is the 1-based position of the
    /// window's first element in the full, unselected numbering
    pub index: Option<i64>,
    names: &'a [String],
    buffer: &'a SlidingWindowBuffer,
}

impl<'a> WindowStep<'a> {
    /// Variants in the window
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Single-attribute convenience: the block at window position `pos`
    /// (0 = oldest)
    pub fn block(&self, pos: usize) -> &MaterializedBlock {
        &self.buffer.get(pos)[0]
    }

    /// Block at window position `pos` for a named attribute
    pub fn get(&self, pos: usize, name: &str) -> Option<&MaterializedBlock> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.buffer.get(pos)[idx])
    }

    /// Attribute names, in block-set order
    pub fn names(&self) -> &'a [String] {
        self.names
    }
}

impl<'s> Traversal<'s> {
    /// Clone every current block into an owned set for the window
    pub(crate) fn snapshot(&mut self) -> Result<BlockSet> {
        self.fill_all()?;
        Ok(self.current_blocks()?.into_iter().cloned().collect())
    }

    /// Visit the selected variants through a sliding window of
    /// `window_size`, firing `f` every `shift` slides and collecting its
    /// results in emission order.
    pub fn apply_window<T>(
        &mut self,
        window_size: usize,
        shift: usize,
        mode: IndexMode,
        mut f: impl FnMut(&WindowStep<'_>) -> T,
    ) -> Result<Vec<T>> {
        let n_selected = self.n_selected();
        if n_selected == 0 {
            return Err(VarwalkError::parameter("there is no selected variant"));
        }
        if window_size == 0 || window_size > n_selected {
            return Err(VarwalkError::parameter(format!(
                "window size is out of range (1..{})",
                n_selected
            )));
        }
        if shift == 0 {
            return Err(VarwalkError::parameter("shift must be greater than 0"));
        }

        let span = info_span!("apply_window", window_size, shift);
        let _guard = span.enter();

        self.reset()?;
        let mut buffer = SlidingWindowBuffer::new(window_size);
        buffer.prime(self)?;

        let emissions = (n_selected - window_size + 1).div_ceil(shift);
        let mut out = Vec::with_capacity(emissions);
        let mut shift_countdown = 0usize;

        loop {
            let more = buffer.slide(self)?;

            if shift_countdown == 0 {
                let index = match mode {
                    IndexMode::None => None,
                    IndexMode::Relative => Some(out.len() as i64 + 1),
                    IndexMode::Absolute => buffer.first_variant().map(|v| v as i64 + 1),
                };
                let step = WindowStep {
                    index,
                    names: self.names(),
                    buffer: &buffer,
                };
                out.push(f(&step));
                shift_countdown = shift;
            }
            shift_countdown -= 1;

            if !more {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::{Selection, Selections};
    use crate::store::MemStore;

    fn position_store(n: usize) -> MemStore {
        MemStore::builder()
            .ints("variant.id", [n], (0..n as i32).collect())
            .strings("sample.id", [1], vec!["S1".into()])
            .ints("position", [n], (0..n as i32).map(|i| i * 10).collect())
            .build()
    }

    fn window_positions(step: &WindowStep<'_>) -> Vec<i32> {
        (0..step.len())
            .map(|pos| step.block(pos).data.as_ints().unwrap()[0])
            .collect()
    }

    #[test]
    fn test_window_scenario_ten_three_two() {
        let store = position_store(10);
        let mut traversal =
            Traversal::new(&store, &["position"], &Selections::everything()).unwrap();

        let windows = traversal
            .apply_window(3, 2, IndexMode::None, window_positions)
            .unwrap();

        // ceil((10 - 3 + 1) / 2) = 4 firings
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0], vec![0, 10, 20]);
        assert_eq!(windows[1], vec![20, 30, 40]);
        assert_eq!(windows[2], vec![40, 50, 60]);
        assert_eq!(windows[3], vec![60, 70, 80]);
    }

    #[test]
    fn test_window_covering_everything_fires_once() {
        let store = position_store(5);
        let mut traversal =
            Traversal::new(&store, &["position"], &Selections::everything()).unwrap();
        for shift in [1, 2, 7] {
            let windows = traversal
                .apply_window(5, shift, IndexMode::None, window_positions)
                .unwrap();
            assert_eq!(windows.len(), 1);
            assert_eq!(windows[0], vec![0, 10, 20, 30, 40]);
        }
    }

    #[test]
    fn test_window_parameters_validated() {
        let store = position_store(4);
        let mut traversal =
            Traversal::new(&store, &["position"], &Selections::everything()).unwrap();
        assert!(matches!(
            traversal.apply_window(0, 1, IndexMode::None, |_| ()),
            Err(VarwalkError::InvalidParameter { .. })
        ));
        assert!(matches!(
            traversal.apply_window(5, 1, IndexMode::None, |_| ()),
            Err(VarwalkError::InvalidParameter { .. })
        ));
        assert!(matches!(
            traversal.apply_window(2, 0, IndexMode::None, |_| ()),
            Err(VarwalkError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_window_absolute_index_names_first_element() {
        let store = position_store(6);
        let mut traversal =
            Traversal::new(&store, &["position"], &Selections::everything()).unwrap();
        let indices = traversal
            .apply_window(3, 1, IndexMode::Absolute, |step| step.index.unwrap())
            .unwrap();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_window_absolute_index_under_sparse_selection() {
        let store = position_store(8);
        let sel = Selections::everything().with_variants(Selection::from_fn(8, |i| i % 2 == 0));
        let mut traversal = Traversal::new(&store, &["position"], &sel).unwrap();
        let indices = traversal
            .apply_window(2, 1, IndexMode::Absolute, |step| step.index.unwrap())
            .unwrap();
        // Windows start at variants 0, 2, 4 of the full numbering.
        assert_eq!(indices, vec![1, 3, 5]);
    }

    #[test]
    fn test_window_relative_index_counts_emissions() {
        let store = position_store(10);
        let mut traversal =
            Traversal::new(&store, &["position"], &Selections::everything()).unwrap();
        let indices = traversal
            .apply_window(3, 2, IndexMode::Relative, |step| step.index.unwrap())
            .unwrap();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_window_over_sparse_selection() {
        let store = position_store(8);
        let sel = Selections::everything().with_variants(Selection::from_fn(8, |i| i % 2 == 0));
        let mut traversal = Traversal::new(&store, &["position"], &sel).unwrap();
        let windows = traversal
            .apply_window(2, 1, IndexMode::None, window_positions)
            .unwrap();
        assert_eq!(windows, vec![vec![0, 20], vec![20, 40], vec![40, 60]]);
    }

    #[test]
    fn test_buffer_prime_and_slide_directly() {
        let store = position_store(4);
        let mut traversal =
            Traversal::new(&store, &["position"], &Selections::everything()).unwrap();
        traversal.reset().unwrap();

        let mut buffer = SlidingWindowBuffer::new(3);
        buffer.prime(&mut traversal).unwrap();
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_full());

        assert!(buffer.slide(&mut traversal).unwrap());
        assert!(buffer.is_full());
        assert_eq!(buffer.first_variant(), Some(0));

        assert!(!buffer.slide(&mut traversal).unwrap());
        assert_eq!(buffer.first_variant(), Some(1));
    }
}
