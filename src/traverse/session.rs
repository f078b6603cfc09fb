//! # Attribute Sessions
//!
//! ## Role
//! One session per attribute per traversal: owns the validated descriptor,
//! the cursor, the run-length block cache, and the genotype pass scratch
//! buffer. The traversal drivers advance sessions in lockstep and read the
//! current variant's block out of each.

use std::sync::Arc;

use bitvec::prelude::*;
use tracing::debug;

use crate::error::{Result, VarwalkError};
use crate::select::{Selection, Selections};
use crate::store::ArrayStore;
use crate::traverse::block::{BlockCache, MaterializedBlock};
use crate::traverse::cursor::VariantCursor;
use crate::traverse::descriptor::{AttrShape, AttributeDescriptor, ShapeClass};
use crate::traverse::genotype::read_genotype;

/// Map a logical attribute name onto its shape class and storage path.
///
/// Fixed per-variant attributes resolve to themselves; `genotype`, `phase`,
/// and FORMAT fields resolve to their `/data` nodes.
pub fn resolve_attribute(name: &str) -> Result<(ShapeClass, String)> {
    crate::store::check_path(name)?;

    const BASIC: &[&str] = &[
        "variant.id",
        "position",
        "chromosome",
        "allele",
        "annotation/id",
        "annotation/qual",
        "annotation/filter",
    ];

    if BASIC.contains(&name) {
        return Ok((ShapeClass::Scalar, name.to_string()));
    }
    if name == "genotype" {
        return Ok((ShapeClass::GenotypeCube, "genotype/data".to_string()));
    }
    if name == "phase" {
        return Ok((ShapeClass::PhaseMatrix, "phase/data".to_string()));
    }
    if name.starts_with("annotation/info/") {
        return Ok((ShapeClass::InfoVariable, name.to_string()));
    }
    if name.starts_with("annotation/format/") {
        return Ok((ShapeClass::FormatVariable, format!("{}/data", name)));
    }
    Err(VarwalkError::UnknownAttribute {
        name: name.to_string(),
    })
}

/// Iteration state for one attribute
pub struct AttributeSession {
    name: String,
    desc: AttributeDescriptor,
    cursor: VariantCursor,
    cache: BlockCache,
    geno_scratch: Vec<u8>,
}

impl AttributeSession {
    /// Resolve the attribute name, validate the storage node, and position
    /// the cursor on the first selected variant.
    pub fn initialize(
        store: &dyn ArrayStore,
        name: &str,
        selections: &Selections,
    ) -> Result<Self> {
        let (class, path) = resolve_attribute(name)?;
        let variant_sel = selections.resolve_variant(store)?;
        let sample_sel = selections.resolve_sample(store)?;
        Self::with_resolved(store, name, class, &path, variant_sel, sample_sel)
    }

    /// Initialization with already-resolved selections (shared by the
    /// traversal drivers, which resolve once for all attributes).
    pub(crate) fn with_resolved(
        store: &dyn ArrayStore,
        name: &str,
        class: ShapeClass,
        path: &str,
        variant_sel: Arc<Selection>,
        sample_sel: Arc<Selection>,
    ) -> Result<Self> {
        let n_variants = variant_sel.len();
        let n_samples = sample_sel.len();
        let desc =
            AttributeDescriptor::new(store, class, path, n_variants, n_samples, sample_sel)?;

        debug!(
            attribute = name,
            path,
            class = ?class,
            selected_variants = variant_sel.count_selected(),
            selected_samples = desc.n_selected_samples(),
            "attribute session initialized"
        );

        let geno_scratch = match desc.shape() {
            AttrShape::GenotypeCube {
                n_samples, ploidy, ..
            } => vec![0u8; n_samples * ploidy],
            _ => Vec::new(),
        };

        let mut cursor = VariantCursor::new(n_variants, variant_sel, desc.index_node());
        cursor.reset(store)?;

        Ok(Self {
            name: name.to_string(),
            desc,
            cursor,
            cache: BlockCache::new(),
            geno_scratch,
        })
    }

    /// Logical attribute name this session was initialized with
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &AttributeDescriptor {
        &self.desc
    }

    pub fn cursor(&self) -> &VariantCursor {
        &self.cursor
    }

    /// Re-position on the first selected variant
    pub fn reset(&mut self, store: &dyn ArrayStore) -> Result<bool> {
        self.cursor.reset(store)
    }

    /// Advance to the next selected variant
    pub fn advance(&mut self, store: &dyn ArrayStore) -> Result<bool> {
        self.cursor.advance(store)
    }

    /// Materialize and fill the current variant's block.
    ///
    /// The block shape comes from the run-length cache; the contents are
    /// overwritten on every call.
    pub fn fill_current(&mut self, store: &dyn ArrayStore) -> Result<()> {
        if !self.cursor.is_positioned() {
            return Err(VarwalkError::lockstep(format!(
                "'{}' read past the last selected variant",
                self.name
            )));
        }

        let run = self.cursor.run_length();
        let block = self.cache.block_for(&self.desc, run);
        if block.is_empty() {
            block.data.clear();
            return Ok(());
        }

        match *self.desc.shape() {
            AttrShape::GenotypeCube {
                n_samples, ploidy, ..
            } => {
                let cells = block.cells;
                let buf = match &mut block.data {
                    crate::store::ArrayData::Int(v) => {
                        v.clear();
                        v.resize(cells, 0);
                        v
                    }
                    _ => {
                        return Err(VarwalkError::store(format!(
                            "genotype node '{}' does not decode to integers",
                            self.desc.path()
                        )))
                    }
                };
                read_genotype(
                    store,
                    self.desc.node(),
                    n_samples,
                    ploidy,
                    self.desc.sample_selection(),
                    self.cursor.flat_offset(),
                    run,
                    &mut self.geno_scratch,
                    buf,
                )?;
            }
            _ => {
                let rank = store.rank(self.desc.node());
                let extents = store.extents(self.desc.node());

                let mut start = vec![0u64; rank];
                start[0] = self.cursor.flat_offset();
                let mut count = vec![run];
                count.extend_from_slice(&extents[1..]);

                let sample_mask = self
                    .desc
                    .masks_samples()
                    .then(|| self.desc.sample_selection().as_bits());
                let masks: Vec<Option<&BitSlice<u64, Lsb0>>> = match rank {
                    1 => vec![None],
                    2 => vec![None, sample_mask],
                    _ => vec![None, sample_mask, None],
                };

                store.read_region(self.desc.node(), &start, &count, &masks, &mut block.data)?;
            }
        }
        Ok(())
    }

    /// Block filled by the last [`fill_current`](Self::fill_current) call
    pub fn current_block(&self) -> Option<&MaterializedBlock> {
        self.cache.get(self.cursor.run_length())
    }
}
