//! # Attribute Descriptors
//!
//! ## Role
//! Validated, immutable description of one attribute's shape built once at
//! session setup: which shape class it belongs to, which storage node backs
//! it, whether a companion length-index node exists, and how many cells one
//! traversal step produces.
//!
//! ## Design
//! The five shape classes are a single enum, each variant carrying only the
//! fields it needs, with exhaustive matches at block-sizing and read time.
//! This keeps shape-specific logic colocated without dynamic dispatch, the
//! same enum-over-hierarchy shape the storage columns use.

use std::sync::Arc;

use crate::error::{Result, VarwalkError};
use crate::select::Selection;
use crate::store::{check_path, companion_path, ArrayData, ArrayStore, NodeId, ValueKind};

/// The five attribute shape classes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeClass {
    /// One fixed cell per variant (`position`, `allele`, ...)
    Scalar,
    /// Stacked per-allele call passes: variable passes per variant over a
    /// (sample, ploidy) slide
    GenotypeCube,
    /// One phase cell per sample (rank 2) or per sample and allele gap
    /// (rank 3)
    PhaseMatrix,
    /// Per-variant INFO field, variable-length when a companion index exists
    InfoVariable,
    /// Per-sample FORMAT field, always variable-length per variant
    FormatVariable,
}

/// Shape-specific fields, one enum variant per class
#[derive(Clone, Debug)]
pub enum AttrShape {
    Scalar,
    GenotypeCube {
        /// Companion length-index node (call passes per variant)
        index: NodeId,
        /// Total samples (storage axis 1 extent)
        n_samples: usize,
        /// Allele-call axis extent (storage axis 2)
        ploidy: usize,
    },
    PhaseMatrix {
        /// Axis-2 extent when the node is rank 3
        extra: Option<usize>,
    },
    InfoVariable {
        /// Companion length-index node; absent for fixed-length INFO fields
        index: Option<NodeId>,
        /// Axis-1 extent when the node is rank 2
        extra: Option<usize>,
    },
    FormatVariable {
        /// Companion length-index node (mandatory)
        index: NodeId,
        /// Axis-2 extent when the node is rank 3
        extra: Option<usize>,
    },
}

/// Logical cell type of a materialized block, resolved once at setup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalKind {
    Int,
    Float,
    Str,
    Bool,
    /// Integer codes with an attached level table
    Factor,
}

impl LogicalKind {
    /// Fresh buffer of this kind with room for `cells` entries
    pub fn empty_buffer(self, cells: usize) -> ArrayData {
        match self {
            LogicalKind::Int | LogicalKind::Factor => ArrayData::Int(Vec::with_capacity(cells)),
            LogicalKind::Float => ArrayData::Float(Vec::with_capacity(cells)),
            LogicalKind::Str => ArrayData::Str(Vec::with_capacity(cells)),
            LogicalKind::Bool => ArrayData::Bool(Vec::with_capacity(cells)),
        }
    }
}

/// One dimension of a materialized block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dim {
    pub name: Option<&'static str>,
    pub len: usize,
}

impl Dim {
    fn named(name: &'static str, len: usize) -> Self {
        Self {
            name: Some(name),
            len,
        }
    }

    fn unnamed(len: usize) -> Self {
        Self { name: None, len }
    }
}

/// Validated description of one attribute, built once per traversal
#[derive(Clone, Debug)]
pub struct AttributeDescriptor {
    path: String,
    node: NodeId,
    shape: AttrShape,
    logical: LogicalKind,
    levels: Option<Arc<[String]>>,
    sample_sel: Arc<Selection>,
    n_selected_samples: usize,
}

impl AttributeDescriptor {
    /// Validate the storage node against its declared shape class and build
    /// the descriptor.
    ///
    /// `n_variants` and `n_samples` are the store's declared axis totals;
    /// `sample_sel` has already been resolved against `n_samples`.
    pub fn new(
        store: &dyn ArrayStore,
        class: ShapeClass,
        path: &str,
        n_variants: usize,
        n_samples: usize,
        sample_sel: Arc<Selection>,
    ) -> Result<Self> {
        check_path(path)?;
        let node = store.require_node(path)?;
        let rank = store.rank(node);
        let extents = store.extents(node).to_vec();

        let shape = match class {
            ShapeClass::Scalar => {
                if rank != 1 || store.total_count(node) != n_variants as u64 {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                AttrShape::Scalar
            }

            ShapeClass::GenotypeCube => {
                if rank != 3 {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                if extents[0] < n_variants || extents[1] != n_samples {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                let index = require_index(store, path, n_variants)?;
                AttrShape::GenotypeCube {
                    index,
                    n_samples: extents[1],
                    ploidy: extents[2],
                }
            }

            ShapeClass::PhaseMatrix => {
                if rank != 2 && rank != 3 {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                if extents[0] != n_variants || extents[1] != n_samples {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                AttrShape::PhaseMatrix {
                    extra: (rank == 3).then(|| extents[2]),
                }
            }

            ShapeClass::InfoVariable => {
                if rank != 1 && rank != 2 {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                let index = find_index(store, path, n_variants)?;
                if index.is_none() && extents[0] != n_variants {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                AttrShape::InfoVariable {
                    index,
                    extra: (rank == 2).then(|| extents[1]),
                }
            }

            ShapeClass::FormatVariable => {
                if rank != 2 && rank != 3 {
                    return Err(VarwalkError::invalid_dimension(path));
                }
                let index = require_index(store, path, n_variants)?;
                AttrShape::FormatVariable {
                    index,
                    extra: (rank == 3).then(|| extents[2]),
                }
            }
        };

        let (logical, levels) = resolve_logical(store, node);
        let n_selected_samples = sample_sel.count_selected();

        Ok(Self {
            path: path.to_string(),
            node,
            shape,
            logical,
            levels,
            sample_sel,
            n_selected_samples,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn shape(&self) -> &AttrShape {
        &self.shape
    }

    pub fn logical(&self) -> LogicalKind {
        self.logical
    }

    pub fn levels(&self) -> Option<&Arc<[String]>> {
        self.levels.as_ref()
    }

    pub fn sample_selection(&self) -> &Arc<Selection> {
        &self.sample_sel
    }

    pub fn n_selected_samples(&self) -> usize {
        self.n_selected_samples
    }

    /// Companion length-index node, if this class carries one
    pub fn index_node(&self) -> Option<NodeId> {
        match self.shape {
            AttrShape::Scalar | AttrShape::PhaseMatrix { .. } => None,
            AttrShape::GenotypeCube { index, .. } => Some(index),
            AttrShape::InfoVariable { index, .. } => index,
            AttrShape::FormatVariable { index, .. } => Some(index),
        }
    }

    /// Whether the sample axis of this class is masked during reads
    pub(crate) fn masks_samples(&self) -> bool {
        matches!(
            self.shape,
            AttrShape::PhaseMatrix { .. } | AttrShape::FormatVariable { .. }
        )
    }

    /// Cells one traversal step produces for the given run length
    pub fn cell_count(&self, run_length: usize) -> usize {
        match &self.shape {
            AttrShape::Scalar => 1,
            AttrShape::GenotypeCube { ploidy, .. } => self.n_selected_samples * ploidy,
            AttrShape::PhaseMatrix { extra, .. } => {
                self.n_selected_samples * extra.unwrap_or(1)
            }
            AttrShape::InfoVariable { extra, .. } => extra.unwrap_or(1) * run_length,
            AttrShape::FormatVariable { extra, .. } => {
                self.n_selected_samples * extra.unwrap_or(1) * run_length
            }
        }
    }

    /// Block dimensions for the given run length. Vector-shaped blocks
    /// report no dims.
    pub fn dims(&self, run_length: usize) -> Vec<Dim> {
        match &self.shape {
            AttrShape::Scalar | AttrShape::InfoVariable { .. } => Vec::new(),
            AttrShape::GenotypeCube { ploidy, .. } => vec![
                Dim::named("allele", *ploidy),
                Dim::named("sample", self.n_selected_samples),
            ],
            AttrShape::PhaseMatrix { extra, .. } => match extra {
                Some(extra) => vec![
                    Dim::unnamed(*extra),
                    Dim::unnamed(self.n_selected_samples),
                ],
                None => Vec::new(),
            },
            AttrShape::FormatVariable { extra, .. } => match extra {
                Some(extra) => vec![
                    Dim::unnamed(*extra),
                    Dim::unnamed(self.n_selected_samples),
                    Dim::unnamed(run_length),
                ],
                None => vec![
                    Dim::unnamed(self.n_selected_samples),
                    Dim::unnamed(run_length),
                ],
            },
        }
    }
}

/// Locate an optional companion index and validate its shape
fn find_index(
    store: &dyn ArrayStore,
    path: &str,
    n_variants: usize,
) -> Result<Option<NodeId>> {
    let index_path = companion_path(path);
    match store.find_node(&index_path) {
        None => Ok(None),
        Some(index) => {
            if store.rank(index) != 1 || store.total_count(index) != n_variants as u64 {
                return Err(VarwalkError::invalid_dimension(index_path));
            }
            Ok(Some(index))
        }
    }
}

/// Locate a mandatory companion index and validate its shape
fn require_index(store: &dyn ArrayStore, path: &str, n_variants: usize) -> Result<NodeId> {
    find_index(store, path, n_variants)?
        .ok_or_else(|| VarwalkError::missing_index(companion_path(path)))
}

/// Decide the logical cell type once from the node's physical kind
pub(crate) fn resolve_logical(
    store: &dyn ArrayStore,
    node: NodeId,
) -> (LogicalKind, Option<Arc<[String]>>) {
    match store.value_kind(node) {
        ValueKind::Bit1 => (LogicalKind::Bool, None),
        ValueKind::UInt8 | ValueKind::Int32 => match store.factor_levels(node) {
            Some(levels) => (LogicalKind::Factor, Some(Arc::from(levels.to_vec()))),
            None => (LogicalKind::Int, None),
        },
        ValueKind::Float64 => (LogicalKind::Float, None),
        ValueKind::Utf8 => (LogicalKind::Str, None),
    }
}
