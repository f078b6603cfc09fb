//! # Whole-Selection Materialization
//!
//! ## Role
//! One-shot reads: materialize an entire attribute across the current
//! selections in a single call instead of stepping a cursor. Fixed
//! attributes become masked range reads; the genotype cube is assembled by
//! consuming a cursor to exhaustion; variable-length INFO/FORMAT fields map
//! the variant selection onto their flat arrays and return the per-variant
//! lengths alongside the data.

use std::sync::Arc;

use bitvec::prelude::*;
use tracing::info_span;

use crate::error::{Result, VarwalkError};
use crate::select::{map_index, Selection, Selections};
use crate::store::{companion_path, ArrayData, ArrayStore, NodeId, SAMPLE_ID};
use crate::traverse::descriptor::{AttributeDescriptor, Dim, ShapeClass};
use crate::traverse::genotype::read_genotype;
use crate::traverse::session::resolve_attribute;
use crate::traverse::VariantCursor;

/// A fully materialized attribute
#[derive(Clone, Debug)]
pub struct Extracted {
    /// Cell buffer in row-major order
    pub data: ArrayData,
    /// Dimensions; empty for vector-shaped results
    pub dims: Vec<Dim>,
    /// Level table for factor attributes
    pub levels: Option<Arc<[String]>>,
    /// Per-selected-variant element counts, present for variable-length
    /// attributes
    pub lengths: Option<Vec<i32>>,
}

/// Materialize one attribute across the whole selection.
///
/// Accepts the same logical names the traversal drivers accept, plus
/// `sample.id` for the sample table itself.
pub fn read_attribute(
    store: &dyn ArrayStore,
    name: &str,
    selections: &Selections,
) -> Result<Extracted> {
    let span = info_span!("read_attribute", name);
    let _guard = span.enter();

    if name == SAMPLE_ID {
        return read_sample_table(store, selections);
    }

    let (class, path) = resolve_attribute(name)?;
    let variant_sel = selections.resolve_variant(store)?;
    let sample_sel = selections.resolve_sample(store)?;

    match class {
        ShapeClass::Scalar => read_masked_vector(store, &path, &variant_sel),
        ShapeClass::GenotypeCube => read_genotype_cube(store, &path, &variant_sel, &sample_sel),
        ShapeClass::PhaseMatrix => read_phase(store, &path, &variant_sel, &sample_sel),
        ShapeClass::InfoVariable => read_info(store, &path, &variant_sel),
        ShapeClass::FormatVariable => read_format(store, &path, &variant_sel, &sample_sel),
    }
}

/// Buffer matching a node's logical kind, plus the level table if any
fn buffer_for(store: &dyn ArrayStore, node: NodeId) -> (ArrayData, Option<Arc<[String]>>) {
    let (logical, levels) = crate::traverse::descriptor::resolve_logical(store, node);
    (logical.empty_buffer(0), levels)
}

fn read_sample_table(store: &dyn ArrayStore, selections: &Selections) -> Result<Extracted> {
    let node = store.require_node(SAMPLE_ID)?;
    if store.rank(node) != 1 {
        return Err(VarwalkError::invalid_dimension(SAMPLE_ID));
    }
    let sample_sel = selections.resolve_sample(store)?;
    let (mut data, levels) = buffer_for(store, node);
    store.read_region(
        node,
        &[0],
        &[store.total_count(node) as usize],
        &[Some(sample_sel.as_bits())],
        &mut data,
    )?;
    Ok(Extracted {
        data,
        dims: Vec::new(),
        levels,
        lengths: None,
    })
}

fn read_masked_vector(
    store: &dyn ArrayStore,
    path: &str,
    variant_sel: &Selection,
) -> Result<Extracted> {
    let node = store.require_node(path)?;
    if store.rank(node) != 1 || store.total_count(node) != variant_sel.len() as u64 {
        return Err(VarwalkError::invalid_dimension(path));
    }
    let (mut data, levels) = buffer_for(store, node);
    store.read_region(
        node,
        &[0],
        &[variant_sel.len()],
        &[Some(variant_sel.as_bits())],
        &mut data,
    )?;
    Ok(Extracted {
        data,
        dims: Vec::new(),
        levels,
        lengths: None,
    })
}

fn read_genotype_cube(
    store: &dyn ArrayStore,
    path: &str,
    variant_sel: &Arc<Selection>,
    sample_sel: &Arc<Selection>,
) -> Result<Extracted> {
    let n_variants = variant_sel.len();
    let n_sel_variants = variant_sel.count_selected();
    let desc = AttributeDescriptor::new(
        store,
        ShapeClass::GenotypeCube,
        path,
        n_variants,
        sample_sel.len(),
        Arc::clone(sample_sel),
    )?;
    let (n_samples, ploidy) = match *desc.shape() {
        crate::traverse::AttrShape::GenotypeCube {
            n_samples, ploidy, ..
        } => (n_samples, ploidy),
        _ => unreachable!("descriptor built as a genotype cube"),
    };

    let slide = desc.n_selected_samples() * ploidy;
    let mut cube = vec![0i32; n_sel_variants * slide];
    let dims = vec![
        Dim {
            name: Some("allele"),
            len: ploidy,
        },
        Dim {
            name: Some("sample"),
            len: desc.n_selected_samples(),
        },
        Dim {
            name: Some("variant"),
            len: n_sel_variants,
        },
    ];
    if n_sel_variants == 0 {
        return Ok(Extracted {
            data: ArrayData::Int(cube),
            dims,
            levels: None,
            lengths: None,
        });
    }

    let mut cursor = VariantCursor::new(n_variants, Arc::clone(variant_sel), desc.index_node());
    let mut scratch = Vec::new();
    let mut more = cursor.reset(store)?;
    let mut base = 0usize;
    while more {
        read_genotype(
            store,
            desc.node(),
            n_samples,
            ploidy,
            sample_sel,
            cursor.flat_offset(),
            cursor.run_length(),
            &mut scratch,
            &mut cube[base..base + slide],
        )?;
        base += slide;
        more = cursor.advance(store)?;
    }

    Ok(Extracted {
        data: ArrayData::Int(cube),
        dims,
        levels: None,
        lengths: None,
    })
}

fn read_phase(
    store: &dyn ArrayStore,
    path: &str,
    variant_sel: &Selection,
    sample_sel: &Selection,
) -> Result<Extracted> {
    let node = store.require_node(path)?;
    let rank = store.rank(node);
    if rank != 2 && rank != 3 {
        return Err(VarwalkError::invalid_dimension(path));
    }
    let extents = store.extents(node).to_vec();
    if extents[0] != variant_sel.len() || extents[1] != sample_sel.len() {
        return Err(VarwalkError::invalid_dimension(path));
    }

    let (mut data, levels) = buffer_for(store, node);
    let start = vec![0u64; rank];
    let count: Vec<usize> = extents.clone();
    let masks: Vec<Option<&BitSlice<u64, Lsb0>>> = if rank == 2 {
        vec![Some(variant_sel.as_bits()), Some(sample_sel.as_bits())]
    } else {
        vec![
            Some(variant_sel.as_bits()),
            Some(sample_sel.as_bits()),
            None,
        ]
    };
    store.read_region(node, &start, &count, &masks, &mut data)?;

    let mut dims = vec![
        Dim {
            name: None,
            len: sample_sel.count_selected(),
        },
        Dim {
            name: None,
            len: variant_sel.count_selected(),
        },
    ];
    if rank == 3 {
        dims.insert(
            0,
            Dim {
                name: None,
                len: extents[2],
            },
        );
    }
    Ok(Extracted {
        data,
        dims,
        levels,
        lengths: None,
    })
}

fn read_info(store: &dyn ArrayStore, path: &str, variant_sel: &Selection) -> Result<Extracted> {
    let node = store.require_node(path)?;
    let rank = store.rank(node);
    if rank != 1 && rank != 2 {
        return Err(VarwalkError::invalid_dimension(path));
    }
    let extents = store.extents(node).to_vec();
    let (mut data, levels) = buffer_for(store, node);

    let index = store.find_node(&companion_path(path));
    match index {
        None => {
            // Fixed-length INFO field: a straight variant-masked read.
            if extents[0] != variant_sel.len() {
                return Err(VarwalkError::invalid_dimension(path));
            }
            let start = vec![0u64; rank];
            let masks: Vec<Option<&BitSlice<u64, Lsb0>>> = if rank == 1 {
                vec![Some(variant_sel.as_bits())]
            } else {
                vec![Some(variant_sel.as_bits()), None]
            };
            store.read_region(node, &start, &extents, &masks, &mut data)?;
            Ok(Extracted {
                data,
                dims: Vec::new(),
                levels,
                lengths: None,
            })
        }
        Some(index) => {
            let map = map_index(store, index, Some(variant_sel))?;
            let start: Vec<u64> = match rank {
                1 => vec![map.flat_start],
                _ => vec![map.flat_start, 0],
            };
            let count: Vec<usize> = match rank {
                1 => vec![map.flat_count as usize],
                _ => vec![map.flat_count as usize, extents[1]],
            };
            let masks: Vec<Option<&BitSlice<u64, Lsb0>>> = match rank {
                1 => vec![Some(map.flat_selection.as_bitslice())],
                _ => vec![Some(map.flat_selection.as_bitslice()), None],
            };
            store.read_region(node, &start, &count, &masks, &mut data)?;
            Ok(Extracted {
                data,
                dims: Vec::new(),
                levels,
                lengths: Some(map.lengths),
            })
        }
    }
}

fn read_format(
    store: &dyn ArrayStore,
    path: &str,
    variant_sel: &Selection,
    sample_sel: &Selection,
) -> Result<Extracted> {
    let node = store.require_node(path)?;
    let index_path = companion_path(path);
    let index = store
        .find_node(&index_path)
        .ok_or_else(|| VarwalkError::missing_index(index_path))?;

    let rank = store.rank(node);
    if rank != 2 && rank != 3 {
        return Err(VarwalkError::invalid_dimension(path));
    }
    let extents = store.extents(node).to_vec();

    let map = map_index(store, index, Some(variant_sel))?;
    let (mut data, levels) = buffer_for(store, node);

    let start = {
        let mut s = vec![0u64; rank];
        s[0] = map.flat_start;
        s
    };
    let mut count = vec![map.flat_count as usize];
    count.extend_from_slice(&extents[1..]);
    let masks: Vec<Option<&BitSlice<u64, Lsb0>>> = if rank == 2 {
        vec![
            Some(map.flat_selection.as_bitslice()),
            Some(sample_sel.as_bits()),
        ]
    } else {
        vec![
            Some(map.flat_selection.as_bitslice()),
            Some(sample_sel.as_bits()),
            None,
        ]
    };
    store.read_region(node, &start, &count, &masks, &mut data)?;

    let kept_rows: usize = map.lengths.iter().map(|&l| l as usize).sum();
    let mut dims = vec![
        Dim {
            name: Some("sample"),
            len: sample_sel.count_selected(),
        },
        Dim {
            name: Some("variant"),
            len: kept_rows,
        },
    ];
    if rank == 3 {
        dims.insert(
            0,
            Dim {
                name: None,
                len: extents[2],
            },
        );
    }
    Ok(Extracted {
        data,
        dims,
        levels,
        lengths: Some(map.lengths),
    })
}
