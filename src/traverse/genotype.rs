//! # Genotype Cube Decoding
//!
//! A variant's genotype is stored as a stack of per-allele call passes: each
//! pass is one (sample, ploidy) byte slide holding 2-bit codes, and a variant
//! with run length R stacks R passes. Decoding merges the passes into one
//! integer per cell, pass `idx` shifted left by `2 * idx` bits, so up to four
//! calls pack into each pass.
//!
//! A cell whose 2-bit groups are all ones across every pass is the store's
//! missing marker; it decodes to [`MISSING`].

use crate::error::Result;
use crate::select::Selection;
use crate::store::{ArrayStore, NodeId};

/// Decoded value for a cell flagged missing in every call pass
pub const MISSING: i32 = i32::MIN;

/// Decode one variant's genotype cube into `out`, applying the sample
/// selection while copying.
///
/// `flat_offset` and `run_length` come from the attribute's cursor;
/// `n_samples` and `ploidy` are the storage slide's extents. `out` must hold
/// exactly `selected samples * ploidy` cells; `scratch` is a reusable pass
/// buffer grown on demand.
#[allow(clippy::too_many_arguments)]
pub fn read_genotype(
    store: &dyn ArrayStore,
    node: NodeId,
    n_samples: usize,
    ploidy: usize,
    sample_sel: &Selection,
    flat_offset: u64,
    run_length: usize,
    scratch: &mut Vec<u8>,
    out: &mut [i32],
) -> Result<()> {
    let slide = n_samples * ploidy;
    scratch.resize(slide, 0);

    // Primary call pass: straight copy with unselected sample rows skipped.
    store.read_bytes_at(node, flat_offset * slide as u64, slide, scratch)?;
    let mut p = 0;
    for sample in 0..n_samples {
        if sample_sel.get(sample) {
            for cell in 0..ploidy {
                out[p] = scratch[sample * ploidy + cell] as i32;
                p += 1;
            }
        }
    }

    // Remaining passes merge in as higher 2-bit groups.
    let mut missing = 3i32;
    for idx in 1..run_length {
        store.read_bytes_at(
            node,
            (flat_offset + idx as u64) * slide as u64,
            slide,
            scratch,
        )?;
        let shift = 2 * idx as u32;
        let mut p = 0;
        for sample in 0..n_samples {
            if sample_sel.get(sample) {
                for cell in 0..ploidy {
                    out[p] |= (scratch[sample * ploidy + cell] as i32) << shift;
                    p += 1;
                }
            }
        }
        missing = (missing << 2) | 0x03;
    }

    for cell in out.iter_mut() {
        if *cell == missing {
            *cell = MISSING;
        }
    }
    Ok(())
}

/// Sentinel an all-missing cell accumulates across `run_length` passes:
/// one all-ones 2-bit group per pass.
pub fn missing_sentinel(run_length: usize) -> i32 {
    let mut missing = 3i32;
    for _ in 1..run_length {
        missing = (missing << 2) | 0x03;
    }
    missing
}
