//! End-to-end traversal over a synthetic columnar store: multi-attribute
//! lockstep, genotype decoding, windowed application, and whole-selection
//! extraction against one fixture.

use varwalk::{
    read_attribute, IndexMode, MemStore, Selection, Selections, Traversal, VarwalkError, MISSING,
};

// --- Helpers ---

/// Builds a store shaped like a small variant file: positions, genotype
/// call passes, a variable-length INFO field, and a per-sample FORMAT
/// field.
struct SyntheticStoreBuilder {
    n_variants: usize,
    n_samples: usize,
    ploidy: usize,
    /// Call passes per variant
    passes: Vec<i32>,
    /// INFO elements per variant
    info_lengths: Vec<i32>,
}

impl SyntheticStoreBuilder {
    fn new(n_variants: usize, n_samples: usize) -> Self {
        Self {
            n_variants,
            n_samples,
            ploidy: 2,
            passes: vec![1; n_variants],
            info_lengths: (0..n_variants).map(|i| (i % 3) as i32).collect(),
        }
    }

    fn passes(mut self, passes: Vec<i32>) -> Self {
        assert_eq!(passes.len(), self.n_variants);
        self.passes = passes;
        self
    }

    fn info_lengths(mut self, lengths: Vec<i32>) -> Self {
        assert_eq!(lengths.len(), self.n_variants);
        self.info_lengths = lengths;
        self
    }

    fn build(self) -> MemStore {
        let total_passes: usize = self.passes.iter().map(|&p| p.max(0) as usize).sum();
        let slide = self.n_samples * self.ploidy;

        // Pass bytes cycle 0/1/2 so decoded cells are predictable and never
        // hit the all-missing sentinel.
        let geno: Vec<u8> = (0..total_passes * slide).map(|i| (i % 3) as u8).collect();

        let info_total: usize = self.info_lengths.iter().map(|&l| l.max(0) as usize).sum();
        let info: Vec<i32> = (0..info_total as i32).collect();

        // One FORMAT row per call pass, one cell per sample.
        let format: Vec<i32> = (0..(total_passes * self.n_samples) as i32).collect();

        MemStore::builder()
            .ints("variant.id", [self.n_variants], (1..=self.n_variants as i32).collect())
            .strings(
                "sample.id",
                [self.n_samples],
                (0..self.n_samples).map(|i| format!("S{}", i)).collect(),
            )
            .ints(
                "position",
                [self.n_variants],
                (0..self.n_variants as i32).map(|i| 100 + i * 50).collect(),
            )
            .bytes(
                "genotype/data",
                [total_passes, self.n_samples, self.ploidy],
                geno,
            )
            .ints("genotype/@data", [self.n_variants], self.passes.clone())
            .ints("annotation/info/DP", [info_total], info)
            .ints("annotation/info/@DP", [self.n_variants], self.info_lengths.clone())
            .ints(
                "annotation/format/GQ/data",
                [total_passes, self.n_samples],
                format,
            )
            .ints("annotation/format/GQ/@data", [self.n_variants], self.passes)
            .build()
    }
}

fn every_other(n: usize) -> Selections {
    Selections::everything().with_variants(Selection::from_fn(n, |i| i % 2 == 0))
}

// --- Single-variant traversal ---

#[test]
fn scalar_traversal_respects_selection() {
    let store = SyntheticStoreBuilder::new(6, 2).build();
    let mut traversal = Traversal::new(&store, &["position"], &every_other(6)).unwrap();

    let positions = traversal
        .apply(IndexMode::Absolute, |step| {
            (
                step.index.unwrap(),
                step.block().data.as_ints().unwrap()[0],
            )
        })
        .unwrap();

    assert_eq!(positions, vec![(1, 100), (3, 200), (5, 300)]);
}

#[test]
fn multi_attribute_blocks_stay_in_lockstep() {
    let store = SyntheticStoreBuilder::new(5, 2)
        .passes(vec![1, 2, 1, 3, 1])
        .info_lengths(vec![2, 0, 1, 2, 1])
        .build();
    let mut traversal = Traversal::new(
        &store,
        &["position", "genotype", "annotation/info/DP", "annotation/format/GQ"],
        &Selections::everything(),
    )
    .unwrap();

    let mut steps = 0usize;
    traversal
        .apply(IndexMode::Relative, |step| {
            steps += 1;
            assert_eq!(step.index.unwrap() as usize, steps);

            // The genotype block always spans samples x ploidy.
            let geno = step.get("genotype").unwrap();
            assert_eq!(geno.data.len(), 4);

            // INFO and FORMAT blocks scale with their own run lengths.
            let info = step.get("annotation/info/DP").unwrap();
            let gq = step.get("annotation/format/GQ").unwrap();
            assert_eq!(info.data.len(), info.run_length);
            assert_eq!(gq.data.len(), 2 * gq.run_length);
        })
        .unwrap();
    assert_eq!(steps, 5);
}

#[test]
fn format_blocks_follow_flat_offsets() {
    let store = SyntheticStoreBuilder::new(4, 2)
        .passes(vec![2, 1, 2, 1])
        .build();
    let sel =
        Selections::everything().with_variants(Selection::from_flags(&[false, true, false, true]));
    let mut traversal = Traversal::new(&store, &["annotation/format/GQ"], &sel).unwrap();

    let rows = traversal
        .apply(IndexMode::None, |step| step.block().data.as_ints().unwrap().to_vec())
        .unwrap();

    // Rows are numbered consecutively across all passes; variant 1 owns
    // row 2, variant 3 owns row 5.
    assert_eq!(rows, vec![vec![4, 5], vec![10, 11]]);
}

#[test]
fn zero_length_runs_emit_empty_blocks() {
    let store = SyntheticStoreBuilder::new(3, 2)
        .info_lengths(vec![2, 0, 1])
        .build();
    let mut traversal =
        Traversal::new(&store, &["annotation/info/DP"], &Selections::everything()).unwrap();

    let sizes = traversal
        .apply(IndexMode::None, |step| step.block().data.len())
        .unwrap();
    assert_eq!(sizes, vec![2, 0, 1]);
}

// --- Genotype decoding ---

#[test]
fn genotype_traversal_decodes_multi_pass_variants() {
    let store = SyntheticStoreBuilder::new(3, 2).passes(vec![1, 2, 1]).build();
    let mut traversal =
        Traversal::new(&store, &["genotype"], &Selections::everything()).unwrap();

    let cubes = traversal
        .apply(IndexMode::None, |step| {
            let block = step.block();
            assert_eq!(block.dims.len(), 2);
            assert_eq!(block.dims[0].name, Some("allele"));
            assert_eq!(block.dims[1].name, Some("sample"));
            block.data.as_ints().unwrap().to_vec()
        })
        .unwrap();

    // Pass bytes cycle 0,1,2: variant 0 is pass 0, variant 1 merges passes
    // 1 and 2, variant 2 is pass 3.
    assert_eq!(cubes[0], vec![0, 1, 2, 0]);
    let pass1 = [1, 2, 0, 1];
    let pass2 = [2, 0, 1, 2];
    let merged: Vec<i32> = pass1
        .iter()
        .zip(pass2.iter())
        .map(|(a, b)| a | (b << 2))
        .collect();
    assert_eq!(cubes[1], merged);
}

#[test]
fn genotype_missing_cells_decode_to_absent() {
    // One variant, one pass, every byte 3 (the single-pass missing code).
    let store = MemStore::builder()
        .ints("variant.id", [1], vec![1])
        .strings("sample.id", [2], vec!["S0".into(), "S1".into()])
        .bytes("genotype/data", [1, 2, 2], vec![3, 3, 0, 1])
        .ints("genotype/@data", [1], vec![1])
        .build();
    let mut traversal =
        Traversal::new(&store, &["genotype"], &Selections::everything()).unwrap();
    let cube = traversal
        .apply(IndexMode::None, |step| step.block().data.as_ints().unwrap().to_vec())
        .unwrap();
    assert_eq!(cube[0], vec![MISSING, MISSING, 0, 1]);
}

#[test]
fn genotype_sample_selection_drops_rows() {
    let store = SyntheticStoreBuilder::new(2, 3).build();
    let sel = Selections::everything()
        .with_samples(Selection::from_flags(&[true, false, true]));
    let mut traversal = Traversal::new(&store, &["genotype"], &sel).unwrap();
    let cubes = traversal
        .apply(IndexMode::None, |step| step.block().data.len())
        .unwrap();
    // 2 selected samples x ploidy 2
    assert_eq!(cubes, vec![4, 4]);
}

// --- Windowed traversal ---

#[test]
fn windowed_traversal_matches_expected_firings() {
    let store = SyntheticStoreBuilder::new(10, 1).build();
    let mut traversal =
        Traversal::new(&store, &["position"], &Selections::everything()).unwrap();

    let windows = traversal
        .apply_window(3, 2, IndexMode::Relative, |step| {
            let first = step.block(0).data.as_ints().unwrap()[0];
            let last = step.block(step.len() - 1).data.as_ints().unwrap()[0];
            (step.index.unwrap(), first, last)
        })
        .unwrap();

    assert_eq!(
        windows,
        vec![
            (1, 100, 200),
            (2, 200, 300),
            (3, 300, 400),
            (4, 400, 500),
        ]
    );
}

#[test]
fn windowed_traversal_carries_every_attribute() {
    let store = SyntheticStoreBuilder::new(6, 2)
        .passes(vec![1, 2, 1, 1, 2, 1])
        .build();
    let mut traversal = Traversal::new(
        &store,
        &["position", "genotype"],
        &Selections::everything(),
    )
    .unwrap();

    let windows = traversal
        .apply_window(2, 1, IndexMode::None, |step| {
            let pos = step.get(0, "position").unwrap().data.as_ints().unwrap()[0];
            let geno_cells = step.get(0, "genotype").unwrap().data.len();
            (pos, geno_cells)
        })
        .unwrap();

    assert_eq!(windows.len(), 5);
    assert_eq!(windows[0], (100, 4));
    assert_eq!(windows[4], (300, 4));
}

#[test]
fn window_size_larger_than_selection_is_rejected() {
    let store = SyntheticStoreBuilder::new(4, 1).build();
    let sel = every_other(4); // 2 selected variants
    let mut traversal = Traversal::new(&store, &["position"], &sel).unwrap();
    assert!(matches!(
        traversal.apply_window(3, 1, IndexMode::None, |_| ()),
        Err(VarwalkError::InvalidParameter { .. })
    ));
}

// --- Error surfaces ---

#[test]
fn missing_genotype_index_fails_before_any_read() {
    let store = MemStore::builder()
        .ints("variant.id", [2], vec![1, 2])
        .strings("sample.id", [1], vec!["S0".into()])
        .bytes("genotype/data", [2, 1, 2], vec![0; 4])
        .build();
    match Traversal::new(&store, &["genotype"], &Selections::everything()) {
        Err(VarwalkError::MissingCompanionIndex { path }) => {
            assert_eq!(path, "genotype/@data");
        }
        other => panic!("expected MissingCompanionIndex, got {:?}", other.err()),
    }
}

#[test]
fn selection_length_mismatch_is_fatal() {
    let store = SyntheticStoreBuilder::new(4, 2).build();
    let sel = Selections::everything().with_variants(Selection::all(5));
    assert!(matches!(
        Traversal::new(&store, &["position"], &sel),
        Err(VarwalkError::SelectionSizeMismatch { .. })
    ));
}

// --- Whole-selection extraction ---

#[test]
fn extraction_agrees_with_traversal() {
    let store = SyntheticStoreBuilder::new(6, 2)
        .info_lengths(vec![1, 2, 0, 1, 2, 1])
        .build();
    let sel = every_other(6);

    let extracted = read_attribute(&store, "annotation/info/DP", &sel).unwrap();
    assert_eq!(extracted.lengths, Some(vec![1, 0, 2]));

    let mut traversal = Traversal::new(&store, &["annotation/info/DP"], &sel).unwrap();
    let stepped: Vec<i32> = traversal
        .apply(IndexMode::None, |step| {
            step.block().data.as_ints().unwrap().to_vec()
        })
        .unwrap()
        .into_iter()
        .flatten()
        .collect();

    assert_eq!(extracted.data.as_ints().unwrap(), stepped.as_slice());
}

#[test]
fn extracted_genotype_cube_spans_selected_variants() {
    let store = SyntheticStoreBuilder::new(4, 2).passes(vec![1, 1, 2, 1]).build();
    let sel = Selections::everything()
        .with_variants(Selection::from_flags(&[true, false, true, false]));
    let out = read_attribute(&store, "genotype", &sel).unwrap();
    assert_eq!(out.dims[2].len, 2);
    assert_eq!(out.data.len(), 8);
}
