//! # Varwalk Library Root
//!
//! ## Role
//! Variant-by-variant traversal and block materialization over a columnar
//! genomic store. A store holds fixed-length attributes (one cell per
//! variant) and variable-length attributes (a flat data array plus a
//! companion length-index array recording how many elements each variant
//! owns). Varwalk turns a boolean variant selection and a boolean sample
//! selection into a stream of correctly shaped in-memory blocks, one
//! variant or one sliding window at a time, without ever materializing a
//! whole attribute.
//!
//! ## Module Structure
//! ```text
//! varwalk
//! ├── store     # Backing-store interface + in-memory backend
//! ├── select    # Boolean selections and length-index mapping
//! ├── traverse  # Descriptors, cursors, genotype decoding, blocks
//! ├── apply     # Per-variant and sliding-window drivers
//! └── extract   # Whole-selection one-shot materialization
//! ```
//!
//! ## Example
//! ```
//! use varwalk::{IndexMode, MemStore, Selections, Traversal};
//!
//! let store = MemStore::builder()
//!     .ints("variant.id", [3], vec![1, 2, 3])
//!     .strings("sample.id", [1], vec!["S1".to_string()])
//!     .ints("position", [3], vec![100, 200, 300])
//!     .build();
//!
//! let mut traversal =
//!     Traversal::new(&store, &["position"], &Selections::everything()).unwrap();
//! let positions = traversal
//!     .apply(IndexMode::None, |step| step.block().data.as_ints().unwrap()[0])
//!     .unwrap();
//! assert_eq!(positions, vec![100, 200, 300]);
//! ```

pub mod apply;
pub mod error;
pub mod extract;
pub mod select;
pub mod store;
pub mod traverse;

// Re-export commonly used types
pub use apply::{IndexMode, SlidingWindowBuffer, Step, Traversal, WindowStep};
pub use error::{Result, VarwalkError};
pub use extract::{read_attribute, Extracted};
pub use select::{map_index, IndexMap, Selection, Selections};
pub use store::{ArrayData, ArrayStore, MemStore, MemStoreBuilder, NodeId, ValueKind};
pub use traverse::{
    AttributeDescriptor, AttributeSession, Dim, LogicalKind, MaterializedBlock, ShapeClass,
    VariantCursor, MISSING,
};
