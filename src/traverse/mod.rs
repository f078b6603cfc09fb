//! # Traversal Core
//!
//! ## Role
//! Per-attribute iteration machinery: shape validation, cursor advancement,
//! genotype decoding, and block materialization.
//!
//! ## Sub-modules
//! - `descriptor`: shape classes and validated attribute descriptors
//! - `cursor`: the per-attribute variant cursor
//! - `genotype`: call-pass decoding into integer cubes
//! - `block`: materialized blocks and the run-length shape cache
//! - `session`: one attribute's descriptor + cursor + cache, the unit the
//!   drivers advance in lockstep

pub mod block;
pub mod cursor;
pub mod descriptor;
pub mod genotype;
pub mod session;

pub use block::{BlockCache, MaterializedBlock};
pub use cursor::VariantCursor;
pub use descriptor::{AttrShape, AttributeDescriptor, Dim, LogicalKind, ShapeClass};
pub use genotype::{missing_sentinel, read_genotype, MISSING};
pub use session::{resolve_attribute, AttributeSession};
