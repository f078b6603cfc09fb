//! # Traversal Drivers
//!
//! ## Role
//! Drives one or more attribute sessions across the selected variants in
//! strict lockstep, invoking a caller-supplied closure once per step (or
//! once per window slide interval for the windowed driver in
//! [`window`]).
//!
//! ## Lockstep
//! Every attribute's cursor must agree on which variant is current. Run
//! lengths differ per attribute, but the selected-variant sequence is the
//! same; any disagreement is a programming-logic fault surfaced as
//! [`VarwalkError::LockstepViolation`], never silently recovered.

pub mod window;

use tracing::info_span;

use crate::error::{Result, VarwalkError};
use crate::select::Selections;
use crate::store::ArrayStore;
use crate::traverse::session::{resolve_attribute, AttributeSession};
use crate::traverse::MaterializedBlock;

pub use window::{SlidingWindowBuffer, WindowStep};

/// What the per-step index argument means
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexMode {
    /// No index is passed
    #[default]
    None,
    /// 1-based position among emitted results
    Relative,
    /// 1-based logical variant position in the full, unselected numbering.
    /// For windowed traversals this is the window's first element.
    Absolute,
}

/// One traversal step handed to the callback
pub struct Step<'a> {
    /// Step index per the traversal's [`IndexMode`]; `None` for
    /// [`IndexMode::None`]
    pub index: Option<i64>,
    names: &'a [String],
    blocks: Vec<&'a MaterializedBlock>,
}

impl<'a> Step<'a> {
    /// The single attribute's block (first block for multi-attribute
    /// traversals)
    pub fn block(&self) -> &'a MaterializedBlock {
        self.blocks[0]
    }

    /// Block for a named attribute
    pub fn get(&self, name: &str) -> Option<&'a MaterializedBlock> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.blocks[i])
    }

    /// All blocks, in attribute order
    pub fn blocks(&self) -> &[&'a MaterializedBlock] {
        &self.blocks
    }

    /// Attribute names, in block order
    pub fn names(&self) -> &'a [String] {
        self.names
    }
}

/// A multi-attribute traversal over one store
pub struct Traversal<'s> {
    store: &'s dyn ArrayStore,
    sessions: Vec<AttributeSession>,
    names: Vec<String>,
    n_selected: usize,
}

impl<'s> Traversal<'s> {
    /// Initialize sessions for every named attribute against one shared
    /// pair of selections.
    pub fn new(
        store: &'s dyn ArrayStore,
        attributes: &[&str],
        selections: &Selections,
    ) -> Result<Self> {
        if attributes.is_empty() {
            return Err(VarwalkError::parameter("no attributes named"));
        }
        let variant_sel = selections.resolve_variant(store)?;
        let sample_sel = selections.resolve_sample(store)?;
        let n_selected = variant_sel.count_selected();

        let mut sessions = Vec::with_capacity(attributes.len());
        let mut names = Vec::with_capacity(attributes.len());
        for name in attributes {
            let (class, path) = resolve_attribute(name)?;
            sessions.push(AttributeSession::with_resolved(
                store,
                name,
                class,
                &path,
                variant_sel.clone(),
                sample_sel.clone(),
            )?);
            names.push(name.to_string());
        }

        Ok(Self {
            store,
            sessions,
            names,
            n_selected,
        })
    }

    /// Number of selected variants this traversal will visit
    pub fn n_selected(&self) -> usize {
        self.n_selected
    }

    /// Sessions in attribute order
    pub fn sessions(&self) -> &[AttributeSession] {
        &self.sessions
    }

    /// Attribute names, in session order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Full-numbering position of the variant every cursor stands on
    pub fn current_variant(&self) -> usize {
        self.sessions[0].cursor().current_variant()
    }

    /// Re-position every cursor on the first selected variant
    pub fn reset(&mut self) -> Result<()> {
        for session in &mut self.sessions {
            session.reset(self.store)?;
        }
        Ok(())
    }

    /// Advance every cursor one selected variant, verifying lockstep.
    /// Returns whether a variant remains.
    pub(crate) fn advance_all(&mut self) -> Result<bool> {
        let mut more: Option<bool> = None;
        for session in &mut self.sessions {
            let m = session.advance(self.store)?;
            match more {
                None => more = Some(m),
                Some(prev) if prev != m => {
                    return Err(VarwalkError::lockstep(format!(
                        "'{}' {} while other attributes did not",
                        session.name(),
                        if m { "continued" } else { "exhausted" },
                    )))
                }
                Some(_) => {}
            }
        }
        let more = more.unwrap_or(false);
        if more {
            let cur = self.sessions[0].cursor().current_variant();
            for session in &self.sessions[1..] {
                if session.cursor().current_variant() != cur {
                    return Err(VarwalkError::lockstep(format!(
                        "'{}' stands on variant {} while '{}' stands on {}",
                        self.names[0],
                        cur,
                        session.name(),
                        session.cursor().current_variant(),
                    )));
                }
            }
        }
        Ok(more)
    }

    /// Fill every session's current block
    pub(crate) fn fill_all(&mut self) -> Result<()> {
        for session in &mut self.sessions {
            session.fill_current(self.store)?;
        }
        Ok(())
    }

    /// Borrow every current block, in attribute order
    pub(crate) fn current_blocks(&self) -> Result<Vec<&MaterializedBlock>> {
        self.sessions
            .iter()
            .map(|s| {
                s.current_block().ok_or_else(|| {
                    VarwalkError::lockstep(format!("'{}' has no materialized block", s.name()))
                })
            })
            .collect()
    }

    /// Visit every selected variant, invoking `f` once per step and
    /// collecting its results in emission order.
    pub fn apply<T>(
        &mut self,
        mode: IndexMode,
        mut f: impl FnMut(&Step<'_>) -> T,
    ) -> Result<Vec<T>> {
        if self.n_selected == 0 {
            return Err(VarwalkError::parameter("there is no selected variant"));
        }
        let span = info_span!("apply_by_variant", attributes = self.sessions.len());
        let _guard = span.enter();

        self.reset()?;
        let mut out = Vec::with_capacity(self.n_selected);
        loop {
            self.fill_all()?;
            let index = match mode {
                IndexMode::None => None,
                IndexMode::Relative => Some(out.len() as i64 + 1),
                IndexMode::Absolute => Some(self.current_variant() as i64 + 1),
            };
            let step = Step {
                index,
                names: &self.names,
                blocks: self.current_blocks()?,
            };
            out.push(f(&step));

            if !self.advance_all()? {
                break;
            }
        }
        Ok(out)
    }
}
