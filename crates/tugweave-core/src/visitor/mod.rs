// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Visitor infrastructure: per-kind enter/exit handler lists.
//!
//! A [`Visitor`] maps node kinds to ordered `enter` and `exit` handler lists.
//! Plugins declare visitors in a looser shape, [`RawVisitor`], which is
//! *exploded* into the canonical form:
//!
//! - a bare handler becomes a single-element `enter` list
//! - a key naming several kinds (`"FunctionDeclaration|FunctionExpression"`)
//!   registers the same handlers under each kind
//! - the reserved catch-all keys `enter` / `exit` are rejected, so every
//!   handler targets specific kinds
//!
//! # Traversal Order
//!
//! - `enter` handlers run before a node's children are walked
//! - `exit` handlers run after all children have been walked
//! - within a kind, handlers run in list order; merged visitors keep the
//!   order of the visitors they were merged from
//!
//! # Example
//!
//! ```
//! use tugweave_core::visitor::{handler, RawVisitor};
//!
//! let raw = RawVisitor::new()
//!     .handler("Identifier", handler(|path, _state| {
//!         path.skip();
//!         Ok(())
//!     }))
//!     .phases("FunctionDeclaration|FunctionExpression", vec![], vec![
//!         handler(|_path, _state| Ok(())),
//!     ]);
//!
//! let visitor = raw.explode().expect("no catch-all handlers");
//! assert_eq!(visitor.get("Identifier").map(|h| h.enter.len()), Some(1));
//! assert_eq!(visitor.get("FunctionExpression").map(|h| h.exit.len()), Some(1));
//! ```

mod explode;

pub use explode::{RawEntry, RawVisitor, CATCH_ALL_KEYS};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TraverseResult;
use crate::plugin::PluginState;
use crate::traverse::Path;

/// A node handler: receives the current path and the owning plugin's state.
pub type Handler =
    Arc<dyn Fn(&mut Path<'_>, &mut PluginState) -> TraverseResult<()> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Path<'_>, &mut PluginState) -> TraverseResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Which handler list of a kind is being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Enter,
    Exit,
}

/// Enter and exit handlers registered for one node kind.
#[derive(Clone, Default)]
pub struct KindHandlers {
    pub enter: Vec<Handler>,
    pub exit: Vec<Handler>,
}

impl KindHandlers {
    /// The handler list for `phase`.
    pub fn phase(&self, phase: Phase) -> &[Handler] {
        match phase {
            Phase::Enter => &self.enter,
            Phase::Exit => &self.exit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enter.is_empty() && self.exit.is_empty()
    }

    fn extend(&mut self, other: &KindHandlers) {
        self.enter.extend(other.enter.iter().cloned());
        self.exit.extend(other.exit.iter().cloned());
    }
}

impl fmt::Debug for KindHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindHandlers")
            .field("enter", &self.enter.len())
            .field("exit", &self.exit.len())
            .finish()
    }
}

/// Canonical visitor: kind → enter/exit handler lists.
///
/// Kinds are kept sorted so iteration order is deterministic.
#[derive(Clone, Default)]
pub struct Visitor {
    kinds: BTreeMap<String, KindHandlers>,
}

impl Visitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append an enter handler for `kind`.
    pub fn on_enter<F>(mut self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Path<'_>, &mut PluginState) -> TraverseResult<()> + Send + Sync + 'static,
    {
        self.add(kind, Phase::Enter, handler(f));
        self
    }

    /// Builder: append an exit handler for `kind`.
    pub fn on_exit<F>(mut self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Path<'_>, &mut PluginState) -> TraverseResult<()> + Send + Sync + 'static,
    {
        self.add(kind, Phase::Exit, handler(f));
        self
    }

    /// Append a handler to the `phase` list of `kind`.
    pub fn add(&mut self, kind: impl Into<String>, phase: Phase, handler: Handler) {
        let entry = self.kinds.entry(kind.into()).or_default();
        match phase {
            Phase::Enter => entry.enter.push(handler),
            Phase::Exit => entry.exit.push(handler),
        }
    }

    /// Handlers registered for `kind`.
    pub fn get(&self, kind: &str) -> Option<&KindHandlers> {
        self.kinds.get(kind)
    }

    /// Kinds with at least one handler, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KindHandlers)> {
        self.kinds
            .iter()
            .map(|(kind, handlers)| (kind.as_str(), handlers))
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(KindHandlers::is_empty)
    }

    /// Total number of handlers across all kinds and phases.
    pub fn handler_count(&self) -> usize {
        self.kinds
            .values()
            .map(|handlers| handlers.enter.len() + handlers.exit.len())
            .sum()
    }

    /// Append every handler of `other` after this visitor's handlers.
    pub fn extend(&mut self, other: &Visitor) {
        for (kind, handlers) in &other.kinds {
            self.kinds.entry(kind.clone()).or_default().extend(handlers);
        }
    }

    /// Merge visitors into one; per kind, handlers keep the order of `visitors`.
    pub fn merge(visitors: &[Visitor]) -> Visitor {
        let mut merged = Visitor::new();
        for visitor in visitors {
            merged.extend(visitor);
        }
        merged
    }
}

impl fmt::Debug for Visitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.kinds.iter()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        handler(|_path, _state| Ok(()))
    }

    #[test]
    fn builder_registers_per_kind_and_phase() {
        let visitor = Visitor::new()
            .on_enter("Identifier", |_p, _s| Ok(()))
            .on_exit("Identifier", |_p, _s| Ok(()))
            .on_enter("CallExpression", |_p, _s| Ok(()));

        assert_eq!(
            visitor.kinds().collect::<Vec<_>>(),
            vec!["CallExpression", "Identifier"]
        );
        assert_eq!(visitor.handler_count(), 3);
        let ident = visitor.get("Identifier").expect("identifier");
        assert_eq!(ident.phase(Phase::Enter).len(), 1);
        assert_eq!(ident.phase(Phase::Exit).len(), 1);
    }

    #[test]
    fn merge_keeps_visitor_order_per_kind() {
        let first = noop();
        let second = noop();

        let mut a = Visitor::new();
        a.add("Identifier", Phase::Enter, first.clone());
        let mut b = Visitor::new();
        b.add("Identifier", Phase::Enter, second.clone());
        b.add("StringLiteral", Phase::Exit, noop());

        let merged = Visitor::merge(&[a, b]);
        let enter = &merged.get("Identifier").expect("identifier").enter;
        assert_eq!(enter.len(), 2);
        assert!(Arc::ptr_eq(&enter[0], &first));
        assert!(Arc::ptr_eq(&enter[1], &second));
        assert_eq!(merged.get("StringLiteral").map(|h| h.exit.len()), Some(1));
    }

    #[test]
    fn empty_visitor() {
        assert!(Visitor::new().is_empty());
        assert_eq!(Visitor::merge(&[]).handler_count(), 0);
    }
}
