// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The handle a handler receives for the node it is visiting.
//!
//! A [`Path`] borrows the current node mutably and records structural edits
//! (skip, stop, remove, replace, sibling insertion) as signals. The walker
//! applies those signals after the handler returns, so a handler never has to
//! touch its parent's containers directly.

use tracing::trace;

use super::walk::{Cx, Dispatch, Walker};
use super::{ScopeAnalyzer, SharedState};
use crate::error::{TraverseError, TraverseResult};
use crate::kinds::KindTable;
use crate::node::{Field, Node};
use crate::plugin::PluginState;
use crate::visitor::Visitor;

// ============================================================================
// Position
// ============================================================================

/// What holds the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// The node is the root of the walk.
    Root,
    /// A single-node field of the parent.
    Field,
    /// An element of a list field of the parent.
    List,
}

/// Where a node sits inside its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub key: Option<String>,
    pub index: Option<usize>,
    pub container: Container,
}

impl Position {
    pub fn root() -> Self {
        Self {
            key: None,
            index: None,
            container: Container::Root,
        }
    }

    pub fn field(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            index: None,
            container: Container::Field,
        }
    }

    pub fn list(key: &str, index: usize) -> Self {
        Self {
            key: Some(key.to_string()),
            index: Some(index),
            container: Container::List,
        }
    }
}

/// An enclosing node on the way from the root to the current node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub kind: String,
    pub position: Position,
}

// ============================================================================
// Signals
// ============================================================================

/// Edits requested by handlers, applied by the walker.
#[derive(Debug, Default)]
pub(crate) struct Signals {
    pub(crate) skip: bool,
    pub(crate) stop: bool,
    pub(crate) removed: bool,
    pub(crate) replaced: bool,
    pub(crate) before: Vec<Node>,
    pub(crate) after: Vec<Node>,
}

// ============================================================================
// Path
// ============================================================================

/// A handler's view of the node being visited.
pub struct Path<'a> {
    node: &'a mut Node,
    shared: &'a mut SharedState,
    kinds: &'a KindTable,
    position: &'a Position,
    ancestors: &'a [Ancestor],
    signals: &'a mut Signals,
}

impl<'a> Path<'a> {
    pub(crate) fn new(
        node: &'a mut Node,
        shared: &'a mut SharedState,
        kinds: &'a KindTable,
        position: &'a Position,
        ancestors: &'a [Ancestor],
        signals: &'a mut Signals,
    ) -> Self {
        Self {
            node,
            shared,
            kinds,
            position,
            ancestors,
            signals,
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn node(&self) -> &Node {
        self.node
    }

    /// Mutable access to the current node.
    ///
    /// Changing `kind` in place counts as a replacement: the node is visited
    /// again from `enter` under its new kind.
    pub fn node_mut(&mut self) -> &mut Node {
        self.node
    }

    pub fn kind(&self) -> &str {
        &self.node.kind
    }

    pub fn is(&self, kind: &str) -> bool {
        self.node.is(kind)
    }

    pub fn get(&self, field: &str) -> Option<&Field> {
        self.node.field(field)
    }

    pub fn child(&self, field: &str) -> Option<&Node> {
        self.node.child(field)
    }

    /// Child nodes in walk order, as given by the kind table.
    pub fn children(&self) -> Vec<&Node> {
        let Some(fields) = self.kinds.child_fields(&self.node.kind) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for name in fields.iter() {
            match self.node.field(name) {
                Some(Field::Node(child)) => children.push(child.as_ref()),
                Some(Field::List(list)) => children.extend(list.iter()),
                _ => {}
            }
        }
        children
    }

    /// Field name in the parent that holds this node.
    pub fn key(&self) -> Option<&str> {
        self.position.key.as_deref()
    }

    /// Index within the parent's list, when the container is a list.
    pub fn index(&self) -> Option<usize> {
        self.position.index
    }

    pub fn container(&self) -> Container {
        self.position.container
    }

    pub fn position(&self) -> &Position {
        self.position
    }

    pub fn parent_kind(&self) -> Option<&str> {
        self.ancestors.last().map(|ancestor| ancestor.kind.as_str())
    }

    /// Enclosing nodes, outermost first.
    pub fn ancestors(&self) -> &[Ancestor] {
        self.ancestors
    }

    /// Nearest enclosing node of `kind`.
    pub fn find_ancestor(&self, kind: &str) -> Option<&Ancestor> {
        self.ancestors
            .iter()
            .rev()
            .find(|ancestor| ancestor.kind == kind)
    }

    /// Number of enclosing nodes.
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn kinds(&self) -> &KindTable {
        self.kinds
    }

    pub fn is_removed(&self) -> bool {
        self.signals.removed
    }

    pub fn is_skipped(&self) -> bool {
        self.signals.skip
    }

    pub fn is_stopped(&self) -> bool {
        self.signals.stop
    }

    // ------------------------------------------------------------------------
    // Shared state
    // ------------------------------------------------------------------------

    pub fn shared(&mut self) -> &mut SharedState {
        self.shared
    }

    pub fn filename(&self) -> Option<&str> {
        self.shared.filename.as_deref()
    }

    /// The host's scope analyzer, when one was supplied.
    pub fn scope(&mut self) -> Option<&mut (dyn ScopeAnalyzer + 'static)> {
        self.shared.scope()
    }

    /// An identifier name unused in the current scope, derived from `hint`.
    ///
    /// Without a scope analyzer the hint is prefixed with `_` unchanged.
    pub fn generate_uid(&mut self, hint: &str) -> String {
        match self.shared.scope() {
            Some(scope) => scope.generate_uid(hint),
            None => format!("_{}", hint.trim_start_matches('_')),
        }
    }

    // ------------------------------------------------------------------------
    // Flow control
    // ------------------------------------------------------------------------

    /// Do not walk this node's children. Remaining handlers and `exit` still run.
    pub fn skip(&mut self) {
        self.signals.skip = true;
    }

    /// End the whole walk after this handler returns.
    pub fn stop(&mut self) {
        trace!(kind = %self.node.kind, "stop requested");
        self.signals.stop = true;
    }

    // ------------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------------

    /// Replace the current node; the replacement is visited from `enter`.
    pub fn replace_with(&mut self, node: Node) {
        *self.node = node;
        self.signals.replaced = true;
    }

    /// Replace the current node with a sequence of nodes.
    ///
    /// An empty sequence removes the node. More than one node requires a list
    /// container: the first replaces the current node and the rest are
    /// inserted right after it.
    pub fn replace_with_multiple(&mut self, nodes: Vec<Node>) -> TraverseResult<()> {
        let mut nodes = nodes.into_iter();
        let Some(first) = nodes.next() else {
            return self.remove();
        };
        let rest: Vec<Node> = nodes.collect();
        if !rest.is_empty() {
            self.require_list()?;
            self.signals.after.splice(0..0, rest);
        }
        self.replace_with(first);
        Ok(())
    }

    /// Remove the current node from its parent.
    ///
    /// No further handlers run for it and its children are not walked. A list
    /// element is spliced out; a field is set to null. The root of a walk
    /// cannot be removed.
    pub fn remove(&mut self) -> TraverseResult<()> {
        if self.position.container == Container::Root {
            return Err(TraverseError::RemoveRoot {
                kind: self.node.kind.clone(),
            });
        }
        trace!(kind = %self.node.kind, key = ?self.position.key, "node removed");
        self.signals.removed = true;
        Ok(())
    }

    /// Insert siblings immediately before the current node.
    ///
    /// They are walked before the walk moves past the current node.
    pub fn insert_before(&mut self, nodes: Vec<Node>) -> TraverseResult<()> {
        self.require_list()?;
        self.signals.before.extend(nodes);
        Ok(())
    }

    /// Insert siblings immediately after the current node.
    ///
    /// They are walked in normal order once the current node is done.
    pub fn insert_after(&mut self, nodes: Vec<Node>) -> TraverseResult<()> {
        self.require_list()?;
        self.signals.after.splice(0..0, nodes);
        Ok(())
    }

    fn require_list(&self) -> TraverseResult<()> {
        if self.position.container == Container::List {
            return Ok(());
        }
        Err(TraverseError::NotInList {
            kind: self.node.kind.clone(),
            key: self
                .position
                .key
                .clone()
                .unwrap_or_else(|| "<root>".to_string()),
        })
    }

    // ------------------------------------------------------------------------
    // Nested traversal
    // ------------------------------------------------------------------------

    /// Walk the current node's descendants with another visitor and state.
    ///
    /// The nested walk has its own flow signals: `stop` inside it ends only
    /// the nested walk.
    pub fn traverse(&mut self, visitor: &Visitor, state: &mut PluginState) -> TraverseResult<()> {
        let dispatch = Dispatch::for_visitor(visitor);
        let walker = Walker::new(&dispatch, self.kinds);
        let mut cx = Cx::new(
            &mut *self.shared,
            std::slice::from_mut(state),
            self.ancestors.to_vec(),
        );
        walker.walk_children(self.node, &mut cx, self.position)?;
        Ok(())
    }
}
