// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Running passes over a tree.
//!
//! [`run`] executes one [`Pass`]:
//!
//! 1. install the kind aliases requested by [`SharedState`]
//! 2. run every plugin's `pre` hooks, in pass order
//! 3. walk the tree once, dispatching each node to the handlers of every
//!    plugin in the pass (plugin order within each kind and phase)
//! 4. run every plugin's `post` hooks, in pass order
//!
//! The aliases are removed when `run` returns, whether it succeeds, fails or
//! unwinds. A handler or hook error aborts the pass and is returned as is.
//! A `stop` ends the walk early but `post` hooks still run.
//!
//! [`traverse`] is the single-visitor form used by plugins that need an
//! ad-hoc walk outside of a pass.

mod path;
mod walk;

pub use path::{Ancestor, Container, Path, Position};

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TraverseResult;
use crate::kinds::{self, KindAlias};
use crate::node::Node;
use crate::plugin::{Pass, PluginState};
use crate::visitor::Visitor;
use walk::{Cx, Dispatch, Flow, Walker};

// ============================================================================
// Scope analysis
// ============================================================================

/// Binding queries supplied by the host; the engine never analyzes scopes
/// itself.
pub trait ScopeAnalyzer {
    /// An identifier name derived from `hint` that collides with no binding.
    fn generate_uid(&mut self, hint: &str) -> String;

    fn has_binding(&self, name: &str) -> bool;

    /// Rename a binding and all of its references.
    fn rename_binding(&mut self, from: &str, to: &str);

    /// Declare a variable in the enclosing function or program scope.
    fn push_declaration(&mut self, kind: &str, id: &str, init: Option<Node>);
}

// ============================================================================
// SharedState
// ============================================================================

/// State shared by every plugin for the duration of a run.
#[derive(Default)]
pub struct SharedState {
    /// Name of the file being transformed, for diagnostics.
    pub filename: Option<String>,
    /// Free-form results plugins want to hand back to the host.
    pub metadata: Map<String, Value>,
    scope: Option<Box<dyn ScopeAnalyzer>>,
    kind_aliases: Vec<KindAlias>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_scope(mut self, scope: Box<dyn ScopeAnalyzer>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Kind aliases installed for the duration of each run.
    pub fn with_kind_aliases(mut self, aliases: Vec<KindAlias>) -> Self {
        self.kind_aliases = aliases;
        self
    }

    pub fn kind_aliases(&self) -> &[KindAlias] {
        &self.kind_aliases
    }

    pub fn scope(&mut self) -> Option<&mut (dyn ScopeAnalyzer + 'static)> {
        self.scope.as_deref_mut()
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("filename", &self.filename)
            .field("metadata", &self.metadata)
            .field("scope", &self.scope.is_some())
            .field("kind_aliases", &self.kind_aliases)
            .finish()
    }
}

// ============================================================================
// Running passes
// ============================================================================

/// Result of a completed pass.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// True when a handler stopped the walk early.
    pub stopped: bool,
    /// Final state of each plugin, in pass order.
    pub states: Vec<PluginState>,
}

/// Run one pass over `tree`.
pub fn run(pass: &Pass, tree: &mut Node, shared: &mut SharedState) -> TraverseResult<RunSummary> {
    let _aliases = kinds::install(shared.kind_aliases())?;
    let table = kinds::snapshot();

    let mut states: Vec<PluginState> = pass
        .iter()
        .map(|item| PluginState::new(item.plugin.key(), item.options.clone()))
        .collect();

    debug!(plugins = pass.len(), root = %tree.kind, "running pass");

    for (item, state) in pass.iter().zip(states.iter_mut()) {
        item.plugin.run_pre(state, shared)?;
    }

    let dispatch = Dispatch::for_pass(pass);
    let walker = Walker::new(&dispatch, &table);
    let flow = {
        let mut cx = Cx::new(shared, &mut states, Vec::new());
        walker.walk_root(tree, &mut cx)?
    };
    let stopped = flow == Flow::Stop;
    if stopped {
        debug!("walk stopped early");
    }

    for (item, state) in pass.iter().zip(states.iter_mut()) {
        item.plugin.run_post(state, shared)?;
    }

    Ok(RunSummary { stopped, states })
}

/// Walk the descendants of `root` with a single visitor.
///
/// `root` itself is not visited, matching [`Path::traverse`]. Kind aliases
/// from `shared` are installed for the duration of the walk. Returns `true`
/// when a handler stopped the walk.
pub fn traverse(
    root: &mut Node,
    visitor: &Visitor,
    state: &mut PluginState,
    shared: &mut SharedState,
) -> TraverseResult<bool> {
    let _aliases = kinds::install(shared.kind_aliases())?;
    let table = kinds::snapshot();
    let dispatch = Dispatch::for_visitor(visitor);
    let walker = Walker::new(&dispatch, &table);
    let mut cx = Cx::new(shared, std::slice::from_mut(state), Vec::new());
    let flow = walker.walk_children(root, &mut cx, &Position::root())?;
    Ok(flow == Flow::Stop)
}

// ============================================================================
// Tests
// ============================================================================
