// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The depth-first walker.
//!
//! A [`Dispatch`] table flattens every visitor of a pass into per-kind handler
//! lists tagged with the index of the plugin that owns them, so one walk
//! drives all plugins of the pass. The [`Walker`] visits nodes in child-field
//! order and applies the signals each handler leaves on its [`Path`].
//!
//! # List Bookkeeping
//!
//! Handlers can grow or shrink the list that holds the node being visited.
//! Each visited slot reports how many list positions it finished, and the
//! region of nodes inserted before the current node is walked by tracking
//! the current node's index as the list changes under it.

use std::collections::HashMap;

use tracing::trace;

use super::path::{Ancestor, Path, Position, Signals};
use super::SharedState;
use crate::error::TraverseResult;
use crate::kinds::KindTable;
use crate::node::{Field, Node};
use crate::plugin::{Pass, PluginState};
use crate::visitor::{Handler, Phase, Visitor};

// ============================================================================
// Dispatch
// ============================================================================

#[derive(Default)]
struct DispatchEntry {
    enter: Vec<(usize, Handler)>,
    exit: Vec<(usize, Handler)>,
}

/// Per-kind handler lists for one walk; each handler carries the index of the
/// plugin state it receives.
#[derive(Default)]
pub(crate) struct Dispatch {
    kinds: HashMap<String, DispatchEntry>,
}

impl Dispatch {
    /// Combine the visitors of a pass; per kind, handlers keep pass order.
    pub(crate) fn for_pass(pass: &Pass) -> Self {
        let mut dispatch = Self::default();
        for (index, item) in pass.iter().enumerate() {
            dispatch.add_visitor(index, item.plugin.visitor());
        }
        dispatch
    }

    /// A single visitor whose handlers all receive state index 0.
    pub(crate) fn for_visitor(visitor: &Visitor) -> Self {
        let mut dispatch = Self::default();
        dispatch.add_visitor(0, visitor);
        dispatch
    }

    fn add_visitor(&mut self, index: usize, visitor: &Visitor) {
        for (kind, handlers) in visitor.iter() {
            let entry = self.kinds.entry(kind.to_string()).or_default();
            entry
                .enter
                .extend(handlers.enter.iter().map(|h| (index, h.clone())));
            entry
                .exit
                .extend(handlers.exit.iter().map(|h| (index, h.clone())));
        }
    }

    fn handlers(&self, kind: &str, phase: Phase) -> &[(usize, Handler)] {
        match self.kinds.get(kind) {
            Some(entry) => match phase {
                Phase::Enter => &entry.enter,
                Phase::Exit => &entry.exit,
            },
            None => &[],
        }
    }
}

// ============================================================================
// Walk context
// ============================================================================

/// Mutable state threaded through a walk.
pub(crate) struct Cx<'c> {
    shared: &'c mut SharedState,
    states: &'c mut [PluginState],
    ancestors: Vec<Ancestor>,
}

impl<'c> Cx<'c> {
    pub(crate) fn new(
        shared: &'c mut SharedState,
        states: &'c mut [PluginState],
        ancestors: Vec<Ancestor>,
    ) -> Self {
        Self {
            shared,
            states,
            ancestors,
        }
    }
}

/// Whether the walk continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// What happened after a phase's handlers ran.
enum Call {
    Done,
    Stop,
    Removed,
    Replaced,
}

/// What a visited node asks of its container.
struct Outcome {
    flow: Flow,
    removed: bool,
    before: Vec<Node>,
    after: Vec<Node>,
}

impl Outcome {
    /// Edits queued on the path are applied even when the walk stops.
    fn finish(flow: Flow, signals: Signals) -> Self {
        Self {
            flow,
            removed: signals.removed,
            before: signals.before,
            after: signals.after,
        }
    }
}

// ============================================================================
// Walker
// ============================================================================

pub(crate) struct Walker<'w> {
    dispatch: &'w Dispatch,
    kinds: &'w KindTable,
}

impl<'w> Walker<'w> {
    pub(crate) fn new(dispatch: &'w Dispatch, kinds: &'w KindTable) -> Self {
        Self { dispatch, kinds }
    }

    /// Visit the root of a walk.
    pub(crate) fn walk_root(&self, root: &mut Node, cx: &mut Cx<'_>) -> TraverseResult<Flow> {
        let outcome = self.visit(root, cx, &Position::root())?;
        Ok(outcome.flow)
    }

    /// Visit `node`: enter handlers, children, exit handlers.
    fn visit(
        &self,
        node: &mut Node,
        cx: &mut Cx<'_>,
        position: &Position,
    ) -> TraverseResult<Outcome> {
        let mut signals = Signals::default();

        loop {
            signals.skip = false;

            match self.call(Phase::Enter, node, cx, position, &mut signals)? {
                Call::Stop => return Ok(Outcome::finish(Flow::Stop, signals)),
                Call::Removed => return Ok(Outcome::finish(Flow::Continue, signals)),
                Call::Replaced => {
                    trace!(kind = %node.kind, "requeue after enter");
                    continue;
                }
                Call::Done => {}
            }

            if !signals.skip && self.walk_children(node, cx, position)? == Flow::Stop {
                return Ok(Outcome::finish(Flow::Stop, signals));
            }

            match self.call(Phase::Exit, node, cx, position, &mut signals)? {
                Call::Stop => return Ok(Outcome::finish(Flow::Stop, signals)),
                Call::Removed => return Ok(Outcome::finish(Flow::Continue, signals)),
                Call::Replaced => {
                    trace!(kind = %node.kind, "requeue after exit");
                    continue;
                }
                Call::Done => return Ok(Outcome::finish(Flow::Continue, signals)),
            }
        }
    }

    /// Run the handlers of one phase for `node`.
    fn call(
        &self,
        phase: Phase,
        node: &mut Node,
        cx: &mut Cx<'_>,
        position: &Position,
        signals: &mut Signals,
    ) -> TraverseResult<Call> {
        let kind = node.kind.clone();
        for (index, handler) in self.dispatch.handlers(&kind, phase) {
            let state = &mut cx.states[*index];
            let mut path = Path::new(
                node,
                &mut *cx.shared,
                self.kinds,
                position,
                &cx.ancestors,
                signals,
            );
            handler(&mut path, state)?;

            if signals.stop {
                return Ok(Call::Stop);
            }
            if signals.removed {
                return Ok(Call::Removed);
            }
            if signals.replaced || node.kind != kind {
                signals.replaced = false;
                return Ok(Call::Replaced);
            }
        }
        Ok(Call::Done)
    }

    /// Walk the children of `node`, which sits at `position`.
    pub(crate) fn walk_children(
        &self,
        node: &mut Node,
        cx: &mut Cx<'_>,
        position: &Position,
    ) -> TraverseResult<Flow> {
        let Some(fields) = self.kinds.child_fields(&node.kind).cloned() else {
            return Ok(Flow::Continue);
        };

        cx.ancestors.push(Ancestor {
            kind: node.kind.clone(),
            position: position.clone(),
        });
        let flow = self.walk_fields(node, &fields, cx);
        cx.ancestors.pop();
        flow
    }

    fn walk_fields(
        &self,
        node: &mut Node,
        fields: &[String],
        cx: &mut Cx<'_>,
    ) -> TraverseResult<Flow> {
        for name in fields {
            let (flow, clear) = match node.fields.get_mut(name.as_str()) {
                Some(Field::Node(child)) => {
                    let outcome = self.visit(child, cx, &Position::field(name))?;
                    (outcome.flow, outcome.removed)
                }
                Some(Field::List(list)) => (self.walk_list(list, name, cx)?, false),
                _ => (Flow::Continue, false),
            };
            if clear {
                node.fields.insert(name.clone(), Field::Null);
            }
            if flow == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn walk_list(&self, list: &mut Vec<Node>, key: &str, cx: &mut Cx<'_>) -> TraverseResult<Flow> {
        let mut index = 0;
        while index < list.len() {
            match self.visit_slot(list, index, key, cx)? {
                (Flow::Stop, _) => return Ok(Flow::Stop),
                (Flow::Continue, done) => index += done,
            }
        }
        Ok(Flow::Continue)
    }

    /// Visit `list[index]`, apply its container edits, and walk any nodes it
    /// inserted before itself. Returns how many positions starting at `index`
    /// are finished; nodes inserted after it are left for the caller.
    fn visit_slot(
        &self,
        list: &mut Vec<Node>,
        index: usize,
        key: &str,
        cx: &mut Cx<'_>,
    ) -> TraverseResult<(Flow, usize)> {
        let outcome = self.visit(&mut list[index], cx, &Position::list(key, index))?;
        let Outcome {
            flow,
            removed,
            before,
            after,
        } = outcome;

        let own = if removed {
            list.remove(index);
            0
        } else {
            1
        };
        let after_at = index + own;
        list.splice(after_at..after_at, after);
        let inserted_before = before.len();
        list.splice(index..index, before);

        if flow == Flow::Stop {
            return Ok((Flow::Stop, 0));
        }

        let mut current = index + inserted_before;
        let mut cursor = index;
        while cursor < current {
            let len = list.len();
            match self.visit_slot(list, cursor, key, cx)? {
                (Flow::Stop, _) => return Ok((Flow::Stop, 0)),
                (Flow::Continue, done) => cursor += done,
            }
            if list.len() >= len {
                current += list.len() - len;
            } else {
                current -= len - list.len();
            }
        }

        Ok((Flow::Continue, current - index + own))
    }
}
