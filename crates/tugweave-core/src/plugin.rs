// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Resolved plugins, per-plugin run state, and passes.
//!
//! A [`Plugin`] is the immutable, validated form of a plugin declaration: an
//! exploded [`Visitor`] plus optional `pre`/`post` hooks and option hooks.
//! Plugins are shared through `Arc` so the same instance can appear in many
//! passes and many resolved configurations.
//!
//! A [`Pass`] is an ordered list of `(plugin, options)` pairs that run
//! together in a single combined walk.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{TraverseError, TraverseResult};
use crate::traverse::SharedState;
use crate::visitor::Visitor;

/// Hook run once per pass before (`pre`) or after (`post`) the walk.
pub type StateHook =
    Arc<dyn Fn(&mut PluginState, &mut SharedState) -> TraverseResult<()> + Send + Sync>;

/// Hook that may edit the resolved generic options before any pass runs.
pub type OptionsHook = Arc<dyn Fn(&mut Map<String, Value>) + Send + Sync>;

// ============================================================================
// PluginState
// ============================================================================

/// Mutable state owned by one plugin for the duration of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginState {
    key: String,
    /// Options the plugin was configured with (`Value::Null` when none).
    pub options: Value,
    /// Scratch space shared by the plugin's hooks and handlers.
    pub data: Map<String, Value>,
}

impl PluginState {
    pub fn new(key: impl Into<String>, options: Value) -> Self {
        Self {
            key: key.into(),
            options,
            data: Map::new(),
        }
    }

    /// The owning plugin's key (its name, or its alias when unnamed).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// A single configured option.
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// A handler error attributed to the owning plugin.
    pub fn error(&self, message: impl Into<String>) -> TraverseError {
        TraverseError::handler(self.key.clone(), message)
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// A validated plugin.
#[derive(Clone)]
pub struct Plugin {
    name: Option<String>,
    alias: String,
    visitor: Visitor,
    pre: Vec<StateHook>,
    post: Vec<StateHook>,
    manipulate_options: Vec<OptionsHook>,
}

impl Plugin {
    /// A plugin with the given alias and visitor and no hooks.
    pub fn new(alias: impl Into<String>, visitor: Visitor) -> Self {
        Self {
            name: None,
            alias: alias.into(),
            visitor,
            pre: Vec::new(),
            post: Vec::new(),
            manipulate_options: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_pre(mut self, hook: StateHook) -> Self {
        self.pre.push(hook);
        self
    }

    pub fn with_post(mut self, hook: StateHook) -> Self {
        self.post.push(hook);
        self
    }

    pub fn with_manipulate_options(mut self, hook: OptionsHook) -> Self {
        self.manipulate_options.push(hook);
        self
    }

    /// Layer this plugin on top of `base`: base hooks run first and base
    /// visitor handlers precede this plugin's handlers for every kind.
    pub fn inherit(self, base: &Plugin) -> Self {
        let chain = |inherited: &[StateHook], own: Vec<StateHook>| {
            inherited.iter().cloned().chain(own).collect::<Vec<_>>()
        };
        Self {
            name: self.name,
            alias: self.alias,
            visitor: Visitor::merge(&[base.visitor.clone(), self.visitor]),
            pre: chain(&base.pre, self.pre),
            post: chain(&base.post, self.post),
            manipulate_options: base
                .manipulate_options
                .iter()
                .cloned()
                .chain(self.manipulate_options)
                .collect(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Where the plugin was declared, such as `"base$0"`.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The key used in diagnostics and plugin state: name, falling back to alias.
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.alias)
    }

    pub fn visitor(&self) -> &Visitor {
        &self.visitor
    }

    pub fn pre_hooks(&self) -> &[StateHook] {
        &self.pre
    }

    pub fn post_hooks(&self) -> &[StateHook] {
        &self.post
    }

    pub fn options_hooks(&self) -> &[OptionsHook] {
        &self.manipulate_options
    }

    /// Run every `pre` hook in order, stopping at the first error.
    pub fn run_pre(&self, state: &mut PluginState, shared: &mut SharedState) -> TraverseResult<()> {
        self.pre.iter().try_for_each(|hook| hook(state, shared))
    }

    /// Run every `post` hook in order, stopping at the first error.
    pub fn run_post(
        &self,
        state: &mut PluginState,
        shared: &mut SharedState,
    ) -> TraverseResult<()> {
        self.post.iter().try_for_each(|hook| hook(state, shared))
    }

    /// Run every option hook in order.
    pub fn manipulate_options(&self, options: &mut Map<String, Value>) {
        for hook in &self.manipulate_options {
            hook(options);
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("visitor", &self.visitor)
            .field("pre", &self.pre.len())
            .field("post", &self.post.len())
            .field("manipulate_options", &self.manipulate_options.len())
            .finish()
    }
}

// ============================================================================
// Pass
// ============================================================================

/// A plugin scheduled in a pass, with the options it was configured with.
#[derive(Debug, Clone)]
pub struct PassItem {
    pub plugin: Arc<Plugin>,
    pub options: Value,
}

impl PassItem {
    pub fn new(plugin: Arc<Plugin>, options: Value) -> Self {
        Self { plugin, options }
    }
}

/// Plugins that run together in one combined walk, in order.
#[derive(Debug, Clone, Default)]
pub struct Pass {
    items: Vec<PassItem>,
}

impl Pass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: PassItem) {
        self.items.push(item);
    }

    /// Schedule `item` ahead of everything already in the pass.
    pub fn push_front(&mut self, item: PassItem) {
        self.items.insert(0, item);
    }

    pub fn items(&self) -> &[PassItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PassItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plugin keys in run order.
    pub fn keys(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.plugin.key()).collect()
    }

    /// True when both passes schedule the same plugin instances, in the same
    /// order, with equal options.
    pub fn same_as(&self, other: &Pass) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| Arc::ptr_eq(&a.plugin, &b.plugin) && a.options == b.options)
    }
}

impl FromIterator<PassItem> for Pass {
    fn from_iter<I: IntoIterator<Item = PassItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Pass {
    type Item = &'a PassItem;
    type IntoIter = std::slice::Iter<'a, PassItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
