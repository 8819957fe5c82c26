//! Plugin normalization and the process-wide plugin cache.
//!
//! A plugin reference from a configuration is one of:
//!
//! - an already built [`Plugin`], used as is
//! - a factory, invoked once with the [`PluginContext`]
//! - a raw object, a [`RawPlugin`] property bag
//! - a name, which the loader must turn into one of the above first
//!
//! Factories and raw objects go through [`PluginRegistry::normalize`], which
//! validates the property bag, explodes the visitor, folds in `inherits`, and
//! memoizes the result by the identity of the reference. Two configurations
//! naming the same factory or object therefore share one `Arc<Plugin>`.
//!
//! ## Allowed Properties
//!
//! `name`, `manipulateOptions`, `pre`, `post`, `visitor`, `inherits`. Any
//! other key is rejected with [`ConfigError::InvalidPluginProperty`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use serde_json::Value;
use tracing::trace;
use tugweave_core::kinds::{self, KindTable};
use tugweave_core::{OptionsHook, Plugin, RawVisitor, StateHook, Visitor};

use crate::error::{ConfigError, ConfigResult, EntryKind};

/// Keys a raw plugin object may carry.
pub const ALLOWED_PLUGIN_KEYS: &[&str] = &[
    "name",
    "manipulateOptions",
    "pre",
    "post",
    "visitor",
    "inherits",
];

// ============================================================================
// PluginContext
// ============================================================================

/// What plugin and preset factories receive from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginContext {
    /// Version of this crate.
    pub version: &'static str,
}

impl PluginContext {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Child-field layout currently in effect, aliases included.
    pub fn kinds(&self) -> KindTable {
        kinds::snapshot()
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// Raw plugins
// ============================================================================

/// Factory producing a raw plugin object.
pub type PluginFactory = Arc<dyn Fn(&PluginContext) -> ConfigResult<RawPlugin> + Send + Sync>;

/// A value in a raw plugin object.
#[derive(Clone)]
pub enum PluginProperty {
    /// Plain data, as a JSON object would carry it.
    Value(Value),
    Visitor(RawVisitor),
    /// A `pre` or `post` hook.
    Hook(StateHook),
    OptionsHook(OptionsHook),
    /// Another plugin to layer this one on top of.
    Inherits(PluginRef),
}

impl PluginProperty {
    fn describe(&self) -> &'static str {
        match self {
            PluginProperty::Value(Value::String(_)) => "a string",
            PluginProperty::Value(_) => "a value",
            PluginProperty::Visitor(_) => "a visitor",
            PluginProperty::Hook(_) => "a hook",
            PluginProperty::OptionsHook(_) => "an options hook",
            PluginProperty::Inherits(_) => "a plugin reference",
        }
    }
}

impl fmt::Debug for PluginProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginProperty::Value(value) => f.debug_tuple("Value").field(value).finish(),
            PluginProperty::Visitor(visitor) => f.debug_tuple("Visitor").field(visitor).finish(),
            PluginProperty::Inherits(reference) => {
                f.debug_tuple("Inherits").field(reference).finish()
            }
            other => f.write_str(other.describe()),
        }
    }
}

/// A plugin object as a factory returns it: properties in declaration order.
#[derive(Clone, Default, Debug)]
pub struct RawPlugin {
    properties: Vec<(String, PluginProperty)>,
}

impl RawPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, key: impl Into<String>, value: PluginProperty) -> Self {
        self.properties.push((key.into(), value));
        self
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.property("name", PluginProperty::Value(Value::String(name.into())))
    }

    pub fn visitor(self, visitor: RawVisitor) -> Self {
        self.property("visitor", PluginProperty::Visitor(visitor))
    }

    pub fn pre(self, hook: StateHook) -> Self {
        self.property("pre", PluginProperty::Hook(hook))
    }

    pub fn post(self, hook: StateHook) -> Self {
        self.property("post", PluginProperty::Hook(hook))
    }

    pub fn manipulate_options(self, hook: OptionsHook) -> Self {
        self.property("manipulateOptions", PluginProperty::OptionsHook(hook))
    }

    pub fn inherits(self, base: PluginRef) -> Self {
        self.property("inherits", PluginProperty::Inherits(base))
    }

    pub fn properties(&self) -> &[(String, PluginProperty)] {
        &self.properties
    }
}

/// Where a plugin reference appeared, for diagnostics and aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSite {
    /// The layer location, such as `"base"` or a preset's path.
    pub location: String,
    /// Position within the layer's list, or `"inherits"`.
    pub index: String,
    /// Alias given to an unnamed plugin.
    pub alias: String,
}

impl PluginSite {
    /// Entry `index` of the layer at `location`, aliased `"{location}${index}"`.
    pub fn new(location: impl Into<String>, index: usize) -> Self {
        let location = location.into();
        Self {
            alias: format!("{location}${index}"),
            index: index.to_string(),
            location,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    fn inherits(&self) -> Self {
        Self {
            location: self.location.clone(),
            index: "inherits".to_string(),
            alias: format!("{}$inherits", self.alias),
        }
    }
}

/// Validated form of a [`RawPlugin`].
#[derive(Default)]
struct Descriptor {
    name: Option<String>,
    visitor: Option<RawVisitor>,
    pre: Option<StateHook>,
    post: Option<StateHook>,
    manipulate_options: Option<OptionsHook>,
    inherits: Option<PluginRef>,
}

impl Descriptor {
    fn parse(raw: &RawPlugin, site: &PluginSite) -> ConfigResult<Self> {
        let mut descriptor = Descriptor::default();
        for (key, value) in &raw.properties {
            let mismatch = |expected: &'static str| ConfigError::InvalidPluginPropertyType {
                location: site.location.clone(),
                index: site.index.clone(),
                key: key.clone(),
                expected,
            };
            match (key.as_str(), value) {
                ("name", PluginProperty::Value(Value::String(name))) => {
                    descriptor.name = Some(name.clone());
                }
                ("name", PluginProperty::Value(Value::Null)) => descriptor.name = None,
                ("name", _) => return Err(mismatch("a string")),
                ("visitor", PluginProperty::Visitor(visitor)) => {
                    descriptor.visitor = Some(visitor.clone());
                }
                ("visitor", _) => return Err(mismatch("a visitor")),
                ("pre", PluginProperty::Hook(hook)) => descriptor.pre = Some(hook.clone()),
                ("post", PluginProperty::Hook(hook)) => descriptor.post = Some(hook.clone()),
                ("pre" | "post", _) => return Err(mismatch("a hook")),
                ("manipulateOptions", PluginProperty::OptionsHook(hook)) => {
                    descriptor.manipulate_options = Some(hook.clone());
                }
                ("manipulateOptions", _) => return Err(mismatch("an options hook")),
                ("inherits", PluginProperty::Inherits(base)) => {
                    descriptor.inherits = Some(base.clone());
                }
                ("inherits", _) => return Err(mismatch("a plugin reference")),
                _ => {
                    return Err(ConfigError::InvalidPluginProperty {
                        location: site.location.clone(),
                        index: site.index.clone(),
                        key: key.clone(),
                    })
                }
            }
        }
        Ok(descriptor)
    }
}

// ============================================================================
// PluginRef
// ============================================================================

/// A plugin as a configuration refers to it.
#[derive(Clone)]
pub enum PluginRef {
    /// A name the loader resolves.
    Name(String),
    Factory(PluginFactory),
    Object(Arc<RawPlugin>),
    /// An already built plugin.
    Plugin(Arc<Plugin>),
}

impl PluginRef {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&PluginContext) -> ConfigResult<RawPlugin> + Send + Sync + 'static,
    {
        PluginRef::Factory(Arc::new(f))
    }

    pub fn object(raw: RawPlugin) -> Self {
        PluginRef::Object(Arc::new(raw))
    }

    /// Identity used for memoization: the address of the shared reference.
    fn identity(&self) -> Option<usize> {
        match self {
            PluginRef::Factory(factory) => Some(Arc::as_ptr(factory) as *const () as usize),
            PluginRef::Object(raw) => Some(Arc::as_ptr(raw) as *const () as usize),
            PluginRef::Name(_) | PluginRef::Plugin(_) => None,
        }
    }
}

impl fmt::Debug for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
            PluginRef::Factory(_) => f.write_str("Factory"),
            PluginRef::Object(raw) => f.debug_tuple("Object").field(raw).finish(),
            PluginRef::Plugin(plugin) => f.debug_tuple("Plugin").field(&plugin.key()).finish(),
        }
    }
}

impl From<Arc<Plugin>> for PluginRef {
    fn from(plugin: Arc<Plugin>) -> Self {
        PluginRef::Plugin(plugin)
    }
}

impl From<RawPlugin> for PluginRef {
    fn from(raw: RawPlugin) -> Self {
        PluginRef::object(raw)
    }
}

// ============================================================================
// PluginRegistry
// ============================================================================

struct CacheEntry {
    /// Keeps the memoized reference alive so its address is never reused.
    _reference: PluginRef,
    plugin: Arc<Plugin>,
}

/// Memoizing plugin normalizer.
#[derive(Default)]
pub struct PluginRegistry {
    cache: Mutex<HashMap<usize, CacheEntry>>,
}

static GLOBAL_REGISTRY: LazyLock<PluginRegistry> = LazyLock::new(PluginRegistry::new);

impl PluginRegistry {
    /// A registry with its own, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static PluginRegistry {
        &GLOBAL_REGISTRY
    }

    /// Number of memoized plugins.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<usize, CacheEntry>> {
        // Factories never run under the lock, so poisoning leaves the map intact.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turn a reference into a validated, shared plugin.
    pub fn normalize(&self, reference: &PluginRef, site: &PluginSite) -> ConfigResult<Arc<Plugin>> {
        let (identity, raw) = match reference {
            PluginRef::Plugin(plugin) => return Ok(plugin.clone()),
            PluginRef::Name(name) => {
                return Err(ConfigError::UnresolvedName {
                    kind: EntryKind::Plugin,
                    name: name.clone(),
                })
            }
            PluginRef::Factory(factory) => {
                let identity = reference.identity().unwrap_or_default();
                if let Some(plugin) = self.cached(identity) {
                    return Ok(plugin);
                }
                trace!(alias = %site.alias, "invoking plugin factory");
                let raw = factory(&PluginContext::current())?;
                (identity, Arc::new(raw))
            }
            PluginRef::Object(raw) => {
                let identity = reference.identity().unwrap_or_default();
                if let Some(plugin) = self.cached(identity) {
                    return Ok(plugin);
                }
                (identity, raw.clone())
            }
        };

        let plugin = Arc::new(self.build(&raw, site)?);

        let mut cache = self.lock();
        let entry = cache.entry(identity).or_insert_with(|| CacheEntry {
            _reference: reference.clone(),
            plugin,
        });
        trace!(alias = %site.alias, key = entry.plugin.key(), "memoized plugin");
        Ok(entry.plugin.clone())
    }

    fn cached(&self, identity: usize) -> Option<Arc<Plugin>> {
        let plugin = self.lock().get(&identity).map(|entry| entry.plugin.clone());
        if let Some(plugin) = &plugin {
            trace!(key = plugin.key(), "plugin cache hit");
        }
        plugin
    }

    fn build(&self, raw: &RawPlugin, site: &PluginSite) -> ConfigResult<Plugin> {
        let descriptor = Descriptor::parse(raw, site)?;

        let visitor = match &descriptor.visitor {
            Some(raw_visitor) => raw_visitor
                .explode()
                .map_err(|source| ConfigError::Composition {
                    location: site.location.clone(),
                    index: site.index.clone(),
                    source,
                })?,
            None => Visitor::new(),
        };

        let mut plugin = Plugin::new(site.alias.clone(), visitor);
        if let Some(name) = descriptor.name {
            plugin = plugin.with_name(name);
        }
        if let Some(hook) = descriptor.pre {
            plugin = plugin.with_pre(hook);
        }
        if let Some(hook) = descriptor.post {
            plugin = plugin.with_post(hook);
        }
        if let Some(hook) = descriptor.manipulate_options {
            plugin = plugin.with_manipulate_options(hook);
        }
        if let Some(base) = &descriptor.inherits {
            let inherited = self.normalize(base, &site.inherits())?;
            plugin = plugin.inherit(&inherited);
        }
        Ok(plugin)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("cached", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tugweave_core::visitor::handler;
    use tugweave_core::{CompositionError, PluginState, SharedState};

    fn site() -> PluginSite {
        PluginSite::new("base", 0)
    }

    fn ident_visitor() -> RawVisitor {
        RawVisitor::new().handler("Identifier", handler(|_path, _state| Ok(())))
    }

    mod memoization {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[test]
        fn same_factory_yields_same_plugin() {
            let registry = PluginRegistry::new();
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            let reference = PluginRef::factory(move |_ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RawPlugin::new().name("memo").visitor(ident_visitor()))
            });

            let first = registry.normalize(&reference, &site()).expect("first");
            let second = registry
                .normalize(&reference.clone(), &PluginSite::new("other", 3))
                .expect("second");
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(registry.len(), 1);
        }

        #[test]
        fn equal_but_distinct_objects_are_distinct() {
            let registry = PluginRegistry::new();
            let a = PluginRef::object(RawPlugin::new().name("same"));
            let b = PluginRef::object(RawPlugin::new().name("same"));
            let pa = registry.normalize(&a, &site()).expect("a");
            let pb = registry.normalize(&b, &site()).expect("b");
            assert!(!Arc::ptr_eq(&pa, &pb));
            assert_eq!(registry.len(), 2);
        }

        #[test]
        fn memoized_references_outlive_their_callers() {
            let registry = PluginRegistry::new();
            let raw = Arc::new(RawPlugin::new().name("held"));
            let weak = Arc::downgrade(&raw);
            let reference = PluginRef::Object(raw);
            registry.normalize(&reference, &site()).expect("normalize");
            drop(reference);
            assert!(weak.upgrade().is_some());
        }

        #[test]
        fn built_plugins_pass_through() {
            let registry = PluginRegistry::new();
            let plugin = Arc::new(Plugin::new("ready", Visitor::new()));
            let out = registry
                .normalize(&PluginRef::Plugin(plugin.clone()), &site())
                .expect("plugin");
            assert!(Arc::ptr_eq(&plugin, &out));
            assert!(registry.is_empty());
        }

        #[test]
        fn failures_are_not_cached() {
            let registry = PluginRegistry::new();
            let reference = PluginRef::factory(|_ctx| Err(ConfigError::factory("nope")));
            assert_eq!(
                registry.normalize(&reference, &site()).expect_err("fails"),
                ConfigError::factory("nope")
            );
            assert!(registry.is_empty());
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn unknown_key_is_rejected_with_location() {
            let reference = PluginRef::object(
                RawPlugin::new()
                    .visitor(ident_visitor())
                    .property("transform", PluginProperty::Value(Value::Bool(true))),
            );
            let err = PluginRegistry::new()
                .normalize(&reference, &PluginSite::new("base", 2))
                .expect_err("invalid key");
            assert_eq!(
                err,
                ConfigError::InvalidPluginProperty {
                    location: "base".to_string(),
                    index: "2".to_string(),
                    key: "transform".to_string(),
                }
            );
            assert_eq!(
                err.to_string(),
                "plugin 2 specified in \"base\" provided an invalid property of \"transform\""
            );
        }

        #[test]
        fn wrong_shape_is_rejected() {
            let reference = PluginRef::object(
                RawPlugin::new().property("visitor", PluginProperty::Value(Value::Null)),
            );
            let err = PluginRegistry::new()
                .normalize(&reference, &site())
                .expect_err("shape");
            assert!(matches!(
                err,
                ConfigError::InvalidPluginPropertyType { ref key, expected: "a visitor", .. }
                    if key == "visitor"
            ));
        }

        #[test]
        fn catch_all_visitor_is_rejected() {
            let reference = PluginRef::object(RawPlugin::new().visitor(
                RawVisitor::new().handler("enter", handler(|_path, _state| Ok(()))),
            ));
            let err = PluginRegistry::new()
                .normalize(&reference, &site())
                .expect_err("catch-all");
            assert!(matches!(
                err,
                ConfigError::Composition {
                    source: CompositionError::CatchAllHandler { .. },
                    ..
                }
            ));
        }

        #[test]
        fn names_must_be_loaded_first() {
            let err = PluginRegistry::new()
                .normalize(&PluginRef::Name("strip".to_string()), &site())
                .expect_err("name");
            assert!(matches!(err, ConfigError::UnresolvedName { .. }));
        }

        #[test]
        fn alias_and_name() {
            let registry = PluginRegistry::new();
            let unnamed = registry
                .normalize(
                    &PluginRef::object(RawPlugin::new()),
                    &PluginSite::new("base", 4),
                )
                .expect("unnamed");
            assert_eq!(unnamed.key(), "base$4");

            let named = registry
                .normalize(
                    &PluginRef::object(RawPlugin::new().name("n")),
                    &PluginSite::new("base", 0).with_alias("/presets/web.js"),
                )
                .expect("named");
            assert_eq!(named.key(), "n");
            assert_eq!(named.alias(), "/presets/web.js");
        }
    }

    mod inherits {
        use super::*;

        fn logging_hook(label: &'static str) -> StateHook {
            Arc::new(move |state: &mut PluginState, _: &mut SharedState| {
                let entry = state
                    .data
                    .entry("log")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    items.push(Value::from(label));
                }
                Ok(())
            })
        }

        #[test]
        fn inherited_hooks_and_handlers_come_first() {
            let base = PluginRef::object(
                RawPlugin::new()
                    .name("base")
                    .visitor(ident_visitor())
                    .pre(logging_hook("base")),
            );
            let child = PluginRef::object(
                RawPlugin::new()
                    .name("child")
                    .inherits(base.clone())
                    .visitor(ident_visitor())
                    .pre(logging_hook("child")),
            );

            let registry = PluginRegistry::new();
            let base_plugin = registry.normalize(&base, &site()).expect("base");
            let plugin = registry.normalize(&child, &site()).expect("child");

            let handlers = plugin.visitor().get("Identifier").expect("identifier");
            let inherited = base_plugin.visitor().get("Identifier").expect("base");
            assert_eq!(handlers.enter.len(), 2);
            assert!(Arc::ptr_eq(&handlers.enter[0], &inherited.enter[0]));

            let mut state = PluginState::new(plugin.key(), Value::Null);
            plugin
                .run_pre(&mut state, &mut SharedState::new())
                .expect("pre");
            assert_eq!(
                state.data.get("log"),
                Some(&serde_json::json!(["base", "child"]))
            );
        }

        #[test]
        fn inherits_errors_name_the_inherits_slot() {
            let child = PluginRef::object(RawPlugin::new().inherits(PluginRef::object(
                RawPlugin::new().property("bogus", PluginProperty::Value(Value::Null)),
            )));
            let err = PluginRegistry::new()
                .normalize(&child, &PluginSite::new("base", 1))
                .expect_err("inherits");
            assert!(matches!(
                err,
                ConfigError::InvalidPluginProperty { ref index, .. } if index == "inherits"
            ));
        }
    }
}
