//! Configuration layers and their entries.
//!
//! A [`ConfigLayer`] is one set of options in the chain handed to the
//! resolver: the caller's arguments, a project configuration, or the body of
//! a preset. Layers later in the chain take precedence over earlier ones for
//! generic options.
//!
//! ## Layer Kinds
//!
//! | Kind        | Source                          | Extra restrictions                        |
//! |-------------|---------------------------------|-------------------------------------------|
//! | `Arguments` | options passed by the caller    | none                                      |
//! | `Options`   | a project configuration         | no `filename` / `babelrc`                 |
//! | `Preset`    | a preset body                   | also no `only` / `ignore` / `extends` / `env` |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::registry::{PluginContext, PluginRef};

// ============================================================================
// Entries
// ============================================================================

/// One element of a `plugins` or `presets` list.
#[derive(Debug, Clone)]
pub enum Entry<R> {
    /// A bare reference.
    Ref(R),
    /// A reference with options.
    WithOptions(R, Value),
    /// A JSON element: a name, `[name]`, `[name, options]`, or for presets an
    /// inline body. Checked when the layer is resolved.
    Json(Value),
}

pub type PluginEntry = Entry<PluginRef>;
pub type PresetEntry = Entry<PresetRef>;

/// Extra information a preset factory receives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresetMeta {
    /// Directory of the layer that declared the preset.
    pub dirname: Option<String>,
}

/// Factory producing a preset body from its options.
pub type PresetFactory =
    Arc<dyn Fn(&PluginContext, &Value, &PresetMeta) -> ConfigResult<LayerOptions> + Send + Sync>;

/// A preset as a configuration refers to it.
#[derive(Clone)]
pub enum PresetRef {
    /// A name the loader resolves.
    Name(String),
    Object(Arc<LayerOptions>),
    Factory(PresetFactory),
}

impl PresetRef {
    pub fn object(body: LayerOptions) -> Self {
        PresetRef::Object(Arc::new(body))
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&PluginContext, &Value, &PresetMeta) -> ConfigResult<LayerOptions>
            + Send
            + Sync
            + 'static,
    {
        PresetRef::Factory(Arc::new(f))
    }

    /// Address of the shared body or factory; names have no identity until
    /// loaded.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            PresetRef::Object(body) => Some(Arc::as_ptr(body) as *const () as usize),
            PresetRef::Factory(factory) => Some(Arc::as_ptr(factory) as *const () as usize),
            PresetRef::Name(_) => None,
        }
    }
}

impl fmt::Debug for PresetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
            PresetRef::Object(body) => f.debug_tuple("Object").field(body).finish(),
            PresetRef::Factory(_) => f.write_str("Factory"),
        }
    }
}

// ============================================================================
// LayerOptions
// ============================================================================

/// The options of one layer.
#[derive(Debug, Clone, Default)]
pub struct LayerOptions {
    /// Everything other than `plugins` and `presets`.
    pub generic: Map<String, Value>,
    pub plugins: Option<Vec<PluginEntry>>,
    pub presets: Option<Vec<PresetEntry>>,
}

impl LayerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object. `plugins` / `presets` arrays become JSON
    /// entries; any other non-null value for them is kept as a generic option
    /// so the resolver can report it.
    ///
    /// Returns `None` when `value` is not an object.
    pub fn from_json(value: Value) -> Option<Self> {
        let Value::Object(mut generic) = value else {
            return None;
        };
        let plugins = take_entries(&mut generic, "plugins");
        let presets = take_entries(&mut generic, "presets");
        Some(Self {
            generic,
            plugins,
            presets,
        })
    }

    /// Builder: set a generic option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.generic.insert(key.into(), value.into());
        self
    }

    /// Builder: append a plugin entry.
    pub fn plugin(mut self, entry: impl Into<PluginEntry>) -> Self {
        self.plugins.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    /// Builder: append a plugin with options.
    pub fn plugin_with(self, reference: impl Into<PluginRef>, options: Value) -> Self {
        self.plugin(Entry::WithOptions(reference.into(), options))
    }

    /// Builder: append a preset entry.
    pub fn preset(mut self, entry: impl Into<PresetEntry>) -> Self {
        self.presets.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    /// Builder: append a preset with options.
    pub fn preset_with(self, reference: PresetRef, options: Value) -> Self {
        self.preset(Entry::WithOptions(reference, options))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.generic.get(key)
    }
}

fn take_entries<R>(generic: &mut Map<String, Value>, key: &str) -> Option<Vec<Entry<R>>> {
    match generic.remove(key) {
        Some(Value::Array(items)) => Some(items.into_iter().map(Entry::Json).collect()),
        Some(Value::Null) | None => None,
        Some(other) => {
            generic.insert(key.to_string(), other);
            None
        }
    }
}

impl From<PluginRef> for PluginEntry {
    fn from(reference: PluginRef) -> Self {
        Entry::Ref(reference)
    }
}

impl From<Arc<tugweave_core::Plugin>> for PluginEntry {
    fn from(plugin: Arc<tugweave_core::Plugin>) -> Self {
        Entry::Ref(PluginRef::Plugin(plugin))
    }
}

impl From<PresetRef> for PresetEntry {
    fn from(reference: PresetRef) -> Self {
        Entry::Ref(reference)
    }
}

impl From<LayerOptions> for PresetEntry {
    fn from(body: LayerOptions) -> Self {
        Entry::Ref(PresetRef::object(body))
    }
}

impl From<&str> for PluginEntry {
    fn from(name: &str) -> Self {
        Entry::Ref(PluginRef::Name(name.to_string()))
    }
}

impl From<&str> for PresetEntry {
    fn from(name: &str) -> Self {
        Entry::Ref(PresetRef::Name(name.to_string()))
    }
}

// ============================================================================
// ConfigLayer
// ============================================================================

/// Where a layer came from. Ordered by how restricted the layer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Arguments,
    Options,
    Preset,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Arguments => "arguments",
            LayerKind::Options => "options",
            LayerKind::Preset => "preset",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One layer of the chain.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub kind: LayerKind,
    pub options: LayerOptions,
    /// Name used in error messages, such as `"base"` or a config file path.
    pub alias: String,
    /// Location used to alias unnamed plugins (`"{loc}${index}"`).
    pub loc: String,
    /// Directory names are loaded relative to.
    pub dirname: Option<String>,
}

impl ConfigLayer {
    pub fn new(kind: LayerKind, options: LayerOptions, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            kind,
            options,
            loc: alias.clone(),
            alias,
            dirname: None,
        }
    }

    /// The caller's own options, aliased `"base"`.
    pub fn arguments(options: LayerOptions) -> Self {
        Self::new(LayerKind::Arguments, options, "base")
    }

    /// A project configuration found by the host.
    pub fn options(options: LayerOptions, alias: impl Into<String>) -> Self {
        Self::new(LayerKind::Options, options, alias)
    }

    /// Build a layer from a JSON body.
    pub fn from_json(
        kind: LayerKind,
        value: Value,
        alias: impl Into<String>,
    ) -> ConfigResult<Self> {
        let alias = alias.into();
        match LayerOptions::from_json(value) {
            Some(options) => Ok(Self::new(kind, options, alias)),
            None => Err(ConfigError::InvalidOptionsType { alias }),
        }
    }

    pub fn with_loc(mut self, loc: impl Into<String>) -> Self {
        self.loc = loc.into();
        self
    }

    pub fn with_dirname(mut self, dirname: impl Into<String>) -> Self {
        self.dirname = Some(dirname.into());
        self
    }

    /// The generic `filename` option, when it is a string.
    pub fn filename(&self) -> Option<&str> {
        self.options.get("filename").and_then(Value::as_str)
    }
}
