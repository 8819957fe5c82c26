//! Name resolution for plugins and presets.
//!
//! The resolver never touches the filesystem. When an entry names a plugin or
//! preset by string, it asks a [`Loader`], passing the directory of the layer
//! that declared it. Hosts that resolve modules implement the trait; the two
//! implementations here cover hosts that don't.

use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult, EntryKind};
use crate::layer::PresetRef;
use crate::registry::PluginRef;

/// Prefix tried for plugin names that are not registered as given.
pub const PLUGIN_PREFIX: &str = "tugweave-plugin-";

/// Prefix tried for preset names that are not registered as given.
pub const PRESET_PREFIX: &str = "tugweave-preset-";

/// A loaded reference and the path it was found at.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub filepath: String,
    pub value: T,
}

/// Turns plugin and preset names into references.
pub trait Loader: Send + Sync {
    fn load_plugin(&self, name: &str, dirname: Option<&str>) -> ConfigResult<Loaded<PluginRef>>;

    fn load_preset(&self, name: &str, dirname: Option<&str>) -> ConfigResult<Loaded<PresetRef>>;
}

fn not_found(kind: EntryKind, name: &str, dirname: Option<&str>) -> ConfigError {
    ConfigError::NotFound {
        kind,
        name: name.to_string(),
        dirname: dirname.unwrap_or(".").to_string(),
    }
}

/// Loader for hosts without name resolution: every name is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoader;

impl Loader for NoLoader {
    fn load_plugin(&self, name: &str, dirname: Option<&str>) -> ConfigResult<Loaded<PluginRef>> {
        Err(not_found(EntryKind::Plugin, name, dirname))
    }

    fn load_preset(&self, name: &str, dirname: Option<&str>) -> ConfigResult<Loaded<PresetRef>> {
        Err(not_found(EntryKind::Preset, name, dirname))
    }
}

/// In-memory name registry.
///
/// A name is looked up as given, then with the plugin or preset prefix, so
/// `"strip-debug"` finds a plugin registered as `"tugweave-plugin-strip-debug"`.
/// The returned filepath is the registered name.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    plugins: HashMap<String, PluginRef>,
    presets: HashMap<String, PresetRef>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin(mut self, name: impl Into<String>, reference: PluginRef) -> Self {
        self.plugins.insert(name.into(), reference);
        self
    }

    pub fn with_preset(mut self, name: impl Into<String>, reference: PresetRef) -> Self {
        self.presets.insert(name.into(), reference);
        self
    }

    fn find<'m, T>(
        map: &'m HashMap<String, T>,
        prefix: &str,
        name: &str,
    ) -> Option<(String, &'m T)> {
        if let Some(found) = map.get(name) {
            return Some((name.to_string(), found));
        }
        let prefixed = format!("{prefix}{name}");
        map.get(&prefixed).map(|found| (prefixed, found))
    }
}

impl Loader for StaticLoader {
    fn load_plugin(&self, name: &str, dirname: Option<&str>) -> ConfigResult<Loaded<PluginRef>> {
        match Self::find(&self.plugins, PLUGIN_PREFIX, name) {
            Some((_, PluginRef::Name(_))) | None => {
                Err(not_found(EntryKind::Plugin, name, dirname))
            }
            Some((filepath, value)) => Ok(Loaded {
                filepath,
                value: value.clone(),
            }),
        }
    }

    fn load_preset(&self, name: &str, dirname: Option<&str>) -> ConfigResult<Loaded<PresetRef>> {
        match Self::find(&self.presets, PRESET_PREFIX, name) {
            Some((_, PresetRef::Name(_))) | None => {
                Err(not_found(EntryKind::Preset, name, dirname))
            }
            Some((filepath, value)) => Ok(Loaded {
                filepath,
                value: value.clone(),
            }),
        }
    }
}
