//! Resolving a chain of configuration layers into options and passes.
//!
//! [`ConfigResolver::resolve`] merges each layer in chain order. For every
//! layer it:
//!
//! 1. validates the generic options against the layer kind
//! 2. loads named plugin and preset entries through the [`Loader`]
//! 3. resolves the layer's presets, in declaration order, each as a nested
//!    `Preset` layer merged into the current pass or, with `passPerPreset`,
//!    into a pass of its own inserted right after the root pass
//! 4. normalizes the layer's plugins through the [`PluginRegistry`] and puts
//!    each one at the front of the current pass, so entries declared later
//!    run earlier and a layer's own plugins run before its presets' plugins
//! 5. merges the generic options into the accumulated options
//!
//! The resulting [`ResolvedConfig`] can be turned back into an arguments
//! layer with [`ResolvedConfig::to_arguments`]; resolving that layer again
//! yields the same passes and options.

use serde_json::{Map, Value};
use tracing::{debug, trace};
use tugweave_core::{Pass, PassItem};

use crate::error::{ConfigError, ConfigResult, EntryKind};
use crate::layer::{ConfigLayer, Entry, LayerKind, LayerOptions, PresetMeta, PresetRef};
use crate::loader::Loader;
use crate::options::{
    self, is_known_option, is_truthy, merge_options, removed_guidance, PRESET_FORBIDDEN_OPTIONS,
    ROOT_ONLY_OPTIONS,
};
use crate::registry::{PluginContext, PluginRef, PluginRegistry, PluginSite};

/// Presets nested deeper than this fail with [`ConfigError::PresetDepthExceeded`].
pub const MAX_PRESET_DEPTH: usize = 64;

/// Filename used in error tags when the arguments carry none.
const UNKNOWN_FILENAME: &str = "unknown";

// ============================================================================
// ResolvedConfig
// ============================================================================

/// Merged options and the ordered passes to run.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub options: Map<String, Value>,
    /// Index 0 is the root pass; the rest are non-empty preset passes.
    pub passes: Vec<Pass>,
}

impl ResolvedConfig {
    pub fn root_pass(&self) -> &Pass {
        &self.passes[0]
    }

    /// Total number of scheduled plugins across all passes.
    pub fn plugin_count(&self) -> usize {
        self.passes.iter().map(Pass::len).sum()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// JavaScript truthiness of an option; absent options are false.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    pub fn filename(&self) -> &str {
        self.get_str("filename").unwrap_or(UNKNOWN_FILENAME)
    }

    /// Run every plugin's option hooks over the merged options, pass by pass.
    pub fn manipulate_options(&mut self) {
        for pass in &self.passes {
            for item in pass {
                item.plugin.manipulate_options(&mut self.options);
            }
        }
    }

    /// An arguments layer body that resolves back to this configuration.
    ///
    /// Plugins are emitted as built plugins in reverse run order (each is put
    /// at the front again on resolution); extra passes become preset bodies
    /// with `passPerPreset` set.
    pub fn to_arguments(&self) -> LayerOptions {
        let mut arguments = LayerOptions {
            generic: self.options.clone(),
            plugins: Some(reversed_entries(&self.passes[0])),
            presets: None,
        };
        let extra = &self.passes[1..];
        if !extra.is_empty() {
            arguments.presets = Some(
                extra
                    .iter()
                    .map(|pass| {
                        let body = LayerOptions {
                            plugins: Some(reversed_entries(pass)),
                            ..LayerOptions::default()
                        };
                        Entry::Ref(PresetRef::object(body))
                    })
                    .collect(),
            );
            arguments
                .generic
                .insert("passPerPreset".to_string(), Value::Bool(true));
        }
        arguments
    }
}

fn reversed_entries(pass: &Pass) -> Vec<Entry<PluginRef>> {
    pass.iter()
        .rev()
        .map(|item| {
            let reference = PluginRef::Plugin(item.plugin.clone());
            if item.options.is_null() {
                Entry::Ref(reference)
            } else {
                Entry::WithOptions(reference, item.options.clone())
            }
        })
        .collect()
}

// ============================================================================
// ConfigResolver
// ============================================================================

/// Resolves configuration chains against a registry and a loader.
pub struct ConfigResolver<'r> {
    registry: &'r PluginRegistry,
    loader: &'r dyn Loader,
}

impl<'r> ConfigResolver<'r> {
    pub fn new(registry: &'r PluginRegistry, loader: &'r dyn Loader) -> Self {
        Self { registry, loader }
    }

    /// Resolve a single arguments layer.
    pub fn resolve_arguments(&self, options: LayerOptions) -> ConfigResult<ResolvedConfig> {
        self.resolve(&[ConfigLayer::arguments(options)])
    }

    /// Merge `chain` in order into options and passes.
    ///
    /// Errors are tagged with the arguments' `filename` (or `"unknown"`).
    pub fn resolve(&self, chain: &[ConfigLayer]) -> ConfigResult<ResolvedConfig> {
        let filename = chain
            .iter()
            .find(|layer| layer.kind == LayerKind::Arguments)
            .and_then(ConfigLayer::filename)
            .unwrap_or(UNKNOWN_FILENAME)
            .to_string();
        debug!(layers = chain.len(), filename = %filename, "resolving configuration");

        let mut merge = Merge::new(self);
        for layer in chain {
            merge
                .layer(layer, ROOT_PASS)
                .map_err(|err| err.tag(filename.clone()))?;
        }
        let resolved = merge.finish();

        debug!(
            passes = resolved.passes.len(),
            plugins = resolved.plugin_count(),
            "resolved configuration"
        );
        Ok(resolved)
    }
}

// ============================================================================
// Merge state
// ============================================================================

const ROOT_PASS: usize = 0;

/// A plugin entry after loading, before normalization.
struct LoadedPlugin {
    filepath: Option<String>,
    reference: PluginRef,
    options: Value,
}

/// A preset entry after loading.
struct LoadedPreset {
    filepath: Option<String>,
    source: PresetSource,
    options: Value,
}

enum PresetSource {
    Ref(PresetRef),
    /// An inline JSON body.
    Body(LayerOptions),
}

/// Generic options of a layer that passed validation.
struct Validated {
    generic: Map<String, Value>,
    pass_per_preset: bool,
}

struct Merge<'m, 'r> {
    resolver: &'m ConfigResolver<'r>,
    options: Map<String, Value>,
    /// Passes by id; ids never change once assigned.
    passes: Vec<Pass>,
    /// Output order of pass ids.
    order: Vec<usize>,
    /// Identities of presets currently being resolved.
    active: Vec<usize>,
    depth: usize,
}

impl<'m, 'r> Merge<'m, 'r> {
    fn new(resolver: &'m ConfigResolver<'r>) -> Self {
        Self {
            resolver,
            options: options::bare_options(),
            passes: vec![Pass::new()],
            order: vec![ROOT_PASS],
            active: Vec::new(),
            depth: 0,
        }
    }

    fn layer(&mut self, layer: &ConfigLayer, pass: usize) -> ConfigResult<()> {
        trace!(alias = %layer.alias, kind = %layer.kind, "merging layer");
        let Validated {
            generic,
            pass_per_preset,
        } = validate(layer)?;

        let dirname = layer.dirname.as_deref();
        let plugins = match &layer.options.plugins {
            Some(entries) => entries
                .iter()
                .map(|entry| self.load_plugin(entry, dirname))
                .collect::<ConfigResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        let presets = match &layer.options.presets {
            Some(entries) => entries
                .iter()
                .map(|entry| self.load_preset(entry, dirname))
                .collect::<ConfigResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        if !presets.is_empty() {
            let targets: Vec<usize> = if pass_per_preset {
                let ids: Vec<usize> = (0..presets.len())
                    .map(|_| {
                        self.passes.push(Pass::new());
                        self.passes.len() - 1
                    })
                    .collect();
                // New preset passes go before any previously inserted ones.
                self.order.splice(1..1, ids.iter().copied());
                ids
            } else {
                vec![pass; presets.len()]
            };

            for (index, (preset, target)) in presets.into_iter().zip(targets).enumerate() {
                self.preset(layer, index, preset, target)?;
            }
        }

        for (index, plugin) in plugins.into_iter().enumerate() {
            let mut site = PluginSite::new(layer.loc.clone(), index);
            if let Some(filepath) = plugin.filepath {
                site = site.with_alias(filepath);
            }
            let normalized = self.resolver.registry.normalize(&plugin.reference, &site)?;
            trace!(key = normalized.key(), pass, "scheduling plugin");
            let item = PassItem::new(normalized, plugin.options);
            self.passes[pass].push_front(item);
        }

        merge_options(&mut self.options, generic);
        Ok(())
    }

    fn preset(
        &mut self,
        parent: &ConfigLayer,
        index: usize,
        preset: LoadedPreset,
        pass: usize,
    ) -> ConfigResult<()> {
        let alias = preset
            .filepath
            .clone()
            .unwrap_or_else(|| format!("{}.presets[{index}]", parent.alias));

        if self.depth >= MAX_PRESET_DEPTH {
            return Err(ConfigError::PresetDepthExceeded {
                limit: MAX_PRESET_DEPTH,
            });
        }

        let identity = match &preset.source {
            PresetSource::Ref(reference) => reference.identity(),
            PresetSource::Body(_) => None,
        };
        if let Some(identity) = identity {
            if self.active.contains(&identity) {
                return Err(ConfigError::PresetCycle { preset: alias });
            }
        }

        let body = match preset.source {
            PresetSource::Body(body) => body,
            PresetSource::Ref(reference) => {
                let meta = PresetMeta {
                    dirname: parent.dirname.clone(),
                };
                preset_body(&reference, &preset.options, &meta).map_err(|err| {
                    match &preset.filepath {
                        Some(filepath) => err.in_preset(filepath.clone()),
                        None => err,
                    }
                })?
            }
        };

        let mut child = ConfigLayer::new(LayerKind::Preset, body, alias);
        child.dirname = parent.dirname.clone();

        trace!(alias = %child.alias, depth = self.depth + 1, pass, "entering preset");
        self.depth += 1;
        if let Some(identity) = identity {
            self.active.push(identity);
        }
        let result = self.layer(&child, pass);
        if identity.is_some() {
            self.active.pop();
        }
        self.depth -= 1;
        result
    }

    fn load_plugin(
        &self,
        entry: &Entry<PluginRef>,
        dirname: Option<&str>,
    ) -> ConfigResult<LoadedPlugin> {
        let (reference, options) = match entry {
            Entry::Ref(reference) => (reference.clone(), Value::Null),
            Entry::WithOptions(reference, options) => (reference.clone(), options.clone()),
            Entry::Json(value) => {
                let (head, options) = split_json_entry(value, EntryKind::Plugin)?;
                match head {
                    Value::String(name) => (PluginRef::Name(name.clone()), options),
                    other => {
                        return Err(ConfigError::InvalidEntry {
                            kind: EntryKind::Plugin,
                            found: other.to_string(),
                        })
                    }
                }
            }
        };

        match reference {
            PluginRef::Name(name) => {
                if name.is_empty() {
                    return Err(ConfigError::FalsyEntry {
                        kind: EntryKind::Plugin,
                    });
                }
                let loaded = self.resolver.loader.load_plugin(&name, dirname)?;
                Ok(LoadedPlugin {
                    filepath: Some(loaded.filepath),
                    reference: loaded.value,
                    options,
                })
            }
            reference => Ok(LoadedPlugin {
                filepath: None,
                reference,
                options,
            }),
        }
    }

    fn load_preset(
        &self,
        entry: &Entry<PresetRef>,
        dirname: Option<&str>,
    ) -> ConfigResult<LoadedPreset> {
        let (reference, options) = match entry {
            Entry::Ref(reference) => (reference.clone(), Value::Null),
            Entry::WithOptions(reference, options) => (reference.clone(), options.clone()),
            Entry::Json(value) => {
                let (head, options) = split_json_entry(value, EntryKind::Preset)?;
                match head {
                    Value::String(name) => (PresetRef::Name(name.clone()), options),
                    Value::Object(_) => {
                        let body = LayerOptions::from_json(head.clone()).ok_or_else(|| {
                            ConfigError::InvalidEntry {
                                kind: EntryKind::Preset,
                                found: head.to_string(),
                            }
                        })?;
                        return Ok(LoadedPreset {
                            filepath: None,
                            source: PresetSource::Body(body),
                            options,
                        });
                    }
                    other => {
                        return Err(ConfigError::InvalidEntry {
                            kind: EntryKind::Preset,
                            found: other.to_string(),
                        })
                    }
                }
            }
        };

        match reference {
            PresetRef::Name(name) => {
                if name.is_empty() {
                    return Err(ConfigError::FalsyEntry {
                        kind: EntryKind::Preset,
                    });
                }
                let loaded = self.resolver.loader.load_preset(&name, dirname)?;
                Ok(LoadedPreset {
                    filepath: Some(loaded.filepath),
                    source: PresetSource::Ref(loaded.value),
                    options,
                })
            }
            reference => Ok(LoadedPreset {
                filepath: None,
                source: PresetSource::Ref(reference),
                options,
            }),
        }
    }

    fn finish(self) -> ResolvedConfig {
        let Merge {
            mut options,
            mut passes,
            order,
            ..
        } = self;

        let mut ordered = Vec::with_capacity(order.len());
        for (position, id) in order.into_iter().enumerate() {
            let pass = std::mem::take(&mut passes[id]);
            if position == 0 || !pass.is_empty() {
                ordered.push(pass);
            }
        }

        normalize_output(&mut options);
        ResolvedConfig {
            options,
            passes: ordered,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Split a JSON entry into its reference part and options.
fn split_json_entry(value: &Value, kind: EntryKind) -> ConfigResult<(&Value, Value)> {
    let (head, options) = match value {
        Value::Array(items) => {
            if items.len() > 2 {
                return Err(ConfigError::ExtraOptions {
                    kind,
                    extra: Value::Array(items[2..].to_vec()).to_string(),
                });
            }
            let Some(head) = items.first() else {
                return Err(ConfigError::FalsyEntry { kind });
            };
            (head, items.get(1).cloned().unwrap_or(Value::Null))
        }
        other => (other, Value::Null),
    };
    if !is_truthy(head) {
        return Err(ConfigError::FalsyEntry { kind });
    }
    Ok((head, options))
}

fn preset_body(
    reference: &PresetRef,
    options: &Value,
    meta: &PresetMeta,
) -> ConfigResult<LayerOptions> {
    match reference {
        PresetRef::Object(body) => Ok(body.as_ref().clone()),
        PresetRef::Factory(factory) => factory(&PluginContext::current(), options, meta),
        PresetRef::Name(name) => Err(ConfigError::UnresolvedName {
            kind: EntryKind::Preset,
            name: name.clone(),
        }),
    }
}

/// Check a layer's generic options and strip the keys that are not merged.
fn validate(layer: &ConfigLayer) -> ConfigResult<Validated> {
    let alias = layer.alias.as_str();
    let mut generic = layer.options.generic.clone();

    let offending = |keys: &[&str]| {
        keys.iter()
            .find(|key| generic.contains_key(**key))
            .map(|key| key.to_string())
    };

    if layer.kind != LayerKind::Arguments {
        if let Some(key) = offending(ROOT_ONLY_OPTIONS) {
            return Err(ConfigError::RootOnlyOption {
                alias: alias.to_string(),
                key,
            });
        }
    }

    if layer.kind == LayerKind::Preset {
        if let Some(key) = offending(PRESET_FORBIDDEN_OPTIONS) {
            return Err(ConfigError::NotInPreset {
                alias: alias.to_string(),
                key,
            });
        }
    }

    if let Some(source_map) = generic.remove("sourceMap") {
        match generic.get("sourceMaps") {
            Some(existing) if *existing != source_map => {
                return Err(ConfigError::ConflictingAlias {
                    alias: alias.to_string(),
                })
            }
            _ => {
                generic.insert("sourceMaps".to_string(), source_map);
            }
        }
    }

    if let Some(key) = generic.keys().find(|key| !is_known_option(key)) {
        return Err(match removed_guidance(key) {
            Some(guidance) => ConfigError::RemovedOption {
                alias: alias.to_string(),
                key: key.clone(),
                guidance: guidance.to_string(),
            },
            None => ConfigError::UnknownOption {
                alias: alias.to_string(),
                key: key.clone(),
            },
        });
    }

    for key in ["presets", "plugins"] {
        if generic.get(key).is_some_and(is_truthy) {
            return Err(ConfigError::NotAnArray {
                alias: alias.to_string(),
                key: key.to_string(),
            });
        }
        generic.remove(key);
    }

    let pass_per_preset = generic
        .remove("passPerPreset")
        .is_some_and(|value| is_truthy(&value));

    Ok(Validated {
        generic,
        pass_per_preset,
    })
}

/// Fill in options derived from other options.
fn normalize_output(options: &mut Map<String, Value>) {
    if options.get("inputSourceMap").is_some_and(is_truthy) {
        options.insert("sourceMaps".to_string(), Value::Bool(true));
    }
    if options.get("moduleId").is_some_and(is_truthy) {
        options.insert("moduleIds".to_string(), Value::Bool(true));
    }

    default_from(options, "moduleRoot", "sourceRoot");
    default_from(options, "sourceRoot", "moduleRoot");
    default_from(options, "filenameRelative", "filename");

    let basename = options
        .get("filenameRelative")
        .and_then(Value::as_str)
        .map(|path| options::basename(path).to_string());
    if let Some(basename) = basename {
        set_default(options, "sourceFileName", Value::String(basename.clone()));
        set_default(options, "sourceMapTarget", Value::String(basename));
    }
}

/// Set `key` to the value of `from` when `key` is unset and `from` is set.
fn default_from(options: &mut Map<String, Value>, key: &str, from: &str) {
    if let Some(value) = options.get(from).cloned() {
        set_default(options, key, value);
    }
}

fn set_default(options: &mut Map<String, Value>, key: &str, value: Value) {
    if options.get(key).is_none_or(Value::is_null) {
        options.insert(key.to_string(), value);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::loader::{NoLoader, StaticLoader};
    use crate::registry::RawPlugin;
    use serde_json::json;
    use tugweave_core::{Plugin, Visitor};

    fn plugin(name: &str) -> Arc<Plugin> {
        Arc::new(Plugin::new(name, Visitor::new()).with_name(name))
    }

    fn keys(pass: &Pass) -> Vec<String> {
        pass.keys().into_iter().map(str::to_string).collect()
    }

    fn resolve(options: LayerOptions) -> ConfigResult<ResolvedConfig> {
        let registry = PluginRegistry::new();
        ConfigResolver::new(&registry, &NoLoader).resolve_arguments(options)
    }

    fn root_cause(result: ConfigResult<ResolvedConfig>) -> ConfigError {
        result.expect_err("resolution fails").root_cause().clone()
    }

    mod validation {
        use super::*;

        #[test]
        fn unknown_option_names_key_and_layer() {
            let err = root_cause(resolve(LayerOptions::new().option("colour", "red")));
            assert_eq!(
                err,
                ConfigError::UnknownOption {
                    alias: "base".to_string(),
                    key: "colour".to_string()
                }
            );
        }

        #[test]
        fn removed_option_carries_guidance() {
            let err = root_cause(resolve(LayerOptions::new().option("stage", 2)));
            match err {
                ConfigError::RemovedOption { key, guidance, .. } => {
                    assert_eq!(key, "stage");
                    assert!(guidance.contains("stage-x presets"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn filename_is_root_only() {
            let registry = PluginRegistry::new();
            let layer = ConfigLayer::options(
                LayerOptions::new().option("filename", "x.js"),
                "/project/.tugweaverc",
            );
            let err = ConfigResolver::new(&registry, &NoLoader)
                .resolve(&[layer])
                .expect_err("root only");
            assert_eq!(
                err.root_cause(),
                &ConfigError::RootOnlyOption {
                    alias: "/project/.tugweaverc".to_string(),
                    key: "filename".to_string()
                }
            );
        }

        #[test]
        fn preset_may_not_set_only() {
            let preset = LayerOptions::new().option("only", json!(["src"]));
            let err = root_cause(resolve(LayerOptions::new().preset(preset)));
            assert!(matches!(
                err,
                ConfigError::NotInPreset { ref key, ref alias }
                    if key == "only" && alias == "base.presets[0]"
            ));
        }

        #[test]
        fn source_map_folds_into_source_maps() {
            let resolved =
                resolve(LayerOptions::new().option("sourceMap", "inline")).expect("resolve");
            assert_eq!(resolved.get("sourceMaps"), Some(&json!("inline")));
            assert!(resolved.get("sourceMap").is_none());

            let resolved = resolve(
                LayerOptions::new()
                    .option("sourceMap", true)
                    .option("sourceMaps", true),
            )
            .expect("equal values fold");
            assert_eq!(resolved.get("sourceMaps"), Some(&json!(true)));

            let err = root_cause(resolve(
                LayerOptions::new()
                    .option("sourceMap", true)
                    .option("sourceMaps", "inline"),
            ));
            assert!(matches!(err, ConfigError::ConflictingAlias { .. }));
        }

        #[test]
        fn plugins_must_be_an_array() {
            let layer = ConfigLayer::from_json(LayerKind::Arguments, json!({"plugins": "strip"}), "base")
                .expect("object");
            let registry = PluginRegistry::new();
            let err = ConfigResolver::new(&registry, &NoLoader)
                .resolve(&[layer])
                .expect_err("not an array");
            assert!(matches!(
                err.root_cause(),
                ConfigError::NotAnArray { key, .. } if key == "plugins"
            ));
        }

        #[test]
        fn malformed_entries() {
            let err = root_cause(resolve(
                LayerOptions::from_json(json!({"plugins": [["a", {}, "extra"]]})).expect("object"),
            ));
            assert_eq!(
                err.to_string(),
                "unexpected extra options [\"extra\"] passed to plugin"
            );

            for falsy in [json!(null), json!(false), json!(0), json!("")] {
                let err = root_cause(resolve(
                    LayerOptions::from_json(json!({ "presets": [falsy] })).expect("object"),
                ));
                assert_eq!(
                    err,
                    ConfigError::FalsyEntry {
                        kind: EntryKind::Preset
                    }
                );
            }
        }

        #[test]
        fn errors_are_tagged_with_filename_once() {
            let err = resolve(
                LayerOptions::new()
                    .option("filename", "src/app.js")
                    .option("colour", "red"),
            )
            .expect_err("unknown option");
            assert_eq!(
                err.to_string(),
                "[tugweave] src/app.js: unknown option: base.colour"
            );

            let err = resolve(LayerOptions::new().option("colour", "red")).expect_err("unknown");
            assert!(err.to_string().starts_with("[tugweave] unknown: "));
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn later_entries_run_first() {
            let (a, b, c) = (plugin("a"), plugin("b"), plugin("c"));
            let resolved =
                resolve(LayerOptions::new().plugin(a).plugin(b).plugin(c)).expect("resolve");
            assert_eq!(resolved.passes.len(), 1);
            assert_eq!(keys(resolved.root_pass()), vec!["c", "b", "a"]);
        }

        #[test]
        fn own_plugins_run_before_preset_plugins() {
            let preset_a = LayerOptions::new().plugin(plugin("A"));
            let preset_b = LayerOptions::new().plugin(plugin("B"));
            let resolved = resolve(
                LayerOptions::new()
                    .plugin(plugin("R"))
                    .preset(preset_a)
                    .preset(preset_b),
            )
            .expect("resolve");
            assert_eq!(resolved.passes.len(), 1);
            assert_eq!(keys(resolved.root_pass()), vec!["R", "B", "A"]);
        }

        #[test]
        fn pass_per_preset_gives_each_preset_a_pass() {
            let resolved = resolve(
                LayerOptions::new()
                    .option("passPerPreset", true)
                    .plugin(plugin("R"))
                    .preset(LayerOptions::new().plugin(plugin("A")))
                    .preset(LayerOptions::new().plugin(plugin("B"))),
            )
            .expect("resolve");
            let layout: Vec<Vec<String>> = resolved.passes.iter().map(keys).collect();
            assert_eq!(layout, vec![vec!["R"], vec!["A"], vec!["B"]]);
            assert!(resolved.get("passPerPreset").is_none());
        }

        #[test]
        fn later_layers_insert_preset_passes_first() {
            let registry = PluginRegistry::new();
            let first = ConfigLayer::options(
                LayerOptions::new()
                    .option("passPerPreset", true)
                    .preset(LayerOptions::new().plugin(plugin("X"))),
                "first",
            );
            let second = ConfigLayer::arguments(
                LayerOptions::new()
                    .option("passPerPreset", true)
                    .preset(LayerOptions::new().plugin(plugin("Y"))),
            );
            let resolved = ConfigResolver::new(&registry, &NoLoader)
                .resolve(&[first, second])
                .expect("resolve");
            let layout: Vec<Vec<String>> = resolved.passes.iter().map(keys).collect();
            assert_eq!(layout, vec![vec![], vec!["Y"], vec!["X"]]);
        }

        #[test]
        fn empty_preset_passes_are_dropped() {
            let resolved = resolve(
                LayerOptions::new()
                    .option("passPerPreset", true)
                    .preset(LayerOptions::new())
                    .preset(LayerOptions::new().plugin(plugin("B"))),
            )
            .expect("resolve");
            assert_eq!(resolved.passes.len(), 2);
            assert!(resolved.root_pass().is_empty());
        }

        #[test]
        fn unnamed_plugins_are_aliased_by_location() {
            let registry = PluginRegistry::new();
            let layer = ConfigLayer::options(
                LayerOptions::new()
                    .plugin(PluginRef::object(RawPlugin::new()))
                    .plugin(PluginRef::object(RawPlugin::new())),
                "/project/.tugweaverc",
            );
            let resolved = ConfigResolver::new(&registry, &NoLoader)
                .resolve(&[layer])
                .expect("resolve");
            assert_eq!(
                keys(resolved.root_pass()),
                vec!["/project/.tugweaverc$1", "/project/.tugweaverc$0"]
            );
        }
    }

    mod presets {
        use super::*;

        #[test]
        fn factory_receives_options_and_dirname() {
            let preset = PresetRef::factory(|_ctx, options, meta| {
                let name = options
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("none");
                let dirname = meta.dirname.clone().unwrap_or_default();
                Ok(LayerOptions::new()
                    .option("sourceRoot", format!("{dirname}/{name}"))
                    .plugin(plugin(name)))
            });
            let registry = PluginRegistry::new();
            let layer = ConfigLayer::arguments(
                LayerOptions::new().preset_with(preset, json!({"name": "web"})),
            )
            .with_dirname("/project");
            let resolved = ConfigResolver::new(&registry, &NoLoader)
                .resolve(&[layer])
                .expect("resolve");
            assert_eq!(keys(resolved.root_pass()), vec!["web"]);
            assert_eq!(resolved.get_str("sourceRoot"), Some("/project/web"));
            assert_eq!(resolved.get_str("moduleRoot"), Some("/project/web"));
        }

        #[test]
        fn named_preset_failures_name_the_preset() {
            let loader = StaticLoader::new().with_preset(
                "tugweave-preset-broken",
                PresetRef::factory(|_, _, _| Err(ConfigError::factory("bad preset"))),
            );
            let registry = PluginRegistry::new();
            let err = ConfigResolver::new(&registry, &loader)
                .resolve_arguments(LayerOptions::new().preset("broken"))
                .expect_err("factory fails");
            assert_eq!(
                err.to_string(),
                "[tugweave] unknown: bad preset (while processing preset: \"tugweave-preset-broken\")"
            );
        }

        #[test]
        fn nested_resolution_errors_keep_their_tag() {
            let loader = StaticLoader::new().with_preset(
                "tugweave-preset-inner",
                PresetRef::factory(|_ctx, _options, _meta| {
                    let registry = PluginRegistry::new();
                    let layer = ConfigLayer::arguments(
                        LayerOptions::new()
                            .option("filename", "inner.js")
                            .option("colour", "red"),
                    );
                    ConfigResolver::new(&registry, &NoLoader).resolve(&[layer])?;
                    Ok(LayerOptions::new())
                }),
            );
            let registry = PluginRegistry::new();
            let err = ConfigResolver::new(&registry, &loader)
                .resolve_arguments(
                    LayerOptions::new()
                        .option("filename", "outer.js")
                        .preset("inner"),
                )
                .expect_err("inner resolution fails");
            let message = err.to_string();
            assert_eq!(message.matches("[tugweave]").count(), 1);
            assert_eq!(
                message,
                "[tugweave] inner.js: unknown option: base.colour \
                 (while processing preset: \"tugweave-preset-inner\")"
            );
        }

        #[test]
        fn self_including_preset_is_a_cycle() {
            let loader = StaticLoader::new().with_preset(
                "loop",
                PresetRef::factory(|_, _, _| Ok(LayerOptions::new().preset("loop"))),
            );
            let registry = PluginRegistry::new();
            let err = ConfigResolver::new(&registry, &loader)
                .resolve_arguments(LayerOptions::new().preset("loop"))
                .expect_err("cycle");
            assert_eq!(
                err.root_cause(),
                &ConfigError::PresetCycle {
                    preset: "loop".to_string()
                }
            );
        }

        #[test]
        fn unbounded_nesting_is_cut_off() {
            fn nest() -> PresetRef {
                PresetRef::factory(|_, _, _| Ok(LayerOptions::new().preset(nest())))
            }
            let err = root_cause(resolve(LayerOptions::new().preset(nest())));
            assert_eq!(
                err,
                ConfigError::PresetDepthExceeded {
                    limit: MAX_PRESET_DEPTH
                }
            );
        }

        #[test]
        fn sibling_presets_may_share_a_reference() {
            let shared = PresetRef::object(LayerOptions::new().plugin(plugin("S")));
            let resolved = resolve(
                LayerOptions::new()
                    .preset(shared.clone())
                    .preset(shared),
            )
            .expect("not a cycle");
            assert_eq!(keys(resolved.root_pass()), vec!["S", "S"]);
        }

        #[test]
        fn json_preset_bodies_are_layers() {
            let loader =
                StaticLoader::new().with_plugin("strip", PluginRef::Plugin(plugin("strip")));
            let registry = PluginRegistry::new();
            let options = LayerOptions::from_json(json!({
                "presets": [[{ "plugins": ["strip"], "compact": true }, {}]]
            }))
            .expect("object");
            let resolved = ConfigResolver::new(&registry, &loader)
                .resolve_arguments(options)
                .expect("resolve");
            assert_eq!(keys(resolved.root_pass()), vec!["strip"]);
            assert_eq!(resolved.get("compact"), Some(&json!(true)));
        }
    }

    mod output {
        use super::*;

        #[test]
        fn bare_defaults_and_derived_options() {
            let resolved = resolve(
                LayerOptions::new()
                    .option("filename", "src/lib/app.js")
                    .option("inputSourceMap", json!({"version": 3}))
                    .option("moduleId", "app"),
            )
            .expect("resolve");
            assert_eq!(resolved.filename(), "src/lib/app.js");
            assert_eq!(resolved.get_str("filenameRelative"), Some("src/lib/app.js"));
            assert_eq!(resolved.get_str("sourceFileName"), Some("app.js"));
            assert_eq!(resolved.get_str("sourceMapTarget"), Some("app.js"));
            assert!(resolved.is_enabled("sourceMaps"));
            assert!(resolved.is_enabled("moduleIds"));
            assert_eq!(resolved.get_str("sourceType"), Some("module"));
            assert_eq!(resolved.get_str("compact"), Some("auto"));
            assert!(resolved.get("moduleRoot").is_none());
        }

        #[test]
        fn later_layers_win_for_scalars() {
            let registry = PluginRegistry::new();
            let project = ConfigLayer::options(
                LayerOptions::new()
                    .option("compact", true)
                    .option("comments", false),
                ".tugweaverc",
            );
            let arguments = ConfigLayer::arguments(LayerOptions::new().option("compact", false));
            let resolved = ConfigResolver::new(&registry, &NoLoader)
                .resolve(&[project, arguments])
                .expect("resolve");
            assert_eq!(resolved.get("compact"), Some(&json!(false)));
            assert_eq!(resolved.get("comments"), Some(&json!(false)));
        }

        #[test]
        fn to_arguments_round_trips() {
            let resolved = resolve(
                LayerOptions::new()
                    .option("passPerPreset", true)
                    .option("filename", "a.js")
                    .plugin(plugin("R1"))
                    .plugin_with(plugin("R2"), json!({"loose": true}))
                    .preset(LayerOptions::new().plugin(plugin("A")))
                    .preset(
                        LayerOptions::new()
                            .plugin(plugin("B1"))
                            .plugin(plugin("B2")),
                    ),
            )
            .expect("resolve");

            let again = resolve(resolved.to_arguments()).expect("re-resolve");
            assert_eq!(again.passes.len(), resolved.passes.len());
            for (a, b) in again.passes.iter().zip(&resolved.passes) {
                assert!(a.same_as(b), "{:?} != {:?}", a.keys(), b.keys());
            }
            assert_eq!(again.options, resolved.options);
        }

        #[test]
        fn manipulate_options_runs_hooks_in_pass_order() {
            let first = Arc::new(Plugin::new("first", Visitor::new()).with_manipulate_options(
                Arc::new(|opts: &mut Map<String, Value>| {
                    opts.insert("parserOpts".to_string(), json!({"plugins": ["jsx"]}));
                }),
            ));
            let second = Arc::new(Plugin::new("second", Visitor::new()).with_manipulate_options(
                Arc::new(|opts: &mut Map<String, Value>| {
                    if let Some(Value::Object(parser)) = opts.get_mut("parserOpts") {
                        parser.insert("ranges".to_string(), json!(true));
                    }
                }),
            ));
            // Declared second-first so `first` runs first.
            let mut resolved =
                resolve(LayerOptions::new().plugin(second).plugin(first)).expect("resolve");
            resolved.manipulate_options();
            assert_eq!(
                resolved.get("parserOpts"),
                Some(&json!({"plugins": ["jsx"], "ranges": true}))
            );
        }
    }
}
