//! Configuration resolution for tugweave.
//!
//! This crate turns a chain of option layers into what a transform run needs:
//! - Layer and entry types, including JSON bodies
//! - Generic option validation, defaults and merging
//! - The memoizing plugin registry
//! - Name resolution through a host-provided loader
//! - The resolver that orders plugins into passes
//!
//! ```
//! use std::sync::Arc;
//! use tugweave_config::{ConfigResolver, LayerOptions, NoLoader, PluginRegistry};
//! use tugweave_core::{Plugin, Visitor};
//!
//! let strip = Arc::new(Plugin::new("strip", Visitor::new()).with_name("strip"));
//! let registry = PluginRegistry::new();
//! let resolved = ConfigResolver::new(&registry, &NoLoader)
//!     .resolve_arguments(LayerOptions::new().option("filename", "app.js").plugin(strip))
//!     .unwrap();
//!
//! assert_eq!(resolved.root_pass().keys(), vec!["strip"]);
//! assert_eq!(resolved.get_str("sourceFileName"), Some("app.js"));
//! ```

pub mod error;
pub mod layer;
pub mod loader;
pub mod options;
pub mod registry;
pub mod resolver;

pub use error::{ConfigError, ConfigResult, EntryKind};
pub use layer::{
    ConfigLayer, Entry, LayerKind, LayerOptions, PluginEntry, PresetEntry, PresetFactory,
    PresetMeta, PresetRef,
};
pub use loader::{Loaded, Loader, NoLoader, StaticLoader, PLUGIN_PREFIX, PRESET_PREFIX};
pub use registry::{
    PluginContext, PluginFactory, PluginProperty, PluginRef, PluginRegistry, PluginSite, RawPlugin,
};
pub use resolver::{ConfigResolver, ResolvedConfig, MAX_PRESET_DEPTH};
