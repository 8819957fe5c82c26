//! Tugweave: plugin composition and tree traversal for source-to-source transforms
//!
//! Resolves layered plugin and preset configuration into ordered passes and
//! runs those passes over a syntax tree handed in by an external parser.

// Tree model and traversal engine - re-exported from tugweave-core
pub use tugweave_core::kinds;
pub use tugweave_core::node;
pub use tugweave_core::plugin;
pub use tugweave_core::traverse;
pub use tugweave_core::visitor;

// Configuration resolution - re-exported from tugweave-config
pub use tugweave_config::layer;
pub use tugweave_config::loader;
pub use tugweave_config::options;
pub use tugweave_config::registry;
pub use tugweave_config::resolver;

// Unified error type and the end-to-end front door
pub mod error;
pub mod pipeline;

pub use error::{ErrorInfo, OutputErrorCode, WeaveError};
pub use pipeline::{transform, Pipeline, Transformed};
pub use tugweave_config::{
    ConfigError, ConfigLayer, ConfigResolver, LayerKind, LayerOptions, NoLoader, PluginRef,
    PluginRegistry, PresetRef, RawPlugin, ResolvedConfig, StaticLoader,
};
pub use tugweave_core::{
    CompositionError, Field, KindAlias, Node, Pass, Path, Plugin, PluginState, SharedState,
    TraverseError, Visitor,
};
