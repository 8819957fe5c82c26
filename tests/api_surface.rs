//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Tree Model and Traversal
// ============================================================================

// node module - syntax tree and ESTree JSON interchange
use tugweave::node::{Field, Node, KIND_PROPERTY};

// kinds module - kind table and scoped aliases
use tugweave::kinds::{AliasGuard, AliasTarget, KindAlias, KindTable};

// visitor module - per-kind handlers and explosion
use tugweave::visitor::{
    handler, Handler, KindHandlers, Phase, RawEntry, RawVisitor, Visitor, CATCH_ALL_KEYS,
};

// plugin module - resolved plugins, state, passes
use tugweave::plugin::{OptionsHook, Pass, PassItem, Plugin, PluginState, StateHook};

// traverse module - walker entry points and the path handle
use tugweave::traverse::{
    run, traverse, Ancestor, Container, Path, Position, RunSummary, ScopeAnalyzer, SharedState,
};

// ============================================================================
// Configuration
// ============================================================================

use tugweave::layer::{
    ConfigLayer, Entry, LayerKind, LayerOptions, PluginEntry, PresetEntry, PresetFactory,
    PresetMeta, PresetRef,
};
use tugweave::loader::{Loaded, Loader, NoLoader, StaticLoader, PLUGIN_PREFIX, PRESET_PREFIX};
use tugweave::options::{
    bare_options, is_truthy, merge_options, OPTION_NAMES, PRESET_FORBIDDEN_OPTIONS,
    REMOVED_OPTIONS, ROOT_ONLY_OPTIONS,
};
use tugweave::registry::{
    PluginContext, PluginFactory, PluginProperty, PluginRef, PluginRegistry, PluginSite, RawPlugin,
    ALLOWED_PLUGIN_KEYS,
};
use tugweave::resolver::{ConfigResolver, ResolvedConfig, MAX_PRESET_DEPTH};

// ============================================================================
// Errors and Front Door
// ============================================================================

use tugweave::error::{ErrorInfo, OutputErrorCode, WeaveError};
use tugweave::pipeline::{transform, Pipeline, Transformed};
use tugweave::{CompositionError, ConfigError, TraverseError};

// ============================================================================
// Test
// ============================================================================

#[test]
fn api_surface_compiles() {
    // This test exists only to verify imports compile.
    // If you're here because this test broke, you may have
    // accidentally removed a public re-export.
    let _ = std::any::type_name::<Node>();
    let _ = std::any::type_name::<Visitor>();
    let _ = std::any::type_name::<Pass>();
    let _ = std::any::type_name::<SharedState>();
    let _ = std::any::type_name::<ConfigResolver<'static>>();
    let _ = std::any::type_name::<PluginRegistry>();
    let _ = std::any::type_name::<WeaveError>();
    let _ = std::any::type_name::<Transformed>();
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(OutputErrorCode::Configuration.code(), 2);
    assert_eq!(OutputErrorCode::Traversal.code(), 4);
    assert_eq!(OutputErrorCode::InternalError.code(), 10);
}
