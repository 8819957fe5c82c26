// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Tree model and traversal engine for tugweave.
//!
//! This crate provides the parts of the pipeline that touch trees:
//! - Syntax tree nodes with JSON interchange
//! - The process-wide kind table and temporary kind aliases
//! - Visitors and their explosion from raw plugin declarations
//! - Resolved plugins, plugin state, and passes
//! - The combined-pass walker and the `Path` handle given to handlers
//! - Error types for composition and traversal

pub mod error;
pub mod kinds;
pub mod node;
pub mod plugin;
pub mod traverse;
pub mod visitor;

pub use error::{CompositionError, CompositionResult, TraverseError, TraverseResult};
pub use kinds::{AliasGuard, AliasTarget, KindAlias, KindTable};
pub use node::{Field, Node};
pub use plugin::{OptionsHook, Pass, PassItem, Plugin, PluginState, StateHook};
pub use traverse::{
    run, traverse, Ancestor, Container, Path, Position, RunSummary, ScopeAnalyzer, SharedState,
};
pub use visitor::{handler, Handler, KindHandlers, Phase, RawEntry, RawVisitor, Visitor};
