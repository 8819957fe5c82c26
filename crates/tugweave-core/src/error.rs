// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Error types for visitor composition and traversal.
//!
//! Two families live here:
//!
//! - [`CompositionError`]: raised while exploding or merging visitor
//!   declarations, before any tree is touched. The config crate maps these
//!   into its own configuration error with the plugin's location attached.
//! - [`TraverseError`]: raised while a pass runs. Handler and hook failures
//!   are carried through unchanged; the engine never catches or wraps them.

use thiserror::Error;

// ============================================================================
// Composition Errors
// ============================================================================

/// Errors produced while normalizing a visitor declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// The declaration used the reserved `enter`/`exit` key as a catch-all.
    #[error(
        "plugins aren't allowed to specify catch-all enter/exit handlers; \
         please target individual node kinds (found `{key}`)"
    )]
    CatchAllHandler { key: String },

    /// A key such as `"A||B"` produced an empty kind name.
    #[error("visitor key `{key}` contains an empty node kind")]
    EmptyKind { key: String },
}

/// Result type for composition operations.
pub type CompositionResult<T> = Result<T, CompositionError>;

// ============================================================================
// Traversal Errors
// ============================================================================

/// Errors raised while a pass is walking a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraverseError {
    /// A plugin handler or hook reported a failure.
    #[error("{plugin}: {message}")]
    Handler { plugin: String, message: String },

    /// Sibling insertion was requested on a node that is not in a list.
    #[error("cannot insert siblings next to `{kind}`: it is held by field `{key}`, not a list")]
    NotInList { kind: String, key: String },

    /// The root of a walk cannot be removed.
    #[error("cannot remove the root `{kind}` node of a traversal")]
    RemoveRoot { kind: String },

    /// A kind alias pointed at a kind with no known child fields.
    #[error("cannot alias `{alias}` to unknown node kind `{target}`")]
    UnknownAliasTarget { alias: String, target: String },
}

impl TraverseError {
    /// Create a handler error attributed to a plugin.
    pub fn handler(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        TraverseError::Handler {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// True for errors that indicate a broken plugin or engine rather than
    /// a failure the plugin reported on purpose.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TraverseError::NotInList { .. } | TraverseError::RemoveRoot { .. }
        )
    }
}

/// Result type for traversal operations.
pub type TraverseResult<T> = Result<T, TraverseError>;
