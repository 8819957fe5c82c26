// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Raw visitor declarations and their explosion into [`Visitor`].

use std::fmt;

use super::{Handler, Phase, Visitor};
use crate::error::{CompositionError, CompositionResult};

/// Keys that would register a handler for every node kind.
pub const CATCH_ALL_KEYS: &[&str] = &["enter", "exit"];

/// One value in a raw visitor declaration.
#[derive(Clone)]
pub enum RawEntry {
    /// A bare handler, shorthand for `enter`.
    Handler(Handler),
    /// Explicit enter and exit lists.
    Phases { enter: Vec<Handler>, exit: Vec<Handler> },
}

impl fmt::Debug for RawEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawEntry::Handler(_) => f.write_str("Handler"),
            RawEntry::Phases { enter, exit } => f
                .debug_struct("Phases")
                .field("enter", &enter.len())
                .field("exit", &exit.len())
                .finish(),
        }
    }
}

/// A visitor as a plugin declares it: keys in declaration order, each key
/// naming one kind or several kinds joined with `|`.
#[derive(Clone, Default, Debug)]
pub struct RawVisitor {
    entries: Vec<(String, RawEntry)>,
}

impl RawVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: a bare handler under `key`.
    pub fn handler(self, key: impl Into<String>, handler: Handler) -> Self {
        self.entry(key, RawEntry::Handler(handler))
    }

    /// Builder: explicit enter/exit lists under `key`.
    pub fn phases(self, key: impl Into<String>, enter: Vec<Handler>, exit: Vec<Handler>) -> Self {
        self.entry(key, RawEntry::Phases { enter, exit })
    }

    /// Builder: append an entry.
    pub fn entry(mut self, key: impl Into<String>, entry: RawEntry) -> Self {
        self.push(key, entry);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, entry: RawEntry) {
        self.entries.push((key.into(), entry));
    }

    pub fn entries(&self) -> &[(String, RawEntry)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Normalize into a [`Visitor`].
    ///
    /// Fails with [`CompositionError::CatchAllHandler`] when a key is one of
    /// [`CATCH_ALL_KEYS`], and with [`CompositionError::EmptyKind`] when a
    /// `|`-separated key contains an empty segment.
    pub fn explode(&self) -> CompositionResult<Visitor> {
        let mut visitor = Visitor::new();

        for (key, entry) in &self.entries {
            if CATCH_ALL_KEYS.contains(&key.trim()) {
                return Err(CompositionError::CatchAllHandler { key: key.clone() });
            }

            let kinds = split_kinds(key)?;
            let (enter, exit): (&[Handler], &[Handler]) = match entry {
                RawEntry::Handler(handler) => (std::slice::from_ref(handler), &[]),
                RawEntry::Phases { enter, exit } => (enter, exit),
            };

            for kind in kinds {
                for handler in enter {
                    visitor.add(kind, Phase::Enter, handler.clone());
                }
                for handler in exit {
                    visitor.add(kind, Phase::Exit, handler.clone());
                }
            }
        }

        Ok(visitor)
    }
}

fn split_kinds(key: &str) -> CompositionResult<Vec<&str>> {
    key.split('|')
        .map(str::trim)
        .map(|kind| {
            if kind.is_empty() {
                Err(CompositionError::EmptyKind {
                    key: key.to_string(),
                })
            } else if CATCH_ALL_KEYS.contains(&kind) {
                Err(CompositionError::CatchAllHandler {
                    key: key.to_string(),
                })
            } else {
                Ok(kind)
            }
        })
        .collect()
}
