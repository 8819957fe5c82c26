// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Node kind table: which fields of each kind hold traversable children.
//!
//! The table has two layers:
//!
//! - **Base**: the canonical child-field layout per kind. Seeded with a core
//!   ECMAScript shape and extended permanently with [`register_kind`].
//! - **Overlay**: a stack of temporary alias entries. A foreign parser can
//!   declare that its `Property` nodes should be walked like `ObjectProperty`
//!   nodes; the walk installs that entry with [`install`] and the returned
//!   [`AliasGuard`] removes exactly the entries it installed when dropped,
//!   including on early returns, errors and panics.
//!
//! Lookups consult the overlay first (most recently installed wins), then the
//! base layer. Walks read from a [`KindTable`] snapshot taken after aliases
//! are installed, so the global lock is not held while handlers run.
//!
//! # Example
//!
//! ```
//! use tugweave_core::kinds::{self, KindAlias};
//!
//! let guard = kinds::install(&[KindAlias::same_as("Property", "ObjectProperty")])
//!     .expect("ObjectProperty is a known kind");
//! assert!(kinds::is_aliased("Property"));
//! drop(guard);
//! assert!(!kinds::is_aliased("Property"));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::error::{TraverseError, TraverseResult};

/// Shared, immutable list of child field names.
pub type ChildFields = Arc<[String]>;

// ============================================================================
// Alias declarations
// ============================================================================

/// How an aliased kind obtains its child fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// Walk like this canonical kind (fields copied at install time).
    SameAs(String),
    /// Walk these fields, in this order.
    Fields(Vec<String>),
}

/// A temporary mapping from a foreign kind name to a child-field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindAlias {
    /// The foreign kind name as it appears in the tree.
    pub kind: String,
    /// Where its child fields come from.
    pub target: AliasTarget,
}

impl KindAlias {
    /// Walk `kind` exactly like `canonical`.
    pub fn same_as(kind: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: AliasTarget::SameAs(canonical.into()),
        }
    }

    /// Walk `kind` through an explicit list of child fields.
    pub fn with_fields<I, S>(kind: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            target: AliasTarget::Fields(fields.into_iter().map(Into::into).collect()),
        }
    }
}

// ============================================================================
// KindTable
// ============================================================================

/// Resolved child-field table used by a walk.
#[derive(Debug, Clone, Default)]
pub struct KindTable {
    fields: HashMap<String, ChildFields>,
}

impl KindTable {
    /// An empty table: every kind is a leaf.
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical ECMAScript layout with JSX and Flow kinds, without any
    /// process-wide additions.
    pub fn canonical() -> Self {
        let mut table = Self::new();
        let rows = CANONICAL_KINDS.iter().chain(JSX_KINDS).chain(FLOW_KINDS);
        for &(kind, fields) in rows {
            table.insert(kind, fields.iter().copied());
        }
        table
    }

    /// Set the child fields of `kind`.
    pub fn insert<I, S>(&mut self, kind: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.fields.insert(kind.into(), fields.into());
    }

    /// Child fields of `kind`, or `None` for unknown kinds.
    pub fn child_fields(&self, kind: &str) -> Option<&ChildFields> {
        self.fields.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.fields.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// KindAliasTable (process-wide)
// ============================================================================

#[derive(Debug)]
struct OverlayEntry {
    id: u64,
    kind: String,
    fields: ChildFields,
}

/// Process-wide kind table with a stack of temporary alias entries.
#[derive(Debug)]
pub struct KindAliasTable {
    base: KindTable,
    overlay: Vec<OverlayEntry>,
}

impl KindAliasTable {
    fn new() -> Self {
        Self {
            base: KindTable::canonical(),
            overlay: Vec::new(),
        }
    }

    fn lookup(&self, kind: &str) -> Option<ChildFields> {
        self.overlay
            .iter()
            .rev()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.fields.clone())
            .or_else(|| self.base.child_fields(kind).cloned())
    }

    fn snapshot(&self) -> KindTable {
        let mut table = self.base.clone();
        // Oldest first so the most recent entry for a kind wins.
        for entry in &self.overlay {
            table
                .fields
                .insert(entry.kind.clone(), entry.fields.clone());
        }
        table
    }
}

static KIND_TABLE: LazyLock<RwLock<KindAliasTable>> =
    LazyLock::new(|| RwLock::new(KindAliasTable::new()));

static NEXT_ALIAS_ID: AtomicU64 = AtomicU64::new(1);

// Handlers cannot run while the lock is held, so a poisoned lock only means a
// panic happened elsewhere; the table itself is still consistent.
fn read_table() -> std::sync::RwLockReadGuard<'static, KindAliasTable> {
    KIND_TABLE.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_table() -> std::sync::RwLockWriteGuard<'static, KindAliasTable> {
    KIND_TABLE.write().unwrap_or_else(PoisonError::into_inner)
}

/// Permanently register the canonical child fields of a kind.
pub fn register_kind<I, S>(kind: impl Into<String>, fields: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    write_table().base.insert(kind, fields);
}

/// Child fields of `kind`, honoring installed aliases.
pub fn child_fields(kind: &str) -> Option<ChildFields> {
    read_table().lookup(kind)
}

/// True while at least one temporary alias entry for `kind` is installed.
pub fn is_aliased(kind: &str) -> bool {
    read_table().overlay.iter().any(|entry| entry.kind == kind)
}

/// Number of temporary alias entries currently installed.
pub fn installed_alias_count() -> usize {
    read_table().overlay.len()
}

/// Resolved copy of the current table, aliases included.
pub fn snapshot() -> KindTable {
    read_table().snapshot()
}

/// Install temporary alias entries.
///
/// All targets are resolved before anything is installed, so a failing
/// declaration leaves the table untouched.
pub fn install(aliases: &[KindAlias]) -> TraverseResult<AliasGuard> {
    if aliases.is_empty() {
        return Ok(AliasGuard { ids: Vec::new() });
    }

    let mut table = write_table();
    let mut entries = Vec::with_capacity(aliases.len());
    for alias in aliases {
        let fields = match &alias.target {
            AliasTarget::SameAs(target) => {
                table
                    .lookup(target)
                    .ok_or_else(|| TraverseError::UnknownAliasTarget {
                        alias: alias.kind.clone(),
                        target: target.clone(),
                    })?
            }
            AliasTarget::Fields(fields) => fields.clone().into(),
        };
        entries.push(OverlayEntry {
            id: NEXT_ALIAS_ID.fetch_add(1, Ordering::Relaxed),
            kind: alias.kind.clone(),
            fields,
        });
    }

    let ids: Vec<u64> = entries.iter().map(|entry| entry.id).collect();
    table.overlay.extend(entries);
    debug!(count = ids.len(), "installed kind aliases");
    Ok(AliasGuard { ids })
}

/// Removes the alias entries it owns when dropped.
#[derive(Debug)]
#[must_use = "aliases are removed as soon as the guard is dropped"]
pub struct AliasGuard {
    ids: Vec<u64>,
}

impl AliasGuard {
    /// Number of entries owned by this guard.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Drop for AliasGuard {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        let mut table = write_table();
        table.overlay.retain(|entry| !self.ids.contains(&entry.id));
        debug!(count = self.ids.len(), "removed kind aliases");
    }
}

// ============================================================================
// Canonical layout
// ============================================================================

/// Canonical child fields for the core ECMAScript node kinds.
const CANONICAL_KINDS: &[(&str, &[&str])] = &[
    ("File", &["program"]),
    ("Program", &["directives", "body"]),
    ("Directive", &["value"]),
    ("DirectiveLiteral", &[]),
    ("BlockStatement", &["directives", "body"]),
    ("EmptyStatement", &[]),
    ("DebuggerStatement", &[]),
    ("ExpressionStatement", &["expression"]),
    ("IfStatement", &["test", "consequent", "alternate"]),
    ("LabeledStatement", &["label", "body"]),
    ("BreakStatement", &["label"]),
    ("ContinueStatement", &["label"]),
    ("WithStatement", &["object", "body"]),
    ("SwitchStatement", &["discriminant", "cases"]),
    ("SwitchCase", &["test", "consequent"]),
    ("ReturnStatement", &["argument"]),
    ("ThrowStatement", &["argument"]),
    ("TryStatement", &["block", "handler", "finalizer"]),
    ("CatchClause", &["param", "body"]),
    ("WhileStatement", &["test", "body"]),
    ("DoWhileStatement", &["body", "test"]),
    ("ForStatement", &["init", "test", "update", "body"]),
    ("ForInStatement", &["left", "right", "body"]),
    ("ForOfStatement", &["left", "right", "body"]),
    (
        "FunctionDeclaration",
        &["id", "params", "body", "returnType", "typeParameters"],
    ),
    ("VariableDeclaration", &["declarations"]),
    ("VariableDeclarator", &["id", "init"]),
    (
        "ClassDeclaration",
        &[
            "id",
            "body",
            "superClass",
            "mixins",
            "typeParameters",
            "superTypeParameters",
            "implements",
            "decorators",
        ],
    ),
    (
        "ClassExpression",
        &[
            "id",
            "body",
            "superClass",
            "mixins",
            "typeParameters",
            "superTypeParameters",
            "implements",
            "decorators",
        ],
    ),
    ("ClassBody", &["body"]),
    (
        "ClassMethod",
        &[
            "key",
            "params",
            "body",
            "decorators",
            "returnType",
            "typeParameters",
        ],
    ),
    (
        "ClassProperty",
        &["key", "value", "typeAnnotation", "decorators"],
    ),
    ("Identifier", &["typeAnnotation"]),
    ("StringLiteral", &[]),
    ("NumericLiteral", &[]),
    ("BooleanLiteral", &[]),
    ("NullLiteral", &[]),
    ("RegExpLiteral", &[]),
    ("TemplateLiteral", &["quasis", "expressions"]),
    ("TemplateElement", &[]),
    ("TaggedTemplateExpression", &["tag", "quasi"]),
    ("ThisExpression", &[]),
    ("Super", &[]),
    ("ArrayExpression", &["elements"]),
    ("ObjectExpression", &["properties"]),
    (
        "ObjectMethod",
        &[
            "key",
            "params",
            "body",
            "decorators",
            "returnType",
            "typeParameters",
        ],
    ),
    ("ObjectProperty", &["key", "value", "decorators"]),
    ("SpreadElement", &["argument"]),
    ("RestElement", &["argument", "typeAnnotation"]),
    (
        "FunctionExpression",
        &["id", "params", "body", "returnType", "typeParameters"],
    ),
    (
        "ArrowFunctionExpression",
        &["params", "body", "returnType", "typeParameters"],
    ),
    ("UnaryExpression", &["argument"]),
    ("UpdateExpression", &["argument"]),
    ("BinaryExpression", &["left", "right"]),
    ("LogicalExpression", &["left", "right"]),
    ("AssignmentExpression", &["left", "right"]),
    ("AssignmentPattern", &["left", "right"]),
    ("ArrayPattern", &["elements", "typeAnnotation"]),
    ("ObjectPattern", &["properties", "typeAnnotation"]),
    ("MemberExpression", &["object", "property"]),
    (
        "ConditionalExpression",
        &["test", "consequent", "alternate"],
    ),
    ("CallExpression", &["callee", "arguments"]),
    ("NewExpression", &["callee", "arguments"]),
    ("SequenceExpression", &["expressions"]),
    ("ParenthesizedExpression", &["expression"]),
    ("YieldExpression", &["argument"]),
    ("AwaitExpression", &["argument"]),
    ("ImportDeclaration", &["specifiers", "source"]),
    ("ImportSpecifier", &["local", "imported"]),
    ("ImportDefaultSpecifier", &["local"]),
    ("ImportNamespaceSpecifier", &["local"]),
    (
        "ExportNamedDeclaration",
        &["declaration", "specifiers", "source"],
    ),
    ("ExportDefaultDeclaration", &["declaration"]),
    ("ExportAllDeclaration", &["source"]),
    ("ExportSpecifier", &["local", "exported"]),
    ("MetaProperty", &["meta", "property"]),
    ("Decorator", &["expression"]),
];

/// JSX elements and their parts.
const JSX_KINDS: &[(&str, &[&str])] = &[
    ("JSXAttribute", &["name", "value"]),
    ("JSXClosingElement", &["name"]),
    (
        "JSXElement",
        &["openingElement", "children", "closingElement"],
    ),
    ("JSXEmptyExpression", &[]),
    ("JSXExpressionContainer", &["expression"]),
    ("JSXSpreadChild", &["expression"]),
    ("JSXIdentifier", &[]),
    ("JSXMemberExpression", &["object", "property"]),
    ("JSXNamespacedName", &["namespace", "name"]),
    ("JSXOpeningElement", &["name", "attributes"]),
    ("JSXSpreadAttribute", &["argument"]),
    ("JSXText", &[]),
    (
        "JSXFragment",
        &["openingFragment", "children", "closingFragment"],
    ),
    ("JSXOpeningFragment", &[]),
    ("JSXClosingFragment", &[]),
];

/// Flow type annotations and declarations.
const FLOW_KINDS: &[(&str, &[&str])] = &[
    ("TypeAnnotation", &["typeAnnotation"]),
    ("TypeCastExpression", &["expression", "typeAnnotation"]),
    ("TypeParameter", &["bound"]),
    ("TypeParameterDeclaration", &["params"]),
    ("TypeParameterInstantiation", &["params"]),
    ("TypeAlias", &["id", "typeParameters", "right"]),
    (
        "InterfaceDeclaration",
        &["id", "typeParameters", "extends", "body"],
    ),
    ("InterfaceExtends", &["id", "typeParameters"]),
    ("ClassImplements", &["id", "typeParameters"]),
    ("DeclareClass", &["id", "typeParameters", "extends", "body"]),
    ("DeclareFunction", &["id"]),
    (
        "DeclareInterface",
        &["id", "typeParameters", "extends", "body"],
    ),
    ("DeclareModule", &["id", "body"]),
    ("DeclareModuleExports", &["typeAnnotation"]),
    ("DeclareTypeAlias", &["id", "typeParameters", "right"]),
    ("DeclareVariable", &["id"]),
    ("AnyTypeAnnotation", &[]),
    ("MixedTypeAnnotation", &[]),
    ("EmptyTypeAnnotation", &[]),
    ("VoidTypeAnnotation", &[]),
    ("ThisTypeAnnotation", &[]),
    ("ExistentialTypeParam", &[]),
    ("BooleanTypeAnnotation", &[]),
    ("BooleanLiteralTypeAnnotation", &[]),
    ("NullLiteralTypeAnnotation", &[]),
    ("NumberTypeAnnotation", &[]),
    ("NumericLiteralTypeAnnotation", &[]),
    ("StringTypeAnnotation", &[]),
    ("StringLiteralTypeAnnotation", &[]),
    ("ArrayTypeAnnotation", &["elementType"]),
    ("NullableTypeAnnotation", &["typeAnnotation"]),
    ("TupleTypeAnnotation", &["types"]),
    ("UnionTypeAnnotation", &["types"]),
    ("IntersectionTypeAnnotation", &["types"]),
    ("TypeofTypeAnnotation", &["argument"]),
    ("GenericTypeAnnotation", &["id", "typeParameters"]),
    ("QualifiedTypeIdentifier", &["id", "qualification"]),
    (
        "FunctionTypeAnnotation",
        &["typeParameters", "params", "rest", "returnType"],
    ),
    ("FunctionTypeParam", &["name", "typeAnnotation"]),
    (
        "ObjectTypeAnnotation",
        &["properties", "indexers", "callProperties"],
    ),
    ("ObjectTypeProperty", &["key", "value"]),
    ("ObjectTypeIndexer", &["id", "key", "value"]),
    ("ObjectTypeCallProperty", &["value"]),
    ("ObjectTypeSpreadProperty", &["argument"]),
];

// ============================================================================
// Tests
// ============================================================================
