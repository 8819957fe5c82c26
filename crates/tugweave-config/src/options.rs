//! Generic option names, removed options, defaults and merging.
//!
//! Generic options are everything in a layer other than `plugins`, `presets`
//! and `passPerPreset`. They are plain JSON values; the resolver only checks
//! their names and merges them, the consumers (parser, generator, host)
//! interpret them.
//!
//! ## Merge Rules
//!
//! [`merge_options`] folds a newer layer into the accumulated options:
//! - objects merge key by key, recursively
//! - arrays become the newer items followed by older items not already present
//! - anything else is replaced by the newer value

use serde_json::map::Entry;
use serde_json::{json, Map, Value};

/// Option names a layer may carry.
pub const OPTION_NAMES: &[&str] = &[
    "filename",
    "filenameRelative",
    "inputSourceMap",
    "env",
    "mode",
    "retainLines",
    "highlightCode",
    "suppressDeprecationMessages",
    "presets",
    "plugins",
    "ignore",
    "only",
    "code",
    "metadata",
    "ast",
    "extends",
    "comments",
    "shouldPrintComment",
    "wrapPluginVisitorMethod",
    "compact",
    "minified",
    "sourceMaps",
    "sourceMapTarget",
    "sourceFileName",
    "sourceRoot",
    "babelrc",
    "sourceType",
    "auxiliaryCommentBefore",
    "auxiliaryCommentAfter",
    "resolveModuleSource",
    "getModuleId",
    "moduleRoot",
    "moduleIds",
    "moduleId",
    "passPerPreset",
    "parserOpts",
    "generatorOpts",
];

/// Options dropped in an earlier incompatible release, with what to use instead.
pub const REMOVED_OPTIONS: &[(&str, &str)] = &[
    (
        "auxiliaryComment",
        "Use `auxiliaryCommentBefore` or `auxiliaryCommentAfter`",
    ),
    (
        "blacklist",
        "Put the specific transforms you want in the `plugins` option",
    ),
    ("breakConfig", "This is not a necessary option anymore"),
    (
        "experimental",
        "Put the specific transforms you want in the `plugins` option",
    ),
    (
        "externalHelpers",
        "Use the `external-helpers` plugin instead",
    ),
    ("extra", "Pass plugin-specific data through plugin options"),
    (
        "jsxPragma",
        "Use the `pragma` option of the JSX transform plugin",
    ),
    (
        "loose",
        "Specify the `loose` option for the relevant plugin you are using or use a preset that sets the option",
    ),
    (
        "metadataUsedHelpers",
        "Not required anymore as this is enabled by default",
    ),
    (
        "modules",
        "Use the corresponding module transform plugin in the `plugins` option",
    ),
    (
        "nonStandard",
        "Use the JSX and Flow plugins to support JSX and Flow",
    ),
    (
        "optional",
        "Put the specific transforms you want in the `plugins` option",
    ),
    ("sourceMapName", "Use the `sourceMapTarget` option"),
    ("stage", "Check out the corresponding stage-x presets"),
    (
        "whitelist",
        "Put the specific transforms you want in the `plugins` option",
    ),
];

/// Options only the root arguments layer may set.
pub const ROOT_ONLY_OPTIONS: &[&str] = &["filename", "babelrc"];

/// Options a preset may not set.
pub const PRESET_FORBIDDEN_OPTIONS: &[&str] = &["only", "ignore", "extends", "env"];

pub fn is_known_option(key: &str) -> bool {
    OPTION_NAMES.contains(&key)
}

/// Migration guidance for a removed option.
pub fn removed_guidance(key: &str) -> Option<&'static str> {
    REMOVED_OPTIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, guidance)| *guidance)
}

/// Options every resolution starts from.
pub fn bare_options() -> Map<String, Value> {
    [
        ("sourceType", json!("module")),
        ("babelrc", json!(true)),
        ("filename", json!("unknown")),
        ("code", json!(true)),
        ("metadata", json!(true)),
        ("ast", json!(true)),
        ("comments", json!(true)),
        ("compact", json!("auto")),
        ("highlightCode", json!(true)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Fold `source` into `target` following the merge rules above.
pub fn merge_options(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, incoming) in source {
        match target.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
            Entry::Occupied(mut slot) => merge_value(slot.get_mut(), incoming),
        }
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => merge_options(existing, incoming),
        (Value::Array(existing), Value::Array(incoming)) => {
            let mut merged = incoming;
            for item in existing.drain(..) {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
            *existing = merged;
        }
        (existing, incoming) => *existing = incoming,
    }
}

/// Final path component of a `/`- or `\`-separated path.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
