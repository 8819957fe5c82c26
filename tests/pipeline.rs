//! End-to-end transforms: JSON configuration in, JSON tree in, JSON tree out.

use std::sync::{Arc, Once};

use serde_json::{json, Value};
use tugweave::{
    layer::LayerKind, registry::PluginContext, ConfigLayer, Field, LayerOptions, Node,
    OutputErrorCode, Pipeline, PluginRef, PluginRegistry, PresetRef, RawPlugin, SharedState,
    StaticLoader,
};
use tugweave_core::{handler, RawVisitor};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn source_tree() -> Node {
    Node::from_json(json!({
        "type": "Program",
        "sourceType": "module",
        "body": [
            {"type": "DebuggerStatement"},
            {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "a"}},
            {"type": "DebuggerStatement"},
            {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "b"}},
        ]
    }))
    .expect("program")
}

/// Removes debugger statements, counting them in shared metadata.
fn strip_debugger() -> PluginRef {
    PluginRef::factory(|_ctx: &PluginContext| {
        let remove = handler(|path, _state| {
            let metadata = &mut path.shared().metadata;
            let removed = metadata
                .get("debuggersRemoved")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            metadata.insert("debuggersRemoved".to_string(), json!(removed + 1));
            path.remove()
        });
        let visitor = RawVisitor::new().handler("DebuggerStatement", remove);
        Ok(RawPlugin::new().name("strip-debugger").visitor(visitor))
    })
}

/// Upper-cases identifiers, with an optional prefix from plugin options.
fn shout() -> PluginRef {
    let rename = handler(|path, state| {
        let prefix = state
            .option("prefix")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = path
            .node()
            .str_value("name")
            .unwrap_or_default()
            .to_uppercase();
        let renamed = Field::Value(json!(format!("{prefix}{name}")));
        path.node_mut().set_field("name", renamed);
        Ok(())
    });
    let visitor = RawVisitor::new().handler("Identifier", rename);
    PluginRef::object(RawPlugin::new().name("shout").visitor(visitor))
}

fn loader() -> StaticLoader {
    StaticLoader::new()
        .with_plugin("tugweave-plugin-strip-debugger", strip_debugger())
        .with_plugin("tugweave-plugin-shout", shout())
        .with_preset(
            "tugweave-preset-cleanup",
            PresetRef::object(LayerOptions::new().plugin("strip-debugger")),
        )
}

#[test]
fn json_configuration_drives_the_transform() {
    init_tracing();
    let registry = PluginRegistry::new();
    let loader = loader();
    let pipeline = Pipeline::new(&registry, &loader);

    let project = ConfigLayer::from_json(
        LayerKind::Options,
        json!({
            "presets": ["cleanup"],
            "plugins": [["shout", {"prefix": "$"}]],
        }),
        "/project/.tugweaverc",
    )
    .expect("object")
    .with_dirname("/project");
    let arguments = ConfigLayer::arguments(LayerOptions::new().option("filename", "src/app.js"));

    let mut tree = source_tree();
    let mut shared = SharedState::new();
    let done = pipeline
        .transform(&[project, arguments], &mut tree, &mut shared)
        .expect("transform");

    assert_eq!(
        done.config.root_pass().keys(),
        vec!["shout", "strip-debugger"]
    );
    assert_eq!(done.options().get("sourceFileName"), Some(&json!("app.js")));
    assert_eq!(shared.metadata.get("debuggersRemoved"), Some(&json!(2)));
    assert_eq!(
        tree.to_json(),
        json!({
            "type": "Program",
            "sourceType": "module",
            "body": [
                {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "$A"}},
                {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "$B"}},
            ]
        })
    );
}

#[test]
fn separate_passes_see_earlier_edits() {
    init_tracing();
    let registry = PluginRegistry::new();
    let loader = loader();
    let pipeline = Pipeline::new(&registry, &loader);

    // The counting plugin runs in a later pass than the stripping preset.
    let count_statements = Arc::new(tugweave::Plugin::new(
        "count",
        tugweave::Visitor::new().on_enter("Program", |path, state| {
            let count = path.node().list("body").map_or(0, <[Node]>::len);
            state.data.insert("statements".to_string(), json!(count));
            Ok(())
        }),
    ));
    let arguments = ConfigLayer::arguments(
        LayerOptions::new()
            .option("passPerPreset", true)
            .preset("cleanup")
            .preset(LayerOptions::new().plugin(count_statements)),
    );

    let mut tree = source_tree();
    let done = pipeline
        .transform(&[arguments], &mut tree, &mut SharedState::new())
        .expect("transform");

    // The root pass is kept even though it is empty.
    assert_eq!(done.passes.len(), 3);
    assert!(done.passes[0].states.is_empty());
    let counted = &done.passes[2].states[0];
    assert_eq!(counted.data.get("statements"), Some(&json!(2)));
}

#[test]
fn unknown_plugin_names_fail_with_a_configuration_code() {
    let registry = PluginRegistry::new();
    let loader = loader();
    let arguments = ConfigLayer::from_json(
        LayerKind::Arguments,
        json!({"filename": "app.js", "plugins": ["missing"]}),
        "base",
    )
    .expect("object");

    let err = Pipeline::new(&registry, &loader)
        .transform(&[arguments], &mut source_tree(), &mut SharedState::new())
        .expect_err("missing plugin");
    assert_eq!(err.error_code(), OutputErrorCode::Configuration);
    assert_eq!(
        err.to_string(),
        "[tugweave] app.js: cannot find plugin \"missing\" relative to directory \".\""
    );
}
