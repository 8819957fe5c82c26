//! End-to-end transform: resolve a configuration chain, then run its passes.
//!
//! A transform is three steps:
//! 1. resolve the chain into options and passes
//! 2. let every plugin adjust the merged options
//! 3. run each pass over the tree, in order
//!
//! Each pass sees the tree as the previous pass left it. A pass stopped by a
//! handler still counts as completed; the next pass runs normally. The first
//! error aborts the transform and leaves the tree as the failing pass left it.

use serde_json::{Map, Value};
use tracing::debug;
use tugweave_config::{
    ConfigLayer, ConfigResolver, Loader, NoLoader, PluginRegistry, ResolvedConfig,
};
use tugweave_core::{run, Node, RunSummary, SharedState};

use crate::error::WeaveError;

/// Result of a completed transform.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub config: ResolvedConfig,
    /// One summary per pass, in run order.
    pub passes: Vec<RunSummary>,
}

impl Transformed {
    pub fn options(&self) -> &Map<String, Value> {
        &self.config.options
    }

    /// True if any pass was stopped early.
    pub fn stopped(&self) -> bool {
        self.passes.iter().any(|summary| summary.stopped)
    }
}

/// A resolver front end that runs the resolved passes.
pub struct Pipeline<'r> {
    resolver: ConfigResolver<'r>,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r PluginRegistry, loader: &'r dyn Loader) -> Self {
        Self {
            resolver: ConfigResolver::new(registry, loader),
        }
    }

    /// Resolve `chain` and run every pass over `tree`.
    ///
    /// When `shared` has no filename, it takes the resolved `filename`.
    pub fn transform(
        &self,
        chain: &[ConfigLayer],
        tree: &mut Node,
        shared: &mut SharedState,
    ) -> Result<Transformed, WeaveError> {
        let mut config = self.resolver.resolve(chain)?;
        config.manipulate_options();

        if shared.filename.is_none() {
            shared.filename = Some(config.filename().to_string());
        }

        let mut passes = Vec::with_capacity(config.passes.len());
        for (index, pass) in config.passes.iter().enumerate() {
            debug!(pass = index, plugins = pass.len(), "running pass");
            let summary =
                run(pass, tree, shared).map_err(|err| WeaveError::from(err).in_pass(index))?;
            passes.push(summary);
        }

        Ok(Transformed { config, passes })
    }
}

/// Transform `tree` with the process-wide plugin registry and no name loader.
pub fn transform(
    chain: &[ConfigLayer],
    tree: &mut Node,
    shared: &mut SharedState,
) -> Result<Transformed, WeaveError> {
    Pipeline::new(PluginRegistry::global(), &NoLoader).transform(chain, tree, shared)
}
