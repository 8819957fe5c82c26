//! Error types for configuration resolution.
//!
//! Every failure the resolver can report is a [`ConfigError`]. Two variants
//! wrap another error instead of describing a failure themselves:
//!
//! - [`ConfigError::InPreset`] records which preset was being processed when a
//!   preset factory or loader failed.
//! - [`ConfigError::Tagged`] prefixes the message with the file being
//!   configured. The resolver applies it once at the outermost level; an
//!   already tagged error is never tagged again.
//!
//! ## Message Shape
//!
//! ```text
//! [tugweave] src/app.js: unknown option: base.colour (while processing preset: "tugweave-preset-web")
//! ```

use thiserror::Error;
use tugweave_core::CompositionError;

/// What kind of entry a list element was supposed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Plugin,
    Preset,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Plugin => "plugin",
            EntryKind::Preset => "preset",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while resolving a configuration chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A layer body was not an object.
    #[error("invalid options type for {alias}")]
    InvalidOptionsType { alias: String },

    /// `filename` or `babelrc` outside the root arguments.
    #[error("{alias}.{key} is only allowed as a root argument")]
    RootOnlyOption { alias: String, key: String },

    /// `only`, `ignore`, `extends` or `env` inside a preset.
    #[error("{alias}.{key} is not supported in a preset")]
    NotInPreset { alias: String, key: String },

    /// `sourceMap` and `sourceMaps` set to different values.
    #[error("both {alias}.sourceMap and .sourceMaps have been set")]
    ConflictingAlias { alias: String },

    /// An option that existed in an older, incompatible release.
    #[error("using removed option: {alias}.{key} - {guidance}")]
    RemovedOption {
        alias: String,
        key: String,
        guidance: String,
    },

    #[error("unknown option: {alias}.{key}")]
    UnknownOption { alias: String, key: String },

    /// `plugins` or `presets` was not a list.
    #[error("{alias}.{key} should be an array")]
    NotAnArray { alias: String, key: String },

    /// A `[reference, options, ...]` entry with more than two elements.
    #[error("unexpected extra options {extra} passed to {kind}")]
    ExtraOptions { kind: EntryKind, extra: String },

    #[error("falsy value found in {kind}s")]
    FalsyEntry { kind: EntryKind },

    /// A JSON entry that is neither a name, a pair, nor (for presets) a body.
    #[error("invalid {kind} entry: {found}")]
    InvalidEntry { kind: EntryKind, found: String },

    /// A name reached a stage that needs it already loaded.
    #[error("{kind} `{name}` was not loaded; names must be resolved through a loader")]
    UnresolvedName { kind: EntryKind, name: String },

    /// The loader could not find a plugin or preset.
    #[error("cannot find {kind} \"{name}\" relative to directory \"{dirname}\"")]
    NotFound {
        kind: EntryKind,
        name: String,
        dirname: String,
    },

    /// A plugin object carried a key outside the allowed set.
    #[error("plugin {index} specified in \"{location}\" provided an invalid property of \"{key}\"")]
    InvalidPluginProperty {
        location: String,
        index: String,
        key: String,
    },

    /// An allowed plugin key carried a value of the wrong shape.
    #[error("plugin {index} specified in \"{location}\": property \"{key}\" must be {expected}")]
    InvalidPluginPropertyType {
        location: String,
        index: String,
        key: String,
        expected: &'static str,
    },

    /// The plugin's visitor could not be exploded.
    #[error("plugin {index} specified in \"{location}\": {source}")]
    Composition {
        location: String,
        index: String,
        #[source]
        source: CompositionError,
    },

    /// A plugin or preset factory reported a failure.
    #[error("{message}")]
    Factory { message: String },

    /// A preset that includes itself, directly or through other presets.
    #[error("preset {preset} includes itself")]
    PresetCycle { preset: String },

    #[error("presets are nested more than {limit} levels deep")]
    PresetDepthExceeded { limit: usize },

    /// A failure raised while a named preset was being produced.
    #[error("{source} (while processing preset: \"{preset}\")")]
    InPreset {
        preset: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// A failure attributed to the file being configured.
    #[error("[tugweave] {filename}: {source}")]
    Tagged {
        filename: String,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// A failure reported by a plugin or preset factory.
    pub fn factory(message: impl Into<String>) -> Self {
        ConfigError::Factory {
            message: message.into(),
        }
    }

    /// True if the error, or the error a preset annotation wraps, is tagged.
    pub fn is_tagged(&self) -> bool {
        match self {
            ConfigError::Tagged { .. } => true,
            ConfigError::InPreset { source, .. } => source.is_tagged(),
            _ => false,
        }
    }

    /// Attribute the error to `filename`, unless it already is.
    pub fn tag(self, filename: impl Into<String>) -> Self {
        if self.is_tagged() {
            return self;
        }
        ConfigError::Tagged {
            filename: filename.into(),
            source: Box::new(self),
        }
    }

    /// Record that the error happened while processing `preset`.
    pub fn in_preset(self, preset: impl Into<String>) -> Self {
        ConfigError::InPreset {
            preset: preset.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with tagging and preset annotations removed.
    pub fn root_cause(&self) -> &ConfigError {
        match self {
            ConfigError::Tagged { source, .. } | ConfigError::InPreset { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_applies_once() {
        let err = ConfigError::UnknownOption {
            alias: "base".to_string(),
            key: "colour".to_string(),
        };
        let tagged = err.clone().tag("app.js").tag("other.js");
        assert_eq!(
            tagged.to_string(),
            "[tugweave] app.js: unknown option: base.colour"
        );
        assert_eq!(tagged.root_cause(), &err);
    }

    #[test]
    fn in_preset_appends_identity() {
        let err = ConfigError::factory("boom").in_preset("tugweave-preset-web");
        assert_eq!(
            err.to_string(),
            "boom (while processing preset: \"tugweave-preset-web\")"
        );
        assert!(!err.is_tagged());
    }

    #[test]
    fn preset_annotation_keeps_an_inner_tag() {
        let err = ConfigError::factory("boom")
            .tag("inner.js")
            .in_preset("tugweave-preset-web");
        assert!(err.is_tagged());
        let retagged = err.clone().tag("outer.js");
        assert_eq!(retagged, err);
        assert_eq!(
            retagged.to_string(),
            "[tugweave] inner.js: boom (while processing preset: \"tugweave-preset-web\")"
        );
    }

    #[test]
    fn composition_errors_keep_their_source() {
        let err = ConfigError::Composition {
            location: "base".to_string(),
            index: "0".to_string(),
            source: CompositionError::CatchAllHandler {
                key: "enter".to_string(),
            },
        };
        let message = err.to_string();
        assert!(message.starts_with("plugin 0 specified in \"base\":"));
        assert!(message.contains("catch-all"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
