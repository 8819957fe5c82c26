//! Unified error type and error codes for tugweave.
//!
//! `WeaveError` bridges the configuration and traversal errors of the member
//! crates into one type a host can report, with a stable integer code.
//!
//! ## Error Code Mapping
//!
//! - `2`: Configuration errors (bad options, unknown plugins, broken presets)
//! - `4`: Traversal errors (a plugin handler or hook failed)
//! - `10`: Internal errors (a plugin broke an engine contract, unexpected state)

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tugweave_config::ConfigError;
use tugweave_core::TraverseError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes for hosts that report failures as exit codes or JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// The configuration chain could not be resolved.
    Configuration = 2,
    /// A pass failed while walking the tree.
    Traversal = 4,
    /// Bugs and contract violations.
    InternalError = 10,
}

impl OutputErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Any failure of a transform run.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("{source}")]
    Config {
        #[source]
        source: ConfigError,
    },

    /// A pass failed. `pass` is its index in the resolved plan, when known.
    #[error("{}", traversal_message(.pass, .source))]
    Traverse {
        pass: Option<usize>,
        #[source]
        source: TraverseError,
    },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

fn traversal_message(pass: &Option<usize>, source: &TraverseError) -> String {
    match pass {
        Some(index) => format!("pass {index}: {source}"),
        None => source.to_string(),
    }
}

impl WeaveError {
    pub fn internal(message: impl Into<String>) -> Self {
        WeaveError::InternalError {
            message: message.into(),
        }
    }

    /// Attribute a traversal error to the pass at `index`.
    pub fn in_pass(self, index: usize) -> Self {
        match self {
            WeaveError::Traverse { source, .. } => WeaveError::Traverse {
                pass: Some(index),
                source,
            },
            other => other,
        }
    }

    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&WeaveError> for OutputErrorCode {
    fn from(err: &WeaveError) -> Self {
        match err {
            WeaveError::Config { .. } => OutputErrorCode::Configuration,
            WeaveError::Traverse { source, .. } if source.is_contract_violation() => {
                OutputErrorCode::InternalError
            }
            WeaveError::Traverse { .. } => OutputErrorCode::Traversal,
            WeaveError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<WeaveError> for OutputErrorCode {
    fn from(err: WeaveError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ConfigError> for WeaveError {
    fn from(source: ConfigError) -> Self {
        WeaveError::Config { source }
    }
}

impl From<TraverseError> for WeaveError {
    fn from(source: TraverseError) -> Self {
        WeaveError::Traverse { pass: None, source }
    }
}

// ============================================================================
// JSON Error Info
// ============================================================================

/// Serializable summary of a [`WeaveError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
    /// Plugin the failure is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    /// Index of the failing pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<usize>,
}

impl ErrorInfo {
    pub fn from_error(err: &WeaveError) -> Self {
        let (plugin, pass) = match err {
            WeaveError::Traverse {
                pass,
                source: TraverseError::Handler { plugin, .. },
            } => (Some(plugin.clone()), *pass),
            WeaveError::Traverse { pass, .. } => (None, *pass),
            _ => (None, None),
        };
        ErrorInfo {
            code: err.error_code().code(),
            message: err.to_string(),
            plugin,
            pass,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
