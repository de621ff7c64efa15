// ==============================================================================
// error.rs — CONFIGURATION ERRORS
// ------------------------------------------------------------------------------
// Error types for bike configuration and rig setup.
// ==============================================================================

use std::fmt;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or wiring a bike configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    Io {
        /// The path that failed.
        path: String,
        /// The error message.
        message: String,
    },
    /// The configuration JSON is malformed.
    Parse {
        /// The error message.
        message: String,
    },
    /// A required rig node is not present in the rig.
    MissingNode {
        /// The owner of the reference (feature or controller).
        owner: &'static str,
        /// The configuration field holding the reference.
        field: &'static str,
        /// The node name that could not be resolved.
        name: String,
    },
    /// A rig node names a parent that was not declared before it.
    UnknownParent {
        /// The node being declared.
        node: String,
        /// The parent it refers to.
        parent: String,
    },
    /// Two rig nodes share the same name.
    DuplicateNode {
        /// The repeated name.
        name: String,
    },
    /// A value cannot be repaired by clamping.
    InvalidValue {
        /// The configuration field.
        field: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "failed to read config {path}: {message}")
            }
            ConfigError::Parse { message } => write!(f, "invalid config json: {message}"),
            ConfigError::MissingNode { owner, field, name } => {
                write!(f, "{owner}: {field} references missing rig node '{name}'")
            }
            ConfigError::UnknownParent { node, parent } => {
                write!(f, "rig node '{node}' has undeclared parent '{parent}'")
            }
            ConfigError::DuplicateNode { name } => write!(f, "rig node '{name}' declared twice"),
            ConfigError::InvalidValue { field, detail } => write!(f, "invalid {field}: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse { message: e.to_string() }
    }
}
