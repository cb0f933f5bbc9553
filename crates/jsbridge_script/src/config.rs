//! Context configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::marshal::MarshalLimits;

/// Default limit on marshaling depth.
pub const DEFAULT_MAX_MARSHAL_DEPTH: usize = 256;

/// Default limit on the number of values one marshal call converts.
pub const DEFAULT_MAX_MARSHAL_NODES: usize = 1_000_000;

/// Per-context settings.
///
/// Every field is optional in the serialized form; absent fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Diagnostic label. Auto-generated (`program_NNNNN`) when absent.
    pub label: Option<String>,
    /// Heap limit in bytes for the context's runtime.
    pub memory_limit: Option<usize>,
    /// Native stack limit in bytes for script execution.
    pub max_stack_size: Option<usize>,
    /// Allocation volume in bytes that triggers an automatic GC pass.
    pub gc_threshold: Option<usize>,
    /// Evaluate scripts in strict mode.
    pub strict: bool,
    /// Deepest array/object nesting the marshaler will follow.
    pub max_marshal_depth: usize,
    /// Most values (array elements and properties included) one marshal
    /// call will convert.
    pub max_marshal_nodes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            label: None,
            memory_limit: None,
            max_stack_size: None,
            gc_threshold: None,
            strict: false,
            max_marshal_depth: DEFAULT_MAX_MARSHAL_DEPTH,
            max_marshal_nodes: DEFAULT_MAX_MARSHAL_NODES,
        }
    }
}

impl ContextConfig {
    /// Default settings with a fixed label.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn marshal_limits(&self) -> MarshalLimits {
        MarshalLimits {
            max_depth: self.max_marshal_depth,
            max_nodes: self.max_marshal_nodes,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
