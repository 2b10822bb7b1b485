//! Configuration loading for the natter binary.
//!
//! Settings come from a TOML file (`natter.toml`) with sane defaults for
//! every field; CLI flags override file values in `main`. The resolved
//! listener settings are handed to `natter-server` as-is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use natter_server::RelayConfig;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the relay binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings consumed by the server
    #[serde(default)]
    pub listen: RelayConfig,

    /// Persistence backend selection
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Which persistence backend mirrors routed messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Log each message to the server's own output
    Console,
    /// Append each message as one JSON line to a file
    Jsonl,
}

/// Backend selection plus backend-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,

    /// Output file for the jsonl backend
    #[serde(default = "default_backend_path")]
    pub path: PathBuf,
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Console
}

fn default_backend_path() -> PathBuf {
    PathBuf::from("natter-messages.jsonl")
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Console,
            path: PathBuf::from("natter-messages.jsonl"),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
