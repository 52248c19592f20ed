//! Watcher configuration, loadable from YAML.
//!
//! ```yaml
//! rpc:
//!   http_url: https://eth.llamarpc.com
//!   ws_url: wss://eth.llamarpc.com
//! pipeline:
//!   metadata_timeout_ms: 2000
//!   unknown_events: suppress
//!   output: json
//! poll:
//!   window: 50
//!   max_block_range: 10
//! log:
//!   level: debug
//! ```

use eventscope_core::{Address, RegistryError, SignatureRegistry};
use eventscope_observability::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Node endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP endpoint used for `eth_getLogs`, `eth_blockNumber` and `eth_call`
    #[serde(default)]
    pub http_url: Option<String>,
    /// WebSocket endpoint used for subscriptions
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_max_retries() -> u32 { 3 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: None,
            ws_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Where event declarations come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Declaration file; the bundled list when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Accept a file with no usable declarations
    #[serde(default)]
    pub allow_empty: bool,
}

impl RegistryConfig {
    pub fn load(&self) -> Result<SignatureRegistry, RegistryError> {
        let registry = match &self.path {
            Some(path) => SignatureRegistry::load_file(path)?,
            None => SignatureRegistry::bundled(),
        };
        if registry.is_empty() && !self.allow_empty {
            return Err(RegistryError::Empty);
        }
        Ok(registry)
    }
}

/// What to do with records whose signature is not registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownEventPolicy {
    /// Send `UnknownEvent` results to the sink
    #[default]
    Emit,
    /// Count them, but do not send them to the sink
    Suppress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One human-readable line per result
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bound on each token metadata call
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,
    #[serde(default)]
    pub unknown_events: UnknownEventPolicy,
    #[serde(default)]
    pub output: OutputFormat,
}

fn default_metadata_timeout_ms() -> u64 { 5_000 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_ms: default_metadata_timeout_ms(),
            unknown_events: UnknownEventPolicy::default(),
            output: OutputFormat::default(),
        }
    }
}

impl PipelineConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Blocks behind the head to scan: the range is `[head - window, head]`
    #[serde(default = "default_window")]
    pub window: u64,
    /// Largest block span per `eth_getLogs` call (0 = unlimited)
    #[serde(default)]
    pub max_block_range: u64,
    /// Contracts to restrict the scan to (empty = all)
    #[serde(default)]
    pub addresses: Vec<Address>,
}

fn default_window() -> u64 { 10 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            max_block_range: 0,
            addresses: vec![],
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl WatchConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}
