//! `topograph.toml` configuration.
//!
//! ```toml
//! [graph]
//! uri = "bolt://127.0.0.1:7687"
//! user = "neo4j"
//! password = "password"
//!
//! [graph.retry]
//! max_attempts = 3
//!
//! [source]
//! kind = "onos"
//! url = "http://127.0.0.1:8181/onos/v1"
//!
//! [sync]
//! concurrency = 1
//! persist_host_attributes = false
//! ```
//!
//! Every field is optional. `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`
//! and `ONOS_URL` override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use topograph_core::source::OnosConfig;
use topograph_core::{OnosSource, SnapshotFile, TopologyResult, TopologySource};
use topograph_graph::{GraphConfig, SyncOptions};

/// Config file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_FILE: &str = "topograph.toml";

/// Where the topology snapshot comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Onos(OnosConfig),
    File { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Onos(OnosConfig::default())
    }
}

impl SourceConfig {
    pub fn build(&self) -> TopologyResult<Box<dyn TopologySource>> {
        let source: Box<dyn TopologySource> = match self {
            Self::Onos(onos) => Box::new(OnosSource::new(onos)?),
            Self::File { path } => Box::new(SnapshotFile::new(path)),
        };
        Ok(source)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Onos(onos) => format!("ONOS {}", onos.url),
            Self::File { path } => format!("file {}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub source: SourceConfig,
    pub sync: SyncOptions,
}

impl AppConfig {
    /// Load from `path`, or from `topograph.toml` in the working directory
    /// when it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) {
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Ok(user) = std::env::var("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
        if let (Ok(url), SourceConfig::Onos(onos)) = (std::env::var("ONOS_URL"), &mut self.source) {
            onos.url = url;
        }
    }
}
