//! Cluster state, spec and config files.

use anyhow::{Context, Result};
use netalloc_port::PortAllocatorConfig;
use netalloc_types::{Endpoint, EndpointSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Persisted endpoints, keyed by service name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default)]
    pub endpoints: BTreeMap<String, Endpoint>,
}

impl ClusterState {
    /// Loads the state file. A missing file is an empty cluster.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("State file {:?} not found, starting empty", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cluster state from {:?}", path))?;
        let state: ClusterState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cluster state from {:?}", path))?;
        debug!("Loaded {} endpoint(s) from {:?}", state.endpoints.len(), path);
        Ok(state)
    }

    /// Writes the state file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize cluster state")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write cluster state to {:?}", path))?;
        debug!("Saved {} endpoint(s) to {:?}", self.endpoints.len(), path);
        Ok(())
    }

    /// Returns the stored endpoint of a service, or an unallocated one.
    pub fn endpoint(&self, service: &str) -> Endpoint {
        self.endpoints.get(service).cloned().unwrap_or_default()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Loads an endpoint spec from a JSON or YAML file (by extension).
pub fn load_spec(path: &Path) -> Result<EndpointSpec> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read endpoint spec from {:?}", path))?;
    let spec = if is_yaml(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse endpoint spec from {:?}", path))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse endpoint spec from {:?}", path))?
    };
    Ok(spec)
}

/// Loads the allocator configuration from a YAML file, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PortAllocatorConfig> {
    let Some(path) = path else {
        return Ok(PortAllocatorConfig::default());
    };

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read allocator config from {:?}", path))?;
    let config: PortAllocatorConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse allocator config from {:?}", path))?;
    config
        .validate()
        .with_context(|| format!("Invalid allocator config in {:?}", path))?;
    Ok(config)
}
