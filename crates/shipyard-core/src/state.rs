//! Provisioning state read back from the Terraform state file.
//!
//! Only `hcloud_server` resources matter here: they carry the public address
//! that manifests and proxy configs point at. Every other resource is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

const SERVER_RESOURCE: &str = "hcloud_server";

/// Live data about one provisioned server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDetails {
    pub address: String,
    /// Raw resource attributes as recorded by the provisioner.
    pub attributes: JsonValue,
}

/// Server name → details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningState {
    servers: BTreeMap<String, ServerDetails>,
}

#[derive(Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    resources: Vec<StateResource>,
}

#[derive(Deserialize)]
struct StateResource {
    #[serde(default)]
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    instances: Vec<StateInstance>,
}

#[derive(Deserialize)]
struct StateInstance {
    attributes: JsonValue,
}

impl ProvisioningState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the state file at `path`; a missing file is an empty state.
    pub async fn load(path: &Path) -> CoreResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_json(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no provisioning state");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json(content: &str) -> CoreResult<Self> {
        let file: StateFile =
            serde_json::from_str(content).map_err(|e| CoreError::State(e.to_string()))?;
        if file.version != 4 {
            return Err(CoreError::State(format!(
                "unsupported state version {}, expected 4",
                file.version
            )));
        }

        let mut state = Self::default();
        let servers = file
            .resources
            .into_iter()
            .filter(|r| r.kind == SERVER_RESOURCE && r.mode != "data");
        for resource in servers {
            for instance in resource.instances {
                let attr = |key: &str| {
                    instance
                        .attributes
                        .get(key)
                        .and_then(JsonValue::as_str)
                        .map(str::to_string)
                };
                let (Some(name), Some(address)) = (attr("name"), attr("ipv4_address")) else {
                    return Err(CoreError::State(format!(
                        "{SERVER_RESOURCE} instance without name or ipv4_address"
                    )));
                };
                state.insert(
                    name,
                    ServerDetails {
                        address,
                        attributes: instance.attributes,
                    },
                );
            }
        }

        debug!(servers = state.servers.len(), "provisioning state loaded");
        Ok(state)
    }

    pub fn insert(&mut self, name: impl Into<String>, details: ServerDetails) {
        self.servers.insert(name.into(), details);
    }

    pub fn server(&self, name: &str) -> Option<&ServerDetails> {
        self.servers.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }
}
