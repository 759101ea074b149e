//! Machines that run services.

use std::collections::BTreeMap;

use serde_yaml_ng::Value as YamlValue;

use super::fields::Fields;
use crate::error::{EntityKind, ValidationError};
use crate::naming::is_hostname;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    name: String,
    server_type: String,
    location: Option<String>,
    ssh_keys: Vec<String>,
    services: Vec<String>,
    volumes: Vec<String>,
    ports: Vec<u16>,
    environment: BTreeMap<String, String>,
}

impl Server {
    /// Validate the options of server `name`.
    ///
    /// The name must be a valid hostname; `server_type`, `ssh_keys` and
    /// `services` are required, the lists non-empty.
    pub fn build(name: &str, options: &YamlValue) -> Result<Self, ValidationError> {
        let f = Fields::new(EntityKind::Server, name, options)?;
        if !is_hostname(name) {
            return Err(f.error(
                "name",
                "a hostname matching [a-z0-9][a-z0-9-]*[a-z0-9]",
                format!("\"{name}\""),
            ));
        }
        f.deny_unknown(&[
            "server_type",
            "location",
            "ssh_keys",
            "services",
            "volumes",
            "ports",
            "environment",
        ])?;

        Ok(Self {
            name: name.to_string(),
            server_type: f.required_string("server_type")?,
            location: f.string("location")?,
            ssh_keys: f.required_list("ssh_keys", false)?,
            services: f.required_list("services", false)?,
            volumes: f.string_list("volumes", false)?,
            ports: f.port_list("ports")?,
            environment: f.string_map("environment")?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_type(&self) -> &str {
        &self.server_type
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn ssh_keys(&self) -> &[String] {
        &self.ssh_keys
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn volumes(&self) -> &[String] {
        &self.volumes
    }

    /// Extra ports opened in the server firewall.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn runs(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    pub fn claims(&self, volume: &str) -> bool {
        self.volumes.iter().any(|v| v == volume)
    }
}
