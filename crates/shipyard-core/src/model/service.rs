//! Multi-image services and their port, proxy, environment and volume rules.
//!
//! String fields are kept as written: they may reference `server` and `image`
//! bindings that only exist once the service is placed on a server.

use std::collections::BTreeMap;

use serde_yaml_ng::Value as YamlValue;

use super::fields::Fields;
use crate::error::{EntityKind, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    name: String,
    images: Vec<String>,
    ports: Vec<String>,
    proxies: Vec<String>,
    environment: BTreeMap<String, String>,
    volumes: Vec<String>,
}

impl Service {
    pub fn build(name: &str, options: &YamlValue) -> Result<Self, ValidationError> {
        let f = Fields::new(EntityKind::Service, name, options)?;
        f.deny_unknown(&["images", "ports", "proxies", "environment", "volumes"])?;

        let images = f.required_list("images", false)?;
        if images.iter().any(|i| i.trim().is_empty()) {
            return Err(f.error("images", "non-empty image references", "an empty string"));
        }

        Ok(Self {
            name: name.to_string(),
            images,
            ports: f.string_list("ports", true)?,
            proxies: f.string_list("proxies", false)?,
            environment: f.string_map("environment")?,
            volumes: f.string_list("volumes", false)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image references, possibly with wildcards.
    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn volumes(&self) -> &[String] {
        &self.volumes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(yaml: &str) -> Result<Service, ValidationError> {
        Service::build("api", &serde_yaml_ng::from_str(yaml).unwrap())
    }

    #[test]
    fn builds_full_service() {
        let s = build(
            "images: [org/api:v1]\nports: [80, '443:8443']\nproxies: [api.example.com]\nenvironment: {PORT: 8080}\nvolumes: ['data:/var/lib/api']",
        )
        .unwrap();
        assert_eq!(s.images(), &["org/api:v1"]);
        assert_eq!(s.ports(), &["80", "443:8443"]);
        assert_eq!(s.proxies(), &["api.example.com"]);
        assert_eq!(s.environment()["PORT"], "8080");
        assert_eq!(s.volumes(), &["data:/var/lib/api"]);
    }

    #[test]
    fn images_are_required() {
        assert_eq!(build("ports: [80]").unwrap_err().field, "images");
        assert_eq!(build("images: ['']").unwrap_err().received, "an empty string");
    }

    #[test]
    fn template_strings_are_kept_raw() {
        let s = build("images: [latest]\nenvironment: {HOST: '${server.address}'}").unwrap();
        assert_eq!(s.environment()["HOST"], "${server.address}");
    }
}
