//! Concrete images placed by a service.

use shipyard_core::naming::sanitize;
use shipyard_template::Value;

use crate::reference::{DEFAULT_REGISTRY, ImageRef};

/// One resolved image of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    service: String,
    reference: ImageRef,
    name: String,
}

impl Image {
    /// `reference` must be free of wildcards.
    ///
    /// The name carries every coordinate of the reference; the registry host
    /// is left out only when it is the default one.
    pub fn new(service: &str, reference: ImageRef) -> Self {
        let host = if reference.url == DEFAULT_REGISTRY {
            String::new()
        } else {
            format!("{}-", reference.url)
        };
        let name = sanitize(&format!(
            "{service}-{host}{}-{}-{}",
            reference.org, reference.repo, reference.tag
        ));
        Self {
            service: service.to_string(),
            reference,
            name,
        }
    }

    /// Compose service name and upstream prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    /// `url/org/repo:tag`, as handed to the container runtime.
    pub fn qualified(&self) -> String {
        self.reference.to_string()
    }

    /// The `image` template binding.
    pub fn to_value(&self) -> Value {
        let r = &self.reference;
        Value::object([
            ("name", Value::from(self.name.as_str())),
            ("service", Value::from(self.service.as_str())),
            ("url", Value::from(r.url.as_str())),
            ("org", Value::from(r.org.as_str())),
            ("repo", Value::from(r.repo.as_str())),
            ("tag", Value::from(r.tag.as_str())),
            ("reference", Value::from(self.qualified())),
        ])
    }
}
