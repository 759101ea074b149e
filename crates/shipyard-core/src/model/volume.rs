//! Block storage volumes mounted on exactly one server.

use serde_yaml_ng::Value as YamlValue;

use super::fields::Fields;
use crate::error::{EntityKind, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    name: String,
    size: f64,
    path: String,
}

impl Volume {
    pub fn build(name: &str, options: &YamlValue) -> Result<Self, ValidationError> {
        let f = Fields::new(EntityKind::Volume, name, options)?;
        f.deny_unknown(&["size", "path"])?;

        let size = match f.number("size")? {
            Some(size) if size > 0.0 => size,
            Some(size) => return Err(f.error("size", "a number greater than 0", size.to_string())),
            None => return Err(f.error("size", "a number", "nothing")),
        };
        let path = f.required_string("path")?;
        if !path.starts_with('/') {
            return Err(f.error("path", "an absolute path", format!("\"{path}\"")));
        }

        Ok(Self {
            name: name.to_string(),
            size,
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in GB.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Mount point on the owning server.
    pub fn path(&self) -> &str {
        &self.path
    }
}
