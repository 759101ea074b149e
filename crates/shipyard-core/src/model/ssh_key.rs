//! SSH credentials used to register servers and to connect to them.

use serde_yaml_ng::Value as YamlValue;

use super::fields::Fields;
use crate::error::{EntityKind, ValidationError};

const DEFAULT_USER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey {
    name: String,
    user: String,
    private_key: Option<String>,
    public_key: Option<String>,
}

impl SshKey {
    /// Validate the options of ssh key `name`.
    ///
    /// At least one of `private_key` / `public_key` must be present; `user`
    /// defaults to `root`.
    pub fn build(name: &str, options: &YamlValue) -> Result<Self, ValidationError> {
        let f = Fields::new(EntityKind::SshKey, name, options)?;
        f.deny_unknown(&["user", "private_key", "public_key"])?;

        let user = f.string("user")?.unwrap_or_else(|| DEFAULT_USER.to_string());
        let private_key = f.string("private_key")?.filter(|k| !k.trim().is_empty());
        let public_key = f.string("public_key")?.filter(|k| !k.trim().is_empty());

        if private_key.is_none() && public_key.is_none() {
            return Err(f.error("private_key", "private_key or public_key", "neither"));
        }

        Ok(Self {
            name: name.to_string(),
            user,
            private_key,
            public_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Only keys with a private half can open connections.
    pub fn can_connect(&self) -> bool {
        self.private_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(yaml: &str) -> Result<SshKey, ValidationError> {
        SshKey::build("deploy", &serde_yaml_ng::from_str(yaml).unwrap())
    }

    #[test]
    fn defaults_user_to_root() {
        let key = build("public_key: ssh-ed25519 AAAA").unwrap();
        assert_eq!(key.user(), "root");
        assert!(!key.can_connect());
    }

    #[test]
    fn requires_one_half() {
        let err = build("user: admin").unwrap_err();
        assert_eq!(err.field, "private_key");
        assert_eq!(err.received, "neither");
    }

    #[test]
    fn private_key_enables_connections() {
        let key = build("user: deploy\nprivate_key: |\n  -----BEGIN-----\n").unwrap();
        assert!(key.can_connect());
        assert_eq!(key.user(), "deploy");
    }
}
