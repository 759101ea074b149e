//! shipyard.toml tool settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const SETTINGS_FILE: &str = "shipyard.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipyardSettings {
    pub output_dir: PathBuf,
    pub registry: RegistrySettings,
    pub proxy: ProxySettings,
    pub apply: ApplySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Registry host that supports wildcard listing.
    pub host: String,
    pub api_url: String,
    /// Environment variable holding the registry API token.
    pub token_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Downgrade duplicate `host:port/path` routes to a warning.
    pub allow_override: bool,
    pub default_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplySettings {
    pub destroy_on_failure: bool,
    pub ready_attempts: u32,
    pub ready_interval_secs: u64,
}

impl Default for ShipyardSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".shipyard"),
            registry: RegistrySettings::default(),
            proxy: ProxySettings::default(),
            apply: ApplySettings::default(),
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            host: "ghcr.io".to_string(),
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            org: None,
            repo: None,
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            allow_override: false,
            default_strategy: "least_conn".to_string(),
        }
    }
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            destroy_on_failure: false,
            ready_attempts: 10,
            ready_interval_secs: 2,
        }
    }
}

impl ShipyardSettings {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Settings(format!("{}: {e}", path.display())))
    }

    /// Read `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Settings(e.to_string()))
    }

    /// Scaffold settings for a project whose images live under `org/repo`.
    pub fn scaffold(org: Option<&str>, repo: Option<&str>) -> Self {
        let mut settings = Self::default();
        settings.registry.org = org.map(str::to_string);
        settings.registry.repo = repo.map(str::to_string);
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_round_trips_through_toml() {
        let settings = ShipyardSettings::scaffold(Some("acme"), Some("shop"));
        let toml_str = settings.to_toml_string().unwrap();
        assert!(toml_str.contains("acme"));
        assert!(toml_str.contains("least_conn"));
        let parsed: ShipyardSettings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: ShipyardSettings = toml::from_str(
            r#"
output_dir = "build"

[proxy]
allow_override = true
"#,
        )
        .unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("build"));
        assert!(settings.proxy.allow_override);
        assert_eq!(settings.proxy.default_strategy, "least_conn");
        assert_eq!(settings.registry.token_env, "GITHUB_TOKEN");
        assert_eq!(settings.apply.ready_attempts, 10);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ShipyardSettings::load_or_default(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, ShipyardSettings::default());
    }

    #[test]
    fn malformed_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "output_dir = [").unwrap();
        assert!(matches!(
            ShipyardSettings::from_file(&path),
            Err(CoreError::Settings(_))
        ));
    }
}
