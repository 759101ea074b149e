//! Port introspection for images that declare no ports.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use shipyard_template::BoxFuture;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ImageError, ImageResult};

/// Reports the container ports an image exposes.
pub trait ImageInspector: Send + Sync {
    /// Exposed container ports of `reference`, ascending.
    fn exposed_ports<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, ImageResult<Vec<String>>>;
}

/// Inspects images through the local `docker` CLI, pulling them first.
#[derive(Debug, Clone)]
pub struct DockerInspector {
    program: String,
    pull: bool,
}

impl Default for DockerInspector {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            pull: true,
        }
    }
}

impl DockerInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip `docker pull` and inspect whatever is present locally.
    pub fn without_pull(mut self) -> Self {
        self.pull = false;
        self
    }

    async fn run(&self, image: &str, args: &[&str]) -> ImageResult<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| ImageError::Inspect {
                image: image.to_string(),
                message: format!("failed to execute {}: {e}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            return Err(ImageError::Inspect {
                image: image.to_string(),
                message: format!("{} {} exited with {code}: {}", self.program, args[0], stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ImageInspector for DockerInspector {
    fn exposed_ports<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, ImageResult<Vec<String>>> {
        Box::pin(async move {
            if self.pull {
                info!(image = reference, "pulling image");
                self.run(reference, &["pull", "--quiet", reference]).await?;
            }
            let json = self
                .run(
                    reference,
                    &["image", "inspect", "--format", "{{json .Config.ExposedPorts}}", reference],
                )
                .await?;
            let ports = parse_exposed_ports(&json).map_err(|message| ImageError::Inspect {
                image: reference.to_string(),
                message,
            })?;
            debug!(image = reference, ports = ?ports, "inspected exposed ports");
            Ok(ports)
        })
    }
}

/// Parse `Config.ExposedPorts` (`{"8080/tcp": {}}` or `null`) into port
/// numbers, dropping the protocol.
pub fn parse_exposed_ports(json: &str) -> Result<Vec<String>, String> {
    let value: JsonValue = serde_json::from_str(json.trim()).map_err(|e| e.to_string())?;
    let map = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Object(map) => map,
        other => return Err(format!("expected an object of ports, got {other}")),
    };

    let mut ports = BTreeMap::new();
    for key in map.keys() {
        let number = key.split('/').next().unwrap_or(key);
        let port: u16 = number
            .parse()
            .map_err(|_| format!("invalid exposed port {key:?}"))?;
        ports.insert(port, number.to_string());
    }
    Ok(ports.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_ports() {
        let ports = parse_exposed_ports(r#"{"8080/tcp":{},"443/tcp":{},"53/udp":{}}"#).unwrap();
        assert_eq!(ports, vec!["53", "443", "8080"]);
    }

    #[test]
    fn null_means_no_ports() {
        assert!(parse_exposed_ports("null\n").unwrap().is_empty());
    }

    #[test]
    fn merges_protocols_of_one_port() {
        let ports = parse_exposed_ports(r#"{"53/tcp":{},"53/udp":{}}"#).unwrap();
        assert_eq!(ports, vec!["53"]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_exposed_ports("[1]").is_err());
        assert!(parse_exposed_ports(r#"{"http/tcp":{}}"#).is_err());
    }
}
