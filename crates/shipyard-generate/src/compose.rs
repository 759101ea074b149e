//! docker compose manifests, one per server.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml_ng::{Mapping, Value as YamlValue};
use shipyard_proxy::ServerProxy;

use crate::deploy::{DeployedImage, ServerDeployment};
use crate::error::{GenerateError, GenerateResult};
use crate::layout::NGINX_FILE;

pub const NGINX_IMAGE: &str = "nginx:1.27-alpine";
pub const NGINX_SERVICE: &str = "nginx";

#[derive(Debug, Serialize)]
struct ComposeFile {
    services: Mapping,
}

#[derive(Debug, Default, Serialize)]
struct ComposeService {
    image: String,
    restart: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    expose: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

impl ComposeService {
    fn for_image(deployed: &DeployedImage) -> Self {
        let mut ports = Vec::new();
        let mut expose = Vec::new();
        for port in &deployed.ports {
            match port.bound_port() {
                Some(bound) => push_new(&mut ports, format!("{bound}:{}", port.container)),
                None => push_new(&mut expose, port.container.clone()),
            }
        }
        Self {
            image: deployed.image.qualified(),
            restart: "unless-stopped",
            ports,
            expose,
            environment: deployed.environment.clone(),
            volumes: deployed.volumes.clone(),
            depends_on: Vec::new(),
        }
    }

    fn nginx(deployment: &ServerDeployment, proxy: &ServerProxy) -> Self {
        Self {
            image: NGINX_IMAGE.to_string(),
            restart: "unless-stopped",
            ports: proxy
                .listen_ports()
                .into_iter()
                .map(|p| format!("{p}:{p}"))
                .collect(),
            volumes: vec![format!("./{NGINX_FILE}:/etc/nginx/nginx.conf:ro")],
            depends_on: deployment
                .images
                .iter()
                .map(|d| d.image.name().to_string())
                .collect(),
            ..Self::default()
        }
    }
}

fn push_new(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Render the compose manifest of one server.
///
/// Each image becomes a service named after the image; a non-empty `proxy`
/// adds the `nginx` service in front of them.
pub fn render_compose(deployment: &ServerDeployment, proxy: &ServerProxy) -> GenerateResult<String> {
    let mut services = Mapping::new();
    for deployed in &deployment.images {
        services.insert(
            YamlValue::String(deployed.image.name().to_string()),
            to_yaml(&ComposeService::for_image(deployed))?,
        );
    }
    if !proxy.is_empty() {
        services.insert(
            YamlValue::String(NGINX_SERVICE.to_string()),
            to_yaml(&ComposeService::nginx(deployment, proxy))?,
        );
    }

    let body = serde_yaml_ng::to_string(&ComposeFile { services }).map_err(|e| {
        GenerateError::Serialize {
            what: format!("compose manifest of {}", deployment.server),
            message: e.to_string(),
        }
    })?;
    Ok(format!(
        "# Generated by shipyard for {}. Do not edit.\n{body}",
        deployment.server
    ))
}

fn to_yaml(service: &ComposeService) -> GenerateResult<YamlValue> {
    serde_yaml_ng::to_value(service).map_err(|e| GenerateError::Serialize {
        what: format!("compose service {}", service.image),
        message: e.to_string(),
    })
}
