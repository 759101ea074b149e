//! Per-server manifests: compose file and reverse-proxy configuration.

use futures::future::try_join_all;
use shipyard_proxy::{Placement, ServerProxy, Strategy, plan_server, render_config};
use tracing::{info, warn};

use crate::compose::{NGINX_SERVICE, render_compose};
use crate::deploy::ServerDeployment;
use crate::error::{GenerateError, GenerateResult};
use crate::layout::{Layout, remove_stale, write};

/// Reverse-proxy switches.
#[derive(Debug, Clone, Copy)]
pub struct ProxyOptions {
    pub allow_override: bool,
    pub default_strategy: Strategy,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            allow_override: false,
            default_strategy: Strategy::LeastConn,
        }
    }
}

/// Every (server, image) pair of the cluster.
pub fn placements(deployments: &[ServerDeployment]) -> Vec<Placement<'_>> {
    deployments
        .iter()
        .flat_map(|d| {
            d.images.iter().map(move |deployed| Placement {
                server: &d.server,
                address: d.address.as_deref(),
                image: deployed.image.name(),
                ports: &deployed.ports,
            })
        })
        .collect()
}

/// Plan the reverse proxy of every server.
pub fn plan_proxies(
    deployments: &[ServerDeployment],
    options: ProxyOptions,
) -> GenerateResult<Vec<ServerProxy>> {
    let placements = placements(deployments);
    deployments
        .iter()
        .map(|d| {
            let proxy = plan_server(
                &d.server,
                &placements,
                options.default_strategy,
                options.allow_override,
            )?;
            check_proxy_ports(d, &proxy)?;
            Ok::<_, GenerateError>(proxy)
        })
        .collect()
}

/// Fail when an image publishes a host port the reverse proxy listens on.
pub fn check_proxy_ports(deployment: &ServerDeployment, proxy: &ServerProxy) -> GenerateResult<()> {
    for port in proxy.listen_ports() {
        let mut images: Vec<String> = deployment
            .images
            .iter()
            .filter(|d| d.ports.iter().any(|p| same_port(p.bound_port(), port)))
            .map(|d| d.image.name().to_string())
            .collect();
        if !images.is_empty() {
            images.push(NGINX_SERVICE.to_string());
            return Err(GenerateError::PortConflict {
                server: deployment.server.clone(),
                port: port.to_string(),
                images,
            });
        }
    }
    Ok(())
}

fn same_port(bound: Option<&str>, listen: &str) -> bool {
    match (bound.and_then(|b| b.parse::<u16>().ok()), listen.parse::<u16>().ok()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Write `servers/<server>/docker-compose.yml` and `nginx.conf` for every
/// deployment. A server without upstreams loses any stale `nginx.conf`.
pub async fn write_manifests(
    deployments: &[ServerDeployment],
    layout: &Layout,
    options: ProxyOptions,
) -> GenerateResult<()> {
    let proxies = plan_proxies(deployments, options)?;

    try_join_all(deployments.iter().zip(&proxies).map(|(deployment, proxy)| async move {
        let compose = render_compose(deployment, proxy)?;
        write(&layout.compose_file(&deployment.server), &compose).await?;

        let nginx = layout.nginx_file(&deployment.server);
        if proxy.is_empty() {
            if remove_stale(&nginx).await? {
                warn!(server = %deployment.server, "removed stale nginx config");
            }
        } else {
            let config = render_config(proxy).await.map_err(|e| {
                GenerateError::template(format!("nginx config of {}", deployment.server), e)
            })?;
            write(&nginx, &config).await?;
        }

        info!(
            server = %deployment.server,
            images = deployment.images.len(),
            upstreams = proxy.upstreams.len(),
            "manifests written"
        );
        Ok::<_, GenerateError>(())
    }))
    .await?;
    Ok(())
}
