//! shipyard-generate: renders a validated cluster into artifacts.
//!
//! # Components
//!
//! - **`provision`**: Terraform JSON for servers, keys, volumes and attachments
//! - **`ssh`**: key files used by Terraform and the deploy step
//! - **`deploy`**: per-server resolution of services into images and ports
//! - **`compose`**: one docker compose manifest per server
//! - **`manifest`**: compose and nginx files written per server

pub mod compose;
pub mod deploy;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod provision;
pub mod ssh;

pub use deploy::{DeployedImage, Planner, ServerDeployment, check_host_ports, check_image_names};
pub use error::{GenerateError, GenerateResult};
pub use layout::Layout;
pub use manifest::{ProxyOptions, check_proxy_ports, plan_proxies, write_manifests};
pub use provision::{check_volume_ownership, write_provisioning};
pub use ssh::write_keys;

use tracing::info;

/// Write the provisioning files and key material.
pub async fn generate_provisioning(
    registry: &shipyard_core::Registry,
    layout: &Layout,
) -> GenerateResult<()> {
    futures::try_join!(write_provisioning(registry, layout), write_keys(registry, layout))?;
    Ok(())
}

/// Resolve every server and write its manifests.
pub async fn generate_manifests(
    planner: &Planner<'_>,
    layout: &Layout,
    options: ProxyOptions,
) -> GenerateResult<Vec<ServerDeployment>> {
    let deployments = planner.resolve_all().await?;
    write_manifests(&deployments, layout, options).await?;
    Ok(deployments)
}

/// Every artifact: provisioning first, then per-server manifests.
pub async fn generate_all(
    planner: &Planner<'_>,
    layout: &Layout,
    options: ProxyOptions,
) -> GenerateResult<Vec<ServerDeployment>> {
    generate_provisioning(planner.registry, layout).await?;
    let deployments = generate_manifests(planner, layout, options).await?;
    info!(
        servers = deployments.len(),
        output = %layout.root().display(),
        "artifacts generated"
    );
    Ok(deployments)
}
