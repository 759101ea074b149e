//! `shipyard apply`: provision, then deploy every server.
//!
//! Order matters: Terraform runs first, its state supplies the addresses the
//! manifests and proxy configs are rendered with, then each server is
//! waited for, receives its directory and starts its compose project.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use futures::future::try_join_all;
use shipyard_core::{ProvisioningState, Registry};
use shipyard_generate::{ServerDeployment, generate_manifests, generate_provisioning};
use tracing::{error, info};

use crate::ProjectArgs;
use crate::project::Project;
use crate::ready::{Backoff, wait_until};
use crate::shell::{Remote, Terraform};

/// Where server directories land on the remote host.
const REMOTE_ROOT: &str = "/opt/shipyard";

pub async fn apply(args: &ProjectArgs, destroy_on_failure: bool) -> Result<()> {
    let project = Project::load(args).await?;
    let destroy_on_failure = destroy_on_failure || project.settings.apply.destroy_on_failure;

    generate_provisioning(&project.registry, &project.layout).await?;
    let terraform = Terraform::new(project.layout.terraform_dir());
    terraform.init().await?;

    match rollout(&project, &terraform).await {
        Ok(count) => {
            println!("✓ Deployed {count} server(s)");
            Ok(())
        }
        Err(e) if destroy_on_failure => {
            error!(error = %e, "apply failed, destroying the cluster");
            if let Err(teardown) = terraform.destroy().await {
                error!(error = %teardown, "teardown failed");
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

async fn rollout(project: &Project, terraform: &Terraform) -> Result<usize> {
    info!(servers = project.registry.servers().len(), "provisioning");
    terraform.apply().await?;

    let state = project.state().await?;
    check_state(&project.registry, &state)?;

    let deployments =
        generate_manifests(&project.planner(&state), &project.layout, project.options).await?;

    let backoff = Backoff::new(
        project.settings.apply.ready_attempts,
        Duration::from_secs(project.settings.apply.ready_interval_secs),
    );
    try_join_all(
        deployments
            .iter()
            .map(|d| deploy_server(project, d, backoff.clone())),
    )
    .await?;
    Ok(deployments.len())
}

/// Every server must have an address once the provisioner is done.
fn check_state(registry: &Registry, state: &ProvisioningState) -> Result<()> {
    let missing: Vec<&str> = registry
        .servers()
        .iter()
        .map(|s| s.name())
        .filter(|name| state.server(name).is_none())
        .collect();
    if !missing.is_empty() {
        bail!(
            "provisioning state has no address for server(s): {}",
            missing.join(", ")
        );
    }
    Ok(())
}

fn remote_for(project: &Project, deployment: &ServerDeployment) -> Result<Remote> {
    let server = project
        .registry
        .server(&deployment.server)
        .ok_or_else(|| anyhow!("unknown server {}", deployment.server))?;
    let key = project
        .registry
        .keys_of(server)
        .find(|k| k.can_connect())
        .ok_or_else(|| anyhow!("server {} has no ssh key with a private half", server.name()))?;
    let address = deployment
        .address
        .clone()
        .ok_or_else(|| anyhow!("server {} has no address", server.name()))?;

    Ok(Remote {
        user: key.user().to_string(),
        address,
        identity: project.layout.private_key(key.name()),
        known_hosts: project.layout.ssh_dir().join("known_hosts"),
    })
}

async fn deploy_server(
    project: &Project,
    deployment: &ServerDeployment,
    backoff: Backoff,
) -> Result<()> {
    let server = deployment.server.as_str();
    let remote = &remote_for(project, deployment)?;

    wait_until(server, backoff, move || async move {
        remote.ssh("true").await.map(drop)
    })
    .await
    .with_context(|| format!("server {server} never accepted ssh connections"))?;

    let target = format!("{REMOTE_ROOT}/{server}");
    remote
        .ssh(&format!("rm -rf {target} && mkdir -p {REMOTE_ROOT}"))
        .await?;
    remote
        .upload(&project.layout.server_dir(server), REMOTE_ROOT)
        .await
        .with_context(|| format!("failed to upload manifests to {server}"))?;
    remote
        .ssh(&format!("cd {target} && docker compose up -d --remove-orphans"))
        .await
        .with_context(|| format!("docker compose failed on {server}"))?;

    info!(server, address = %remote.address, images = deployment.images.len(), "server deployed");
    Ok(())
}
