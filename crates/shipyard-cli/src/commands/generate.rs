use anyhow::Result;
use shipyard_generate::generate_all;
use tracing::info;

use crate::ProjectArgs;
use crate::project::Project;

pub async fn generate(args: &ProjectArgs) -> Result<()> {
    let project = Project::load(args).await?;
    let state = project.state().await?;
    if state.is_empty() {
        info!("no provisioning state yet, server addresses render as null");
    }

    let deployments = generate_all(&project.planner(&state), &project.layout, project.options).await?;

    println!(
        "✓ Generated artifacts for {} server(s) in {}",
        deployments.len(),
        project.layout.root().display()
    );
    Ok(())
}
