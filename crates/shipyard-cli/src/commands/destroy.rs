use std::path::Path;

use anyhow::{Result, bail};
use shipyard_generate::Layout;
use tracing::info;

use crate::project::{load_settings, output_dir};
use crate::shell::Terraform;

pub async fn destroy(output: Option<&Path>, settings: &Path) -> Result<()> {
    let settings = load_settings(settings)?;
    let layout = Layout::new(output_dir(output, &settings));
    let dir = layout.terraform_dir();
    if !dir.is_dir() {
        bail!("nothing to destroy: {} does not exist", dir.display());
    }

    info!(dir = %dir.display(), "destroying cluster");
    Terraform::new(dir).destroy().await?;
    println!("✓ Destroyed cluster provisioned from {}", layout.root().display());
    Ok(())
}
