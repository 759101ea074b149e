use std::path::Path;

use anyhow::{Context, Result, bail};
use shipyard_core::ShipyardSettings;
use shipyard_core::settings::SETTINGS_FILE;

pub fn init(path: &Path, org: Option<&str>, repo: Option<&str>, force: bool) -> Result<()> {
    let output = path.join(SETTINGS_FILE);
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let settings = ShipyardSettings::scaffold(org, repo);
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    std::fs::write(&output, settings.to_toml_string()?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("✓ Generated {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_scaffold_once() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), Some("acme"), None, false).unwrap();

        let written = ShipyardSettings::from_file(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(written.registry.org.as_deref(), Some("acme"));
        assert_eq!(written.apply.ready_attempts, 10);

        let err = init(dir.path(), None, None, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        init(dir.path(), None, Some("shop"), true).unwrap();
        let written = ShipyardSettings::from_file(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(written.registry.org, None);
        assert_eq!(written.registry.repo.as_deref(), Some("shop"));
    }
}
