//! SSH key material for the provisioner and the deploy step.

use std::path::Path;

use futures::future::try_join_all;
use shipyard_core::{Registry, SshKey};
use tracing::debug;

use crate::error::{GenerateError, GenerateResult};
use crate::layout::{Layout, write};

const DIR_MODE: u32 = 0o700;
const PRIVATE_MODE: u32 = 0o600;
const PUBLIC_MODE: u32 = 0o644;

/// Write `<key>` and `<key>.pub` for every key half that is set.
pub async fn write_keys(registry: &Registry, layout: &Layout) -> GenerateResult<()> {
    let dir = layout.ssh_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| GenerateError::io(&dir, e))?;
    set_mode(&dir, DIR_MODE).await?;

    try_join_all(registry.ssh_keys().iter().map(|key| write_key(layout, key))).await?;
    debug!(keys = registry.ssh_keys().len(), "ssh keys written");
    Ok(())
}

async fn write_key(layout: &Layout, key: &SshKey) -> GenerateResult<()> {
    let private = layout.private_key(key.name());
    if let Some(material) = key.private_key() {
        write(&private, &with_newline(material)).await?;
        set_mode(&private, PRIVATE_MODE).await?;
    }
    if let Some(material) = key.public_key() {
        let public = private.with_file_name(format!("{}.pub", key.name()));
        write(&public, &with_newline(material)).await?;
        set_mode(&public, PUBLIC_MODE).await?;
    }
    Ok(())
}

/// OpenSSH refuses private keys without a trailing newline.
fn with_newline(material: &str) -> String {
    let trimmed = material.trim_end();
    format!("{trimmed}\n")
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> GenerateResult<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| GenerateError::io(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> GenerateResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_both_halves() {
        let reg = Registry::parse(
            "ssh_keys:\n  deploy:\n    public_key: ssh-ed25519 AAAA\n    private_key: |\n      -----BEGIN-----\n      abc\n      -----END-----\n  ci:\n    public_key: ssh-ed25519 BBBB\n",
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        write_keys(&reg, &layout).await.unwrap();

        let private = std::fs::read_to_string(layout.private_key("deploy")).unwrap();
        assert!(private.ends_with("-----END-----\n"));
        assert_eq!(
            std::fs::read_to_string(layout.ssh_dir().join("ci.pub")).unwrap(),
            "ssh-ed25519 BBBB\n"
        );
        assert!(!layout.private_key("ci").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn applies_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let reg = Registry::parse("ssh_keys:\n  deploy:\n    public_key: pub\n    private_key: priv\n").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        write_keys(&reg, &layout).await.unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&layout.ssh_dir()), 0o700);
        assert_eq!(mode(&layout.private_key("deploy")), 0o600);
        assert_eq!(mode(&layout.ssh_dir().join("deploy.pub")), 0o644);
    }
}
