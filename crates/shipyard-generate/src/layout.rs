//! Where generated artifacts live below the output directory.

use std::path::{Path, PathBuf};

use crate::error::{GenerateError, GenerateResult};

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const NGINX_FILE: &str = "nginx.conf";
pub const STATE_FILE: &str = "terraform.tfstate";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn terraform_dir(&self) -> PathBuf {
        self.root.join("terraform")
    }

    pub fn state_file(&self) -> PathBuf {
        self.terraform_dir().join(STATE_FILE)
    }

    pub fn ssh_dir(&self) -> PathBuf {
        self.root.join("ssh")
    }

    pub fn private_key(&self, key: &str) -> PathBuf {
        self.ssh_dir().join(key)
    }

    pub fn server_dir(&self, server: &str) -> PathBuf {
        self.root.join("servers").join(server)
    }

    pub fn compose_file(&self, server: &str) -> PathBuf {
        self.server_dir(server).join(COMPOSE_FILE)
    }

    pub fn nginx_file(&self, server: &str) -> PathBuf {
        self.server_dir(server).join(NGINX_FILE)
    }
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) async fn write(path: &Path, contents: &str) -> GenerateResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GenerateError::io(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| GenerateError::io(path, e))
}

/// Remove `path` if it exists. Returns whether a file was removed.
pub(crate) async fn remove_stale(path: &Path) -> GenerateResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(GenerateError::io(path, e)),
    }
}
