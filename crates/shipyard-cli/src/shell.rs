//! Thin wrappers around the external tools: terraform, ssh and scp.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },
}

pub type ShellResult<T> = Result<T, ShellError>;

/// Run `program` to completion and return its stdout.
pub async fn run<I, S>(program: &str, args: I) -> ShellResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running: {:?}", cmd.as_std());

    let output = cmd.output().await.map_err(|source| ShellError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(ShellError::Exit {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `terraform -chdir=<dir> ...`
pub struct Terraform {
    dir: PathBuf,
}

impl Terraform {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn args<'a>(&self, command: &'a [&'a str]) -> Vec<String> {
        let mut args = vec![format!("-chdir={}", self.dir.display())];
        args.extend(command.iter().map(|a| a.to_string()));
        args
    }

    pub async fn init(&self) -> ShellResult<()> {
        run("terraform", self.args(&["init", "-input=false", "-no-color"])).await?;
        Ok(())
    }

    pub async fn apply(&self) -> ShellResult<()> {
        run(
            "terraform",
            self.args(&["apply", "-auto-approve", "-input=false", "-no-color"]),
        )
        .await?;
        Ok(())
    }

    pub async fn destroy(&self) -> ShellResult<()> {
        run(
            "terraform",
            self.args(&["destroy", "-auto-approve", "-input=false", "-no-color"]),
        )
        .await?;
        Ok(())
    }
}

/// One ssh/scp target: `user@address` authenticated by a private key file.
#[derive(Debug, Clone)]
pub struct Remote {
    pub user: String,
    pub address: String,
    pub identity: PathBuf,
    pub known_hosts: PathBuf,
}

impl Remote {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    fn options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.identity.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("UserKnownHostsFile={}", self.known_hosts.display()),
        ]
    }

    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.options();
        args.push(self.destination());
        args.push(command.to_string());
        args
    }

    pub fn scp_args(&self, local: &Path, remote: &str) -> Vec<String> {
        let mut args = self.options();
        args.push("-r".to_string());
        args.push(local.display().to_string());
        args.push(format!("{}:{remote}", self.destination()));
        args
    }

    pub async fn ssh(&self, command: &str) -> ShellResult<String> {
        run("ssh", self.ssh_args(command)).await
    }

    /// Copy `local` recursively into the remote directory `remote`.
    pub async fn upload(&self, local: &Path, remote: &str) -> ShellResult<()> {
        run("scp", self.scp_args(local, remote)).await?;
        Ok(())
    }
}
