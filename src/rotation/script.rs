//! Rotation handlers backed by executables on disk.
//!
//! A handler for `/senvar/shop/prod/dbPassword` is looked up first at
//! `{dir}/senvar/shop/prod/dbPassword`, then at `{dir}/dbPassword`. The
//! script receives the current value on stdin (empty when there is none)
//! and prints the new value on stdout.

use super::{HandlerRegistry, RotationHandler};
use crate::{Address, Result, SenvarError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Rotation directory, relative to the working directory.
pub const DEFAULT_ROTATION_DIR: &str = "secrets/rotation";

/// Name of the variable being rotated, as a fully-qualified name.
const VARIABLE_ENV: &str = "SENVAR_VARIABLE";

/// `1` when stdin carries a current value, `0` otherwise.
const HAS_CURRENT_ENV: &str = "SENVAR_HAS_CURRENT";

/// Looks up rotation scripts in a directory.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    dir: PathBuf,
}

impl ScriptRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, address: &Address) -> [PathBuf; 2] {
        let full_name = address.full_name();
        [
            self.dir.join(full_name.trim_start_matches('/')),
            self.dir.join(&address.name),
        ]
    }
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ROTATION_DIR)
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

#[async_trait]
impl HandlerRegistry for ScriptRegistry {
    async fn load_handler(&self, address: &Address) -> Result<Option<Arc<dyn RotationHandler>>> {
        for path in self.candidates(address) {
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SenvarError::Io(e)),
            };
            if metadata.is_file() && is_executable(&metadata) {
                debug!(path = %path.display(), variable = %address, "Found rotation script");
                return Ok(Some(Arc::new(ScriptHandler::new(path, address.full_name()))));
            }
        }
        Ok(None)
    }
}

/// Runs one rotation script.
#[derive(Debug, Clone)]
pub struct ScriptHandler {
    path: PathBuf,
    variable: String,
}

impl ScriptHandler {
    pub fn new(path: impl Into<PathBuf>, variable: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            variable: variable.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RotationHandler for ScriptHandler {
    async fn rotate(&self, current: Option<String>) -> Result<String> {
        let has_current = if current.is_some() { "1" } else { "0" };
        let output = run_with_stdin(
            &self.path,
            &[(VARIABLE_ENV, &self.variable), (HAS_CURRENT_ENV, has_current)],
            current.as_deref().unwrap_or_default(),
        )
        .await?;

        let next = output.trim_end_matches(['\r', '\n']);
        if next.is_empty() {
            return Err(SenvarError::CommandFailed(format!(
                "{} produced no value",
                self.path.display()
            )));
        }
        Ok(next.to_string())
    }
}

/// Executes `program` with `stdin_data` on stdin and returns its stdout.
async fn run_with_stdin(program: &Path, env: &[(&str, &str)], stdin_data: &str) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SenvarError::CommandFailed(format!("{} not found", program.display()))
        } else {
            SenvarError::Io(e)
        }
    })?;

    // Dropping stdin closes it so the script sees EOF. A script that exits
    // without reading is judged by its exit status.
    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(stdin_data.as_bytes()).await {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            result => {
                result?;
                stdin.flush().await?;
            }
        }
    }

    let output = child.wait_with_output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SenvarError::CommandFailed(format!(
            "{} failed with exit code {}: {}",
            program.display(),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout).map_err(|e| {
        SenvarError::Other(anyhow::anyhow!("Invalid UTF-8 in rotation output: {}", e))
    })
}
