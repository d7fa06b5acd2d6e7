// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command invocation.
//!
//! Fetching and building shell out to tools like `hg`, `wget`, `tar`, and
//! `make`. These helpers run such commands inside a working directory, and
//! turn unsuccessful exit statuses into errors.

use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::debug;

/// Run command with inherited standard streams, so the user sees its output.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if command could not be started.
/// - Return [`SyscallError::Failed`] if command exits unsuccessfully.
pub fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: impl AsRef<Path>,
) -> Result<()> {
    let cmd = cmd.as_ref();
    debug!("run {cmd:?} in {:?}", cwd.as_ref().display());
    let status = Command::new(cmd)
        .args(args)
        .current_dir(cwd.as_ref())
        .spawn()
        .and_then(|mut child| child.wait())
        .map_err(|err| SyscallError::Spawn {
            source: err,
            command: cmd.to_string_lossy().into_owned(),
        })?;

    if !status.success() {
        return Err(SyscallError::Failed {
            command: cmd.to_string_lossy().into_owned(),
            message: status.to_string(),
        });
    }

    Ok(())
}

/// Run command with captured output, returning its standard output.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if command could not be started.
/// - Return [`SyscallError::Failed`] if command exits unsuccessfully, with
///   captured output included in the error.
pub fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: impl AsRef<Path>,
) -> Result<String> {
    let cmd = cmd.as_ref();
    debug!("run {cmd:?} in {:?}", cwd.as_ref().display());
    let output = Command::new(cmd)
        .args(args)
        .current_dir(cwd.as_ref())
        .output()
        .map_err(|err| SyscallError::Spawn {
            source: err,
            command: cmd.to_string_lossy().into_owned(),
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        let mut message = String::new();
        if !stdout.is_empty() {
            message.push_str(format!("stdout: {stdout}").as_str());
        }

        if !stderr.is_empty() {
            message.push_str(format!("stderr: {stderr}").as_str());
        }

        return Err(SyscallError::Failed {
            command: cmd.to_string_lossy().into_owned(),
            message: chomp(message),
        });
    }

    Ok(chomp(stdout))
}

/// Run shell command line through `sh -c`.
///
/// # Errors
///
/// - Same as [`syscall_interactive`].
pub fn shell_interactive(line: &str, cwd: impl AsRef<Path>) -> Result<()> {
    syscall_interactive("sh", ["-c", line], cwd)
}

/// Names of executables that cannot be found on `$PATH`.
pub fn missing_executables<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let search: Vec<PathBuf> = env::var_os("PATH")
        .map(|path| env::split_paths(&path).collect())
        .unwrap_or_default();

    names
        .into_iter()
        .filter(|name| !search.iter().any(|dir| crate::farm::is_executable(&dir.join(name))))
        .map(String::from)
        .collect()
}

fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// Command invocation error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command could not be started at all.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command ran but reported failure.
    #[error("command {command:?} failed: {message}")]
    Failed { command: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capture_output_in_working_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("marker"), "")?;
        let output = syscall_non_interactive("ls", ["."], dir.path())?;
        assert_eq!(output, "marker");
        Ok(())
    }

    #[test]
    fn unsuccessful_exit_is_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = shell_interactive("exit 3", dir.path());
        assert!(matches!(result, Err(SyscallError::Failed { .. })));
        Ok(())
    }

    #[test]
    fn missing_executables_on_path() {
        let missing = missing_executables(["sh", "surely-no-such-tool-exists"]);
        assert_eq!(missing, vec!["surely-no-such-tool-exists".to_string()]);
    }
}
