// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command invocation helpers.
//!
//! Every piece of behavior that refit does not implement itself is delegated
//! to an external tool. These helpers wrap [`std::process::Command`] in the
//! two shapes the rest of the crate needs: blocking passthrough of the
//! current terminal, and captured output for commands whose result gets
//! inspected or logged.

use std::{
    ffi::OsStr,
    path::Path,
    process::Command,
};

/// Run external command interactively through current process.
///
/// Blocks until the command exits, leaving stdin, stdout, and stderr
/// attached to the caller's terminal.
///
/// # Errors
///
/// - Return [`SyscallError`] if the command cannot be spawned, or exits
///   with non-zero status.
pub(crate) fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    workdir: Option<&Path>,
) -> Result<()> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args);
    if let Some(dir) = workdir {
        command.current_dir(dir);
    }

    let status = command.spawn()?.wait()?;
    if !status.success() {
        return Err(SyscallError(std::io::Error::other(format!(
            "command {:?} failed",
            cmd.as_ref()
        ))));
    }

    Ok(())
}

/// Run external command non-interactively via external process.
///
/// Does not block on terminal input. Output to stdout and stderr is captured
/// and returned together as a [`String`].
///
/// # Errors
///
/// - Return [`SyscallError`] if the command cannot be spawned, or exits
///   with non-zero status. The captured output rides along in the error
///   message so the external tool's own diagnostic is preserved.
pub(crate) fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(SyscallError(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        ))));
    }

    Ok(message)
}

/// Run external command non-interactively, reporting only success.
///
/// Same as [`syscall_non_interactive`], but the caller only cares whether the
/// command succeeded, not what it printed.
pub(crate) fn syscall_check(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<bool> {
    let status = Command::new(cmd.as_ref()).args(args).status()?;
    Ok(status.success())
}

/// External command failed to spawn or exited with non-zero status.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SyscallError(#[from] std::io::Error);

/// Friendly result alias :3
type Result<T, E = SyscallError> = std::result::Result<T, E>;
