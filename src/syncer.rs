// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dependency resync.
//!
//! After the working copy has been reset to the remote tip, the
//! application's declared dependencies must be brought back in line with
//! whatever the refreshed code declares. Refit delegates this to `uv`, which
//! owns the application's isolated environment. The [`DependencySyncer`]
//! trait keeps the engine testable without a real environment.

use crate::{
    path::{local_bin_dir, NoWayHome},
    syscall::{syscall_interactive, SyscallError},
};

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Narrow capability interface over the dependency tool.
pub trait DependencySyncer {
    /// Resolve and install the application's declared dependencies.
    fn sync(&self, workdir: &Path) -> Result<()>;
}

/// Dependency resync through the `uv` binary.
///
/// Locates the executable by explicit PATH lookup first, then falls back to
/// the fixed per-user install location `~/.local/bin/uv` that the standalone
/// installer uses.
#[derive(Debug, Default, Clone, Copy)]
pub struct UvSyncer;

impl UvSyncer {
    fn locate(&self) -> Result<PathBuf> {
        if let Ok(path) = which::which("uv") {
            debug!("found uv on PATH at {}", path.display());
            return Ok(path);
        }

        let fallback = local_bin_dir()?.join("uv");
        if fallback.is_file() {
            debug!("found uv at fallback location {}", fallback.display());
            return Ok(fallback);
        }

        Err(SyncError::SyncerNotFound)
    }
}

impl DependencySyncer for UvSyncer {
    #[instrument(skip(self, workdir), level = "debug")]
    fn sync(&self, workdir: &Path) -> Result<()> {
        let uv = self.locate()?;
        info!("resync dependencies with {} in {}", uv.display(), workdir.display());
        syscall_interactive(uv, ["sync"], Some(workdir))?;

        Ok(())
    }
}

/// All possible error types for dependency resync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Dependency tool absent from PATH and from the fallback location.
    #[error("uv executable not found on PATH or in ~/.local/bin")]
    SyncerNotFound,

    /// Home directory lookup failed while probing the fallback location.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Dependency tool invocation failed.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
type Result<T, E = SyncError> = std::result::Result<T, E>;
