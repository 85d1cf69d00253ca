// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Service unit control.
//!
//! The managed application usually runs under the host's service manager.
//! Before the refresh engine is allowed to mutate the working copy, the
//! service must be stopped and verified stopped; starting it again after a
//! refresh is left to the operator or the process supervisor. The
//! [`ServiceController`] trait keeps that surface narrow so the engine can
//! be tested against a fake.

use crate::syscall::{syscall_check, syscall_non_interactive, SyscallError};

use tracing::{info, instrument};

/// Narrow capability interface over the host's service manager.
pub trait ServiceController {
    /// Request the named unit to stop.
    fn stop(&self, name: &str) -> Result<()>;

    /// Request the named unit to start.
    fn start(&self, name: &str) -> Result<()>;

    /// Request the named unit to restart.
    fn restart(&self, name: &str) -> Result<()>;

    /// Whether the named unit is currently active.
    fn is_active(&self, name: &str) -> Result<bool>;
}

/// Service control through the `systemctl` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct Systemctl;

impl ServiceController for Systemctl {
    #[instrument(skip(self), level = "debug")]
    fn stop(&self, name: &str) -> Result<()> {
        info!("stop service unit {name}");
        syscall_non_interactive("systemctl", ["stop", name])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn start(&self, name: &str) -> Result<()> {
        info!("start service unit {name}");
        syscall_non_interactive("systemctl", ["start", name])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn restart(&self, name: &str) -> Result<()> {
        info!("restart service unit {name}");
        syscall_non_interactive("systemctl", ["restart", name])?;
        Ok(())
    }

    fn is_active(&self, name: &str) -> Result<bool> {
        Ok(syscall_check("systemctl", ["is-active", "--quiet", name])?)
    }
}

/// All possible error types for service control.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Service manager invocation failed.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
type Result<T, E = ServiceError> = std::result::Result<T, E>;
