// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Guarded refresh of a deployed working copy.
//!
//! A __refresh__ brings the working copy of one deployed application back in
//! line with its remote: stop the service, optionally salvage tracked local
//! changes into a stash, fetch, make sure the target branch is checked out,
//! hard-reset it to the remote tip, and resync dependencies. The refresh is
//! a deliberate, destructive operation; everything in this module exists to
//! make sure it only ever happens to the working copy the operator meant.
//!
//! # Safety Gates
//!
//! The [`guard`] chain runs before any mutation and decides whether the
//! working copy is a legitimate refresh target: developer-workspace markers
//! and path patterns block, deployment markers can be required, and the
//! origin remote is validated. See [`guard`] for the per-check override
//! semantics.
//!
//! # The State Machine
//!
//! The [`engine`] walks the phases in a fixed order and stops where it
//! fails, without rolling back completed phases. See [`engine`] for the
//! transition table.
//!
//! # Exit Codes
//!
//! Every failure class maps to a distinct, documented process exit code so
//! calling automation can branch on cause:
//!
//! | code | meaning                     |
//! |------|-----------------------------|
//! | 0    | success, or deliberate abort |
//! | 1    | generic or configuration error |
//! | 2    | unknown argument (from clap) |
//! | 3    | not inside a git working tree |
//! | 4    | no origin remote            |
//! | 5    | origin remote host mismatch |
//! | 6    | branch resolution failure   |
//! | 99   | blocked by marker           |
//! | 100  | blocked by path pattern     |
//! | 101  | missing required marker     |

pub mod engine;
pub mod guard;

use crate::{
    manifest::ManifestError,
    refresh::{engine::EngineError, guard::GuardError},
    repo::RepoError,
    service::ServiceError,
};

/// Top-level error for one refit invocation.
///
/// Aggregates every module error so the binary can translate any failure
/// into its documented exit code.
#[derive(Debug, thiserror::Error)]
pub enum RefitError {
    /// Manifest missing, unreadable, or incomplete.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Guard chain blocked the refresh.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Working copy access failed outside the engine.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Service manager interaction failed outside the engine.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Refresh state machine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RefitError {
    /// Documented process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Manifest(_) | Self::Service(_) => 1,
            Self::Guard(error) => guard_exit_code(error),
            Self::Repo(error) => repo_exit_code(error),
            Self::Engine(EngineError::Repo(error)) => repo_exit_code(error),
            Self::Engine(_) => 1,
        }
    }
}

fn guard_exit_code(error: &GuardError) -> i32 {
    match error {
        GuardError::BlockedByMarker(_) => 99,
        GuardError::BlockedByPath(_) => 100,
        GuardError::MissingRequiredMarker(_) => 101,
        GuardError::NoOriginRemote => 4,
        GuardError::RemoteHostMismatch { .. } => 5,
    }
}

fn repo_exit_code(error: &RepoError) -> i32 {
    match error {
        RepoError::NotAGitRepo { .. } => 3,
        RepoError::BranchNotFound(_) => 6,
        _ => 1,
    }
}

/// Friendly result alias :3
pub type Result<T, E = RefitError> = std::result::Result<T, E>;
