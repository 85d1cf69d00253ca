// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pre-refresh guard chain.
//!
//! Before the refresh engine is allowed to mutate a working copy, an ordered
//! sequence of independent checks decides whether this working copy is a
//! legitimate refresh target at all. Each check inspects the same input
//! record (resolved configuration plus a fresh repository snapshot) and
//! produces its own verdict.
//!
//! Two classes of check exist. The overridable ones protect against
//! accidentally refreshing a developer's working copy: marker files, path
//! patterns, and required deployment markers. All of them yield to the
//! single `allow_dev_refresh` override, and every override is logged loudly
//! so the audit trail survives. The non-overridable ones protect against
//! operating with no meaningful git context at all (no working tree, no
//! origin remote, wrong remote host); no override should paper over those.

use crate::{config::RefreshConfig, repo::RepoState};

use tracing::{debug, warn};

/// Shared input record every guard check evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct GuardInput<'a> {
    pub config: &'a RefreshConfig,
    pub state: &'a RepoState,
}

/// Outcome of one guard check.
#[derive(Debug)]
pub enum GuardVerdict {
    /// Check found nothing objectionable.
    Pass,

    /// Check would have blocked, but the override is active.
    Overridden(String),

    /// Check blocks the refresh.
    Block(GuardError),
}

type Check = fn(&GuardInput) -> GuardVerdict;

/// Fixed evaluation order of the guard chain.
const CHECKS: &[(&str, Check)] = &[
    ("block-marker", check_block_markers),
    ("path-pattern", check_path_patterns),
    ("require-marker", check_require_markers),
    ("remote", check_remote),
];

/// Evaluate the guard chain in fixed order.
///
/// Stops at the first blocking verdict. Overridden checks log a warning and
/// evaluation continues with the next check.
///
/// # Errors
///
/// - Return the blocking check's [`GuardError`] untouched, so the caller can
///   map it to its documented exit code.
pub fn evaluate(input: &GuardInput) -> Result<(), GuardError> {
    for (name, check) in CHECKS {
        match check(input) {
            GuardVerdict::Pass => debug!("guard check {name}: pass"),
            GuardVerdict::Overridden(reason) => {
                warn!("guard check {name} OVERRIDDEN by allow-dev-refresh: {reason}");
            }
            GuardVerdict::Block(error) => return Err(error),
        }
    }

    Ok(())
}

/// Block when any configured marker exists at the repository root.
fn check_block_markers(input: &GuardInput) -> GuardVerdict {
    for marker in &input.config.block_markers {
        if input.state.root.join(marker).exists() {
            if input.config.allow_dev_refresh {
                return GuardVerdict::Overridden(format!("marker {marker:?} present"));
            }

            return GuardVerdict::Block(GuardError::BlockedByMarker(marker.clone()));
        }
    }

    GuardVerdict::Pass
}

/// Block when the repository root path contains a configured pattern.
fn check_path_patterns(input: &GuardInput) -> GuardVerdict {
    let root = input.state.root.to_string_lossy();
    for pattern in &input.config.block_path_patterns {
        if root.contains(pattern.as_str()) {
            if input.config.allow_dev_refresh {
                return GuardVerdict::Overridden(format!("root path matches {pattern:?}"));
            }

            return GuardVerdict::Block(GuardError::BlockedByPath(pattern.clone()));
        }
    }

    GuardVerdict::Pass
}

/// Block unless at least one required marker exists at the repository root.
fn check_require_markers(input: &GuardInput) -> GuardVerdict {
    if input.config.require_markers.is_empty() {
        return GuardVerdict::Pass;
    }

    let found = input
        .config
        .require_markers
        .iter()
        .any(|marker| input.state.root.join(marker).exists());
    if found {
        return GuardVerdict::Pass;
    }

    if input.config.allow_dev_refresh {
        return GuardVerdict::Overridden(format!(
            "none of the required markers {:?} present",
            input.config.require_markers
        ));
    }

    GuardVerdict::Block(GuardError::MissingRequiredMarker(
        input.config.require_markers.clone(),
    ))
}

/// Block on missing origin remote or wrong remote host.
///
/// Never yields to the override: both conditions mean the tool is pointed at
/// the wrong target entirely.
fn check_remote(input: &GuardInput) -> GuardVerdict {
    let Some(url) = &input.state.origin_url else {
        return GuardVerdict::Block(GuardError::NoOriginRemote);
    };

    if let Some(host) = &input.config.require_remote_host {
        if !url.contains(host.as_str()) {
            return GuardVerdict::Block(GuardError::RemoteHostMismatch {
                host: host.clone(),
                url: url.clone(),
            });
        }
    }

    GuardVerdict::Pass
}

/// All possible blocking outcomes of the guard chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// Marker file or directory present at the repository root.
    #[error("refresh blocked: marker {0:?} present at repository root")]
    BlockedByMarker(String),

    /// Repository root path contains a blocked pattern.
    #[error("refresh blocked: repository root path contains {0:?}")]
    BlockedByPath(String),

    /// None of the required markers exist at the repository root.
    #[error("refresh blocked: none of the required markers {0:?} present")]
    MissingRequiredMarker(Vec<String>),

    /// Repository has no origin remote configured.
    #[error("repository has no origin remote")]
    NoOriginRemote,

    /// Origin remote URL does not reference the required host.
    #[error("origin remote {url:?} does not reference required host {host:?}")]
    RemoteHostMismatch { host: String, url: String },
}
