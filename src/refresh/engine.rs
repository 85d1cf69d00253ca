// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Refresh state machine.
//!
//! Once the guard chain and the operator have both agreed to a refresh, the
//! engine walks the working copy through a fixed sequence of phases:
//!
//! ```text
//! Idle -> ServiceStopped -> Stashed -> Fetched -> BranchResolved
//!      -> Reset -> Synced -> Done
//! ```
//!
//! Any phase can fail, at which point the run stops where it is. Completed
//! phases are never rolled back: after the hard reset the repository state
//! is already the desired one, and a dependency-sync failure is something
//! the operator must resolve, not something a rollback would improve.
//!
//! The engine is generic over the three capability seams it drives, so every
//! transition can be tested against fakes.

use crate::{
    config::RefreshConfig,
    repo::{RepoError, StashOutcome, WorkingCopy},
    service::{ServiceController, ServiceError},
    syncer::{DependencySyncer, SyncError},
};

use chrono::Utc;
use std::{thread, time::Duration};
use tracing::{debug, info, instrument, warn};

/// Fixed grace period between the stop request and the stop verification.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Phases of one refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ServiceStopped,
    Stashed,
    Fetched,
    BranchResolved,
    Reset,
    Synced,
    Done,
}

/// The refresh engine.
///
/// Drives one working copy through one refresh run, delegating every
/// externally visible effect to the capability seams it was constructed
/// with.
pub struct RefreshEngine<'a, W, S, D>
where
    W: WorkingCopy,
    S: ServiceController,
    D: DependencySyncer,
{
    config: &'a RefreshConfig,
    work: &'a mut W,
    services: &'a S,
    syncer: &'a D,
    grace: Duration,
    phase: Phase,
}

impl<'a, W, S, D> RefreshEngine<'a, W, S, D>
where
    W: WorkingCopy,
    S: ServiceController,
    D: DependencySyncer,
{
    /// Construct new refresh engine in the idle phase.
    pub fn new(config: &'a RefreshConfig, work: &'a mut W, services: &'a S, syncer: &'a D) -> Self {
        Self {
            config,
            work,
            services,
            syncer,
            grace: STOP_GRACE,
            phase: Phase::Idle,
        }
    }

    /// Replace the stop grace period. Meant for tests.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Current phase of the run.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the state machine to completion.
    ///
    /// # Errors
    ///
    /// - Return [`EngineError`] from the failing phase; the engine stays in
    ///   the last phase it completed.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&mut self) -> Result<()> {
        while self.phase != Phase::Done {
            self.phase = self.step()?;
        }

        info!(
            "refresh complete: working copy now tracks origin/{}",
            self.config.branch
        );

        Ok(())
    }

    fn step(&mut self) -> Result<Phase> {
        match self.phase {
            Phase::Idle => self.stop_service(),
            Phase::ServiceStopped => self.stash(),
            Phase::Stashed => self.fetch(),
            Phase::Fetched => self.resolve_branch(),
            Phase::BranchResolved => self.reset(),
            Phase::Reset => self.sync(),
            Phase::Synced | Phase::Done => Ok(Phase::Done),
        }
    }

    /// `Idle -> ServiceStopped`.
    ///
    /// A refresh must not proceed against a live process, so a unit that is
    /// still active after the grace period is fatal.
    fn stop_service(&mut self) -> Result<Phase> {
        let Some(service) = &self.config.service else {
            debug!("no service unit configured, nothing to stop");
            return Ok(Phase::ServiceStopped);
        };

        self.services.stop(service)?;
        thread::sleep(self.grace);

        if self.services.is_active(service)? {
            return Err(EngineError::ServiceStillActive(service.clone()));
        }

        Ok(Phase::ServiceStopped)
    }

    /// `ServiceStopped -> Stashed`.
    ///
    /// Stash failure is a warning, not a failure: once the operator has
    /// committed to the refresh, aborting over a salvage copy would be
    /// strictly worse than continuing.
    fn stash(&mut self) -> Result<Phase> {
        if !self.config.stash_before_refresh {
            debug!("pre-refresh stash disabled");
            return Ok(Phase::Stashed);
        }

        let label = format!("refit refresh {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
        match self.work.stash_tracked(&label) {
            Ok(StashOutcome::Stashed) => info!("tracked changes stashed as {label:?}"),
            Ok(StashOutcome::Clean) => debug!("working tree clean, no stash created"),
            Err(error) => warn!("stash failed, continuing refresh anyway: {error}"),
        }

        Ok(Phase::Stashed)
    }

    /// `Stashed -> Fetched`.
    ///
    /// A failed targeted fetch falls back to fetching everything from
    /// origin before giving up.
    fn fetch(&mut self) -> Result<Phase> {
        if let Err(error) = self.work.fetch_branch(&self.config.branch) {
            warn!(
                "targeted fetch of {:?} failed ({error}), falling back to full fetch",
                self.config.branch
            );
            self.work.fetch_all()?;
        }

        Ok(Phase::Fetched)
    }

    /// `Fetched -> BranchResolved`.
    fn resolve_branch(&mut self) -> Result<Phase> {
        let source = self.work.resolve_branch(&self.config.branch)?;
        debug!("branch {:?} resolved via {source:?}", self.config.branch);

        Ok(Phase::BranchResolved)
    }

    /// `BranchResolved -> Reset`.
    fn reset(&mut self) -> Result<Phase> {
        self.work.hard_reset(&self.config.branch)?;

        Ok(Phase::Reset)
    }

    /// `Reset -> Synced`.
    fn sync(&mut self) -> Result<Phase> {
        let root = self.work.state()?.root;
        self.syncer.sync(&root)?;

        Ok(Phase::Synced)
    }
}

/// All possible error types for a refresh run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Service unit still active after the stop request and grace period.
    #[error("service {0:?} is still active after stop request")]
    ServiceStillActive(String),

    /// Service manager interaction failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Working copy operation failed.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Dependency resync failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Friendly result alias :3
type Result<T, E = EngineError> = std::result::Result<T, E>;
