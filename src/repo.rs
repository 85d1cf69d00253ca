// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Working copy access.
//!
//! The deployed application lives in an ordinary git working tree. Everything
//! the refresh engine does to that tree goes through the [`WorkingCopy`]
//! trait: snapshotting repository state, stashing tracked changes, fetching
//! from origin, resolving the target branch, and hard-resetting to the
//! remote tip. The trait exists so the guard chain and the engine can be
//! exercised against fakes; [`Git2WorkingCopy`] is the libgit2-backed
//! implementation used by the binary.
//!
//! # State Snapshots
//!
//! [`RepoState`] is always read fresh from the repository at the moment it is
//! needed, never cached. Branch, dirtiness, and remote URL can all change
//! between invocations, and a stale snapshot would let a guard check pass
//! against a tree that no longer looks the way the check thinks it does.
//!
//! # Dirtiness
//!
//! A working copy counts as dirty only when *tracked* content differs from
//! HEAD, in the working tree or in the index. Untracked and ignored files
//! never count. The pre-refresh stash follows the same policy, so whatever
//! the dirtiness check saw is exactly what the stash salvages.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::CheckoutBuilder, AutotagOption, BranchType, Config, FetchOptions, ObjectType,
    RemoteCallbacks, Repository, ResetType, StashFlags, StatusOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Snapshot of the working copy the guard chain evaluates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoState {
    /// Absolute path of the repository root (top-level of the working tree).
    pub root: PathBuf,

    /// Currently checked out branch, if HEAD points at one.
    pub branch: Option<String>,

    /// Whether tracked content differs from HEAD in worktree or index.
    pub dirty: bool,

    /// URL of the `origin` remote, if one is configured.
    pub origin_url: Option<String>,
}

/// Result of a pre-refresh stash attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashOutcome {
    /// Nothing to stash; tracked content matches HEAD.
    Clean,

    /// Tracked changes were saved into a new stash entry.
    Stashed,
}

/// How the target branch ended up checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSource {
    /// Target branch was already the current branch.
    AlreadyCurrent,

    /// An existing local branch of that name was checked out.
    Local,

    /// A local branch was created to track the remote branch, then
    /// checked out.
    CreatedTracking,
}

/// Version-control capability the refresh engine operates through.
pub trait WorkingCopy {
    /// Read a fresh state snapshot from the repository.
    fn state(&self) -> Result<RepoState>;

    /// Stash tracked changes (worktree and index) under the given label.
    ///
    /// Untracked and ignored files are deliberately left alone.
    fn stash_tracked(&mut self, label: &str) -> Result<StashOutcome>;

    /// Fetch the given branch plus tags from `origin`.
    fn fetch_branch(&mut self, branch: &str) -> Result<()>;

    /// Fetch everything `origin` is configured to advertise.
    fn fetch_all(&mut self) -> Result<()>;

    /// Make the given branch the current branch.
    ///
    /// Prefers an existing local branch; otherwise creates a local branch
    /// tracking `origin/<branch>`.
    fn resolve_branch(&mut self, branch: &str) -> Result<BranchSource>;

    /// Hard-reset the current branch to `origin/<branch>`.
    ///
    /// Discards local commits and tracked working-tree differences relative
    /// to the remote tip. Destructive by design.
    fn hard_reset(&mut self, branch: &str) -> Result<()>;
}

/// Working copy access through libgit2.
pub struct Git2WorkingCopy {
    repository: Repository,
}

impl std::fmt::Debug for Git2WorkingCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git2WorkingCopy")
            .field("repository", &self.repository.path())
            .finish()
    }
}

impl Git2WorkingCopy {
    /// Discover the repository containing the given path.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotAGitRepo`] if no repository with a working
    ///   tree contains the path.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::discover(path.as_ref()).map_err(|_| RepoError::NotAGitRepo {
            path: path.as_ref().to_path_buf(),
        })?;

        if repository.is_bare() {
            return Err(RepoError::NotAGitRepo {
                path: path.as_ref().to_path_buf(),
            });
        }

        Ok(Self { repository })
    }

    fn workdir(&self) -> Result<PathBuf> {
        self.repository
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| RepoError::NotAGitRepo {
                path: self.repository.path().to_path_buf(),
            })
    }

    fn current_branch(&self) -> Option<String> {
        let head = self.repository.head().ok()?;
        if !head.is_branch() {
            return None;
        }

        head.shorthand().map(ToString::to_string)
    }

    fn tracked_changes_exist(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(false)
            .include_ignored(false)
            .include_unmodified(false);

        let statuses = self.repository.statuses(Some(&mut options))?;
        Ok(!statuses.is_empty())
    }

    fn checkout_local(&self, branch: &str) -> Result<()> {
        self.repository.set_head(&format!("refs/heads/{branch}"))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repository.checkout_head(Some(&mut checkout))?;

        Ok(())
    }

    fn fetch_refspecs(&mut self, refspecs: &[&str], label: &str) -> Result<()> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = TerminalPrompter::new(bar);
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            let bar_size = stats.total_objects() as u64;
            let bar_pos = stats.received_objects() as u64;
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(bar_size);
                prompter.bar.set_position(bar_pos);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        fo.download_tags(AutotagOption::All);

        let mut remote = self.repository.find_remote("origin")?;
        let outcome = remote.fetch(refspecs, Some(&mut fo), Some("refit fetch"));
        prompter.bar.finish_and_clear();
        outcome?;

        Ok(())
    }
}

impl WorkingCopy for Git2WorkingCopy {
    fn state(&self) -> Result<RepoState> {
        let origin_url = self
            .repository
            .find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(ToString::to_string));

        Ok(RepoState {
            root: self.workdir()?,
            branch: self.current_branch(),
            dirty: self.tracked_changes_exist()?,
            origin_url,
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn stash_tracked(&mut self, label: &str) -> Result<StashOutcome> {
        if !self.tracked_changes_exist()? {
            debug!("working tree clean, nothing to stash");
            return Ok(StashOutcome::Clean);
        }

        let signature = self.repository.signature()?;
        let oid = self
            .repository
            .stash_save(&signature, label, Some(StashFlags::DEFAULT))?;
        info!("stashed tracked changes as {oid} ({label})");

        Ok(StashOutcome::Stashed)
    }

    #[instrument(skip(self), level = "debug")]
    fn fetch_branch(&mut self, branch: &str) -> Result<()> {
        info!("fetch branch {branch:?} and tags from origin");
        // INVARIANT: Use a full refspec so the remote-tracking ref moves;
        // a bare branch name would only update FETCH_HEAD.
        let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
        self.fetch_refspecs(&[refspec.as_str()], &format!("origin/{branch}"))
    }

    #[instrument(skip(self), level = "debug")]
    fn fetch_all(&mut self) -> Result<()> {
        info!("fetch everything from origin");
        self.fetch_refspecs(&[], "origin")
    }

    #[instrument(skip(self), level = "debug")]
    fn resolve_branch(&mut self, branch: &str) -> Result<BranchSource> {
        if self.current_branch().as_deref() == Some(branch) {
            debug!("already on branch {branch:?}");
            return Ok(BranchSource::AlreadyCurrent);
        }

        if self.repository.find_branch(branch, BranchType::Local).is_ok() {
            info!("checkout existing local branch {branch:?}");
            self.checkout_local(branch)?;
            return Ok(BranchSource::Local);
        }

        let remote_name = format!("origin/{branch}");
        let Ok(remote_branch) = self.repository.find_branch(&remote_name, BranchType::Remote)
        else {
            return Err(RepoError::BranchNotFound(branch.to_string()));
        };

        info!("create local branch {branch:?} tracking {remote_name}");
        let commit = remote_branch.get().peel_to_commit()?;
        let mut local = self.repository.branch(branch, &commit, false)?;
        local.set_upstream(Some(&remote_name))?;
        self.checkout_local(branch)?;

        Ok(BranchSource::CreatedTracking)
    }

    #[instrument(skip(self), level = "debug")]
    fn hard_reset(&mut self, branch: &str) -> Result<()> {
        let remote_name = format!("origin/{branch}");
        let Ok(remote_branch) = self.repository.find_branch(&remote_name, BranchType::Remote)
        else {
            return Err(RepoError::BranchNotFound(branch.to_string()));
        };

        warn!("hard reset to {remote_name}, local differences will be discarded");
        let object = remote_branch.get().peel(ObjectType::Commit)?;
        self.repository.reset(&object, ResetType::Hard, None)?;

        Ok(())
    }
}

/// Git2 authentication prompter that suspends the transfer progress bar.
#[derive(Debug, Clone)]
struct TerminalPrompter {
    bar: ProgressBar,
}

impl TerminalPrompter {
    fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for TerminalPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// All possible error types for working copy access.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Path is not inside a git working tree.
    #[error("no git working tree found at {path:?}")]
    NotAGitRepo { path: PathBuf },

    /// Branch exists neither locally nor on origin.
    #[error("branch {0:?} not found locally or on origin")]
    BranchNotFound(String),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = RepoError> = std::result::Result<T, E>;
