// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! End-to-end refresh runs against real temporary repositories.
//!
//! Each test builds a remote/work repository pair on disk: the remote plays
//! `origin`, the work repository plays the deployed working copy. Service
//! control and dependency sync are faked; everything git-shaped is real.

use refit::{
    config::{EnvSnapshot, RefreshConfig, RefreshOverrides},
    refresh::{
        engine::{EngineError, RefreshEngine},
        guard::{self, GuardError, GuardInput},
        RefitError,
    },
    repo::{Git2WorkingCopy, RepoError, WorkingCopy},
    service::{ServiceController, ServiceError},
    syncer::{DependencySyncer, SyncError},
};

use anyhow::Result;
use git2::{Commit, Oid, Repository, RepositoryInitOptions};
use indoc::indoc;
use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tempfile::TempDir;

struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    fn init(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;
        configure_identity(&repo)?;

        Ok(Self { repo })
    }

    fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            repo: Repository::open(path.as_ref())?,
        })
    }

    /// Commit one file to the given ref without touching the working tree.
    fn commit_to(&self, refname: &str, filename: &str, contents: &str) -> Result<Oid> {
        let parent = self
            .repo
            .find_reference(refname)
            .and_then(|reference| reference.resolve())
            .ok()
            .and_then(|reference| reference.target())
            .map(|oid| self.repo.find_commit(oid))
            .transpose()?;
        let parent_tree = parent.as_ref().map(Commit::tree).transpose()?;

        // INVARIANT: Always use new tree produced after staging new entry.
        let blob = self.repo.blob(contents.as_bytes())?;
        let mut builder = self.repo.treebuilder(parent_tree.as_ref())?;
        builder.insert(filename, blob, 0o100644)?;
        let tree = self.repo.find_tree(builder.write()?)?;

        // INVARIANT: Commit by appending to latest parent of target ref.
        let signature = self.repo.signature()?;
        let parents = parent.iter().collect::<Vec<_>>();
        let oid = self.repo.commit(
            Some(refname),
            &signature,
            &signature,
            format!("chore: add {filename:?}").as_ref(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }

    fn commit(&self, filename: &str, contents: &str) -> Result<Oid> {
        self.commit_to("HEAD", filename, contents)
    }

    fn branch_from_head(&self, branch: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.branch(branch, &head, false)?;

        Ok(())
    }

    fn tip(&self, refname: &str) -> Option<Oid> {
        self.repo
            .find_reference(refname)
            .ok()
            .and_then(|reference| reference.target())
    }

    fn stash_count(&mut self) -> usize {
        let mut count = 0;
        self.repo
            .stash_foreach(|_, _, _| {
                count += 1;
                true
            })
            .expect("walk stash entries");

        count
    }
}

fn configure_identity(repo: &Repository) -> Result<()> {
    // INVARIANT: Always provide valid name and email.
    //   - Git will complain if this is not set in CI/CD environments.
    let mut config = repo.config()?;
    config.set_str("user.name", "John Doe")?;
    config.set_str("user.email", "john@doe.com")?;

    Ok(())
}

/// Remote/work repository pair: remote plays origin, work plays deployment.
struct DeployPair {
    _tmp: TempDir,
    remote: RepoFixture,
    work_path: PathBuf,
}

impl DeployPair {
    fn new() -> Result<Self> {
        let tmp = TempDir::new()?;
        let remote_path = tmp.path().join("remote");
        let work_path = tmp.path().join("work");

        let remote = RepoFixture::init(&remote_path)?;
        remote.commit(
            "refit.toml",
            indoc! {r#"
                name = "app"
                version = "1.0.0"
                service_name = "app.service"
            "#},
        )?;
        remote.commit("app.py", "print(\"v1\")\n")?;

        let cloned = Repository::clone(remote_path.to_string_lossy().as_ref(), &work_path)?;
        configure_identity(&cloned)?;

        Ok(Self {
            _tmp: tmp,
            remote,
            work_path,
        })
    }

    fn work(&self) -> Result<Git2WorkingCopy> {
        Ok(Git2WorkingCopy::discover(&self.work_path)?)
    }

    fn work_head(&self) -> Result<Oid> {
        let repo = Repository::open(&self.work_path)?;
        let oid = repo.head()?.peel_to_commit()?.id();
        Ok(oid)
    }
}

#[derive(Default)]
struct FakeServices {
    stopped: RefCell<Vec<String>>,
}

impl ServiceController for FakeServices {
    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        self.stopped.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn start(&self, _name: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    fn restart(&self, _name: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    fn is_active(&self, _name: &str) -> Result<bool, ServiceError> {
        Ok(false)
    }
}

#[derive(Default)]
struct FakeSyncer {
    synced_in: RefCell<Vec<PathBuf>>,
}

impl DependencySyncer for FakeSyncer {
    fn sync(&self, workdir: &Path) -> Result<(), SyncError> {
        self.synced_in.borrow_mut().push(workdir.to_path_buf());
        Ok(())
    }
}

fn refresh_config(branch: &str, service: Option<&str>) -> RefreshConfig {
    let overrides = RefreshOverrides {
        branch: Some(branch.to_string()),
        non_interactive: true,
        ..Default::default()
    };

    RefreshConfig::resolve(service, &EnvSnapshot::default(), &overrides)
}

fn run_refresh(pair: &DeployPair, config: &RefreshConfig) -> Result<(), EngineError> {
    let mut work = pair.work().expect("open working copy");
    let services = FakeServices::default();
    let syncer = FakeSyncer::default();
    let mut engine = RefreshEngine::new(config, &mut work, &services, &syncer)
        .with_grace(Duration::ZERO);

    engine.run()
}

#[test]
fn refresh_resets_work_to_remote_tip() -> Result<()> {
    let pair = DeployPair::new()?;
    let new_tip = pair.remote.commit("app.py", "print(\"v2\")\n")?;
    assert_ne!(pair.work_head()?, new_tip);

    run_refresh(&pair, &refresh_config("main", None)).expect("refresh succeeds");

    assert_eq!(pair.work_head()?, new_tip);
    let contents = fs::read_to_string(pair.work_path.join("app.py"))?;
    assert_eq!(contents, "print(\"v2\")\n");

    Ok(())
}

#[test]
fn service_stop_attempted_and_sync_runs_in_root() -> Result<()> {
    let pair = DeployPair::new()?;
    let config = refresh_config("main", Some("app.service"));

    let mut work = pair.work()?;
    let services = FakeServices::default();
    let syncer = FakeSyncer::default();
    let mut engine = RefreshEngine::new(&config, &mut work, &services, &syncer)
        .with_grace(Duration::ZERO);
    engine.run().expect("refresh succeeds");

    assert_eq!(services.stopped.borrow().as_slice(), ["app.service"]);
    let synced = syncer.synced_in.borrow();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].canonicalize()?, pair.work_path.canonicalize()?);

    Ok(())
}

#[test]
fn dirty_tracked_changes_are_stashed_then_discarded() -> Result<()> {
    let pair = DeployPair::new()?;
    let remote_tip = pair.remote.tip("refs/heads/main").expect("remote tip");
    fs::write(pair.work_path.join("app.py"), "print(\"local hack\")\n")?;

    run_refresh(&pair, &refresh_config("main", None)).expect("refresh succeeds");

    // Local edit salvaged into the stash, then the tree matches the remote.
    let mut work_repo = RepoFixture::open(&pair.work_path)?;
    assert_eq!(work_repo.stash_count(), 1);
    assert_eq!(pair.work_head()?, remote_tip);
    let contents = fs::read_to_string(pair.work_path.join("app.py"))?;
    assert_eq!(contents, "print(\"v1\")\n");

    Ok(())
}

#[test]
fn untracked_files_survive_and_are_never_stashed() -> Result<()> {
    let pair = DeployPair::new()?;
    fs::write(pair.work_path.join("scratch.txt"), "keep me\n")?;

    run_refresh(&pair, &refresh_config("main", None)).expect("refresh succeeds");

    let mut work_repo = RepoFixture::open(&pair.work_path)?;
    assert_eq!(work_repo.stash_count(), 0);
    assert!(pair.work_path.join("scratch.txt").exists());

    Ok(())
}

#[test]
fn refresh_twice_is_idempotent() -> Result<()> {
    let pair = DeployPair::new()?;
    let remote_tip = pair.remote.commit("app.py", "print(\"v2\")\n")?;
    fs::write(pair.work_path.join("app.py"), "print(\"local hack\")\n")?;
    let config = refresh_config("main", None);

    run_refresh(&pair, &config).expect("first refresh succeeds");
    let head_after_first = pair.work_head()?;

    run_refresh(&pair, &config).expect("second refresh succeeds");
    let head_after_second = pair.work_head()?;

    assert_eq!(head_after_first, remote_tip);
    assert_eq!(head_after_first, head_after_second);

    // Second run found a clean tree: still exactly one stash entry.
    let mut work_repo = RepoFixture::open(&pair.work_path)?;
    assert_eq!(work_repo.stash_count(), 1);

    Ok(())
}

#[test]
fn remote_only_branch_gets_local_tracking_branch() -> Result<()> {
    let pair = DeployPair::new()?;
    pair.remote.branch_from_head("release")?;
    let release_tip = pair
        .remote
        .commit_to("refs/heads/release", "app.py", "print(\"release\")\n")?;

    run_refresh(&pair, &refresh_config("release", None)).expect("refresh succeeds");

    let work_repo = Repository::open(&pair.work_path)?;
    let head = work_repo.head()?;
    assert_eq!(head.shorthand(), Some("release"));
    assert_eq!(pair.work_head()?, release_tip);

    Ok(())
}

#[test]
fn branch_absent_everywhere_fails_with_code_6_and_no_reset() -> Result<()> {
    let pair = DeployPair::new()?;
    let head_before = pair.work_head()?;

    let outcome = run_refresh(&pair, &refresh_config("ghost", None));

    let error = outcome.expect_err("refresh must fail");
    assert!(matches!(
        error,
        EngineError::Repo(RepoError::BranchNotFound(_))
    ));
    assert_eq!(RefitError::from(error).exit_code(), 6);
    assert_eq!(pair.work_head()?, head_before);

    Ok(())
}

#[test]
fn guard_blocks_marker_in_real_working_copy() -> Result<()> {
    let pair = DeployPair::new()?;
    fs::write(pair.work_path.join(".dev_workspace"), "")?;

    let work = pair.work()?;
    let state = work.state()?;
    let config = refresh_config("main", None);

    let error = guard::evaluate(&GuardInput {
        config: &config,
        state: &state,
    })
    .expect_err("guard must block");
    assert_eq!(error, GuardError::BlockedByMarker(".dev_workspace".into()));
    assert_eq!(RefitError::from(error).exit_code(), 99);

    Ok(())
}

#[test]
fn repository_without_origin_fails_with_code_4() -> Result<()> {
    let tmp = TempDir::new()?;
    let fixture = RepoFixture::init(tmp.path())?;
    fixture.commit(
        "refit.toml",
        indoc! {r#"
            name = "app"
            version = "1.0.0"
        "#},
    )?;

    let work = Git2WorkingCopy::discover(tmp.path())?;
    let state = work.state()?;
    assert_eq!(state.origin_url, None);

    let config = refresh_config("main", None);
    let error = guard::evaluate(&GuardInput {
        config: &config,
        state: &state,
    })
    .expect_err("guard must block");
    assert_eq!(error, GuardError::NoOriginRemote);
    assert_eq!(RefitError::from(error).exit_code(), 4);

    Ok(())
}

#[test]
fn remote_host_mismatch_fails_with_code_5() -> Result<()> {
    let pair = DeployPair::new()?;
    let work = pair.work()?;
    let state = work.state()?;

    let overrides = RefreshOverrides {
        branch: Some("main".into()),
        require_remote_host: Some("github.com".into()),
        non_interactive: true,
        ..Default::default()
    };
    let config = RefreshConfig::resolve(None, &EnvSnapshot::default(), &overrides);

    // Local fixture remotes are plain filesystem paths, never github.com.
    let error = guard::evaluate(&GuardInput {
        config: &config,
        state: &state,
    })
    .expect_err("guard must block");
    assert!(matches!(error, GuardError::RemoteHostMismatch { .. }));
    assert_eq!(RefitError::from(error).exit_code(), 5);

    Ok(())
}

#[test]
fn plain_directory_is_not_a_repo() -> Result<()> {
    let tmp = TempDir::new()?;

    let error = Git2WorkingCopy::discover(tmp.path()).expect_err("discover must fail");
    assert!(matches!(error, RepoError::NotAGitRepo { .. }));
    assert_eq!(RefitError::from(error).exit_code(), 3);

    Ok(())
}

#[test]
fn state_reports_branch_and_cleanliness() -> Result<()> {
    let pair = DeployPair::new()?;
    let work = pair.work()?;

    let state = work.state()?;
    assert_eq!(state.branch.as_deref(), Some("main"));
    assert!(!state.dirty);
    assert!(state.origin_url.is_some());

    fs::write(pair.work_path.join("app.py"), "print(\"local hack\")\n")?;
    let state = work.state()?;
    assert!(state.dirty);

    Ok(())
}
