// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use refit::{
    config::{EnvSnapshot, RefreshConfig, RefreshOverrides},
    manifest::{ProjectManifest, MANIFEST_FILE},
    refresh::{engine::RefreshEngine, guard, guard::GuardInput, RefitError},
    repo::{Git2WorkingCopy, WorkingCopy},
    service::{ServiceController, Systemctl},
    syncer::UvSyncer,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use inquire::Confirm;
use std::process::exit;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  refit <refit-command> [options]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Refresh(opts) => run_refresh(opts),
            Command::Version => run_version(),
            Command::Service(opts) => run_service(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Refresh the deployed working copy to the remote branch tip.
    #[command(override_usage = "refit refresh [options]")]
    Refresh(RefreshOptions),

    /// Show name and version of the deployed application.
    #[command(override_usage = "refit version")]
    Version,

    /// Control the application's service unit.
    #[command(override_usage = "refit service [options] <action>")]
    Service(ServiceOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RefreshOptions {
    /// Branch to refresh to.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,

    /// Continue past overridable guard checks on a developer working copy.
    #[arg(long)]
    pub allow_dev_refresh: bool,

    /// Colon-separated marker names that block the refresh.
    #[arg(long, value_name = "colon_list")]
    pub block_markers: Option<String>,

    /// Colon-separated marker names of which at least one must exist.
    #[arg(long, value_name = "colon_list")]
    pub require_markers: Option<String>,

    /// Colon-separated path substrings that block the refresh.
    #[arg(long, value_name = "colon_list")]
    pub block_path_patterns: Option<String>,

    /// Substring the origin remote URL must contain.
    #[arg(long, value_name = "host")]
    pub require_remote_host: Option<String>,

    /// Stash tracked changes before the hard reset.
    #[arg(long, value_name = "0|1", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub stash_before_refresh: Option<u8>,

    /// Service unit to stop before mutating the working copy.
    #[arg(short, long, value_name = "name")]
    pub service: Option<String>,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ServiceOptions {
    #[command(subcommand)]
    pub action: ServiceAction,

    /// Service unit to act on instead of the manifest's unit.
    #[arg(short, long, value_name = "name")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
enum ServiceAction {
    /// Start the service unit.
    Start,

    /// Stop the service unit.
    Stop,

    /// Restart the service unit.
    Restart,

    /// Show whether the service unit is active.
    Status,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        let code = error
            .downcast_ref::<RefitError>()
            .map(RefitError::exit_code)
            .unwrap_or(1);
        exit(code);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_refresh(opts: RefreshOptions) -> Result<()> {
    let manifest = ProjectManifest::load(MANIFEST_FILE).map_err(RefitError::from)?;

    let overrides = RefreshOverrides {
        branch: opts.branch,
        allow_dev_refresh: opts.allow_dev_refresh.then_some(true),
        block_markers: opts.block_markers,
        require_markers: opts.require_markers,
        block_path_patterns: opts.block_path_patterns,
        require_remote_host: opts.require_remote_host,
        stash_before_refresh: opts.stash_before_refresh.map(|toggle| toggle == 1),
        service: opts.service,
        non_interactive: opts.yes,
    };
    let config = RefreshConfig::resolve(
        manifest.service_name.as_deref(),
        &EnvSnapshot::capture(),
        &overrides,
    );

    let mut work = Git2WorkingCopy::discover(".").map_err(RefitError::from)?;
    let state = work.state().map_err(RefitError::from)?;

    guard::evaluate(&GuardInput {
        config: &config,
        state: &state,
    })
    .map_err(RefitError::from)?;

    if !config.non_interactive && !confirm_refresh(&manifest, &config) {
        // A deliberate abort is not an error.
        info!("refresh aborted");
        return Ok(());
    }

    let services = Systemctl;
    let syncer = UvSyncer;
    let mut engine = RefreshEngine::new(&config, &mut work, &services, &syncer);
    engine.run().map_err(RefitError::from)?;

    Ok(())
}

/// Present what is about to happen, then ask once.
fn confirm_refresh(manifest: &ProjectManifest, config: &RefreshConfig) -> bool {
    println!("project : {} {}", manifest.name, manifest.version);
    println!("branch  : origin/{}", config.branch);
    match &config.service {
        Some(service) => println!("service : {service} (will be stopped)"),
        None => println!("service : none configured"),
    }
    if config.stash_before_refresh {
        println!("changes : tracked changes will be stashed, then discarded");
    } else {
        warn!("tracked changes will be discarded without a stash");
    }

    Confirm::new("refresh this working copy to the remote tip?")
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}

fn run_version() -> Result<()> {
    let manifest = ProjectManifest::load(MANIFEST_FILE).map_err(RefitError::from)?;
    println!("{} {}", manifest.name, manifest.version);

    if let Some(service) = &manifest.service_name {
        let active = Systemctl
            .is_active(service)
            .map(|active| if active { "active" } else { "inactive" })
            .unwrap_or("unknown");
        println!("service {service}: {active}");
    }

    Ok(())
}

fn run_service(opts: ServiceOptions) -> Result<()> {
    let manifest = ProjectManifest::load(MANIFEST_FILE).map_err(RefitError::from)?;
    let Some(service) = opts.service.or(manifest.service_name) else {
        anyhow::bail!("no service unit configured: set service_name in {MANIFEST_FILE} or pass --service");
    };

    let services = Systemctl;
    match opts.action {
        ServiceAction::Start => services.start(&service).map_err(RefitError::from)?,
        ServiceAction::Stop => services.stop(&service).map_err(RefitError::from)?,
        ServiceAction::Restart => services.restart(&service).map_err(RefitError::from)?,
        ServiceAction::Status => {
            let active = services.is_active(&service).map_err(RefitError::from)?;
            println!(
                "{service}: {}",
                if active { "active" } else { "inactive" }
            );
        }
    }

    Ok(())
}
