use std::path::Path;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd;
use crate::error::DeployResult;
use crate::executor;
use crate::plan::Plan;
use crate::project::Project;
use crate::ssh::SshSession;
use crate::steps::Context;
use crate::target::Target;

/// Command-line front end: parses arguments, connects over SSH and
/// runs the standard plan.
pub struct Pipeline {
    project: Project,
}

impl Pipeline {
    #[must_use]
    pub const fn new(project: Project) -> Self {
        Self { project }
    }

    /// Load the project description from a YAML file.
    pub fn from_file(path: &str) -> DeployResult<Self> {
        Ok(Self::new(Project::from_file(Path::new(path))?))
    }

    /// Parse CLI arguments and dispatch the appropriate
    /// command.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatched command fails.
    pub fn run(&self) -> DeployResult<()> {
        init_tracing();
        let cli = Cli::parse();

        match &cli.command {
            Command::Deploy {
                host,
                user,
                revision,
                identity,
                dry_run,
                json,
            } => {
                let target = Target::new(host, user)?;
                let revision = match revision {
                    Some(rev) => rev.clone(),
                    None => cmd::local_head_revision()?,
                };
                if *dry_run {
                    self.cmd_dry_run(&target, &revision);
                    return Ok(());
                }
                self.cmd_deploy(&target, &revision, identity.as_deref(), *json)
            }
            Command::Check {
                host,
                user,
                identity,
            } => {
                let target = Target::new(host, user)?;
                self.cmd_check(&target, identity.as_deref())
            }
        }
    }

    fn cmd_deploy(
        &self,
        target: &Target,
        revision: &str,
        identity: Option<&str>,
        json: bool,
    ) -> DeployResult<()> {
        self.project.validate()?;
        let ssh = session(target, identity);
        let ctx = Context::new(target, &self.project, revision, &ssh);

        eprintln!(
            "Deploying {} to {}@{}...",
            short(revision),
            target.user(),
            target.host()
        );
        let report = executor::run(&ctx, &Plan::standard())?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            for outcome in &report.outcomes {
                eprintln!(
                    "  {:<22} {} ({} ms)",
                    outcome.step,
                    outcome.action.as_str(),
                    outcome.elapsed_ms
                );
            }
            eprintln!();
            eprintln!(
                "Deployment complete: {} applied, {} skipped",
                report.applied().len(),
                report.skipped().len()
            );
        }
        Ok(())
    }

    fn cmd_check(&self, target: &Target, identity: Option<&str>) -> DeployResult<()> {
        self.project.validate()?;
        let ssh = session(target, identity);
        // Checks never compare against the revision.
        let ctx = Context::new(target, &self.project, "HEAD", &ssh);

        for (name, satisfied) in executor::inspect(&ctx, &Plan::standard())? {
            let state = if satisfied { "satisfied" } else { "pending" };
            println!("{name:<22} {state}");
        }
        Ok(())
    }

    fn cmd_dry_run(&self, target: &Target, revision: &str) {
        let project = &self.project;

        eprintln!("=== Dry run: no changes will be made ===");
        eprintln!();
        eprintln!("Target:        {}@{}", target.user(), target.host());
        eprintln!("Revision:      {revision}");
        eprintln!("Repository:    {}", project.repo_url);
        eprintln!("Site root:     {}", target.site_root());
        eprintln!(
            "Settings:      {}",
            project.settings_file(&target.source_dir())
        );
        eprintln!("Static root:   {}", project.static_root(target));
        eprintln!("Init script:   {}", project.init_script(target));
        eprintln!();
        eprintln!("--- Steps ---");
        for (i, name) in Plan::standard().names().iter().enumerate() {
            println!("{}. {name}", i + 1);
        }
    }
}

fn session(target: &Target, identity: Option<&str>) -> SshSession {
    let ssh = SshSession::new(target.host(), target.user());
    match identity {
        Some(key) => ssh.with_key(key),
        None => ssh,
    }
}

fn short(revision: &str) -> &str {
    revision.get(..12).unwrap_or(revision)
}

/// Install a stderr subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Does nothing if the caller already installed one.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Deployment automation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy the application to a host
    Deploy {
        /// Hostname to deploy to
        host: String,

        /// Remote user that owns the site
        #[arg(long)]
        user: String,

        /// Commit to deploy (defaults to the local HEAD)
        #[arg(long)]
        revision: Option<String>,

        /// SSH private key
        #[arg(long)]
        identity: Option<String>,

        /// Print the plan without connecting
        #[arg(long)]
        dry_run: bool,

        /// Print the step report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report which steps are already satisfied
    Check {
        /// Hostname to inspect
        host: String,

        /// Remote user that owns the site
        #[arg(long)]
        user: String,

        /// SSH private key
        #[arg(long)]
        identity: Option<String>,
    },
}
