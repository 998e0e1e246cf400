//! Idempotent deployment steps.
//!
//! Every step pairs a `check`, which reports whether the step's
//! postcondition already holds, with an `apply` that establishes
//! it. Once `apply` succeeds `check` must return `true`, and running
//! `apply` again must be harmless.

pub mod layout;
pub mod migrate;
pub mod service;
pub mod settings;
pub mod source;
pub mod static_files;
pub mod virtualenv;

use crate::error::DeployResult;
use crate::project::Project;
use crate::remote::{CommandOutput, Remote, RemoteCommand};
use crate::target::Target;

pub use layout::EnsureLayout;
pub use migrate::ApplyMigrations;
pub use service::InstallService;
pub use settings::RenderSettings;
pub use source::SyncSource;
pub use static_files::PublishStatic;
pub use virtualenv::ProvisionVirtualenv;

/// Whether a satisfied check lets the executor skip `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    SkipWhenSatisfied,
    /// Apply on every run. `check` still verifies the result.
    AlwaysApply,
}

/// Everything a step may read. Passed explicitly to each call.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub target: &'a Target,
    pub project: &'a Project,
    pub revision: &'a str,
    pub remote: &'a dyn Remote,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(
        target: &'a Target,
        project: &'a Project,
        revision: &'a str,
        remote: &'a dyn Remote,
    ) -> Self {
        Self {
            target,
            project,
            revision,
            remote,
        }
    }

    /// Same context routed through another remote.
    #[must_use]
    pub fn with_remote(self, remote: &'a dyn Remote) -> Self {
        Self { remote, ..self }
    }

    /// Run as the deploying user; non-zero exit is an error.
    pub fn run(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        self.remote.run(command)?.require()
    }

    /// Run with privilege; non-zero exit is an error.
    pub fn sudo(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        self.remote.sudo(command)?.require()
    }

    /// Run as the deploying user and report only whether it
    /// succeeded.
    pub fn probe(&self, command: &RemoteCommand) -> DeployResult<bool> {
        Ok(self.remote.run(command)?.success())
    }

    pub fn exists(&self, path: &str) -> DeployResult<bool> {
        self.remote.exists(path)
    }
}

/// A named, idempotent unit of deployment work.
pub trait Step {
    fn name(&self) -> &'static str;

    fn policy(&self) -> Policy {
        Policy::SkipWhenSatisfied
    }

    /// Whether the postcondition already holds.
    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool>;

    /// Establish the postcondition.
    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()>;
}
