//! Idempotent deployment steps for a single web application host.
//!
//! Relancar (Portuguese for *relaunch*) deploys a Django-style
//! application to one host over SSH. Every step checks whether its
//! effect already holds before changing anything, so a failed or
//! interrupted deployment is fixed by simply running it again.
//!
//! # Overview
//!
//! - A [`Target`] names the host and deploying user and derives the
//!   site layout (`/home/<user>/sites/<host>/{database,static,virtualenv,source}`).
//! - A [`Project`] describes the application: repository URL,
//!   package name, interpreter, init script template.
//! - A [`Plan`] is an ordered list of [`Step`]s;
//!   [`Plan::standard`] holds the seven steps of a full deployment.
//! - [`executor::run`] executes a plan through any [`Remote`]
//!   implementation, such as [`SshSession`].
//!
//! # Steps
//!
//! 1. **ensure-layout** - create missing site folders
//! 2. **sync-source** - clone or fetch, then reset to the revision
//! 3. **render-settings** - production settings and a secret key
//! 4. **provision-virtualenv** - virtualenv and requirements
//! 5. **publish-static** - static root permissions, `collectstatic`
//! 6. **apply-migrations** - `migrate`
//! 7. **install-service** - init script, start, register for boot
//!
//! The first three steps (and the virtualenv) are skipped when
//! already satisfied. The rest run on every deploy.
//!
//! # Example
//!
//! Create an `xtask/src/main.rs` in your project:
//!
//! ```rust,no_run
//! use relancar::{Pipeline, Project};
//!
//! fn main() -> anyhow::Result<()> {
//!     let project = Project::new("https://github.com/acme/superlists.git")
//!         .package("superlists")
//!         .python("python3");
//!
//!     Pipeline::new(project).run()?;
//!     Ok(())
//! }
//! ```
//!
//! Then:
//!
//! ```sh
//! # Deploy the local HEAD commit
//! cargo xtask deploy staging.example.com --user deploy
//!
//! # Preview without connecting
//! cargo xtask deploy staging.example.com --user deploy --dry-run
//!
//! # See which steps are already satisfied
//! cargo xtask check staging.example.com --user deploy
//! ```
//!
//! Library users can drive the executor directly:
//!
//! ```rust,no_run
//! use relancar::{Context, Plan, Project, SshSession, Target, executor};
//!
//! # fn main() -> relancar::error::DeployResult<()> {
//! let target = Target::new("staging.example.com", "deploy")?;
//! let project = Project::new("https://github.com/acme/superlists.git");
//! let ssh = SshSession::new(target.host(), target.user());
//! let ctx = Context::new(&target, &project, "4f1c2e9", &ssh);
//!
//! let report = executor::run(&ctx, &Plan::standard())?;
//! println!("applied: {:?}", report.applied());
//! # Ok(())
//! # }
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cmd;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod plan;
pub mod project;
pub mod remote;
pub mod ssh;
pub mod steps;
pub mod target;
pub mod text;

pub use error::{DeployError, DeployResult};
pub use executor::Report;
pub use pipeline::Pipeline;
pub use plan::Plan;
pub use project::Project;
pub use remote::{CommandOutput, Remote, RemoteCommand};
pub use ssh::SshSession;
pub use steps::{Context, Policy, Step};
pub use target::Target;
pub use text::Substitution;
