//! Runs a [`Plan`] against one target, one step at a time.
//!
//! For each step the executor calls `check`; a satisfied step with
//! [`Policy::SkipWhenSatisfied`] is skipped. Otherwise it calls
//! `apply` and re-runs `check` to confirm the postcondition. The
//! first failure aborts the run; nothing is retried or rolled back.
//!
//! Running two deployments against the same host at the same time
//! is unsupported and may leave it in a mixed state. No locking is
//! attempted.

use std::cell::Cell;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{DeployError, DeployResult};
use crate::plan::Plan;
use crate::remote::{CommandOutput, Remote, RemoteCommand};
use crate::steps::{Context, Policy, Step};
use crate::text::Substitution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Applied,
    Skipped,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub action: Action,
    pub elapsed_ms: u64,
}

/// What a successful run did, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub outcomes: Vec<StepOutcome>,
}

impl Report {
    #[must_use]
    pub fn applied(&self) -> Vec<&str> {
        self.with_action(Action::Applied)
    }

    #[must_use]
    pub fn skipped(&self) -> Vec<&str> {
        self.with_action(Action::Skipped)
    }

    fn with_action(&self, action: Action) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.action == action)
            .map(|o| o.step.as_str())
            .collect()
    }
}

/// Execute `plan` in order against `ctx.target`.
///
/// # Errors
///
/// - [`DeployError::SshFailed`] (or another transport error) when the
///   host cannot be reached; no step has run.
/// - [`DeployError::StepFailed`] when a step's `apply` fails; later
///   steps have not run.
/// - [`DeployError::PostconditionFailed`] when `apply` returned but
///   `check` still reports the step unsatisfied.
pub fn run(ctx: &Context<'_>, plan: &Plan) -> DeployResult<Report> {
    preflight(ctx, plan)?;

    let mut report = Report::default();
    for step in plan.steps() {
        let started = Instant::now();
        let action = run_step(ctx, step.as_ref())?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            step = step.name(),
            outcome = action.as_str(),
            elapsed_ms,
            "step finished"
        );
        report.outcomes.push(StepOutcome {
            step: step.name().to_string(),
            action,
            elapsed_ms,
        });
    }

    info!(
        host = ctx.target.host(),
        applied = report.applied().len(),
        skipped = report.skipped().len(),
        "deployment complete"
    );
    Ok(report)
}

/// Evaluate every step's check without applying anything.
pub fn inspect(ctx: &Context<'_>, plan: &Plan) -> DeployResult<Vec<(&'static str, bool)>> {
    preflight(ctx, plan)?;
    Ok(plan
        .steps()
        .iter()
        .map(|step| (step.name(), check_or_false(ctx, step.as_ref())))
        .collect())
}

fn preflight(ctx: &Context<'_>, plan: &Plan) -> DeployResult<()> {
    if plan.is_empty() {
        return Err(DeployError::EmptyPlan);
    }
    if ctx.revision.is_empty() {
        return Err(DeployError::InvalidInput("revision must not be empty".into()));
    }

    let probe = ctx.remote.run(&RemoteCommand::new("true"))?;
    if !probe.success() {
        return Err(DeployError::SshFailed(format!(
            "{}: connectivity probe exited with {:?}",
            ctx.target.host(),
            probe.code
        )));
    }
    Ok(())
}

fn run_step(ctx: &Context<'_>, step: &dyn Step) -> DeployResult<Action> {
    let satisfied = check_or_false(ctx, step);
    if satisfied && step.policy() == Policy::SkipWhenSatisfied {
        return Ok(Action::Skipped);
    }

    let tracked = Tracked::new(ctx.remote);
    let step_ctx = ctx.with_remote(&tracked);
    if let Err(source) = step.apply(&step_ctx) {
        let partial = tracked.mutations() > 0;
        warn!(step = step.name(), partial, error = %source, "step failed");
        return Err(DeployError::StepFailed {
            step: step.name().to_string(),
            partial,
            source: Box::new(source),
        });
    }

    match step.check(ctx) {
        Ok(true) => Ok(Action::Applied),
        Ok(false) => Err(DeployError::PostconditionFailed {
            step: step.name().to_string(),
        }),
        Err(source) => Err(DeployError::StepFailed {
            step: step.name().to_string(),
            partial: tracked.mutations() > 0,
            source: Box::new(source),
        }),
    }
}

/// A check that cannot run (missing path, unreadable file) counts as
/// unsatisfied.
fn check_or_false(ctx: &Context<'_>, step: &dyn Step) -> bool {
    match step.check(ctx) {
        Ok(satisfied) => satisfied,
        Err(e) => {
            warn!(step = step.name(), error = %e, "check failed, treating as unsatisfied");
            false
        }
    }
}

/// Counts remote operations that completed and may have changed the
/// host, so a failed step can report whether it left partial state.
struct Tracked<'a> {
    inner: &'a dyn Remote,
    mutations: Cell<usize>,
}

impl<'a> Tracked<'a> {
    fn new(inner: &'a dyn Remote) -> Self {
        Self {
            inner,
            mutations: Cell::new(0),
        }
    }

    fn mutations(&self) -> usize {
        self.mutations.get()
    }

    fn count(&self, changed: bool) {
        if changed {
            self.mutations.set(self.mutations.get() + 1);
        }
    }
}

impl Remote for Tracked<'_> {
    fn run(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        let out = self.inner.run(command)?;
        self.count(out.success() && !command.read_only);
        Ok(out)
    }

    fn sudo(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        let out = self.inner.sudo(command)?;
        self.count(out.success() && !command.read_only);
        Ok(out)
    }

    fn exists(&self, path: &str) -> DeployResult<bool> {
        self.inner.exists(path)
    }

    fn substitute(
        &self,
        path: &str,
        edit: &Substitution,
        privileged: bool,
    ) -> DeployResult<bool> {
        let changed = self.inner.substitute(path, edit, privileged)?;
        self.count(changed);
        Ok(changed)
    }

    fn append_line(&self, path: &str, line: &str) -> DeployResult<bool> {
        let changed = self.inner.append_line(path, line)?;
        self.count(changed);
        Ok(changed)
    }
}
