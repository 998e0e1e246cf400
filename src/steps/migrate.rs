use crate::error::DeployResult;
use crate::steps::static_files::manage;
use crate::steps::{Context, Policy, Step};

/// Apply database migrations. The migration tool tracks what has
/// run, so there is no postcondition to check beyond its exit code.
pub struct ApplyMigrations;

impl Step for ApplyMigrations {
    fn name(&self) -> &'static str {
        "apply-migrations"
    }

    fn policy(&self) -> Policy {
        Policy::AlwaysApply
    }

    fn check(&self, _ctx: &Context<'_>) -> DeployResult<bool> {
        Ok(true)
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        ctx.run(&manage(ctx, &["migrate", "--noinput"]))?;
        Ok(())
    }
}
