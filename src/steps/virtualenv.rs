use crate::error::DeployResult;
use crate::remote::RemoteCommand;
use crate::steps::{Context, Step};

/// Create the virtualenv if needed and install the requirements
/// manifest into it.
pub struct ProvisionVirtualenv;

impl Step for ProvisionVirtualenv {
    fn name(&self) -> &'static str {
        "provision-virtualenv"
    }

    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool> {
        ctx.exists(&ctx.project.venv_bin(ctx.target, "pip"))
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        let venv = ctx.target.virtualenv_dir();
        let pip = ctx.project.venv_bin(ctx.target, "pip");

        if !ctx.exists(&pip)? {
            ctx.run(
                &RemoteCommand::new("virtualenv")
                    .arg(&format!("--python={}", ctx.project.python))
                    .arg(&venv),
            )?;
            ctx.run(&RemoteCommand::new(&pip).args(["install", "pip", "--upgrade"]))?;
        }

        let manifest = format!("{}/{}", ctx.target.source_dir(), ctx.project.requirements);
        ctx.run(&RemoteCommand::new(&pip).args(["install", "-r"]).arg(&manifest))?;
        Ok(())
    }
}
