use tracing::info;

use crate::error::DeployResult;
use crate::remote::RemoteCommand;
use crate::steps::{Context, Policy, Step};
use crate::text::Substitution;

/// Install the init script from the checkout's template, start the
/// service, and register it for boot once it has started.
///
/// A failed start is reported with the script's stdout, stderr and
/// exit code, and the service is not registered.
pub struct InstallService;

impl Step for InstallService {
    fn name(&self) -> &'static str {
        "install-service"
    }

    fn policy(&self) -> Policy {
        Policy::AlwaysApply
    }

    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool> {
        ctx.exists(&ctx.project.init_script(ctx.target))
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        let project = ctx.project;
        let script = project.init_script(ctx.target);
        let template = format!("{}/{}", ctx.target.source_dir(), project.init_template);

        ctx.sudo(&RemoteCommand::new("cp").arg(&template).arg(&script))?;
        ctx.remote.substitute(
            &script,
            &Substitution::literal(&project.placeholder, ctx.target.site_id()),
            true,
        )?;
        ctx.sudo(&RemoteCommand::new("chmod").arg("+x").arg(&script))?;

        let backup = format!("{script}.bak");
        if ctx.exists(&backup)? {
            ctx.sudo(&RemoteCommand::new("rm").arg(&backup))?;
        }

        let started = ctx.sudo(&RemoteCommand::new(&script).arg("start"))?;
        info!(
            service = %project.service_name(ctx.target),
            output = started.stdout.trim(),
            "service started"
        );

        ctx.sudo(
            &RemoteCommand::new("chkconfig")
                .arg(&project.service_name(ctx.target))
                .arg("--add"),
        )?;
        Ok(())
    }
}
