use crate::error::DeployResult;
use crate::remote::RemoteCommand;
use crate::steps::{Context, Policy, Step};

/// Run `manage.py <args>` with the virtualenv's interpreter from
/// the checkout root.
pub(crate) fn manage(ctx: &Context<'_>, args: &[&str]) -> RemoteCommand {
    RemoteCommand::new(&ctx.project.venv_bin(ctx.target, &ctx.project.python))
        .arg("manage.py")
        .args(args)
        .current_dir(&ctx.target.source_dir())
}

/// Prepare the web server's static root and collect assets into
/// it. Collection overwrites a fixed directory, so it runs on every
/// deploy.
pub struct PublishStatic;

impl Step for PublishStatic {
    fn name(&self) -> &'static str {
        "publish-static"
    }

    fn policy(&self) -> Policy {
        Policy::AlwaysApply
    }

    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool> {
        ctx.exists(&ctx.project.static_root(ctx.target))
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        let root = ctx.project.static_root(ctx.target);

        ctx.sudo(&RemoteCommand::new("mkdir").arg("-p").arg(&root))?;
        ctx.sudo(&RemoteCommand::new("chgrp").arg(ctx.target.user()).arg(&root))?;
        ctx.sudo(&RemoteCommand::new("chmod").arg("g+w").arg(&root))?;
        ctx.run(&manage(ctx, &["collectstatic", "--noinput"]))?;
        Ok(())
    }
}
