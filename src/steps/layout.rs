use crate::error::DeployResult;
use crate::remote::RemoteCommand;
use crate::steps::{Context, Step};

/// Create `database`, `static`, `virtualenv` and `source` under the
/// site root. Existing folders are left untouched.
pub struct EnsureLayout;

impl Step for EnsureLayout {
    fn name(&self) -> &'static str {
        "ensure-layout"
    }

    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool> {
        for dir in ctx.target.layout_dirs() {
            if !ctx.exists(&dir)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        for dir in ctx.target.layout_dirs() {
            if ctx.exists(&dir)? {
                continue;
            }
            ctx.run(&RemoteCommand::new("mkdir").arg("-p").arg(&dir))?;
        }
        Ok(())
    }
}
