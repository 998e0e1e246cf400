use tracing::{debug, warn};

use crate::error::DeployResult;
use crate::remote::RemoteCommand;
use crate::steps::{Context, Policy, RenderSettings, Step};

/// Clone or fetch the repository, then force the working tree to
/// the requested revision.
///
/// The reset is destructive: uncommitted changes to tracked files
/// are discarded. The only exception is the settings file, when the
/// tree already sits at the requested commit and every local change
/// in it is one [`RenderSettings`] makes. An unchanged re-deploy
/// then keeps the rendered configuration.
pub struct SyncSource;

impl SyncSource {
    fn git(source: &str) -> RemoteCommand {
        RemoteCommand::new("git").current_dir(source)
    }

    /// Full commit hash for a hash prefix, tag or branch name.
    fn resolve(ctx: &Context<'_>, source: &str, spec: &str) -> DeployResult<String> {
        let out = ctx.run(
            &Self::git(source)
                .args(["rev-parse", "--verify"])
                .arg(&format!("{spec}^{{commit}}"))
                .read_only(),
        )?;
        Ok(out.stdout.trim().to_string())
    }

    /// Tracked files with local modifications, relative to the
    /// checkout root.
    fn modified_files(ctx: &Context<'_>, source: &str) -> DeployResult<Vec<String>> {
        let out = ctx.run(
            &Self::git(source)
                .args(["status", "--porcelain", "--untracked-files=no"])
                .read_only(),
        )?;
        Ok(out
            .stdout
            .lines()
            .filter_map(|l| l.get(3..))
            .map(str::to_string)
            .collect())
    }

    fn settings_rendered_only(
        ctx: &Context<'_>,
        source: &str,
        settings: &str,
    ) -> DeployResult<bool> {
        let diff = ctx.run(
            &Self::git(source)
                .args(["diff", "-U0", "--", settings])
                .read_only(),
        )?;
        Ok(RenderSettings::owns_diff(ctx, &diff.stdout))
    }

    fn needs_reset(ctx: &Context<'_>, source: &str, commit: &str) -> DeployResult<bool> {
        let head = ctx.run(&Self::git(source).args(["rev-parse", "HEAD"]).read_only())?;
        if head.stdout.trim() != commit {
            debug!(head = head.stdout.trim(), commit, "checkout differs");
            return Ok(true);
        }

        let managed = ctx.project.settings_relative();
        let mut drift = Vec::new();
        for file in Self::modified_files(ctx, source)? {
            if file != managed || !Self::settings_rendered_only(ctx, source, &file)? {
                drift.push(file);
            }
        }
        if !drift.is_empty() {
            warn!(files = ?drift, "discarding local changes");
        }
        Ok(!drift.is_empty())
    }
}

impl Step for SyncSource {
    fn name(&self) -> &'static str {
        "sync-source"
    }

    fn policy(&self) -> Policy {
        Policy::AlwaysApply
    }

    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool> {
        ctx.exists(&format!("{}/.git", ctx.target.source_dir()))
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        let source = ctx.target.source_dir();

        if self.check(ctx)? {
            ctx.run(&Self::git(&source).arg("fetch"))?;
        } else {
            ctx.run(
                &RemoteCommand::new("git")
                    .arg("clone")
                    .arg(&ctx.project.repo_url)
                    .arg(&source),
            )?;
        }

        let commit = Self::resolve(ctx, &source, ctx.revision)?;
        if Self::needs_reset(ctx, &source, &commit)? {
            ctx.run(&Self::git(&source).args(["reset", "--hard", commit.as_str()]))?;
        }
        Ok(())
    }
}
