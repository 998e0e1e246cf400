use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use crate::error::DeployResult;
use crate::remote::RemoteCommand;
use crate::steps::{Context, Step};
use crate::text::Substitution;

const SECRET_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789!@# $%^&*(-_=+)";
const SECRET_LEN: usize = 50;
const SECRET_IMPORT: &str = "from .secret_key import SECRET_KEY";

/// Generate a secret from the OS random source.
#[must_use]
pub fn generate_secret() -> String {
    let mut rng = OsRng;
    (0..SECRET_LEN)
        .filter_map(|_| SECRET_CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect()
}

/// Rewrite the environment-specific lines of the settings module and
/// wire in a secret key generated once per host.
pub struct RenderSettings;

impl RenderSettings {
    /// The exact lines the settings file must contain.
    #[must_use]
    pub fn desired_lines(ctx: &Context<'_>) -> Vec<String> {
        Self::edits(ctx)
            .into_iter()
            .filter_map(|e| match e {
                Substitution::Line { line, .. } => Some(line),
                Substitution::Literal { .. } => None,
            })
            .chain(std::iter::once(SECRET_IMPORT.to_string()))
            .collect()
    }

    /// Whether a zero-context `git diff` of the settings file holds
    /// nothing but this step's own edits: every added line is a
    /// desired line and every removed line is one it replaces.
    /// A managed line deleted without a replacement does not count.
    #[must_use]
    pub fn owns_diff(ctx: &Context<'_>, diff: &str) -> bool {
        let desired = Self::desired_lines(ctx);
        let prefixes: Vec<String> = Self::edits(ctx)
            .into_iter()
            .filter_map(|e| match e {
                Substitution::Line { prefix, .. } => Some(prefix),
                Substitution::Literal { .. } => None,
            })
            .collect();

        let (mut added_count, mut removed_count) = (0, 0);
        let mut in_hunk = false;
        for raw in diff.lines() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.starts_with("@@") {
                in_hunk = true;
                continue;
            }
            if !in_hunk || line.starts_with('\\') {
                continue;
            }
            if let Some(added) = line.strip_prefix('+') {
                if !desired.iter().any(|d| d == added) {
                    return false;
                }
                added_count += 1;
            } else if let Some(removed) = line.strip_prefix('-') {
                if !prefixes.iter().any(|p| removed.starts_with(p.as_str())) {
                    return false;
                }
                removed_count += 1;
            }
        }
        removed_count <= added_count
    }

    fn edits(ctx: &Context<'_>) -> Vec<Substitution> {
        vec![
            Substitution::line("DEBUG =", "DEBUG = False"),
            Substitution::line(
                "ALLOWED_HOSTS =",
                &format!("ALLOWED_HOSTS = [\"{}\"]", ctx.target.host()),
            ),
            Substitution::line(
                "STATIC_ROOT",
                &format!("STATIC_ROOT = \"{}\"", ctx.project.static_root(ctx.target)),
            ),
        ]
    }
}

impl Step for RenderSettings {
    fn name(&self) -> &'static str {
        "render-settings"
    }

    fn check(&self, ctx: &Context<'_>) -> DeployResult<bool> {
        let source = ctx.target.source_dir();
        if !ctx.exists(&ctx.project.secret_key_file(&source))? {
            return Ok(false);
        }
        let settings = ctx.project.settings_file(&source);
        for line in Self::desired_lines(ctx) {
            let grep = RemoteCommand::new("grep")
                .args(["-qxF", "--"])
                .arg(&line)
                .arg(&settings)
                .read_only();
            if !ctx.probe(&grep)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply(&self, ctx: &Context<'_>) -> DeployResult<()> {
        let source = ctx.target.source_dir();
        let settings = ctx.project.settings_file(&source);

        for edit in Self::edits(ctx) {
            ctx.remote.substitute(&settings, &edit, false)?;
        }

        let secret_file = ctx.project.secret_key_file(&source);
        if !ctx.exists(&secret_file)? {
            let key = generate_secret();
            ctx.remote
                .append_line(&secret_file, &format!("SECRET_KEY = '{key}'"))?;
        }
        ctx.remote.append_line(&settings, SECRET_IMPORT)?;
        Ok(())
    }
}
