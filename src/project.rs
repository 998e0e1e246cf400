use std::path::Path;

use serde::Deserialize;

use crate::error::{DeployError, DeployResult};
use crate::target::Target;

/// Describes the application being deployed: where its source
/// lives and how its checkout is laid out.
///
/// Defaults match a Django project named `superlists` served by
/// gunicorn behind nginx.
///
/// # Example
///
/// ```
/// use relancar::Project;
///
/// let project = Project::new("https://github.com/acme/todo.git")
///     .package("todo")
///     .python("python3.12");
///
/// assert_eq!(project.settings_file("/src"), "/src/todo/settings.py");
/// assert_eq!(project.requirements, "requirements.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Project {
    pub repo_url: String,
    pub package: String,
    pub python: String,
    pub requirements: String,
    pub init_template: String,
    pub service_prefix: String,
    pub static_base: String,
    pub init_dir: String,
    pub placeholder: String,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            package: "superlists".to_string(),
            python: "python3".to_string(),
            requirements: "requirements.txt".to_string(),
            init_template: "deploy_tools/gunicorn-template".to_string(),
            service_prefix: "gunicorn".to_string(),
            static_base: "/usr/share/nginx".to_string(),
            init_dir: "/etc/init.d".to_string(),
            placeholder: "SITENAME".to_string(),
        }
    }
}

impl Project {
    #[must_use]
    pub fn new(repo_url: &str) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            ..Self::default()
        }
    }

    /// Parse a YAML project description. Only `repo_url` is
    /// required.
    pub fn from_yaml(yaml: &str) -> DeployResult<Self> {
        let project: Self = serde_yaml::from_str(yaml)?;
        project.validate()?;
        Ok(project)
    }

    pub fn from_file(path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            return Err(DeployError::FileNotFound(path.display().to_string()));
        }
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> DeployResult<()> {
        if self.repo_url.is_empty() {
            return Err(DeployError::InvalidInput("repo_url must not be empty".into()));
        }
        if self.package.is_empty() || self.package.contains('/') {
            return Err(DeployError::InvalidInput(format!(
                "package must be a single path component: {:?}",
                self.package
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn package(mut self, package: &str) -> Self {
        self.package = package.to_string();
        self
    }

    #[must_use]
    pub fn python(mut self, python: &str) -> Self {
        self.python = python.to_string();
        self
    }

    #[must_use]
    pub fn requirements(mut self, path: &str) -> Self {
        self.requirements = path.to_string();
        self
    }

    #[must_use]
    pub fn init_template(mut self, path: &str) -> Self {
        self.init_template = path.to_string();
        self
    }

    #[must_use]
    pub fn service_prefix(mut self, prefix: &str) -> Self {
        self.service_prefix = prefix.to_string();
        self
    }

    #[must_use]
    pub fn static_base(mut self, dir: &str) -> Self {
        self.static_base = dir.to_string();
        self
    }

    #[must_use]
    pub fn init_dir(mut self, dir: &str) -> Self {
        self.init_dir = dir.to_string();
        self
    }

    #[must_use]
    pub fn placeholder(mut self, token: &str) -> Self {
        self.placeholder = token.to_string();
        self
    }

    /// Settings path relative to the checkout root.
    #[must_use]
    pub fn settings_relative(&self) -> String {
        format!("{}/settings.py", self.package)
    }

    #[must_use]
    pub fn settings_file(&self, source: &str) -> String {
        format!("{source}/{}", self.settings_relative())
    }

    #[must_use]
    pub fn secret_key_file(&self, source: &str) -> String {
        format!("{source}/{}/secret_key.py", self.package)
    }

    /// Directory the web server serves static assets from.
    #[must_use]
    pub fn static_root(&self, target: &Target) -> String {
        format!("{}/{}-static", self.static_base, target.site_id())
    }

    #[must_use]
    pub fn service_name(&self, target: &Target) -> String {
        format!("{}-{}", self.service_prefix, target.host())
    }

    #[must_use]
    pub fn init_script(&self, target: &Target) -> String {
        format!("{}/{}", self.init_dir, self.service_name(target))
    }

    #[must_use]
    pub fn venv_bin(&self, target: &Target, program: &str) -> String {
        format!("{}/bin/{program}", target.virtualenv_dir())
    }
}
