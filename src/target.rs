use crate::error::{DeployError, DeployResult};

/// The remote host and deploying user, plus the filesystem layout
/// derived from them.
///
/// # Example
///
/// ```
/// use relancar::Target;
///
/// let target = Target::new("staging.example.com", "deploy").unwrap();
///
/// assert_eq!(target.site_id(), "staging");
/// assert_eq!(target.site_root(), "/home/deploy/sites/staging.example.com");
/// assert_eq!(target.source_dir(), "/home/deploy/sites/staging.example.com/source");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    user: String,
}

impl Target {
    /// Subfolders created under the site root, in creation order.
    pub const LAYOUT: [&'static str; 4] = ["database", "static", "virtualenv", "source"];

    pub fn new(host: &str, user: &str) -> DeployResult<Self> {
        validate("host", host)?;
        validate("user", user)?;
        Ok(Self {
            host: host.to_string(),
            user: user.to_string(),
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Leading DNS label of the host.
    #[must_use]
    pub fn site_id(&self) -> &str {
        self.host.split('.').next().unwrap_or(&self.host)
    }

    #[must_use]
    pub fn site_root(&self) -> String {
        format!("/home/{}/sites/{}", self.user, self.host)
    }

    #[must_use]
    pub fn layout_dir(&self, name: &str) -> String {
        format!("{}/{name}", self.site_root())
    }

    #[must_use]
    pub fn layout_dirs(&self) -> Vec<String> {
        Self::LAYOUT.iter().map(|d| self.layout_dir(d)).collect()
    }

    #[must_use]
    pub fn source_dir(&self) -> String {
        self.layout_dir("source")
    }

    #[must_use]
    pub fn virtualenv_dir(&self) -> String {
        self.layout_dir("virtualenv")
    }

    #[must_use]
    pub fn static_dir(&self) -> String {
        self.layout_dir("static")
    }

    #[must_use]
    pub fn database_dir(&self) -> String {
        self.layout_dir("database")
    }
}

fn validate(field: &str, value: &str) -> DeployResult<()> {
    if value.is_empty() {
        return Err(DeployError::InvalidInput(format!("{field} must not be empty")));
    }
    if value.starts_with(['-', '.']) {
        return Err(DeployError::InvalidInput(format!(
            "{field} must not start with '-' or '.': {value}"
        )));
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        return Err(DeployError::InvalidInput(format!(
            "{field} contains unsupported characters: {value}"
        )));
    }
    Ok(())
}
