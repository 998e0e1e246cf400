pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("command failed: {command}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("deployment plan has no steps")]
    EmptyPlan,

    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        partial: bool,
        #[source]
        source: Box<DeployError>,
    },

    #[error("step '{step}' applied but its postcondition still does not hold")]
    PostconditionFailed { step: String },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl DeployError {
    /// Name of the step this error is attributed to, if any.
    #[must_use]
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } | Self::PostconditionFailed { step } => Some(step),
            _ => None,
        }
    }
}
