use crate::steps::{
    ApplyMigrations, EnsureLayout, InstallService, ProvisionVirtualenv, PublishStatic,
    RenderSettings, Step, SyncSource,
};

/// An ordered sequence of steps. Order matters: later steps rely on
/// what earlier ones created.
#[derive(Default)]
pub struct Plan {
    steps: Vec<Box<dyn Step>>,
}

impl Plan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The full deployment: layout, source, settings, virtualenv,
    /// static assets, migrations, service.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .step(EnsureLayout)
            .step(SyncSource)
            .step(RenderSettings)
            .step(ProvisionVirtualenv)
            .step(PublishStatic)
            .step(ApplyMigrations)
            .step(InstallService)
    }

    #[must_use]
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
