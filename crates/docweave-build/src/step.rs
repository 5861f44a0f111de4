//! Build steps and ordered step lists.

use std::fmt;

use docweave_core::ContentUnit;

use crate::{
    error::Result,
    host::{HostService, SharedUnit},
};

/// One named piece of processing logic, run in three phases.
///
/// Steps hold no per-build state; everything they change lives on the units.
pub trait BuildStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Position within the processor's step list; lower runs first.
    fn build_order(&self) -> i32;

    /// Transform the processor's whole unit set before the uid index is built.
    fn prebuild(&self, units: Vec<ContentUnit>, _host: &HostService) -> Result<Vec<ContentUnit>> {
        Ok(units)
    }

    /// Mutate one unit. Runs in parallel across units.
    fn build(&self, _unit: &mut ContentUnit, _host: &HostService) -> Result<()> {
        Ok(())
    }

    /// Runs once every unit of every processor has been built.
    fn postbuild(&self, _units: &[SharedUnit], _host: &HostService) -> Result<()> {
        Ok(())
    }
}

/// Steps of one processor, kept sorted by build order.
///
/// Steps with equal order keep their registration order.
#[derive(Default)]
pub struct BuildStepList {
    steps: Vec<Box<dyn BuildStep>>,
}

impl BuildStepList {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, step: impl BuildStep + 'static) -> Self {
        self.register(Box::new(step));
        self
    }

    pub fn register(&mut self, step: Box<dyn BuildStep>) {
        self.steps.push(step);
        self.steps.sort_by_key(|step| step.build_order());
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn BuildStep> {
        self.steps.iter().map(|step| step.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for BuildStepList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
