//! Built-in document processors.
//!
//! - [`ConceptualProcessor`] - markdown articles
//! - [`OverwriteProcessor`] - `*.overwrite.md` patches for API items
//! - [`ManagedReferenceProcessor`] - managed reference YAML pages
//! - [`RestApiProcessor`] - Swagger/OpenAPI documents
//! - [`ResourceProcessor`] - images, styles, scripts and fonts

mod conceptual;
mod managed_reference;
mod overwrite;
mod resource;
mod rest_api;

use std::collections::BTreeSet;

pub use conceptual::ConceptualProcessor;
use docweave_core::ContentUnit;
use docweave_markup::{MarkupContext, MarkupResult};
pub use managed_reference::ManagedReferenceProcessor;
pub use overwrite::OverwriteProcessor;
pub use resource::ResourceProcessor;
pub use rest_api::RestApiProcessor;

use crate::{error::Result, host::HostService};

/// Renders markup for one unit and gathers what the renders discovered.
pub(crate) struct MarkupCollector<'a> {
    host: &'a HostService,
    context: MarkupContext,
    link_targets: BTreeSet<String>,
    xref_dependencies: BTreeSet<String>,
}

impl<'a> MarkupCollector<'a> {
    pub(crate) fn new(host: &'a HostService, unit: &ContentUnit) -> Self {
        Self {
            host,
            context: MarkupContext::new(unit.key()),
            link_targets: BTreeSet::new(),
            xref_dependencies: BTreeSet::new(),
        }
    }

    pub(crate) fn render(&mut self, raw: &str, inline: bool) -> Result<MarkupResult> {
        let result = self.host.markup(raw, &self.context, inline)?;
        self.link_targets.extend(result.link_targets.iter().cloned());
        self.xref_dependencies
            .extend(result.xref_dependencies.iter().cloned());
        Ok(result)
    }

    /// Replace a markdown field with its rendered HTML. Blank fields are left alone.
    pub(crate) fn render_field(&mut self, field: &mut Option<String>, inline: bool) -> Result<()> {
        if let Some(raw) = field.as_deref()
            && !raw.trim().is_empty()
        {
            let html = self.render(raw, inline)?.html;
            *field = Some(html);
        }
        Ok(())
    }

    /// Record everything gathered on the unit.
    pub(crate) fn finish(self, unit: &mut ContentUnit) {
        unit.link_targets.extend(self.link_targets);
        unit.xref_dependencies.extend(self.xref_dependencies);
    }
}
