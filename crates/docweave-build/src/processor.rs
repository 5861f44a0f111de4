//! Document processors and processor selection.

use std::{collections::BTreeSet, fmt, path::PathBuf};

use docweave_core::{ContentUnit, SourceFile, XrefSpec, content::ArticleContent};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::Result,
    host::SharedMetadata,
    processors::{
        ConceptualProcessor, ManagedReferenceProcessor, OverwriteProcessor, ResourceProcessor,
        RestApiProcessor,
    },
    step::BuildStepList,
};

/// How strongly a processor claims a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessingPriority {
    NotSupported,
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

/// Something to place in the output directory.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputArtifact {
    /// A JSON document written pretty-printed.
    Document { path: String, document: Value },
    /// A file copied verbatim.
    Resource { path: String, source: PathBuf },
}

impl OutputArtifact {
    /// Path relative to the output directory.
    pub fn path(&self) -> &str {
        match self {
            Self::Document { path, .. } | Self::Resource { path, .. } => path,
        }
    }
}

/// What saving a unit produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveResult {
    /// `None` for units that are not written, such as overwrite documents.
    pub artifact: Option<OutputArtifact>,

    pub xref_specs: Vec<XrefSpec>,

    pub xref_dependencies: BTreeSet<String>,
}

/// Loads, builds and saves one kind of content.
pub trait DocumentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn build_steps(&self) -> &BuildStepList;

    fn can_process(&self, file: &SourceFile) -> ProcessingPriority;

    /// Load a file into a unit. `Ok(None)` skips the file.
    fn load(&self, file: &SourceFile, metadata: &SharedMetadata) -> Result<Option<ContentUnit>>;

    fn save(&self, unit: &ContentUnit) -> Result<SaveResult>;
}

/// JSON output document for an article unit.
pub(crate) fn article_document(unit: &ContentUnit, content: &ArticleContent) -> Result<Value> {
    Ok(json!({
        "source": unit.key(),
        "uids": unit.uids,
        "metadata": unit.metadata,
        "links": unit.link_targets,
        "content": serde_json::to_value(content)?,
    }))
}

/// Ordered set of processors; earlier registrations win priority ties.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in processor.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(ManagedReferenceProcessor::new())
            .with(RestApiProcessor::new())
            .with(OverwriteProcessor::new())
            .with(ConceptualProcessor::new())
            .with(ResourceProcessor::new())
    }

    #[must_use]
    pub fn with(mut self, processor: impl DocumentProcessor + 'static) -> Self {
        self.register(Box::new(processor));
        self
    }

    pub fn register(&mut self, processor: Box<dyn DocumentProcessor>) {
        debug!(
            processor = processor.name(),
            steps = ?processor.build_steps(),
            "registered processor"
        );
        self.processors.push(processor);
    }

    /// Pick the processor for `file`: highest priority, then registration order.
    pub fn select(&self, file: &SourceFile) -> Option<usize> {
        let mut best: Option<(usize, ProcessingPriority)> = None;
        for (index, processor) in self.processors.iter().enumerate() {
            let priority = processor.can_process(file);
            if priority == ProcessingPriority::NotSupported {
                continue;
            }
            if best.is_none_or(|(_, current)| priority > current) {
                best = Some((index, priority));
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn get(&self, index: usize) -> Option<&dyn DocumentProcessor> {
        self.processors.get(index).map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DocumentProcessor> {
        self.processors.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
