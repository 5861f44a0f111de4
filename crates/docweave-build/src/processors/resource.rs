//! Static files copied to the output as-is.

use std::fs;

use docweave_core::{
    ContentPayload, ContentUnit, DocumentType, SourceFile, content::ResourceContent,
};

use crate::{
    error::{BuildError, Result},
    host::SharedMetadata,
    processor::{DocumentProcessor, OutputArtifact, ProcessingPriority, SaveResult},
    step::BuildStepList,
};

const EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "css", "js", "woff", "woff2", "ttf",
    "otf", "eot", "pdf",
];

#[derive(Debug, Default)]
pub struct ResourceProcessor {
    steps: BuildStepList,
}

impl ResourceProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentProcessor for ResourceProcessor {
    fn name(&self) -> &'static str {
        "ResourceProcessor"
    }

    fn build_steps(&self) -> &BuildStepList {
        &self.steps
    }

    fn can_process(&self, file: &SourceFile) -> ProcessingPriority {
        match file.extension() {
            Some(ext) if EXTENSIONS.contains(&ext.as_str()) => ProcessingPriority::Lowest,
            _ => ProcessingPriority::NotSupported,
        }
    }

    fn load(&self, file: &SourceFile, metadata: &SharedMetadata) -> Result<Option<ContentUnit>> {
        let size = fs::metadata(&file.path)?.len();

        let mut unit = ContentUnit::new(
            file.clone(),
            DocumentType::Resource,
            ContentPayload::Resource(ResourceContent { size }),
        );
        unit.metadata = metadata.as_ref().clone();
        unit.output_path = Some(file.key.clone());
        Ok(Some(unit))
    }

    fn save(&self, unit: &ContentUnit) -> Result<SaveResult> {
        if !matches!(unit.payload, ContentPayload::Resource(_)) {
            return Err(BuildError::UnexpectedPayload {
                processor: self.name(),
                key: unit.key().to_string(),
            });
        }

        let artifact = unit.output_path.as_ref().map(|path| OutputArtifact::Resource {
            path: path.clone(),
            source: unit.file.path.clone(),
        });
        Ok(SaveResult {
            artifact,
            xref_specs: Vec::new(),
            xref_dependencies: Default::default(),
        })
    }
}
