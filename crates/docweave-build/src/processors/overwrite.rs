//! Overwrite documents: markdown files that patch API items by uid.
//!
//! A file named `*.overwrite.md` holds one or more sections. Each section is a
//! YAML header naming the `uid` it patches plus a markdown body. Header fields
//! are merged into the matching item; the body becomes its `conceptual`
//! content unless a header field holds the `*content` placeholder, in which
//! case that field receives the body instead.

use docweave_core::{
    ContentPayload, ContentUnit, DocumentType, SourceFile,
    content::OverwriteContent,
    frontmatter::split_sections,
    model::OverwriteFragment,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::MarkupCollector;
use crate::{
    error::Result,
    host::{HostService, SharedMetadata},
    processor::{DocumentProcessor, ProcessingPriority, SaveResult},
    step::{BuildStep, BuildStepList},
};

/// File name suffix claimed by this processor.
pub const OVERWRITE_SUFFIX: &str = ".overwrite.md";

/// Header value replaced by the section's rendered body.
pub const CONTENT_PLACEHOLDER: &str = "*content";

/// Header fields holding markdown.
const MARKDOWN_FIELDS: &[&str] = &["summary", "remarks"];

#[derive(Debug)]
pub struct OverwriteProcessor {
    steps: BuildStepList,
}

impl Default for OverwriteProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl OverwriteProcessor {
    pub fn new() -> Self {
        Self {
            steps: BuildStepList::new().with(RenderOverwrite),
        }
    }
}

impl DocumentProcessor for OverwriteProcessor {
    fn name(&self) -> &'static str {
        "OverwriteProcessor"
    }

    fn build_steps(&self) -> &BuildStepList {
        &self.steps
    }

    fn can_process(&self, file: &SourceFile) -> ProcessingPriority {
        if file.file_name().to_lowercase().ends_with(OVERWRITE_SUFFIX) {
            ProcessingPriority::High
        } else {
            ProcessingPriority::NotSupported
        }
    }

    fn load(&self, file: &SourceFile, metadata: &SharedMetadata) -> Result<Option<ContentUnit>> {
        let content = file.read_to_string()?;
        let mut fragments = Vec::new();

        for (mut header, markdown) in split_sections(&content, &file.path)? {
            let Some(uid) = header
                .remove("uid")
                .and_then(|uid| uid.as_str().map(str::to_string))
            else {
                warn!(key = %file.key, "overwrite section without uid, skipping");
                continue;
            };
            fragments.push(OverwriteFragment {
                uid,
                fields: header.into_iter().collect(),
                markdown,
                conceptual: None,
            });
        }

        if fragments.is_empty() {
            warn!(key = %file.key, "overwrite document has no sections");
            return Ok(None);
        }

        let uids: Vec<String> = fragments.iter().map(|f| f.uid.clone()).collect();
        let mut unit = ContentUnit::new(
            file.clone(),
            DocumentType::Overwrite,
            ContentPayload::Overwrite(OverwriteContent { fragments }),
        );
        unit.metadata = metadata.as_ref().clone();
        for uid in uids {
            unit.add_uid(uid);
        }
        Ok(Some(unit))
    }

    fn save(&self, unit: &ContentUnit) -> Result<SaveResult> {
        Ok(SaveResult {
            artifact: None,
            xref_specs: Vec::new(),
            xref_dependencies: unit.xref_dependencies.clone(),
        })
    }
}

/// Renders markdown header fields and section bodies.
struct RenderOverwrite;

impl BuildStep for RenderOverwrite {
    fn name(&self) -> &'static str {
        "RenderOverwrite"
    }

    fn build_order(&self) -> i32 {
        10
    }

    fn build(&self, unit: &mut ContentUnit, host: &HostService) -> Result<()> {
        let mut collector = MarkupCollector::new(host, unit);
        let ContentPayload::Overwrite(content) = &mut unit.payload else {
            return Ok(());
        };

        for fragment in &mut content.fragments {
            for field in MARKDOWN_FIELDS {
                if let Some(Value::String(raw)) = fragment.fields.get(*field)
                    && raw != CONTENT_PLACEHOLDER
                {
                    let html = collector.render(raw, false)?.html;
                    fragment.fields.insert(field.to_string(), Value::String(html));
                }
            }

            let body = if fragment.markdown.trim().is_empty() {
                None
            } else {
                Some(collector.render(&fragment.markdown, false)?.html)
            };

            let placeholders: Vec<String> = fragment
                .fields
                .iter()
                .filter(|(_, value)| value.as_str() == Some(CONTENT_PLACEHOLDER))
                .map(|(key, _)| key.clone())
                .collect();

            if placeholders.is_empty() {
                fragment.conceptual = body;
            } else {
                for key in placeholders {
                    match &body {
                        Some(html) => fragment.fields.insert(key, Value::String(html.clone())),
                        None => fragment.fields.remove(&key),
                    };
                }
            }
            debug!(uid = %fragment.uid, "rendered overwrite section");
        }

        collector.finish(unit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use docweave_core::Metadata;

    use super::*;
    use crate::host::tests::test_host;

    fn load(content: &str) -> Option<ContentUnit> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api/widget.overwrite.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();

        OverwriteProcessor::new()
            .load(&SourceFile::new(dir.path(), &path), &Arc::new(Metadata::new()))
            .unwrap()
    }

    fn fragments(unit: &ContentUnit) -> &[OverwriteFragment] {
        &unit.payload.as_overwrite().unwrap().fragments
    }

    #[test]
    fn test_load_sections() {
        let unit = load(
            "---\nuid: Contoso.Widget\nsummary: New *summary*.\n---\nWidget body.\n\n---\nuid: Contoso.Widget.Spin*\n---\nSpin body.\n",
        )
        .unwrap();

        assert_eq!(unit.document_type, DocumentType::Overwrite);
        assert_eq!(unit.uids, vec!["Contoso.Widget", "Contoso.Widget.Spin*"]);
        assert!(unit.output_path.is_none());

        let fragments = fragments(&unit);
        assert_eq!(fragments[0].fields["summary"], "New *summary*.");
        assert!(!fragments[0].fields.contains_key("uid"));
        assert_eq!(fragments[1].markdown, "Spin body.");
    }

    #[test]
    fn test_sections_without_uid_are_skipped() {
        assert!(load("---\ntitle: nothing\n---\nbody\n").is_none());
    }

    #[test]
    fn test_render_body_into_conceptual() {
        let mut unit = load(
            "---\nuid: Contoso.Widget\nsummary: New *summary*.\n---\nSee [spin](xref:Contoso.Widget.Spin*).\n",
        )
        .unwrap();
        RenderOverwrite.build(&mut unit, &test_host()).unwrap();

        let fragment = &fragments(&unit)[0];
        assert_eq!(
            fragment.fields["summary"].as_str().unwrap().trim(),
            "<p>New <em>summary</em>.</p>"
        );
        assert!(fragment.conceptual.as_deref().unwrap().contains("<a href=\"xref:Contoso.Widget.Spin*\">"));
        assert!(unit.xref_dependencies.contains("Contoso.Widget.Spin*"));
    }

    #[test]
    fn test_content_placeholder_receives_body() {
        let mut unit = load(
            "---\nuid: Contoso.Widget\nremarks: '*content'\n---\nLong remarks.\n\n---\nuid: Contoso.Gadget\nexample: '*content'\n---\n",
        )
        .unwrap();
        RenderOverwrite.build(&mut unit, &test_host()).unwrap();

        let fragments = fragments(&unit);
        assert_eq!(
            fragments[0].fields["remarks"].as_str().unwrap().trim(),
            "<p>Long remarks.</p>"
        );
        assert!(fragments[0].conceptual.is_none());
        assert!(!fragments[1].fields.contains_key("example"));
    }

    #[test]
    fn test_save_writes_nothing() {
        let unit = load("---\nuid: A\n---\nbody\n").unwrap();
        let saved = OverwriteProcessor::new().save(&unit).unwrap();
        assert!(saved.artifact.is_none());
        assert!(saved.xref_specs.is_empty());
    }
}
