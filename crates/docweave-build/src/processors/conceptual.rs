//! Markdown articles.

use std::sync::OnceLock;

use docweave_core::{
    ContentPayload, ContentUnit, DocumentType, SourceFile, XrefSpec,
    content::ArticleContent,
    frontmatter::parse_metadata,
    model::ConceptualPage,
    xref::{HREF, NAME},
};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::MarkupCollector;
use crate::{
    error::{BuildError, Result},
    host::{HostService, SharedMetadata},
    processor::{DocumentProcessor, OutputArtifact, ProcessingPriority, SaveResult, article_document},
    step::{BuildStep, BuildStepList},
};

/// Loads `.md` files as conceptual articles.
#[derive(Debug)]
pub struct ConceptualProcessor {
    steps: BuildStepList,
}

impl Default for ConceptualProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConceptualProcessor {
    pub fn new() -> Self {
        Self {
            steps: BuildStepList::new()
                .with(RenderConceptual)
                .with(ExtractTitle),
        }
    }
}

impl DocumentProcessor for ConceptualProcessor {
    fn name(&self) -> &'static str {
        "ConceptualProcessor"
    }

    fn build_steps(&self) -> &BuildStepList {
        &self.steps
    }

    fn can_process(&self, file: &SourceFile) -> ProcessingPriority {
        match file.extension().as_deref() {
            Some("md" | "markdown") => ProcessingPriority::Normal,
            _ => ProcessingPriority::NotSupported,
        }
    }

    fn load(&self, file: &SourceFile, metadata: &SharedMetadata) -> Result<Option<ContentUnit>> {
        let raw = file.read_to_string()?;
        let (header, _) = parse_metadata(&raw, &file.path)?;
        let text = |key: &str| header.get(key).and_then(Value::as_str).map(str::to_string);

        let page = ConceptualPage {
            uid: text("uid"),
            title: text("title"),
            raw,
            html: String::new(),
            headings: Vec::new(),
        };
        let uid = page.uid.clone();

        let mut unit = ContentUnit::new(
            file.clone(),
            DocumentType::Article,
            ContentPayload::Article(ArticleContent::Conceptual(page)),
        );
        unit.metadata = metadata.as_ref().clone();
        unit.output_path = Some(file.key_with_extension("json"));
        if let Some(uid) = uid {
            unit.add_uid(uid);
        }
        Ok(Some(unit))
    }

    fn save(&self, unit: &ContentUnit) -> Result<SaveResult> {
        let ContentPayload::Article(content @ ArticleContent::Conceptual(page)) = &unit.payload
        else {
            return Err(BuildError::UnexpectedPayload {
                processor: self.name(),
                key: unit.key().to_string(),
            });
        };

        let xref_specs = page
            .uid
            .iter()
            .map(|uid| {
                XrefSpec::new(uid)
                    .with(NAME, page.title.clone())
                    .with(HREF, unit.output_path.clone())
            })
            .collect();

        let artifact = match &unit.output_path {
            Some(path) => Some(OutputArtifact::Document {
                path: path.clone(),
                document: article_document(unit, content)?,
            }),
            None => None,
        };

        Ok(SaveResult {
            artifact,
            xref_specs,
            xref_dependencies: unit.xref_dependencies.clone(),
        })
    }
}

/// Renders the article body and merges its YAML header into the unit metadata.
struct RenderConceptual;

impl BuildStep for RenderConceptual {
    fn name(&self) -> &'static str {
        "RenderConceptual"
    }

    fn build_order(&self) -> i32 {
        10
    }

    fn build(&self, unit: &mut ContentUnit, host: &HostService) -> Result<()> {
        let mut collector = MarkupCollector::new(host, unit);
        let ContentPayload::Article(ArticleContent::Conceptual(page)) = &mut unit.payload else {
            return Ok(());
        };

        let result = collector.render(&page.raw, false)?;
        page.html = result.html;
        page.headings = result.headings;

        if let Some(header) = &result.yaml_header {
            unit.merge_metadata(header);
        }
        collector.finish(unit);
        Ok(())
    }
}

/// Sets the title from the header, falling back to the first `<h1>`.
struct ExtractTitle;

fn first_heading(html: &str) -> Option<String> {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let heading = HEADING.get_or_init(|| Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>").expect("Invalid regex"));
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));

    let inner = heading.captures(html)?.get(1)?.as_str();
    let text = tag.replace_all(inner, "").trim().to_string();
    (!text.is_empty()).then_some(text)
}

impl BuildStep for ExtractTitle {
    fn name(&self) -> &'static str {
        "ExtractTitle"
    }

    fn build_order(&self) -> i32 {
        20
    }

    fn build(&self, unit: &mut ContentUnit, _host: &HostService) -> Result<()> {
        let ContentPayload::Article(ArticleContent::Conceptual(page)) = &mut unit.payload else {
            return Ok(());
        };

        if page.title.is_none() {
            page.title = first_heading(&page.html);
        }
        if let Some(title) = page.title.clone() {
            debug!(key = %unit.file.key, title = %title, "article title");
            unit.metadata
                .entry("title".to_string())
                .or_insert(Value::String(title));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use docweave_core::Metadata;

    use super::*;
    use crate::host::tests::test_host;

    fn load(content: &str) -> ContentUnit {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles/intro.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();

        let mut global = Metadata::new();
        global.insert("product".to_string(), Value::String("contoso".to_string()));

        ConceptualProcessor::new()
            .load(&SourceFile::new(dir.path(), &path), &Arc::new(global))
            .unwrap()
            .unwrap()
    }

    fn build(unit: &mut ContentUnit) {
        let host = test_host();
        for step in ConceptualProcessor::new().build_steps().iter() {
            step.build(unit, &host).unwrap();
        }
    }

    #[test]
    fn test_load_reads_uid_and_output_path() {
        let unit = load("---\nuid: intro\ntitle: Introduction\n---\n# Hello\n");

        assert_eq!(unit.uids, vec!["intro"]);
        assert_eq!(unit.output_path.as_deref(), Some("articles/intro.json"));
        assert_eq!(unit.metadata["product"], "contoso");
    }

    #[test]
    fn test_build_renders_and_merges_header() {
        let mut unit = load(
            "---\nuid: intro\nproduct: widgets\n---\n# Hello\n\nSee [setup](setup.md) and [spin](xref:Contoso.Widget.Spin*).\n",
        );
        build(&mut unit);

        let ContentPayload::Article(ArticleContent::Conceptual(page)) = &unit.payload else {
            panic!("expected conceptual payload");
        };
        assert!(page.html.contains("<h1 id=\"hello\">Hello</h1>"));
        assert!(!page.html.contains("uid: intro"));
        assert_eq!(page.title.as_deref(), Some("Hello"));
        assert_eq!(unit.metadata["product"], "widgets");
        assert_eq!(unit.metadata["title"], "Hello");
        assert!(unit.link_targets.contains("articles/setup.md"));
        assert_eq!(page.headings.len(), 1);
        assert_eq!(page.headings[0].id, "hello");
        assert!(unit.xref_dependencies.contains("Contoso.Widget.Spin*"));
    }

    #[test]
    fn test_header_title_wins_over_heading() {
        let mut unit = load("---\ntitle: Introduction\n---\n# Hello\n");
        build(&mut unit);

        assert_eq!(unit.metadata["title"], "Introduction");
    }

    #[test]
    fn test_save_emits_spec_for_uid() {
        let mut unit = load("---\nuid: intro\n---\n# Getting *started*\n\nNext: [setup](setup.md).\n");
        build(&mut unit);

        let saved = ConceptualProcessor::new().save(&unit).unwrap();
        assert_eq!(saved.xref_specs.len(), 1);
        assert_eq!(saved.xref_specs[0].name(), Some("Getting started"));
        assert_eq!(saved.xref_specs[0].href(), Some("articles/intro.json"));

        let Some(OutputArtifact::Document { path, document }) = saved.artifact else {
            panic!("expected a document");
        };
        assert_eq!(path, "articles/intro.json");
        assert_eq!(document["content"]["kind"], "conceptual");
        assert_eq!(document["source"], "articles/intro.md");
        assert_eq!(document["links"], serde_json::json!(["articles/setup.md"]));
        assert_eq!(
            document["content"]["headings"],
            serde_json::json!([{ "level": 1, "text": "Getting started", "id": "getting-started" }])
        );
    }

    #[test]
    fn test_article_without_uid_emits_no_spec() {
        let mut unit = load("Plain text.\n");
        build(&mut unit);

        let saved = ConceptualProcessor::new().save(&unit).unwrap();
        assert!(saved.xref_specs.is_empty());
        assert!(saved.artifact.is_some());
    }
}
