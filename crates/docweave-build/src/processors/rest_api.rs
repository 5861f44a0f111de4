//! Swagger/OpenAPI documents.

use std::collections::HashSet;

use docweave_core::{
    ContentPayload, ContentUnit, CoreError, DocumentType, SourceFile, XrefSpec,
    content::ArticleContent,
    model::{RestApiPage, RestOperation},
    xref::{HREF, NAME},
};
use serde_json::Value;
use tracing::{debug, warn};

use super::MarkupCollector;
use crate::{
    error::{BuildError, Result},
    host::{HostService, SharedMetadata},
    processor::{DocumentProcessor, OutputArtifact, ProcessingPriority, SaveResult, article_document},
    step::{BuildStep, BuildStepList},
};

/// Explicit uid for an API document, at the top level or inside `info`.
pub const UID_EXTENSION: &str = "x-docweave-uid";

const METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch"];

#[derive(Debug)]
pub struct RestApiProcessor {
    steps: BuildStepList,
}

impl Default for RestApiProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RestApiProcessor {
    pub fn new() -> Self {
        Self {
            steps: BuildStepList::new()
                .with(BuildRestOperations)
                .with(RenderRestDescriptions),
        }
    }
}

fn read_document(file: &SourceFile) -> Result<Value> {
    let content = file.read_to_string()?;
    Ok(serde_json::from_str(&content).map_err(|e| CoreError::parse(&file.path, e.to_string()))?)
}

fn is_api_document(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|root| root.contains_key("swagger") || root.contains_key("openapi"))
}

/// Lowercase, with runs of other characters collapsed to `-`.
fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            normalized.extend(c.to_lowercase());
        } else if !normalized.ends_with('-') {
            normalized.push('-');
        }
    }
    normalized.trim_matches('-').to_string()
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

impl DocumentProcessor for RestApiProcessor {
    fn name(&self) -> &'static str {
        "RestApiProcessor"
    }

    fn build_steps(&self) -> &BuildStepList {
        &self.steps
    }

    fn can_process(&self, file: &SourceFile) -> ProcessingPriority {
        if file.extension().as_deref() != Some("json") {
            return ProcessingPriority::NotSupported;
        }
        match read_document(file) {
            Ok(document) if is_api_document(&document) => ProcessingPriority::High,
            _ => ProcessingPriority::NotSupported,
        }
    }

    fn load(&self, file: &SourceFile, metadata: &SharedMetadata) -> Result<Option<ContentUnit>> {
        let raw = read_document(file)?;
        let info = raw.get("info").cloned().unwrap_or(Value::Null);

        let name = text(&info, "title").unwrap_or_else(|| file.file_name().to_string());
        let uid = text(&raw, UID_EXTENSION)
            .or_else(|| text(&info, UID_EXTENSION))
            .unwrap_or_else(|| normalize(&name));
        if uid.is_empty() {
            return Err(BuildError::load(&file.path, "cannot derive an API uid"));
        }

        let page = RestApiPage {
            uid: uid.clone(),
            name,
            summary: text(&info, "description"),
            host: text(&raw, "host"),
            base_path: text(&raw, "basePath"),
            operations: Vec::new(),
            raw,
        };

        let mut unit = ContentUnit::new(
            file.clone(),
            DocumentType::Article,
            ContentPayload::Article(ArticleContent::RestApi(page)),
        );
        unit.metadata = metadata.as_ref().clone();
        unit.output_path = Some(file.key_with_extension("json"));
        unit.add_uid(uid);
        Ok(Some(unit))
    }

    fn save(&self, unit: &ContentUnit) -> Result<SaveResult> {
        let ContentPayload::Article(content @ ArticleContent::RestApi(page)) = &unit.payload else {
            return Err(BuildError::UnexpectedPayload {
                processor: self.name(),
                key: unit.key().to_string(),
            });
        };

        let href = |anchor: Option<&str>| {
            unit.output_path.as_ref().map(|path| match anchor {
                Some(anchor) => format!("{path}#{}", normalize(anchor)),
                None => path.clone(),
            })
        };

        let mut xref_specs = vec![
            XrefSpec::new(&page.uid)
                .with(NAME, Some(page.name.clone()))
                .with(HREF, href(None)),
        ];
        xref_specs.extend(page.operations.iter().map(|operation| {
            XrefSpec::new(&operation.uid)
                .with(NAME, Some(operation.operation_id.clone()))
                .with(HREF, href(Some(operation.operation_id.as_str())))
        }));

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

/// Expands `paths` into operations before the uid index is built.
struct BuildRestOperations;

fn operations(page: &RestApiPage, key: &str) -> Vec<RestOperation> {
    let Some(paths) = page.raw.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut operations = Vec::new();
    for (path, item) in paths {
        for method in METHODS {
            let Some(operation) = item.get(*method) else {
                continue;
            };
            let operation_id = text(operation, "operationId")
                .unwrap_or_else(|| format!("{method}-{}", normalize(path)));
            if !seen.insert(operation_id.clone()) {
                warn!(key, operation_id = %operation_id, "duplicate operationId, skipping");
                continue;
            }

            let tags = operation
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();

            operations.push(RestOperation {
                uid: format!("{}/{operation_id}", page.uid),
                operation_id,
                method: method.to_string(),
                path: path.clone(),
                summary: text(operation, "summary"),
                description: text(operation, "description"),
                tags,
            });
        }
    }
    operations
}

impl BuildStep for BuildRestOperations {
    fn name(&self) -> &'static str {
        "BuildRestOperations"
    }

    fn build_order(&self) -> i32 {
        10
    }

    fn prebuild(&self, mut units: Vec<ContentUnit>, _host: &HostService) -> Result<Vec<ContentUnit>> {
        for unit in &mut units {
            let key = unit.key().to_string();
            let ContentPayload::Article(ArticleContent::RestApi(page)) = &mut unit.payload else {
                continue;
            };

            page.operations = operations(page, &key);
            let uids: Vec<String> = page.operations.iter().map(|op| op.uid.clone()).collect();
            debug!(key = %key, operations = uids.len(), "built REST operations");
            for uid in uids {
                unit.add_uid(uid);
            }
        }
        Ok(units)
    }
}

/// Renders the API and operation descriptions.
struct RenderRestDescriptions;

impl BuildStep for RenderRestDescriptions {
    fn name(&self) -> &'static str {
        "RenderRestDescriptions"
    }

    fn build_order(&self) -> i32 {
        20
    }

    fn build(&self, unit: &mut ContentUnit, host: &HostService) -> Result<()> {
        let mut collector = MarkupCollector::new(host, unit);
        let ContentPayload::Article(ArticleContent::RestApi(page)) = &mut unit.payload else {
            return Ok(());
        };

        collector.render_field(&mut page.summary, false)?;
        for operation in &mut page.operations {
            collector.render_field(&mut operation.description, false)?;
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

    const PETSTORE: &str = r#"{
  "swagger": "2.0",
  "info": {
    "title": "Swagger Petstore",
    "description": "A sample API. See [pets](xref:Contoso.Pet)."
  },
  "host": "petstore.example.com",
  "basePath": "/v1",
  "paths": {
    "/pets": {
      "get": {
        "operationId": "listPets",
        "summary": "List all pets",
        "tags": ["pets"]
      },
      "post": {
        "operationId": "createPets",
        "description": "Creates a *pet*."
      }
    },
    "/pets/{petId}": {
      "get": { "summary": "Info for a specific pet" }
    }
  }
}"#;

    fn source(name: &str, content: &str) -> (tempfile::TempDir, SourceFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        let file = SourceFile::new(dir.path(), path);
        (dir, file)
    }

    fn built(content: &str) -> ContentUnit {
        let (_dir, file) = source("petstore.json", content);
        let processor = RestApiProcessor::new();
        let unit = processor
            .load(&file, &Arc::new(Metadata::new()))
            .unwrap()
            .unwrap();
        let host = test_host();
        let mut units = BuildRestOperations.prebuild(vec![unit], &host).unwrap();
        let mut unit = units.remove(0);
        RenderRestDescriptions.build(&mut unit, &host).unwrap();
        unit
    }

    fn page(unit: &ContentUnit) -> &RestApiPage {
        match &unit.payload {
            ContentPayload::Article(ArticleContent::RestApi(page)) => page,
            _ => panic!("expected a REST API payload"),
        }
    }

    #[test]
    fn test_can_process_requires_swagger_key() {
        let processor = RestApiProcessor::new();
        let (_a, api) = source("api.json", PETSTORE);
        let (_b, data) = source("data.json", r#"{"items": []}"#);
        let (_c, broken) = source("broken.json", "{");

        assert_eq!(processor.can_process(&api), ProcessingPriority::High);
        assert_eq!(processor.can_process(&data), ProcessingPriority::NotSupported);
        assert_eq!(processor.can_process(&broken), ProcessingPriority::NotSupported);
    }

    #[test]
    fn test_operations_and_uids() {
        let unit = built(PETSTORE);
        let page = page(&unit);

        assert_eq!(page.uid, "swagger-petstore");
        assert_eq!(page.host.as_deref(), Some("petstore.example.com"));
        assert_eq!(page.base_path.as_deref(), Some("/v1"));

        let uids: Vec<_> = page.operations.iter().map(|op| op.uid.as_str()).collect();
        assert_eq!(
            uids,
            vec![
                "swagger-petstore/listPets",
                "swagger-petstore/createPets",
                "swagger-petstore/get-pets-petid",
            ]
        );
        assert_eq!(page.operations[0].tags, vec!["pets"]);
        assert!(unit.defines("swagger-petstore/createPets"));
        assert!(unit.defines("swagger-petstore"));
    }

    #[test]
    fn test_explicit_uid() {
        let content = PETSTORE.replace(r#""swagger": "2.0","#, r#""swagger": "2.0", "x-docweave-uid": "petstore","#);
        let unit = built(&content);
        assert_eq!(page(&unit).uid, "petstore");
        assert_eq!(page(&unit).operations[0].uid, "petstore/listPets");
    }

    #[test]
    fn test_descriptions_are_rendered() {
        let unit = built(PETSTORE);
        let page = page(&unit);

        assert!(page.summary.as_deref().unwrap().contains("<a href=\"xref:Contoso.Pet\">pets</a>"));
        assert_eq!(
            page.operations[1].description.as_deref().map(str::trim),
            Some("<p>Creates a <em>pet</em>.</p>")
        );
        assert!(unit.xref_dependencies.contains("Contoso.Pet"));
    }

    #[test]
    fn test_save_emits_api_and_operation_specs() {
        let unit = built(PETSTORE);
        let saved = RestApiProcessor::new().save(&unit).unwrap();

        assert_eq!(saved.xref_specs.len(), 4);
        assert_eq!(saved.xref_specs[0].name(), Some("Swagger Petstore"));
        assert_eq!(saved.xref_specs[0].href(), Some("petstore.json"));
        assert_eq!(saved.xref_specs[1].href(), Some("petstore.json#listpets"));

        let Some(OutputArtifact::Document { document, .. }) = saved.artifact else {
            panic!("expected a document");
        };
        assert_eq!(document["content"]["kind"], "restApi");
        assert_eq!(document["content"]["operations"][0]["method"], "get");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Swagger Petstore"), "swagger-petstore");
        assert_eq!(normalize("/pets/{petId}"), "pets-petid");
        assert_eq!(normalize("--"), "");
    }
}
