//! Managed reference pages: YAML API documentation extracted from source code.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use docweave_core::{
    ContentPayload, ContentUnit, CoreError, DocumentType, SourceFile, XrefSpec,
    content::ArticleContent,
    merge::API_ITEM,
    model::{ApiItem, ApiPage, ApiReference, MANAGED_REFERENCE_MIME, OverwriteFragment},
    xref::{COMMENT_ID, FULL_NAME, HREF, NAME, NAME_WITH_TYPE},
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::MarkupCollector;
use crate::{
    error::{BuildError, Result},
    host::{HostService, SharedMetadata, SharedUnit},
    processor::{DocumentProcessor, OutputArtifact, ProcessingPriority, SaveResult, article_document},
    step::{BuildStep, BuildStepList},
};

/// Property prefixes copied onto specs with their language suffix (`name.vb`).
const LOCALIZED_PROPERTIES: &[&str] = &[NAME, FULL_NAME, NAME_WITH_TYPE];

#[derive(Debug)]
pub struct ManagedReferenceProcessor {
    steps: BuildStepList,
}

impl Default for ManagedReferenceProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedReferenceProcessor {
    pub fn new() -> Self {
        Self {
            steps: BuildStepList::new()
                .with(DeduplicatePages)
                .with(ApplyMonikers)
                .with(BuildOverloads)
                .with(ResolveItemHrefs)
                .with(RenderApiMarkup)
                .with(ApplyOverwriteDocuments),
        }
    }
}

/// Item uids followed by the overload groups they belong to.
fn defined_uids(page: &ApiPage) -> Vec<String> {
    let mut uids: Vec<String> = Vec::new();
    let items = page.items.iter().map(|item| &item.uid);
    let overloads = page.items.iter().filter_map(|item| item.overload.as_ref());
    for uid in items.chain(overloads) {
        if !uids.contains(uid) {
            uids.push(uid.clone());
        }
    }
    uids
}

/// Anchor of a non-primary item within its page.
fn anchor(item: &ApiItem) -> String {
    item.id.clone().unwrap_or_else(|| {
        item.uid
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    })
}

/// Member name without its parameter list: `Spin(Int32)` becomes `Spin`.
fn strip_parameters(name: &str) -> String {
    name.split('(').next().unwrap_or(name).trim().to_string()
}

fn localized(spec: &mut XrefSpec, extra: &BTreeMap<String, Value>) {
    for (key, value) in extra {
        let localized = LOCALIZED_PROPERTIES
            .iter()
            .any(|prefix| key.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('.')));
        if localized && let Some(text) = value.as_str() {
            spec.set(key, text);
        }
    }
}

fn item_spec(item: &ApiItem) -> XrefSpec {
    let mut spec = XrefSpec::new(&item.uid)
        .with(NAME, item.name.clone())
        .with(FULL_NAME, item.full_name.clone())
        .with(NAME_WITH_TYPE, item.name_with_type.clone())
        .with(COMMENT_ID, item.comment_id.clone())
        .with(HREF, item.href.clone());
    localized(&mut spec, &item.extra);
    spec
}

fn reference_spec(reference: &ApiReference) -> XrefSpec {
    let mut spec = XrefSpec::new(&reference.uid)
        .with(NAME, reference.name.clone())
        .with(FULL_NAME, reference.full_name.clone())
        .with(NAME_WITH_TYPE, reference.name_with_type.clone())
        .with(COMMENT_ID, reference.comment_id.clone())
        .with(HREF, reference.href.clone());
    localized(&mut spec, &reference.extra);
    spec
}

impl DocumentProcessor for ManagedReferenceProcessor {
    fn name(&self) -> &'static str {
        "ManagedReferenceProcessor"
    }

    fn build_steps(&self) -> &BuildStepList {
        &self.steps
    }

    fn can_process(&self, file: &SourceFile) -> ProcessingPriority {
        match file.extension().as_deref() {
            Some("yml" | "yaml") if file.first_line() == MANAGED_REFERENCE_MIME => {
                ProcessingPriority::High
            }
            _ => ProcessingPriority::NotSupported,
        }
    }

    fn load(&self, file: &SourceFile, metadata: &SharedMetadata) -> Result<Option<ContentUnit>> {
        let content = file.read_to_string()?;
        let page: ApiPage = serde_yaml::from_str(&content)
            .map_err(|e| CoreError::parse(&file.path, e.to_string()))?;

        if page.items.is_empty() {
            warn!(key = %file.key, "managed reference page has no items, skipping");
            return Ok(None);
        }

        let uids = defined_uids(&page);
        let mut unit = ContentUnit::new(
            file.clone(),
            DocumentType::Article,
            ContentPayload::Article(ArticleContent::ApiPage(page)),
        );
        unit.metadata = metadata.as_ref().clone();
        unit.output_path = Some(file.key_with_extension("json"));
        for uid in uids {
            unit.add_uid(uid);
        }
        Ok(Some(unit))
    }

    fn save(&self, unit: &ContentUnit) -> Result<SaveResult> {
        let ContentPayload::Article(content @ ArticleContent::ApiPage(page)) = &unit.payload else {
            return Err(BuildError::UnexpectedPayload {
                processor: self.name(),
                key: unit.key().to_string(),
            });
        };

        let mut xref_specs: Vec<XrefSpec> = page.items.iter().map(item_spec).collect();

        let item_uids: HashSet<&str> = page.items.iter().map(|item| item.uid.as_str()).collect();
        let overloads = page.references.iter().filter(|reference| {
            unit.defines(&reference.uid) && !item_uids.contains(reference.uid.as_str())
        });
        xref_specs.extend(overloads.map(reference_spec));

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

/// Keeps the first page for every primary uid.
struct DeduplicatePages;

impl BuildStep for DeduplicatePages {
    fn name(&self) -> &'static str {
        "DeduplicatePages"
    }

    fn build_order(&self) -> i32 {
        0
    }

    fn prebuild(&self, units: Vec<ContentUnit>, _host: &HostService) -> Result<Vec<ContentUnit>> {
        let mut seen = HashSet::new();
        Ok(units
            .into_iter()
            .filter(|unit| {
                let Some(primary) = unit.uids.first() else {
                    return true;
                };
                let first = seen.insert(primary.clone());
                if !first {
                    warn!(uid = %primary, key = %unit.key(), "duplicate page uid, keeping the first definition");
                }
                first
            })
            .collect())
    }
}

/// Evaluates moniker ranges and drops items outside the target moniker.
///
/// Runs in prebuild so the uid index only sees items that survive the
/// target moniker.
struct ApplyMonikers;

impl ApplyMonikers {
    fn apply(unit: &mut ContentUnit, host: &HostService) -> Result<()> {
        let registry = host.monikers();
        let config = host.config();
        let key = unit.key().to_string();
        let Some(page) = unit.payload.as_api_page_mut() else {
            return Ok(());
        };

        let page_range = page.moniker_range.clone();
        let mut evaluated: HashMap<String, BTreeSet<String>> = HashMap::new();

        for item in &mut page.items {
            let Some(range) = item.moniker_range.clone().or_else(|| page_range.clone()) else {
                continue;
            };

            let monikers = match evaluated.get(&range) {
                Some(monikers) => monikers.clone(),
                None => {
                    let monikers = match registry.evaluate(&range) {
                        Ok(monikers) => monikers,
                        Err(error) if config.strict_monikers => return Err(error.into()),
                        Err(error) => {
                            warn!(key = %key, uid = %item.uid, %error, "invalid moniker range, item applies to no monikers");
                            BTreeSet::new()
                        }
                    };
                    evaluated.insert(range, monikers.clone());
                    monikers
                }
            };
            item.monikers = Some(monikers);
        }

        let Some(target) = &config.target_moniker else {
            return Ok(());
        };

        let before = page.items.len();
        page.items.retain(|item| {
            item.monikers
                .as_ref()
                .is_none_or(|monikers| monikers.contains(target))
        });
        let dropped = before - page.items.len();

        if dropped > 0 {
            debug!(key = %key, target = %target, dropped, "dropped items outside target moniker");
            let uids = defined_uids(page);
            unit.uids = uids;
        }
        Ok(())
    }
}

impl BuildStep for ApplyMonikers {
    fn name(&self) -> &'static str {
        "ApplyMonikers"
    }

    fn build_order(&self) -> i32 {
        10
    }

    fn prebuild(&self, mut units: Vec<ContentUnit>, host: &HostService) -> Result<Vec<ContentUnit>> {
        for unit in &mut units {
            Self::apply(unit, host).map_err(|e| e.in_step(self.name(), unit.key()))?;
        }
        Ok(units)
    }
}

/// Adds a reference entry for every overload group.
struct BuildOverloads;

impl BuildStep for BuildOverloads {
    fn name(&self) -> &'static str {
        "BuildOverloads"
    }

    fn build_order(&self) -> i32 {
        20
    }

    fn build(&self, unit: &mut ContentUnit, _host: &HostService) -> Result<()> {
        let Some(page) = unit.payload.as_api_page_mut() else {
            return Ok(());
        };

        let mut created = Vec::new();
        for item in &page.items {
            let Some(overload) = &item.overload else {
                continue;
            };
            let strip = |name: &Option<String>| name.as_deref().map(strip_parameters);

            match page.references.iter_mut().find(|r| &r.uid == overload) {
                Some(existing) => {
                    if existing.name.is_none() {
                        existing.name = strip(&item.name);
                    }
                }
                None if !created.iter().any(|r: &ApiReference| &r.uid == overload) => {
                    created.push(ApiReference {
                        uid: overload.clone(),
                        parent: item.parent.clone(),
                        name: strip(&item.name),
                        name_with_type: strip(&item.name_with_type),
                        full_name: strip(&item.full_name),
                        ..Default::default()
                    });
                }
                None => {}
            }
        }

        if !created.is_empty() {
            debug!(key = %unit.file.key, overloads = created.len(), "added overload references");
            page.references.extend(created);
        }
        Ok(())
    }
}

/// Assigns item hrefs and links references to the pages defining them.
struct ResolveItemHrefs;

impl BuildStep for ResolveItemHrefs {
    fn name(&self) -> &'static str {
        "ResolveItemHrefs"
    }

    fn build_order(&self) -> i32 {
        30
    }

    fn build(&self, unit: &mut ContentUnit, host: &HostService) -> Result<()> {
        let Some(output) = unit.output_path.clone() else {
            return Ok(());
        };
        let Some(page) = unit.payload.as_api_page_mut() else {
            return Ok(());
        };

        let mut local: HashMap<String, String> = HashMap::new();
        for (index, item) in page.items.iter_mut().enumerate() {
            if item.href.is_none() {
                item.href = Some(if index == 0 {
                    output.clone()
                } else {
                    format!("{output}#{}", anchor(item))
                });
            }
            if let Some(href) = &item.href {
                local.insert(item.uid.clone(), href.clone());
                if let Some(overload) = &item.overload {
                    local.entry(overload.clone()).or_insert_with(|| href.clone());
                }
            }
        }

        for reference in &mut page.references {
            if reference.href.is_some() {
                continue;
            }
            if let Some(href) = local.get(&reference.uid) {
                reference.href = Some(href.clone());
                continue;
            }

            let defined_at = host.lookup_by_uid(&reference.uid).into_iter().find_map(|shared| {
                let other = shared.read();
                match other.document_type {
                    DocumentType::Article => other.output_path.clone(),
                    _ => None,
                }
            });
            match defined_at {
                Some(path) => reference.href = Some(path),
                None => reference.is_external = true,
            }
        }
        Ok(())
    }
}

/// Renders summaries, remarks and parameter descriptions.
struct RenderApiMarkup;

impl BuildStep for RenderApiMarkup {
    fn name(&self) -> &'static str {
        "RenderApiMarkup"
    }

    fn build_order(&self) -> i32 {
        40
    }

    fn build(&self, unit: &mut ContentUnit, host: &HostService) -> Result<()> {
        let mut collector = MarkupCollector::new(host, unit);
        let Some(page) = unit.payload.as_api_page_mut() else {
            return Ok(());
        };

        for item in &mut page.items {
            collector.render_field(&mut item.summary, false)?;
            collector.render_field(&mut item.remarks, false)?;
            if let Some(syntax) = &mut item.syntax {
                for parameter in &mut syntax.parameters {
                    collector.render_field(&mut parameter.description, true)?;
                }
                if let Some(return_value) = &mut syntax.return_value {
                    collector.render_field(&mut return_value.description, true)?;
                }
            }
        }

        collector.finish(unit);
        Ok(())
    }
}

/// Merges overwrite sections into the items they name.
struct ApplyOverwriteDocuments;

/// Overwrite sections for `uid`, in unit order.
fn overwrite_fragments(host: &HostService, uid: &str) -> Vec<OverwriteFragment> {
    let mut fragments = Vec::new();
    for shared in host.lookup_by_uid(uid) {
        let unit = shared.read();
        if let Some(content) = unit.payload.as_overwrite() {
            fragments.extend(content.fragments.iter().filter(|f| f.uid == uid).cloned());
        }
    }
    fragments
}

impl BuildStep for ApplyOverwriteDocuments {
    fn name(&self) -> &'static str {
        "ApplyOverwriteDocuments"
    }

    fn build_order(&self) -> i32 {
        50
    }

    fn postbuild(&self, units: &[SharedUnit], host: &HostService) -> Result<()> {
        for shared in units {
            let (key, mut page) = {
                let unit = shared.read();
                match unit.payload.as_api_page() {
                    Some(page) => (unit.key().to_string(), page.clone()),
                    None => continue,
                }
            };

            let mut applied = 0;
            for item in &mut page.items {
                for fragment in overwrite_fragments(host, &item.uid) {
                    let mut fields: Map<String, Value> = fragment.fields;
                    if let Some(conceptual) = fragment.conceptual {
                        fields.insert("conceptual".to_string(), Value::String(conceptual));
                    }
                    *item = API_ITEM.merge(&*item, &fields)?;
                    applied += 1;
                }
            }

            if applied > 0 {
                if let Some(target) = shared.write().payload.as_api_page_mut() {
                    *target = page;
                }
                debug!(key = %key, applied, "applied overwrite documents");
            }
        }
        Ok(())
    }
}
