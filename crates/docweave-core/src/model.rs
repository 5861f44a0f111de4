//! Page models carried inside content units.
//!
//! Field names follow the camelCase keys of the YAML/JSON sources so the
//! models deserialize directly from disk and serialize back into output
//! documents unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Header line identifying a managed reference YAML page.
pub const MANAGED_REFERENCE_MIME: &str = "### YamlMime:ManagedReference";

/// Descriptive fields of one documented element, keyed by field name.
pub type ElementFields = BTreeMap<String, String>;

/// A page of API reference items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPage {
    /// Documented items; the first one is the page's primary element.
    #[serde(default)]
    pub items: Vec<ApiItem>,

    /// Referenced elements (types, members, overload groups).
    #[serde(default)]
    pub references: Vec<ApiReference>,

    /// Range applied to items without their own range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker_range: Option<String>,
}

/// One documented API element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiItem {
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_with_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// Element kind, e.g. `Class` or `Method`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assemblies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub example: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<ApiSyntax>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platform: Vec<String>,

    /// Uid of the overload group this member belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overload: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker_range: Option<String>,

    /// Monikers the item applies to, computed from the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monikers: Option<BTreeSet<String>>,

    /// Conceptual content merged in from overwrite documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conceptual: Option<String>,

    /// Extractor bookkeeping, never shown to readers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<serde_json::Value>,

    /// Source location of the declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Declaration syntax of an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSyntax {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ApiParameter>,

    #[serde(default, rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_value: Option<ApiParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Entry of a page's reference list.
///
/// Extra keys such as `name.vb` carry per-language display names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReference {
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_with_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default)]
    pub is_external: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ApiItem {
    /// Descriptive fields, including internal ones; callers filter as needed.
    pub fn descriptive_fields(&self) -> ElementFields {
        let mut fields = ElementFields::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                fields.insert(key.to_string(), value);
            }
        };

        put("summary", self.summary.clone());
        put("remarks", self.remarks.clone());
        put("type", self.kind.clone());
        put(
            "syntax",
            self.syntax.as_ref().and_then(|s| s.content.clone()),
        );
        put("platform", join(&self.platform));
        put("namespace", self.namespace.clone());
        put("assemblies", join(&self.assemblies));
        put("example", join(&self.example));
        put("conceptual", self.conceptual.clone());
        put(
            "documentation",
            self.documentation.as_ref().map(|v| v.to_string()),
        );
        put("source", self.source.as_ref().map(|v| v.to_string()));
        put(
            "monikers",
            self.monikers
                .as_ref()
                .and_then(|m| join(&m.iter().cloned().collect::<Vec<_>>())),
        );

        for (key, value) in &self.extra {
            if let Some(text) = value.as_str() {
                put(key, Some(text.to_string()));
            }
        }

        fields
    }
}

/// Member fields an overload group borrows from its first member.
const OVERLOAD_INHERITED: &[&str] = &["syntax", "platform", "namespace", "assemblies", "monikers"];

impl ApiPage {
    /// Descriptive fields for the item, overload group or reference named `uid`.
    ///
    /// Overload groups have no item of their own; they are typed `Overload`
    /// and inherit declaration details from the first member.
    pub fn element_fields(&self, uid: &str) -> Option<ElementFields> {
        if let Some(item) = self.items.iter().find(|item| item.uid == uid) {
            return Some(item.descriptive_fields());
        }

        let reference = self.references.iter().find(|reference| reference.uid == uid);
        let member = self
            .items
            .iter()
            .find(|item| item.overload.as_deref() == Some(uid));

        let Some(member) = member else {
            return reference.map(ApiReference::descriptive_fields);
        };

        let mut fields = reference
            .map(ApiReference::descriptive_fields)
            .unwrap_or_default();
        fields.insert("type".to_string(), "Overload".to_string());
        let inherited = member.descriptive_fields();
        for key in OVERLOAD_INHERITED {
            if let Some(value) = inherited.get(*key) {
                fields.entry((*key).to_string()).or_insert_with(|| value.clone());
            }
        }
        Some(fields)
    }
}

impl ApiReference {
    /// Descriptive fields carried by a reference entry.
    pub fn descriptive_fields(&self) -> ElementFields {
        let mut fields = ElementFields::new();
        if let Some(summary) = self.summary.as_ref().filter(|s| !s.is_empty()) {
            fields.insert("summary".to_string(), summary.clone());
        }
        fields
    }
}

fn join(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// A conceptual markdown article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptualPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Markdown source, including its YAML header.
    #[serde(skip)]
    pub raw: String,

    /// Rendered body.
    #[serde(default)]
    pub html: String,

    /// Outline of the rendered body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<Heading>,
}

/// Heading of a rendered article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level (1-6).
    pub level: u8,

    pub text: String,

    /// Anchor ID for linking.
    pub id: String,
}

/// A REST API description built from a Swagger/OpenAPI document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiPage {
    pub uid: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    #[serde(default)]
    pub operations: Vec<RestOperation>,

    /// Source document the operations are read from.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// One HTTP operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOperation {
    pub uid: String,

    pub operation_id: String,

    pub method: String,

    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl RestApiPage {
    /// Fields of the API itself or of one of its operations.
    pub fn element_fields(&self, uid: &str) -> Option<ElementFields> {
        let mut fields = ElementFields::new();
        if self.uid == uid {
            fields.insert("type".to_string(), "RestApi".to_string());
            if let Some(summary) = &self.summary {
                fields.insert("summary".to_string(), summary.clone());
            }
            return Some(fields);
        }

        let operation = self.operations.iter().find(|op| op.uid == uid)?;
        fields.insert("type".to_string(), "RestOperation".to_string());
        fields.insert(
            "syntax".to_string(),
            format!("{} {}", operation.method.to_uppercase(), operation.path),
        );
        if let Some(summary) = operation.summary.as_ref().or(operation.description.as_ref()) {
            fields.insert("summary".to_string(), summary.clone());
        }
        Some(fields)
    }
}

/// One `uid`-addressed section of an overwrite document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverwriteFragment {
    pub uid: String,

    /// Header fields other than `uid`.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,

    /// Markdown body following the header.
    #[serde(default)]
    pub markdown: String,

    /// Rendered body, filled by the build.
    #[serde(default)]
    pub conceptual: Option<String>,
}
