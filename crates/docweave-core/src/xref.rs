//! Cross-reference specs.
//!
//! An [`XrefSpec`] is the resolvable card other documents use to link to a uid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const NAME: &str = "name";
pub const FULL_NAME: &str = "fullName";
pub const NAME_WITH_TYPE: &str = "nameWithType";
pub const HREF: &str = "href";
pub const COMMENT_ID: &str = "commentId";

/// Cross-reference card for one uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrefSpec {
    pub uid: String,

    /// Named attributes; locale-specific variants use a `.lang` suffix (`name.vb`).
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_external: bool,
}

impl XrefSpec {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter; `None` and empty values are skipped.
    #[must_use]
    pub fn with(mut self, key: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Set a property, replacing any previous value. Empty values are ignored.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.properties.insert(key.to_string(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME)
    }

    pub fn href(&self) -> Option<&str> {
        self.get(HREF)
    }
}

/// Serialized form of the resolved cross-reference map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrefMap {
    pub sorted: bool,

    /// Prefix for every relative `href`; always ends with `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub references: Vec<XrefSpec>,
}

impl XrefMap {
    /// Build a map sorted by uid.
    pub fn new(mut references: Vec<XrefSpec>) -> Self {
        references.sort_by(|a, b| a.uid.cmp(&b.uid));
        Self {
            sorted: true,
            base_url: None,
            references,
        }
    }

    /// Set the published root; blank values clear it.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim().trim_end_matches('/');
        self.base_url = (!base_url.is_empty()).then(|| format!("{base_url}/"));
        self
    }

    /// Binary search by uid.
    pub fn find(&self, uid: &str) -> Option<&XrefSpec> {
        self.references
            .binary_search_by(|spec| spec.uid.as_str().cmp(uid))
            .ok()
            .map(|index| &self.references[index])
    }
}
