//! Content units and their payloads.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::{ApiPage, ConceptualPage, ElementFields, OverwriteFragment, RestApiPage},
};

/// Free-form metadata attached to units.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Role of a unit in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Rendered into an output document.
    Article,
    /// Patches fields of articles defined elsewhere.
    Overwrite,
    /// Copied to the output verbatim.
    Resource,
}

/// A file handed to the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path relative to the content root, with `/` separators.
    pub key: String,

    /// Absolute (or working-directory relative) path used for reading.
    pub path: PathBuf,
}

impl SourceFile {
    /// Create a source file rooted at `root`.
    pub fn new(root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let key = relative
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Self { key, path }
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Read the whole file.
    pub fn read_to_string(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path)?)
    }

    /// Read only the first line, trimmed. Empty for empty or unreadable files.
    pub fn first_line(&self) -> String {
        let Ok(file) = fs::File::open(&self.path) else {
            return String::new();
        };
        let mut line = String::new();
        match BufReader::new(file).read_line(&mut line) {
            Ok(_) => line.trim().to_string(),
            Err(_) => String::new(),
        }
    }

    /// Key with its extension replaced.
    pub fn key_with_extension(&self, extension: &str) -> String {
        match self.key.rfind('.') {
            Some(dot) if !self.key[dot..].contains('/') => {
                format!("{}.{extension}", &self.key[..dot])
            }
            _ => format!("{}.{extension}", self.key),
        }
    }
}

/// Payload of an article unit, tagged by content kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArticleContent {
    Conceptual(ConceptualPage),
    ApiPage(ApiPage),
    RestApi(RestApiPage),
}

/// Payload of an overwrite unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverwriteContent {
    pub fragments: Vec<OverwriteFragment>,
}

/// Payload of a resource unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceContent {
    /// Size in bytes at load time.
    pub size: u64,
}

/// Content carried by a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPayload {
    Article(ArticleContent),
    Overwrite(OverwriteContent),
    Resource(ResourceContent),
}

impl ContentPayload {
    /// Descriptive fields of the element with `uid`, if this payload documents it.
    pub fn find_element(&self, uid: &str) -> Option<ElementFields> {
        match self {
            Self::Article(ArticleContent::ApiPage(page)) => page.element_fields(uid),
            Self::Article(ArticleContent::RestApi(api)) => api.element_fields(uid),
            Self::Article(ArticleContent::Conceptual(page)) => {
                (page.uid.as_deref() == Some(uid)).then(|| {
                    let mut fields = ElementFields::new();
                    fields.insert("type".to_string(), "Conceptual".to_string());
                    fields
                })
            }
            Self::Overwrite(_) | Self::Resource(_) => None,
        }
    }

    pub fn as_api_page(&self) -> Option<&ApiPage> {
        match self {
            Self::Article(ArticleContent::ApiPage(page)) => Some(page),
            _ => None,
        }
    }

    pub fn as_api_page_mut(&mut self) -> Option<&mut ApiPage> {
        match self {
            Self::Article(ArticleContent::ApiPage(page)) => Some(page),
            _ => None,
        }
    }

    pub fn as_overwrite(&self) -> Option<&OverwriteContent> {
        match self {
            Self::Overwrite(content) => Some(content),
            _ => None,
        }
    }
}

/// One source file's in-memory representation, mutated by each build step.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    /// Where the unit came from.
    pub file: SourceFile,

    pub document_type: DocumentType,

    pub payload: ContentPayload,

    /// Uids defined by this unit, in declaration order.
    pub uids: Vec<String>,

    /// Output location relative to the output directory; `None` for units that are not written.
    pub output_path: Option<String>,

    /// Global metadata overlaid with file metadata.
    pub metadata: Metadata,

    /// Link targets found while rendering markup.
    pub link_targets: BTreeSet<String>,

    /// Uids referenced through `xref:` links while rendering markup.
    pub xref_dependencies: BTreeSet<String>,
}

impl ContentUnit {
    /// Create a unit with no uids, links or metadata.
    pub fn new(file: SourceFile, document_type: DocumentType, payload: ContentPayload) -> Self {
        Self {
            file,
            document_type,
            payload,
            uids: Vec::new(),
            output_path: None,
            metadata: Metadata::new(),
            link_targets: BTreeSet::new(),
            xref_dependencies: BTreeSet::new(),
        }
    }

    /// Origin path relative to the content root.
    pub fn key(&self) -> &str {
        &self.file.key
    }

    /// Whether this unit lists `uid` among the uids it defines.
    pub fn defines(&self, uid: &str) -> bool {
        self.uids.iter().any(|u| u == uid)
    }

    /// Add a uid once, keeping declaration order.
    pub fn add_uid(&mut self, uid: impl Into<String>) {
        let uid = uid.into();
        if !self.defines(&uid) {
            self.uids.push(uid);
        }
    }

    /// Overlay `metadata` onto the unit's metadata; existing keys are replaced.
    pub fn merge_metadata(&mut self, metadata: &Metadata) {
        for (key, value) in metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}
