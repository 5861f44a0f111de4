//! Docweave Markup Library
//!
//! The markup collaborator used by build steps: turns raw markdown into HTML and
//! reports the links, cross-reference dependencies and YAML header it found.

pub mod markdown;

use std::collections::BTreeSet;

use docweave_core::{CoreError, Metadata};
pub use docweave_core::model::Heading;
pub use markdown::MarkdownMarkup;
use thiserror::Error;

/// Markup errors.
#[derive(Debug, Error)]
pub enum MarkupError {
    /// The YAML header could not be parsed.
    #[error("header error: {0}")]
    Header(#[from] CoreError),
}

/// Result type for markup operations.
pub type Result<T> = std::result::Result<T, MarkupError>;

/// File the markup belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupContext {
    /// Key of the source file, relative to the content root.
    pub file_key: String,
}

impl MarkupContext {
    pub fn new(file_key: impl Into<String>) -> Self {
        Self {
            file_key: file_key.into(),
        }
    }

    /// Directory part of the file key, without trailing slash.
    pub fn directory(&self) -> &str {
        self.file_key
            .rfind('/')
            .map(|pos| &self.file_key[..pos])
            .unwrap_or("")
    }
}

/// Output of one markup call.
///
/// Everything discovered while parsing is returned here; nothing is recorded
/// outside the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupResult {
    pub html: String,

    /// Local file targets of links and images, resolved against the file's directory.
    pub link_targets: BTreeSet<String>,

    /// Uids referenced with `xref:` links.
    pub xref_dependencies: BTreeSet<String>,

    /// Leading YAML header, when present.
    pub yaml_header: Option<Metadata>,

    pub headings: Vec<Heading>,
}

/// Markup collaborator contract.
pub trait MarkupService: Send + Sync {
    /// Render `raw`. Inline markup is rendered without a wrapping paragraph.
    fn markup(&self, raw: &str, context: &MarkupContext, inline: bool) -> Result<MarkupResult>;
}
