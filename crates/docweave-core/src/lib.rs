//! Docweave Core Library
//!
//! Core types, configuration, and error handling for the Docweave documentation build engine.
//!
//! # Modules
//!
//! - [`config`] - `docweave.toml` loading and validation
//! - [`content`] - Content units, source files and the tagged content payload
//! - [`model`] - Page models for conceptual articles, API references and REST APIs
//! - [`xref`] - Cross-reference specs
//! - [`moniker`] - Moniker registry and range evaluation
//! - [`range`] - Moniker range expression parser
//! - [`merge`] - Field merge descriptors for overwrite documents
//! - [`frontmatter`] - YAML/TOML header splitting

pub mod config;
pub mod content;
pub mod error;
pub mod frontmatter;
pub mod merge;
pub mod model;
pub mod moniker;
pub mod range;
pub mod xref;

pub use config::Config;
pub use content::{ContentPayload, ContentUnit, DocumentType, Metadata, SourceFile};
pub use error::{CoreError, Result};
pub use moniker::{MonikerDefinition, MonikerError, MonikerRegistry};
pub use range::RangeExpr;
pub use xref::XrefSpec;
