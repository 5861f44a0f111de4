//! Docweave Build Library
//!
//! Document processors and the build pipeline for Docweave.
//!
//! # Modules
//!
//! - [`build`] - Build orchestration
//! - [`scheduler`] - Deduplicating work queue over a bounded thread pool
//! - [`step`] - Build steps and ordered step lists
//! - [`processor`] - Document processor trait and processor selection
//! - [`processors`] - Built-in processors
//! - [`pipeline`] - Prebuild, build and postbuild runners
//! - [`host`] - Services shared by every step, including uid lookup
//! - [`resolver`] - Cross-reference pooling, collapsing and filling
//! - [`writer`] - Output documents and the xref map

pub mod build;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod processor;
pub mod processors;
pub mod resolver;
pub mod scheduler;
pub mod step;
pub mod writer;

pub use build::{BuildStats, Builder};
pub use error::{BuildError, Result};
pub use host::{HostService, SharedUnit};
pub use processor::{DocumentProcessor, OutputArtifact, ProcessingPriority, ProcessorRegistry, SaveResult};
pub use scheduler::{WorkError, WorkQueue};
pub use step::{BuildStep, BuildStepList};
