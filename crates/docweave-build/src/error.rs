//! Error types for the build pipeline.

use std::path::PathBuf;

use docweave_core::{CoreError, MonikerError};
use docweave_markup::MarkupError;
use thiserror::Error;

use crate::scheduler::WorkError;

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Markup rendering error.
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),

    /// Moniker range error escalated by a step.
    #[error("moniker error: {0}")]
    Moniker(#[from] MonikerError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A source file could not be loaded.
    #[error("failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// A build step failed on a unit.
    #[error("step '{step}' failed on {key}: {message}")]
    Step {
        step: String,
        key: String,
        message: String,
    },

    /// A processor was handed a unit it did not load.
    #[error("{processor} cannot handle {key}: unexpected payload")]
    UnexpectedPayload { processor: &'static str, key: String },

    /// A parallel phase failed.
    #[error("scheduler error: {0}")]
    Scheduler(Box<WorkError<BuildError>>),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

impl BuildError {
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attach the failing step and unit to an error.
    pub fn in_step(self, step: &str, key: &str) -> Self {
        match self {
            Self::Step { .. } => self,
            other => Self::Step {
                step: step.to_string(),
                key: key.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<WorkError<BuildError>> for BuildError {
    fn from(error: WorkError<BuildError>) -> Self {
        Self::Scheduler(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_context_is_added_once() {
        let err = BuildError::Config("bad".to_string())
            .in_step("ApplyMonikers", "api/a.yml")
            .in_step("Outer", "other.yml");

        assert_eq!(
            err.to_string(),
            "step 'ApplyMonikers' failed on api/a.yml: config error: bad"
        );
    }

    #[test]
    fn test_scheduler_error_display() {
        let err: BuildError = WorkError::Worker(BuildError::load("a.yml", "broken")).into();
        assert_eq!(
            err.to_string(),
            "scheduler error: failed to load a.yml: broken"
        );

        let err: BuildError = WorkError::<BuildError>::Panicked("boom".to_string()).into();
        assert_eq!(err.to_string(), "scheduler error: worker panicked: boom");
    }
}
