//! Writes saved artifacts and the cross-reference map to disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use docweave_core::xref::XrefMap;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    error::{BuildError, Result},
    processor::OutputArtifact,
};

/// File name of the resolved cross-reference map.
pub const XREF_MAP_FILE: &str = "xrefmap.yml";

/// Output directory writer.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Remove previous output and recreate the directory.
    pub fn prepare(&self) -> Result<()> {
        if self.output_dir.exists() {
            debug!(dir = %self.output_dir.display(), "cleaning output directory");
            fs::remove_dir_all(&self.output_dir)?;
        }
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Write every artifact; returns how many were written.
    pub fn write_all(&self, artifacts: &[OutputArtifact]) -> Result<usize> {
        let written = artifacts
            .par_iter()
            .map(|artifact| self.write(artifact))
            .collect::<Result<Vec<_>>>()?;
        Ok(written.len())
    }

    /// Write one artifact below the output directory.
    pub fn write(&self, artifact: &OutputArtifact) -> Result<PathBuf> {
        let target = self.target(artifact.path())?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        match artifact {
            OutputArtifact::Document { document, .. } => {
                fs::write(&target, serde_json::to_string_pretty(document)?)?;
            }
            OutputArtifact::Resource { source, .. } => {
                fs::copy(source, &target)?;
            }
        }

        debug!(path = %target.display(), "wrote artifact");
        Ok(target)
    }

    /// Write the resolved map as YAML.
    pub fn write_xref_map(&self, map: &XrefMap) -> Result<PathBuf> {
        let target = self.output_dir.join(XREF_MAP_FILE);
        fs::write(&target, serde_yaml::to_string(map)?)?;
        info!(path = %target.display(), references = map.references.len(), "wrote xref map");
        Ok(target)
    }

    fn target(&self, relative: &str) -> Result<PathBuf> {
        let escapes = relative
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if escapes {
            return Err(BuildError::Config(format!(
                "invalid output path '{relative}'"
            )));
        }
        Ok(self.output_dir.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use docweave_core::XrefSpec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_prepare_cleans_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("_site");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.json"), "{}").unwrap();

        let writer = OutputWriter::new(&out);
        writer.prepare().unwrap();

        assert!(out.exists());
        assert!(!out.join("stale.json").exists());
    }

    #[test]
    fn test_write_document_and_resource() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("logo.png");
        fs::write(&source, b"\x89PNG").unwrap();

        let writer = OutputWriter::new(dir.path().join("out"));
        writer.prepare().unwrap();
        let written = writer
            .write_all(&[
                OutputArtifact::Document {
                    path: "api/Contoso.Widget.json".to_string(),
                    document: json!({ "uid": "Contoso.Widget" }),
                },
                OutputArtifact::Resource {
                    path: "images/logo.png".to_string(),
                    source,
                },
            ])
            .unwrap();

        assert_eq!(written, 2);
        let doc = fs::read_to_string(dir.path().join("out/api/Contoso.Widget.json")).unwrap();
        assert!(doc.contains("\"uid\": \"Contoso.Widget\""));
        assert_eq!(
            fs::read(dir.path().join("out/images/logo.png")).unwrap(),
            b"\x89PNG"
        );
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let artifact = OutputArtifact::Document {
            path: "../outside.json".to_string(),
            document: json!({}),
        };

        assert!(matches!(writer.write(&artifact), Err(BuildError::Config(_))));
    }

    #[test]
    fn test_write_xref_map() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let map = XrefMap::new(vec![XrefSpec::new("B"), XrefSpec::new("A")]);

        let path = writer.write_xref_map(&map).unwrap();
        let yaml = fs::read_to_string(path).unwrap();

        assert!(yaml.contains("sorted: true"));
        assert!(yaml.find("uid: A").unwrap() < yaml.find("uid: B").unwrap());
    }
}
