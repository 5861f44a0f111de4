//! Build configuration management.

use std::{num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    content::Metadata,
    error::{CoreError, Result},
    moniker::MonikerDefinition,
};

/// Main configuration structure for Docweave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Moniker definitions, one entry per (moniker, product, order) triple.
    #[serde(default)]
    pub monikers: Vec<MonikerDefinition>,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,

    /// Published root of the output directory, written to `xrefmap.yml` so
    /// consumers can resolve the relative hrefs (e.g., "https://docs.example.com").
    pub base_url: String,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory scanned for source files.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    /// Output directory for the generated documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Upper bound on concurrently running work items.
    #[serde(default)]
    pub max_parallelism: Option<usize>,

    /// When set, API elements that do not apply to this moniker are dropped.
    #[serde(default)]
    pub target_moniker: Option<String>,

    /// Fail the owning step on moniker range errors instead of degrading.
    #[serde(default)]
    pub strict_monikers: bool,

    /// Metadata shared by every loaded unit.
    #[serde(default)]
    pub global_metadata: Metadata,
}

fn default_content_dir() -> String {
    "docs".to_string()
}

fn default_output_dir() -> String {
    "_site".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            max_parallelism: None,
            target_moniker: None,
            strict_monikers: false,
            global_metadata: Metadata::new(),
        }
    }
}

impl BuildConfig {
    /// Effective concurrency cap: the configured bound, or twice the available hardware threads.
    pub fn parallelism(&self) -> usize {
        self.max_parallelism.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
                * 2
        })
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `DOCWEAVE__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("DOCWEAVE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.site.title.is_empty() {
            return Err(CoreError::config("site.title cannot be empty"));
        }

        if self.site.base_url.is_empty() {
            return Err(CoreError::config("site.base_url cannot be empty"));
        }

        if self.build.max_parallelism == Some(0) {
            return Err(CoreError::config(
                "build.max_parallelism must be greater than zero",
            ));
        }

        if let Some(target) = &self.build.target_moniker
            && !self.monikers.iter().any(|m| &m.name == target)
        {
            return Err(CoreError::config(format!(
                "build.target_moniker '{target}' is not a defined moniker"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn create_test_config() -> String {
        r#"
[site]
title = "Contoso API"
base_url = "https://docs.contoso.com"

[build]
content_dir = "src"
output_dir = "dist"
max_parallelism = 3
target_moniker = "v2"
strict_monikers = true

[build.global_metadata]
product = "contoso"

[[monikers]]
name = "v1"
product = "contoso"
order = 1

[[monikers]]
name = "v2"
product = "contoso"
order = 2
"#
        .to_string()
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("docweave.toml");
        let mut file = std::fs::File::create(&config_path).expect("create file");
        file.write_all(create_test_config().as_bytes())
            .expect("write");

        let config = Config::load(&config_path).expect("load config");

        assert_eq!(config.site.title, "Contoso API");
        assert_eq!(config.build.content_dir, "src");
        assert_eq!(config.build.output_dir, "dist");
        assert_eq!(config.build.parallelism(), 3);
        assert_eq!(config.build.target_moniker.as_deref(), Some("v2"));
        assert!(config.build.strict_monikers);
        assert_eq!(
            config.build.global_metadata.get("product"),
            Some(&serde_json::json!("contoso"))
        );
        assert_eq!(config.monikers.len(), 2);
        assert_eq!(config.monikers[1].name, "v2");
        assert_eq!(config.monikers[1].order, 2);
    }

    #[test]
    fn test_config_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("docweave.toml");
        let minimal_config = r#"
[site]
title = "Minimal"
base_url = "https://example.com"
"#;
        std::fs::write(&config_path, minimal_config).expect("write");

        let config = Config::load(&config_path).expect("load config");

        assert_eq!(config.build.content_dir, "docs");
        assert_eq!(config.build.output_dir, "_site");
        assert!(config.build.max_parallelism.is_none());
        assert!(config.build.parallelism() >= 2);
        assert!(!config.build.strict_monikers);
        assert!(config.monikers.is_empty());
    }

    #[test]
    fn test_config_validation_zero_parallelism() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("docweave.toml");
        let config_content = r#"
[site]
title = "Test"
base_url = "https://example.com"

[build]
max_parallelism = 0
"#;
        std::fs::write(&config_path, config_content).expect("write");

        let result = Config::load(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_parallelism must be greater than zero")
        );
    }

    #[test]
    fn test_config_validation_unknown_target_moniker() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("docweave.toml");
        let config_content = r#"
[site]
title = "Test"
base_url = "https://example.com"

[build]
target_moniker = "v9"
"#;
        std::fs::write(&config_path, config_content).expect("write");

        let err = Config::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("'v9' is not a defined moniker"));
    }

    #[test]
    fn test_config_not_found() {
        let result = Config::load(Path::new("/nonexistent/docweave.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }
}
