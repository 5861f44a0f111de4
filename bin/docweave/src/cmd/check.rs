//! Check command - validate configuration, monikers and moniker ranges

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use docweave_core::{
    Config, MonikerRegistry, SourceFile,
    model::{ApiPage, MANAGED_REFERENCE_MIME},
};

use super::resolve;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the check command.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking configuration and content");

    let result = validate(config_path);

    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

/// Collect every problem without failing fast.
pub fn validate(config_path: &Path) -> ValidationResult {
    let mut result = ValidationResult::default();

    println!("Checking configuration...");
    let config = match Config::load_with_env(config_path) {
        Ok(c) => {
            println!("  ✓ Configuration valid");
            c
        }
        Err(e) => {
            result.add_error(format!("Configuration error: {e}"));
            println!("  ✗ Configuration invalid: {e}");
            return result;
        }
    };
    check_config_values(config_path, &config, &mut result);

    println!("\nChecking monikers...");
    let (registry, errors) = MonikerRegistry::build(&config.monikers);
    for error in &errors {
        result.add_warning(format!("Moniker definition: {error}"));
    }
    if errors.is_empty() {
        println!("  ✓ {} moniker(s) defined", registry.all_monikers().len());
    } else {
        println!("  ⚠ {} moniker definition problem(s)", errors.len());
    }

    let content_dir = resolve(config_path, &config.build.content_dir);
    if content_dir.is_dir() {
        println!("\nChecking moniker ranges...");
        validate_moniker_ranges(&content_dir, &registry, config.build.strict_monikers, &mut result);
    } else {
        result.add_warning(format!(
            "Content directory does not exist: {}",
            content_dir.display()
        ));
    }

    result
}

/// Check configuration values for common issues.
fn check_config_values(config_path: &Path, config: &Config, result: &mut ValidationResult) {
    if !config.site.base_url.starts_with("http") {
        result.add_warning("site.base_url should start with http:// or https://");
    }

    let output = resolve(config_path, &config.build.output_dir);
    if output.exists() && !output.is_dir() {
        result.add_error(format!(
            "Output path exists but is not a directory: {}",
            config.build.output_dir
        ));
    }
}

/// Evaluate every `monikerRange` found in managed reference pages.
fn validate_moniker_ranges(
    content_dir: &Path,
    registry: &MonikerRegistry,
    strict: bool,
    result: &mut ValidationResult,
) {
    let mut checked = 0;
    let mut failed = 0;

    for entry in walkdir::WalkDir::new(content_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let file = SourceFile::new(content_dir, entry.path());
        if !matches!(file.extension().as_deref(), Some("yml" | "yaml"))
            || file.first_line() != MANAGED_REFERENCE_MIME
        {
            continue;
        }

        let page: ApiPage = match file
            .read_to_string()
            .map_err(|e| e.to_string())
            .and_then(|content| serde_yaml::from_str(&content).map_err(|e| e.to_string()))
        {
            Ok(page) => page,
            Err(e) => {
                result.add_error(format!("{}: Parse error: {e}", file.key));
                failed += 1;
                continue;
            }
        };

        let ranges = page
            .moniker_range
            .iter()
            .map(|range| (file.key.clone(), range))
            .chain(page.items.iter().filter_map(|item| {
                item.moniker_range
                    .as_ref()
                    .map(|range| (format!("{} ({})", file.key, item.uid), range))
            }));

        for (location, range) in ranges {
            checked += 1;
            if let Err(e) = registry.evaluate(range) {
                failed += 1;
                let message = format!("{location}: monikerRange '{range}': {e}");
                if strict {
                    result.add_error(message);
                } else {
                    result.add_warning(message);
                }
            }
        }
    }

    if failed == 0 {
        println!("  ✓ All {checked} moniker range(s) valid");
    } else {
        println!("  ✗ {failed} problem(s) in {checked} moniker range(s)");
    }
}
