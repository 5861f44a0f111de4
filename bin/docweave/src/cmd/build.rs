//! Build command - runs the documentation build

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use docweave_build::{BuildStats, Builder};
use docweave_core::Config;

use super::resolve;

/// Run the build command.
///
/// CLI flags override `build.output_dir`, `build.target_moniker` and
/// `build.max_parallelism`.
pub fn run(
    config_path: &Path,
    output: Option<&Path>,
    moniker: Option<String>,
    jobs: Option<usize>,
) -> Result<BuildStats> {
    let start = Instant::now();
    tracing::info!(?config_path, ?output, ?moniker, ?jobs, "Starting build");

    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    let content_dir = resolve(config_path, &config.build.content_dir);
    let output_dir = match output {
        Some(output) => output.to_path_buf(),
        None => resolve(config_path, &config.build.output_dir),
    };

    let mut builder = Builder::new(config, &content_dir, &output_dir);
    if let Some(moniker) = moniker {
        tracing::info!(moniker = %moniker, "Overriding target moniker from CLI");
        builder = builder.with_target_moniker(Some(moniker));
    }
    if let Some(jobs) = jobs {
        if jobs == 0 {
            color_eyre::eyre::bail!("--jobs must be greater than zero");
        }
        builder = builder.with_parallelism(jobs);
    }

    let stats = builder.build().wrap_err("Build failed")?;
    let duration = start.elapsed();

    println!();
    println!("  Build completed successfully!");
    println!();
    println!("  Pages:       {}", stats.pages);
    println!("  Resources:   {}", stats.resources);
    println!("  Skipped:     {}", stats.skipped);
    println!("  Xref specs:  {}", stats.xref_specs);
    println!("  Unresolved:  {}", stats.unresolved);
    if stats.config_warnings > 0 {
        println!("  Config warnings: {}", stats.config_warnings);
    }
    println!();
    println!("  Duration:    {:.2}s", duration.as_secs_f64());
    println!("  Output:      {}", output_dir.display());
    println!();

    tracing::info!(?stats, ?duration, "Build completed successfully");

    Ok(stats)
}
