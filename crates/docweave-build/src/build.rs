//! Build orchestration.
//!
//! Runs every discovered file through its processor: load, prebuild, build,
//! postbuild and save, then resolves cross-references and writes the output.
//! Load, build and save run on a [`WorkQueue`]; prebuild and postbuild run on
//! the calling thread once the preceding phase has drained for every
//! processor.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use docweave_core::{
    Config, ContentUnit, MonikerRegistry, SourceFile, xref::XrefMap,
};
use docweave_markup::{MarkdownMarkup, MarkupService};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    error::{BuildError, Result},
    host::{HostService, SharedMetadata, SharedUnit, share},
    pipeline::{run_build, run_postbuild, run_prebuild},
    processor::{DocumentProcessor, OutputArtifact, ProcessorRegistry},
    resolver::{XrefPool, XrefResolver},
    scheduler::WorkQueue,
    writer::OutputWriter,
};

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// JSON documents written.
    pub pages: usize,

    /// Files copied verbatim.
    pub resources: usize,

    /// Files no processor claimed.
    pub skipped: usize,

    /// Entries in the resolved xref map.
    pub xref_specs: usize,

    /// Xref dependencies missing from the xref map.
    pub unresolved: usize,

    /// Recoverable configuration problems, such as duplicate monikers.
    pub config_warnings: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// A loaded unit and the index of the processor that owns it.
type Owned<T> = (usize, T);

/// Drives a full build over a content directory.
pub struct Builder {
    config: Config,
    content_dir: PathBuf,
    output_dir: PathBuf,
    registry: Arc<ProcessorRegistry>,
    markup: Arc<dyn MarkupService>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("content_dir", &self.content_dir)
            .field("output_dir", &self.output_dir)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Create a builder with the built-in processors and markdown markup.
    #[must_use]
    pub fn new(
        config: Config,
        content_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            content_dir: content_dir.into(),
            output_dir: output_dir.into(),
            registry: Arc::new(ProcessorRegistry::with_defaults()),
            markup: Arc::new(MarkdownMarkup::new()),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    #[must_use]
    pub fn with_markup(mut self, markup: Arc<dyn MarkupService>) -> Self {
        self.markup = markup;
        self
    }

    /// Override `build.max_parallelism`.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.config.build.max_parallelism = Some(parallelism);
        self
    }

    /// Override `build.target_moniker`.
    #[must_use]
    pub fn with_target_moniker(mut self, moniker: Option<String>) -> Self {
        self.config.build.target_moniker = moniker;
        self
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Every file below the content directory, sorted by key.
    ///
    /// Hidden entries are skipped, as is the output directory when it lives
    /// inside the content directory.
    pub fn discover(&self) -> Result<Vec<SourceFile>> {
        if !self.content_dir.exists() {
            warn!(dir = %self.content_dir.display(), "content directory does not exist");
            return Ok(Vec::new());
        }

        let nested_output = self.nested_output_dir();
        if let Some(relative) = &nested_output {
            debug!(dir = %relative.display(), "output directory is inside the content directory, excluding it");
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.content_dir)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if is_hidden(entry.file_name()) {
                    return false;
                }
                nested_output.as_deref().is_none_or(|output| {
                    entry.path().strip_prefix(&self.content_dir).ok() != Some(output)
                })
            });
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(SourceFile::new(&self.content_dir, entry.path()));
            }
        }
        files.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(files)
    }

    /// The output directory relative to the content directory, when nested in it.
    fn nested_output_dir(&self) -> Option<PathBuf> {
        let content = fs::canonicalize(&self.content_dir).ok()?;
        let output = fs::canonicalize(&self.output_dir).ok()?;
        let relative = output.strip_prefix(&content).ok()?;
        (!relative.as_os_str().is_empty()).then(|| relative.to_path_buf())
    }

    /// Execute the full build.
    pub fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        info!(
            content = %self.content_dir.display(),
            output = %self.output_dir.display(),
            processors = self.registry.len(),
            "starting build"
        );

        // 1. Monikers
        let (monikers, errors) = MonikerRegistry::build(&self.config.monikers);
        for error in &errors {
            warn!(error = %error, "moniker configuration");
        }
        stats.config_warnings = errors.len();

        if let Some(target) = &self.config.build.target_moniker
            && !monikers.contains(target)
        {
            return Err(BuildError::Config(format!(
                "target moniker '{target}' is not defined"
            )));
        }

        let parallelism = self.config.build.parallelism();
        let metadata: SharedMetadata = Arc::new(self.config.build.global_metadata.clone());
        let host = Arc::new(HostService::new(
            self.config.build.clone(),
            monikers,
            Arc::clone(&self.markup),
        ));

        // 2. Route files to processors
        let mut routed = Vec::new();
        for file in self.discover()? {
            match self.registry.select(&file) {
                Some(index) => routed.push((index, file)),
                None => {
                    warn!(key = %file.key, "no processor claims file, skipping");
                    stats.skipped += 1;
                }
            }
        }

        // 3. Load
        let loaded = self.load(routed, metadata, parallelism)?;
        info!(units = loaded.len(), "loaded");

        // 4. Prebuild, per processor
        let mut grouped: Vec<Vec<ContentUnit>> = (0..self.registry.len()).map(|_| Vec::new()).collect();
        for (index, unit) in loaded {
            grouped[index].push(unit);
        }
        let mut units: Vec<Owned<ContentUnit>> = Vec::new();
        for (index, group) in grouped.into_iter().enumerate() {
            let processor = processor(&self.registry, index)?;
            let group = run_prebuild(processor, group, &host)?;
            units.extend(group.into_iter().map(|unit| (index, unit)));
        }

        units.sort_by(|(_, a), (_, b)| a.key().cmp(b.key()));
        let units: Arc<Vec<Owned<SharedUnit>>> = Arc::new(
            units
                .into_iter()
                .map(|(index, unit)| (index, share(unit)))
                .collect(),
        );
        let shared: Vec<SharedUnit> = units.iter().map(|(_, unit)| Arc::clone(unit)).collect();
        host.install_index(&shared);

        // 5. Build
        {
            let registry = Arc::clone(&self.registry);
            let host = Arc::clone(&host);
            let units = Arc::clone(&units);
            run_queue("build", units.len(), parallelism, move |position| {
                let (index, unit) = &units[position];
                run_build(processor(&registry, *index)?, unit, &host)
            })?;
        }

        // 6. Postbuild, per processor, once every build has finished
        for (index, processor) in self.registry.iter().enumerate() {
            let owned: Vec<SharedUnit> = units
                .iter()
                .filter(|(owner, _)| *owner == index)
                .map(|(_, unit)| Arc::clone(unit))
                .collect();
            run_postbuild(processor, &owned, &host)?;
        }

        // 7. Save
        let pool = Arc::new(XrefPool::new());
        let dependencies = Arc::new(Mutex::new(BTreeSet::new()));
        let artifacts = Arc::new(Mutex::new(Vec::new()));
        {
            let registry = Arc::clone(&self.registry);
            let units = Arc::clone(&units);
            let pool = Arc::clone(&pool);
            let dependencies = Arc::clone(&dependencies);
            let artifacts = Arc::clone(&artifacts);
            run_queue("save", units.len(), parallelism, move |position| {
                let (index, unit) = &units[position];
                let unit = unit.read();
                let saved = processor(&registry, *index)?
                    .save(&unit)
                    .map_err(|e| e.in_step("save", unit.key()))?;

                pool.add(position, saved.xref_specs);
                dependencies.lock().extend(saved.xref_dependencies);
                if let Some(artifact) = saved.artifact {
                    artifacts.lock().push((position, artifact));
                }
                Ok(())
            })?;
        }

        // 8. Resolve cross-references
        let mut specs = XrefResolver::collapse(pool.drain());
        XrefResolver::fill(&mut specs, &host);
        let unresolved = XrefResolver::unresolved(&dependencies.lock(), &specs);
        for uid in &unresolved {
            warn!(uid = %uid, "unresolved cross-reference");
        }
        stats.xref_specs = specs.len();
        stats.unresolved = unresolved.len();

        // 9. Write
        let mut artifacts = std::mem::take(&mut *artifacts.lock());
        artifacts.sort_by_key(|(position, _)| *position);
        let artifacts: Vec<OutputArtifact> = artifacts.into_iter().map(|(_, a)| a).collect();
        for artifact in &artifacts {
            match artifact {
                OutputArtifact::Document { .. } => stats.pages += 1,
                OutputArtifact::Resource { .. } => stats.resources += 1,
            }
        }

        let writer = OutputWriter::new(&self.output_dir);
        writer.prepare()?;
        writer.write_all(&artifacts)?;
        writer.write_xref_map(&XrefMap::new(specs).with_base_url(&self.config.site.base_url))?;

        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            pages = stats.pages,
            resources = stats.resources,
            skipped = stats.skipped,
            xref_specs = stats.xref_specs,
            unresolved = stats.unresolved,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    /// Load every routed file; the result keeps the routed order.
    fn load(
        &self,
        routed: Vec<Owned<SourceFile>>,
        metadata: SharedMetadata,
        parallelism: usize,
    ) -> Result<Vec<Owned<ContentUnit>>> {
        let routed = Arc::new(routed);
        let slots: Arc<Mutex<Vec<Option<Owned<ContentUnit>>>>> =
            Arc::new(Mutex::new((0..routed.len()).map(|_| None).collect()));

        {
            let registry = Arc::clone(&self.registry);
            let routed = Arc::clone(&routed);
            let slots = Arc::clone(&slots);
            run_queue("load", routed.len(), parallelism, move |position| {
                let (index, file) = &routed[position];
                let processor = processor(&registry, *index)?;
                let unit = processor
                    .load(file, &metadata)
                    .map_err(|e| e.in_step("load", &file.key))?;

                match unit {
                    Some(unit) => slots.lock()[position] = Some((*index, unit)),
                    None => debug!(key = %file.key, processor = processor.name(), "load skipped file"),
                }
                Ok(())
            })?;
        }

        let slots = std::mem::take(&mut *slots.lock());
        Ok(slots.into_iter().flatten().collect())
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn processor(registry: &ProcessorRegistry, index: usize) -> Result<&dyn DocumentProcessor> {
    registry
        .get(index)
        .ok_or_else(|| BuildError::Config(format!("no processor registered at index {index}")))
}

/// Run `worker` over `0..count` on a fresh queue and wait for it to drain.
fn run_queue(
    phase: &'static str,
    count: usize,
    parallelism: usize,
    worker: impl Fn(usize) -> Result<()> + Send + Sync + 'static,
) -> Result<()> {
    let queue = WorkQueue::<usize, BuildError>::new(parallelism)?
        .with_progress(move |processed, total| debug!(phase, processed, total, "progress"));
    for position in 0..count {
        queue.enqueue(position);
    }
    queue.start(move |_, position| worker(position))?;
    queue.wait_for_completion()?;
    Ok(())
}
