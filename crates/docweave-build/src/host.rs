//! Services shared by every processor and step during a build.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use docweave_core::{ContentUnit, Metadata, MonikerRegistry, config::BuildConfig};
use docweave_markup::{MarkupContext, MarkupResult, MarkupService};
use parking_lot::RwLock;
use tracing::debug;

/// A unit shared across processors between build and save.
pub type SharedUnit = Arc<RwLock<ContentUnit>>;

/// Global metadata handed to every load.
pub type SharedMetadata = Arc<Metadata>;

/// Wrap a unit for sharing.
pub fn share(unit: ContentUnit) -> SharedUnit {
    Arc::new(RwLock::new(unit))
}

/// Uid to defining units, in unit order.
#[derive(Default)]
struct UidIndex {
    by_uid: HashMap<String, Vec<SharedUnit>>,
}

/// Host handed to every build phase.
pub struct HostService {
    config: BuildConfig,
    monikers: MonikerRegistry,
    markup: Arc<dyn MarkupService>,
    index: OnceLock<UidIndex>,
}

impl fmt::Debug for HostService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostService")
            .field("config", &self.config)
            .field("monikers", &self.monikers)
            .field("indexed", &self.is_indexed())
            .finish_non_exhaustive()
    }
}

impl HostService {
    pub fn new(
        config: BuildConfig,
        monikers: MonikerRegistry,
        markup: Arc<dyn MarkupService>,
    ) -> Self {
        Self {
            config,
            monikers,
            markup,
            index: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn monikers(&self) -> &MonikerRegistry {
        &self.monikers
    }

    /// Render markup through the markup collaborator.
    pub fn markup(
        &self,
        raw: &str,
        context: &MarkupContext,
        inline: bool,
    ) -> docweave_markup::Result<MarkupResult> {
        self.markup.markup(raw, context, inline)
    }

    /// Index every unit by the uids it defines. Only the first call has an effect.
    ///
    /// `units` must already be in unit order; lookups return matches in that order.
    pub fn install_index(&self, units: &[SharedUnit]) -> bool {
        let mut index = UidIndex::default();
        for unit in units {
            let uids = unit.read().uids.clone();
            for uid in uids {
                index.by_uid.entry(uid).or_default().push(Arc::clone(unit));
            }
        }
        let uids = index.by_uid.len();

        let installed = self.index.set(index).is_ok();
        if installed {
            debug!(units = units.len(), uids, "uid index installed");
        }
        installed
    }

    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    /// Every unit that currently defines `uid`, across all processors.
    ///
    /// Empty before the index is installed. Each candidate is read-locked
    /// briefly, so callers must not hold a write lock on any unit.
    pub fn lookup_by_uid(&self, uid: &str) -> Vec<SharedUnit> {
        let Some(index) = self.index.get() else {
            return Vec::new();
        };
        index
            .by_uid
            .get(uid)
            .map(|units| {
                units
                    .iter()
                    .filter(|unit| unit.read().defines(uid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
