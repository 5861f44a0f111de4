//! Cross-reference pooling, collapsing and filling.

use std::collections::{BTreeSet, HashSet};

use docweave_core::XrefSpec;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::host::HostService;

/// Element fields never copied onto a spec.
pub const FILL_DENYLIST: &[&str] = &[
    "documentation",
    "source",
    "remarks",
    "example",
    "conceptual",
    "__internal",
];

/// Specs emitted by saves, keyed by the emitting unit's position.
#[derive(Debug, Default)]
pub struct XrefPool {
    entries: Mutex<Vec<(usize, Vec<XrefSpec>)>>,
}

impl XrefPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the specs emitted by the unit at `order`.
    pub fn add(&self, order: usize, specs: Vec<XrefSpec>) {
        if specs.is_empty() {
            return;
        }
        self.entries.lock().push((order, specs));
    }

    /// Take every spec out, in unit order then emission order.
    pub fn drain(&self) -> Vec<XrefSpec> {
        let mut entries = std::mem::take(&mut *self.entries.lock());
        entries.sort_by_key(|(order, _)| *order);
        entries.into_iter().flat_map(|(_, specs)| specs).collect()
    }
}

/// Collapses and fills pooled specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct XrefResolver;

impl XrefResolver {
    /// Keep the first spec for every uid, in first-seen order.
    pub fn collapse(specs: Vec<XrefSpec>) -> Vec<XrefSpec> {
        let mut seen = HashSet::new();
        let total = specs.len();
        let collapsed: Vec<_> = specs
            .into_iter()
            .filter(|spec| seen.insert(spec.uid.clone()))
            .collect();
        debug!(total, unique = collapsed.len(), "collapsed xref specs");
        collapsed
    }

    /// Fill every spec from the unit that defines it.
    pub fn fill(specs: &mut [XrefSpec], host: &HostService) {
        let external = specs
            .iter_mut()
            .map(|spec| Self::fill_one(spec, host))
            .filter(|found| !found)
            .count();
        debug!(specs = specs.len(), external, "filled xref specs");
    }

    /// Copy descriptive fields onto `spec`; returns whether a definition was found.
    pub fn fill_one(spec: &mut XrefSpec, host: &HostService) -> bool {
        for unit in host.lookup_by_uid(&spec.uid) {
            let Some(fields) = unit.read().payload.find_element(&spec.uid) else {
                continue;
            };
            for (key, value) in fields {
                if !FILL_DENYLIST.contains(&key.as_str()) {
                    spec.set(&key, value);
                }
            }
            spec.is_external = false;
            return true;
        }

        trace!(uid = %spec.uid, "no definition found, marking external");
        spec.is_external = true;
        false
    }

    /// Referenced uids that no spec resolves.
    pub fn unresolved(dependencies: &BTreeSet<String>, specs: &[XrefSpec]) -> Vec<String> {
        let known: HashSet<&str> = specs.iter().map(|spec| spec.uid.as_str()).collect();
        dependencies
            .iter()
            .filter(|uid| !known.contains(uid.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use docweave_core::{
        ContentPayload, ContentUnit, DocumentType, SourceFile,
        content::ArticleContent,
        model::{ApiItem, ApiPage, ApiReference},
        xref::{HREF, NAME},
    };

    use super::*;
    use crate::host::{share, tests::test_host};

    fn api_unit() -> ContentUnit {
        let page = ApiPage {
            items: vec![ApiItem {
                uid: "Contoso.Widget.Spin(System.Int32)".to_string(),
                kind: Some("Method".to_string()),
                summary: Some("Spins the widget.".to_string()),
                remarks: Some("Internal remarks.".to_string()),
                platform: vec!["net8.0".to_string()],
                overload: Some("Contoso.Widget.Spin*".to_string()),
                ..Default::default()
            }],
            references: vec![ApiReference {
                uid: "Contoso.Widget.Spin*".to_string(),
                name: Some("Spin".to_string()),
                summary: Some("Spin overloads.".to_string()),
                ..Default::default()
            }],
            moniker_range: None,
        };
        let mut unit = ContentUnit::new(
            SourceFile::new(Path::new("/docs"), "/docs/api/Contoso.Widget.yml"),
            DocumentType::Article,
            ContentPayload::Article(ArticleContent::ApiPage(page)),
        );
        unit.add_uid("Contoso.Widget.Spin(System.Int32)");
        unit.add_uid("Contoso.Widget.Spin*");
        unit
    }

    #[test]
    fn test_pool_drains_in_unit_order() {
        let pool = XrefPool::new();
        pool.add(2, vec![XrefSpec::new("C")]);
        pool.add(0, vec![XrefSpec::new("A"), XrefSpec::new("B")]);
        pool.add(1, Vec::new());

        let uids: Vec<_> = pool.drain().into_iter().map(|s| s.uid).collect();
        assert_eq!(uids, vec!["A", "B", "C"]);
        assert!(pool.drain().is_empty());
    }

    #[test]
    fn test_collapse_first_wins() {
        let specs = vec![
            XrefSpec::new("A").with(NAME, Some("first")),
            XrefSpec::new("B"),
            XrefSpec::new("A").with(NAME, Some("second")),
        ];

        let collapsed = XrefResolver::collapse(specs);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].name(), Some("first"));
        assert_eq!(collapsed[1].uid, "B");
    }

    #[test]
    fn test_fill_copies_fields_and_skips_denylist() {
        let host = test_host();
        host.install_index(&[share(api_unit())]);

        let mut specs = vec![
            XrefSpec::new("Contoso.Widget.Spin(System.Int32)")
                .with(HREF, Some("api/Contoso.Widget.json#spin")),
            XrefSpec::new("Contoso.Widget.Spin*"),
            XrefSpec::new("System.Int32"),
        ];
        XrefResolver::fill(&mut specs, &host);

        let method = &specs[0];
        assert_eq!(method.get("summary"), Some("Spins the widget."));
        assert_eq!(method.get("type"), Some("Method"));
        assert_eq!(method.get("platform"), Some("net8.0"));
        assert_eq!(method.get("remarks"), None);
        assert_eq!(method.href(), Some("api/Contoso.Widget.json#spin"));
        assert!(!method.is_external);

        let overload = &specs[1];
        assert_eq!(overload.get("summary"), Some("Spin overloads."));
        assert!(!overload.is_external);

        assert!(specs[2].is_external);
    }

    #[test]
    fn test_fill_is_idempotent() {
        let host = test_host();
        host.install_index(&[share(api_unit())]);

        let mut once = vec![
            XrefSpec::new("Contoso.Widget.Spin(System.Int32)"),
            XrefSpec::new("Missing"),
        ];
        XrefResolver::fill(&mut once, &host);
        let mut twice = once.clone();
        XrefResolver::fill(&mut twice, &host);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_unresolved_dependencies() {
        let deps: BTreeSet<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let specs = vec![XrefSpec::new("B")];

        assert_eq!(XrefResolver::unresolved(&deps, &specs), vec!["A", "C"]);
    }
}
