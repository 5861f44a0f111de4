//! Runs a processor's build steps over its units, one phase at a time.

use docweave_core::ContentUnit;
use tracing::{debug, trace};

use crate::{
    error::Result,
    host::{HostService, SharedUnit},
    processor::DocumentProcessor,
};

/// Run every step's prebuild over the processor's unit set, in step order.
pub fn run_prebuild(
    processor: &dyn DocumentProcessor,
    mut units: Vec<ContentUnit>,
    host: &HostService,
) -> Result<Vec<ContentUnit>> {
    for step in processor.build_steps().iter() {
        let before = units.len();
        units = step
            .prebuild(units, host)
            .map_err(|e| e.in_step(step.name(), processor.name()))?;
        debug!(
            processor = processor.name(),
            step = step.name(),
            before,
            after = units.len(),
            "prebuild"
        );
    }
    Ok(units)
}

/// Run every step's build on one unit.
///
/// Steps work on a copy that replaces the shared unit at the end, so no unit
/// lock is held while a step consults the host.
pub fn run_build(
    processor: &dyn DocumentProcessor,
    unit: &SharedUnit,
    host: &HostService,
) -> Result<()> {
    let mut working = unit.read().clone();
    for step in processor.build_steps().iter() {
        trace!(step = step.name(), key = working.key(), "build");
        step.build(&mut working, host)
            .map_err(|e| e.in_step(step.name(), working.key()))?;
    }
    *unit.write() = working;
    Ok(())
}

/// Run every step's postbuild over the processor's units.
pub fn run_postbuild(
    processor: &dyn DocumentProcessor,
    units: &[SharedUnit],
    host: &HostService,
) -> Result<()> {
    for step in processor.build_steps().iter() {
        debug!(
            processor = processor.name(),
            step = step.name(),
            units = units.len(),
            "postbuild"
        );
        step.postbuild(units, host)
            .map_err(|e| e.in_step(step.name(), processor.name()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use docweave_core::{
        ContentPayload, DocumentType, SourceFile,
        content::ResourceContent,
    };
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        error::BuildError,
        host::{SharedMetadata, share, tests::test_host},
        processor::{ProcessingPriority, SaveResult},
        step::{BuildStep, BuildStepList},
    };

    struct Recording {
        name: &'static str,
        order: i32,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl BuildStep for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn build_order(&self) -> i32 {
            self.order
        }

        fn prebuild(&self, mut units: Vec<ContentUnit>, _: &HostService) -> Result<Vec<ContentUnit>> {
            self.log.lock().push(format!("pre:{}", self.name));
            units.truncate(1);
            Ok(units)
        }

        fn build(&self, unit: &mut ContentUnit, _: &HostService) -> Result<()> {
            if self.fail {
                return Err(BuildError::Config("nope".to_string()));
            }
            self.log.lock().push(format!("build:{}", self.name));
            unit.add_uid(self.name);
            Ok(())
        }

        fn postbuild(&self, units: &[SharedUnit], _: &HostService) -> Result<()> {
            self.log
                .lock()
                .push(format!("post:{}:{}", self.name, units.len()));
            Ok(())
        }
    }

    struct Fixture {
        steps: BuildStepList,
    }

    impl DocumentProcessor for Fixture {
        fn name(&self) -> &'static str {
            "Fixture"
        }

        fn build_steps(&self) -> &BuildStepList {
            &self.steps
        }

        fn can_process(&self, _: &SourceFile) -> ProcessingPriority {
            ProcessingPriority::Normal
        }

        fn load(&self, _: &SourceFile, _: &SharedMetadata) -> Result<Option<ContentUnit>> {
            Ok(None)
        }

        fn save(&self, _: &ContentUnit) -> Result<SaveResult> {
            Ok(SaveResult::default())
        }
    }

    fn fixture(log: &Arc<Mutex<Vec<String>>>, fail_second: bool) -> Fixture {
        let step = |name, order, fail| Recording {
            name,
            order,
            log: Arc::clone(log),
            fail,
        };
        Fixture {
            steps: BuildStepList::new()
                .with(step("second", 20, fail_second))
                .with(step("first", 10, false)),
        }
    }

    fn unit(key: &str) -> ContentUnit {
        ContentUnit::new(
            SourceFile::new(Path::new("/docs"), format!("/docs/{key}")),
            DocumentType::Article,
            ContentPayload::Resource(ResourceContent::default()),
        )
    }

    #[test]
    fn test_phases_run_steps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let processor = fixture(&log, false);
        let host = test_host();

        let units = run_prebuild(&processor, vec![unit("a"), unit("b")], &host).unwrap();
        assert_eq!(units.len(), 1);

        let shared: Vec<_> = units.into_iter().map(share).collect();
        run_build(&processor, &shared[0], &host).unwrap();
        run_postbuild(&processor, &shared, &host).unwrap();

        assert_eq!(shared[0].read().uids, vec!["first", "second"]);
        assert_eq!(
            *log.lock(),
            vec![
                "pre:first",
                "pre:second",
                "build:first",
                "build:second",
                "post:first:1",
                "post:second:1",
            ]
        );
    }

    #[test]
    fn test_failed_build_leaves_unit_untouched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let processor = fixture(&log, true);
        let host = test_host();
        let shared = share(unit("a.yml"));

        let err = run_build(&processor, &shared, &host).unwrap_err();

        assert!(matches!(err, BuildError::Step { ref step, ref key, .. } if step == "second" && key == "a.yml"));
        assert!(shared.read().uids.is_empty());
    }
}
