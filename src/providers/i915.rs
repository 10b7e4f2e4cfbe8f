//! i915 GEM object table provider.
//!
//! Reads `<sysfs>/class/drm/<card>/i915_gem_objinfo` and cross-references
//! mapped objects against the Pss of `/proc/<pid>/smaps`.

use std::path::PathBuf;

use tracing::debug;

use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::open_buffered;
use crate::objinfo::{scan_object_table, ObjinfoRevision};
use crate::record::{kib_to_record_bytes, MemtrackType};
use crate::smaps::{SmapsCursor, SmapsMetric};

pub struct I915ObjinfoSource {
    paths: KernelPaths,
    revision: ObjinfoRevision,
}

impl I915ObjinfoSource {
    pub fn new(paths: KernelPaths, revision: ObjinfoRevision) -> Self {
        Self { paths, revision }
    }

    pub fn objinfo_path(&self) -> PathBuf {
        self.paths.drm_card_dir().join("i915_gem_objinfo")
    }
}

impl MemorySource for I915ObjinfoSource {
    fn name(&self) -> &'static str {
        "i915-objinfo"
    }

    fn interfaces(&self, pid: u32) -> Vec<PathBuf> {
        vec![self.objinfo_path(), self.paths.proc_file(pid, "smaps")]
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        let table_path = self.objinfo_path();
        let table = open_buffered(&table_path)?;

        let smaps_path = self.paths.proc_file(pid, "smaps");
        let mut smaps = SmapsCursor::new(open_buffered(&smaps_path)?, SmapsMetric::Pss);

        let summary = scan_object_table(
            table,
            &table_path,
            &mut smaps,
            &smaps_path,
            pid,
            self.revision,
        )?;

        debug!(
            "pid {}: {} of {} object(s) ({}K listed) attributed, {} duplicate line(s), {}K unaccounted ({:?})",
            pid,
            summary.attributed_objects,
            summary.distinct_objects,
            summary.listed_kib,
            summary.duplicate_lines,
            summary.unaccounted_kib,
            self.revision
        );

        Ok(kib_to_record_bytes(summary.unaccounted_kib))
    }
}
