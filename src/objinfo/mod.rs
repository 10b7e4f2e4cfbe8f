//! Attribution of shared i915 GEM objects to a process.
//!
//! This module provides:
//! - `scanner`: line scanner for the object-info table
//! - `dedup`: the per-query set of kernel objects already counted
//! - `attribution`: parser for the per-object `(pid: handles: addr...)` groups
//! - `resolver`: even-split vs. smaps cross-reference decision

pub mod attribution;
pub mod dedup;
pub mod resolver;
pub mod scanner;

use std::io::{BufRead, Seek};
use std::path::Path;

use tracing::{debug, warn};

pub use attribution::{attribute, Attribution, MAX_USER_ADDRESSES};
pub use dedup::SeenSet;
pub use resolver::{resolve, ObjinfoRevision};
pub use scanner::{ObjectEntry, ObjectLine, ObjectState, ObjectTableScanner};

use crate::error::MemtrackError;
use crate::smaps::SmapsCursor;

/// Outcome of scanning one object table for one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjinfoSummary {
    /// Signed aggregate in KiB.
    pub unaccounted_kib: i64,
    /// Distinct objects attributed (even split or cross-referenced).
    pub attributed_objects: usize,
    /// Object lines skipped because their address was already scanned.
    pub duplicate_lines: usize,
    /// Distinct objects considered for the process.
    pub distinct_objects: usize,
    /// Declared size of those objects, charged or not.
    pub listed_kib: u64,
}

/// Scans an object table and accumulates the unaccounted size for `pid`.
///
/// Inside a per-client section only the section of `pid` is considered, and
/// every eligible object in it is charged. Objects listed outside any section
/// are charged only when one of their attribution groups names `pid`.
pub fn scan_object_table<T, S>(
    table: T,
    table_path: &Path,
    smaps: &mut SmapsCursor<S>,
    smaps_path: &Path,
    pid: u32,
    revision: ObjinfoRevision,
) -> Result<ObjinfoSummary, MemtrackError>
where
    T: BufRead,
    S: BufRead + Seek,
{
    let mut seen = SeenSet::new();
    let mut summary = ObjinfoSummary::default();
    // None until the first per-client header, then whether it names `pid`.
    let mut section: Option<bool> = None;

    for line in ObjectTableScanner::new(table, table_path) {
        let entry = match line? {
            ObjectLine::Terminator => break,
            ObjectLine::Section(owner) => {
                section = Some(owner == pid);
                continue;
            }
            ObjectLine::Object(entry) => entry,
        };
        if section == Some(false) {
            continue;
        }

        if seen.seen(&entry.kernel_address) {
            summary.duplicate_lines += 1;
            continue;
        }

        let attribution = attribute(&entry.rest, pid);
        // Outside any section a row the process does not own leaves the
        // address free for a later row in its own section.
        if section.is_none() && !attribution.owned {
            continue;
        }
        seen.mark(&entry.kernel_address, entry.size_kib);

        if !entry.state.is_attributable() {
            continue;
        }
        if attribution.dropped_addresses > 0 {
            warn!(
                "object {} maps {} more addresses in pid {} than tracked, ignoring them",
                entry.kernel_address, attribution.dropped_addresses, pid
            );
        }
        if attribution.shared_count == 0 {
            continue;
        }

        let contribution = resolve(revision, entry.size_kib, &attribution, smaps)
            .map_err(|e| MemtrackError::read(smaps_path, e))?;
        debug!(
            "object {} ({}K, shared {}, {} mapping(s)) contributes {}K",
            entry.kernel_address,
            entry.size_kib,
            attribution.shared_count,
            attribution.user_addresses.len(),
            contribution
        );

        summary.unaccounted_kib = summary.unaccounted_kib.saturating_add(contribution);
        summary.attributed_objects += 1;
    }

    summary.distinct_objects = seen.len();
    summary.listed_kib = seen.total_kib();
    Ok(summary)
}
