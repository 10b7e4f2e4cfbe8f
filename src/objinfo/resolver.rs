//! Decides how much of one object is attributed to the target process.

use std::io::{self, BufRead, Seek};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::attribution::Attribution;
use crate::record::saturating_kib;
use crate::smaps::SmapsCursor;

/// Object-info table revision; selects how mapped objects are charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjinfoRevision {
    /// Mapped objects are charged their full size minus what smaps reports
    /// for each mapping, regardless of how many processes share them.
    Legacy,
    /// Mapped objects are charged the process's even share minus what smaps
    /// reports for each mapping.
    #[default]
    Revised,
}

impl ObjinfoRevision {
    /// Size each resolved mapping is measured against.
    fn mapped_share(self, size_kib: u64, shared_count: u64) -> u64 {
        match self {
            ObjinfoRevision::Legacy => size_kib,
            ObjinfoRevision::Revised => size_kib / shared_count.max(1),
        }
    }
}

/// Returns the signed KiB contribution of one object.
///
/// Objects without a known mapping in the process are split evenly across
/// all sharers. Mapped objects are cross-referenced against smaps; addresses
/// without a VMA contribute nothing.
pub fn resolve<R: BufRead + Seek>(
    revision: ObjinfoRevision,
    size_kib: u64,
    attribution: &Attribution,
    smaps: &mut SmapsCursor<R>,
) -> io::Result<i64> {
    if attribution.user_addresses.is_empty() {
        if attribution.shared_count == 0 {
            return Ok(0);
        }
        return Ok(saturating_kib(size_kib / attribution.shared_count));
    }

    let share = saturating_kib(revision.mapped_share(size_kib, attribution.shared_count));

    smaps.rewind()?;
    let mut contribution = 0i64;
    for &addr in &attribution.user_addresses {
        match smaps.lookup(addr)? {
            Some(reported_kib) => {
                let delta = share.saturating_sub(saturating_kib(reported_kib));
                contribution = contribution.saturating_add(delta);
            }
            None => debug!("no VMA maps {:#x}", addr),
        }
    }
    Ok(contribution)
}
