//! Per-process `gfx_memtrack` table provider.
//!
//! `<sysfs>/class/drm/<card>/gfx_memtrack/<pid>` lists the graphics memory of
//! each client:
//! ```text
//!  PID    GfxMem   Process
//! 2454    37060K /system/bin/surfaceflinger
//! ```
//! The part already resident in DRM mappings (Rss of VMAs backed by the card
//! node or by `/drm mm object` shmem) is subtracted.

use std::path::PathBuf;

use tracing::{debug, warn};

use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::{open_buffered, scan_lines};
use crate::record::{kib_to_record_bytes, saturating_kib, MemtrackType};
use crate::smaps::{sum_metric_for_mappings, SmapsMetric};

const DRM_SHMEM_PREFIX: &str = "/drm mm object";

pub struct GfxMemtrackSource {
    paths: KernelPaths,
}

/// Parses `<pid> <N>K <process>`; returns `(pid, KiB)`.
fn parse_gfxmem_line(line: &str) -> Option<(u32, u64)> {
    let mut tokens = line.split_whitespace();
    let pid = tokens.next()?.parse().ok()?;
    let kib = tokens.next()?.strip_suffix('K')?.parse().ok()?;
    Some((pid, kib))
}

impl GfxMemtrackSource {
    pub fn new(paths: KernelPaths) -> Self {
        Self { paths }
    }

    fn table_path(&self, pid: u32) -> PathBuf {
        self.paths
            .drm_card_dir()
            .join("gfx_memtrack")
            .join(pid.to_string())
    }

    fn card_node(&self) -> String {
        format!("/dev/dri/{}", self.paths.drm_card)
    }
}

impl MemorySource for GfxMemtrackSource {
    fn name(&self) -> &'static str {
        "gfx-memtrack"
    }

    fn interfaces(&self, pid: u32) -> Vec<PathBuf> {
        vec![self.table_path(pid), self.paths.proc_file(pid, "smaps")]
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        let table_path = self.table_path(pid);
        let mut gfxmem_kib = None;
        scan_lines(&table_path, |line| match parse_gfxmem_line(line) {
            Some((owner, kib)) if owner == pid => {
                gfxmem_kib = Some(kib);
                false
            }
            _ => true,
        })?;

        let Some(gfxmem_kib) = gfxmem_kib else {
            return Ok(0);
        };

        let smaps_path = self.paths.proc_file(pid, "smaps");
        let mut smaps = match open_buffered(&smaps_path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("{}, reporting GfxMem without smaps correction", e);
                return Ok(gfxmem_kib.saturating_mul(1024));
            }
        };

        let card_node = self.card_node();
        let mapped_kib = sum_metric_for_mappings(&mut smaps, &smaps_path, SmapsMetric::Rss, |p| {
            p == card_node || p.starts_with(DRM_SHMEM_PREFIX)
        })?;

        debug!("pid {}: GfxMem {}K, mapped {}K", pid, gfxmem_kib, mapped_kib);
        Ok(kib_to_record_bytes(
            saturating_kib(gfxmem_kib).saturating_sub(saturating_kib(mapped_kib)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::FakeKernel;

    const TABLE: &str = " PID    GfxMem   Process\n2454    37060K /system/bin/surfaceflinger\n 77 100K app\n";

    #[test]
    fn test_parse_gfxmem_line() {
        assert_eq!(
            parse_gfxmem_line("2454    37060K /system/bin/surfaceflinger"),
            Some((2454, 37060))
        );
        assert_eq!(parse_gfxmem_line(" PID    GfxMem   Process"), None);
        assert_eq!(parse_gfxmem_line("2454 37060"), None);
    }

    #[test]
    fn test_subtracts_drm_mappings() {
        let k = FakeKernel::new();
        let source = GfxMemtrackSource::new(k.paths.clone());
        k.write(&source.table_path(2454), TABLE);
        k.write(
            &k.paths.proc_file(2454, "smaps"),
            "\
10000-20000 rw-s 00000000 00:05 1 /dev/dri/card0
Rss: 60 kB
20000-30000 rw-s 00000000 00:04 2 /drm mm object (deleted)
Rss: 1000 kB
30000-40000 rw-p 00000000 00:00 0
Rss: 5000 kB
",
        );
        let bytes = source.unaccounted_bytes(2454, MemtrackType::Graphics).unwrap();
        assert_eq!(bytes, (37060 - 1060) * 1024);
    }

    #[test]
    fn test_missing_smaps_falls_back_to_gfxmem() {
        let k = FakeKernel::new();
        let source = GfxMemtrackSource::new(k.paths.clone());
        k.write(&source.table_path(77), TABLE);
        assert_eq!(source.unaccounted_bytes(77, MemtrackType::Gl).unwrap(), 100 * 1024);
    }

    #[test]
    fn test_oversized_values_saturate() {
        let k = FakeKernel::new();
        let source = GfxMemtrackSource::new(k.paths.clone());
        k.write(&source.table_path(9), "9 18446744073709551615K huge\n");
        assert_eq!(source.unaccounted_bytes(9, MemtrackType::Gl).unwrap(), u64::MAX);

        k.write(&source.table_path(10), "10 4K small\n");
        k.write(
            &k.paths.proc_file(10, "smaps"),
            "10000-20000 rw-s 00000000 00:05 1 /dev/dri/card0\nRss: 18446744073709551615 kB\n",
        );
        assert_eq!(source.unaccounted_bytes(10, MemtrackType::Gl).unwrap(), 0);
    }

    #[test]
    fn test_pid_not_listed() {
        let k = FakeKernel::new();
        let source = GfxMemtrackSource::new(k.paths.clone());
        k.write(&source.table_path(5), TABLE);
        assert_eq!(source.unaccounted_bytes(5, MemtrackType::Gl).unwrap(), 0);
    }

    #[test]
    fn test_missing_table_is_error() {
        let k = FakeKernel::new();
        let source = GfxMemtrackSource::new(k.paths.clone());
        let err = source.unaccounted_bytes(5, MemtrackType::Gl).unwrap_err();
        assert_eq!(err.errno(), -libc::ENOENT);
    }
}
