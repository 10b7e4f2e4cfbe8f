//! HMM (Intel Atom ISP) buffer pool provider.
//!
//! The pools are system-wide; they are reported once, against pid 1.
//! ```text
//! active_bo:      39 p buffer objects: 9696 KB
//! reserved_pool:  16008 out of 18432 pages available
//! dynamic_pool:   16008 (max 18432) pages available
//! ```

use std::path::PathBuf;

use tracing::debug;

use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::scan_lines;
use crate::record::MemtrackType;

const POOL_OWNER_PID: u32 = 1;
const PAGE_KIB: u64 = 4;

/// `<count> p <word> <word> <KiB> ...`
fn parse_active_bo_line(line: &str) -> Option<u64> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 || tokens[1] != "p" {
        return None;
    }
    tokens[0].parse::<u64>().ok()?;
    tokens[4].parse().ok()
}

/// Leading page count of a pool line.
fn parse_pool_line(line: &str) -> Option<u64> {
    line.split_whitespace().next()?.parse().ok()
}

pub struct HmmSource {
    paths: KernelPaths,
}

impl HmmSource {
    pub fn new(paths: KernelPaths) -> Self {
        Self { paths }
    }

    fn device_file(&self, name: &str) -> PathBuf {
        self.paths.hmm_device_dir().join(name)
    }

    fn sum_file(&self, name: &str, parse: fn(&str) -> Option<u64>) -> Result<u64, MemtrackError> {
        let mut total = 0u64;
        scan_lines(&self.device_file(name), |line| {
            total = total.saturating_add(parse(line).unwrap_or(0));
            true
        })?;
        Ok(total)
    }
}

impl MemorySource for HmmSource {
    fn name(&self) -> &'static str {
        "hmm"
    }

    fn interfaces(&self, _pid: u32) -> Vec<PathBuf> {
        ["active_bo", "reserved_pool", "dynamic_pool"]
            .iter()
            .map(|f| self.device_file(f))
            .collect()
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        // Every file is required even when the pid is not the pool owner.
        let active_kib = self.sum_file("active_bo", parse_active_bo_line)?;
        let reserved_pages = self.sum_file("reserved_pool", parse_pool_line)?;
        let dynamic_pages = self.sum_file("dynamic_pool", parse_pool_line)?;

        if pid != POOL_OWNER_PID {
            return Ok(0);
        }

        debug!(
            "hmm: active {}K, reserved {} pages, dynamic {} pages",
            active_kib, reserved_pages, dynamic_pages
        );
        let pool_kib = reserved_pages
            .saturating_add(dynamic_pages)
            .saturating_mul(PAGE_KIB);
        Ok(active_kib.saturating_add(pool_kib).saturating_mul(1024))
    }
}
