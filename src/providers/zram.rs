//! zram provider: the compressed footprint of a process's swapped-out pages.
//!
//! The swapped size of the process (`PSwap` in smaps) is scaled by the
//! system-wide compression ratio `zram mem_used_total / swap in use`.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::{open_buffered, scan_lines};
use crate::record::MemtrackType;
use crate::smaps::{parse_kb_value, sum_field};

pub struct ZramSource {
    paths: KernelPaths,
}

impl ZramSource {
    pub fn new(paths: KernelPaths) -> Self {
        Self { paths }
    }

    fn mem_used_path(&self) -> PathBuf {
        self.paths.sysfs_root.join("block/zram0/mem_used_total")
    }

    fn meminfo_path(&self) -> PathBuf {
        self.paths.procfs_root.join("meminfo")
    }

    /// Bytes of RAM zram uses for compressed pages; 0 without a zram device.
    fn zram_used_bytes(&self) -> u64 {
        let path = self.mem_used_path();
        match fs::read_to_string(&path) {
            Ok(content) => content
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!("unparsable {}", path.display());
                    0
                }),
            Err(_) => 0,
        }
    }

    /// Bytes of swap in use (`SwapTotal - SwapFree`).
    fn swapped_bytes(&self) -> Result<u64, MemtrackError> {
        let mut swap_total = 0u64;
        let mut swap_free = 0u64;
        scan_lines(&self.meminfo_path(), |line| {
            if let Some(kb) = line.strip_prefix("SwapTotal:").and_then(parse_kb_value) {
                swap_total = kb;
            } else if let Some(kb) = line.strip_prefix("SwapFree:").and_then(parse_kb_value) {
                swap_free = kb;
            }
            true
        })?;
        Ok(swap_total.saturating_sub(swap_free).saturating_mul(1024))
    }

    fn compression_ratio(&self) -> f64 {
        let zram_used = self.zram_used_bytes();
        let swapped = match self.swapped_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}, assuming no swap", e);
                0
            }
        };
        if swapped == 0 {
            return 0.0;
        }
        let ratio = zram_used as f64 / swapped as f64;
        debug!(
            "zram used {} bytes, swapped {} bytes, ratio {:.3}",
            zram_used, swapped, ratio
        );
        ratio
    }
}

impl MemorySource for ZramSource {
    fn name(&self) -> &'static str {
        "zram"
    }

    fn handles(&self, mem_type: MemtrackType) -> bool {
        mem_type == MemtrackType::Other
    }

    fn interfaces(&self, pid: u32) -> Vec<PathBuf> {
        vec![
            self.mem_used_path(),
            self.meminfo_path(),
            self.paths.proc_file(pid, "smaps"),
        ]
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        let ratio = self.compression_ratio();

        let smaps_path = self.paths.proc_file(pid, "smaps");
        let mut smaps = open_buffered(&smaps_path)?;
        let pswap_kib = sum_field(&mut smaps, &smaps_path, "PSwap:")?;

        Ok((pswap_kib as f64 * 1024.0 * ratio) as u64)
    }
}
