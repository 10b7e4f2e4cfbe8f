//! ION heap provider.
//!
//! Each heap's debugfs file lists the buffers held by every client:
//! ```text
//!           client              pid             size
//!   surfaceflinger              179         33423360
//! ```
//! Sizes are in bytes.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::scan_lines;
use crate::record::MemtrackType;

pub const DEFAULT_ION_HEAPS: [&str; 2] = ["cma-heap", "system-heap"];

/// Parses `<client> <pid> <size>`; returns `(pid, bytes)`.
pub(crate) fn parse_client_line(line: &str) -> Option<(u32, u64)> {
    let mut tokens = line.split_whitespace().skip(1);
    let pid = tokens.next()?.parse().ok()?;
    let bytes = tokens.next()?.parse().ok()?;
    Some((pid, bytes))
}

/// Sums the sizes of every line of `path` that belongs to `pid`.
pub(crate) fn client_bytes(path: &Path, pid: u32) -> Result<u64, MemtrackError> {
    let mut total = 0u64;
    scan_lines(path, |line| {
        if let Some((owner, bytes)) = parse_client_line(line) {
            if owner == pid {
                total = total.saturating_add(bytes);
            }
        }
        true
    })?;
    Ok(total)
}

pub struct IonSource {
    paths: KernelPaths,
    heaps: Vec<String>,
}

impl IonSource {
    pub fn new(paths: KernelPaths, heaps: Vec<String>) -> Self {
        let heaps = if heaps.is_empty() {
            DEFAULT_ION_HEAPS.iter().map(|h| h.to_string()).collect()
        } else {
            heaps
        };
        Self { paths, heaps }
    }

    fn heap_path(&self, heap: &str) -> PathBuf {
        self.paths.debugfs_root.join("ion/heaps").join(heap)
    }
}

impl MemorySource for IonSource {
    fn name(&self) -> &'static str {
        "ion"
    }

    fn interfaces(&self, _pid: u32) -> Vec<PathBuf> {
        self.heaps.iter().map(|h| self.heap_path(h)).collect()
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        let mut total = 0u64;
        for heap in &self.heaps {
            match client_bytes(&self.heap_path(heap), pid) {
                Ok(bytes) => {
                    debug!("pid {}: ion heap {} holds {} bytes", pid, heap, bytes);
                    total = total.saturating_add(bytes);
                }
                // A heap the kernel does not provide contributes nothing.
                Err(e) => error!("ion heap {} not found: {}", heap, e),
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::FakeKernel;

    const HEAP: &str = "\
          client              pid             size
  surfaceflinger              179         33423360
    mediaserver               220          1048576
  surfaceflinger              179             4096
";

    #[test]
    fn test_parse_client_line() {
        assert_eq!(
            parse_client_line("  surfaceflinger              179         33423360"),
            Some((179, 33423360))
        );
        assert_eq!(parse_client_line("          client              pid             size"), None);
        assert_eq!(parse_client_line("----"), None);
    }

    #[test]
    fn test_sums_configured_heaps() {
        let k = FakeKernel::new();
        let source = IonSource::new(k.paths.clone(), Vec::new());
        k.write(&source.heap_path("cma-heap"), HEAP);
        k.write(&source.heap_path("system-heap"), "  surfaceflinger 179 100\n");
        let bytes = source.unaccounted_bytes(179, MemtrackType::Graphics).unwrap();
        assert_eq!(bytes, 33423360 + 4096 + 100);
    }

    #[test]
    fn test_missing_heap_contributes_zero() {
        let k = FakeKernel::new();
        let source = IonSource::new(k.paths.clone(), vec!["cma-heap".into(), "carveout".into()]);
        k.write(&source.heap_path("cma-heap"), HEAP);
        assert_eq!(source.unaccounted_bytes(220, MemtrackType::Other).unwrap(), 1048576);
        assert_eq!(source.interfaces(220).len(), 2);
    }
}
