//! Mali (Utgard) provider: driver-reported GPU memory plus ION CMA buffers.
//!
//! `<debugfs>/mali/gpu_memory`:
//! ```text
//! Name (:bytes)              pid         mali_mem    max_mali_mem     external_mem     ump_mem     dma_mem
//! RenderThread               3941        13008896    37167104         0                0           11640832
//! ```
//! The name column is fixed-width: the first 25 characters of a row are the
//! (possibly space-containing) thread name.

use std::path::PathBuf;

use tracing::debug;

use super::ion::client_bytes;
use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::scan_lines;
use crate::record::MemtrackType;

const NAME_COLUMN_CHARS: usize = 25;

/// Parses one `gpu_memory` row; returns `(pid, mali_mem bytes)`.
fn parse_gpu_memory_line(line: &str) -> Option<(u32, u64)> {
    let row = line.trim_start();
    let (offset, _) = row.char_indices().nth(NAME_COLUMN_CHARS)?;
    let mut tokens = row[offset..].split_whitespace();
    let pid = tokens.next()?.parse().ok()?;
    let bytes = tokens.next()?.parse().ok()?;
    Some((pid, bytes))
}

pub struct MaliSource {
    paths: KernelPaths,
}

impl MaliSource {
    pub fn new(paths: KernelPaths) -> Self {
        Self { paths }
    }

    fn gpu_memory_path(&self) -> PathBuf {
        self.paths.debugfs_root.join("mali/gpu_memory")
    }

    fn cma_heap_path(&self) -> PathBuf {
        self.paths.debugfs_root.join("ion/cma-heap")
    }
}

impl MemorySource for MaliSource {
    fn name(&self) -> &'static str {
        "mali"
    }

    fn interfaces(&self, _pid: u32) -> Vec<PathBuf> {
        vec![self.gpu_memory_path(), self.cma_heap_path()]
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        let mut gpu_bytes = 0u64;
        scan_lines(&self.gpu_memory_path(), |line| match parse_gpu_memory_line(line) {
            Some((owner, bytes)) if owner == pid => {
                gpu_bytes = bytes;
                false
            }
            _ => true,
        })?;

        let ion_bytes = client_bytes(&self.cma_heap_path(), pid)?;
        debug!("pid {}: mali {} bytes, ion cma {} bytes", pid, gpu_bytes, ion_bytes);

        Ok(gpu_bytes.saturating_add(ion_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::FakeKernel;

    const GPU_MEMORY: &str = "\
Name (:bytes)              pid         mali_mem    max_mali_mem     external_mem     ump_mem     dma_mem
RenderThread               3941        13008896    37167104         0                0           11640832
Chrome_InProcGp            4012        2048        4096             0                0           0
";

    #[test]
    fn test_parse_gpu_memory_line() {
        assert_eq!(
            parse_gpu_memory_line("RenderThread               3941        13008896    37167104"),
            Some((3941, 13008896))
        );
        let spaced = format!("{:<27}{:<12}{:<12}0", "Binder thread 3", 77, 512);
        assert_eq!(parse_gpu_memory_line(&spaced), Some((77, 512)));
        assert_eq!(parse_gpu_memory_line("short"), None);
        assert_eq!(
            parse_gpu_memory_line("Name (:bytes)              pid         mali_mem"),
            None
        );
    }

    #[test]
    fn test_adds_ion_cma() {
        let k = FakeKernel::new();
        let source = MaliSource::new(k.paths.clone());
        k.write(&source.gpu_memory_path(), GPU_MEMORY);
        k.write(
            &source.cma_heap_path(),
            "  client pid size\n  RenderThread 3941 1000\n  RenderThread 3941 24\n",
        );
        let bytes = source.unaccounted_bytes(3941, MemtrackType::Gl).unwrap();
        assert_eq!(bytes, 13008896 + 1024);
    }

    #[test]
    fn test_oversized_sizes_saturate() {
        let k = FakeKernel::new();
        let source = MaliSource::new(k.paths.clone());
        k.write(
            &source.gpu_memory_path(),
            &format!("{:<27}{:<12}{}\n", "RenderThread", 3941, u64::MAX),
        );
        k.write(
            &source.cma_heap_path(),
            "  client pid size\n  RenderThread 3941 4096\n  RenderThread 3941 18446744073709551615\n",
        );
        assert_eq!(source.unaccounted_bytes(3941, MemtrackType::Gl).unwrap(), u64::MAX);
    }

    #[test]
    fn test_missing_cma_heap_is_error() {
        let k = FakeKernel::new();
        let source = MaliSource::new(k.paths.clone());
        k.write(&source.gpu_memory_path(), GPU_MEMORY);
        assert!(source.unaccounted_bytes(4012, MemtrackType::Gl).is_err());
    }
}
