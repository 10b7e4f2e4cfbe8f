//! Mali Midgard provider.
//!
//! The driver exposes one debugfs directory per GPU context, named
//! `<pid>_<context id>`, under `<debugfs>/mali0/ctx`. Each context's
//! `mem_profile` ends with a `Total allocated memory: <bytes>` line.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::{KernelPaths, MemorySource};
use crate::error::MemtrackError;
use crate::kernel_file::scan_lines;
use crate::record::MemtrackType;

const TOTAL_PREFIX: &str = "Total allocated memory:";

/// Extracts the owning pid from a `<pid>_<id>` context directory name.
fn context_pid(name: &str) -> Option<u32> {
    let (pid, id) = name.split_once('_')?;
    id.parse::<u64>().ok()?;
    pid.parse().ok()
}

pub struct MaliMidgardSource {
    paths: KernelPaths,
}

impl MaliMidgardSource {
    pub fn new(paths: KernelPaths) -> Self {
        Self { paths }
    }

    fn ctx_dir(&self) -> PathBuf {
        self.paths.debugfs_root.join("mali0/ctx")
    }
}

impl MemorySource for MaliMidgardSource {
    fn name(&self) -> &'static str {
        "mali-midgard"
    }

    fn interfaces(&self, _pid: u32) -> Vec<PathBuf> {
        vec![self.ctx_dir()]
    }

    fn unaccounted_bytes(&self, pid: u32, _mem_type: MemtrackType) -> Result<u64, MemtrackError> {
        let ctx_dir = self.ctx_dir();
        let entries = fs::read_dir(&ctx_dir).map_err(|e| MemtrackError::open(&ctx_dir, e))?;

        let mut total = 0u64;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if context_pid(name) != Some(pid) {
                continue;
            }

            let profile = entry.path().join("mem_profile");
            let mut context_bytes = None;
            scan_lines(&profile, |line| {
                if let Some(v) = line.trim_start().strip_prefix(TOTAL_PREFIX) {
                    if let Ok(bytes) = v.trim().parse::<u64>() {
                        context_bytes = Some(bytes);
                    }
                }
                true
            })?;

            debug!("pid {}: context {} allocated {:?} bytes", pid, name, context_bytes);
            total = total.saturating_add(context_bytes.unwrap_or(0));
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::FakeKernel;

    #[test]
    fn test_context_pid() {
        assert_eq!(context_pid("1234_5"), Some(1234));
        assert_eq!(context_pid("1234"), None);
        assert_eq!(context_pid("defaults"), None);
        assert_eq!(context_pid("abc_1"), None);
    }

    #[test]
    fn test_sums_contexts_of_pid() {
        let k = FakeKernel::new();
        let source = MaliMidgardSource::new(k.paths.clone());
        let ctx = source.ctx_dir();
        k.write(
            &ctx.join("1234_1/mem_profile"),
            "Channel: Default Heap (Total memory: 4096)\nTotal allocated memory: 2822048\n",
        );
        k.write(&ctx.join("1234_7/mem_profile"), "Total allocated memory: 1000\n");
        k.write(&ctx.join("99_1/mem_profile"), "Total allocated memory: 5\n");
        fs::create_dir_all(ctx.join("defaults")).unwrap();

        let bytes = source.unaccounted_bytes(1234, MemtrackType::Gl).unwrap();
        assert_eq!(bytes, 2822048 + 1000);
        assert_eq!(source.unaccounted_bytes(4321, MemtrackType::Gl).unwrap(), 0);
    }

    #[test]
    fn test_missing_ctx_dir_is_error() {
        let k = FakeKernel::new();
        let source = MaliMidgardSource::new(k.paths.clone());
        let err = source.unaccounted_bytes(1, MemtrackType::Gl).unwrap_err();
        assert_eq!(err.errno(), -libc::ENOENT);
    }
}
