//! Memory-source providers.
//!
//! Each provider reads one family of kernel interfaces and reports the
//! memory of a process that generic smaps accounting does not already
//! surface. All of them answer the same [`MemorySource::query`] contract.

pub mod gfx_memtrack;
pub mod hmm;
pub mod i915;
pub mod ion;
pub mod mali;
pub mod mali_midgard;
pub mod zram;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MemtrackError;
use crate::objinfo::ObjinfoRevision;
use crate::record::{MemtrackRecord, MemtrackType, UNACCOUNTED_PRIVATE_TEMPLATES};

pub use gfx_memtrack::GfxMemtrackSource;
pub use hmm::HmmSource;
pub use i915::I915ObjinfoSource;
pub use ion::IonSource;
pub use mali::MaliSource;
pub use mali_midgard::MaliMidgardSource;
pub use zram::ZramSource;

/// Common query capability of every provider.
pub trait MemorySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Records this provider defines, with their constant flags.
    fn record_templates(&self) -> &'static [MemtrackRecord] {
        &UNACCOUNTED_PRIVATE_TEMPLATES
    }

    /// Whether the provider reports anything for `mem_type`.
    fn handles(&self, _mem_type: MemtrackType) -> bool {
        true
    }

    /// Kernel files the provider reads for `pid`, for diagnostics.
    fn interfaces(&self, pid: u32) -> Vec<PathBuf>;

    /// Unaccounted bytes of `pid`, written into the first record.
    fn unaccounted_bytes(&self, pid: u32, mem_type: MemtrackType) -> Result<u64, MemtrackError>;

    /// Fills `records` (its length is the capacity) and returns the number of
    /// records the provider defines. With an empty slice only the count is
    /// returned and no kernel file is read. On error nothing is written.
    fn query(
        &self,
        pid: u32,
        mem_type: MemtrackType,
        records: &mut [MemtrackRecord],
    ) -> Result<usize, MemtrackError> {
        if !self.handles(mem_type) {
            return Ok(0);
        }

        let templates = self.record_templates();
        if records.is_empty() {
            return Ok(templates.len());
        }

        let bytes = self.unaccounted_bytes(pid, mem_type)?;

        let filled = records.len().min(templates.len());
        records[..filled].copy_from_slice(&templates[..filled]);
        records[0].size_in_bytes = bytes;
        Ok(templates.len())
    }
}

/// Runs the discover-then-fill sequence and returns the defined records.
pub fn query_records(
    source: &dyn MemorySource,
    pid: u32,
    mem_type: MemtrackType,
) -> Result<Vec<MemtrackRecord>, MemtrackError> {
    let count = source.query(pid, mem_type, &mut [])?;
    let mut records = vec![MemtrackRecord::default(); count];
    if count > 0 {
        source.query(pid, mem_type, &mut records)?;
    }
    Ok(records)
}

/// Filesystem locations of the kernel interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelPaths {
    pub sysfs_root: PathBuf,
    pub procfs_root: PathBuf,
    pub debugfs_root: PathBuf,
    /// DRM card name under `class/drm`, e.g. `card0`.
    pub drm_card: String,
    /// HMM device directory relative to the sysfs root.
    pub hmm_device: PathBuf,
}

impl Default for KernelPaths {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            procfs_root: PathBuf::from("/proc"),
            debugfs_root: PathBuf::from("/sys/kernel/debug"),
            drm_card: "card0".to_string(),
            hmm_device: PathBuf::from("devices/pci0000:00/0000:00:03.0"),
        }
    }
}

impl KernelPaths {
    /// `<procfs>/<pid>/<file>`
    pub fn proc_file(&self, pid: u32, file: &str) -> PathBuf {
        self.procfs_root.join(pid.to_string()).join(file)
    }

    /// `<sysfs>/class/drm/<card>`
    pub fn drm_card_dir(&self) -> PathBuf {
        self.sysfs_root.join("class/drm").join(&self.drm_card)
    }

    pub fn hmm_device_dir(&self) -> PathBuf {
        self.sysfs_root.join(&self.hmm_device)
    }
}

/// Provider names accepted in the configuration and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    I915Objinfo,
    GfxMemtrack,
    Mali,
    Ion,
    MaliMidgard,
    Hmm,
    Zram,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::I915Objinfo,
        ProviderKind::GfxMemtrack,
        ProviderKind::Mali,
        ProviderKind::Ion,
        ProviderKind::MaliMidgard,
        ProviderKind::Hmm,
        ProviderKind::Zram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::I915Objinfo => "i915-objinfo",
            ProviderKind::GfxMemtrack => "gfx-memtrack",
            ProviderKind::Mali => "mali",
            ProviderKind::Ion => "ion",
            ProviderKind::MaliMidgard => "mali-midgard",
            ProviderKind::Hmm => "hmm",
            ProviderKind::Zram => "zram",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown provider '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Everything needed to construct any provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub paths: KernelPaths,
    pub objinfo_revision: ObjinfoRevision,
    pub ion_heaps: Vec<String>,
}

/// Builds the provider for `kind`.
pub fn build_source(kind: ProviderKind, settings: &ProviderSettings) -> Box<dyn MemorySource> {
    let paths = settings.paths.clone();
    match kind {
        ProviderKind::I915Objinfo => {
            Box::new(I915ObjinfoSource::new(paths, settings.objinfo_revision))
        }
        ProviderKind::GfxMemtrack => Box::new(GfxMemtrackSource::new(paths)),
        ProviderKind::Mali => Box::new(MaliSource::new(paths)),
        ProviderKind::Ion => Box::new(IonSource::new(paths, settings.ion_heaps.clone())),
        ProviderKind::MaliMidgard => Box::new(MaliMidgardSource::new(paths)),
        ProviderKind::Hmm => Box::new(HmmSource::new(paths)),
        ProviderKind::Zram => Box::new(ZramSource::new(paths)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        bytes: u64,
        calls: AtomicUsize,
    }

    impl MemorySource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn interfaces(&self, _pid: u32) -> Vec<PathBuf> {
            Vec::new()
        }

        fn unaccounted_bytes(&self, _pid: u32, _t: MemtrackType) -> Result<u64, MemtrackError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.bytes)
        }
    }

    fn fixed(bytes: u64) -> FixedSource {
        FixedSource {
            bytes,
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_query_capacity_zero_only_counts() {
        let source = fixed(4096);
        assert_eq!(source.query(1, MemtrackType::Gl, &mut []).unwrap(), 1);
        assert_eq!(source.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_query_fills_first_record() {
        let source = fixed(4096);
        let mut records = [MemtrackRecord::default(); 3];
        assert_eq!(source.query(1, MemtrackType::Gl, &mut records).unwrap(), 1);
        assert_eq!(records[0], MemtrackRecord {
            size_in_bytes: 4096,
            flags: UNACCOUNTED_PRIVATE_TEMPLATES[0].flags,
        });
        assert_eq!(records[1], MemtrackRecord::default());
    }

    #[test]
    fn test_query_records_helper() {
        let records = query_records(&fixed(10), 1, MemtrackType::Other).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size_in_bytes, 10);
    }

    #[test]
    fn test_provider_kind_names_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("nvidia".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_build_source_names() {
        let settings = ProviderSettings::default();
        for kind in ProviderKind::ALL {
            assert_eq!(build_source(kind, &settings).name(), kind.as_str());
        }
    }

    #[test]
    fn test_kernel_paths() {
        let paths = KernelPaths::default();
        assert_eq!(paths.proc_file(42, "smaps"), PathBuf::from("/proc/42/smaps"));
        assert_eq!(paths.drm_card_dir(), PathBuf::from("/sys/class/drm/card0"));
        assert_eq!(
            paths.hmm_device_dir(),
            PathBuf::from("/sys/devices/pci0000:00/0000:00:03.0")
        );
    }
}
