//! Integration tests for the sibling memory-source providers.
//!
//! Every provider is constructed through `build_source` against one fake
//! kernel tree, the way the command-line front end builds them.

use std::fs;

use gpu_memtrack::{
    build_source, query_records, KernelPaths, MemtrackType, ProviderKind, ProviderSettings,
};
use tempfile::TempDir;

const PID: u32 = 3941;

fn fake_tree() -> (TempDir, ProviderSettings) {
    let dir = TempDir::new().unwrap();
    let settings = ProviderSettings {
        paths: KernelPaths {
            sysfs_root: dir.path().join("sys"),
            procfs_root: dir.path().join("proc"),
            debugfs_root: dir.path().join("debug"),
            ..KernelPaths::default()
        },
        ion_heaps: vec!["cma-heap".into(), "system-heap".into()],
        ..ProviderSettings::default()
    };

    let files = [
        (
            "debug/mali/gpu_memory",
            "\
Name (:bytes)              pid         mali_mem    max_mali_mem
RenderThread               3941        13008896    37167104
",
        ),
        (
            "debug/ion/cma-heap",
            "\
          client              pid             size
    surfaceflinger              200           1000
      RenderThread             3941           4096
",
        ),
        (
            "debug/ion/heaps/cma-heap",
            "          client              pid             size\n      RenderThread             3941           8192\n",
        ),
        (
            "debug/mali0/ctx/3941_1/mem_profile",
            "Total allocated memory: 100\nTotal allocated memory: 300\n",
        ),
        (
            "debug/mali0/ctx/3941_2/mem_profile",
            "Total allocated memory: 50\n",
        ),
        (
            "proc/3941/smaps",
            "\
10000-20000 rw-p 00000000 00:00 0
Rss: 64 kB
PSwap: 100 kB
",
        ),
        ("proc/1/smaps", ""),
        (
            "proc/meminfo",
            "MemTotal: 1000000 kB\nSwapTotal: 1000 kB\nSwapFree: 600 kB\n",
        ),
        ("sys/block/zram0/mem_used_total", "102400\n"),
    ];
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    let hmm = settings.paths.hmm_device_dir();
    fs::create_dir_all(&hmm).unwrap();
    fs::write(hmm.join("active_bo"), "2 p buffer objects: 100 KB\n").unwrap();
    fs::write(hmm.join("reserved_pool"), "10 out of 20 pages available\n").unwrap();
    fs::write(hmm.join("dynamic_pool"), "5 (max 20) pages available\n").unwrap();

    (dir, settings)
}

fn bytes(kind: ProviderKind, settings: &ProviderSettings, pid: u32, mem_type: MemtrackType) -> u64 {
    let records = query_records(build_source(kind, settings).as_ref(), pid, mem_type).unwrap();
    records.iter().map(|r| r.size_in_bytes).sum()
}

// -------------------------------------------------------------------------
// Per-provider results
// -------------------------------------------------------------------------

#[test]
fn test_mali_adds_ion_cma_clients() {
    let (_dir, settings) = fake_tree();
    assert_eq!(
        bytes(ProviderKind::Mali, &settings, PID, MemtrackType::Gl),
        13008896 + 4096
    );
}

#[test]
fn test_ion_missing_heap_contributes_zero() {
    let (_dir, settings) = fake_tree();
    // system-heap does not exist in the tree
    assert_eq!(bytes(ProviderKind::Ion, &settings, PID, MemtrackType::Gl), 8192);
}

#[test]
fn test_midgard_sums_every_context_of_pid() {
    let (_dir, settings) = fake_tree();
    assert_eq!(
        bytes(ProviderKind::MaliMidgard, &settings, PID, MemtrackType::Gl),
        300 + 50
    );
}

#[test]
fn test_hmm_only_reports_for_pid_one() {
    let (_dir, settings) = fake_tree();
    assert_eq!(
        bytes(ProviderKind::Hmm, &settings, 1, MemtrackType::Other),
        (100 + 15 * 4) * 1024
    );
    assert_eq!(bytes(ProviderKind::Hmm, &settings, PID, MemtrackType::Other), 0);
}

#[test]
fn test_zram_scales_pswap_by_compression_ratio() {
    let (_dir, settings) = fake_tree();
    // swapped = 400 KiB, zram uses 100 KiB: ratio 0.25
    assert_eq!(
        bytes(ProviderKind::Zram, &settings, PID, MemtrackType::Other),
        25 * 1024
    );
}

#[test]
fn test_zram_answers_only_other() {
    let (_dir, settings) = fake_tree();
    let source = build_source(ProviderKind::Zram, &settings);
    assert_eq!(source.query(PID, MemtrackType::Gl, &mut []).unwrap(), 0);
    assert!(query_records(source.as_ref(), PID, MemtrackType::Graphics)
        .unwrap()
        .is_empty());
}

// -------------------------------------------------------------------------
// Failures
// -------------------------------------------------------------------------

#[test]
fn test_missing_required_files_are_enoent() {
    let dir = TempDir::new().unwrap();
    let settings = ProviderSettings {
        paths: KernelPaths {
            sysfs_root: dir.path().join("sys"),
            procfs_root: dir.path().join("proc"),
            debugfs_root: dir.path().join("debug"),
            ..KernelPaths::default()
        },
        ion_heaps: vec!["cma-heap".into()],
        ..ProviderSettings::default()
    };

    for kind in [
        ProviderKind::I915Objinfo,
        ProviderKind::GfxMemtrack,
        ProviderKind::Mali,
        ProviderKind::MaliMidgard,
        ProviderKind::Hmm,
    ] {
        let err = query_records(build_source(kind, &settings).as_ref(), PID, MemtrackType::Gl)
            .unwrap_err();
        assert_eq!(err.errno(), -libc::ENOENT, "{}", kind);
    }
}
