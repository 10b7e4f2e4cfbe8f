//! Readers for `/proc/<pid>/smaps`.
//!
//! The smaps file is an ordered list of VMA headers (`start-end perms offset
//! dev inode [pathname]`), each followed by `Key: value kB` detail lines.
//! [`SmapsCursor`] answers "what does smaps already report for the VMA that
//! contains this address"; the free functions aggregate a single field.

use std::io::{self, BufRead, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::MemtrackError;
use crate::kernel_file::for_each_line;

/// Which per-VMA detail line a pipeline cross-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmapsMetric {
    Pss,
    Rss,
}

impl SmapsMetric {
    pub fn prefix(self) -> &'static str {
        match self {
            SmapsMetric::Pss => "Pss:",
            SmapsMetric::Rss => "Rss:",
        }
    }
}

/// Parses kilobyte values from smaps file lines.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// A parsed VMA header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmaHeader {
    pub start: u64,
    pub end: u64,
    /// Empty for anonymous mappings.
    pub pathname: String,
}

impl VmaHeader {
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

/// Parses `start-end perms offset dev inode [pathname]`. Detail lines and
/// anything else return `None`.
pub fn parse_vma_header(line: &str) -> Option<VmaHeader> {
    let line = line.trim_end();
    let range = line.split_whitespace().next()?;
    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;

    // Skip the five fixed columns; whatever remains is the pathname.
    let mut rest = line;
    for _ in 0..5 {
        rest = rest.trim_start();
        match rest.find(char::is_whitespace) {
            Some(i) => rest = &rest[i..],
            None => {
                rest = "";
                break;
            }
        }
    }

    Some(VmaHeader {
        start,
        end,
        pathname: rest.trim().to_string(),
    })
}

enum SmapsLine {
    Header(VmaHeader),
    Metric(u64),
    Other,
}

struct CurrentVma {
    header: VmaHeader,
    reported_kb: Option<u64>,
}

/// Forward-only cursor that resolves virtual addresses to the reported size
/// of the VMA containing them.
///
/// Lookups within one pass must be in ascending address order; call
/// [`SmapsCursor::rewind`] before starting a new ascending sequence.
pub struct SmapsCursor<R> {
    reader: R,
    metric: SmapsMetric,
    buf: Vec<u8>,
    current: Option<CurrentVma>,
}

impl<R: BufRead + Seek> SmapsCursor<R> {
    pub fn new(reader: R, metric: SmapsMetric) -> Self {
        Self {
            reader,
            metric,
            buf: Vec::with_capacity(256),
            current: None,
        }
    }

    /// Seeks back to the first VMA.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.current = None;
        Ok(())
    }

    fn next_line(&mut self) -> io::Result<Option<SmapsLine>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        if let Some(header) = parse_vma_header(&line) {
            return Ok(Some(SmapsLine::Header(header)));
        }
        if let Some(v) = line.strip_prefix(self.metric.prefix()) {
            if let Some(kb) = parse_kb_value(v) {
                return Ok(Some(SmapsLine::Metric(kb)));
            }
        }
        Ok(Some(SmapsLine::Other))
    }

    /// Returns the metric (in KiB) of the VMA containing `addr`, or `None`
    /// when no VMA at or before the scan position maps it.
    pub fn lookup(&mut self, addr: u64) -> io::Result<Option<u64>> {
        loop {
            let in_current = match &self.current {
                Some(vma) if vma.header.start > addr => return Ok(None),
                Some(vma) if vma.header.contains(addr) => {
                    if let Some(kb) = vma.reported_kb {
                        return Ok(Some(kb));
                    }
                    true
                }
                _ => false,
            };

            match self.next_line()? {
                None => return Ok(None),
                Some(SmapsLine::Header(header)) => {
                    self.current = Some(CurrentVma {
                        header,
                        reported_kb: None,
                    });
                }
                Some(SmapsLine::Metric(kb)) if in_current => {
                    if let Some(vma) = self.current.as_mut() {
                        vma.reported_kb = Some(kb);
                    }
                    trace!("smaps match for {:#x}: {} kB", addr, kb);
                    return Ok(Some(kb));
                }
                Some(_) => {}
            }
        }
    }
}

/// Sums `metric` over the VMAs whose pathname satisfies `wanted`.
pub fn sum_metric_for_mappings<R, F>(
    reader: &mut R,
    path: &Path,
    metric: SmapsMetric,
    wanted: F,
) -> Result<u64, MemtrackError>
where
    R: BufRead,
    F: Fn(&str) -> bool,
{
    let mut total = 0u64;
    let mut in_wanted = false;
    for_each_line(reader, path, |line| {
        if let Some(header) = parse_vma_header(line) {
            in_wanted = wanted(&header.pathname);
        } else if in_wanted {
            if let Some(kb) = line.strip_prefix(metric.prefix()).and_then(parse_kb_value) {
                total = total.saturating_add(kb);
            }
        }
        true
    })?;
    Ok(total)
}

/// Sums a detail field (e.g. `PSwap:`) across every VMA, in KiB.
pub fn sum_field<R: BufRead>(reader: &mut R, path: &Path, prefix: &str) -> Result<u64, MemtrackError> {
    let mut total = 0u64;
    for_each_line(reader, path, |line| {
        if let Some(kb) = line.strip_prefix(prefix).and_then(parse_kb_value) {
            total = total.saturating_add(kb);
        }
        true
    })?;
    Ok(total)
}
