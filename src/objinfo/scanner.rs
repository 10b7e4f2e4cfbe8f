//! Line scanner for the i915 object-info table.
//!
//! Format:
//! ```text
//!  1234 surfaceflinger
//! ffff880012345000: 100K allocated (1234: 1: 0000000010000000) (567: 2:)
//! ffff880012346000: 8K purgeable (1234: 1:)
//!   PID  objects  bytes ...
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::error::MemtrackError;

static OBJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9a-f]+):\s*(\d+)K\s*(.+)$").expect("object line regex")
});

/// Residency state parsed from the flag text of an object line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Allocated,
    Purgeable,
    Other,
}

impl ObjectState {
    fn from_flags(flags: &str) -> Self {
        if flags.contains("purgeable") {
            ObjectState::Purgeable
        } else if flags.contains("allocated") {
            ObjectState::Allocated
        } else {
            ObjectState::Other
        }
    }

    /// Only allocated and purgeable objects are attributed to processes.
    pub fn is_attributable(self) -> bool {
        matches!(self, ObjectState::Allocated | ObjectState::Purgeable)
    }
}

/// One kernel memory object as listed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub kernel_address: String,
    pub size_kib: u64,
    pub state: ObjectState,
    /// Everything after the size column, verbatim.
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLine {
    /// Per-client header introducing the objects of `pid`.
    Section(u32),
    Object(ObjectEntry),
    /// The `PID ...` summary line that closes the table.
    Terminator,
}

/// Classifies a single line; `None` for anything that does not look like a
/// table line.
pub fn parse_object_line(line: &str) -> Option<ObjectLine> {
    let line = line.trim_end();
    if let Some(caps) = OBJECT_LINE.captures(line) {
        let size_kib = caps[2].parse().ok()?;
        let rest = caps[3].trim_end();
        let flags = rest.split('(').next().unwrap_or(rest);
        return Some(ObjectLine::Object(ObjectEntry {
            kernel_address: caps[1].to_string(),
            size_kib,
            state: ObjectState::from_flags(flags),
            rest: rest.to_string(),
        }));
    }

    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if first == "PID" {
        return tokens.next().map(|_| ObjectLine::Terminator);
    }
    if first.bytes().all(|b| b.is_ascii_digit()) {
        let pid = first.parse().ok()?;
        return tokens.next().map(|_| ObjectLine::Section(pid));
    }
    None
}

/// Lazy iterator over the recognised lines of an object table. Unrecognised
/// lines are skipped; the iterator is exhausted after the terminator.
pub struct ObjectTableScanner<R> {
    reader: R,
    path: PathBuf,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> ObjectTableScanner<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            buf: Vec::with_capacity(1024),
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for ObjectTableScanner<R> {
    type Item = Result<ObjectLine, MemtrackError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    match parse_object_line(line.trim_end()) {
                        Some(ObjectLine::Terminator) => {
                            self.finished = true;
                            return Some(Ok(ObjectLine::Terminator));
                        }
                        Some(parsed) => return Some(Ok(parsed)),
                        None => trace!("skipping object table line: {}", line.trim_end()),
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(MemtrackError::read(&self.path, e)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn object(line: &str) -> ObjectEntry {
        match parse_object_line(line) {
            Some(ObjectLine::Object(entry)) => entry,
            other => panic!("expected object line, got {:?}", other),
        }
    }

    // -------------------------------------------------------------------------
    // Tests for parse_object_line
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_allocated_object() {
        let entry = object("ffff0001: 100K allocated (42: 1: 0000000010000000)");
        assert_eq!(entry.kernel_address, "ffff0001");
        assert_eq!(entry.size_kib, 100);
        assert_eq!(entry.state, ObjectState::Allocated);
        assert_eq!(entry.rest, "allocated (42: 1: 0000000010000000)");
    }

    #[test]
    fn test_parse_newline_terminated_lines() {
        let entry = object("ffff0001: 100K allocated (42: 1:)\n");
        assert_eq!(entry.size_kib, 100);
        assert_eq!(entry.rest, "allocated (42: 1:)");
        assert_eq!(object("ffff0002: 8K purgeable (7: 1:)\r\n").size_kib, 8);
        assert_eq!(parse_object_line(" 42 app\n"), Some(ObjectLine::Section(42)));
    }

    #[test]
    fn test_parse_object_states() {
        assert_eq!(object("ffff0002: 200K purgeable (7: 1:)").state, ObjectState::Purgeable);
        assert_eq!(object("ffff0003: 4K active global (7: 1:)").state, ObjectState::Other);
        // State words inside attribution groups do not count.
        assert_eq!(object("ffff0004: 4K pinned (allocated)").state, ObjectState::Other);
        assert!(ObjectState::Allocated.is_attributable());
        assert!(ObjectState::Purgeable.is_attributable());
        assert!(!ObjectState::Other.is_attributable());
    }

    #[test]
    fn test_parse_section_and_terminator() {
        assert_eq!(parse_object_line(" 1234 surfaceflinger"), Some(ObjectLine::Section(1234)));
        assert_eq!(
            parse_object_line("  PID  objects  bytes"),
            Some(ObjectLine::Terminator)
        );
    }

    #[test]
    fn test_parse_malformed_lines() {
        assert_eq!(parse_object_line(""), None);
        assert_eq!(parse_object_line("garbage here"), None);
        assert_eq!(parse_object_line("ffff0001: lotsK allocated"), None);
        assert_eq!(parse_object_line("ffff0001: 100K"), None);
        assert_eq!(parse_object_line("1234"), None);
        assert_eq!(parse_object_line("PID"), None);
    }

    // -------------------------------------------------------------------------
    // Tests for ObjectTableScanner
    // -------------------------------------------------------------------------

    #[test]
    fn test_scanner_stops_at_terminator() {
        let table = "\
header that does not parse
 42 app
ffff0001: 100K allocated (42: 1:)
not an object
ffff0002: 8K purgeable (42: 1:)
  PID objects bytes
ffff0003: 8K allocated (42: 1:)
";
        let lines: Vec<ObjectLine> = ObjectTableScanner::new(Cursor::new(table), Path::new("t"))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ObjectLine::Section(42));
        assert!(matches!(lines[1], ObjectLine::Object(ref e) if e.kernel_address == "ffff0001"));
        assert!(matches!(lines[2], ObjectLine::Object(ref e) if e.size_kib == 8));
        assert_eq!(lines[3], ObjectLine::Terminator);
    }

    #[test]
    fn test_scanner_empty_input() {
        let mut scanner = ObjectTableScanner::new(Cursor::new(""), Path::new("t"));
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }
}
