//! Pre-built inputs for tests.

use std::io::Write;
use tempfile::NamedTempFile;

/// Links of the directed cycle `0 -> 1 -> ... -> n-1 -> 0` as input lines.
///
/// ```
/// use irondia::testing::cycle_links;
///
/// assert_eq!(cycle_links(3), vec!["0\t1", "1\t2", "2\t0"]);
/// ```
pub fn cycle_links(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{i}\t{}", (i + 1) % n)).collect()
}

/// Links of a star: every page in `1..n` links to page 0, page 0 links to
/// page 1.
pub fn star_links(n: usize) -> Vec<String> {
    let mut lines: Vec<String> = (1..n).map(|i| format!("{i}\t0")).collect();
    if n > 1 {
        lines.push("0\t1".to_string());
    }
    lines
}

/// Write `lines` to a fresh temporary file, one per line.
///
/// The file is removed when the returned handle drops.
///
/// # Panics
///
/// Panics if the file cannot be created or written.
pub fn temp_lines_file<S: AsRef<str>>(lines: &[S]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    for line in lines {
        writeln!(file, "{}", line.as_ref()).expect("write temp file");
    }
    file.flush().expect("flush temp file");
    file
}
