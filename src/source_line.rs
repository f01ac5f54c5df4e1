//! Pure source-line recovery from debug metadata.
//!
//! An external collaborator relative to the core: the engine never calls
//! this directly, but the driver and CLI use it to render race reports in
//! the exact plaintext format the output contract specifies.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::ir::DebugLoc;

/// Format `"<filename>:<line>: <source-text>"` for a debug location, or an
/// empty string on any failure (no location, unreadable file, short
/// file) — matching the original `getSourceLine`'s behavior exactly,
/// including its choice to swallow all errors rather than propagate them.
pub fn format(loc: Option<&DebugLoc>) -> String {
    let Some(loc) = loc else {
        return String::new();
    };
    if loc.line < 1 {
        return String::new();
    }
    let path = Path::new(&loc.dir).join(&loc.file);
    let Ok(file) = File::open(&path) else {
        return String::new();
    };
    let reader = BufReader::new(file);
    for (idx, line) in reader.lines().enumerate() {
        let Ok(line) = line else { return String::new() };
        if idx as u32 + 1 == loc.line {
            return format!("{}:{}: {}", loc.file, loc.line, line);
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn formats_existing_line() {
        let dir = std::env::temp_dir().join("mpi_race_detect_source_line_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("prog.c");
        let mut f = File::create(&file_path).unwrap();
        writeln!(f, "int main() {{").unwrap();
        writeln!(f, "    buf[0] = 1;").unwrap();
        writeln!(f, "}}").unwrap();

        let loc = DebugLoc { dir: dir.to_string_lossy().into_owned(), file: "prog.c".into(), line: 2 };
        assert_eq!(format(Some(&loc)), "prog.c:2:     buf[0] = 1;");
    }

    #[test]
    fn empty_for_missing_location() {
        assert_eq!(format(None), "");
    }

    #[test]
    fn empty_for_unreadable_file() {
        let loc = DebugLoc { dir: "/does/not/exist".into(), file: "nope.c".into(), line: 1 };
        assert_eq!(format(Some(&loc)), "");
    }

    #[test]
    fn empty_for_zero_line() {
        let loc = DebugLoc { dir: "/does/not/exist".into(), file: "nope.c".into(), line: 0 };
        assert_eq!(format(Some(&loc)), "");
    }
}
