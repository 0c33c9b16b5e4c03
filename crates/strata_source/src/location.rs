//! Human-readable file locations for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A position in a file, for display to users.
///
/// Line and column are 1-indexed and optional: build-level problems (a
/// failed compile batch, a removed file) only name the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The filesystem path of the file.
    pub path: PathBuf,
    /// The line number (1-indexed), if known.
    pub line: Option<u32>,
    /// The column number (1-indexed), if known.
    pub col: Option<u32>,
}

impl Location {
    /// A location naming a whole file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            line: None,
            col: None,
        }
    }

    /// A location at a specific line of a file.
    pub fn line(path: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            path: path.into(),
            line: Some(line),
            col: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(col) = self.col {
                write!(f, ":{col}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_file_only() {
        assert_eq!(format!("{}", Location::file("a/B.sc")), "a/B.sc");
    }

    #[test]
    fn display_line_and_col() {
        let loc = Location {
            path: PathBuf::from("src/Top.sc"),
            line: Some(10),
            col: Some(5),
        };
        assert_eq!(format!("{loc}"), "src/Top.sc:10:5");
        assert_eq!(format!("{}", Location::line("x.sc", 3)), "x.sc:3");
    }

    #[test]
    fn serde_roundtrip() {
        let loc = Location::line("a/B.sc", 4);
        let json = serde_json::to_string(&loc).unwrap();
        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, back);
    }
}
