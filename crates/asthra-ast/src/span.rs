//! Source location attached to every AST node.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A file/line/column location, shared cheaply across nodes from the same
/// file via `Arc<str>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Span {
            file: file.into(),
            line,
            column,
        }
    }

    /// A placeholder span for synthetic nodes (e.g. the `main` wrapper) that
    /// were not produced by a parser.
    pub fn synthetic() -> Self {
        Span::new("<synthetic>", 0, 0)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let s = Span::new("main.asthra", 10, 4);
        assert_eq!(format!("{}", s), "main.asthra:10:4");
    }

    #[test]
    fn synthetic_is_line_zero() {
        let s = Span::synthetic();
        assert_eq!(s.line, 0);
    }

    #[test]
    fn serde_roundtrip() {
        let s = Span::new("f.asthra", 1, 2);
        let json = serde_json::to_string(&s).unwrap();
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
