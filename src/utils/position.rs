//! Source location tracking

use std::fmt;

/// A location in the source text.
///
/// Rows and columns are 1-based; `offset` counts characters from the start
/// of the source. Row `0` marks a position that has no source counterpart
/// (nodes synthesized by the factory rather than the parser).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub row: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(row: usize, column: usize, offset: usize) -> Self {
        Self { row, column, offset }
    }

    /// The first character of a source text
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }

    /// A position with no source counterpart
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.row > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_position() {
        assert!(!Position::unknown().is_known());
        assert!(Position::start().is_known());
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(3, 7, 40).to_string(), "3:7");
    }
}
