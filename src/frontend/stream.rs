//! Character cursor over source text

use crate::utils::Position;

/// A cursor over raw source text that tracks row and column.
pub struct TextStream {
    chars: Vec<char>,
    ptr: usize,
    row: usize,
    column: usize,
}

impl TextStream {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            ptr: 0,
            row: 1,
            column: 1,
        }
    }

    /// Look `offset` characters ahead without advancing
    pub fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.ptr + offset).copied()
    }

    /// Consume one character
    pub fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.ptr).copied()?;
        self.ptr += 1;
        if c == '\n' {
            self.row += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume up to `count` characters
    pub fn skip(&mut self, count: usize) {
        for _ in 0..count {
            if self.next().is_none() {
                break;
            }
        }
    }

    /// Consume the next character if it satisfies `pred`
    pub fn consume(&mut self, pred: impl Fn(char) -> bool) -> bool {
        match self.peek(0) {
            Some(c) if pred(c) => {
                self.next();
                true
            }
            _ => false,
        }
    }

    /// Consume characters while they satisfy `pred`
    pub fn consume_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.consume(&pred) {}
    }

    /// Whether the text at the cursor starts with `text`
    pub fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c))
    }

    /// Characters in `start..end` (character offsets)
    pub fn sub(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }

    pub fn has_next(&self) -> bool {
        self.ptr < self.chars.len()
    }

    pub fn ptr(&self) -> usize {
        self.ptr
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn position(&self) -> Position {
        Position::new(self.row, self.column, self.ptr)
    }
}
