//! Token definitions for Scuro

use crate::utils::Position;

/// Reserved words of the language
pub const KEYWORDS: &[&str] = &[
    "and", "break", "continue", "do", "else", "elseif", "end", "false", "for", "function", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Operator and punctuation symbols, longest first so the lexer can match greedily
pub const SYMBOLS: &[&str] = &[
    "...", "..=", "==", "~=", "<=", ">=", "..", "::", "+=", "-=", "*=", "/=", "%=", "^=", "+", "-",
    "*", "/", "%", "^", "#", "<", ">", "=", "(", ")", "{", "}", "[", "]", ";", ":", ",", ".",
];

/// Binding power of unary operators
pub const UNARY_PRIORITY: u8 = 8;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The exact source text of the token
    pub value: String,
    pub position: Position,
    /// Whitespace and comments preceding this token
    pub leading: Vec<Token>,
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Whitespace,
    /// Line, block or shebang comment
    Comment,
    /// String literal carrying its decoded contents
    String(String),
    Number,
    Keyword,
    Identifier,
    Symbol,
    Eof,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            value: value.into(),
            position,
            leading: Vec::new(),
        }
    }

    pub fn eof(position: Position) -> Self {
        Self::new(TokenKind::Eof, "", position)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == word
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.value == symbol
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Text used in diagnostics
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "<eof>".to_string(),
            _ => self.value.clone(),
        }
    }

    /// Left and right binding power of a binary operator.
    /// Returns None if the token is not a binary operator.
    pub fn binary_precedence(&self) -> Option<(u8, u8)> {
        match (&self.kind, self.value.as_str()) {
            (TokenKind::Keyword, "or") => Some((1, 1)),
            (TokenKind::Keyword, "and") => Some((2, 2)),
            (TokenKind::Symbol, "<" | ">" | "<=" | ">=" | "~=" | "==") => Some((3, 3)),
            // Right associative
            (TokenKind::Symbol, "..") => Some((5, 4)),
            (TokenKind::Symbol, "+" | "-") => Some((6, 6)),
            (TokenKind::Symbol, "*" | "/" | "%") => Some((7, 7)),
            // Right associative, binds tighter than unary operators
            (TokenKind::Symbol, "^") => Some((10, 9)),
            _ => None,
        }
    }

    pub fn is_unary_operator(&self) -> bool {
        self.is_keyword("not") || self.is_symbol("-") || self.is_symbol("#")
    }

    pub fn is_assignment_operator(&self) -> bool {
        self.kind == TokenKind::Symbol
            && matches!(
                self.value.as_str(),
                "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "^=" | "..="
            )
    }

    /// Source text of the token including its leading trivia
    pub fn full_text(&self) -> String {
        let mut text: String = self.leading.iter().map(|t| t.value.as_str()).collect();
        text.push_str(&self.value);
        text
    }
}

/// Check if a word is reserved
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}
