//! Lexer for Scuro
//!
//! Converts source code into a stream of tokens. Whitespace and comments are
//! never emitted on their own; they are attached as leading trivia to the
//! next significant token (the final `Eof` token carries any trailing trivia).

use crate::frontend::stream::TextStream;
use crate::frontend::token::{is_keyword, Token, TokenKind, SYMBOLS};
use crate::utils::{Error, Position, Result};

/// The lexer state
pub struct Lexer {
    stream: TextStream,
    /// Set once the `Eof` token has been produced
    finished: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            stream: TextStream::new(source),
            finished: false,
        }
    }

    /// Whether another token (including the final `Eof`) can be read
    pub fn has_next(&self) -> bool {
        !self.finished
    }

    /// Tokenize the entire input, ending with a single `Eof` token
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while self.has_next() {
            tokens.push(self.next_token()?);
        }
        log::debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }

    /// Read the next significant token together with its leading trivia
    pub fn next_token(&mut self) -> Result<Token> {
        let leading = self.read_trivia()?;
        let mut token = self.read_token()?;
        token.leading = leading;
        Ok(token)
    }

    // ==================== Trivia ====================

    fn read_trivia(&mut self) -> Result<Vec<Token>> {
        let mut trivia = Vec::new();
        loop {
            let start = self.stream.position();
            match self.stream.peek(0) {
                Some(c) if c.is_whitespace() => {
                    self.stream.consume_while(char::is_whitespace);
                    trivia.push(self.make_token(TokenKind::Whitespace, start));
                }
                Some('-') if self.stream.peek(1) == Some('-') => {
                    self.read_comment(start)?;
                    trivia.push(self.make_token(TokenKind::Comment, start));
                }
                Some('#') if self.stream.peek(1) == Some('!') && start.row == 1 => {
                    self.stream.consume_while(|c| c != '\n');
                    trivia.push(self.make_token(TokenKind::Comment, start));
                }
                _ => return Ok(trivia),
            }
        }
    }

    fn read_comment(&mut self, start: Position) -> Result<()> {
        self.stream.skip(2);
        match self.long_bracket_level() {
            Some(level) => {
                self.read_long_bracket(level, start)?;
            }
            None => self.stream.consume_while(|c| c != '\n'),
        }
        Ok(())
    }

    // ==================== Tokens ====================

    fn read_token(&mut self) -> Result<Token> {
        let start = self.stream.position();
        let c = match self.stream.peek(0) {
            Some(c) => c,
            None => {
                self.finished = true;
                return Ok(Token::eof(start));
            }
        };

        if c.is_alphabetic() || c == '_' {
            return Ok(self.read_identifier(start));
        }
        if c.is_ascii_digit() || (c == '.' && self.stream.peek(1).is_some_and(|n| n.is_ascii_digit())) {
            return self.read_number(start);
        }
        if c == '"' || c == '\'' {
            return self.read_string(c, start);
        }
        if let Some(level) = self.long_bracket_level() {
            let constant = self.read_long_bracket(level, start)?;
            return Ok(self.make_token(TokenKind::String(constant), start));
        }
        if let Some(symbol) = SYMBOLS.iter().find(|s| self.stream.starts_with(s)) {
            self.stream.skip(symbol.chars().count());
            return Ok(self.make_token(TokenKind::Symbol, start));
        }

        self.finished = true;
        Err(Error::lex(format!("unexpected symbol near `{}`", c), start))
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self, start: Position) -> Token {
        self.stream.consume_while(|c| c.is_alphanumeric() || c == '_');
        let mut token = self.make_token(TokenKind::Identifier, start);
        if is_keyword(&token.value) {
            token.kind = TokenKind::Keyword;
        }
        token
    }

    /// Read a decimal or hexadecimal number literal
    fn read_number(&mut self, start: Position) -> Result<Token> {
        let is_hex = self.stream.peek(0) == Some('0') && matches!(self.stream.peek(1), Some('x' | 'X'));
        if is_hex {
            self.stream.skip(2);
            self.stream.consume_while(|c| c.is_ascii_hexdigit());
            if self.stream.consume(|c| c == '.') {
                self.stream.consume_while(|c| c.is_ascii_hexdigit());
            }
            self.read_exponent(['p', 'P']);
        } else {
            self.stream.consume_while(|c| c.is_ascii_digit());
            if self.stream.consume(|c| c == '.') {
                self.stream.consume_while(|c| c.is_ascii_digit());
            }
            self.read_exponent(['e', 'E']);
        }

        // `3x` or `1.2.3` is a single malformed literal, not two tokens
        if self.stream.peek(0).is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            self.stream.consume_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
            self.finished = true;
            let text = self.stream.sub(start.offset, self.stream.ptr());
            return Err(Error::lex(format!("malformed number near `{}`", text), start));
        }

        let token = self.make_token(TokenKind::Number, start);
        if parse_number(&token.value).is_none() {
            self.finished = true;
            return Err(Error::lex(format!("malformed number near `{}`", token.value), start));
        }
        Ok(token)
    }

    fn read_exponent(&mut self, markers: [char; 2]) {
        if self.stream.consume(|c| markers.contains(&c)) {
            self.stream.consume(|c| c == '+' || c == '-');
            self.stream.consume_while(|c| c.is_ascii_digit());
        }
    }

    /// Read a quoted string, decoding escape sequences
    fn read_string(&mut self, quote: char, start: Position) -> Result<Token> {
        self.stream.next();
        let mut constant = String::new();
        loop {
            match self.stream.next() {
                None | Some('\n') => {
                    self.finished = true;
                    return Err(Error::lex("unfinished string", start));
                }
                Some(c) if c == quote => break,
                Some('\\') => constant.push(self.read_escape(start)?),
                Some(c) => constant.push(c),
            }
        }
        Ok(self.make_token(TokenKind::String(constant), start))
    }

    fn read_escape(&mut self, start: Position) -> Result<char> {
        let escaped = match self.stream.next() {
            Some('n') | Some('\n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('a') => '\x07',
            Some('b') => '\x08',
            Some('f') => '\x0c',
            Some('v') => '\x0b',
            Some(c @ ('\\' | '"' | '\'')) => c,
            Some('x') => {
                let digits: String = (0..2).filter_map(|_| self.take_if(|c| c.is_ascii_hexdigit())).collect();
                match u8::from_str_radix(&digits, 16) {
                    Ok(byte) if digits.len() == 2 => char::from(byte),
                    _ => return Err(self.escape_error("\\x", start)),
                }
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = d.to_string();
                while digits.len() < 3 {
                    match self.take_if(|c| c.is_ascii_digit()) {
                        Some(c) => digits.push(c),
                        None => break,
                    }
                }
                match digits.parse::<u8>() {
                    Ok(byte) => char::from(byte),
                    Err(_) => return Err(self.escape_error(&format!("\\{}", digits), start)),
                }
            }
            Some(c) => return Err(self.escape_error(&format!("\\{}", c), start)),
            None => {
                self.finished = true;
                return Err(Error::lex("unfinished string", start));
            }
        };
        Ok(escaped)
    }

    fn escape_error(&mut self, sequence: &str, start: Position) -> Error {
        self.finished = true;
        Error::lex(format!("invalid escape sequence `{}`", sequence), start)
    }

    fn take_if(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        let c = self.stream.peek(0)?;
        if self.stream.consume(pred) {
            Some(c)
        } else {
            None
        }
    }

    // ==================== Long brackets ====================

    /// If the cursor is at `[`, `[=`... `[`, return the number of `=` signs
    fn long_bracket_level(&self) -> Option<usize> {
        if self.stream.peek(0) != Some('[') {
            return None;
        }
        let mut level = 0;
        while self.stream.peek(level + 1) == Some('=') {
            level += 1;
        }
        (self.stream.peek(level + 1) == Some('[')).then_some(level)
    }

    fn at_long_bracket_close(&self, level: usize) -> bool {
        self.stream.peek(0) == Some(']')
            && (1..=level).all(|i| self.stream.peek(i) == Some('='))
            && self.stream.peek(level + 1) == Some(']')
    }

    /// Read a long bracket body starting at its opener and return its contents.
    ///
    /// Openers with the same level nest, so `[[ a [[ b ]] c ]]` is one string.
    fn read_long_bracket(&mut self, level: usize, start: Position) -> Result<String> {
        self.stream.skip(level + 2);
        if self.stream.starts_with("\r\n") {
            self.stream.skip(2);
        } else {
            self.stream.consume(|c| c == '\n');
        }

        let content_start = self.stream.ptr();
        let mut depth = 1;
        loop {
            if !self.stream.has_next() {
                self.finished = true;
                return Err(Error::lex(
                    format!("expected `]{}]` near <eof>", "=".repeat(level)),
                    start,
                ));
            }
            if self.at_long_bracket_close(level) {
                depth -= 1;
                if depth == 0 {
                    let content = self.stream.sub(content_start, self.stream.ptr());
                    self.stream.skip(level + 2);
                    return Ok(content);
                }
                self.stream.skip(level + 2);
            } else if self.long_bracket_level() == Some(level) {
                depth += 1;
                self.stream.skip(level + 2);
            } else {
                self.stream.next();
            }
        }
    }

    /// Create a token spanning from `start` to the cursor
    fn make_token(&self, kind: TokenKind, start: Position) -> Token {
        Token::new(kind, self.stream.sub(start.offset, self.stream.ptr()), start)
    }
}

impl Iterator for Lexer {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

/// Parse the text of a number literal.
///
/// Accepts decimal literals with optional fraction and `e` exponent, and
/// hexadecimal literals with optional fraction and binary `p` exponent.
/// Surrounding whitespace and a leading sign are allowed so `tonumber` can
/// share this routine.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => parse_hex(hex)?,
        None => parse_decimal(body)?,
    };
    Some(if negative { -value } else { value })
}

fn parse_decimal(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '.') {
        return None;
    }
    if !text.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
        return None;
    }
    text.parse::<f64>().ok()
}

fn parse_hex(text: &str) -> Option<f64> {
    let (mantissa_text, exponent_text) = match text.find(['p', 'P']) {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    };
    let (int_part, frac_part) = match mantissa_text.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (mantissa_text, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut mantissa = 0.0;
    for c in int_part.chars() {
        mantissa = mantissa * 16.0 + f64::from(c.to_digit(16)?);
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        mantissa += f64::from(c.to_digit(16)?) * scale;
        scale /= 16.0;
    }

    let exponent = match exponent_text {
        Some(exp) => {
            let digits = exp.trim_start_matches(['+', '-']);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            exp.parse::<i32>().ok()?
        }
        None => 0,
    };
    Some(mantissa * 2f64.powi(exponent))
}
