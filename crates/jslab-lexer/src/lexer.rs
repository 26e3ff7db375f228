//! Core JSLab lexer: converts source text to a token stream.
//!
//! Features:
//! - Identifiers, keywords, decimal/hex/binary/octal numbers
//! - Single- and double-quoted strings with the usual escapes
//! - Template literals with `${expr}` substitutions via a mode stack
//! - `//` and `/* */` comments stripped
//! - A `newline_before` flag on every token for automatic semicolon insertion
//! - Error recovery: collects up to 20 errors instead of stopping at the first

use jslab_types::{CompileErrors, ErrorCode, JslabError, SourceFile, Span};

use crate::token::{Token, TokenKind};

/// Lexer mode. Tracks whether we are inside a template substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside `${...}`. The brace depth tells us which `}` closes it.
    Substitution { brace_depth: u32 },
}

/// The JSLab lexer.
pub struct Lexer<'src> {
    source: &'src str,
    source_file: &'src SourceFile,
    file_name: &'src str,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based, in characters).
    col: u32,
    errors: CompileErrors,
    mode_stack: Vec<Mode>,
    /// A line terminator was skipped since the last token.
    saw_newline: bool,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: &source_file.source,
            source_file,
            file_name: &source_file.name,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
            mode_stack: vec![Mode::Normal],
            saw_newline: false,
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            if self.errors.total_errors >= jslab_types::MAX_ERRORS {
                break;
            }
            self.skip_trivia();
            let mut token = self.scan_token();
            token.newline_before = std::mem::take(&mut self.saw_newline);
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(start_line, start_col, self.line, self.col)
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = JslabError::new(self.file_name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.saw_newline = true;
                    self.advance();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.advance();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            self.saw_newline = true;
                        }
                        if c == '*' && self.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        let span = self.span_from(line, col);
                        self.emit_error(
                            ErrorCode::UNCLOSED_DELIMITER,
                            "unterminated block comment",
                            span,
                        );
                    }
                }
                _ => break,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        let (line, col) = (self.line, self.col);
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        let kind = match ch {
            '{' => {
                if let Some(Mode::Substitution { brace_depth }) = self.mode_stack.last_mut() {
                    *brace_depth += 1;
                }
                TokenKind::LBrace
            }
            '}' => match self.mode_stack.last().copied() {
                Some(Mode::Substitution { brace_depth: 0 }) => {
                    self.mode_stack.pop();
                    return self.scan_template(line, col, false);
                }
                Some(Mode::Substitution { .. }) => {
                    if let Some(Mode::Substitution { brace_depth }) = self.mode_stack.last_mut() {
                        *brace_depth -= 1;
                    }
                    TokenKind::RBrace
                }
                _ => TokenKind::RBrace,
            },
            '`' => return self.scan_template(line, col, true),
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,
            '.' => {
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return self.scan_number(line, col, ch);
                }
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    if self.eat('=') {
                        TokenKind::QuestionQuestionEq
                    } else {
                        TokenKind::QuestionQuestion
                    }
                } else if self.peek() == Some('.')
                    && !self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                {
                    self.advance();
                    TokenKind::QuestionDot
                } else {
                    TokenKind::Question
                }
            }
            '=' => {
                if self.eat('>') {
                    TokenKind::Arrow
                } else if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::NotEqEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') {
                        TokenKind::StarStarEq
                    } else {
                        TokenKind::StarStar
                    }
                } else if self.eat('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            '<' => {
                if self.eat('<') {
                    if self.eat('=') {
                        TokenKind::ShlEq
                    } else {
                        TokenKind::Shl
                    }
                } else if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        if self.eat('=') {
                            TokenKind::UShrEq
                        } else {
                            TokenKind::UShr
                        }
                    } else if self.eat('=') {
                        TokenKind::ShrEq
                    } else {
                        TokenKind::Shr
                    }
                } else if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    if self.eat('=') {
                        TokenKind::AmpAmpEq
                    } else {
                        TokenKind::AmpAmp
                    }
                } else if self.eat('=') {
                    TokenKind::AmpEq
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    if self.eat('=') {
                        TokenKind::PipePipeEq
                    } else {
                        TokenKind::PipePipe
                    }
                } else if self.eat('=') {
                    TokenKind::PipeEq
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => {
                if self.eat('=') {
                    TokenKind::CaretEq
                } else {
                    TokenKind::Caret
                }
            }
            '"' | '\'' => return self.scan_string(line, col, ch),
            c if c.is_ascii_digit() => return self.scan_number(line, col, c),
            c if is_ident_start(c) => return self.scan_identifier(line, col, c),
            other => {
                let span = self.span_from(line, col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_CHARACTER,
                    format!("unexpected character '{other}'"),
                    span,
                );
                self.skip_trivia();
                return self.scan_token();
            }
        };

        Token::new(kind, self.span_from(line, col))
    }

    fn scan_identifier(&mut self, line: u32, col: u32, first: char) -> Token {
        let mut word = String::from(first);
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier(word));
        Token::new(kind, self.span_from(line, col))
    }

    fn scan_number(&mut self, line: u32, col: u32, first: char) -> Token {
        let start = self.pos - first.len_utf8();

        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('b' | 'B') => Some(2),
                Some('o' | 'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let digits_start = self.pos;
                while self.peek().is_some_and(|c| c.is_digit(radix)) {
                    self.advance();
                }
                let digits = &self.source[digits_start..self.pos];
                let value = u64::from_str_radix(digits, radix).map(|v| v as f64);
                let span = self.span_from(line, col);
                return match value {
                    Ok(v) if !self.peek().is_some_and(is_ident_part) => {
                        Token::new(TokenKind::Number(v), span)
                    }
                    _ => {
                        self.emit_error(ErrorCode::INVALID_NUMBER, "invalid number literal", span);
                        Token::new(TokenKind::Number(f64::NAN), span)
                    }
                };
            }
        }

        if first != '.' {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            if self.peek() == Some('.') {
                self.advance();
            }
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let has_sign = matches!(sign, Some('+' | '-'));
            let digit_at = if has_sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                if has_sign {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.source[start..self.pos];
        let span = self.span_from(line, col);
        if self.peek().is_some_and(is_ident_start) {
            self.emit_error(
                ErrorCode::INVALID_NUMBER,
                "identifier starts immediately after numeric literal",
                span,
            );
        }
        match text.parse::<f64>() {
            Ok(v) => Token::new(TokenKind::Number(v), span),
            Err(_) => {
                self.emit_error(
                    ErrorCode::INVALID_NUMBER,
                    format!("invalid number literal '{text}'"),
                    span,
                );
                Token::new(TokenKind::Number(f64::NAN), span)
            }
        }
    }

    fn scan_string(&mut self, line: u32, col: u32, quote: char) -> Token {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    let span = self.span_from(line, col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                    );
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(c) = self.scan_escape() {
                        value.push(c);
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Token::new(TokenKind::String(value), self.span_from(line, col))
    }

    /// Scan template text up to the closing backtick or the next `${`.
    ///
    /// `opening` is true when the template starts at a backtick, false when
    /// it resumes after a substitution's closing brace.
    fn scan_template(&mut self, line: u32, col: u32, opening: bool) -> Token {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(line, col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated template literal",
                        span,
                    );
                    let kind = if opening {
                        TokenKind::Template(value)
                    } else {
                        TokenKind::TemplateTail(value)
                    };
                    return Token::new(kind, span);
                }
                Some('`') => {
                    self.advance();
                    let kind = if opening {
                        TokenKind::Template(value)
                    } else {
                        TokenKind::TemplateTail(value)
                    };
                    return Token::new(kind, self.span_from(line, col));
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.advance();
                    self.advance();
                    self.mode_stack.push(Mode::Substitution { brace_depth: 0 });
                    let kind = if opening {
                        TokenKind::TemplateHead(value)
                    } else {
                        TokenKind::TemplateMiddle(value)
                    };
                    return Token::new(kind, self.span_from(line, col));
                }
                Some('\\') => {
                    self.advance();
                    if let Some(c) = self.scan_escape() {
                        value.push(c);
                    }
                }
                Some('\r') => {
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Scan the character(s) after a backslash. Returns `None` for a line
    /// continuation.
    fn scan_escape(&mut self) -> Option<char> {
        let (line, col) = (self.line, self.col);
        let c = self.advance()?;
        let ch = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !self.peek().is_some_and(|d| d.is_ascii_digit()) => '\0',
            '\n' => return None,
            'x' => return self.scan_hex_escape(line, col, 2),
            'u' => {
                if self.eat('{') {
                    let start = self.pos;
                    while self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.advance();
                    }
                    let digits = &self.source[start..self.pos];
                    let code = u32::from_str_radix(digits, 16).ok();
                    if !self.eat('}') || code.is_none() {
                        let span = self.span_from(line, col);
                        self.emit_error(ErrorCode::INVALID_ESCAPE, "invalid unicode escape", span);
                        return None;
                    }
                    return code.and_then(char::from_u32).or(Some('\u{fffd}'));
                }
                return self.scan_hex_escape(line, col, 4);
            }
            other => other,
        };
        Some(ch)
    }

    fn scan_hex_escape(&mut self, line: u32, col: u32, len: usize) -> Option<char> {
        let start = self.pos;
        for _ in 0..len {
            if self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                self.advance();
            } else {
                let span = self.span_from(line, col);
                self.emit_error(ErrorCode::INVALID_ESCAPE, "invalid hexadecimal escape", span);
                return None;
            }
        }
        let code = u32::from_str_radix(&self.source[start..self.pos], 16).ok()?;
        Some(char::from_u32(code).unwrap_or('\u{fffd}'))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_alphabetic())
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || (!c.is_ascii() && c.is_alphanumeric())
}
