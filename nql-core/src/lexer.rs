//! A small hand-rolled scanner shared by the predicate grammar and the nQL
//! top-level grammar.
//!
//! Regex literals in `=~`/`!~` position are a bare run of non-whitespace
//! characters rather than a conventional token (they can contain `[`, `+`,
//! `(` and other characters that would otherwise be symbols), so this isn't
//! a conventional two-phase lex-then-parse pipeline: the scanner exposes
//! cursor-based `take_*` methods and the grammar decides, token by token,
//! which one applies next.

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    RegexMatch,
    RegexNotMatch,
    In,
    Contains,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::RegexMatch => "=~",
            Op::RegexNotMatch => "!~",
            Op::In => "in",
            Op::Contains => "contains",
        }
    }
}

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner { src, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn eof(&self) -> bool {
        self.skip_ws_peek() >= self.src.len()
    }

    fn skip_ws_peek(&self) -> usize {
        let mut p = self.pos;
        let bytes = self.src.as_bytes();
        while p < bytes.len() && (bytes[p] as char).is_whitespace() {
            p += 1;
        }
        p
    }

    pub fn skip_ws(&mut self) {
        self.pos = self.skip_ws_peek();
    }

    /// Peek the next identifier-like word (keyword or field path) without consuming it.
    pub fn peek_ident(&self) -> Option<&'a str> {
        let start = self.skip_ws_peek();
        let rest = &self.src[start..];
        let mut chars = rest.char_indices();
        let (_, first) = chars.next()?;
        if !is_ident_start(first) {
            return None;
        }
        let mut end = rest.len();
        for (i, c) in chars {
            if !is_ident_continue(c) {
                end = i;
                break;
            }
        }
        Some(&rest[..end])
    }

    /// Consume an identifier/field-path token.
    pub fn take_ident(&mut self) -> Option<String> {
        let word = self.peek_ident()?;
        self.pos = self.skip_ws_peek() + word.len();
        Some(word.to_string())
    }

    /// Consume an identifier only if it case-insensitively equals `kw`.
    pub fn take_keyword(&mut self, kw: &str) -> bool {
        if let Some(word) = self.peek_ident() {
            if word.eq_ignore_ascii_case(kw) {
                self.pos = self.skip_ws_peek() + word.len();
                return true;
            }
        }
        false
    }

    pub fn expect_keyword(&mut self, kw: &str) -> Result<(), EngineError> {
        if self.take_keyword(kw) {
            Ok(())
        } else {
            Err(EngineError::Parse(format!("expected '{}'", kw.to_lowercase())))
        }
    }

    /// Consume a numeric literal (optionally signed, optionally containing one '.').
    pub fn take_number(&mut self) -> Option<String> {
        let start = self.skip_ws_peek();
        let rest = &self.src[start..];
        let mut end = 0usize;
        let bytes: Vec<char> = rest.chars().collect();
        let mut i = 0usize;
        if i < bytes.len() && bytes[i] == '-' {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return None;
        }
        if i < bytes.len() && bytes[i] == '.' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                i = j;
            }
        }
        end = bytes[..i].iter().collect::<String>().len();
        if end == 0 {
            return None;
        }
        let text = &rest[..end];
        self.pos = start + end;
        Some(text.to_string())
    }

    /// Consume a double-quoted string literal, processing `\\`, `\"`, `\n`, `\t` escapes.
    pub fn take_string(&mut self) -> Result<Option<String>, EngineError> {
        let start = self.skip_ws_peek();
        if self.src.as_bytes().get(start) != Some(&b'"') {
            return Ok(None);
        }
        let mut out = String::new();
        let mut chars = self.src[start + 1..].char_indices();
        loop {
            match chars.next() {
                None => return Err(EngineError::Parse("unterminated string literal".into())),
                Some((i, '"')) => {
                    self.pos = start + 1 + i + 1;
                    return Ok(Some(out));
                }
                Some((_, '\\')) => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, '"')) => out.push('"'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, other)) => out.push(other),
                    None => return Err(EngineError::Parse("unterminated escape in string".into())),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    /// Consume a bare run of non-whitespace characters (used for regex literals).
    pub fn take_raw_token(&mut self) -> Option<String> {
        let start = self.skip_ws_peek();
        let rest = &self.src[start..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        self.pos = start + end;
        Some(rest[..end].to_string())
    }

    pub fn take_char(&mut self, c: char) -> bool {
        let start = self.skip_ws_peek();
        if self.src[start..].starts_with(c) {
            self.pos = start + c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume a predicate comparison operator.
    pub fn take_op(&mut self) -> Option<Op> {
        let start = self.skip_ws_peek();
        let rest = &self.src[start..];
        let (op, len) = if rest.starts_with("==") {
            (Op::Eq, 2)
        } else if rest.starts_with("!=") {
            (Op::Ne, 2)
        } else if rest.starts_with("<=") {
            (Op::Le, 2)
        } else if rest.starts_with(">=") {
            (Op::Ge, 2)
        } else if rest.starts_with("=~") {
            (Op::RegexMatch, 2)
        } else if rest.starts_with("!~") {
            (Op::RegexNotMatch, 2)
        } else if rest.starts_with('<') {
            (Op::Lt, 1)
        } else if rest.starts_with('>') {
            (Op::Gt, 1)
        } else if self.peek_ident().map(|w| w.eq_ignore_ascii_case("in")) == Some(true) {
            self.pos = start + 2;
            return Some(Op::In);
        } else if self.peek_ident().map(|w| w.eq_ignore_ascii_case("contains")) == Some(true) {
            self.pos = start + 8;
            return Some(Op::Contains);
        } else {
            return None;
        };
        self.pos = start + len;
        Some(op)
    }

    /// True if, skipping whitespace, the given literal text is next (used for `|`, `(`, etc.).
    pub fn at(&self, s: &str) -> bool {
        self.rest_from_ws().starts_with(s)
    }

    fn rest_from_ws(&self) -> &'a str {
        &self.src[self.skip_ws_peek()..]
    }

    pub fn rest_trimmed(&self) -> &'a str {
        self.rest_from_ws()
    }
}
