//! # Selector Token Scanner
//!
//! Splits a selector into tokens one call at a time. Errors are tokens too
//! ([`TokenKind::TooLong`], [`TokenKind::QuoteErr`], [`TokenKind::BadToken`]);
//! the compiler decides what they mean.

/// Longest token the scanner accepts, in bytes.
pub const MAX_TOKEN_LEN: usize = 32_749;

const NAME: u8 = 1;
const SPACE: u8 = 2;

/// Byte classes: bit 0 is a name constituent, bit 1 is whitespace.
static CHAR_CLASS: [u8; 256] = build_char_class();

const fn build_char_class() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut b = 0usize;
    while b < 256 {
        let class = match b as u8 {
            b'\t' | b'\n' | 0x0C | b'\r' | b' ' => SPACE,
            b'$' | b'.' | b'_' => NAME,
            b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' => NAME,
            0x80..=0xBF | 0xC2..=0xFB => NAME,
            _ => 0,
        };
        table[b] = class;
        b += 1;
    }
    table
}

#[inline]
pub fn is_name_char(b: u8) -> bool {
    CHAR_CLASS[b as usize] & NAME != 0
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    CHAR_CLASS[b as usize] & SPACE != 0
}

/// Kind of a scanned token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input
    None,
    Name,
    String,
    Int,
    Long,
    Float,
    Double,
    /// `,`
    Group,
    /// `(`
    Begin,
    /// `)`
    End,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Minus,
    Plus,
    Multiply,
    Divide,
    Or,
    And,
    In,
    Is,
    Like,
    Between,
    True,
    False,
    Null,
    Not,
    Escape,
    /// `!`
    Exclam,
    /// `!!`
    NotNot,
    /// `@`
    InHash,
    /// `&`
    Amp,
    AclCheck,
    TooLong,
    QuoteErr,
    BadToken,
}

impl TokenKind {
    /// Whether the scanner rejected the input
    pub fn is_error(self) -> bool {
        matches!(self, Self::TooLong | Self::QuoteErr | Self::BadToken)
    }
}

/// One token and its text. String tokens hold the unquoted value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: &[u8]) -> Self {
        Self {
            kind,
            text: String::from_utf8_lossy(text).into_owned(),
        }
    }
}

/// Cursor over a selector string
#[derive(Clone, Debug)]
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Scan `selector`. A NUL byte ends the input.
    pub fn new(selector: &'a str) -> Self {
        let bytes = selector.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Self {
            input: &bytes[..end],
            pos: 0,
        }
    }

    /// Byte offset of the cursor
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Scan the next token, advancing the cursor past it.
    pub fn next_token(&mut self) -> Token {
        while self.peek_at(0).is_some_and(is_whitespace) {
            self.pos += 1;
        }
        let Some(first) = self.peek_at(0) else {
            return Token::new(TokenKind::None, b"");
        };

        if first == b'\'' {
            return self.quoted_string();
        }

        let (kind, width) = match (first, self.peek_at(1)) {
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'<', Some(b'>')) => (TokenKind::Ne, 2),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'=', _) => (TokenKind::Eq, 1),
            (b'(', _) => (TokenKind::Begin, 1),
            (b')', _) => (TokenKind::End, 1),
            (b',', _) => (TokenKind::Group, 1),
            (b'*', _) => (TokenKind::Multiply, 1),
            (b'/', _) => (TokenKind::Divide, 1),
            (b'!', Some(b'!')) => (TokenKind::NotNot, 2),
            (b'!', _) => (TokenKind::Exclam, 1),
            (b'@', _) => (TokenKind::InHash, 1),
            (b'&', _) => (TokenKind::Amp, 1),
            _ => (TokenKind::None, 0),
        };
        if width > 0 {
            let text = &self.input[self.pos..self.pos + width];
            self.pos += width;
            return Token::new(kind, text);
        }

        self.name_or_number()
    }

    fn quoted_string(&mut self) -> Token {
        let mut value = Vec::new();
        self.pos += 1;
        loop {
            match self.peek_at(0) {
                None => return Token::new(TokenKind::QuoteErr, &value),
                Some(b'\'') if self.peek_at(1) == Some(b'\'') => {
                    self.pos += 1;
                }
                Some(b'\'') => {
                    self.pos += 1;
                    return Token::new(TokenKind::String, &value);
                }
                Some(_) => {}
            }
            if value.len() >= MAX_TOKEN_LEN {
                return Token::new(TokenKind::TooLong, &value);
            }
            value.push(self.input[self.pos]);
            self.pos += 1;
        }
    }

    fn name_or_number(&mut self) -> Token {
        let start = self.pos;
        while self.peek_at(0).is_some_and(is_name_char) {
            if self.pos - start >= MAX_TOKEN_LEN {
                return Token::new(TokenKind::TooLong, &self.input[start..self.pos]);
            }
            self.pos += 1;
        }
        if self.pos == start {
            // Not a name constituent: consume it so the caller sees progress
            self.pos += 1;
            return Token::new(TokenKind::BadToken, &self.input[start..self.pos]);
        }

        let first = self.input[start];
        if first.is_ascii_digit() || first == b'.' {
            return self.number(start);
        }
        let text = &self.input[start..self.pos];
        Token::new(keyword(text).unwrap_or(TokenKind::Name), text)
    }

    fn number(&mut self, start: usize) -> Token {
        let text = &self.input[start..self.pos];
        let Ok(text_str) = std::str::from_utf8(text) else {
            return Token::new(TokenKind::BadToken, text);
        };

        if is_hex_literal(text_str) {
            let kind = match integer_value(text_str) {
                Some(v) if v <= i32::MAX as u64 => TokenKind::Int,
                Some(v) if v <= LONG_MAGNITUDE_MAX => TokenKind::Long,
                _ => TokenKind::BadToken,
            };
            return Token::new(kind, text);
        }

        let (value, rest) = split_integer(text_str);
        let (is_long, rest) = match rest.as_bytes().first() {
            Some(b'L' | b'l') => (true, &rest[1..]),
            _ => (false, rest),
        };

        if rest.starts_with(['E', 'e', '.', 'F', 'f']) {
            return self.floating(start);
        }
        if !rest.is_empty() {
            return Token::new(TokenKind::BadToken, text);
        }
        let kind = match value {
            Some(v) if v <= i32::MAX as u64 && !is_long => TokenKind::Int,
            Some(v) if v <= LONG_MAGNITUDE_MAX => TokenKind::Long,
            _ => TokenKind::BadToken,
        };
        Token::new(kind, text)
    }

    fn floating(&mut self, start: usize) -> Token {
        // A sign directly after a trailing exponent marker belongs to the number
        let ends_with_exponent = matches!(self.input[self.pos - 1], b'E' | b'e');
        if ends_with_exponent && matches!(self.peek_at(0), Some(b'+' | b'-')) {
            let mut end = self.pos + 1;
            while self.input.get(end).copied().is_some_and(is_name_char) {
                if end - start >= MAX_TOKEN_LEN {
                    return Token::new(TokenKind::TooLong, &self.input[start..end]);
                }
                end += 1;
            }
            let text = &self.input[start..end];
            let kind = float_kind(text);
            if kind != TokenKind::BadToken {
                self.pos = end;
            }
            return Token::new(kind, text);
        }
        let text = &self.input[start..self.pos];
        Token::new(float_kind(text), text)
    }
}

/// Largest magnitude of a long literal; the compiler may negate it.
const LONG_MAGNITUDE_MAX: u64 = i64::MAX as u64 + 1;

fn keyword(text: &[u8]) -> Option<TokenKind> {
    if !text[0].is_ascii_alphabetic() {
        return None;
    }
    let candidates: &[(&str, TokenKind)] = match text.len() {
        2 => &[("in", TokenKind::In), ("is", TokenKind::Is), ("or", TokenKind::Or)],
        3 => &[("and", TokenKind::And), ("not", TokenKind::Not)],
        4 => &[
            ("like", TokenKind::Like),
            ("null", TokenKind::Null),
            ("true", TokenKind::True),
        ],
        5 => &[("false", TokenKind::False)],
        6 => &[("escape", TokenKind::Escape)],
        7 => &[("between", TokenKind::Between)],
        8 => &[("aclcheck", TokenKind::AclCheck)],
        _ => &[],
    };
    candidates
        .iter()
        .find(|(word, _)| text.eq_ignore_ascii_case(word.as_bytes()))
        .map(|(_, kind)| *kind)
}

fn float_kind(text: &[u8]) -> TokenKind {
    let Ok(text) = std::str::from_utf8(text) else {
        return TokenKind::BadToken;
    };
    match text.strip_suffix(['f', 'F']) {
        Some(body) if body.parse::<f64>().is_ok() => TokenKind::Float,
        Some(_) => TokenKind::BadToken,
        None if text.parse::<f64>().is_ok() => TokenKind::Double,
        None => TokenKind::BadToken,
    }
}

fn is_hex_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() > 2 && bytes[0] == b'0' && matches!(bytes[1], b'x' | b'X')
}

/// Split the leading integer off `text`: hexadecimal after `0x`, octal
/// after a leading `0`, decimal otherwise. Returns `None` as the value on
/// overflow.
fn split_integer(text: &str) -> (Option<u64>, &str) {
    let (radix, digits_at) = if is_hex_literal(text) {
        (16, 2)
    } else if text.len() > 1 && text.starts_with('0') {
        (8, 1)
    } else {
        (10, 0)
    };
    let body = &text[digits_at..];
    let end = body
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(body.len());
    if end == 0 {
        // A lone leading zero is the number zero
        return if digits_at == 1 {
            (Some(0), body)
        } else {
            (None, body)
        };
    }
    let value = u64::from_str_radix(&body[..end], radix).ok();
    (value, &body[end..])
}

/// Value of an integer literal as scanned (`Int`/`Long` token text,
/// including any `L` suffix).
pub fn integer_value(text: &str) -> Option<u64> {
    let (value, rest) = split_integer(text);
    match rest {
        "" | "L" | "l" => value,
        _ => None,
    }
}

/// Value of a `Float` or `Double` token
pub fn floating_value(text: &str) -> Option<f64> {
    text.strip_suffix(['f', 'F']).unwrap_or(text).parse().ok()
}
