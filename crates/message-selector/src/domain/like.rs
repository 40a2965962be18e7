//! LIKE pattern encoding and matching
//!
//! A pattern is stored precompiled: `%` becomes [`ANY_RUN`], `_` becomes
//! [`ANY_CHAR`], and literal text is written as runs of a length byte
//! followed by the bytes. A NUL byte ends the pattern.

/// Marker for `%`: any run of characters, possibly empty.
pub const ANY_RUN: u8 = 0xFF;

/// Marker for `_`: exactly one UTF-8 character.
pub const ANY_CHAR: u8 = 0xFE;

/// A literal run starts a new length byte once it holds more than this.
const MAX_RUN: u8 = 100;

/// Space reserved for the encoding of `pattern`, including the terminator.
pub fn match_len(pattern: &str) -> usize {
    let wildcards = pattern.bytes().filter(|&b| b == b'%' || b == b'_').count();
    let len = pattern.len() + 2 + wildcards;
    len + len / 100
}

/// Encode `pattern`, treating the byte after `escape` as a literal.
///
/// The result is exactly [`match_len`] bytes long, zero filled past the
/// terminator.
pub fn convert_match(pattern: &str, escape: Option<u8>) -> Vec<u8> {
    let capacity = match_len(pattern);
    let mut out = Vec::with_capacity(capacity);
    let mut run_start: Option<usize> = None;
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let mut ch = bytes[i];
        let mut marker = None;
        if Some(ch) == escape {
            if let Some(&next) = bytes.get(i + 1) {
                i += 1;
                ch = next;
            }
        } else if ch == b'%' {
            marker = Some(ANY_RUN);
        } else if ch == b'_' {
            marker = Some(ANY_CHAR);
        }

        match marker {
            Some(marker) => {
                out.push(marker);
                run_start = None;
            }
            None => {
                let start = match run_start {
                    Some(start) if out[start] <= MAX_RUN => start,
                    _ => {
                        out.push(0);
                        out.len() - 1
                    }
                };
                out.push(ch);
                out[start] += 1;
                run_start = Some(start);
            }
        }
        i += 1;
    }
    out.push(0);
    debug_assert!(out.len() <= capacity);
    out.resize(capacity.max(out.len()), 0);
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Item<'a> {
    AnyRun,
    AnyChar,
    Literal(&'a [u8]),
}

fn items(encoded: &[u8]) -> Vec<Item<'_>> {
    let mut out = Vec::new();
    let mut i = 0;
    while let Some(&b) = encoded.get(i) {
        match b {
            0 => break,
            ANY_RUN => {
                out.push(Item::AnyRun);
                i += 1;
            }
            ANY_CHAR => {
                out.push(Item::AnyChar);
                i += 1;
            }
            len => {
                let end = (i + 1 + usize::from(len)).min(encoded.len());
                out.push(Item::Literal(&encoded[i + 1..end]));
                i = end;
            }
        }
    }
    out
}

/// Bytes in the UTF-8 character starting with `lead`
fn char_width(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

/// Whether `value` matches the encoded pattern
pub fn like_match(value: &[u8], encoded: &[u8]) -> bool {
    let items = items(encoded);
    let (mut p, mut s) = (0usize, 0usize);
    // Item after the last `%` and where the value resumes if we backtrack
    let mut backtrack: Option<(usize, usize)> = None;

    while s < value.len() {
        match items.get(p) {
            Some(Item::AnyRun) => {
                p += 1;
                backtrack = Some((p, s));
            }
            Some(Item::AnyChar) => {
                s = (s + char_width(value[s])).min(value.len());
                p += 1;
            }
            Some(Item::Literal(lit)) if value[s..].starts_with(lit) => {
                s += lit.len();
                p += 1;
            }
            _ => match backtrack {
                Some((resume_p, resume_s)) => {
                    let next = (resume_s + char_width(value[resume_s])).min(value.len());
                    backtrack = Some((resume_p, next));
                    p = resume_p;
                    s = next;
                }
                None => return false,
            },
        }
    }
    items[p.min(items.len())..]
        .iter()
        .all(|item| *item == Item::AnyRun)
}

/// Render an encoded pattern back to LIKE syntax. Literal `%`, `_` and
/// `escape` characters are prefixed with `escape`; the flag reports whether
/// that happened.
pub fn match_to_string(encoded: &[u8], escape: char) -> (String, bool) {
    let mut out = String::new();
    let mut escaped = false;
    for item in items(encoded) {
        match item {
            Item::AnyRun => out.push('%'),
            Item::AnyChar => out.push('_'),
            Item::Literal(lit) => {
                for ch in String::from_utf8_lossy(lit).chars() {
                    if ch == '%' || ch == '_' || ch == escape {
                        out.push(escape);
                        escaped = true;
                    }
                    out.push(ch);
                }
            }
        }
    }
    (out, escaped)
}
