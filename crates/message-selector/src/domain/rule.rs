//! # Rule Records
//!
//! A compiled selector is a flat buffer of self-describing records:
//!
//! ```text
//! +---------+--------+------+-----------------------------+
//! | len u16 | opcode | kind | payload (len - 4 bytes)     |
//! +---------+--------+------+-----------------------------+
//! ```
//!
//! `len` is a multiple of 4 and includes the header. Multi-byte values are
//! little-endian. The buffer ends with an `End` record whose kind is 0.

use std::fmt;

use crate::error::SelectorError;

/// Largest rule buffer the compiler produces.
pub const MAX_RULE_LEN: usize = 64 * 1024;

/// Size of a record header.
pub const HEADER_LEN: usize = 4;

/// Flag on an `Is` record's kind that inverts the test.
pub const IS_NOT: u8 = 0x40;

/// Rule record opcodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Close of a parenthesis level (kind = level) or end of rule (kind = 0)
    End = 0,
    Begin = 1,
    /// kind = level
    And = 2,
    /// kind = level
    Or = 3,
    Not = 4,
    Negative = 5,
    /// kind = [`CompareOp`]
    Compare = 6,
    /// kind = ASCII operator
    Calc = 7,
    /// kind = [`IsTest`], optionally with [`IS_NOT`]
    Is = 8,
    /// kind = item count
    In = 9,
    Like = 10,
    /// kind = 2
    Between = 11,
    /// kind = 0 or 1
    Boolean = 12,
    Int = 13,
    Long = 14,
    Float = 15,
    Double = 16,
    String = 17,
    Var = 18,
    /// kind = index count
    ACLCheck = 20,
    InHash = 21,
    /// kind = compile options
    Internal = 22,
    Topic = 23,
    /// kind = topic level
    TopicPart = 24,
    QoS = 25,
    /// kind = value
    SmallInt = 26,
}

impl Opcode {
    /// Decode an opcode from a byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::End),
            1 => Some(Self::Begin),
            2 => Some(Self::And),
            3 => Some(Self::Or),
            4 => Some(Self::Not),
            5 => Some(Self::Negative),
            6 => Some(Self::Compare),
            7 => Some(Self::Calc),
            8 => Some(Self::Is),
            9 => Some(Self::In),
            10 => Some(Self::Like),
            11 => Some(Self::Between),
            12 => Some(Self::Boolean),
            13 => Some(Self::Int),
            14 => Some(Self::Long),
            15 => Some(Self::Float),
            16 => Some(Self::Double),
            17 => Some(Self::String),
            18 => Some(Self::Var),
            20 => Some(Self::ACLCheck),
            21 => Some(Self::InHash),
            22 => Some(Self::Internal),
            23 => Some(Self::Topic),
            24 => Some(Self::TopicPart),
            25 => Some(Self::QoS),
            26 => Some(Self::SmallInt),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::End => "End",
            Self::Begin => "Begin",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::Negative => "Negative",
            Self::Compare => "Compare",
            Self::Calc => "Calc",
            Self::Is => "Is",
            Self::In => "In",
            Self::Like => "Like",
            Self::Between => "Between",
            Self::Boolean => "Boolean",
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Var => "Var",
            Self::ACLCheck => "ACLCheck",
            Self::InHash => "InHash",
            Self::Internal => "Internal",
            Self::Topic => "Topic",
            Self::TopicPart => "TopicPart",
            Self::QoS => "QoS",
            Self::SmallInt => "SmallInt",
        }
    }
}

/// Comparison carried in a `Compare` record's kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Lt = 3,
    Ge = 4,
    Le = 5,
}

impl CompareOp {
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Eq),
            1 => Some(Self::Ne),
            2 => Some(Self::Gt),
            3 => Some(Self::Lt),
            4 => Some(Self::Ge),
            5 => Some(Self::Le),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// Ordering comparisons need ordered operands; `=` and `<>` do not.
    #[must_use]
    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

/// Test carried in an `Is` record's kind (without [`IS_NOT`])
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IsTest {
    True = 31,
    False = 32,
    Null = 33,
}

impl IsTest {
    /// Split an `Is` kind into its test and negation flag
    #[must_use]
    pub fn from_kind(kind: u8) -> Option<(Self, bool)> {
        let test = match kind & 0x3F {
            31 => Self::True,
            32 => Self::False,
            33 => Self::Null,
            _ => return None,
        };
        Some((test, kind & IS_NOT != 0))
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
        }
    }
}

/// Offset of a reserved record header, patched once its group is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch(usize);

/// Append-only writer of rule records
#[derive(Debug, Default)]
pub struct RuleBuilder {
    buf: Vec<u8>,
    previous: Option<Opcode>,
}

impl RuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opcode of the last record written, ignoring `End` records
    pub fn previous(&self) -> Option<Opcode> {
        self.previous
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn grow(&mut self, additional: usize) -> Result<(), SelectorError> {
        if self.buf.len() + additional > MAX_RULE_LEN {
            return Err(SelectorError::TooComplex);
        }
        self.buf
            .try_reserve(additional)
            .map_err(|_| SelectorError::AllocationFailed(self.buf.len() + additional))
    }

    /// Append a record. The payload is zero padded to a multiple of 4.
    pub fn put(&mut self, opcode: Opcode, kind: u8, payload: &[u8]) -> Result<(), SelectorError> {
        let len = padded(HEADER_LEN + payload.len());
        let len16 = u16::try_from(len).map_err(|_| SelectorError::StringTooComplex)?;
        self.grow(len)?;
        self.buf.extend_from_slice(&len16.to_le_bytes());
        self.buf.push(opcode as u8);
        self.buf.push(kind);
        self.buf.extend_from_slice(payload);
        self.buf.resize(self.buf.len() + (len - HEADER_LEN - payload.len()), 0);
        if opcode != Opcode::End {
            self.previous = Some(opcode);
        }
        Ok(())
    }

    /// Write a NUL terminated text record (`String` or `Var`)
    pub fn put_text(&mut self, opcode: Opcode, text: &str) -> Result<(), SelectorError> {
        let mut payload = Vec::with_capacity(text.len() + 1);
        payload.extend_from_slice(text.as_bytes());
        payload.push(0);
        self.put(opcode, 0, &payload)
    }

    /// Write a header whose length and kind are filled in by
    /// [`finish_group`](Self::finish_group).
    pub fn reserve(&mut self, opcode: Opcode) -> Result<Patch, SelectorError> {
        let at = self.buf.len();
        self.put(opcode, 0, &[])?;
        Ok(Patch(at))
    }

    /// Append raw group bytes after a reserved header
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), SelectorError> {
        self.grow(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Pad the group to a multiple of 4 and patch its header
    pub fn finish_group(&mut self, patch: Patch, kind: u8) -> Result<(), SelectorError> {
        let Patch(at) = patch;
        let pad = padded(self.buf.len()) - self.buf.len();
        self.grow(pad)?;
        self.buf.resize(self.buf.len() + pad, 0);
        let len = u16::try_from(self.buf.len() - at).map_err(|_| SelectorError::TooComplex)?;
        self.buf[at..at + 2].copy_from_slice(&len.to_le_bytes());
        self.buf[at + 3] = kind;
        Ok(())
    }

    pub fn finish(self) -> CompiledRule {
        CompiledRule {
            bytes: self.buf.into_boxed_slice(),
        }
    }
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// One decoded record borrowing its payload from the rule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleRecord<'a> {
    pub len: u16,
    pub opcode: Opcode,
    pub kind: u8,
    pub payload: &'a [u8],
}

impl<'a> RuleRecord<'a> {
    pub fn int_value(&self) -> Option<i32> {
        let bytes = self.payload.get(..4)?;
        Some(i32::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn long_value(&self) -> Option<i64> {
        let bytes = self.payload.get(..8)?;
        Some(i64::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn float_value(&self) -> Option<f32> {
        let bytes = self.payload.get(..4)?;
        Some(f32::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn double_value(&self) -> Option<f64> {
        let bytes = self.payload.get(..8)?;
        Some(f64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// NUL terminated text of a `String` or `Var` record
    pub fn text(&self) -> Option<&'a str> {
        let end = self.payload.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&self.payload[..end]).ok()
    }

    /// Members of an `In` group
    pub fn in_items(&self) -> GroupItems<'a> {
        GroupItems {
            rest: self.payload,
            remaining: self.kind,
        }
    }

    /// ACL name and topic level indexes of an `ACLCheck` record
    pub fn acl_check(&self) -> Option<(&'a str, &'a [u8])> {
        let name_len = usize::from(*self.payload.first()?);
        if name_len == 0 {
            return None;
        }
        let name = self.payload.get(1..name_len)?;
        let levels = self.payload.get(1 + name_len..1 + name_len + usize::from(self.kind))?;
        Some((std::str::from_utf8(name).ok()?, levels))
    }
}

/// Iterator over the length-prefixed members of an `In` record
#[derive(Clone, Debug)]
pub struct GroupItems<'a> {
    rest: &'a [u8],
    remaining: u8,
}

impl<'a> Iterator for GroupItems<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (&len, tail) = self.rest.split_first()?;
        let item = tail.get(..usize::from(len))?;
        self.rest = &tail[usize::from(len)..];
        self.remaining -= 1;
        Some(item)
    }
}

/// Decode the record at `offset`, returning it and the next offset.
pub(crate) fn read_record(bytes: &[u8], offset: usize) -> Result<(RuleRecord<'_>, usize), SelectorError> {
    let header = bytes
        .get(offset..offset + HEADER_LEN)
        .ok_or_else(|| SelectorError::InvalidRule(format!("truncated header at {offset}")))?;
    let len = u16::from_le_bytes([header[0], header[1]]);
    if len < HEADER_LEN as u16 || len % 4 != 0 {
        return Err(SelectorError::InvalidRule(format!(
            "record length {len} at {offset}"
        )));
    }
    let opcode = Opcode::from_byte(header[2]).ok_or_else(|| {
        SelectorError::InvalidRule(format!("unknown opcode {} at {offset}", header[2]))
    })?;
    let end = offset + usize::from(len);
    let payload = bytes
        .get(offset + HEADER_LEN..end)
        .ok_or_else(|| SelectorError::InvalidRule(format!("truncated record at {offset}")))?;
    let record = RuleRecord {
        len,
        opcode,
        kind: header[3],
        payload,
    };
    Ok((record, end))
}

/// An immutable compiled selector
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CompiledRule {
    bytes: Box<[u8]>,
}

impl CompiledRule {
    /// Adopt a raw rule buffer, checking that it is a well formed record
    /// sequence ending in the terminal `End` record.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SelectorError> {
        let mut offset = 0;
        loop {
            let (record, next) = read_record(&bytes, offset)?;
            if record.opcode == Opcode::End && record.kind == 0 {
                if next != bytes.len() {
                    return Err(SelectorError::InvalidRule(format!(
                        "{} bytes after the end record",
                        bytes.len() - next
                    )));
                }
                break;
            }
            offset = next;
        }
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate the records in order, up to and including the terminal `End`
    pub fn records(&self) -> Records<'_> {
        Records {
            bytes: &self.bytes,
            offset: 0,
            done: false,
        }
    }

    pub(crate) fn record_at(&self, offset: usize) -> Option<(RuleRecord<'_>, usize)> {
        read_record(&self.bytes, offset).ok()
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("len", &self.bytes.len())
            .field("bytes", &hex::encode(&self.bytes))
            .finish()
    }
}

impl AsRef<[u8]> for CompiledRule {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Iterator over the records of a [`CompiledRule`]
#[derive(Clone, Debug)]
pub struct Records<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = RuleRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_record(self.bytes, self.offset) {
            Ok((record, next)) => {
                self.offset = next;
                self.done = record.opcode == Opcode::End && record.kind == 0;
                Some(record)
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}
