//! # Rule Evaluation
//!
//! Runs the records of a [`CompiledRule`] over a value stack. Results use
//! three-valued logic: any comparison involving a missing property or
//! mismatched types is unknown, and an unknown result does not select.
//!
//! `And`/`Or` records short-circuit by skipping forward to the end of
//! their level, leaving the deciding value on the stack.

use serde::{Deserialize, Serialize};

use super::like::like_match;
use super::rule::{CompareOp, CompiledRule, IsTest, Opcode, RuleRecord};
use crate::ports::outbound::PropertySource;

/// A property or intermediate value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    // Ahead of Float so untagged JSON numbers keep double precision
    Double(f64),
    Float(f32),
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
        }
    }

    /// Numeric promotion rank: int < long < float < double
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Int(_) => Some(0),
            Self::Long(_) => Some(1),
            Self::Float(_) => Some(2),
            Self::Double(_) => Some(3),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(i64::from(v)),
            Self::Long(v) => Some(v),
            _ => None,
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Int(v) => Some(v as f32),
            Self::Long(v) => Some(v as f32),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(f64::from(v)),
            Self::Long(v) => Some(v as f64),
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Outcome of evaluating a rule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    True,
    False,
    Unknown,
}

impl Selection {
    /// Only a true result selects the message
    #[must_use]
    pub fn is_match(self) -> bool {
        self == Self::True
    }

    fn into_value(self) -> Value {
        match self {
            Self::True => Value::Boolean(true),
            Self::False => Value::Boolean(false),
            Self::Unknown => Value::Null,
        }
    }
}

impl From<bool> for Selection {
    fn from(v: bool) -> Self {
        if v {
            Self::True
        } else {
            Self::False
        }
    }
}

/// Operands brought to a common type
enum Promoted<'a> {
    Long(i64, i64),
    Float(f32, f32),
    Double(f64, f64),
    Str(&'a str, &'a str),
    Bool(bool, bool),
}

fn promote<'a>(left: &'a Value, right: &'a Value) -> Option<Promoted<'a>> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => return Some(Promoted::Str(l, r)),
        (Value::Boolean(l), Value::Boolean(r)) => return Some(Promoted::Bool(*l, *r)),
        _ => {}
    }
    Some(match left.rank()?.max(right.rank()?) {
        0 | 1 => Promoted::Long(left.as_i64()?, right.as_i64()?),
        2 => Promoted::Float(left.as_f32()?, right.as_f32()?),
        _ => Promoted::Double(left.as_f64()?, right.as_f64()?),
    })
}

fn ordered<T: PartialOrd + ?Sized>(op: CompareOp, l: &T, r: &T) -> bool {
    match op {
        CompareOp::Eq => l == r,
        CompareOp::Ne => l != r,
        CompareOp::Gt => l > r,
        CompareOp::Lt => l < r,
        CompareOp::Ge => l >= r,
        CompareOp::Le => l <= r,
    }
}

fn compare(left: &Value, right: &Value, op: Option<CompareOp>) -> Selection {
    let Some(op) = op else {
        return Selection::Unknown;
    };
    match promote(left, right) {
        Some(Promoted::Long(l, r)) => ordered(op, &l, &r).into(),
        Some(Promoted::Float(l, r)) => ordered(op, &l, &r).into(),
        Some(Promoted::Double(l, r)) => ordered(op, &l, &r).into(),
        Some(Promoted::Str(l, r)) => ordered(op, l.as_bytes(), r.as_bytes()).into(),
        Some(Promoted::Bool(l, r)) if !op.is_ordering() => ordered(op, &l, &r).into(),
        _ => Selection::Unknown,
    }
}

fn calc(left: &Value, right: &Value, op: u8) -> Value {
    // Int stays int; anything else follows the comparison promotion
    if let (Value::Int(l), Value::Int(r)) = (left, right) {
        return match op {
            b'+' => Value::Int(l.wrapping_add(*r)),
            b'-' => Value::Int(l.wrapping_sub(*r)),
            b'*' => Value::Int(l.wrapping_mul(*r)),
            b'/' if *r != 0 => Value::Int(l.wrapping_div(*r)),
            _ => Value::Null,
        };
    }
    match promote(left, right) {
        Some(Promoted::Long(l, r)) => match op {
            b'+' => Value::Long(l.wrapping_add(r)),
            b'-' => Value::Long(l.wrapping_sub(r)),
            b'*' => Value::Long(l.wrapping_mul(r)),
            b'/' if r != 0 => Value::Long(l.wrapping_div(r)),
            _ => Value::Null,
        },
        Some(Promoted::Float(l, r)) => match op {
            b'+' => Value::Float(l + r),
            b'-' => Value::Float(l - r),
            b'*' => Value::Float(l * r),
            b'/' => Value::Float(l / r),
            _ => Value::Null,
        },
        Some(Promoted::Double(l, r)) => match op {
            b'+' => Value::Double(l + r),
            b'-' => Value::Double(l - r),
            b'*' => Value::Double(l * r),
            b'/' => Value::Double(l / r),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

fn negate(value: &Value) -> Value {
    match *value {
        Value::Int(v) => Value::Int(v.wrapping_neg()),
        Value::Long(v) => Value::Long(v.wrapping_neg()),
        Value::Float(v) => Value::Float(-v),
        Value::Double(v) => Value::Double(-v),
        _ => Value::Null,
    }
}

fn is_test(value: &Value, kind: u8) -> Value {
    let Some((test, negated)) = IsTest::from_kind(kind) else {
        return Value::Null;
    };
    let result = match test {
        IsTest::Null => match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        },
        IsTest::True => *value == Value::Boolean(true),
        IsTest::False => *value == Value::Boolean(false),
    };
    Value::Boolean(result != negated)
}

/// Segment `n` of a `/` separated topic; Null when the topic ends first
fn topic_part(topic: Option<&str>, n: u8) -> Value {
    let Some(topic) = topic else {
        return Value::Null;
    };
    let bytes = topic.as_bytes();
    let (mut at, mut found) = (0, 0);
    while at < bytes.len() && found < n {
        if bytes[at] == b'/' {
            found += 1;
        }
        at += 1;
    }
    if at >= bytes.len() {
        return Value::Null;
    }
    let rest = &topic[at..];
    let end = rest.find('/').unwrap_or(rest.len());
    Value::String(rest[..end].to_string())
}

/// Join the selected topic levels and ask the source for ACL membership
fn acl_check<S: PropertySource + ?Sized>(value: &Value, record: &RuleRecord<'_>, source: &S) -> Value {
    let (Value::String(topic), Some((acl, levels))) = (value, record.acl_check()) else {
        return Value::Null;
    };
    let segments: Vec<&str> = topic.split('/').collect();
    let mut key = String::with_capacity(topic.len());
    for (i, &level) in levels.iter().enumerate() {
        let Some(segment) = segments.get(usize::from(level)) else {
            return Value::Null;
        };
        if i > 0 {
            key.push('/');
        }
        key.push_str(segment);
    }
    source
        .check_acl(acl, &key)
        .map_or(Value::Null, Value::Boolean)
}

/// `key @ acl`: the ACL is a name, or 0-9 for the well known `_0`..`_9`
fn in_hash<S: PropertySource + ?Sized>(key: &Value, acl: &Value, source: &S) -> Value {
    let acl = match acl {
        Value::Int(n @ 0..=9) => format!("_{n}"),
        Value::String(name) => name.clone(),
        _ => return Value::Null,
    };
    let Value::String(key) = key else {
        return Value::Null;
    };
    source
        .check_acl(&acl, key)
        .map_or(Value::Null, Value::Boolean)
}

/// Offset of the record that ends a short-circuited `And`/`Or` at `level`:
/// the `End` closing the level, or for `And` the next `Or` of the level.
fn skip(rule: &CompiledRule, mut offset: usize, level: u8, stop_at_or: bool) -> usize {
    while let Some((record, next)) = rule.record_at(offset) {
        match record.opcode {
            Opcode::End if record.kind <= level => return offset,
            Opcode::Or if stop_at_or && record.kind == level => return offset,
            _ => offset = next,
        }
    }
    offset
}

/// Evaluate `rule` against the properties of one message.
pub fn evaluate<S: PropertySource + ?Sized>(rule: &CompiledRule, source: &S) -> Selection {
    let mut stack: Vec<Value> = Vec::with_capacity(16);
    let mut offset = 0;

    macro_rules! pop {
        () => {
            match stack.pop() {
                Some(value) => value,
                None => return Selection::Unknown,
            }
        };
    }

    loop {
        let Some((record, mut next)) = rule.record_at(offset) else {
            return Selection::Unknown;
        };
        match record.opcode {
            Opcode::End if record.kind == 0 => {
                return match stack.last() {
                    None => Selection::True,
                    Some(Value::Boolean(b)) => Selection::from(*b),
                    Some(_) => Selection::Unknown,
                };
            }
            Opcode::End | Opcode::Begin | Opcode::Internal => {}
            Opcode::And => match stack.last() {
                Some(Value::Boolean(true)) => {
                    stack.pop();
                }
                Some(_) => next = skip(rule, next, record.kind, true),
                None => return Selection::Unknown,
            },
            Opcode::Or => match stack.last() {
                Some(Value::Boolean(true)) => next = skip(rule, next, record.kind, false),
                Some(_) => {
                    stack.pop();
                }
                None => return Selection::Unknown,
            },
            Opcode::Not => {
                let value = pop!();
                stack.push(match value {
                    Value::Boolean(b) => Value::Boolean(!b),
                    _ => Value::Null,
                });
            }
            Opcode::Negative => {
                let value = pop!();
                stack.push(negate(&value));
            }
            Opcode::Compare => {
                let right = pop!();
                let left = pop!();
                let op = CompareOp::from_byte(record.kind);
                stack.push(compare(&left, &right, op).into_value());
            }
            Opcode::Calc => {
                let right = pop!();
                let left = pop!();
                stack.push(calc(&left, &right, record.kind));
            }
            Opcode::Is => {
                let value = pop!();
                stack.push(is_test(&value, record.kind));
            }
            Opcode::In => {
                let value = pop!();
                stack.push(match value {
                    Value::String(s) => {
                        Value::Boolean(record.in_items().any(|item| item == s.as_bytes()))
                    }
                    _ => Value::Null,
                });
            }
            Opcode::Like => {
                let value = pop!();
                stack.push(match value {
                    Value::String(s) => Value::Boolean(like_match(s.as_bytes(), record.payload)),
                    _ => Value::Null,
                });
            }
            Opcode::Between => {
                let high = pop!();
                let low = pop!();
                let value = pop!();
                let result = match compare(&value, &low, Some(CompareOp::Ge)) {
                    Selection::True => compare(&value, &high, Some(CompareOp::Le)),
                    other => other,
                };
                stack.push(result.into_value());
            }
            Opcode::ACLCheck => {
                let value = pop!();
                stack.push(acl_check(&value, &record, source));
            }
            Opcode::InHash => {
                let acl = pop!();
                let key = pop!();
                stack.push(in_hash(&key, &acl, source));
            }
            Opcode::Boolean => stack.push(match record.kind {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                _ => Value::Null,
            }),
            Opcode::Int => stack.push(record.int_value().map_or(Value::Null, Value::Int)),
            Opcode::Long => stack.push(record.long_value().map_or(Value::Null, Value::Long)),
            Opcode::Float => stack.push(record.float_value().map_or(Value::Null, Value::Float)),
            Opcode::Double => stack.push(record.double_value().map_or(Value::Null, Value::Double)),
            Opcode::String => stack.push(
                record
                    .text()
                    .map_or(Value::Null, |s| Value::String(s.to_string())),
            ),
            Opcode::Var => {
                let value = record.text().and_then(|name| source.property(name));
                stack.push(value.unwrap_or(Value::Null));
            }
            Opcode::Topic => stack.push(
                source
                    .topic()
                    .map_or(Value::Null, |t| Value::String(t.to_string())),
            ),
            Opcode::TopicPart => stack.push(topic_part(source.topic(), record.kind)),
            Opcode::QoS => stack.push(Value::Int(i32::from(source.qos()))),
            Opcode::SmallInt => stack.push(Value::Int(i32::from(record.kind))),
        }
        offset = next;
    }
}
