//! Human readable forms of a compiled rule: a record dump for debugging
//! and an infix rendering that compiles back to the same records.

use std::fmt::{self, Write as _};

use super::like::match_to_string;
use super::rule::{CompareOp, CompiledRule, IsTest, Opcode, RuleRecord};

/// Quote a string literal, doubling embedded quotes
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn is_keyword(record: &RuleRecord<'_>) -> String {
    match IsTest::from_kind(record.kind) {
        Some((test, true)) => format!("is not {}", test.keyword()),
        Some((test, false)) => format!("is {}", test.keyword()),
        None => format!("is ?{}", record.kind),
    }
}

fn like_text(record: &RuleRecord<'_>) -> String {
    let (pattern, escaped) = match_to_string(record.payload, '\\');
    if escaped {
        format!("{} escape '\\'", quote(&pattern))
    } else {
        quote(&pattern)
    }
}

fn in_text(record: &RuleRecord<'_>) -> String {
    let items: Vec<String> = record
        .in_items()
        .map(|item| quote(&String::from_utf8_lossy(item)))
        .collect();
    format!("({})", items.join(", "))
}

fn acl_text(record: &RuleRecord<'_>) -> String {
    match record.acl_check() {
        Some((name, levels)) => {
            let mut out = quote(name);
            for level in levels {
                let _ = write!(out, ", {level}");
            }
            format!("({out})")
        }
        None => "(?)".to_string(),
    }
}

/// Detail column of a dump line
fn record_detail(record: &RuleRecord<'_>) -> Option<String> {
    let detail = match record.opcode {
        Opcode::Compare => CompareOp::from_byte(record.kind)
            .map_or_else(|| record.kind.to_string(), |op| op.symbol().to_string()),
        Opcode::Calc => char::from(record.kind).to_string(),
        Opcode::Boolean => match record.kind {
            0 => "False".to_string(),
            1 => "True".to_string(),
            _ => "Unknown".to_string(),
        },
        Opcode::Int => record.int_value()?.to_string(),
        Opcode::Long => record.long_value()?.to_string(),
        Opcode::Float => format!("{:?}", record.float_value()?),
        Opcode::Double => format!("{:?}", record.double_value()?),
        Opcode::String | Opcode::Var => record.text()?.to_string(),
        Opcode::Like => like_text(record),
        Opcode::Is => is_keyword(record),
        Opcode::In => in_text(record),
        Opcode::ACLCheck => acl_text(record),
        Opcode::Negative | Opcode::Not | Opcode::Topic | Opcode::QoS | Opcode::InHash => {
            return None
        }
        Opcode::End
        | Opcode::Begin
        | Opcode::And
        | Opcode::Or
        | Opcode::Between
        | Opcode::Internal
        | Opcode::TopicPart
        | Opcode::SmallInt => record.kind.to_string(),
    };
    Some(detail)
}

/// One line per record: length, opcode name and the decoded detail.
pub fn dump(rule: &CompiledRule) -> String {
    let mut out = String::new();
    for record in rule.records() {
        let _ = write!(out, "{:>3} {}", record.len, record.opcode.name());
        if let Some(detail) = record_detail(&record) {
            let _ = write!(out, " {detail}");
        }
        out.push('\n');
    }
    out
}

/// An operand rendered so far.
///
/// `! x` and `!! x` compile to the same record as `x is not true` and
/// `x is not false`. The prefix spelling is right wherever a prefix
/// operator would be; the postfix one is kept for the left side of a
/// binary operator and the subject of IS, IN, LIKE, BETWEEN or ACLCHECK.
struct Operand {
    text: String,
    postfix: Option<String>,
}

impl Operand {
    fn subject(self) -> String {
        self.postfix.unwrap_or(self.text)
    }
}

impl From<String> for Operand {
    fn from(text: String) -> Self {
        Self { text, postfix: None }
    }
}

/// Rebuilds infix text from the postfix records
#[derive(Default)]
struct Renderer {
    operands: Vec<Operand>,
    /// Open AND/OR chains: level and the text so far
    chains: Vec<(u8, String)>,
}

impl Renderer {
    fn pop_operand(&mut self) -> Operand {
        self.operands
            .pop()
            .unwrap_or_else(|| Operand::from("?".to_string()))
    }

    fn pop(&mut self) -> String {
        self.pop_operand().text
    }

    fn pop_subject(&mut self) -> String {
        self.pop_operand().subject()
    }

    fn push(&mut self, text: String) {
        self.operands.push(Operand::from(text));
    }

    fn binary(&mut self, symbol: &str) {
        let right = self.pop();
        let left = self.pop_subject();
        self.push(format!("{left} {symbol} {right}"));
    }

    /// Prefix operator
    fn unary(&mut self, f: impl FnOnce(String) -> String) {
        let operand = self.pop();
        self.push(f(operand));
    }

    /// Operator written after its subject
    fn postfix(&mut self, f: impl FnOnce(String) -> String) {
        let subject = self.pop_subject();
        self.push(f(subject));
    }

    fn is_test(&mut self, record: &RuleRecord<'_>) {
        let keyword = is_keyword(record);
        let prefix = match IsTest::from_kind(record.kind) {
            Some((IsTest::True, true)) => "!",
            Some((IsTest::False, true)) => "!!",
            _ => return self.postfix(|x| format!("{x} {keyword}")),
        };
        let operand = self.pop_operand();
        let text = format!("{prefix} {}", operand.text);
        let postfix = Some(format!("{} {keyword}", operand.subject()));
        self.operands.push(Operand { text, postfix });
    }

    fn chain(&mut self, level: u8, word: &str) {
        let left = self.pop();
        match self.chains.last_mut() {
            Some((open, text)) if *open == level => {
                let _ = write!(text, "{left} {word} ");
            }
            _ => self.chains.push((level, format!("{left} {word} "))),
        }
    }

    /// Close the chain of `level`, if any, around the top operand
    fn close(&mut self, level: u8) -> String {
        let last = self.operands.pop().map(|o| o.text).unwrap_or_default();
        match self.chains.last() {
            Some((open, _)) if *open == level => {
                let (_, mut text) = self.chains.pop().unwrap_or_default();
                text.push_str(&last);
                text
            }
            _ => last,
        }
    }

    fn record(&mut self, record: &RuleRecord<'_>) -> Option<String> {
        let literal = |value: Option<String>| value.unwrap_or_else(|| "?".to_string());
        match record.opcode {
            Opcode::End if record.kind == 0 => return Some(self.close(0)),
            Opcode::End => {
                let inner = self.close(record.kind);
                self.push(format!("({inner})"));
            }
            Opcode::Begin | Opcode::Internal => {}
            Opcode::And => self.chain(record.kind, "and"),
            Opcode::Or => self.chain(record.kind, "or"),
            Opcode::Not => self.unary(|x| format!("not {x}")),
            Opcode::Negative => self.unary(|x| format!("-{x}")),
            Opcode::Compare => {
                let symbol = CompareOp::from_byte(record.kind).map_or("?", CompareOp::symbol);
                self.binary(symbol);
            }
            Opcode::Calc => self.binary(&char::from(record.kind).to_string()),
            Opcode::InHash => self.binary("@"),
            Opcode::Is => self.is_test(record),
            Opcode::In => {
                let items = in_text(record);
                self.postfix(|x| format!("{x} in {items}"));
            }
            Opcode::Like => {
                let pattern = like_text(record);
                self.postfix(|x| format!("{x} like {pattern}"));
            }
            Opcode::ACLCheck => {
                let group = acl_text(record);
                self.postfix(|x| format!("{x} aclcheck{group}"));
            }
            Opcode::Between => {
                let high = self.pop();
                let low = self.pop();
                self.postfix(|x| format!("{x} between {low} and {high}"));
            }
            Opcode::Boolean => self.push(
                match record.kind {
                    0 => "false",
                    1 => "true",
                    _ => "?",
                }
                .to_string(),
            ),
            Opcode::Int => self.push(literal(record.int_value().map(|v| v.to_string()))),
            Opcode::Long => self.push(literal(record.long_value().map(|v| format!("{v}L")))),
            Opcode::Float => self.push(literal(record.float_value().map(|v| format!("{v:?}f")))),
            Opcode::Double => self.push(literal(record.double_value().map(|v| format!("{v:?}")))),
            Opcode::String => self.push(literal(record.text().map(quote))),
            Opcode::Var => self.push(literal(record.text().map(str::to_string))),
            Opcode::Topic => self.push("Topic".to_string()),
            Opcode::TopicPart => self.push(format!("Topic{}", record.kind)),
            Opcode::QoS => self.push("QoS".to_string()),
            Opcode::SmallInt => self.push(record.kind.to_string()),
        }
        None
    }
}

/// Render `rule` as selector text
pub fn to_infix(rule: &CompiledRule) -> String {
    let mut renderer = Renderer::default();
    for record in rule.records() {
        if let Some(text) = renderer.record(&record) {
            return text;
        }
    }
    String::new()
}

impl CompiledRule {
    /// Debug listing of the records, see [`dump`]
    pub fn dump(&self) -> String {
        dump(self)
    }
}

impl fmt::Display for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_infix(self))
    }
}
