//! # Selector Rule Compiler
//!
//! Operator-precedence compiler from selector text to rule records. There is
//! no syntax tree: operands are written as soon as they are scanned, and
//! operators wait on a stack until an operator of lower priority arrives.
//!
//! Parentheses open a new stack level so pops never cross them. `BETWEEN`
//! opens a level of its own; the `AND` that ends its lower bound closes it.
//!
//! Operand types are checked against the previous record written, which is
//! enough to reject constants of the wrong type (`'a' + 1`, `true < 2`).

use serde::{Deserialize, Serialize};

use super::like::convert_match;
use super::rule::{CompareOp, CompiledRule, IsTest, Opcode, RuleBuilder, IS_NOT};
use super::token::{floating_value, integer_value, Scanner, Token, TokenKind};
use crate::error::SelectorError;

/// Most operators waiting on the stack at once.
pub const MAX_OPERATORS: usize = 255;

/// Deepest parenthesis (and BETWEEN) nesting.
pub const MAX_NESTING: usize = 63;

/// Most strings in an IN group.
pub const MAX_IN_ITEMS: usize = 249;

/// Most topic levels in an ACLCHECK group.
pub const MAX_ACL_LEVELS: usize = 31;

/// Compile options. Bit 0 enables the internal extensions: `!`, `!!`, `@`,
/// `&`, `aclcheck`, `IS TRUE`/`IS FALSE`, small integer constants and the
/// topic shortcuts. Options above 1 are recorded in the rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectorOptions(u16);

impl SelectorOptions {
    pub const NONE: Self = Self(0);
    pub const INTERNAL: Self = Self(1);

    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_internal(self) -> bool {
        self.0 & Self::INTERNAL.0 != 0
    }
}

mod priority {
    pub const NONE: u8 = 0;
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const NOT: u8 = 3;
    pub const OP: u8 = 4;
    pub const COMPARE: u8 = 5;
    pub const PLUS: u8 = 6;
    pub const MULTIPLY: u8 = 7;
    pub const UNARY: u8 = 8;
}

/// Operators that wait on the stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Compare(CompareOp),
    Plus,
    Minus,
    Multiply,
    Divide,
    Negative,
    Not,
    Exclam,
    NotNot,
    /// BETWEEN whose lower bound is still open
    Between,
    /// BETWEEN waiting for its upper bound
    Between2,
    InHash,
}

impl Operator {
    fn priority(self) -> u8 {
        match self {
            Self::Compare(_) => priority::COMPARE,
            Self::Plus | Self::Minus => priority::PLUS,
            Self::Multiply | Self::Divide => priority::MULTIPLY,
            Self::Negative => priority::UNARY,
            Self::Not | Self::Exclam | Self::NotNot => priority::NOT,
            Self::Between | Self::Between2 | Self::InHash => priority::OP,
        }
    }

    fn binary(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Eq => Self::Compare(CompareOp::Eq),
            TokenKind::Ne => Self::Compare(CompareOp::Ne),
            TokenKind::Gt => Self::Compare(CompareOp::Gt),
            TokenKind::Lt => Self::Compare(CompareOp::Lt),
            TokenKind::Ge => Self::Compare(CompareOp::Ge),
            TokenKind::Le => Self::Compare(CompareOp::Le),
            TokenKind::Plus => Self::Plus,
            TokenKind::Minus => Self::Minus,
            TokenKind::Multiply => Self::Multiply,
            TokenKind::Divide => Self::Divide,
            TokenKind::InHash => Self::InHash,
            _ => return None,
        })
    }
}

/// Priority of a token seen in operator position
fn token_priority(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Eq
        | TokenKind::Ne
        | TokenKind::Gt
        | TokenKind::Lt
        | TokenKind::Ge
        | TokenKind::Le => priority::COMPARE,
        TokenKind::Plus | TokenKind::Minus => priority::PLUS,
        TokenKind::Multiply | TokenKind::Divide => priority::MULTIPLY,
        TokenKind::Or => priority::OR,
        TokenKind::And => priority::AND,
        TokenKind::In
        | TokenKind::Is
        | TokenKind::Like
        | TokenKind::Between
        | TokenKind::InHash
        | TokenKind::AclCheck => priority::OP,
        _ => priority::NONE,
    }
}

fn is_operator_token(kind: TokenKind) -> bool {
    kind == TokenKind::End || token_priority(kind) != priority::NONE
}

/// Topic shortcuts understood in internal mode
fn internal_name(name: &str) -> Option<(Opcode, u8)> {
    let part = match name {
        "QoS" => return Some((Opcode::QoS, 0)),
        "Topic" => return Some((Opcode::Topic, 0)),
        "Org" => 1,
        "Type" => 3,
        "ID" => 5,
        "Event" => 7,
        "Fmt" => 9,
        _ => match name.strip_prefix("Topic")?.as_bytes() {
            [digit @ b'0'..=b'9'] => digit - b'0',
            _ => return None,
        },
    };
    Some((Opcode::TopicPart, part))
}

/// Compile `selector` into rule records.
///
/// An empty selector compiles to a rule that selects everything.
///
/// # Errors
///
/// The first syntax or operand type error found, see [`SelectorError`].
pub fn compile(selector: &str, options: SelectorOptions) -> Result<CompiledRule, SelectorError> {
    Compiler::new(selector, options).run()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Operand,
    Op,
}

#[derive(Clone, Copy, Debug)]
struct Level {
    /// Operator stack height when the level opened
    base: usize,
    between: bool,
}

struct Compiler<'a> {
    scanner: Scanner<'a>,
    out: RuleBuilder,
    options: SelectorOptions,
    ops: Vec<Operator>,
    levels: Vec<Level>,
    pending: Option<Token>,
}

impl<'a> Compiler<'a> {
    fn new(selector: &'a str, options: SelectorOptions) -> Self {
        Self {
            scanner: Scanner::new(selector),
            out: RuleBuilder::new(),
            options,
            ops: Vec::new(),
            levels: vec![Level {
                base: 0,
                between: false,
            }],
            pending: None,
        }
    }

    fn run(mut self) -> Result<CompiledRule, SelectorError> {
        if self.options.bits() > 1 {
            // The kind holds the low byte of the options
            let kind = self.options.bits() as u8;
            self.out.put(Opcode::Internal, kind, &[])?;
        }

        let mut state = State::Operand;
        loop {
            let token = self.next_token();
            if token.kind.is_error() {
                return Err(SelectorError::OperandNotValid(token.text));
            }
            let kind = token.kind;
            state = match state {
                State::Operand => match kind {
                    TokenKind::None => break,
                    // Unary plus changes nothing
                    TokenKind::Plus => State::Operand,
                    TokenKind::Minus => {
                        self.push_operator(Operator::Negative)?;
                        State::Operand
                    }
                    TokenKind::Not => {
                        self.push_operator(Operator::Not)?;
                        State::Operand
                    }
                    TokenKind::Exclam => {
                        self.push_operator(Operator::Exclam)?;
                        State::Operand
                    }
                    TokenKind::NotNot => {
                        self.push_operator(Operator::NotNot)?;
                        State::Operand
                    }
                    TokenKind::Begin => {
                        self.open_level(false)?;
                        State::Operand
                    }
                    _ => {
                        self.put_operand(token)?;
                        State::Op
                    }
                },
                State::Op => match self.operator(token)? {
                    Some(state) => state,
                    None => break,
                },
            };
        }
        self.finish()
    }

    /// Next token with the internal-only syntax mapped away when the option
    /// is off
    fn next_token(&mut self) -> Token {
        let mut token = match self.pending.take() {
            Some(token) => token,
            None => self.scanner.next_token(),
        };
        let internal = self.options.is_internal();
        token.kind = match token.kind {
            TokenKind::AclCheck if !internal => TokenKind::Name,
            TokenKind::Exclam | TokenKind::NotNot | TokenKind::InHash if !internal => {
                TokenKind::BadToken
            }
            TokenKind::Amp if internal => TokenKind::And,
            TokenKind::Amp => TokenKind::BadToken,
            kind => kind,
        };
        token
    }

    fn level(&self) -> usize {
        self.levels.len() - 1
    }

    fn level_base(&self) -> usize {
        self.levels.last().map_or(0, |level| level.base)
    }

    fn in_between(&self) -> bool {
        self.levels.last().is_some_and(|level| level.between)
    }

    fn open_level(&mut self, between: bool) -> Result<(), SelectorError> {
        if self.level() >= MAX_NESTING {
            return Err(SelectorError::TooComplex);
        }
        self.levels.push(Level {
            base: self.ops.len(),
            between,
        });
        Ok(())
    }

    /// Handle a token in operator position. `None` means end of input.
    fn operator(&mut self, token: Token) -> Result<Option<State>, SelectorError> {
        let kind = token.kind;

        // NOT in operator position negates the IN, LIKE or BETWEEN after it
        if kind == TokenKind::Not {
            self.push_operator(Operator::Not)?;
            let next = self.next_token();
            if !matches!(
                next.kind,
                TokenKind::In | TokenKind::Like | TokenKind::Between
            ) {
                return Err(SelectorError::OperandNotValid(next.text));
            }
            self.pending = Some(next);
            return Ok(Some(State::Op));
        }

        if kind != TokenKind::None && !is_operator_token(kind) {
            return Err(SelectorError::OperandNotValid(token.text));
        }

        if self.in_between() {
            match kind {
                TokenKind::And => {
                    self.close_between()?;
                    return Ok(Some(State::Operand));
                }
                TokenKind::Plus | TokenKind::Minus | TokenKind::Multiply | TokenKind::Divide => {}
                _ => return Err(SelectorError::BetweenNotValid),
            }
        }

        self.pop_operators(token_priority(kind))?;

        let state = match kind {
            TokenKind::None => return Ok(None),
            TokenKind::Is => {
                self.is_test()?;
                State::Op
            }
            TokenKind::In => {
                self.in_group()?;
                State::Op
            }
            TokenKind::Like => {
                self.like()?;
                State::Op
            }
            TokenKind::AclCheck => {
                self.acl_check()?;
                State::Op
            }
            TokenKind::And | TokenKind::Or => {
                self.check_boolean()?;
                let opcode = if kind == TokenKind::And {
                    Opcode::And
                } else {
                    Opcode::Or
                };
                let level = self.level() as u8;
                self.out.put(opcode, level, &[])?;
                State::Operand
            }
            TokenKind::End => {
                if self.level() == 0 {
                    return Err(SelectorError::TooManyRightParen);
                }
                let level = self.level() as u8;
                self.out.put(Opcode::End, level, &[])?;
                self.levels.pop();
                self.pop_operators(priority::MULTIPLY)?;
                State::Op
            }
            TokenKind::Between => {
                self.push_operator(Operator::Between)?;
                self.open_level(true)?;
                State::Operand
            }
            _ => {
                let op = Operator::binary(kind)
                    .ok_or_else(|| SelectorError::OperandNotValid(token.text.clone()))?;
                self.push_operator(op)?;
                State::Operand
            }
        };
        Ok(Some(state))
    }

    /// The AND of a BETWEEN: write out the whole lower bound and leave the
    /// BETWEEN waiting for its upper bound.
    fn close_between(&mut self) -> Result<(), SelectorError> {
        // Every operator of the lower bound level goes out here, `+` and `-`
        // included, so a bound like `1 + 2` is complete before the upper one
        self.pop_operators(priority::NONE)?;
        self.levels.pop();
        match self.ops.last_mut() {
            Some(op @ Operator::Between) => {
                *op = Operator::Between2;
                Ok(())
            }
            _ => Err(SelectorError::BetweenNotValid),
        }
    }

    fn push_operator(&mut self, op: Operator) -> Result<(), SelectorError> {
        if self.ops.len() >= MAX_OPERATORS {
            return Err(SelectorError::TooComplex);
        }
        match op {
            Operator::Compare(cmp) if cmp.is_ordering() => self.check_compare()?,
            Operator::Plus
            | Operator::Minus
            | Operator::Multiply
            | Operator::Divide
            | Operator::Between => self.check_numeric()?,
            _ => {}
        }
        self.ops.push(op);
        Ok(())
    }

    /// Write out every operator of this level with priority `min` or higher
    fn pop_operators(&mut self, min: u8) -> Result<(), SelectorError> {
        let base = self.level_base();
        while self.ops.len() > base {
            let Some(&op) = self.ops.last() else { break };
            if op.priority() < min {
                break;
            }
            self.ops.pop();
            self.write_operator(op, base)?;
        }
        Ok(())
    }

    fn write_operator(&mut self, op: Operator, base: usize) -> Result<(), SelectorError> {
        match op {
            Operator::Compare(cmp) => {
                if cmp.is_ordering() {
                    self.check_compare()?;
                }
                self.out.put(Opcode::Compare, cmp as u8, &[])
            }
            Operator::Plus => self.out.put(Opcode::Calc, b'+', &[]),
            Operator::Minus => self.out.put(Opcode::Calc, b'-', &[]),
            Operator::Multiply => self.out.put(Opcode::Calc, b'*', &[]),
            Operator::Divide => self.out.put(Opcode::Calc, b'/', &[]),
            Operator::Negative => self.out.put(Opcode::Negative, 0, &[]),
            Operator::Not => self.out.put(Opcode::Not, 0, &[]),
            Operator::Exclam => self.out.put(Opcode::Is, IsTest::True as u8 | IS_NOT, &[]),
            Operator::NotNot => self.out.put(Opcode::Is, IsTest::False as u8 | IS_NOT, &[]),
            Operator::InHash => self.out.put(Opcode::InHash, 0, &[]),
            Operator::Between => Err(SelectorError::BetweenNotValid),
            Operator::Between2 => {
                self.check_numeric()?;
                self.out.put(Opcode::Between, 2, &[])?;
                // NOT BETWEEN: the NOT belongs to this record
                if self.ops.len() > base && self.ops.last() == Some(&Operator::Not) {
                    self.ops.pop();
                    self.out.put(Opcode::Not, 0, &[])?;
                }
                Ok(())
            }
        }
    }

    /// Whether a unary minus waits on this level; consumes it if so
    fn take_negative(&mut self) -> bool {
        if self.ops.len() > self.level_base() && self.ops.last() == Some(&Operator::Negative) {
            self.ops.pop();
            return true;
        }
        false
    }

    fn put_operand(&mut self, token: Token) -> Result<(), SelectorError> {
        let invalid = || SelectorError::OperandNotValid(token.text.clone());
        match token.kind {
            TokenKind::Name => self.put_name(&token.text),
            TokenKind::Int => {
                let magnitude = integer_value(&token.text)
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(invalid)?;
                let value = if self.take_negative() {
                    -magnitude
                } else {
                    magnitude
                };
                match u8::try_from(value) {
                    Ok(small) if self.options.is_internal() => {
                        self.out.put(Opcode::SmallInt, small, &[])
                    }
                    _ => self.out.put(Opcode::Int, 0, &value.to_le_bytes()),
                }
            }
            TokenKind::Long => {
                // 2^63 only fits once negated; the cast wraps it to i64::MIN
                let magnitude = integer_value(&token.text).ok_or_else(invalid)? as i64;
                let value = if self.take_negative() {
                    magnitude.wrapping_neg()
                } else {
                    magnitude
                };
                self.out.put(Opcode::Long, 0, &value.to_le_bytes())
            }
            TokenKind::Float => {
                let magnitude = floating_value(&token.text).ok_or_else(invalid)? as f32;
                let value = if self.take_negative() {
                    -magnitude
                } else {
                    magnitude
                };
                self.out.put(Opcode::Float, 0, &value.to_le_bytes())
            }
            TokenKind::Double => {
                let magnitude = floating_value(&token.text).ok_or_else(invalid)?;
                let value = if self.take_negative() {
                    -magnitude
                } else {
                    magnitude
                };
                self.out.put(Opcode::Double, 0, &value.to_le_bytes())
            }
            TokenKind::String => self.out.put_text(Opcode::String, &token.text),
            TokenKind::True => self.out.put(Opcode::Boolean, 1, &[]),
            TokenKind::False => self.out.put(Opcode::Boolean, 0, &[]),
            _ => Err(invalid()),
        }
    }

    fn put_name(&mut self, name: &str) -> Result<(), SelectorError> {
        if self.options.is_internal() {
            if let Some((opcode, kind)) = internal_name(name) {
                return self.out.put(opcode, kind, &[]);
            }
        }
        self.out.put_text(Opcode::Var, name)
    }

    /// `IS [NOT] NULL`, or `IS [NOT] TRUE|FALSE` when internal
    fn is_test(&mut self) -> Result<(), SelectorError> {
        let mut token = self.scanner.next_token();
        let mut flag = 0;
        if token.kind == TokenKind::Not {
            flag = IS_NOT;
            token = self.scanner.next_token();
        }
        let internal = self.options.is_internal();
        let test = match token.kind {
            TokenKind::Null => IsTest::Null,
            TokenKind::True if internal => IsTest::True,
            TokenKind::False if internal => IsTest::False,
            _ => return Err(SelectorError::IsNotValid),
        };
        self.out.put(Opcode::Is, test as u8 | flag, &[])
    }

    /// `IN ('a', 'b', ...)`
    fn in_group(&mut self) -> Result<(), SelectorError> {
        self.check_identifier("in")?;
        if self.scanner.next_token().kind != TokenKind::Begin {
            return Err(SelectorError::InRequiresGroup);
        }
        let patch = self.out.reserve(Opcode::In)?;
        let mut count = 0usize;
        loop {
            let item = self.scanner.next_token();
            if item.kind != TokenKind::String {
                return Err(SelectorError::InGroupNotValid);
            }
            count += 1;
            let len = u8::try_from(item.text.len()).map_err(|_| SelectorError::TooComplex)?;
            if count > MAX_IN_ITEMS {
                return Err(SelectorError::TooComplex);
            }
            self.out.push_bytes(&[len])?;
            self.out.push_bytes(item.text.as_bytes())?;

            match self.scanner.next_token().kind {
                TokenKind::Group => continue,
                TokenKind::End => break,
                _ => return Err(SelectorError::InSeparator),
            }
        }
        self.out.finish_group(patch, count as u8)
    }

    /// `LIKE 'pattern' [ESCAPE 'c']`
    fn like(&mut self) -> Result<(), SelectorError> {
        self.check_identifier("like")?;
        let pattern = self.scanner.next_token();
        if pattern.kind != TokenKind::String {
            return Err(SelectorError::LikeSyntax);
        }

        let lookahead = self.scanner.next_token();
        let escape = if lookahead.kind == TokenKind::Escape {
            let escape = self.scanner.next_token();
            match escape.text.as_bytes() {
                [c] if escape.kind == TokenKind::String && c.is_ascii() => Some(*c),
                _ => return Err(SelectorError::EscapeNotValid),
            }
        } else {
            self.pending = Some(lookahead);
            None
        };

        let encoded = convert_match(&pattern.text, escape);
        self.out.put(Opcode::Like, 1, &encoded)
    }

    /// `ACLCHECK('acl', level, ...)`
    fn acl_check(&mut self) -> Result<(), SelectorError> {
        if self.scanner.next_token().kind != TokenKind::Begin {
            return Err(SelectorError::InRequiresGroup);
        }
        let patch = self.out.reserve(Opcode::ACLCheck)?;

        let name = self.scanner.next_token();
        if name.kind != TokenKind::String {
            return Err(SelectorError::InGroupNotValid);
        }
        let name_len =
            u8::try_from(name.text.len() + 1).map_err(|_| SelectorError::TooComplex)?;
        self.out.push_bytes(&[name_len])?;
        self.out.push_bytes(name.text.as_bytes())?;
        self.out.push_bytes(&[0])?;

        let mut count = 0usize;
        let mut token = self.scanner.next_token();
        while token.kind == TokenKind::Group {
            let level = self.scanner.next_token();
            let which = match level.kind {
                TokenKind::Int => integer_value(&level.text).filter(|v| *v <= 31),
                _ => None,
            }
            .ok_or(SelectorError::InGroupNotValid)?;
            count += 1;
            if count > MAX_ACL_LEVELS {
                return Err(SelectorError::TooComplex);
            }
            self.out.push_bytes(&[which as u8])?;
            token = self.scanner.next_token();
        }
        if token.kind != TokenKind::End || count == 0 {
            return Err(SelectorError::InSeparator);
        }
        self.out.finish_group(patch, count as u8)
    }

    /// Name of the previous record, the detail of a type mismatch error
    fn previous_name(&self) -> String {
        self.out.previous().unwrap_or(Opcode::End).name().to_string()
    }

    fn check_numeric(&self) -> Result<(), SelectorError> {
        match self.out.previous() {
            Some(
                Opcode::Int
                | Opcode::Long
                | Opcode::Float
                | Opcode::Double
                | Opcode::Var
                | Opcode::Calc
                | Opcode::Negative
                | Opcode::QoS
                | Opcode::SmallInt,
            ) => Ok(()),
            _ => Err(SelectorError::OpNotBoolean(self.previous_name())),
        }
    }

    fn check_boolean(&self) -> Result<(), SelectorError> {
        match self.out.previous() {
            Some(
                Opcode::Int
                | Opcode::SmallInt
                | Opcode::QoS
                | Opcode::Long
                | Opcode::Float
                | Opcode::Double
                | Opcode::Calc,
            ) => Err(SelectorError::OpNotNumeric(self.previous_name())),
            _ => Ok(()),
        }
    }

    fn check_compare(&self) -> Result<(), SelectorError> {
        match self.out.previous() {
            Some(
                Opcode::Var
                | Opcode::Int
                | Opcode::Long
                | Opcode::Float
                | Opcode::Double
                | Opcode::Calc
                | Opcode::Negative
                | Opcode::Topic
                | Opcode::TopicPart
                | Opcode::QoS
                | Opcode::SmallInt,
            ) => Ok(()),
            _ => Err(SelectorError::OpNoString(self.previous_name())),
        }
    }

    fn check_identifier(&self, operator: &str) -> Result<(), SelectorError> {
        match self.out.previous() {
            Some(Opcode::Var | Opcode::Topic | Opcode::TopicPart) => Ok(()),
            _ => Err(SelectorError::OpRequiresId(operator.to_string())),
        }
    }

    fn finish(mut self) -> Result<CompiledRule, SelectorError> {
        if self.level() != 0 {
            return Err(if self.in_between() {
                SelectorError::BetweenNotValid
            } else {
                SelectorError::TooManyLeftParen
            });
        }
        let previous = self.out.previous();
        if !self.ops.is_empty() || matches!(previous, Some(Opcode::And | Opcode::Or)) {
            return Err(SelectorError::OperandMissing);
        }
        if matches!(
            previous,
            Some(
                Opcode::Int
                    | Opcode::Long
                    | Opcode::Float
                    | Opcode::Double
                    | Opcode::Calc
                    | Opcode::SmallInt
                    | Opcode::QoS
            )
        ) {
            return Err(SelectorError::NotBoolean);
        }
        self.out.put(Opcode::End, 0, &[])?;
        Ok(self.out.finish())
    }
}
