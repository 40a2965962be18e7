//! Error types for the message selector subsystem

use thiserror::Error;

/// Errors that can occur while compiling, decoding or configuring selectors.
///
/// Compile errors carry the stable numeric codes of the selection-rule error
/// range (241..=259); see [`SelectorError::code`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Unable to allocate memory for a rule of {0} bytes")]
    AllocationFailed(usize),

    #[error("The selection rule is too complex")]
    TooComplex,

    #[error("The IS expression is not valid")]
    IsNotValid,

    #[error("The IN must be followed by a group")]
    InRequiresGroup,

    #[error("The IN group is not valid")]
    InGroupNotValid,

    #[error("The separator in an IN group is missing or not valid")]
    InSeparator,

    #[error("The LIKE must be followed by a string")]
    LikeSyntax,

    #[error("The ESCAPE within a LIKE must be a single character string")]
    EscapeNotValid,

    #[error("A string in a selection rule is too complex")]
    StringTooComplex,

    #[error("The identifier or constant is not valid: {0}")]
    OperandNotValid(String),

    #[error("The BETWEEN operator is not valid")]
    BetweenNotValid,

    #[error("Too many left parentheses")]
    TooManyLeftParen,

    #[error("A field or constant is expected at the end of a selection rule")]
    OperandMissing,

    #[error("The {0} operator does not allow a boolean argument")]
    OpNotBoolean(String),

    #[error("The {0} operator does not allow a numeric argument")]
    OpNotNumeric(String),

    #[error("The {0} operator requires an identifier as an argument")]
    OpRequiresId(String),

    #[error("A boolean result is required for the selector")]
    NotBoolean,

    #[error("Too many right parentheses")]
    TooManyRightParen,

    #[error("The {0} operator does not allow a string or boolean argument")]
    OpNoString(String),

    /// A raw rule buffer does not decode as a sequence of rule records.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid selector configuration: {0}")]
    InvalidConfig(String),
}

impl SelectorError {
    /// Generic error code for failures outside the selection-rule range.
    pub const GENERIC_CODE: u32 = 100;

    /// Stable numeric code of this error
    pub fn code(&self) -> u32 {
        match self {
            Self::AllocationFailed(_) => 103,
            Self::TooComplex => 241,
            Self::IsNotValid => 242,
            Self::InRequiresGroup => 243,
            Self::InGroupNotValid => 244,
            Self::InSeparator => 245,
            Self::LikeSyntax => 246,
            Self::EscapeNotValid => 247,
            Self::StringTooComplex => 248,
            Self::OperandNotValid(_) => 249,
            Self::BetweenNotValid => 250,
            Self::TooManyLeftParen => 251,
            Self::OperandMissing => 252,
            Self::OpNotBoolean(_) => 253,
            Self::OpNotNumeric(_) => 254,
            Self::OpRequiresId(_) => 255,
            Self::NotBoolean => 256,
            Self::TooManyRightParen => 258,
            Self::OpNoString(_) => 259,
            Self::InvalidRule(_) | Self::InvalidConfig(_) => Self::GENERIC_CODE,
        }
    }

    /// Whether this is a compile error, i.e. the selector text was rejected
    pub fn is_compile_error(&self) -> bool {
        (241..=259).contains(&self.code())
    }
}
