//! Error handling for jsoneq.
//!
//! Two layers:
//!
//! - [`ErrorCode`] - decoder and encoder failures with stable numeric codes,
//!   so test vectors and CLI output can refer to them by number.
//! - [`MatchError`] - the three failure kinds a canonical comparison can
//!   report: an unsupported expected value, malformed stored text, or a
//!   mismatch between canonical forms.

use thiserror::Error;

/// Decoder and encoder error codes.
///
/// Codes are grouped by hundreds: 1xx for decoding, 2xx for building a
/// value from Rust data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[allow(non_camel_case_types)]
pub enum ErrorCode {
    /// Syntax error at the given byte offset (code 100)
    #[error("E100_InvalidJSON(at byte {0})")]
    E100_InvalidJSON(u64),

    /// Object contains the same key twice after unescaping (code 101)
    #[error("E101_DuplicateKey({0})")]
    E101_DuplicateKey(String),

    /// Input is not valid UTF-8, or contains a lone surrogate escape (code 105)
    #[error("E105_InvalidUTF8")]
    E105_InvalidUTF8,

    /// Number literal overflows a finite double (code 106)
    #[error("E106_NumberOutOfRange({0})")]
    E106_NumberOutOfRange(String),

    /// Input larger than the configured limit (code 110)
    #[error("E110_InputTooLarge({0}, {1})")]
    E110_InputTooLarge(u64, u64),

    /// Arrays/objects nested deeper than the configured limit (code 111)
    #[error("E111_NestingTooDeep({0}, {1})")]
    E111_NestingTooDeep(u64, u64),

    /// String longer than the configured limit (code 112)
    #[error("E112_StringTooLong({0}, {1})")]
    E112_StringTooLong(u64, u64),

    /// Object with more members than the configured limit (code 113)
    #[error("E113_TooManyFields({0}, {1})")]
    E113_TooManyFields(u64, u64),

    /// Array with more elements than the configured limit (code 114)
    #[error("E114_ArrayTooLong({0}, {1})")]
    E114_ArrayTooLong(u64, u64),

    /// Float is NaN or infinite (code 200)
    #[error("E200_NonFiniteNumber({0})")]
    E200_NonFiniteNumber(String),

    /// Map key cannot be turned into a JSON string (code 201)
    #[error("E201_KeyNotStringable({0})")]
    E201_KeyNotStringable(&'static str),

    /// Serde reported a custom error while serializing (code 202)
    #[error("E202_SerializeFailed({0})")]
    E202_SerializeFailed(String),
}

impl ErrorCode {
    /// Get the numeric error code.
    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::E100_InvalidJSON(_) => 100,
            ErrorCode::E101_DuplicateKey(_) => 101,
            ErrorCode::E105_InvalidUTF8 => 105,
            ErrorCode::E106_NumberOutOfRange(_) => 106,
            ErrorCode::E110_InputTooLarge(_, _) => 110,
            ErrorCode::E111_NestingTooDeep(_, _) => 111,
            ErrorCode::E112_StringTooLong(_, _) => 112,
            ErrorCode::E113_TooManyFields(_, _) => 113,
            ErrorCode::E114_ArrayTooLong(_, _) => 114,
            ErrorCode::E200_NonFiniteNumber(_) => 200,
            ErrorCode::E201_KeyNotStringable(_) => 201,
            ErrorCode::E202_SerializeFailed(_) => 202,
        }
    }

    /// Get the error name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::E100_InvalidJSON(_) => "E100_InvalidJSON",
            ErrorCode::E101_DuplicateKey(_) => "E101_DuplicateKey",
            ErrorCode::E105_InvalidUTF8 => "E105_InvalidUTF8",
            ErrorCode::E106_NumberOutOfRange(_) => "E106_NumberOutOfRange",
            ErrorCode::E110_InputTooLarge(_, _) => "E110_InputTooLarge",
            ErrorCode::E111_NestingTooDeep(_, _) => "E111_NestingTooDeep",
            ErrorCode::E112_StringTooLong(_, _) => "E112_StringTooLong",
            ErrorCode::E113_TooManyFields(_, _) => "E113_TooManyFields",
            ErrorCode::E114_ArrayTooLong(_, _) => "E114_ArrayTooLong",
            ErrorCode::E200_NonFiniteNumber(_) => "E200_NonFiniteNumber",
            ErrorCode::E201_KeyNotStringable(_) => "E201_KeyNotStringable",
            ErrorCode::E202_SerializeFailed(_) => "E202_SerializeFailed",
        }
    }
}

/// Result type for decoding and value construction.
pub type JsonResult<T> = Result<T, ErrorCode>;

/// Failure of a canonical comparison.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// The expected value cannot be represented as JSON.
    #[error("unsupported value kind: {0}")]
    UnsupportedValueKind(ErrorCode),

    /// The stored text is not valid JSON.
    #[error("malformed JSON in stored value ({code}): {raw:?}")]
    MalformedJson {
        /// Decoder error.
        code: ErrorCode,
        /// The stored text as it was read back.
        raw: String,
    },

    /// The canonical forms differ.
    #[error("JSON values differ\n  expected: {expected}\n    actual: {actual}")]
    ComparisonMismatch {
        /// Canonical form of the expected value.
        expected: String,
        /// Canonical form of the decoded stored value.
        actual: String,
    },
}

impl MatchError {
    /// Returns true for [`MatchError::ComparisonMismatch`].
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::ComparisonMismatch { .. })
    }

    /// Returns true for [`MatchError::MalformedJson`].
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedJson { .. })
    }

    /// Returns true for [`MatchError::UnsupportedValueKind`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedValueKind(_))
    }
}

/// Result type for matcher operations.
pub type MatchResult<T> = Result<T, MatchError>;
