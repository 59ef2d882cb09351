//! Canonical JSON matching for test assertions.
//!
//! Compares an expected value built in test code against JSON text read
//! back from storage. Both sides are reduced to their RFC 8785 canonical
//! form, so key order, whitespace and number spelling (`1` vs `1.0`) do not
//! matter, while array order and value types do.
//!
//! ```
//! use jsoneq::matcher::{matches, JsonMatcher};
//!
//! assert!(matches(&["mon", "tue"], r#"["mon", "tue"]"#).unwrap());
//! assert!(!matches(&["mon", "tue"], r#"["tue", "mon"]"#).unwrap());
//!
//! let m = JsonMatcher::new(&serde_json::json!({"a": 1, "b": 2})).unwrap();
//! assert!(m.matches("{\"b\": 2, \"a\": 1}").unwrap());
//! ```

use std::fmt;

use log::{debug, trace};
use serde::Serialize;

use crate::error::{MatchError, MatchResult};
use crate::json::{jcs, parse_with_limits, to_value_with_limits, JsonValue, Limits};

/// Canonical form of any serializable value.
///
/// Fails with [`MatchError::UnsupportedValueKind`] when the value has no JSON
/// form (non-finite float, non-stringable map key, runaway nesting).
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> MatchResult<String> {
    canonicalize_with_limits(value, Limits::standard())
}

/// [`canonicalize`] with explicit limits.
pub fn canonicalize_with_limits<T: Serialize + ?Sized>(
    value: &T,
    limits: Limits,
) -> MatchResult<String> {
    let value = to_value_with_limits(value, limits).map_err(MatchError::UnsupportedValueKind)?;
    Ok(jcs::canonicalize(&value))
}

/// Decode stored text and return its canonical form.
///
/// Fails with [`MatchError::MalformedJson`], carrying the raw text.
pub fn canonicalize_stored(stored: &str, limits: Limits) -> MatchResult<String> {
    decode_stored(stored, limits).map(|value| jcs::canonicalize(&value))
}

fn decode_stored(stored: &str, limits: Limits) -> MatchResult<JsonValue> {
    parse_with_limits(stored.as_bytes(), limits).map_err(|code| MatchError::MalformedJson {
        code,
        raw: stored.to_string(),
    })
}

/// True iff `stored` decodes to a value logically equal to `expected`.
pub fn matches<T: Serialize + ?Sized>(expected: &T, stored: &str) -> MatchResult<bool> {
    JsonMatcher::new(expected)?.matches(stored)
}

/// Like [`matches`], but a difference is an error carrying both canonical
/// forms.
pub fn assert_matches<T: Serialize + ?Sized>(expected: &T, stored: &str) -> MatchResult<()> {
    JsonMatcher::new(expected)?.check(stored)
}

/// An expected JSON value, canonicalized once and checked against any number
/// of stored texts.
///
/// This is the value a database assertion accepts in place of a literal
/// column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonMatcher {
    canonical: String,
    limits: Limits,
}

impl JsonMatcher {
    /// Matcher for any serializable expected value.
    pub fn new<T: Serialize + ?Sized>(expected: &T) -> MatchResult<Self> {
        Self::with_limits(expected, Limits::standard())
    }

    /// Matcher with explicit limits, used both for the expected value and
    /// for decoding stored text.
    pub fn with_limits<T: Serialize + ?Sized>(expected: &T, limits: Limits) -> MatchResult<Self> {
        let canonical = canonicalize_with_limits(expected, limits)?;
        trace!("expected canonical form: {}", canonical);
        Ok(Self { canonical, limits })
    }

    /// Matcher for a value that is already a [`JsonValue`]; cannot fail.
    pub fn from_value(expected: &JsonValue) -> Self {
        Self {
            canonical: jcs::canonicalize(expected),
            limits: Limits::standard(),
        }
    }

    /// Matcher whose expected value is itself given as JSON text.
    pub fn from_json_text(expected: &str) -> MatchResult<Self> {
        let limits = Limits::standard();
        Ok(Self {
            canonical: canonicalize_stored(expected, limits)?,
            limits,
        })
    }

    /// The expected value's canonical form.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Limits used when decoding stored text.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// True iff `stored` is logically equal to the expected value.
    pub fn matches(&self, stored: &str) -> MatchResult<bool> {
        let actual = canonicalize_stored(stored, self.limits)?;
        let equal = actual == self.canonical;
        if !equal {
            debug!(
                "JSON mismatch: expected {} actual {}",
                self.canonical, actual
            );
        }
        Ok(equal)
    }

    /// Ok iff `stored` is logically equal; otherwise
    /// [`MatchError::ComparisonMismatch`] with both canonical forms.
    pub fn check(&self, stored: &str) -> MatchResult<()> {
        let actual = canonicalize_stored(stored, self.limits)?;
        if actual == self.canonical {
            return Ok(());
        }
        debug!(
            "JSON mismatch: expected {} actual {}",
            self.canonical, actual
        );
        Err(MatchError::ComparisonMismatch {
            expected: self.canonical.clone(),
            actual,
        })
    }
}

impl fmt::Display for JsonMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "json({})", self.canonical)
    }
}

/// Panic unless stored JSON text is logically equal to an expected value.
///
/// The panic message carries both canonical forms on mismatch and the raw
/// stored text when it does not decode.
///
/// ```
/// use jsoneq::assert_json_matches;
///
/// let stored = String::from("{\n  \"b\": 2,\n  \"a\": 1\n}");
/// assert_json_matches!(serde_json::json!({"a": 1, "b": 2}), stored);
/// ```
#[macro_export]
macro_rules! assert_json_matches {
    ($expected:expr, $stored:expr $(,)?) => {
        if let Err(err) = $crate::matcher::assert_matches(
            &$expected,
            ::core::convert::AsRef::<str>::as_ref(&$stored),
        ) {
            panic!("assertion failed: stored JSON does not match\n{}", err);
        }
    };
}
