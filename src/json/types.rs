//! JSON value types.
//!
//! [`JsonValue`] is the in-memory tree both sides of a comparison are reduced
//! to: expected values built in test code, and actual values decoded from
//! stored column text.
//!
//! Objects use `BTreeMap`, so two values that differ only in member insertion
//! order are the same value. Numbers are normalized on construction (see
//! [`Number`]) so that structural equality and canonical-text equality agree.

use std::collections::BTreeMap;
use std::fmt;

/// A JSON number.
///
/// Either an exact integer in `i64::MIN..=u64::MAX` or a finite `f64`.
/// Integral floats inside that range are stored as integers, so `1`, `1.0`
/// and `1e0` are one value. NaN and the infinities cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Number(N);

#[derive(Debug, Clone, Copy, PartialEq)]
enum N {
    Int(i64),
    // Only values above i64::MAX.
    UInt(u64),
    // Finite, and either fractional or outside the integer range.
    Float(f64),
}

// 2^63 and 2^64 as f64; both are exact.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

impl Number {
    /// Number from an exact integer.
    pub const fn from_i64(value: i64) -> Self {
        Number(N::Int(value))
    }

    /// Number from an exact unsigned integer.
    pub fn from_u64(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Number(N::Int(v)),
            Err(_) => Number(N::UInt(value)),
        }
    }

    /// Number from a float. Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 {
            // Integral doubles are exact integers; this also folds -0.0 into 0.
            if (-I64_BOUND..I64_BOUND).contains(&value) {
                return Some(Number(N::Int(value as i64)));
            }
            if (I64_BOUND..U64_BOUND).contains(&value) {
                return Some(Number(N::UInt(value as u64)));
            }
        }
        Some(Number(N::Float(value)))
    }

    /// Returns the integer value if this number is integral and fits an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            N::Int(i) => Some(i),
            N::UInt(_) | N::Float(_) => None,
        }
    }

    /// Returns the integer value if this number is integral and fits a u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self.0 {
            N::Int(i) => u64::try_from(i).ok(),
            N::UInt(u) => Some(u),
            N::Float(_) => None,
        }
    }

    /// Returns the value as a float (possibly lossy for large integers).
    pub fn as_f64(&self) -> f64 {
        match self.0 {
            N::Int(i) => i as f64,
            N::UInt(u) => u as f64,
            N::Float(f) => f,
        }
    }

    /// Returns true if the number is stored as an exact integer.
    pub fn is_integer(&self) -> bool {
        !matches!(self.0, N::Float(_))
    }
}

// No NaN can be constructed, so f64 equality is reflexive here.
impl Eq for Number {}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::from_i64(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::from_i64(i64::from(value))
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number::from_i64(i64::from(value))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::jcs::serialize_number(self))
    }
}

/// A JSON value.
///
/// All variants are immutable once built and implement structural equality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JsonValue {
    /// JSON null literal
    #[default]
    Null,
    /// JSON boolean (true/false)
    Bool(bool),
    /// JSON number
    Number(Number),
    /// JSON string
    String(String),
    /// JSON array; element order is significant
    Array(Vec<JsonValue>),
    /// JSON object; member order is not
    Object(BTreeMap<String, JsonValue>),
}

impl JsonValue {
    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Returns true if this is a boolean value.
    pub fn is_bool(&self) -> bool {
        matches!(self, JsonValue::Bool(_))
    }

    /// Returns true if this is a number value.
    pub fn is_number(&self) -> bool {
        matches!(self, JsonValue::Number(_))
    }

    /// Returns true if this is a string value.
    pub fn is_string(&self) -> bool {
        matches!(self, JsonValue::String(_))
    }

    /// Returns true if this is an array value.
    pub fn is_array(&self) -> bool {
        matches!(self, JsonValue::Array(_))
    }

    /// Returns true if this is an object value.
    pub fn is_object(&self) -> bool {
        matches!(self, JsonValue::Object(_))
    }

    /// Returns the boolean value if this is a Bool, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value if this is an integral Number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the float value if this is a Number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a reference to the array if this is an Array, None otherwise.
    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns a reference to the object if this is an Object, None otherwise.
    pub fn as_object(&self) -> Option<&BTreeMap<String, JsonValue>> {
        match self {
            JsonValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get a value from an object by key.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        match self {
            JsonValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Bool(value)
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Number(Number::from_i64(value))
    }
}

impl From<i32> for JsonValue {
    fn from(value: i32) -> Self {
        JsonValue::Number(Number::from(value))
    }
}

impl From<Number> for JsonValue {
    fn from(value: Number) -> Self {
        JsonValue::Number(value)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::String(value.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::String(value)
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(value: Vec<JsonValue>) -> Self {
        JsonValue::Array(value)
    }
}

impl From<BTreeMap<String, JsonValue>> for JsonValue {
    fn from(value: BTreeMap<String, JsonValue>) -> Self {
        JsonValue::Object(value)
    }
}

impl FromIterator<(String, JsonValue)> for JsonValue {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        JsonValue::Object(iter.into_iter().collect())
    }
}

impl FromIterator<JsonValue> for JsonValue {
    fn from_iter<I: IntoIterator<Item = JsonValue>>(iter: I) -> Self {
        JsonValue::Array(iter.into_iter().collect())
    }
}

/// Displays the canonical form.
impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::jcs::canonicalize(self))
    }
}
