//! JSON Canonicalization Scheme (RFC 8785) serializer.
//!
//! Produces the canonical form both sides of a comparison are reduced to.
//! Object keys are sorted by UTF-16 code units, numbers use ECMAScript
//! formatting, strings use the minimal escape set, and no whitespace is
//! emitted.
//!
//! One deliberate difference from RFC 8785: integers in `i64::MIN..=u64::MAX`
//! are printed exactly, even beyond 2^53, instead of being rounded through a
//! double. Stored IDs above 2^53 therefore stay distinguishable.

use std::cmp::Ordering;

use super::types::{JsonValue, Number};

/// Compare two strings using UTF-16 code unit ordering.
///
/// This matches ECMAScript string comparison, which differs from code point
/// order for characters outside the Basic Multilingual Plane.
pub fn compare_keys_utf16(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Serialize a number using ECMAScript `Number.prototype.toString` rules.
pub fn serialize_number(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        return i.to_string();
    }
    match number.as_u64() {
        Some(u) => u.to_string(),
        None => format_ecmascript(number.as_f64()),
    }
}

/// Format a finite double the way ECMAScript does.
fn format_ecmascript(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "-1.2345e-7".
    let sci = format!("{:e}", value);
    let (sign, sci) = match sci.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", sci.as_str()),
    };
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => (sci, "0"),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);

    // value = 0.DIGITS * 10^n
    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, e_sign, e.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, e_sign, e.abs())
        }
    };

    format!("{}{}", sign, body)
}

/// Serialize a JsonValue to canonical JSON.
pub fn canonicalize(value: &JsonValue) -> String {
    let mut output = String::new();
    serialize_value(value, &mut output);
    output
}

fn serialize_value(value: &JsonValue, output: &mut String) {
    match value {
        JsonValue::Null => output.push_str("null"),
        JsonValue::Bool(true) => output.push_str("true"),
        JsonValue::Bool(false) => output.push_str("false"),
        JsonValue::Number(n) => output.push_str(&serialize_number(n)),
        JsonValue::String(s) => serialize_string(s, output),
        JsonValue::Array(arr) => serialize_array(arr, output),
        JsonValue::Object(obj) => {
            let mut members: Vec<(&String, &JsonValue)> = obj.iter().collect();
            members.sort_by(|(a, _), (b, _)| compare_keys_utf16(a, b));
            serialize_members(&members, output);
        }
    }
}

/// Serialize a string with the RFC 8785 escape set.
fn serialize_string(s: &str, output: &mut String) {
    output.push('"');
    for ch in s.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\x08' => output.push_str("\\b"),
            '\x0C' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c < '\x20' => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
    output.push('"');
}

fn serialize_array(arr: &[JsonValue], output: &mut String) {
    output.push('[');
    for (i, value) in arr.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        serialize_value(value, output);
    }
    output.push(']');
}

fn serialize_members(members: &[(&String, &JsonValue)], output: &mut String) {
    output.push('{');
    for (i, (key, value)) in members.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        serialize_string(key, output);
        output.push(':');
        serialize_value(value, output);
    }
    output.push('}');
}
