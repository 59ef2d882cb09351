//! Size and depth limits applied while decoding stored text and while
//! building values from Rust data.
//!
//! The nesting limit doubles as cycle protection: a self-referential
//! structure fed to the serializer hits it instead of overflowing the stack.
//! It is also the only limit applied to expected values built from Rust data.

use serde::Deserialize;

/// No bound.
pub const UNBOUNDED: u64 = u64::MAX;

/// Decoding/encoding limits.
///
/// Every field is optional in a limits file; missing fields take the
/// [`Limits::standard`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum total input size in bytes (E110)
    pub max_input_size: u64,
    /// Maximum nesting depth for arrays/objects (E111)
    pub max_nesting_depth: u64,
    /// Maximum string length in bytes (E112)
    pub max_string_length: u64,
    /// Maximum number of fields in an object (E113)
    pub max_object_fields: u64,
    /// Maximum number of elements in an array (E114)
    pub max_array_length: u64,
}

impl Limits {
    /// Limits used unless a caller asks otherwise.
    ///
    /// Only nesting depth is bounded, so any representable document decodes.
    pub const fn standard() -> Self {
        Self {
            max_input_size: UNBOUNDED,
            max_nesting_depth: 128,
            max_string_length: UNBOUNDED,
            max_object_fields: UNBOUNDED,
            max_array_length: UNBOUNDED,
        }
    }

    /// Tighter limits for fixtures that should stay small.
    pub const fn strict() -> Self {
        Self {
            max_input_size: 1024 * 1024,  // 1 MiB
            max_nesting_depth: 32,
            max_string_length: 64 * 1024, // 64 KiB
            max_object_fields: 1024,
            max_array_length: 10_000,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::standard()
    }
}
