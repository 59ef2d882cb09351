//! jsoneq - canonical JSON equality for test assertions.
//!
//! Tests that persist structured attributes (arrays, maps) into text columns
//! read them back as JSON text whose whitespace and key order depend on the
//! encoder. This crate compares such text against an expected value by
//! reducing both to their RFC 8785 (JCS) canonical form.
//!
//! # Architecture
//!
//! - [`matcher`] - `canonicalize`, `matches`, [`JsonMatcher`] and the
//!   [`assert_json_matches!`] macro
//! - [`json`] - JSON decoder, value model, serde bridge and JCS serializer
//! - [`database`] - record-existence assertions over SQLite or in-memory rows
//! - [`conformance`] - JSON corpus of matcher vectors
//! - [`error`] - error codes and the matcher error kinds
//!
//! # Example
//!
//! ```
//! use jsoneq::{matches, JsonMatcher};
//!
//! assert!(matches(&["mon", "tue"], "[\n  \"mon\",\n  \"tue\"\n]").unwrap());
//!
//! let days = JsonMatcher::new(&["mon", "tue"]).unwrap();
//! assert!(!days.matches(r#"["tue","mon"]"#).unwrap());
//! ```

// Library code reports every failure through Result; only the assertion
// macro panics, in the caller's test.
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod conformance;
pub mod database;
pub mod error;
pub mod json;
pub mod matcher;

// Re-export commonly used types
pub use database::{
    assert_database_has, assert_database_missing, ColumnValue, DatabaseError, ExpectedRow,
    MemoryStore, RecordSource, SqliteStore,
};
pub use error::{ErrorCode, MatchError, MatchResult};
pub use json::{JsonValue, Limits, Number};
pub use matcher::{assert_matches, canonicalize, matches, JsonMatcher};
