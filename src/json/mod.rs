//! JSON decoding, value building and JCS canonicalization.
//!
//! # Architecture
//!
//! - [`types`] - the value tree both sides of a comparison reduce to
//! - [`limits`] - size and depth limits
//! - [`lexer`] - tokenizer with UTF-8/escape handling
//! - [`parser`] - recursive descent parser with validation
//! - [`ser`] - serde bridge building values from Rust data
//! - [`jcs`] - RFC 8785 canonical serializer
//!
//! # Example
//!
//! ```
//! use jsoneq::json::{canonicalize, parse};
//!
//! let value = parse(b"{\n  \"b\": 2,\n  \"a\": 1.0\n}").unwrap();
//! assert_eq!(canonicalize(&value), "{\"a\":1,\"b\":2}");
//! ```

pub mod jcs;
pub mod lexer;
pub mod limits;
pub mod parser;
pub mod ser;
pub mod types;

pub use jcs::canonicalize;
pub use limits::Limits;
pub use parser::{parse, parse_with_limits};
pub use ser::{to_value, to_value_with_limits};
pub use types::{JsonValue, Number};
