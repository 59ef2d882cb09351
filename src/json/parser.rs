//! JSON parser with strict validation.
//!
//! Recursive descent parser over [`Lexer`] tokens. Accepts RFC 8259 text and
//! rejects the things that would make logical equality ambiguous: duplicate
//! object keys (after unescaping) and numbers that overflow a double.

use std::collections::BTreeMap;

use super::lexer::{Lexer, Token};
use super::limits::Limits;
use super::types::{JsonValue, Number};
use crate::error::{ErrorCode, JsonResult};

/// JSON parser with strict validation.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    limits: Limits,
    depth: u64,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a [u8], limits: Limits) -> JsonResult<Self> {
        let mut lexer = Lexer::new(input, limits)?;
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            limits,
            depth: 0,
        })
    }

    /// Parse the input and return a JsonValue.
    pub fn parse(&mut self) -> JsonResult<JsonValue> {
        let value = self.parse_value()?;

        if self.current != Token::Eof {
            return Err(self.invalid());
        }

        Ok(value)
    }

    fn invalid(&self) -> ErrorCode {
        ErrorCode::E100_InvalidJSON(self.lexer.position() as u64)
    }

    /// Advance to the next token.
    fn advance(&mut self) -> JsonResult<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    /// Parse a single JSON value.
    fn parse_value(&mut self) -> JsonResult<JsonValue> {
        let value = match &self.current {
            Token::Null => JsonValue::Null,
            Token::True => JsonValue::Bool(true),
            Token::False => JsonValue::Bool(false),
            Token::String(s) => JsonValue::String(s.clone()),
            Token::Number(s) => JsonValue::Number(parse_number(s)?),
            Token::LeftBrace => return self.parse_object(),
            Token::LeftBracket => return self.parse_array(),
            _ => return Err(self.invalid()),
        };
        self.advance()?;
        Ok(value)
    }

    fn enter(&mut self) -> JsonResult<()> {
        self.depth += 1;
        if self.depth > self.limits.max_nesting_depth {
            return Err(ErrorCode::E111_NestingTooDeep(
                self.depth,
                self.limits.max_nesting_depth,
            ));
        }
        Ok(())
    }

    /// Parse a JSON object.
    fn parse_object(&mut self) -> JsonResult<JsonValue> {
        self.enter()?;

        // Consume opening brace
        self.advance()?;

        let mut map = BTreeMap::new();

        if self.current == Token::RightBrace {
            self.advance()?;
            self.depth -= 1;
            return Ok(JsonValue::Object(map));
        }

        loop {
            let key = match &self.current {
                Token::String(s) => s.clone(),
                _ => return Err(self.invalid()),
            };
            self.advance()?;

            if map.contains_key(&key) {
                return Err(ErrorCode::E101_DuplicateKey(key));
            }

            if self.current != Token::Colon {
                return Err(self.invalid());
            }
            self.advance()?;

            let value = self.parse_value()?;
            map.insert(key, value);

            if map.len() as u64 > self.limits.max_object_fields {
                return Err(ErrorCode::E113_TooManyFields(
                    map.len() as u64,
                    self.limits.max_object_fields,
                ));
            }

            match &self.current {
                Token::Comma => {
                    self.advance()?;
                    // Trailing comma is not allowed in JSON
                    if self.current == Token::RightBrace {
                        return Err(self.invalid());
                    }
                }
                Token::RightBrace => {
                    self.advance()?;
                    break;
                }
                _ => return Err(self.invalid()),
            }
        }

        self.depth -= 1;
        Ok(JsonValue::Object(map))
    }

    /// Parse a JSON array.
    fn parse_array(&mut self) -> JsonResult<JsonValue> {
        self.enter()?;

        // Consume opening bracket
        self.advance()?;

        let mut arr = Vec::new();

        if self.current == Token::RightBracket {
            self.advance()?;
            self.depth -= 1;
            return Ok(JsonValue::Array(arr));
        }

        loop {
            let value = self.parse_value()?;
            arr.push(value);

            if arr.len() as u64 > self.limits.max_array_length {
                return Err(ErrorCode::E114_ArrayTooLong(
                    arr.len() as u64,
                    self.limits.max_array_length,
                ));
            }

            match &self.current {
                Token::Comma => {
                    self.advance()?;
                    if self.current == Token::RightBracket {
                        return Err(self.invalid());
                    }
                }
                Token::RightBracket => {
                    self.advance()?;
                    break;
                }
                _ => return Err(self.invalid()),
            }
        }

        self.depth -= 1;
        Ok(JsonValue::Array(arr))
    }
}

/// Turn a number literal into a [`Number`].
///
/// A literal whose value is an integer in `i64::MIN..=u64::MAX` is kept
/// exact whatever its spelling, so `9007199254740993.0` and `90071992547409930e-1`
/// are the integer `9007199254740993`. Anything else goes through a double;
/// a literal too large for a finite double is an error.
pub fn parse_number(literal: &str) -> JsonResult<Number> {
    if let Some(exact) = exact_integer(literal) {
        return Ok(exact);
    }

    let value: f64 = literal
        .parse()
        .map_err(|_| ErrorCode::E106_NumberOutOfRange(literal.to_string()))?;
    Number::from_f64(value).ok_or_else(|| ErrorCode::E106_NumberOutOfRange(literal.to_string()))
}

// u64::MAX has 20 decimal digits.
const MAX_INTEGER_DIGITS: i64 = 20;

/// Exact value of a literal that denotes an integer in range, or `None`.
///
/// Works on the decimal digits directly: `digits * 10^scale` with trailing
/// fraction zeros cancelled against a negative scale.
fn exact_integer(literal: &str) -> Option<Number> {
    let (negative, unsigned) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    let mut digits = digits.trim_start_matches('0').to_string();
    if digits.is_empty() {
        return Some(Number::from_i64(0));
    }

    let mut scale = exponent.checked_sub(i64::try_from(frac_part.len()).ok()?)?;
    while scale < 0 && digits.ends_with('0') {
        digits.pop();
        scale += 1;
    }
    if scale < 0 {
        return None;
    }
    let width = i64::try_from(digits.len()).ok()?.checked_add(scale)?;
    if width > MAX_INTEGER_DIGITS {
        return None;
    }
    for _ in 0..scale {
        digits.push('0');
    }

    let magnitude: u64 = digits.parse().ok()?;
    if negative {
        let value = i64::try_from(-i128::from(magnitude)).ok()?;
        Some(Number::from_i64(value))
    } else {
        Some(Number::from_u64(magnitude))
    }
}

/// Parse JSON text into a JsonValue with standard limits.
pub fn parse(input: &[u8]) -> JsonResult<JsonValue> {
    parse_with_limits(input, Limits::standard())
}

/// Parse JSON text into a JsonValue with custom limits.
pub fn parse_with_limits(input: &[u8], limits: Limits) -> JsonResult<JsonValue> {
    let mut parser = Parser::new(input, limits)?;
    parser.parse()
}
