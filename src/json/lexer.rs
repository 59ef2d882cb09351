//! JSON lexer/tokenizer.
//!
//! Converts stored JSON text into a stream of tokens for the parser.
//! Handles UTF-8 validation, escape sequences and the RFC 8259 number
//! grammar. Whitespace between tokens is skipped, which is what makes
//! formatting differences in stored text irrelevant to comparison.

use super::limits::Limits;
use crate::error::{ErrorCode, JsonResult};

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Left brace `{`
    LeftBrace,
    /// Right brace `}`
    RightBrace,
    /// Left bracket `[`
    LeftBracket,
    /// Right bracket `]`
    RightBracket,
    /// Colon `:`
    Colon,
    /// Comma `,`
    Comma,
    /// Null literal
    Null,
    /// True literal
    True,
    /// False literal
    False,
    /// String value (unescaped)
    String(String),
    /// Number literal, kept as text until the parser picks a representation
    Number(String),
    /// End of input
    Eof,
}

/// JSON lexer that tokenizes input.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    limits: Limits,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a [u8], limits: Limits) -> JsonResult<Self> {
        if input.len() as u64 > limits.max_input_size {
            return Err(ErrorCode::E110_InputTooLarge(
                input.len() as u64,
                limits.max_input_size,
            ));
        }

        let input = std::str::from_utf8(input).map_err(|_| ErrorCode::E105_InvalidUTF8)?;

        Ok(Self {
            input,
            pos: 0,
            limits,
        })
    }

    /// Get the current position in the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn invalid(&self) -> ErrorCode {
        ErrorCode::E100_InvalidJSON(self.pos as u64)
    }

    /// Peek at the current byte without consuming it.
    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    /// Consume and return the current byte.
    fn advance(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Skip whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    /// Read the next token from the input.
    pub fn next_token(&mut self) -> JsonResult<Token> {
        self.skip_whitespace();

        let token = match self.peek() {
            None => return Ok(Token::Eof),
            Some(b'{') => Token::LeftBrace,
            Some(b'}') => Token::RightBrace,
            Some(b'[') => Token::LeftBracket,
            Some(b']') => Token::RightBracket,
            Some(b':') => Token::Colon,
            Some(b',') => Token::Comma,
            Some(b'"') => return self.read_string(),
            Some(b'-' | b'0'..=b'9') => return self.read_number(),
            Some(b't') => return self.read_literal(b"true", Token::True),
            Some(b'f') => return self.read_literal(b"false", Token::False),
            Some(b'n') => return self.read_literal(b"null", Token::Null),
            Some(_) => return Err(self.invalid()),
        };
        self.pos += 1;
        Ok(token)
    }

    /// Read a string token, handling escape sequences.
    fn read_string(&mut self) -> JsonResult<Token> {
        // Opening quote
        self.advance();

        let mut result = String::new();
        let mut run_start = self.pos;

        loop {
            match self.peek() {
                None => return Err(self.invalid()),
                Some(b'"') => {
                    result.push_str(&self.input[run_start..self.pos]);
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    result.push_str(&self.input[run_start..self.pos]);
                    self.pos += 1;
                    let escaped = self.read_escape_sequence()?;
                    result.push(escaped);
                    run_start = self.pos;
                }
                Some(b) if b < 0x20 => {
                    // Control characters must be escaped
                    return Err(self.invalid());
                }
                Some(_) => {
                    // Input is valid UTF-8, so continuation bytes of a
                    // multi-byte character are copied with their run.
                    self.pos += 1;
                }
            }

            let len = (result.len() + (self.pos - run_start)) as u64;
            if len > self.limits.max_string_length {
                return Err(ErrorCode::E112_StringTooLong(
                    len,
                    self.limits.max_string_length,
                ));
            }
        }

        Ok(Token::String(result))
    }

    /// Read an escape sequence after a backslash.
    fn read_escape_sequence(&mut self) -> JsonResult<char> {
        match self.advance() {
            Some(b'"') => Ok('"'),
            Some(b'\\') => Ok('\\'),
            Some(b'/') => Ok('/'),
            Some(b'b') => Ok('\x08'),
            Some(b'f') => Ok('\x0C'),
            Some(b'n') => Ok('\n'),
            Some(b'r') => Ok('\r'),
            Some(b't') => Ok('\t'),
            Some(b'u') => self.read_unicode_escape(),
            _ => Err(self.invalid()),
        }
    }

    /// Read a \uXXXX unicode escape sequence, combining surrogate pairs.
    fn read_unicode_escape(&mut self) -> JsonResult<char> {
        let unit = self.read_hex4()?;

        if (0xD800..=0xDBFF).contains(&unit) {
            if self.advance() != Some(b'\\') || self.advance() != Some(b'u') {
                // Unpaired high surrogate
                return Err(ErrorCode::E105_InvalidUTF8);
            }
            let low = self.read_hex4()?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(ErrorCode::E105_InvalidUTF8);
            }
            let combined = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
            return char::from_u32(combined).ok_or(ErrorCode::E105_InvalidUTF8);
        }

        // Lone low surrogates fail here too
        char::from_u32(u32::from(unit)).ok_or(ErrorCode::E105_InvalidUTF8)
    }

    /// Read 4 hex digits and return the value.
    fn read_hex4(&mut self) -> JsonResult<u16> {
        let mut value: u16 = 0;
        for _ in 0..4 {
            let digit = match self.advance() {
                Some(b @ b'0'..=b'9') => b - b'0',
                Some(b @ b'a'..=b'f') => b - b'a' + 10,
                Some(b @ b'A'..=b'F') => b - b'A' + 10,
                _ => return Err(self.invalid()),
            };
            value = (value << 4) | u16::from(digit);
        }
        Ok(value)
    }

    /// Consume one or more ASCII digits.
    fn read_digits(&mut self) -> JsonResult<()> {
        if !matches!(self.peek(), Some(b'0'..=b'9')) {
            return Err(self.invalid());
        }
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        Ok(())
    }

    /// Read a number token: `-? int frac? exp?`.
    fn read_number(&mut self) -> JsonResult<Token> {
        let start = self.pos;

        if self.peek() == Some(b'-') {
            self.advance();
        }

        match self.peek() {
            Some(b'0') => {
                self.advance();
                // No leading zeros
                if let Some(b'0'..=b'9') = self.peek() {
                    return Err(self.invalid());
                }
            }
            Some(b'1'..=b'9') => self.read_digits()?,
            _ => return Err(self.invalid()),
        }

        if self.peek() == Some(b'.') {
            self.advance();
            self.read_digits()?;
        }

        if let Some(b'e' | b'E') = self.peek() {
            self.advance();
            if let Some(b'+' | b'-') = self.peek() {
                self.advance();
            }
            self.read_digits()?;
        }

        Ok(Token::Number(self.input[start..self.pos].to_string()))
    }

    /// Read a literal keyword.
    fn read_literal(&mut self, expected: &[u8], token: Token) -> JsonResult<Token> {
        for &b in expected {
            if self.advance() != Some(b) {
                return Err(self.invalid());
            }
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> JsonResult<Vec<Token>> {
        let mut lexer = Lexer::new(input.as_bytes(), Limits::standard())?;
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[test]
    fn test_structural_tokens() {
        let tokens = lex("{}[],:").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LeftBrace,
                Token::RightBrace,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Comma,
                Token::Colon,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens = lex("null true\n\tfalse").unwrap();
        assert_eq!(tokens, vec![Token::Null, Token::True, Token::False]);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#""a\nb\tc\/d""#).unwrap();
        assert_eq!(tokens, vec![Token::String("a\nb\tc/d".to_string())]);
    }

    #[test]
    fn test_unicode_escape_and_raw_utf8_agree() {
        assert_eq!(lex(r#""\u00e9""#).unwrap(), lex("\"é\"").unwrap());
    }

    #[test]
    fn test_surrogate_pair() {
        let tokens = lex(r#""\uD83D\uDE00""#).unwrap();
        assert_eq!(tokens, vec![Token::String("\u{1F600}".to_string())]);
    }

    #[test]
    fn test_lone_surrogates_rejected() {
        assert_eq!(lex(r#""\uD800""#).unwrap_err(), ErrorCode::E105_InvalidUTF8);
        assert_eq!(lex(r#""\uDC00""#).unwrap_err(), ErrorCode::E105_InvalidUTF8);
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("42 -123 0 1.5 -2e10 3.25E-2").unwrap();
        let raw: Vec<&str> = vec!["42", "-123", "0", "1.5", "-2e10", "3.25E-2"];
        assert_eq!(
            tokens,
            raw.into_iter()
                .map(|s| Token::Number(s.to_string()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_malformed_numbers_rejected() {
        for input in ["01", "-", "1.", ".5", "1e", "+1", "1e+"] {
            assert!(lex(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn test_raw_control_character_rejected() {
        assert!(lex("\"a\nb\"").is_err());
    }

    #[test]
    fn test_error_offset_points_at_bad_byte() {
        assert_eq!(lex("[1, x]").unwrap_err(), ErrorCode::E100_InvalidJSON(4));
    }

    #[test]
    fn test_invalid_utf8() {
        let invalid = vec![b'"', 0xFF, 0xFE, b'"'];
        assert_eq!(
            Lexer::new(&invalid, Limits::standard()).err(),
            Some(ErrorCode::E105_InvalidUTF8)
        );
    }

    #[test]
    fn test_input_too_large() {
        let mut limits = Limits::standard();
        limits.max_input_size = 10;
        let result = Lexer::new(b"this is more than 10 bytes", limits);
        assert!(matches!(result, Err(ErrorCode::E110_InputTooLarge(26, 10))));
    }

    #[test]
    fn test_string_too_long() {
        let mut limits = Limits::standard();
        limits.max_string_length = 3;
        let mut lexer = Lexer::new(br#""abcd""#, limits).unwrap();
        assert!(matches!(
            lexer.next_token(),
            Err(ErrorCode::E112_StringTooLong(4, 3))
        ));
    }
}
