//! Strict decoder for the probe's one-value-per-line output
//!
//! Accepts JSON and the Python literal spellings a probe may print instead:
//! single-quoted strings, `True`/`False`/`None`, and tuples (decoded as
//! arrays). Anything else, including trailing characters after the value,
//! is rejected. The result is a `serde_json::Value` so the caller can map it
//! onto a typed field with serde.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// A decoding failure with its byte offset in the input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    /// Byte offset where decoding stopped
    pub offset: usize,
    /// What was expected or found
    pub message: String,
}

/// Nesting limit for lists and mappings
const MAX_DEPTH: usize = 64;

/// Decodes one literal value.
///
/// # Errors
///
/// Returns [`LiteralError`] if `input` is not exactly one well-formed value.
pub fn decode(input: &str) -> Result<Value, LiteralError> {
    let mut decoder = Decoder {
        src: input.as_bytes(),
        text: input,
        pos: 0,
        depth: 0,
    };
    let value = decoder.value()?;
    decoder.skip_ws();
    if decoder.pos != decoder.src.len() {
        return Err(decoder.error("unexpected trailing characters"));
    }
    Ok(value)
}

struct Decoder<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl Decoder<'_> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", byte as char)))
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'[') => self.sequence(b']'),
            Some(b'(') => self.sequence(b')'),
            Some(b'{') => self.mapping(),
            Some(quote @ (b'"' | b'\'')) => self.string(quote).map(Value::String),
            Some(b'-' | b'+' | b'0'..=b'9' | b'.') => self.number(),
            Some(b'a'..=b'z' | b'A'..=b'Z') => self.keyword(),
            Some(other) => Err(self.error(format!("unexpected character `{}`", other as char))),
        }
    }

    fn enter(&mut self) -> Result<(), LiteralError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        Ok(())
    }

    fn sequence(&mut self, close: u8) -> Result<Value, LiteralError> {
        self.enter()?;
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                break;
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error(format!("expected `,` or `{}`", close as char))),
            }
        }

        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn mapping(&mut self) -> Result<Value, LiteralError> {
        self.enter()?;
        self.pos += 1;
        let mut map = Map::new();

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(quote @ (b'"' | b'\'')) => {
                    let key = self.string(quote)?;
                    self.skip_ws();
                    self.expect(b':')?;
                    let value = self.value()?;
                    if map.insert(key, value).is_some() {
                        return Err(self.error("duplicate key"));
                    }
                }
                _ => return Err(self.error("mapping keys must be strings")),
            }
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error("expected `,` or `}`")),
            }
        }

        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn string(&mut self, quote: u8) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out = String::new();

        loop {
            let start = self.pos;
            while let Some(b) = self.peek() {
                if b == quote || b == b'\\' || b == b'\n' {
                    break;
                }
                self.pos += 1;
            }
            // Quote and backslash are ASCII, so the slice is on char boundaries
            out.push_str(&self.text[start..self.pos]);

            match self.peek() {
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    out.push(self.escape()?);
                }
                _ => return Err(self.error("unterminated string")),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LiteralError> {
        let Some(b) = self.peek() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += 1;
        match b {
            b'"' => Ok('"'),
            b'\'' => Ok('\''),
            b'\\' => Ok('\\'),
            b'/' => Ok('/'),
            b'n' => Ok('\n'),
            b't' => Ok('\t'),
            b'r' => Ok('\r'),
            b'b' => Ok('\u{8}'),
            b'f' => Ok('\u{c}'),
            b'u' => self.unicode_escape(),
            other => Err(self.error(format!("unknown escape `\\{}`", other as char))),
        }
    }

    fn hex4(&mut self) -> Result<u32, LiteralError> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
        self.pos += 4;
        Ok(code)
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        let high = self.hex4()?;
        let code = if (0xD800..0xDC00).contains(&high) {
            // Surrogate pair, as printed by json.dumps for non-BMP characters
            if self.text.get(self.pos..self.pos + 2) != Some("\\u") {
                return Err(self.error("unpaired surrogate"));
            }
            self.pos += 2;
            let low = self.hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error("invalid low surrogate"));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or_else(|| self.error("invalid unicode code point"))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' | b'e' | b'E' => is_float = true,
                b'-' | b'+' if matches!(self.src[self.pos - 1], b'e' | b'E') => {}
                _ => break,
            }
            self.pos += 1;
        }

        let raw = &self.text[start..self.pos];
        let raw = raw.strip_prefix('+').unwrap_or(raw);
        let invalid = || LiteralError {
            offset: start,
            message: format!("invalid number `{raw}`"),
        };

        if is_float {
            let parsed: f64 = raw.parse().map_err(|_| invalid())?;
            Number::from_f64(parsed).map(Value::Number).ok_or_else(invalid)
        } else if let Ok(n) = raw.parse::<u64>() {
            Ok(Value::Number(n.into()))
        } else {
            raw.parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| invalid())
        }
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z')) {
            self.pos += 1;
        }
        match &self.text[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            word => Err(LiteralError {
                offset: start,
                message: format!("unknown identifier `{word}`"),
            }),
        }
    }
}
