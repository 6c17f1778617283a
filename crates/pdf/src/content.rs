//! Span-preserving content stream lexer.
//!
//! Every operation keeps the byte range it occupies in the decoded stream, so
//! watermark operators can be cut out without re-encoding (and possibly
//! reformatting) the rest of the page.

use lopdf::{Dictionary, Object, StringFormat};
use std::ops::Range;
use thiserror::Error;

/// Why a content stream could not be lexed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("unterminated hex string starting at byte {0}")]
    UnterminatedHexString(usize),

    #[error("unterminated array starting at byte {0}")]
    UnterminatedArray(usize),

    #[error("unterminated dictionary starting at byte {0}")]
    UnterminatedDictionary(usize),

    #[error("inline image starting at byte {0} has no EI")]
    UnterminatedInlineImage(usize),

    #[error("unexpected '{1}' at byte {0}")]
    Unexpected(usize, char),

    #[error("{0} operand(s) left without an operator at end of stream")]
    DanglingOperands(usize),

    #[error("unbalanced text object: {0}")]
    UnbalancedText(String),
}

/// One operator with its operands.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
    /// Bytes from the first operand through the operator.
    pub span: Range<usize>,
}

/// Lex a decoded content stream into operations.
///
/// Fails on anything that suggests a truncated or corrupt stream:
/// unterminated strings, arrays, dictionaries or inline images, operands
/// with no operator, and `BT`/`ET` pairs that do not balance.
pub fn parse_content(data: &[u8]) -> Result<Vec<Operation>, LexError> {
    let mut lexer = Lexer { data, pos: 0 };
    let mut operations = Vec::new();
    let mut operands = Vec::new();
    let mut first_operand: Option<usize> = None;

    loop {
        lexer.skip_whitespace_and_comments();
        if lexer.at_end() {
            break;
        }

        let start = lexer.pos;
        match lexer.next_token()? {
            Token::Operand(object) => {
                first_operand.get_or_insert(start);
                operands.push(object);
            }
            Token::Operator(operator) => {
                let op_start = first_operand.take().unwrap_or(start);
                if operator == "BI" {
                    lexer.skip_inline_image(start)?;
                }
                operations.push(Operation {
                    operator,
                    operands: std::mem::take(&mut operands),
                    span: op_start..lexer.pos,
                });
            }
        }
    }

    if !operands.is_empty() {
        return Err(LexError::DanglingOperands(operands.len()));
    }

    check_text_objects(&operations)?;
    Ok(operations)
}

/// Rebuild a content stream, dropping and replacing operations by index.
///
/// Bytes between operations (whitespace, comments) are kept as they were.
pub fn excise(
    data: &[u8],
    operations: &[Operation],
    remove: impl Fn(usize) -> bool,
    replace: impl Fn(usize) -> Option<String>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut cursor = 0;

    for (idx, op) in operations.iter().enumerate() {
        let replacement = replace(idx);
        if !remove(idx) && replacement.is_none() {
            continue;
        }
        out.extend_from_slice(&data[cursor..op.span.start]);
        if let Some(text) = replacement {
            push_separated(&mut out, text.as_bytes());
        }
        cursor = op.span.end;
        // Keep tokens on either side of the gap from running together
        if data.get(cursor).is_some_and(|&b| !is_whitespace(b) && !is_delimiter(b))
            && out.last().is_some_and(|&b| !is_whitespace(b) && !is_delimiter(b))
        {
            out.push(b' ');
        }
    }

    out.extend_from_slice(&data[cursor..]);
    out
}

fn push_separated(out: &mut Vec<u8>, text: &[u8]) {
    if out.last().is_some_and(|&b| !is_whitespace(b)) {
        out.push(b' ');
    }
    out.extend_from_slice(text);
}

fn check_text_objects(operations: &[Operation]) -> Result<(), LexError> {
    let mut open: Option<usize> = None;
    for (idx, op) in operations.iter().enumerate() {
        match op.operator.as_str() {
            "BT" => {
                if let Some(prev) = open {
                    return Err(LexError::UnbalancedText(format!(
                        "BT at operation {} inside text object opened at operation {}",
                        idx, prev
                    )));
                }
                open = Some(idx);
            }
            "ET" => {
                if open.take().is_none() {
                    return Err(LexError::UnbalancedText(format!(
                        "ET at operation {} without BT",
                        idx
                    )));
                }
            }
            _ => {}
        }
    }
    match open {
        Some(idx) => Err(LexError::UnbalancedText(format!(
            "text object opened at operation {} is never closed",
            idx
        ))),
        None => Ok(()),
    }
}

enum Token {
    Operand(Object),
    Operator(String),
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        match self.peek() {
            Some(b'/') | Some(b'(') | Some(b'<') | Some(b'[') => {
                self.parse_object().map(Token::Operand)
            }
            Some(b) if is_number_start(b) => self.parse_number().map(Token::Operand),
            Some(b) if is_delimiter(b) => Err(LexError::Unexpected(start, b as char)),
            Some(_) => {
                let word = self.read_regular();
                Ok(match word.as_str() {
                    "true" => Token::Operand(Object::Boolean(true)),
                    "false" => Token::Operand(Object::Boolean(false)),
                    "null" => Token::Operand(Object::Null),
                    _ => Token::Operator(word),
                })
            }
            None => Err(LexError::DanglingOperands(0)),
        }
    }

    fn parse_object(&mut self) -> Result<Object, LexError> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        match self.peek() {
            Some(b'/') => Ok(Object::Name(self.parse_name())),
            Some(b'(') => self.parse_literal_string(),
            Some(b'<') if self.data.get(self.pos + 1) == Some(&b'<') => self.parse_dictionary(),
            Some(b'<') => self.parse_hex_string(),
            Some(b'[') => self.parse_array(),
            Some(b) if is_number_start(b) => self.parse_number(),
            Some(b) if is_delimiter(b) => Err(LexError::Unexpected(start, b as char)),
            Some(b) => match self.read_regular().as_str() {
                "true" => Ok(Object::Boolean(true)),
                "false" => Ok(Object::Boolean(false)),
                "null" => Ok(Object::Null),
                _ => Err(LexError::Unexpected(start, b as char)),
            },
            None => Err(LexError::DanglingOperands(0)),
        }
    }

    fn read_regular(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|b| !is_whitespace(b) && !is_delimiter(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.pos]).into_owned()
    }

    fn parse_name(&mut self) -> Vec<u8> {
        // Skip the solidus
        self.pos += 1;
        let mut name = Vec::new();
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            if b == b'#' {
                let hex = self.data.get(self.pos + 1..self.pos + 3);
                if let Some(value) = hex.and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                {
                    name.push(value);
                    self.pos += 3;
                    continue;
                }
            }
            name.push(b);
            self.pos += 1;
        }
        name
    }

    fn parse_number(&mut self) -> Result<Object, LexError> {
        let start = self.pos;
        let text = self.read_regular();
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Object::Integer(int));
        }
        // PDF allows forms like "-.5" and "4." that Rust parses fine, and "--5" that it does not
        let cleaned = text.trim_start_matches("--").to_string();
        cleaned
            .parse::<f32>()
            .map(Object::Real)
            .map_err(|_| LexError::Unexpected(start, self.data[start] as char))
    }

    fn parse_literal_string(&mut self) -> Result<Object, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut depth = 1;
        let mut bytes = Vec::new();

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => {
                    let Some(escaped) = self.peek() else {
                        break;
                    };
                    self.pos += 1;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0C),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push((value & 0xFF) as u8);
                        }
                        other => bytes.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    bytes.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Object::String(bytes, StringFormat::Literal));
                    }
                    bytes.push(b);
                }
                _ => bytes.push(b),
            }
        }

        Err(LexError::UnterminatedString(start))
    }

    fn parse_hex_string(&mut self) -> Result<Object, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut digits = Vec::new();

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'>' => {
                    if digits.len() % 2 == 1 {
                        digits.push(b'0');
                    }
                    let bytes = digits
                        .chunks(2)
                        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
                        .collect();
                    return Ok(Object::String(bytes, StringFormat::Hexadecimal));
                }
                b if b.is_ascii_hexdigit() => digits.push(b),
                b if is_whitespace(b) => {}
                other => return Err(LexError::Unexpected(self.pos - 1, other as char)),
            }
        }

        Err(LexError::UnterminatedHexString(start))
    }

    fn parse_array(&mut self) -> Result<Object, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(LexError::UnterminatedArray(start)),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Object::Array(items));
                }
                Some(_) => items.push(self.parse_object()?),
            }
        }
    }

    fn parse_dictionary(&mut self) -> Result<Object, LexError> {
        let start = self.pos;
        self.pos += 2;
        let mut dict = Dictionary::new();

        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(LexError::UnterminatedDictionary(start)),
                Some(b'>') => {
                    if self.data.get(self.pos + 1) != Some(&b'>') {
                        return Err(LexError::Unexpected(self.pos, '>'));
                    }
                    self.pos += 2;
                    return Ok(Object::Dictionary(dict));
                }
                Some(b'/') => {
                    let key = self.parse_name();
                    self.skip_whitespace_and_comments();
                    if self.at_end() {
                        return Err(LexError::UnterminatedDictionary(start));
                    }
                    let value = self.parse_object()?;
                    dict.set(key, value);
                }
                Some(b) => return Err(LexError::Unexpected(self.pos, b as char)),
            }
        }
    }

    /// Skip an inline image body: parameters, `ID`, binary data, `EI`.
    fn skip_inline_image(&mut self, start: usize) -> Result<(), LexError> {
        // Parameters up to ID
        loop {
            self.skip_whitespace_and_comments();
            if self.at_end() {
                return Err(LexError::UnterminatedInlineImage(start));
            }
            if self.peek() == Some(b'/') {
                self.parse_name();
                self.skip_whitespace_and_comments();
                self.parse_object()
                    .map_err(|_| LexError::UnterminatedInlineImage(start))?;
                continue;
            }
            let word = self.read_regular();
            if word == "ID" {
                break;
            }
            return Err(LexError::UnterminatedInlineImage(start));
        }

        // One whitespace byte separates ID from the data
        self.pos += 1;

        // EI must be preceded by whitespace and followed by whitespace or the end
        let mut i = self.pos;
        while i + 1 < self.data.len() {
            if self.data[i] == b'E'
                && self.data[i + 1] == b'I'
                && i > 0
                && is_whitespace(self.data[i - 1])
                && self.data.get(i + 2).map_or(true, |&b| is_whitespace(b))
            {
                self.pos = i + 2;
                return Ok(());
            }
            i += 1;
        }

        Err(LexError::UnterminatedInlineImage(start))
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|op| op.operator.as_str()).collect()
    }

    #[test]
    fn test_parse_simple_text() {
        let data = b"BT /F1 12 Tf 50 700 Td (Hello) Tj ET";
        let ops = parse_content(data).unwrap();
        assert_eq!(operators(&ops), vec!["BT", "Tf", "Td", "Tj", "ET"]);

        assert!(matches!(ops[1].operands.as_slice(), [Object::Name(n), Object::Integer(12)] if n == b"F1"));
        assert_eq!(&data[ops[3].span.clone()], b"(Hello) Tj");
        assert!(matches!(
            ops[3].operands.as_slice(),
            [Object::String(s, StringFormat::Literal)] if s == b"Hello"
        ));
    }

    #[test]
    fn test_parse_strings() {
        let ops = parse_content(br"BT (a\(b\)c \101\n) Tj <48 69> Tj (nested (ok)) Tj ET").unwrap();
        assert!(matches!(&ops[1].operands[0], Object::String(s, StringFormat::Literal) if s == b"a(b)c A\n"));
        assert!(matches!(&ops[2].operands[0], Object::String(s, StringFormat::Hexadecimal) if s == b"Hi"));
        assert!(matches!(&ops[3].operands[0], Object::String(s, _) if s == b"nested (ok)"));
    }

    #[test]
    fn test_parse_arrays_dicts_and_reals() {
        let data = b"q 0.5 0 0 .5 -10.25 3 cm /GS0 gs BT [(Ma) -250 (de)] TJ ET /Span <</MCID 3>> BDC EMC Q";
        let ops = parse_content(data).unwrap();
        assert_eq!(
            operators(&ops),
            vec!["q", "cm", "gs", "BT", "TJ", "ET", "BDC", "EMC", "Q"]
        );
        assert!(matches!(ops[1].operands[0], Object::Real(r) if r == 0.5));
        assert!(matches!(ops[1].operands[3], Object::Real(r) if r == 0.5));
        assert!(matches!(ops[1].operands[4], Object::Real(r) if r == -10.25));
        assert!(matches!(ops[4].operands[0], Object::Array(ref a) if a.len() == 3));
        assert!(matches!(ops[6].operands[1], Object::Dictionary(_)));
    }

    #[test]
    fn test_parse_comments_and_inline_image() {
        let data = b"% header\nq BI /W 2 /H 1 /CS /G /BPC 8 ID \x00\xFF EI Q";
        let ops = parse_content(data).unwrap();
        assert_eq!(operators(&ops), vec!["q", "BI", "Q"]);
        assert!(data[ops[1].span.clone()].ends_with(b"EI"));
    }

    #[test]
    fn test_truncated_streams_fail() {
        assert_eq!(
            parse_content(b"BT /F1 12 Tf (Made with GAM").unwrap_err(),
            LexError::UnterminatedString(13)
        );
        assert!(matches!(
            parse_content(b"BT [(a) -20 (b"),
            Err(LexError::UnterminatedString(_))
        ));
        assert!(matches!(
            parse_content(b"BT [(a) -20"),
            Err(LexError::UnterminatedArray(_))
        ));
        assert!(matches!(
            parse_content(b"q 1 0 0 1 0"),
            Err(LexError::DanglingOperands(5))
        ));
        assert!(matches!(
            parse_content(b"BT /F1 12 Tf (x) Tj"),
            Err(LexError::UnbalancedText(_))
        ));
        assert!(matches!(
            parse_content(b"q BI /W 2 ID \x00\x01"),
            Err(LexError::UnterminatedInlineImage(_))
        ));
    }

    #[test]
    fn test_stray_delimiter_fails() {
        assert!(matches!(parse_content(b"q ) Q"), Err(LexError::Unexpected(2, ')'))));
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_content(b"").unwrap().is_empty());
        assert!(parse_content(b"  % only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_excise_and_replace() {
        let data = b"BT 50 700 Td (Keep) Tj (Drop) Tj (Line) ' ET";
        let ops = parse_content(data).unwrap();
        let out = excise(data, &ops, |i| i == 3, |i| (i == 4).then(|| "T*".to_string()));
        assert_eq!(out, b"BT 50 700 Td (Keep) Tj  T* ET".to_vec());
        // Still lexes after the cut
        assert!(parse_content(&out).is_ok());
    }

    #[test]
    fn test_excise_keeps_tokens_apart() {
        let data = b"BT/F1 9 Tf(x)Tj/F2 9 Tf ET";
        let ops = parse_content(data).unwrap();
        let out = excise(data, &ops, |i| i == 2, |_| None);
        assert_eq!(out, b"BT/F1 9 Tf/F2 9 Tf ET".to_vec());
    }
}
