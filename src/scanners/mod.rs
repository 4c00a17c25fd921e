//! Operand scanners.
//!
//! Each scanner recognises one operand kind at a given offset of a source
//! line, returning the consumed length, the numeric payload as it will be
//! packed, its bit width, and any symbolic relocation requests the operand
//! carries. Scanners are pure: they never consume trailing delimiters and
//! never look at assembler state.
//!
//! A scanner distinguishes two failure modes: `Ok(None)` means "this is not
//! my operand kind" and lets the signature matcher try other candidates,
//! while `Err` means the operand was recognised but is invalid (an
//! overflowing immediate, an unterminated literal) and aborts the line.

pub mod address;
pub mod immediate;
pub mod label;
pub mod padding;
pub mod register;
pub mod register_address;
pub mod register_address_offset;
pub mod register_offset;
pub mod string;

pub use address::AddressScanner;
pub use immediate::ImmediateScanner;
pub use label::LabelScanner;
pub use padding::PaddingScanner;
pub use register::RegisterScanner;
pub use register_address::RegisterAddressScanner;
pub use register_address_offset::RegisterAddressOffsetScanner;
pub use register_offset::RegisterOffsetScanner;
pub use string::StringScanner;

use crate::error::{AssemblerError, Result};
use crate::object::RelocationRequest;

/// Anything the signature matcher can advance over.
pub trait Operand {
    /// How many characters of the input line the operand consumed.
    fn length_in_chars(&self) -> usize;
}

/// A text-section operand: the numeric payload and width that the packer
/// shifts into the instruction, plus any relocation requests against
/// symbols the operand references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOperand {
    /// Scanner kind that produced this operand; used in signature listings.
    pub type_name: String,
    /// Characters consumed from the input line.
    pub length_in_chars: usize,
    /// The payload, already positioned for packing.
    pub value: u64,
    /// Width of the packed field.
    pub n_bits: u32,
    /// Relocation requests carried by the operand.
    pub relocations: Vec<RelocationRequest>,
}

impl Operand for ParsedOperand {
    fn length_in_chars(&self) -> usize {
        self.length_in_chars
    }
}

/// A data-section operand: raw bytes to be emitted as words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataOperand {
    /// Scanner kind that produced this operand.
    pub type_name: String,
    /// Characters consumed from the input line.
    pub length_in_chars: usize,
    /// The bytes to emit, one word each.
    pub bytes: Vec<u8>,
}

impl Operand for DataOperand {
    fn length_in_chars(&self) -> usize {
        self.length_in_chars
    }
}

/// A parser for one operand kind.
pub trait Scanner<O: Operand> {
    /// Human-readable kind name, used when listing competing signatures.
    fn type_name(&self) -> String;

    /// Attempt to scan this operand kind at `offset`.
    fn attempt(&self, line: &str, offset: usize) -> Result<Option<O>>;
}

/// Scan a numeric literal at `offset`, returning its length in characters.
///
/// Recognises hexadecimal (`0x…`), binary (`0b…`), and decimal forms, in
/// that order, so a `0x` prefix is never mistaken for a decimal zero.
pub(crate) fn scan_number(line: &str, offset: usize) -> Option<usize> {
    let rest = &line.as_bytes()[offset..];
    if rest.starts_with(b"0x") {
        let digits = rest[2..]
            .iter()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if digits > 0 {
            return Some(2 + digits);
        }
    }
    if rest.starts_with(b"0b") {
        let digits = rest[2..]
            .iter()
            .take_while(|&&b| b == b'0' || b == b'1')
            .count();
        if digits > 0 {
            return Some(2 + digits);
        }
    }
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits > 0 {
        Some(digits)
    } else {
        None
    }
}

/// Parse a numeric literal previously measured by [`scan_number`], with the
/// base detected from its prefix.
pub(crate) fn parse_number(text: &str) -> Result<u64> {
    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(binary) = text.strip_prefix("0b") {
        (binary, 2)
    } else {
        (text, 10)
    };
    u64::from_str_radix(digits, radix).map_err(|_| AssemblerError::NumericOverflow {
        literal: text.to_string(),
    })
}

/// Reject values that do not fit in a `bits`-wide field.
pub(crate) fn check_width(value: u64, bits: u32) -> Result<u64> {
    if bits < 64 && value >> bits != 0 {
        Err(AssemblerError::ValueTooWide { value, bits })
    } else {
        Ok(value)
    }
}

/// Length of the identifier (`[A-Za-z_][A-Za-z0-9_]*`) at `offset`, or zero.
pub(crate) fn scan_identifier(line: &str, offset: usize) -> usize {
    let bytes = &line.as_bytes()[offset..];
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count()
}

/// Length of the quoted literal starting at `offset`, including both
/// quotes, or `None` when the line ends before the closing quote. The
/// opening quote character itself delimits; backslash escapes are skipped
/// pairwise.
pub(crate) fn scan_quoted(line: &str, offset: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let quote = bytes[offset];
    let mut position = offset + 1;
    while position < bytes.len() {
        if bytes[position] == quote {
            return Some(position + 1 - offset);
        }
        if bytes[position] == b'\\' {
            position += 2;
        } else {
            position += 1;
        }
    }
    None
}

/// Resolve backslash escapes character by character, JSON-style.
///
/// Accepts the JSON escape set plus `\'` and `\0`; an unknown escape keeps
/// the escaped character itself.
pub(crate) fn decode_escapes(contents: &str) -> Result<String> {
    let mut decoded = String::with_capacity(contents.len());
    let mut chars = contents.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }
        match chars.next() {
            None => {
                return Err(AssemblerError::InvalidStringLiteral {
                    message: "trailing backslash".to_string(),
                })
            }
            Some('n') => decoded.push('\n'),
            Some('t') => decoded.push('\t'),
            Some('r') => decoded.push('\r'),
            Some('b') => decoded.push('\u{8}'),
            Some('f') => decoded.push('\u{c}'),
            Some('0') => decoded.push('\0'),
            Some('u') => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = chars
                        .next()
                        .and_then(|d| d.to_digit(16))
                        .ok_or_else(|| AssemblerError::InvalidStringLiteral {
                            message: "\\u escape needs four hex digits".to_string(),
                        })?;
                    code = code * 16 + digit;
                }
                decoded.push(char::from_u32(code).ok_or_else(|| {
                    AssemblerError::InvalidStringLiteral {
                        message: format!("\\u{code:04x} is not a character"),
                    }
                })?);
            }
            Some(other) => decoded.push(other),
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_number_bases() {
        assert_eq!(scan_number("123,", 0), Some(3));
        assert_eq!(scan_number("0x1f ", 0), Some(4));
        assert_eq!(scan_number("0b1010", 0), Some(6));
        assert_eq!(scan_number("x", 0), None);
    }

    #[test]
    fn test_scan_number_bare_prefix_falls_back_to_decimal() {
        // "0x" without digits is the decimal literal 0 followed by junk.
        assert_eq!(scan_number("0xg", 0), Some(1));
        assert_eq!(scan_number("0b2", 0), Some(1));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42").unwrap(), 42);
        assert_eq!(parse_number("0x1f").unwrap(), 0x1F);
        assert_eq!(parse_number("0b1010").unwrap(), 10);
        assert!(parse_number("99999999999999999999999").is_err());
    }

    #[test]
    fn test_check_width() {
        assert!(check_width(255, 8).is_ok());
        assert!(check_width(256, 8).is_err());
        assert!(check_width(u64::MAX, 64).is_ok());
    }

    #[test]
    fn test_scan_identifier() {
        assert_eq!(scan_identifier("loop_1:", 0), 6);
        assert_eq!(scan_identifier("_x", 0), 2);
        assert_eq!(scan_identifier("9lives", 0), 0);
    }

    #[test]
    fn test_scan_quoted() {
        assert_eq!(scan_quoted(r#""abc" rest"#, 0), Some(5));
        assert_eq!(scan_quoted(r#""a\"b""#, 0), Some(6));
        assert_eq!(scan_quoted("'x'", 0), Some(3));
        assert_eq!(scan_quoted(r#""open"#, 0), None);
    }

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode_escapes(r"a\nb").unwrap(), "a\nb");
        assert_eq!(decode_escapes(r#"\"\'"#).unwrap(), "\"'");
        assert_eq!(decode_escapes(r"A").unwrap(), "A");
        assert!(decode_escapes(r"\u00").is_err());
    }
}
