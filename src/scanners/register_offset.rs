//! Scanner for register-plus-offset operands.
//!
//! `%reg + addr` packs the register index into the high bits, then the
//! declared padding, then the offset field. When the offset is a label,
//! its relocation requests are re-based past the register and padding bits
//! to reflect their position in the packed field.

use crate::config::RegisterGroup;
use crate::error::Result;
use crate::object::SectionKind;
use crate::scanners::{AddressScanner, LabelScanner, ParsedOperand, RegisterScanner, Scanner};

/// Scanner for `%reg + (label|address)`.
#[derive(Debug, Clone)]
pub struct RegisterOffsetScanner {
    register: RegisterScanner,
    label: LabelScanner,
    address: AddressScanner,
    offset_bits: u32,
    padding_bits: u32,
}

impl RegisterOffsetScanner {
    /// Create a scanner over the named group with the given offset-field
    /// layout.
    pub fn new(
        group_name: String,
        group: RegisterGroup,
        offset_bits: u32,
        padding_bits: u32,
        relative: bool,
    ) -> Self {
        RegisterOffsetScanner {
            register: RegisterScanner::new(group_name, group),
            label: LabelScanner::new(offset_bits, relative, SectionKind::Text),
            address: AddressScanner::new(offset_bits),
            offset_bits,
            padding_bits,
        }
    }

    /// Match `+` with optional whitespace on both sides, returning the
    /// position after it.
    fn scan_plus(line: &str, offset: usize) -> Option<usize> {
        let bytes = line.as_bytes();
        let mut position = offset;
        while position < bytes.len() && bytes[position].is_ascii_whitespace() {
            position += 1;
        }
        if position >= bytes.len() || bytes[position] != b'+' {
            return None;
        }
        position += 1;
        while position < bytes.len() && bytes[position].is_ascii_whitespace() {
            position += 1;
        }
        Some(position)
    }
}

impl Scanner<ParsedOperand> for RegisterOffsetScanner {
    fn type_name(&self) -> String {
        "register_offset".to_string()
    }

    fn attempt(&self, line: &str, offset: usize) -> Result<Option<ParsedOperand>> {
        let Some(register) = self.register.attempt(line, offset)? else {
            return Ok(None);
        };
        let Some(body_start) = Self::scan_plus(line, offset + register.length_in_chars) else {
            return Ok(None);
        };

        let body = match self.label.attempt(line, body_start)? {
            Some(label) => label,
            None => match self.address.attempt(line, body_start)? {
                Some(address) => address,
                None => return Ok(None),
            },
        };

        let rebase = self.padding_bits + register.n_bits;
        let relocations = body
            .relocations
            .into_iter()
            .map(|mut request| {
                request.offset += rebase;
                request
            })
            .collect();

        Ok(Some(ParsedOperand {
            type_name: self.type_name(),
            length_in_chars: body_start + body.length_in_chars - offset,
            value: register.value << (self.padding_bits + self.offset_bits) | body.value,
            n_bits: register.n_bits + self.padding_bits + self.offset_bits,
            relocations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegisterSet;

    fn scanner(padding_bits: u32) -> RegisterOffsetScanner {
        RegisterOffsetScanner::new(
            "general".to_string(),
            RegisterGroup {
                length: 2,
                registers: RegisterSet::Ordered(vec![
                    "r0".to_string(),
                    "r1".to_string(),
                    "r2".to_string(),
                    "r3".to_string(),
                ]),
            },
            10,
            padding_bits,
            false,
        )
    }

    #[test]
    fn test_numeric_offset() {
        let operand = scanner(0).attempt("%r2 + 0x14", 0).unwrap().unwrap();
        assert_eq!(operand.value, 2 << 10 | 0x14);
        assert_eq!(operand.n_bits, 12);
        assert_eq!(operand.length_in_chars, 10);
        assert!(operand.relocations.is_empty());
    }

    #[test]
    fn test_padding_sits_between_register_and_offset() {
        let operand = scanner(4).attempt("%r1 + 3", 0).unwrap().unwrap();
        assert_eq!(operand.value, 1 << 14 | 3);
        assert_eq!(operand.n_bits, 16);
    }

    #[test]
    fn test_label_offset_rebases_relocation() {
        let operand = scanner(4).attempt("%r3 + start", 0).unwrap().unwrap();
        assert_eq!(operand.value, 3 << 14);
        let request = &operand.relocations[0];
        assert_eq!(request.target.name, "start");
        assert_eq!(request.size, 10);
        // Past 4 padding bits and the 2-bit register index.
        assert_eq!(request.offset, 6);
    }

    #[test]
    fn test_label_offset_with_addend() {
        let operand = scanner(0).attempt("%r0 + lbl + 8", 0).unwrap().unwrap();
        assert_eq!(operand.relocations[0].addend, 8);
        assert_eq!(operand.length_in_chars, 13);
    }

    #[test]
    fn test_plus_is_required() {
        assert!(scanner(0).attempt("%r1 5", 0).unwrap().is_none());
        assert!(scanner(0).attempt("%r1", 0).unwrap().is_none());
    }
}
