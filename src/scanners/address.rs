//! Scanner for bare numeric addresses.

use crate::error::Result;
use crate::scanners::{check_width, parse_number, scan_number, ParsedOperand, Scanner};

/// Scanner for a bare numeric address of a fixed bit width.
#[derive(Debug, Clone)]
pub struct AddressScanner {
    bits: u32,
}

impl AddressScanner {
    /// Create a scanner for a `bits`-wide address field.
    pub fn new(bits: u32) -> Self {
        AddressScanner { bits }
    }
}

impl Scanner<ParsedOperand> for AddressScanner {
    fn type_name(&self) -> String {
        "address".to_string()
    }

    fn attempt(&self, line: &str, offset: usize) -> Result<Option<ParsedOperand>> {
        let Some(length) = scan_number(line, offset) else {
            return Ok(None);
        };
        let value = parse_number(&line[offset..offset + length])?;
        check_width(value, self.bits)?;
        Ok(Some(ParsedOperand {
            type_name: self.type_name(),
            length_in_chars: length,
            value,
            n_bits: self.bits,
            relocations: Vec::new(),
        }))
    }
}
