//! Zero-width scanner for padding fields.

use crate::error::Result;
use crate::scanners::{ParsedOperand, Scanner};

/// Scanner for padding pseudo-arguments: always succeeds, consumes
/// nothing, packs zero.
#[derive(Debug, Clone)]
pub struct PaddingScanner {
    bits: u32,
}

impl PaddingScanner {
    /// Create a scanner for a `bits`-wide padding field.
    pub fn new(bits: u32) -> Self {
        PaddingScanner { bits }
    }
}

impl Scanner<ParsedOperand> for PaddingScanner {
    fn type_name(&self) -> String {
        "padding".to_string()
    }

    fn attempt(&self, _line: &str, _offset: usize) -> Result<Option<ParsedOperand>> {
        Ok(Some(ParsedOperand {
            type_name: self.type_name(),
            length_in_chars: 0,
            value: 0,
            n_bits: self.bits,
            relocations: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_consumes_nothing() {
        let operand = PaddingScanner::new(6).attempt("%r1", 0).unwrap().unwrap();
        assert_eq!(operand.length_in_chars, 0);
        assert_eq!(operand.value, 0);
        assert_eq!(operand.n_bits, 6);
    }
}
