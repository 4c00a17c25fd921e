//! Scanner for indirect register-plus-offset operands.

use crate::config::RegisterGroup;
use crate::error::Result;
use crate::scanners::{ParsedOperand, RegisterOffsetScanner, Scanner};

/// Scanner for `[%reg + addr]`.
#[derive(Debug, Clone)]
pub struct RegisterAddressOffsetScanner {
    inner: RegisterOffsetScanner,
}

impl RegisterAddressOffsetScanner {
    /// Create a scanner over the named group with the given offset-field
    /// layout.
    pub fn new(
        group_name: String,
        group: RegisterGroup,
        offset_bits: u32,
        padding_bits: u32,
        relative: bool,
    ) -> Self {
        RegisterAddressOffsetScanner {
            inner: RegisterOffsetScanner::new(group_name, group, offset_bits, padding_bits, relative),
        }
    }
}

impl Scanner<ParsedOperand> for RegisterAddressOffsetScanner {
    fn type_name(&self) -> String {
        "register_address_offset".to_string()
    }

    fn attempt(&self, line: &str, offset: usize) -> Result<Option<ParsedOperand>> {
        let bytes = line.as_bytes();
        if offset >= bytes.len() || bytes[offset] != b'[' {
            return Ok(None);
        }
        let Some(inner) = self.inner.attempt(line, offset + 1)? else {
            return Ok(None);
        };
        let close = offset + 1 + inner.length_in_chars;
        if close >= bytes.len() || bytes[close] != b']' {
            return Ok(None);
        }
        Ok(Some(ParsedOperand {
            type_name: self.type_name(),
            length_in_chars: inner.length_in_chars + 2,
            value: inner.value,
            n_bits: inner.n_bits,
            relocations: inner.relocations,
        }))
    }
}
