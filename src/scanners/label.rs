//! Scanner for label references.
//!
//! A label reference is an identifier followed by whitespace, a comma, or
//! the end of the line. It may be preceded by an `ABSOLUTE` or `OFFSET`
//! override that forces the relocation's relativity regardless of what the
//! argument declares, and followed by `+ N`, a numeric addend that becomes
//! the initial value of the field (the linker's patch lands on top of it).

use crate::error::Result;
use crate::object::{RelocationRequest, RelocationTarget, SectionKind};
use crate::scanners::{
    check_width, parse_number, scan_identifier, scan_number, ParsedOperand, Scanner,
};

/// Relativity override prefixes: keyword and the relativity it forces.
const OVERRIDES: [(&str, bool); 2] = [("ABSOLUTE", false), ("OFFSET", true)];

/// Scanner for label references of a fixed field width.
#[derive(Debug, Clone)]
pub struct LabelScanner {
    n_bits: u32,
    relative: bool,
    target_section: SectionKind,
}

impl LabelScanner {
    /// Create a scanner producing `n_bits`-wide relocations against
    /// symbols of `target_section`.
    pub fn new(n_bits: u32, relative: bool, target_section: SectionKind) -> Self {
        LabelScanner {
            n_bits,
            relative,
            target_section,
        }
    }

    /// Match one override keyword plus the whitespace that must follow it,
    /// returning the position after the whitespace and the forced
    /// relativity.
    fn scan_override(&self, line: &str, offset: usize) -> Option<(usize, bool)> {
        let bytes = line.as_bytes();
        for (keyword, relative) in OVERRIDES {
            if !line[offset..].starts_with(keyword) {
                continue;
            }
            let mut position = offset + keyword.len();
            if position >= bytes.len() || !bytes[position].is_ascii_whitespace() {
                continue;
            }
            while position < bytes.len() && bytes[position].is_ascii_whitespace() {
                position += 1;
            }
            return Some((position, relative));
        }
        None
    }

    /// Match `+ N` after the identifier, returning the addend and the
    /// position after it.
    fn scan_addend(&self, line: &str, offset: usize) -> Result<Option<(u64, usize)>> {
        let bytes = line.as_bytes();
        let mut position = offset;
        while position < bytes.len() && bytes[position].is_ascii_whitespace() {
            position += 1;
        }
        if position >= bytes.len() || bytes[position] != b'+' {
            return Ok(None);
        }
        position += 1;
        while position < bytes.len() && bytes[position].is_ascii_whitespace() {
            position += 1;
        }
        let Some(length) = scan_number(line, position) else {
            return Ok(None);
        };
        let value = parse_number(&line[position..position + length])?;
        check_width(value, self.n_bits)?;
        Ok(Some((value, position + length)))
    }
}

impl Scanner<ParsedOperand> for LabelScanner {
    fn type_name(&self) -> String {
        "label".to_string()
    }

    fn attempt(&self, line: &str, offset: usize) -> Result<Option<ParsedOperand>> {
        let bytes = line.as_bytes();
        let (ident_start, relative) = match self.scan_override(line, offset) {
            Some((position, forced)) => (position, forced),
            None => (offset, self.relative),
        };

        let ident_length = scan_identifier(line, ident_start);
        if ident_length == 0 {
            return Ok(None);
        }
        let ident_end = ident_start + ident_length;
        if ident_end < bytes.len()
            && !bytes[ident_end].is_ascii_whitespace()
            && bytes[ident_end] != b','
        {
            return Ok(None);
        }
        let name = &line[ident_start..ident_end];

        let (addend, end) = match self.scan_addend(line, ident_end)? {
            Some((value, position)) => (value, position),
            None => (0, ident_end),
        };

        Ok(Some(ParsedOperand {
            type_name: self.type_name(),
            length_in_chars: end - offset,
            value: 0,
            n_bits: self.n_bits,
            relocations: vec![RelocationRequest {
                target: RelocationTarget {
                    name: name.to_string(),
                    section: self.target_section,
                },
                size: self.n_bits,
                offset: 0,
                relative,
                addend,
            }],
        }))
    }
}
