//! The data-section assembler: string literal emission.

use std::collections::BTreeMap;

use crate::error::{AssemblerError, Result};
use crate::matcher::{match_operands, Signature};
use crate::object::{Section, SectionKind};
use crate::scanners::{DataOperand, StringScanner};
use crate::sections::SectionAssembler;

use std::sync::Arc;

/// The data-section assembler.
///
/// Knows two pseudo-ops: `ascii` emits a string's bytes as words, `asciiz`
/// additionally appends one null word.
pub struct DataSectionAssembler {
    byte_bits: u32,
    signatures: BTreeMap<&'static str, Signature<DataOperand>>,
    section: Section,
}

impl DataSectionAssembler {
    /// Create an assembler emitting `byte_bits`-wide words.
    pub fn new(byte_bits: u32) -> Self {
        let mut signatures: BTreeMap<&'static str, Signature<DataOperand>> = BTreeMap::new();
        signatures.insert("ascii", vec![Arc::new(StringScanner::new(false))]);
        signatures.insert("asciiz", vec![Arc::new(StringScanner::new(true))]);
        DataSectionAssembler {
            byte_bits,
            signatures,
            section: Section::new(SectionKind::Data, byte_bits),
        }
    }
}

impl SectionAssembler for DataSectionAssembler {
    fn section_name(&self) -> &'static str {
        SectionKind::Data.name()
    }

    fn add_label(&mut self, name: &str) {
        self.section.add_symbol(name);
    }

    fn add_command(&mut self, mnemonic: &str, operands: &str) -> Result<()> {
        let signature = self
            .signatures
            .get(mnemonic)
            .ok_or_else(|| AssemblerError::UnknownMnemonic {
                mnemonic: mnemonic.to_string(),
            })?;
        let (_, parsed) = match_operands(mnemonic, operands, &[signature])?;
        for operand in parsed {
            for byte in operand.bytes {
                if self.byte_bits < 8 && u32::from(byte) >> self.byte_bits != 0 {
                    return Err(AssemblerError::ValueTooWide {
                        value: u64::from(byte),
                        bits: self.byte_bits,
                    });
                }
                self.section.push_word(u64::from(byte));
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Section {
        std::mem::replace(&mut self.section, Section::new(SectionKind::Data, self.byte_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_emits_bytes() {
        let mut assembler = DataSectionAssembler::new(8);
        assembler.add_command("ascii", r#" "hi""#).unwrap();
        assert_eq!(assembler.finish().words, vec![b'h' as u64, b'i' as u64]);
    }

    #[test]
    fn test_asciiz_appends_null_word() {
        let mut assembler = DataSectionAssembler::new(8);
        assembler.add_command("asciiz", r#" "ok""#).unwrap();
        assert_eq!(
            assembler.finish().words,
            vec![b'o' as u64, b'k' as u64, 0]
        );
    }

    #[test]
    fn test_labels_mark_word_offsets() {
        let mut assembler = DataSectionAssembler::new(8);
        assembler.add_command("ascii", r#" "x""#).unwrap();
        assembler.add_label("after");
        let section = assembler.finish();
        assert_eq!(section.symbols[0].name, "after");
        assert_eq!(section.symbols[0].location.offset, 1);
    }

    #[test]
    fn test_unknown_pseudo_op() {
        let mut assembler = DataSectionAssembler::new(8);
        let err = assembler.add_command("word", " 5").unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownMnemonic { .. }));
    }

    #[test]
    fn test_narrow_words_reject_wide_bytes() {
        let mut assembler = DataSectionAssembler::new(6);
        let err = assembler.add_command("ascii", r#" "a""#).unwrap_err();
        assert!(matches!(err, AssemblerError::ValueTooWide { .. }));
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let mut assembler = DataSectionAssembler::new(8);
        let err = assembler.add_command("ascii", r#" "open"#).unwrap_err();
        assert!(matches!(err, AssemblerError::UnterminatedString));
    }
}
