//! Object-level disassembly.
//!
//! Renders a whole object: the header summary, the decoded text section,
//! and a raw word dump of the data section.

use crate::bits::pretty_word;
use crate::config::Configuration;
use crate::disassemble_text::TextDisassembler;
use crate::error::{AssemblerError, Result};
use crate::object::{ObjectFile, Section};

/// A disassembler for one ISA description.
pub struct Disassembler<'a> {
    configuration: &'a Configuration,
}

impl<'a> Disassembler<'a> {
    /// Create a disassembler over the given description.
    pub fn new(configuration: &'a Configuration) -> Self {
        Disassembler { configuration }
    }

    /// Render the object header only.
    pub fn disassemble_header(&self, object: &ObjectFile) -> String {
        object.summary()
    }

    /// Render the whole object.
    pub fn disassemble(&self, object: &ObjectFile) -> Result<String> {
        if object.parameters != self.configuration.object_parameters() {
            return Err(AssemblerError::InvalidDescription {
                message: "object header parameters do not match the ISA description".to_string(),
            });
        }

        let mut blocks = vec![object.summary()];

        let text_listing = TextDisassembler::new(self.configuration).disassemble(&object.text)?;
        blocks.push(if text_listing.is_empty() {
            ".text".to_string()
        } else {
            format!(".text\n{text_listing}")
        });

        let data_dump = raw_display(&object.data);
        blocks.push(if data_dump.is_empty() {
            ".data # (not disassembled)".to_string()
        } else {
            format!(".data # (not disassembled)\n{data_dump}")
        });

        Ok(blocks.join("\n\n"))
    }
}

/// Dump a section's words, sixteen per line, with word offsets.
fn raw_display(section: &Section) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (index, &word) in section.words.iter().enumerate() {
        if index % 16 == 0 {
            lines.push(format!("{index:08x}:"));
        }
        let line = lines.last_mut().expect("line started above");
        line.push(' ');
        line.push_str(&pretty_word(word, section.byte_bits));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::Assembler;

    fn configuration() -> Configuration {
        Configuration::from_yaml(
            r#"
opcode_length: 8
opcode_offset: 0
text_byte_length: 8
data_byte_length: 8
text_address_size: 16
data_address_size: 16
commands:
  - mnemonic: nop
    opcode: 0
  - mnemonic: jmp
    opcode: 0x20
    arguments:
      - type: text_address
        bits: 16
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_full_listing() {
        let configuration = configuration();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nstart:\njmp start\n.data\nasciiz \"ab\"\n")
            .unwrap();
        let listing = Disassembler::new(&configuration).disassemble(&object).unwrap();
        assert!(listing.starts_with("object file:"));
        assert!(listing.contains(".text\n"));
        assert!(listing.contains("jmp start"));
        assert!(listing.contains(".data # (not disassembled)\n00000000: 61 62 00"));
    }

    #[test]
    fn test_header_only() {
        let configuration = configuration();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nnop\n")
            .unwrap();
        let header = Disassembler::new(&configuration).disassemble_header(&object);
        assert!(header.contains(".text: 1 words"));
        assert!(!header.contains("nop"));
    }

    #[test]
    fn test_parameter_mismatch_is_rejected() {
        let configuration = configuration();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nnop\n")
            .unwrap();
        let mut other = configuration.clone();
        other.text_address_size = 32;
        let err = Disassembler::new(&other).disassemble(&object).unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn test_empty_sections() {
        let configuration = configuration();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble("")
            .unwrap();
        let listing = Disassembler::new(&configuration).disassemble(&object).unwrap();
        assert!(listing.contains(".text\n\n.data # (not disassembled)"));
    }
}
