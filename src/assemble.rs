//! Assembly entry point.
//!
//! [`Assembler`] turns an ISA description into concrete section
//! assemblers, expanding every command's argument descriptors into all
//! combinations of their candidate scanners, and drives a source file
//! through them into an [`ObjectFile`].

use std::sync::Arc;

use crate::config::Configuration;
use crate::error::Result;
use crate::object::{ObjectFile, Section, SectionKind};
use crate::parse::SourceParser;
use crate::scanners::{ParsedOperand, Scanner};
use crate::sections::{
    CommandDefinition, DataSectionAssembler, TextSectionAssembler, TextSectionParameters,
};

/// An assembler for one ISA description.
pub struct Assembler {
    configuration: Configuration,
}

impl Assembler {
    /// Create an assembler, validating the description first.
    pub fn new(configuration: Configuration) -> Result<Self> {
        configuration.validate()?;
        Ok(Assembler { configuration })
    }

    /// Assemble a complete source file into an object.
    pub fn assemble(&self, source: &str) -> Result<ObjectFile> {
        let text = TextSectionAssembler::new(
            TextSectionParameters {
                byte_bits: self.configuration.text_byte_length,
                opcode_length: self.configuration.opcode_length,
                opcode_offset: self.configuration.opcode_offset,
                text_address_bits: self.configuration.text_address_size,
                data_address_bits: self.configuration.data_address_size,
            },
            self.command_definitions()?,
        );
        let data = DataSectionAssembler::new(self.configuration.data_byte_length);

        let mut parser = SourceParser::new(vec![Box::new(text), Box::new(data)]);
        parser.parse(source)?;

        let mut text_section = None;
        let mut data_section = None;
        for section in parser.finish() {
            match section.kind {
                SectionKind::Text => text_section = Some(section),
                SectionKind::Data => data_section = Some(section),
            }
        }
        Ok(ObjectFile::new(
            self.configuration.object_parameters(),
            text_section.unwrap_or_else(|| {
                Section::new(SectionKind::Text, self.configuration.text_byte_length)
            }),
            data_section.unwrap_or_else(|| {
                Section::new(SectionKind::Data, self.configuration.data_byte_length)
            }),
        ))
    }

    /// Expand every command into one definition per combination of its
    /// arguments' candidate scanners.
    fn command_definitions(&self) -> Result<Vec<CommandDefinition>> {
        let mut definitions = Vec::new();
        for command in &self.configuration.commands {
            let pre_opcode_arguments = command.pre_opcode_arguments(&self.configuration)?;
            let candidates: Vec<Vec<Arc<dyn Scanner<ParsedOperand>>>> = command
                .arguments
                .iter()
                .map(|argument| argument.scanners(&self.configuration))
                .collect::<Result<_>>()?;
            for signature in cartesian(&candidates) {
                definitions.push(CommandDefinition {
                    mnemonic: command.mnemonic.clone(),
                    opcode: command.opcode,
                    signature,
                    pre_opcode_arguments,
                });
            }
        }
        Ok(definitions)
    }
}

/// All combinations picking one element per set, in declaration order.
/// A command with no arguments yields a single empty signature.
fn cartesian<T: Clone>(sets: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut combinations = vec![Vec::new()];
    for set in sets {
        let mut extended = Vec::with_capacity(combinations.len() * set.len());
        for combination in &combinations {
            for item in set {
                let mut next = combination.clone();
                next.push(item.clone());
                extended.push(next);
            }
        }
        combinations = extended;
    }
    combinations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssemblerError;

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
  - mnemonic: ldr
    opcode: 0x21
    arguments:
      - type: register
        group: general
      - type: data_address
        bits: 16
register_groups:
  general:
    length: 8
    registers: [r0, r1, r2, r3]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_cartesian_product() {
        let product = cartesian(&[vec![1, 2], vec![10], vec![100, 200]]);
        assert_eq!(product.len(), 4);
        assert_eq!(product[0], vec![1, 10, 100]);
        assert_eq!(product[3], vec![2, 10, 200]);
        assert_eq!(cartesian::<i32>(&[]), vec![Vec::<i32>::new()]);
    }

    #[test]
    fn test_address_arguments_expand_to_two_signatures() {
        let assembler = Assembler::new(configuration()).unwrap();
        let definitions = assembler.command_definitions().unwrap();
        // nop: 1; jmp: label|address = 2; ldr: register x (label|address) = 2.
        assert_eq!(definitions.len(), 5);
    }

    #[test]
    fn test_assemble_program() {
        let assembler = Assembler::new(configuration()).unwrap();
        let object = assembler
            .assemble(".text\nstart:\nnop\njmp start\n.data\nmessage: asciiz \"Hi\"\n")
            .unwrap();

        assert_eq!(object.text.words, vec![0x00, 0x20, 0x00, 0x00]);
        assert_eq!(object.text.symbols[0].name, "start");
        assert_eq!(object.text.relocations.len(), 1);
        assert_eq!(object.text.relocations[0].location.offset, 2);

        assert_eq!(object.data.words, vec![b'H' as u64, b'i' as u64, 0]);
        assert_eq!(object.data.symbols[0].name, "message");
        assert_eq!(object.data.symbols[0].location.offset, 0);
    }

    #[test]
    fn test_assemble_numeric_address() {
        let assembler = Assembler::new(configuration()).unwrap();
        let object = assembler.assemble(".text\njmp 0x1234\n").unwrap();
        assert_eq!(object.text.words, vec![0x20, 0x12, 0x34]);
        assert!(object.text.relocations.is_empty());
    }

    #[test]
    fn test_data_address_targets_data_section() {
        let assembler = Assembler::new(configuration()).unwrap();
        let object = assembler.assemble(".text\nldr %r1, message\n").unwrap();
        assert_eq!(object.text.words, vec![0x21, 0x01, 0x00, 0x00]);
        let relocation = &object.text.relocations[0];
        assert_eq!(relocation.target.section, SectionKind::Data);
        assert_eq!(relocation.location.offset, 2);
    }

    #[test]
    fn test_invalid_description_rejected_up_front() {
        let mut bad = configuration();
        bad.opcode_offset = 3;
        assert!(matches!(
            Assembler::new(bad),
            Err(AssemblerError::OpcodeOffsetMisaligned { .. })
        ));
    }
}
