//! Text-section disassembly.
//!
//! Instructions are decoded one at a time: just enough words are read to
//! cover the opcode, the mnemonic is identified, and the remaining operand
//! fields are extracted with a bit cursor that reads further words as they
//! come into range. Operands render symbolically when a stored relocation
//! starts inside their field.

use crate::bits::{extract_bits, pretty_word};
use crate::config::Configuration;
use crate::error::{AssemblerError, Result};
use crate::object::{Relocation, Section};

/// A disassembler for one text section.
pub struct TextDisassembler<'a> {
    configuration: &'a Configuration,
}

impl<'a> TextDisassembler<'a> {
    /// Create a disassembler over the given description.
    pub fn new(configuration: &'a Configuration) -> Self {
        TextDisassembler { configuration }
    }

    /// Produce the listing: one line per instruction, preceded by any
    /// labels whose address falls on it, with the raw words in an aligned
    /// `#` margin.
    pub fn disassemble(&self, section: &Section) -> Result<String> {
        let byte_bits = self.configuration.text_byte_length;

        let mut symbols: Vec<_> = section.symbols.iter().collect();
        symbols.sort_by_key(|symbol| symbol.location.offset);
        let mut next_symbol = 0;

        struct Entry<'s> {
            labels: Vec<&'s str>,
            address: usize,
            text: String,
            words: String,
        }

        let mut entries: Vec<Entry> = Vec::new();
        let mut address = 0usize;
        while address < section.words.len() {
            let (text, words_read) =
                self.disassemble_command(&section.words, address, &section.relocations)?;
            let end = address + words_read;
            let words = section.words[address..end]
                .iter()
                .map(|&word| pretty_word(word, byte_bits))
                .collect::<Vec<_>>()
                .join(" ");
            let mut labels = Vec::new();
            while next_symbol < symbols.len() && symbols[next_symbol].location.offset < end {
                labels.push(symbols[next_symbol].name.as_str());
                next_symbol += 1;
            }
            entries.push(Entry {
                labels,
                address,
                text,
                words,
            });
            address = end;
        }

        let text_width = entries.iter().map(|entry| entry.text.len()).max().unwrap_or(0);
        let address_digits = (self.configuration.text_address_size as usize + 3) / 4;
        let mut lines = Vec::new();
        for entry in entries {
            for label in entry.labels {
                lines.push(format!("    {label}:"));
            }
            lines.push(format!(
                "{:0address_digits$x}: {:<text_width$} # {}",
                entry.address, entry.text, entry.words
            ));
        }
        Ok(lines.join("\n"))
    }

    /// Decode one instruction starting at word `start`, returning its
    /// rendered form and the number of words it covered.
    fn disassemble_command(
        &self,
        words: &[u64],
        start: usize,
        relocations: &[Relocation],
    ) -> Result<(String, usize)> {
        let configuration = self.configuration;
        let byte_bits = configuration.text_byte_length;
        let opcode_length = configuration.opcode_length;

        // The minimum read that fully covers the opcode.
        let opcode_end = configuration.opcode_offset + opcode_length;
        let mut read = (opcode_end as usize + byte_bits as usize - 1) / byte_bits as usize;
        if start + read > words.len() {
            return Err(AssemblerError::TruncatedInstruction { offset: start });
        }
        let opcode = extract_bits(
            &words[start..start + read],
            byte_bits,
            configuration.opcode_offset as usize,
            opcode_length,
        );
        let command = configuration
            .commands
            .iter()
            .find(|command| command.opcode == opcode)
            .ok_or(AssemblerError::UnknownOpcode { opcode })?;

        let pre_opcode_arguments = command.pre_opcode_arguments(configuration)?;
        let command_length = command.total_bits(configuration)?;

        let mut offset: u32 = 0;
        if pre_opcode_arguments == 0 {
            offset += opcode_length;
        }
        let mut rendered = Vec::with_capacity(command.arguments.len());
        for (index, argument) in command.arguments.iter().enumerate() {
            let width = argument.length_bits(configuration)?;
            offset += width;
            while offset as usize > read * byte_bits as usize {
                if start + read >= words.len() {
                    return Err(AssemblerError::TruncatedInstruction { offset: start });
                }
                read += 1;
            }

            let field_start = (offset - width) as usize;
            let value = extract_bits(&words[start..start + read], byte_bits, field_start, width);

            let absolute_start = start * byte_bits as usize + field_start;
            let matching: Vec<&Relocation> = relocations
                .iter()
                .filter(|relocation| {
                    let relocation_start = relocation.location.offset * byte_bits as usize
                        + relocation.offset as usize;
                    relocation_start >= absolute_start
                        && relocation_start < absolute_start + width as usize
                })
                .collect();

            let end_offset_words =
                (field_start as i64 - command_length as i64).div_euclid(byte_bits as i64);
            rendered.push(argument.render(value, &matching, end_offset_words, configuration)?);

            if index + 1 == pre_opcode_arguments {
                offset += opcode_length;
            }
        }

        if offset % byte_bits != 0 {
            return Err(AssemblerError::MisalignedInstruction {
                mnemonic: command.mnemonic.clone(),
            });
        }

        let arguments: Vec<String> = rendered
            .into_iter()
            .filter(|argument| !argument.is_empty())
            .collect();
        let text = if arguments.is_empty() {
            command.mnemonic.clone()
        } else {
            format!("{} {}", command.mnemonic, arguments.join(" "))
        };
        Ok((text, offset as usize / byte_bits as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::Assembler;
    use pretty_assertions::assert_eq;

    fn configuration(yaml: &str) -> Configuration {
        Configuration::from_yaml(yaml).unwrap()
    }

    fn eight_bit_isa() -> Configuration {
        configuration(
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
  - mnemonic: ldi
    opcode: 0x30
    arguments:
      - type: register
        group: general
      - type: immediate
        bits: 8
  - mnemonic: str
    opcode: 0x31
    arguments:
      - type: padding
        bits: 8
      - type: register_address
        group: general
register_groups:
  general:
    length: 8
    registers: [r0, r1, r2, r3]
"#,
        )
    }

    fn disassemble(configuration: &Configuration, section: &Section) -> String {
        TextDisassembler::new(configuration)
            .disassemble(section)
            .unwrap()
    }

    #[test]
    fn test_single_opcode() {
        let configuration = eight_bit_isa();
        let mut section = Section::new(crate::object::SectionKind::Text, 8);
        section.push_word(0x00);
        let listing = disassemble(&configuration, &section);
        assert_eq!(listing, "0000: nop # 00");
    }

    #[test]
    fn test_round_trip_with_labels_and_relocation() {
        let configuration = eight_bit_isa();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nstart:\nnop\njmp start\n")
            .unwrap();
        let listing = disassemble(&configuration, &object.text);
        assert_eq!(
            listing,
            "    start:\n0000: nop       # 00\n0001: jmp start # 20 00 00"
        );
    }

    #[test]
    fn test_numeric_operands_round_trip() {
        let configuration = eight_bit_isa();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nldi %r2, $0x2a\n")
            .unwrap();
        let listing = disassemble(&configuration, &object.text);
        assert_eq!(listing, "0000: ldi %r2 $42 # 30 02 2a");
    }

    #[test]
    fn test_padding_renders_invisibly() {
        let configuration = eight_bit_isa();
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nstr [%r1]\n")
            .unwrap();
        let listing = disassemble(&configuration, &object.text);
        assert_eq!(listing, "0000: str [%r1] # 31 00 01");
    }

    #[test]
    fn test_non_zero_padding_is_fatal() {
        let configuration = eight_bit_isa();
        let mut section = Section::new(crate::object::SectionKind::Text, 8);
        for word in [0x31, 0x05, 0x01] {
            section.push_word(word);
        }
        let err = TextDisassembler::new(&configuration)
            .disassemble(&section)
            .unwrap_err();
        assert!(matches!(err, AssemblerError::NonZeroPadding { value: 5 }));
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let configuration = eight_bit_isa();
        let mut section = Section::new(crate::object::SectionKind::Text, 8);
        section.push_word(0x7F);
        let err = TextDisassembler::new(&configuration)
            .disassemble(&section)
            .unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownOpcode { opcode: 0x7F }));
    }

    #[test]
    fn test_truncated_instruction_is_fatal() {
        let configuration = eight_bit_isa();
        let mut section = Section::new(crate::object::SectionKind::Text, 8);
        section.push_word(0x20);
        section.push_word(0x00);
        let err = TextDisassembler::new(&configuration)
            .disassemble(&section)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblerError::TruncatedInstruction { offset: 0 }
        ));
    }

    #[test]
    fn test_six_bit_words_render_binary() {
        let configuration = configuration(
            r#"
opcode_length: 6
opcode_offset: 0
text_byte_length: 6
data_byte_length: 6
text_address_size: 12
data_address_size: 12
commands:
  - mnemonic: hlt
    opcode: 15
"#,
        );
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nhlt\n")
            .unwrap();
        assert_eq!(object.text.words, vec![0b001111]);
        let listing = disassemble(&configuration, &object.text);
        assert_eq!(listing, "000: hlt # 001111");
    }

    #[test]
    fn test_pre_opcode_argument_decodes() {
        let configuration = configuration(
            r#"
opcode_length: 4
opcode_offset: 4
text_byte_length: 8
data_byte_length: 8
text_address_size: 8
data_address_size: 8
commands:
  - mnemonic: mix
    opcode: 0x9
    arguments:
      - type: immediate
        bits: 4
      - type: immediate
        bits: 8
"#,
        );
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\nmix $3, $0xab\n")
            .unwrap();
        assert_eq!(object.text.words, vec![0x39, 0xAB]);
        let listing = disassemble(&configuration, &object.text);
        assert_eq!(listing, "00: mix $3 $171 # 39 ab");
    }

    #[test]
    fn test_register_offset_renders_symbolically() {
        let configuration = configuration(
            r#"
opcode_length: 8
opcode_offset: 0
text_byte_length: 8
data_byte_length: 8
text_address_size: 16
data_address_size: 16
commands:
  - mnemonic: lea
    opcode: 0x40
    arguments:
      - type: register_offset
        group: general
        offset_bits: 12
        padding_bits: 2
register_groups:
  general:
    length: 2
    registers: [r0, r1, r2, r3]
"#,
        );
        let object = Assembler::new(configuration.clone())
            .unwrap()
            .assemble(".text\ntable:\nlea %r3 + table + 6\n")
            .unwrap();
        // Register index 3 in the top two bits, two zero padding bits,
        // then the 12-bit offset holding the addend.
        assert_eq!(object.text.words, vec![0x40, 0xC0, 0x06]);
        let relocation = &object.text.relocations[0];
        assert_eq!(relocation.location.offset, 1);
        assert_eq!(relocation.offset, 4);
        assert_eq!(relocation.size, 12);

        let listing = disassemble(&configuration, &object.text);
        assert_eq!(
            listing,
            "    table:\n0000: lea %r3 + table + 6 # 40 c0 06"
        );
    }
}
