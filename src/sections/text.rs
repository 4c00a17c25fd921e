//! The text-section assembler: signature matching and instruction packing.
//!
//! An instruction is built in an accumulator holding the high-order
//! portion of the instruction that has not been emitted yet. Operands are
//! packed in declaration order; the opcode is spliced into the stream
//! after the declared number of pre-opcode arguments. Whole words are
//! flushed from the top of the accumulator as they complete, so a
//! relocation is always recorded against the word its field starts in.

use crate::bits::mask;
use crate::error::{AssemblerError, Result};
use crate::matcher::{match_operands, Signature};
use crate::object::{Section, SectionKind};
use crate::scanners::ParsedOperand;
use crate::sections::SectionAssembler;

/// Packing parameters of the text section.
#[derive(Debug, Clone, Copy)]
pub struct TextSectionParameters {
    /// Word width.
    pub byte_bits: u32,
    /// Bit width of the opcode field.
    pub opcode_length: u32,
    /// Bit position of the opcode within the instruction.
    pub opcode_offset: u32,
    /// Bit width of text addresses.
    pub text_address_bits: u32,
    /// Bit width of data addresses.
    pub data_address_bits: u32,
}

/// One assembleable command: a mnemonic, its opcode, one concrete operand
/// signature, and the derived pre-opcode argument count.
pub struct CommandDefinition {
    /// Mnemonic as matched against source lines.
    pub mnemonic: String,
    /// Opcode value.
    pub opcode: u64,
    /// The scanners of this signature, one per operand position.
    pub signature: Signature<ParsedOperand>,
    /// How many operands pack before the opcode.
    pub pre_opcode_arguments: usize,
}

/// The text-section assembler.
pub struct TextSectionAssembler {
    parameters: TextSectionParameters,
    commands: Vec<CommandDefinition>,
    section: Section,
}

impl TextSectionAssembler {
    /// Create an assembler over the given command set.
    pub fn new(parameters: TextSectionParameters, commands: Vec<CommandDefinition>) -> Self {
        TextSectionAssembler {
            parameters,
            commands,
            section: Section::new(SectionKind::Text, parameters.byte_bits),
        }
    }

    /// Pack one matched command into the section.
    fn pack(&mut self, definition_index: usize, operands: &[ParsedOperand]) -> Result<()> {
        let definition = &self.commands[definition_index];
        let byte_bits = self.parameters.byte_bits;
        let opcode_length = self.parameters.opcode_length;

        let mut code: u128 = 0;
        let mut bits: u32 = 0;
        if definition.pre_opcode_arguments == 0 {
            code = definition.opcode as u128;
            bits = opcode_length;
        }

        for (index, operand) in operands.iter().enumerate() {
            flush_words(&mut self.section, &mut code, &mut bits, byte_bits);

            // The operand's field starts `bits` bits into the word that
            // will be emitted next.
            let bit_offset = bits % byte_bits;
            for request in &operand.relocations {
                self.section.add_relocation(request, bit_offset);
            }

            code = (code << operand.n_bits) | (operand.value as u128 & mask(operand.n_bits));
            bits += operand.n_bits;

            // Declared addends overlay the field once it sits in its final
            // position, so later linker patches land on that baseline.
            for request in &operand.relocations {
                if request.addend != 0 {
                    let start = operand.n_bits - request.offset - request.size;
                    let field = mask(request.size);
                    let patched = (((code >> start) & field) + request.addend as u128) & field;
                    code = (code & !(field << start)) | (patched << start);
                }
            }

            if index + 1 == definition.pre_opcode_arguments {
                code = (code << opcode_length) | definition.opcode as u128;
                bits += opcode_length;
            }
        }

        flush_words(&mut self.section, &mut code, &mut bits, byte_bits);
        if bits != 0 {
            return Err(AssemblerError::MisalignedCommand {
                mnemonic: definition.mnemonic.clone(),
                leftover_bits: bits,
            });
        }
        Ok(())
    }
}

/// Emit whole words from the top of the accumulator.
fn flush_words(section: &mut Section, code: &mut u128, bits: &mut u32, byte_bits: u32) {
    while *bits >= byte_bits {
        let shift = *bits - byte_bits;
        let word = (*code >> shift) & mask(byte_bits);
        section.push_word(word as u64);
        *code &= !(mask(byte_bits) << shift);
        *bits -= byte_bits;
    }
}

impl SectionAssembler for TextSectionAssembler {
    fn section_name(&self) -> &'static str {
        SectionKind::Text.name()
    }

    fn add_label(&mut self, name: &str) {
        self.section.add_symbol(name);
    }

    fn add_command(&mut self, mnemonic: &str, operands: &str) -> Result<()> {
        let candidates: Vec<usize> = self
            .commands
            .iter()
            .enumerate()
            .filter(|(_, command)| command.mnemonic == mnemonic)
            .map(|(index, _)| index)
            .collect();
        if candidates.is_empty() {
            return Err(AssemblerError::UnknownMnemonic {
                mnemonic: mnemonic.to_string(),
            });
        }
        let signatures: Vec<&Signature<ParsedOperand>> = candidates
            .iter()
            .map(|&index| &self.commands[index].signature)
            .collect();
        let (winner, parsed) = match_operands(mnemonic, operands, &signatures)?;
        self.pack(candidates[winner], &parsed)
    }

    fn finish(&mut self) -> Section {
        std::mem::replace(
            &mut self.section,
            Section::new(SectionKind::Text, self.parameters.byte_bits),
        )
    }
}
