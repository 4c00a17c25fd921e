//! Typed representation of an ISA description.
//!
//! The description document is YAML; [`Configuration::from_yaml`] loads it
//! and [`Configuration::validate`] rejects inconsistent descriptions before
//! any source line is looked at. Argument descriptors are a `type`-tagged
//! sum; each variant knows its candidate scanners, its packed bit width,
//! and how to render a decoded value back to surface syntax.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AssemblerError, Result};
use crate::object::{ObjectParameters, Relocation, SectionKind};
use crate::scanners::{
    AddressScanner, ImmediateScanner, LabelScanner, PaddingScanner, ParsedOperand,
    RegisterAddressOffsetScanner, RegisterAddressScanner, RegisterOffsetScanner, RegisterScanner,
    Scanner,
};

/// A complete ISA description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Bit width of the opcode field.
    pub opcode_length: u32,
    /// Bit position of the opcode within the instruction.
    pub opcode_offset: u32,
    /// Word width of the text section.
    pub text_byte_length: u32,
    /// Word width of the data section.
    pub data_byte_length: u32,
    /// Bit width of text addresses.
    pub text_address_size: u32,
    /// Bit width of data addresses.
    pub data_address_size: u32,
    /// The command set, in declaration order.
    pub commands: Vec<CommandDescription>,
    /// Register groups referenced by register-kind arguments.
    #[serde(default)]
    pub register_groups: BTreeMap<String, RegisterGroup>,
}

/// One command entry: a mnemonic, its opcode, and its argument layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandDescription {
    /// Lower-case mnemonic as written in source.
    pub mnemonic: String,
    /// Opcode value; must fit in `opcode_length` bits.
    pub opcode: u64,
    /// Argument descriptors in packing order.
    #[serde(default)]
    pub arguments: Vec<ArgumentDescription>,
}

/// A named set of registers sharing one bit-field width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterGroup {
    /// Bit width of the register field.
    pub length: u32,
    /// The registers themselves.
    pub registers: RegisterSet,
}

/// The two accepted shapes for a register set: an ordered list (index is
/// list position) or an explicit name-to-index mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterSet {
    /// Index is the position in the list.
    Ordered(Vec<String>),
    /// Index is given explicitly.
    Named(BTreeMap<String, u64>),
}

impl RegisterGroup {
    /// Look up the index of a register by name.
    pub fn index_of(&self, name: &str) -> Option<u64> {
        match &self.registers {
            RegisterSet::Ordered(names) => names
                .iter()
                .position(|candidate| candidate == name)
                .map(|index| index as u64),
            RegisterSet::Named(map) => map.get(name).copied(),
        }
    }

    /// Look up the name of a register by index.
    pub fn name_of(&self, index: u64) -> Option<&str> {
        match &self.registers {
            RegisterSet::Ordered(names) => names.get(index as usize).map(String::as_str),
            RegisterSet::Named(map) => map
                .iter()
                .find(|(_, candidate)| **candidate == index)
                .map(|(name, _)| name.as_str()),
        }
    }

    /// All register names, sorted; used for signature descriptions.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = match &self.registers {
            RegisterSet::Ordered(names) => names.iter().map(String::as_str).collect(),
            RegisterSet::Named(map) => map.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }
}

/// An argument descriptor, discriminated by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgumentDescription {
    /// Unsigned integer operand written `$N`.
    Immediate {
        /// Field width.
        bits: u32,
    },
    /// Zero-filled reserved field with no surface syntax.
    Padding {
        /// Field width.
        bits: u32,
    },
    /// A bare numeric address or a label reference.
    Address {
        /// Field width.
        bits: u32,
        /// Whether label references relocate relative to the field.
        #[serde(default)]
        relative: bool,
    },
    /// Like `address`, targeting symbols of the text section.
    TextAddress {
        /// Field width.
        bits: u32,
        /// Whether label references relocate relative to the field.
        #[serde(default)]
        relative: bool,
    },
    /// Like `address`, targeting symbols of the data section.
    DataAddress {
        /// Field width.
        bits: u32,
        /// Whether label references relocate relative to the field.
        #[serde(default)]
        relative: bool,
    },
    /// `%name` drawn from a register group.
    Register {
        /// Register group name.
        group: String,
    },
    /// `[%name]`.
    RegisterAddress {
        /// Register group name.
        group: String,
    },
    /// `%reg + addr`; register index in the high bits, then padding, then
    /// the offset field.
    RegisterOffset {
        /// Register group name.
        group: String,
        /// Width of the offset field.
        offset_bits: u32,
        /// Zero bits between the register index and the offset.
        padding_bits: u32,
        /// Whether label offsets relocate relative to the field.
        #[serde(default)]
        relative: bool,
    },
    /// `[%reg + addr]`.
    RegisterAddressOffset {
        /// Register group name.
        group: String,
        /// Width of the offset field.
        offset_bits: u32,
        /// Zero bits between the register index and the offset.
        padding_bits: u32,
        /// Whether label offsets relocate relative to the field.
        #[serde(default)]
        relative: bool,
    },
}

impl ArgumentDescription {
    /// The `type` tag, used to detect duplicate signatures at load time.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ArgumentDescription::Immediate { .. } => "immediate",
            ArgumentDescription::Padding { .. } => "padding",
            ArgumentDescription::Address { .. } => "address",
            ArgumentDescription::TextAddress { .. } => "text_address",
            ArgumentDescription::DataAddress { .. } => "data_address",
            ArgumentDescription::Register { .. } => "register",
            ArgumentDescription::RegisterAddress { .. } => "register_address",
            ArgumentDescription::RegisterOffset { .. } => "register_offset",
            ArgumentDescription::RegisterAddressOffset { .. } => "register_address_offset",
        }
    }

    /// Packed width of this argument in bits.
    pub fn length_bits(&self, configuration: &Configuration) -> Result<u32> {
        Ok(match self {
            ArgumentDescription::Immediate { bits }
            | ArgumentDescription::Padding { bits }
            | ArgumentDescription::Address { bits, .. }
            | ArgumentDescription::TextAddress { bits, .. }
            | ArgumentDescription::DataAddress { bits, .. } => *bits,
            ArgumentDescription::Register { group }
            | ArgumentDescription::RegisterAddress { group } => {
                configuration.register_group(group)?.length
            }
            ArgumentDescription::RegisterOffset {
                group,
                offset_bits,
                padding_bits,
                ..
            }
            | ArgumentDescription::RegisterAddressOffset {
                group,
                offset_bits,
                padding_bits,
                ..
            } => configuration.register_group(group)?.length + offset_bits + padding_bits,
        })
    }

    /// The candidate scanners for this argument, in attempt order.
    pub fn scanners(
        &self,
        configuration: &Configuration,
    ) -> Result<Vec<Arc<dyn Scanner<ParsedOperand>>>> {
        Ok(match self {
            ArgumentDescription::Immediate { bits } => {
                vec![Arc::new(ImmediateScanner::new(*bits))]
            }
            ArgumentDescription::Padding { bits } => vec![Arc::new(PaddingScanner::new(*bits))],
            ArgumentDescription::Address { bits, relative }
            | ArgumentDescription::TextAddress { bits, relative } => vec![
                Arc::new(LabelScanner::new(*bits, *relative, SectionKind::Text)),
                Arc::new(AddressScanner::new(*bits)),
            ],
            ArgumentDescription::DataAddress { bits, relative } => vec![
                Arc::new(LabelScanner::new(*bits, *relative, SectionKind::Data)),
                Arc::new(AddressScanner::new(*bits)),
            ],
            ArgumentDescription::Register { group } => {
                vec![Arc::new(RegisterScanner::new(
                    group.clone(),
                    configuration.register_group(group)?.clone(),
                ))]
            }
            ArgumentDescription::RegisterAddress { group } => {
                vec![Arc::new(RegisterAddressScanner::new(
                    group.clone(),
                    configuration.register_group(group)?.clone(),
                ))]
            }
            ArgumentDescription::RegisterOffset {
                group,
                offset_bits,
                padding_bits,
                relative,
            } => vec![Arc::new(RegisterOffsetScanner::new(
                group.clone(),
                configuration.register_group(group)?.clone(),
                *offset_bits,
                *padding_bits,
                *relative,
            ))],
            ArgumentDescription::RegisterAddressOffset {
                group,
                offset_bits,
                padding_bits,
                relative,
            } => vec![Arc::new(RegisterAddressOffsetScanner::new(
                group.clone(),
                configuration.register_group(group)?.clone(),
                *offset_bits,
                *padding_bits,
                *relative,
            ))],
        })
    }

    /// Render a decoded field back to surface syntax.
    ///
    /// `relocations` are the stored relocations whose fields start inside
    /// this argument; `_end_offset_words` is the signed word distance from
    /// the argument's field to the end of its command, supplied for
    /// printers that format self-relative fields.
    pub fn render(
        &self,
        value: u64,
        relocations: &[&Relocation],
        _end_offset_words: i64,
        configuration: &Configuration,
    ) -> Result<String> {
        match self {
            ArgumentDescription::Immediate { .. } => Ok(format!("${value}")),
            ArgumentDescription::Padding { .. } => {
                if let Some(relocation) = relocations.first() {
                    return Err(AssemblerError::RelocatedPadding {
                        symbol: relocation.target.name.clone(),
                    });
                }
                if value != 0 {
                    return Err(AssemblerError::NonZeroPadding { value });
                }
                Ok(String::new())
            }
            ArgumentDescription::Address { relative, .. }
            | ArgumentDescription::TextAddress { relative, .. }
            | ArgumentDescription::DataAddress { relative, .. } => {
                Ok(render_address(value, relocations.first().copied(), *relative))
            }
            ArgumentDescription::Register { group } => {
                let name = register_name(configuration, group, value)?;
                Ok(format!("%{name}"))
            }
            ArgumentDescription::RegisterAddress { group } => {
                let name = register_name(configuration, group, value)?;
                Ok(format!("[%{name}]"))
            }
            ArgumentDescription::RegisterOffset {
                group,
                offset_bits,
                padding_bits,
                relative,
            } => render_register_offset(
                configuration,
                group,
                value,
                *offset_bits,
                *padding_bits,
                *relative,
                relocations,
                false,
            ),
            ArgumentDescription::RegisterAddressOffset {
                group,
                offset_bits,
                padding_bits,
                relative,
            } => render_register_offset(
                configuration,
                group,
                value,
                *offset_bits,
                *padding_bits,
                *relative,
                relocations,
                true,
            ),
        }
    }
}

/// Symbolic or numeric form of an address field.
///
/// With a relocation in scope the symbol name is printed, prefixed by an
/// `ABSOLUTE` / `OFFSET` override when the relocation's relativity differs
/// from the argument's declared one, and followed by `+ N` when the field
/// still holds a non-zero addend.
fn render_address(value: u64, relocation: Option<&Relocation>, declared_relative: bool) -> String {
    match relocation {
        Some(relocation) => {
            let prefix = if relocation.relative == declared_relative {
                ""
            } else if relocation.relative {
                "OFFSET "
            } else {
                "ABSOLUTE "
            };
            if value != 0 {
                format!("{prefix}{} + {value}", relocation.target.name)
            } else {
                format!("{prefix}{}", relocation.target.name)
            }
        }
        None => format!("{value}"),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_register_offset(
    configuration: &Configuration,
    group: &str,
    value: u64,
    offset_bits: u32,
    padding_bits: u32,
    declared_relative: bool,
    relocations: &[&Relocation],
    bracketed: bool,
) -> Result<String> {
    let index = value >> (offset_bits + padding_bits);
    let offset = value & ((1u64 << offset_bits) - 1);
    let name = register_name(configuration, group, index)?;
    let address = render_address(offset, relocations.first().copied(), declared_relative);
    let body = format!("%{name} + {address}");
    Ok(if bracketed {
        format!("[{body}]")
    } else {
        body
    })
}

fn register_name<'a>(
    configuration: &'a Configuration,
    group: &str,
    index: u64,
) -> Result<&'a str> {
    let register_group = configuration.register_group(group)?;
    register_group
        .name_of(index)
        .ok_or_else(|| AssemblerError::UnknownRegisterIndex {
            index,
            group: group.to_string(),
        })
}

impl CommandDescription {
    /// The number of arguments packed before the opcode: the unique `k`
    /// such that the widths of the first `k` arguments sum to the opcode
    /// offset. Rejected when no such `k` exists.
    pub fn pre_opcode_arguments(&self, configuration: &Configuration) -> Result<usize> {
        let mut offset = 0u32;
        let mut count = 0usize;
        for argument in &self.arguments {
            if offset == configuration.opcode_offset {
                return Ok(count);
            }
            let width = argument.length_bits(configuration)?;
            if offset + width > configuration.opcode_offset {
                return Err(AssemblerError::OpcodeOffsetMisaligned {
                    mnemonic: self.mnemonic.clone(),
                });
            }
            offset += width;
            count += 1;
        }
        if offset == configuration.opcode_offset {
            Ok(count)
        } else {
            Err(AssemblerError::OpcodeOffsetMisaligned {
                mnemonic: self.mnemonic.clone(),
            })
        }
    }

    /// Total packed width of one instruction of this command, in bits.
    pub fn total_bits(&self, configuration: &Configuration) -> Result<u32> {
        let mut total = configuration.opcode_length;
        for argument in &self.arguments {
            total += argument.length_bits(configuration)?;
        }
        Ok(total)
    }
}

impl Configuration {
    /// Load a description from its YAML document and validate it.
    pub fn from_yaml(document: &str) -> Result<Self> {
        let configuration: Configuration = serde_yaml::from_str(document)?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Look up a register group by name.
    pub fn register_group(&self, name: &str) -> Result<&RegisterGroup> {
        self.register_groups
            .get(name)
            .ok_or_else(|| AssemblerError::UnknownRegisterGroup {
                name: name.to_string(),
            })
    }

    /// The header parameters recorded in objects assembled under this
    /// description.
    pub fn object_parameters(&self) -> ObjectParameters {
        ObjectParameters {
            opcode_length: self.opcode_length,
            text_byte_length: self.text_byte_length,
            data_byte_length: self.data_byte_length,
            text_address_size: self.text_address_size,
            data_address_size: self.data_address_size,
        }
    }

    /// Reject inconsistent descriptions before assembly starts.
    ///
    /// Checks the representation limits (word widths up to 32 bits, field
    /// widths up to 64), register group consistency, opcode range and
    /// injectivity, per-command width alignment, opcode-offset
    /// reachability, and signature distinctness for shared mnemonics.
    pub fn validate(&self) -> Result<()> {
        for (what, value, limit) in [
            ("opcode_length", self.opcode_length, 32),
            ("text_byte_length", self.text_byte_length, 32),
            ("data_byte_length", self.data_byte_length, 32),
            ("text_address_size", self.text_address_size, 64),
            ("data_address_size", self.data_address_size, 64),
        ] {
            if value == 0 || value > limit {
                return Err(invalid(format!(
                    "{what} must be between 1 and {limit}, got {value}"
                )));
            }
        }

        for (name, group) in &self.register_groups {
            if group.length == 0 || group.length > 32 {
                return Err(invalid(format!(
                    "register group {name} has field width {}",
                    group.length
                )));
            }
            let names = group.sorted_names();
            if names.is_empty() {
                return Err(invalid(format!("register group {name} is empty")));
            }
            for register in &names {
                let index = group.index_of(register).expect("name from the group");
                if group.length < 64 && index >> group.length != 0 {
                    return Err(invalid(format!(
                        "register {register} of group {name} has index {index}, \
                         which does not fit in {} bits",
                        group.length
                    )));
                }
            }
        }

        let mut seen_opcodes: BTreeMap<u64, &str> = BTreeMap::new();
        let mut seen_signatures: Vec<(String, Vec<&'static str>)> = Vec::new();
        for command in &self.commands {
            if command.mnemonic.is_empty()
                || command.mnemonic.chars().any(|c| c.is_ascii_uppercase())
            {
                return Err(invalid(format!(
                    "mnemonic {:?} must be non-empty and lower-case",
                    command.mnemonic
                )));
            }
            if self.opcode_length < 64 && command.opcode >> self.opcode_length != 0 {
                return Err(invalid(format!(
                    "opcode {:#x} of {} does not fit in {} bits",
                    command.opcode, command.mnemonic, self.opcode_length
                )));
            }
            if let Some(previous) = seen_opcodes.insert(command.opcode, &command.mnemonic) {
                return Err(invalid(format!(
                    "opcode {:#x} is declared by both {} and {}",
                    command.opcode, previous, command.mnemonic
                )));
            }

            for argument in &command.arguments {
                let width = argument.length_bits(self)?;
                if width == 0 || width > 64 {
                    return Err(invalid(format!(
                        "argument of {} has width {width}, outside 1..=64",
                        command.mnemonic
                    )));
                }
            }
            let total = command.total_bits(self)?;
            if total % self.text_byte_length != 0 {
                return Err(invalid(format!(
                    "command {} packs to {total} bits, not a multiple of the \
                     {}-bit word",
                    command.mnemonic, self.text_byte_length
                )));
            }
            command.pre_opcode_arguments(self)?;

            let signature: Vec<&'static str> = command
                .arguments
                .iter()
                .map(ArgumentDescription::type_tag)
                .collect();
            if seen_signatures
                .iter()
                .any(|(mnemonic, tags)| *mnemonic == command.mnemonic && *tags == signature)
            {
                return Err(invalid(format!(
                    "mnemonic {} declares two identical signatures ({})",
                    command.mnemonic,
                    signature.join(" ")
                )));
            }
            seen_signatures.push((command.mnemonic.clone(), signature));
        }
        Ok(())
    }
}

fn invalid(message: String) -> AssemblerError {
    AssemblerError::InvalidDescription { message }
}
