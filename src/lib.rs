//! Monistode assembler - configurable two-way translator between assembly
//! text and relocatable objects.
//!
//! The monistode family of pedagogic ISAs is described by an external YAML
//! document rather than hardcoded: the word width (not necessarily eight
//! bits), the opcode's width and position inside the instruction, the
//! register groups, and every command's argument layout all come from the
//! description. This crate packs and unpacks instructions bit by bit
//! under those parameters, in both directions.
//!
//! # Features
//!
//! - **Assembly**: line-oriented source with sections, labels, comments,
//!   and comma- or whitespace-separated operands
//! - **Disassembly**: address-annotated listings with symbolic operands
//!   reconstructed from relocation tables
//! - **Arbitrary word widths**: six-bit and other non-octet words pack and
//!   render correctly
//! - **Opcode placement**: the opcode may sit anywhere on an argument
//!   boundary inside the instruction
//! - **Relocations**: label operands (with optional `+ N` addends and
//!   `ABSOLUTE` / `OFFSET` overrides) emit symbolic relocation requests,
//!   including sub-field relocations inside register-plus-offset operands
//!
//! # Quick Start
//!
//! ```rust
//! use monistode_assembler::{assemble, disassemble, Configuration};
//!
//! fn main() -> monistode_assembler::Result<()> {
//!     let configuration = Configuration::from_yaml(
//!         "{opcode_length: 8, opcode_offset: 0,
//!           text_byte_length: 8, data_byte_length: 8,
//!           text_address_size: 16, data_address_size: 16,
//!           commands: [{mnemonic: nop, opcode: 0}]}",
//!     )?;
//!     let object = assemble(&configuration, ".text\nnop\n")?;
//!     assert_eq!(object.text.words, vec![0x00]);
//!     let listing = disassemble(&configuration, &object)?;
//!     assert!(listing.contains("nop"));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod assemble;
pub mod bits;
pub mod config;
pub mod disassemble;
pub mod disassemble_text;
pub mod error;
pub mod matcher;
pub mod object;
pub mod parse;
pub mod scanners;
pub mod sections;

pub use assemble::Assembler;
pub use config::{ArgumentDescription, CommandDescription, Configuration, RegisterGroup, RegisterSet};
pub use disassemble::Disassembler;
pub use disassemble_text::TextDisassembler;
pub use error::{AssemblerError, Result};
pub use object::{
    ObjectFile, ObjectParameters, Relocation, RelocationRequest, RelocationTarget, Section,
    SectionKind, Symbol, SymbolLocation,
};

/// Assemble a source file under the given description.
///
/// Convenience wrapper that validates the description, assembles, and
/// returns the object model. Use [`ObjectFile::to_bytes`] to serialize it.
pub fn assemble(configuration: &Configuration, source: &str) -> Result<ObjectFile> {
    Assembler::new(configuration.clone())?.assemble(source)
}

/// Disassemble an object under the given description.
pub fn disassemble(configuration: &Configuration, object: &ObjectFile) -> Result<String> {
    Disassembler::new(configuration).disassemble(object)
}

/// Render only an object's header summary.
pub fn disassemble_header(configuration: &Configuration, object: &ObjectFile) -> String {
    Disassembler::new(configuration).disassemble_header(object)
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
