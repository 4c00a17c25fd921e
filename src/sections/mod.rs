//! Section assemblers.
//!
//! The line driver dispatches labels and commands to the assembler of the
//! current section; each assembler owns its matching and packing rules and
//! yields a finished [`Section`] at the end of the source file.

pub mod data;
pub mod text;

pub use data::DataSectionAssembler;
pub use text::{CommandDefinition, TextSectionAssembler, TextSectionParameters};

use crate::error::Result;
use crate::object::Section;

/// One section's line-level sink.
pub trait SectionAssembler {
    /// Section name as used in `.name` headers.
    fn section_name(&self) -> &'static str;

    /// Define a label at the current write position.
    fn add_label(&mut self, name: &str);

    /// Match and pack one command line.
    fn add_command(&mut self, mnemonic: &str, operands: &str) -> Result<()>;

    /// Take the accumulated section, leaving the assembler empty.
    fn finish(&mut self) -> Section;
}
