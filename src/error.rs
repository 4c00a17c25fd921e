//! Error types for the assembler and disassembler.
//!
//! All failures surface through a single [`AssemblerError`] enum. The line
//! driver wraps the first failing line in [`AssemblerError::AtLine`] so that
//! every fatal error reaching the user carries the line number and the
//! offending line text.

use thiserror::Error;

/// Primary error type for assembly and disassembly.
#[derive(Debug, Error)]
pub enum AssemblerError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The ISA description document could not be deserialized.
    #[error("ISA description error: {0}")]
    Description(#[from] serde_yaml::Error),

    /// The ISA description is well-formed but inconsistent.
    #[error("invalid ISA description: {message}")]
    InvalidDescription { message: String },

    /// A command references a register group the description does not define.
    #[error("unknown register group: {name}")]
    UnknownRegisterGroup { name: String },

    /// The opcode cannot be placed on an argument boundary.
    #[error("opcode offset of command {mnemonic} does not fall on an argument boundary")]
    OpcodeOffsetMisaligned { mnemonic: String },

    /// A source line switched to a section no parser exists for.
    #[error("unknown section name: {name}")]
    UnknownSection { name: String },

    /// A label or command appeared before any section header.
    #[error("{item} found outside of a section")]
    OutsideSection { item: &'static str },

    /// The mnemonic is not declared in the ISA description.
    #[error("unknown mnemonic: {mnemonic}")]
    UnknownMnemonic { mnemonic: String },

    /// No declared signature consumed the operand string.
    #[error("could not parse arguments of {mnemonic}: no matching signature")]
    NoMatchingSignature { mnemonic: String },

    /// More than one declared signature consumed the operand string.
    #[error("line matches {count} signatures of {mnemonic}: {signatures}")]
    AmbiguousSignature {
        mnemonic: String,
        count: usize,
        signatures: String,
    },

    /// A numeric literal does not fit in 64 bits.
    #[error("numeric literal {literal} does not fit in 64 bits")]
    NumericOverflow { literal: String },

    /// An immediate or address operand does not fit its declared field.
    #[error("value {value} is too large for a {bits}-bit field")]
    ValueTooWide { value: u64, bits: u32 },

    /// A quoted literal ran to the end of the line without a closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A quoted literal contained an escape the decoder does not accept.
    #[error("invalid string literal: {message}")]
    InvalidStringLiteral { message: String },

    /// A packed command did not end on a word boundary.
    #[error("command {mnemonic} has {leftover_bits} bits left over")]
    MisalignedCommand { mnemonic: String, leftover_bits: u32 },

    /// No command in the description carries the extracted opcode.
    #[error("unknown opcode: {opcode:#x}")]
    UnknownOpcode { opcode: u64 },

    /// A padding field decoded to a non-zero value.
    #[error("padding field holds non-zero value {value}")]
    NonZeroPadding { value: u64 },

    /// A relocation points into a padding field.
    #[error("padding field carries a relocation for symbol {symbol}")]
    RelocatedPadding { symbol: String },

    /// A decoded register index has no name in its group.
    #[error("register index {index} is not defined in group {group}")]
    UnknownRegisterIndex { index: u64, group: String },

    /// A decoded instruction did not end on a word boundary.
    #[error("command {mnemonic} is not aligned to the word size")]
    MisalignedInstruction { mnemonic: String },

    /// The word stream ended in the middle of an instruction.
    #[error("section ends in the middle of an instruction at word {offset}")]
    TruncatedInstruction { offset: usize },

    /// The object file is shorter than its own structure claims.
    #[error("truncated object file: {message}")]
    TruncatedObject { message: String },

    /// The object file does not start with the container magic.
    #[error("bad object magic: expected {expected:02X?}, got {actual:02X?}")]
    BadMagic { expected: [u8; 4], actual: [u8; 4] },

    /// The object container version is not supported.
    #[error("unsupported object format version: {version}")]
    UnsupportedVersion { version: u8 },

    /// An error tagged with the source line it occurred on.
    #[error("line {line_number}: {source}\n    {line_content}")]
    AtLine {
        line_number: usize,
        line_content: String,
        #[source]
        source: Box<AssemblerError>,
    },
}

impl AssemblerError {
    /// Tag this error with the 1-based line number and line text it
    /// occurred on. Already-tagged errors are returned unchanged so the
    /// innermost (first) attribution wins.
    pub fn at_line(self, line_number: usize, line_content: &str) -> Self {
        match self {
            tagged @ AssemblerError::AtLine { .. } => tagged,
            source => AssemblerError::AtLine {
                line_number,
                line_content: line_content.to_string(),
                source: Box::new(source),
            },
        }
    }
}

/// Result type alias for assembler operations.
pub type Result<T> = std::result::Result<T, AssemblerError>;
