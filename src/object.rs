//! In-memory object model and on-disk container encoding.
//!
//! The assembler core produces [`Section`]s of words together with symbol
//! and relocation tables; the disassembler consumes them. [`ObjectFile`]
//! bundles the two sections with the ISA parameters they were packed under
//! and provides a compact binary encoding so objects survive a trip through
//! the filesystem: a fixed header, then each section's words bit-packed
//! MSB-first into octets, followed by its symbol and relocation tables.
//! All multi-byte scalars are big-endian.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::bits::{pack_words, unpack_words};
use crate::error::{AssemblerError, Result};

/// Container magic: "MNST".
pub const OBJECT_MAGIC: [u8; 4] = *b"MNST";

/// Current container format version.
pub const OBJECT_VERSION: u8 = 1;

/// Which section a symbol, relocation target, or word belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Executable code words.
    Text,
    /// Data words.
    Data,
}

impl SectionKind {
    /// Section name as written in source (`.text` / `.data` headers).
    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Text => "text",
            SectionKind::Data => "data",
        }
    }

    fn tag(self) -> u8 {
        match self {
            SectionKind::Text => 0,
            SectionKind::Data => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(SectionKind::Text),
            1 => Ok(SectionKind::Data),
            other => Err(AssemblerError::TruncatedObject {
                message: format!("unknown section tag {other}"),
            }),
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// ISA parameters recorded in the object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectParameters {
    /// Bit width of the opcode field.
    pub opcode_length: u32,
    /// Word width of the text section.
    pub text_byte_length: u32,
    /// Word width of the data section.
    pub data_byte_length: u32,
    /// Bit width of text addresses.
    pub text_address_size: u32,
    /// Bit width of data addresses.
    pub data_address_size: u32,
}

/// A position inside a section, measured in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolLocation {
    /// The owning section.
    pub section: SectionKind,
    /// Word offset from the start of the section.
    pub offset: usize,
}

/// A named address produced by a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Label name.
    pub name: String,
    /// Where the label was defined.
    pub location: SymbolLocation,
}

/// The symbol a relocation will eventually be resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationTarget {
    /// Symbol name.
    pub name: String,
    /// Section the symbol is expected to live in.
    pub section: SectionKind,
}

/// A relocation as requested by an operand scanner, before the packer
/// fixes its absolute position.
///
/// `offset` is measured in bits from the start of the operand's field;
/// compound operands re-base it past their register and padding bits. A
/// `label + N` addend travels here and is overlaid onto the packed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRequest {
    /// Symbol to resolve against.
    pub target: RelocationTarget,
    /// Field width in bits.
    pub size: u32,
    /// Bit offset of the field within the operand.
    pub offset: u32,
    /// Whether the field holds an address relative to its own position.
    pub relative: bool,
    /// Declared numeric addend (`label + N`), zero when absent.
    pub addend: u64,
}

/// A relocation as stored in a section: the request plus the absolute
/// location of the word where the field begins. Fields may straddle word
/// boundaries; only the starting word is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Symbol to resolve against.
    pub target: RelocationTarget,
    /// Section and word offset of the word the field starts in.
    pub location: SymbolLocation,
    /// Bit offset of the field within that word.
    pub offset: u32,
    /// Field width in bits.
    pub size: u32,
    /// Whether the field holds an address relative to its own position.
    pub relative: bool,
    /// Declared numeric addend, zero when absent.
    pub addend: u64,
}

/// One section of an object: a word stream plus its symbol and relocation
/// tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Which section this is.
    pub kind: SectionKind,
    /// Word width of this section.
    pub byte_bits: u32,
    /// The packed words, each below `2^byte_bits`.
    pub words: Vec<u64>,
    /// Labels defined in this section.
    pub symbols: Vec<Symbol>,
    /// Relocations against words of this section.
    pub relocations: Vec<Relocation>,
}

impl Section {
    /// Create an empty section.
    pub fn new(kind: SectionKind, byte_bits: u32) -> Self {
        Section {
            kind,
            byte_bits,
            words: Vec::new(),
            symbols: Vec::new(),
            relocations: Vec::new(),
        }
    }

    /// The current write position, in words.
    pub fn current_offset(&self) -> usize {
        self.words.len()
    }

    /// Append one word.
    pub fn push_word(&mut self, word: u64) {
        debug_assert!(self.byte_bits == 64 || word >> self.byte_bits == 0);
        self.words.push(word);
    }

    /// Define a symbol at the current write position.
    pub fn add_symbol(&mut self, name: &str) {
        self.symbols.push(Symbol {
            name: name.to_string(),
            location: SymbolLocation {
                section: self.kind,
                offset: self.current_offset(),
            },
        });
    }

    /// Record a relocation request at the current write position.
    ///
    /// `bit_offset` is where the operand's field starts inside the word
    /// that will be emitted next; the request's own offset is added on top
    /// of it.
    pub fn add_relocation(&mut self, request: &RelocationRequest, bit_offset: u32) {
        self.relocations.push(Relocation {
            target: request.target.clone(),
            location: SymbolLocation {
                section: self.kind,
                offset: self.current_offset(),
            },
            offset: request.offset + bit_offset,
            size: request.size,
            relative: request.relative,
            addend: request.addend,
        });
    }
}

/// A complete relocatable object: parameters plus both sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    /// ISA parameters the object was packed under.
    pub parameters: ObjectParameters,
    /// The text section.
    pub text: Section,
    /// The data section.
    pub data: Section,
}

impl ObjectFile {
    /// Bundle assembled sections into an object.
    pub fn new(parameters: ObjectParameters, text: Section, data: Section) -> Self {
        ObjectFile {
            parameters,
            text,
            data,
        }
    }

    /// Encode the object into its on-disk representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&OBJECT_MAGIC);
        out.push(OBJECT_VERSION);
        for value in [
            self.parameters.opcode_length,
            self.parameters.text_byte_length,
            self.parameters.data_byte_length,
            self.parameters.text_address_size,
            self.parameters.data_address_size,
        ] {
            out.write_u16::<BigEndian>(value as u16).expect("vec write");
        }
        write_section(&mut out, &self.text);
        write_section(&mut out, &self.data);
        out
    }

    /// Decode an object from its on-disk representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        read_exact(&mut cursor, &mut magic, "magic")?;
        if magic != OBJECT_MAGIC {
            return Err(AssemblerError::BadMagic {
                expected: OBJECT_MAGIC,
                actual: magic,
            });
        }
        let version = read_u8(&mut cursor, "version")?;
        if version != OBJECT_VERSION {
            return Err(AssemblerError::UnsupportedVersion { version });
        }
        let opcode_length = read_u16(&mut cursor, "opcode length")? as u32;
        let text_byte_length = read_u16(&mut cursor, "text byte length")? as u32;
        let data_byte_length = read_u16(&mut cursor, "data byte length")? as u32;
        let text_address_size = read_u16(&mut cursor, "text address size")? as u32;
        let data_address_size = read_u16(&mut cursor, "data address size")? as u32;
        let text = read_section(&mut cursor)?;
        let data = read_section(&mut cursor)?;
        Ok(ObjectFile {
            parameters: ObjectParameters {
                opcode_length,
                text_byte_length,
                data_byte_length,
                text_address_size,
                data_address_size,
            },
            text,
            data,
        })
    }

    /// Render the object header: parameters, then per-section word counts
    /// and symbol / relocation tables.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "object file:".to_string(),
            format!("  opcode length: {:>3} bits", self.parameters.opcode_length),
            format!("  text byte:     {:>3} bits", self.parameters.text_byte_length),
            format!("  data byte:     {:>3} bits", self.parameters.data_byte_length),
            format!("  text address:  {:>3} bits", self.parameters.text_address_size),
            format!("  data address:  {:>3} bits", self.parameters.data_address_size),
        ];
        for section in [&self.text, &self.data] {
            lines.push(format!(
                "  .{}: {} words, {} symbols, {} relocations",
                section.kind,
                section.words.len(),
                section.symbols.len(),
                section.relocations.len()
            ));
            for symbol in &section.symbols {
                lines.push(format!(
                    "    {:>10}:{:08x} {}",
                    symbol.location.section, symbol.location.offset, symbol.name
                ));
            }
            for relocation in &section.relocations {
                lines.push(format!(
                    "    {:>10}:{:08x}+{} -> {} ({} bits, {})",
                    relocation.location.section,
                    relocation.location.offset,
                    relocation.offset,
                    relocation.target.name,
                    relocation.size,
                    if relocation.relative { "relative" } else { "absolute" },
                ));
            }
        }
        lines.join("\n")
    }
}

fn write_section(out: &mut Vec<u8>, section: &Section) {
    out.push(section.kind.tag());
    out.write_u16::<BigEndian>(section.byte_bits as u16)
        .expect("vec write");
    out.write_u32::<BigEndian>(section.words.len() as u32)
        .expect("vec write");
    let packed = pack_words(&section.words, section.byte_bits);
    out.write_u32::<BigEndian>(packed.len() as u32)
        .expect("vec write");
    out.extend_from_slice(&packed);

    out.write_u32::<BigEndian>(section.symbols.len() as u32)
        .expect("vec write");
    for symbol in &section.symbols {
        write_name(out, &symbol.name);
        out.write_u32::<BigEndian>(symbol.location.offset as u32)
            .expect("vec write");
    }

    out.write_u32::<BigEndian>(section.relocations.len() as u32)
        .expect("vec write");
    for relocation in &section.relocations {
        write_name(out, &relocation.target.name);
        out.push(relocation.target.section.tag());
        out.write_u32::<BigEndian>(relocation.location.offset as u32)
            .expect("vec write");
        out.write_u16::<BigEndian>(relocation.offset as u16)
            .expect("vec write");
        out.write_u16::<BigEndian>(relocation.size as u16)
            .expect("vec write");
        out.push(relocation.relative as u8);
        out.write_u64::<BigEndian>(relocation.addend)
            .expect("vec write");
    }
}

fn read_section(cursor: &mut Cursor<&[u8]>) -> Result<Section> {
    let kind = SectionKind::from_tag(read_u8(cursor, "section tag")?)?;
    let byte_bits = read_u16(cursor, "section byte width")? as u32;
    if byte_bits == 0 || byte_bits > 32 {
        return Err(AssemblerError::TruncatedObject {
            message: format!("section byte width {byte_bits} out of range"),
        });
    }
    let word_count = read_u32(cursor, "word count")? as usize;
    let packed_len = read_u32(cursor, "packed length")? as usize;
    let mut packed = vec![0u8; packed_len];
    read_exact(cursor, &mut packed, "packed words")?;
    let words = unpack_words(&packed, byte_bits, word_count)?;

    let symbol_count = read_u32(cursor, "symbol count")? as usize;
    let mut symbols = Vec::with_capacity(symbol_count);
    for _ in 0..symbol_count {
        let name = read_name(cursor)?;
        let offset = read_u32(cursor, "symbol offset")? as usize;
        symbols.push(Symbol {
            name,
            location: SymbolLocation {
                section: kind,
                offset,
            },
        });
    }

    let relocation_count = read_u32(cursor, "relocation count")? as usize;
    let mut relocations = Vec::with_capacity(relocation_count);
    for _ in 0..relocation_count {
        let name = read_name(cursor)?;
        let target_section = SectionKind::from_tag(read_u8(cursor, "target section")?)?;
        let offset = read_u32(cursor, "relocation location")? as usize;
        let bit_offset = read_u16(cursor, "relocation bit offset")? as u32;
        let size = read_u16(cursor, "relocation size")? as u32;
        let relative = read_u8(cursor, "relocation flag")? != 0;
        let addend = cursor
            .read_u64::<BigEndian>()
            .map_err(|_| truncated("relocation addend"))?;
        relocations.push(Relocation {
            target: RelocationTarget {
                name,
                section: target_section,
            },
            location: SymbolLocation {
                section: kind,
                offset,
            },
            offset: bit_offset,
            size,
            relative,
            addend,
        });
    }

    Ok(Section {
        kind,
        byte_bits,
        words,
        symbols,
        relocations,
    })
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.write_u16::<BigEndian>(name.len() as u16)
        .expect("vec write");
    out.extend_from_slice(name.as_bytes());
}

fn read_name(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let length = read_u16(cursor, "name length")? as usize;
    let mut bytes = vec![0u8; length];
    read_exact(cursor, &mut bytes, "name")?;
    String::from_utf8(bytes).map_err(|_| AssemblerError::TruncatedObject {
        message: "symbol name is not valid UTF-8".to_string(),
    })
}

fn truncated(what: &str) -> AssemblerError {
    AssemblerError::TruncatedObject {
        message: format!("unexpected end of input reading {what}"),
    }
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buffer: &mut [u8], what: &str) -> Result<()> {
    cursor.read_exact(buffer).map_err(|_| truncated(what))
}

fn read_u8(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u8> {
    cursor.read_u8().map_err(|_| truncated(what))
}

fn read_u16(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u16> {
    cursor.read_u16::<BigEndian>().map_err(|_| truncated(what))
}

fn read_u32(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u32> {
    cursor.read_u32::<BigEndian>().map_err(|_| truncated(what))
}
