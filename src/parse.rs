//! Line-level driver.
//!
//! A source file is processed line by line: blank lines and comments are
//! skipped, `.name` switches the current section, a `name:` token defines
//! a label at the section's write cursor, and anything else is a command
//! handed to the current section's assembler. The first failure is tagged
//! with the 1-based line number and the original line text.

use memchr::memchr;

use crate::error::{AssemblerError, Result};
use crate::object::Section;
use crate::sections::SectionAssembler;

/// The driver: owns the section assemblers and dispatches lines to them.
pub struct SourceParser {
    sections: Vec<Box<dyn SectionAssembler>>,
    current: Option<usize>,
}

impl SourceParser {
    /// Create a driver over the given section assemblers.
    pub fn new(sections: Vec<Box<dyn SectionAssembler>>) -> Self {
        SourceParser {
            sections,
            current: None,
        }
    }

    /// Process a whole source file.
    pub fn parse(&mut self, source: &str) -> Result<()> {
        for (index, raw_line) in source.lines().enumerate() {
            self.parse_line(raw_line.trim())
                .map_err(|error| error.at_line(index + 1, raw_line))?;
        }
        Ok(())
    }

    /// Take the finished sections, in declaration order.
    pub fn finish(&mut self) -> Vec<Section> {
        self.sections
            .iter_mut()
            .map(|section| section.finish())
            .collect()
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix('.') {
            let name = match memchr(b'#', rest.as_bytes()) {
                Some(comment) => &rest[..comment],
                None => rest,
            }
            .trim();
            let index = self
                .sections
                .iter()
                .position(|section| section.section_name() == name)
                .ok_or_else(|| AssemblerError::UnknownSection {
                    name: name.to_string(),
                })?;
            self.current = Some(index);
            return Ok(());
        }

        let (token, rest) = split_first_token(line);
        if token.starts_with('#') {
            return Ok(());
        }
        if let Some(label) = token.strip_suffix(':') {
            self.current_assembler("label")?.add_label(label);
            return self.parse_line(rest.trim_start());
        }

        let mnemonic = token.to_ascii_lowercase();
        self.current_assembler("command")?
            .add_command(&mnemonic, rest)
    }

    fn current_assembler(&mut self, item: &'static str) -> Result<&mut dyn SectionAssembler> {
        match self.current {
            Some(index) => Ok(self.sections[index].as_mut()),
            None => Err(AssemblerError::OutsideSection { item }),
        }
    }
}

/// Split off the first whitespace-delimited token.
fn split_first_token(line: &str) -> (&str, &str) {
    match line.find(|c: char| c.is_ascii_whitespace()) {
        Some(boundary) => (&line[..boundary], &line[boundary..]),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::SectionKind;

    /// A section assembler that records what the driver hands it.
    struct RecordingAssembler {
        name: &'static str,
        events: Vec<String>,
    }

    impl RecordingAssembler {
        fn new(name: &'static str) -> Self {
            RecordingAssembler {
                name,
                events: Vec::new(),
            }
        }
    }

    impl SectionAssembler for RecordingAssembler {
        fn section_name(&self) -> &'static str {
            self.name
        }

        fn add_label(&mut self, name: &str) {
            self.events.push(format!("label {name}"));
        }

        fn add_command(&mut self, mnemonic: &str, operands: &str) -> Result<()> {
            if mnemonic == "bad" {
                return Err(AssemblerError::UnknownMnemonic {
                    mnemonic: mnemonic.to_string(),
                });
            }
            self.events.push(format!("command {mnemonic}|{operands}"));
            Ok(())
        }

        fn finish(&mut self) -> Section {
            let mut section = Section::new(SectionKind::Text, 8);
            for event in &self.events {
                section.add_symbol(event);
            }
            section
        }
    }

    fn parse(source: &str) -> std::result::Result<Vec<String>, AssemblerError> {
        let mut parser = SourceParser::new(vec![
            Box::new(RecordingAssembler::new("text")),
            Box::new(RecordingAssembler::new("data")),
        ]);
        parser.parse(source)?;
        Ok(parser.finish()[0]
            .symbols
            .iter()
            .map(|symbol| symbol.name.clone())
            .collect())
    }

    #[test]
    fn test_dispatch_and_comments() {
        let events = parse(".text # code goes here\n\n# whole-line comment\n  MOV %r1, %r2\n").unwrap();
        assert_eq!(events, vec!["command mov| %r1, %r2"]);
    }

    #[test]
    fn test_labels_before_commands() {
        let events = parse(".text\nstart:\nloop: nop\n").unwrap();
        assert_eq!(
            events,
            vec!["label start", "label loop", "command nop|"]
        );
    }

    #[test]
    fn test_unknown_section() {
        let err = parse(".bss\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 1"));
        assert!(message.contains("unknown section name: bss"));
    }

    #[test]
    fn test_command_outside_section() {
        let err = parse("nop\n").unwrap_err();
        assert!(err.to_string().contains("outside of a section"));
    }

    #[test]
    fn test_error_carries_line_number_and_text() {
        let err = parse(".text\nnop\nbad %r1\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 3"));
        assert!(message.contains("bad %r1"));
    }

    #[test]
    fn test_section_switch() {
        let mut parser = SourceParser::new(vec![
            Box::new(RecordingAssembler::new("text")),
            Box::new(RecordingAssembler::new("data")),
        ]);
        parser
            .parse(".data\nascii \"x\"\n.text\nnop\n")
            .unwrap();
        let sections = parser.finish();
        assert_eq!(sections[0].symbols[0].name, "command nop|");
        assert_eq!(sections[1].symbols[0].name, "command ascii| \"x\"");
    }
}
