//! Monistode assembler CLI.
//!
//! Command-line front-end: `assemble` packs a source file into an object
//! file, `disassemble` renders an object file back to a listing.

use anyhow::Context;
use clap::{Parser, Subcommand};
use monistode_assembler::{Assembler, Configuration, Disassembler, ObjectFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

/// Assemble and disassemble monistode assembly files.
///
/// The ISA description is a YAML document defining word widths, opcode
/// placement, register groups, and the command set; nothing about the
/// target ISA is built into the tool.
#[derive(Parser, Debug)]
#[command(name = "monistode-asm")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a source file into an object file.
    Assemble {
        /// ISA description (YAML)
        configuration: PathBuf,
        /// Assembly source file
        source: PathBuf,
        /// Output object file
        destination: PathBuf,
    },
    /// Disassemble an object file into a source listing.
    Disassemble {
        /// ISA description (YAML)
        configuration: PathBuf,
        /// Input object file
        source: PathBuf,
        /// Output listing; standard output when omitted
        destination: Option<PathBuf>,
        /// Print only the object header summary
        #[arg(long)]
        header_only: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("monistode_assembler=debug,monistode_asm=debug")
            .init();
    }

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Assemble {
            configuration,
            source,
            destination,
        } => {
            let configuration = load_configuration(&configuration)?;
            let text = std::fs::read_to_string(&source)
                .with_context(|| format!("cannot read {}", source.display()))?;

            let assembler = Assembler::new(configuration)?;
            let object = assembler.assemble(&text)?;
            debug!(
                text_words = object.text.words.len(),
                data_words = object.data.words.len(),
                relocations = object.text.relocations.len(),
                "assembled"
            );

            std::fs::write(&destination, object.to_bytes())
                .with_context(|| format!("cannot write {}", destination.display()))?;
            Ok(())
        }
        Command::Disassemble {
            configuration,
            source,
            destination,
            header_only,
        } => {
            let configuration = load_configuration(&configuration)?;
            let bytes = std::fs::read(&source)
                .with_context(|| format!("cannot read {}", source.display()))?;
            let object = ObjectFile::from_bytes(&bytes)?;
            debug!(text_words = object.text.words.len(), "loaded object");

            let disassembler = Disassembler::new(&configuration);
            let output = if header_only {
                disassembler.disassemble_header(&object)
            } else {
                disassembler.disassemble(&object)?
            };

            match destination {
                Some(path) => std::fs::write(&path, output + "\n")
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => {
                    let stdout = std::io::stdout();
                    writeln!(stdout.lock(), "{output}")?;
                }
            }
            Ok(())
        }
    }
}

fn load_configuration(path: &Path) -> anyhow::Result<Configuration> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let configuration = Configuration::from_yaml(&document)
        .with_context(|| format!("invalid ISA description {}", path.display()))?;
    debug!(
        commands = configuration.commands.len(),
        register_groups = configuration.register_groups.len(),
        "loaded ISA description"
    );
    Ok(configuration)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_ISA: &str = "\
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
";

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from([
            "monistode-asm",
            "assemble",
            "isa.yaml",
            "program.s",
            "program.o",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Assemble { .. }));
        assert!(!args.verbose);
    }

    #[test]
    fn test_disassemble_destination_is_optional() {
        let args = Args::try_parse_from([
            "monistode-asm",
            "disassemble",
            "--header-only",
            "isa.yaml",
            "program.o",
        ])
        .unwrap();
        match args.command {
            Command::Disassemble {
                destination,
                header_only,
                ..
            } => {
                assert!(destination.is_none());
                assert!(header_only);
            }
            other => panic!("expected disassemble, got {other:?}"),
        }
    }

    #[test]
    fn test_file_round_trip() {
        let directory = tempfile::tempdir().unwrap();
        let isa = directory.path().join("isa.yaml");
        let source = directory.path().join("program.s");
        let object = directory.path().join("program.o");
        let listing = directory.path().join("listing.s");
        std::fs::write(&isa, DEMO_ISA).unwrap();
        std::fs::write(&source, ".text\nstart:\njmp start\nnop\n").unwrap();

        run(Command::Assemble {
            configuration: isa.clone(),
            source,
            destination: object.clone(),
        })
        .unwrap();

        run(Command::Disassemble {
            configuration: isa,
            source: object,
            destination: Some(listing.clone()),
            header_only: false,
        })
        .unwrap();

        let rendered = std::fs::read_to_string(&listing).unwrap();
        assert!(rendered.contains("jmp start"));
        assert!(rendered.contains("nop"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = run(Command::Assemble {
            configuration: PathBuf::from("/nonexistent/isa.yaml"),
            source: PathBuf::from("/nonexistent/a.s"),
            destination: PathBuf::from("/nonexistent/a.o"),
        })
        .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
