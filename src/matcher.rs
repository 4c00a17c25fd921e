//! Signature matching.
//!
//! Given the operand string of a line and every signature declared for its
//! mnemonic, exactly one candidate must consume the string. Zero matches
//! is a parse error; several matches is a configuration problem and is
//! surfaced with the competing signatures listed, never silently
//! disambiguated.

use std::sync::Arc;

use crate::error::{AssemblerError, Result};
use crate::scanners::{Operand, Scanner};

/// One candidate signature: an ordered sequence of scanners, one per
/// operand position.
pub type Signature<O> = Vec<Arc<dyn Scanner<O>>>;

/// Match `line` against every candidate signature.
///
/// Returns the index of the unique matching candidate together with its
/// parsed operands. Scanner errors (an overflowing immediate, an
/// unterminated literal) abort matching immediately rather than failing
/// over to other candidates.
pub fn match_operands<O: Operand>(
    mnemonic: &str,
    line: &str,
    signatures: &[&Signature<O>],
) -> Result<(usize, Vec<O>)> {
    let mut matches: Vec<(usize, Vec<O>)> = Vec::new();
    for (index, signature) in signatures.iter().enumerate() {
        if let Some(operands) = try_candidate(line, signature)? {
            matches.push((index, operands));
        }
    }
    match matches.len() {
        0 => Err(AssemblerError::NoMatchingSignature {
            mnemonic: mnemonic.to_string(),
        }),
        1 => Ok(matches.pop().expect("one match")),
        count => Err(AssemblerError::AmbiguousSignature {
            mnemonic: mnemonic.to_string(),
            count,
            signatures: matches
                .iter()
                .map(|(index, _)| describe(signatures[*index]))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Run one candidate over the line.
///
/// Repeatedly skips runs of whitespace and commas; at a `#` or the end of
/// the line the candidate succeeds only if every scanner has already
/// matched, and a scanner is only invoked while input remains.
fn try_candidate<O: Operand>(line: &str, signature: &Signature<O>) -> Result<Option<Vec<O>>> {
    let mut offset = 0;
    let mut operands = Vec::with_capacity(signature.len());
    let mut scanners = signature.iter();
    loop {
        offset = skip_delimiters(line, offset);
        let terminated = offset >= line.len() || line.as_bytes()[offset] == b'#';
        let Some(scanner) = scanners.next() else {
            return Ok(terminated.then_some(operands));
        };
        if terminated {
            return Ok(None);
        }
        let Some(operand) = scanner.attempt(line, offset)? else {
            return Ok(None);
        };
        offset += operand.length_in_chars();
        operands.push(operand);
    }
}

/// Skip a run of whitespace and commas.
fn skip_delimiters(line: &str, offset: usize) -> usize {
    line.as_bytes()[offset..]
        .iter()
        .position(|b| !b.is_ascii_whitespace() && *b != b',')
        .map_or(line.len(), |skipped| offset + skipped)
}

fn describe<O: Operand>(signature: &Signature<O>) -> String {
    signature
        .iter()
        .map(|scanner| scanner.type_name())
        .collect::<Vec<_>>()
        .join(" ")
}
