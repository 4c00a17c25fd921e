//! Scanner for register operands.

use crate::config::RegisterGroup;
use crate::error::Result;
use crate::scanners::{ParsedOperand, Scanner};

/// Scanner for `%name` registers drawn from one group.
#[derive(Debug, Clone)]
pub struct RegisterScanner {
    group_name: String,
    group: RegisterGroup,
}

impl RegisterScanner {
    /// Create a scanner over the named group.
    pub fn new(group_name: String, group: RegisterGroup) -> Self {
        RegisterScanner { group_name, group }
    }

    /// Name of the group this scanner draws from.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }
}

impl Scanner<ParsedOperand> for RegisterScanner {
    fn type_name(&self) -> String {
        format!("{} register", self.group.sorted_names().join("|"))
    }

    fn attempt(&self, line: &str, offset: usize) -> Result<Option<ParsedOperand>> {
        let bytes = line.as_bytes();
        if offset >= bytes.len() || bytes[offset] != b'%' {
            return Ok(None);
        }
        let name_start = offset + 1;
        let name_length = bytes[name_start..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric())
            .count();
        if name_length == 0 {
            return Ok(None);
        }
        let name = &line[name_start..name_start + name_length];
        let Some(index) = self.group.index_of(name) else {
            return Ok(None);
        };
        Ok(Some(ParsedOperand {
            type_name: self.type_name(),
            length_in_chars: 1 + name_length,
            value: index,
            n_bits: self.group.length,
            relocations: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegisterSet;

    pub(crate) fn general_group() -> RegisterGroup {
        RegisterGroup {
            length: 2,
            registers: RegisterSet::Ordered(vec![
                "r0".to_string(),
                "r1".to_string(),
                "r2".to_string(),
                "r3".to_string(),
            ]),
        }
    }

    #[test]
    fn test_register() {
        let scanner = RegisterScanner::new("general".to_string(), general_group());
        let operand = scanner.attempt("%r2, %r1", 0).unwrap().unwrap();
        assert_eq!(operand.value, 2);
        assert_eq!(operand.n_bits, 2);
        assert_eq!(operand.length_in_chars, 3);
    }

    #[test]
    fn test_unknown_register_name() {
        let scanner = RegisterScanner::new("general".to_string(), general_group());
        assert!(scanner.attempt("%r9", 0).unwrap().is_none());
    }

    #[test]
    fn test_not_a_register() {
        let scanner = RegisterScanner::new("general".to_string(), general_group());
        assert!(scanner.attempt("r1", 0).unwrap().is_none());
        assert!(scanner.attempt("%", 0).unwrap().is_none());
    }

    #[test]
    fn test_type_name_lists_group() {
        let scanner = RegisterScanner::new("general".to_string(), general_group());
        assert_eq!(scanner.type_name(), "r0|r1|r2|r3 register");
    }
}
