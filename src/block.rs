//! Blocks: the attenuation unit carried on the wire.

use crate::datalog::{Check, Fact, Rule};
use crate::error::{CoreError, Result};
use crate::symbol::SymbolTable;

/// Versions accepted by the core; older shapes are converted by an
/// external collaborator before reaching it.
pub const SUPPORTED_VERSIONS: &[u32] = &[3, 4];

/// One block in the ordered chain: its own disjoint symbol table,
/// ordered facts, rules, and checks, an optional free-form context
/// string, and a schema version.
#[derive(Debug, Clone)]
pub struct Block {
    pub symbols: SymbolTable,
    pub facts: Vec<Fact>,
    pub rules: Vec<Rule>,
    pub checks: Vec<Check>,
    pub context: Option<String>,
    pub version: u32,
}

impl Block {
    /// Build a block, rejecting versions outside `{3, 4}`.
    pub fn new(
        symbols: SymbolTable,
        facts: Vec<Fact>,
        rules: Vec<Rule>,
        checks: Vec<Check>,
        context: Option<String>,
        version: u32,
    ) -> Result<Self> {
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(CoreError::UnsupportedVersion(version));
        }
        Ok(Block {
            symbols,
            facts,
            rules,
            checks,
            context,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_version() {
        let err = Block::new(SymbolTable::empty(), vec![], vec![], vec![], None, 5);
        assert!(matches!(err, Err(CoreError::UnsupportedVersion(5))));
    }

    #[test]
    fn accepts_supported_versions() {
        for v in SUPPORTED_VERSIONS {
            assert!(Block::new(SymbolTable::empty(), vec![], vec![], vec![], None, *v).is_ok());
        }
    }
}
