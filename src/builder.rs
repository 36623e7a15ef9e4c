//! A programmatic construction surface for facts, predicates, rules,
//! checks, and policies, standing in for the (out-of-scope) textual
//! surface language: callers build `Term`/`Predicate`/`Rule` values
//! directly from Rust values instead of parsing source text.

use crate::datalog::{Check, Expr, Fact, Predicate, Rule, Term};
use crate::error::Result;
use crate::symbol::SymbolTable;
use crate::policy::Policy;

/// An interned string term. Interning requires a symbol table, so
/// `string`/`s` take one by mutable reference and return the resulting
/// `Term::String`.
pub fn string(value: &str, symbols: &mut SymbolTable) -> Term {
    Term::String(symbols.insert(value))
}

/// Alias for `string`, matching the short name used throughout the
/// reference builder this module is grounded on.
pub fn s(value: &str, symbols: &mut SymbolTable) -> Term {
    string(value, symbols)
}

/// An integer term.
pub fn int(value: i64) -> Term {
    Term::Integer(value)
}

/// A date term (seconds since the Unix epoch).
pub fn date(seconds: u64) -> Term {
    Term::Date(seconds)
}

/// A boolean term.
pub fn boolean(value: bool) -> Term {
    Term::Bool(value)
}

/// A variable term. Variable identity is the FNV-1a hash of `name`,
/// so the same name always produces the same `Term::Variable` id
/// across a rule's head, body, and expressions without requiring a
/// shared naming context between builder calls.
pub fn var(name: &str) -> Term {
    Term::Variable(fnv1a(name))
}

fn fnv1a(s: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for b in s.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

/// Build a predicate, interning its name.
pub fn pred(name: &str, terms: &[Term], symbols: &mut SymbolTable) -> Predicate {
    let idx = symbols.insert(name);
    Predicate::new(idx, terms.to_vec())
}

/// Build a fact (a predicate asserted to be ground).
pub fn fact(name: &str, terms: &[Term], symbols: &mut SymbolTable) -> Fact {
    Fact::new(pred(name, terms, symbols))
}

/// Build a rule, interning the head's name. Validates well-formedness
/// (every head/expression variable must appear in the body),
/// propagating `UnboundHeadVariable` on failure.
pub fn rule(
    head_name: &str,
    head_terms: &[Term],
    body: &[Predicate],
    expressions: &[Expr],
    symbols: &mut SymbolTable,
) -> Result<Rule> {
    let head = pred(head_name, head_terms, symbols);
    Rule::new(head, body.to_vec(), expressions.to_vec())
}

/// Build a check from one or more query rules (an OR-of-queries).
pub fn check(queries: Vec<Rule>) -> Check {
    Check::new(queries)
}

/// An always-true query rule, useful for trivially-matching policies
/// such as a default-allow or default-deny.
pub fn trivially_true(head_name: &str, symbols: &mut SymbolTable) -> Rule {
    let head = pred(head_name, &[], symbols);
    Rule::unconditional(head)
}

/// An allow policy matching a set of queries.
pub fn allow(queries: Vec<Rule>) -> Policy {
    Policy::allow(queries)
}

/// A deny policy matching a set of queries.
pub fn deny(queries: Vec<Rule>) -> Policy {
    Policy::deny(queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_variable_name_yields_same_id() {
        assert_eq!(var("resource"), var("resource"));
        assert_ne!(var("resource"), var("operation"));
    }

    #[test]
    fn string_interning_round_trips() {
        let mut symbols = SymbolTable::empty();
        let t = string("hello", &mut symbols);
        match t {
            Term::String(idx) => assert_eq!(symbols.str(idx), Some("hello")),
            _ => panic!("expected a string term"),
        }
    }

    #[test]
    fn fact_is_ground_when_built_from_literals() {
        let mut symbols = SymbolTable::empty();
        let f = fact("resource", &[string("/a/file1.txt", &mut symbols)], &mut symbols);
        assert!(f.predicate().is_ground());
    }

    #[test]
    fn rule_rejects_unbound_head_variable() {
        let mut symbols = SymbolTable::empty();
        let err = rule("head", &[var("unbound")], &[], &[], &mut symbols);
        assert!(err.is_err());
    }
}
