//! Terms, predicates, and facts: the closed value model rules and
//! expressions operate over.

use crate::error::{CoreError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A tagged value. Variables are binding placeholders permitted only
/// in rule heads/bodies and expression values; they are forbidden
/// inside facts and inside sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A binding placeholder, identified by a small integer.
    Variable(u32),
    /// A signed 64-bit integer.
    Integer(i64),
    /// An interned string, referenced by its symbol-table index.
    String(u64),
    /// Seconds since the Unix epoch.
    Date(u64),
    /// A boolean.
    Bool(bool),
    /// Opaque bytes.
    Bytes(Arc<[u8]>),
    /// An unordered, homogeneously-typed, non-empty, variable-free,
    /// non-nested collection of terms.
    Set(Arc<BTreeSet<Term>>),
}

impl Term {
    /// Whether this term is a `Variable`.
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// The variable id, if this is a `Variable`.
    pub fn as_variable(&self) -> Option<u32> {
        match self {
            Term::Variable(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this term contains no variable (ground).
    pub fn is_ground(&self) -> bool {
        !self.is_variable()
    }

    /// Build a validated `Set` term. Rejects empty sets, heterogeneous
    /// element types, elements containing variables, and nested sets.
    pub fn set(elements: impl IntoIterator<Item = Term>) -> Result<Term> {
        let elements: BTreeSet<Term> = elements.into_iter().collect();
        if elements.is_empty() {
            return Err(CoreError::InvalidTerm("set must be non-empty".into()));
        }
        let mut discriminants = elements.iter().map(std::mem::discriminant);
        let first = discriminants.next().unwrap();
        if discriminants.any(|d| d != first) {
            return Err(CoreError::InvalidTerm(
                "set elements must be homogeneously typed".into(),
            ));
        }
        for e in &elements {
            match e {
                Term::Variable(_) => {
                    return Err(CoreError::InvalidTerm(
                        "set elements must not contain variables".into(),
                    ))
                }
                Term::Set(_) => {
                    return Err(CoreError::InvalidTerm("sets must not nest".into()))
                }
                _ => {}
            }
        }
        Ok(Term::Set(Arc::new(elements)))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(id) => write!(f, "${}", id),
            Term::Integer(i) => write!(f, "{}", i),
            Term::String(idx) => write!(f, "#{}", idx),
            Term::Date(secs) => write!(f, "@{}", secs),
            Term::Bool(b) => write!(f, "{}", b),
            Term::Bytes(_) => write!(f, "<bytes>"),
            Term::Set(elems) => {
                write!(f, "{{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A named relation: a symbol-index name and an ordered list of terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Predicate {
    /// Symbol-table index of the predicate name.
    pub name: u64,
    /// Ordered arguments.
    pub terms: Vec<Term>,
}

impl Predicate {
    /// Build a predicate from a name index and terms.
    pub fn new(name: u64, terms: Vec<Term>) -> Self {
        Predicate { name, terms }
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Variable ids appearing anywhere in the argument list.
    pub fn variables(&self) -> Vec<u32> {
        self.terms.iter().filter_map(Term::as_variable).collect()
    }

    /// Whether every argument is ground.
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(Term::is_ground)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}(", self.name)?;
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, ")")
    }
}

/// A predicate in which every term is ground. Facts compare by
/// structural equality; the world's fact container enforces set
/// semantics (inserting an equal fact is a no-op).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fact(pub Predicate);

impl Fact {
    /// Wrap a ground predicate as a fact. Does not itself verify
    /// groundness — callers that construct facts from rule heads check
    /// this via the evaluator's binding step instead, matching §4.C's
    /// "if H[θ] contains any unbound variable, discard" rule.
    pub fn new(predicate: Predicate) -> Self {
        Fact(predicate)
    }

    /// The underlying predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.0
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_predicate_has_no_variables() {
        let p = Predicate::new(0, vec![Term::Integer(1), Term::String(2)]);
        assert!(p.is_ground());
        assert!(p.variables().is_empty());
    }

    #[test]
    fn predicate_with_variable_is_not_ground() {
        let p = Predicate::new(0, vec![Term::Variable(0), Term::Integer(1)]);
        assert!(!p.is_ground());
        assert_eq!(p.variables(), vec![0]);
    }

    #[test]
    fn set_rejects_empty() {
        assert!(Term::set(vec![]).is_err());
    }

    #[test]
    fn set_rejects_heterogeneous() {
        let err = Term::set(vec![Term::Integer(1), Term::Bool(true)]);
        assert!(err.is_err());
    }

    #[test]
    fn set_rejects_variable_elements() {
        assert!(Term::set(vec![Term::Variable(0)]).is_err());
    }

    #[test]
    fn set_rejects_nesting() {
        let inner = Term::set(vec![Term::Integer(1)]).unwrap();
        assert!(Term::set(vec![inner]).is_err());
    }

    #[test]
    fn set_accepts_homogeneous_non_empty() {
        let s = Term::set(vec![Term::Integer(1), Term::Integer(2)]).unwrap();
        assert!(matches!(s, Term::Set(_)));
    }
}
