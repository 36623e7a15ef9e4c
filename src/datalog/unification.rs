//! Unification of a rule-body predicate against a ground fact.
//!
//! This model only ever unifies a body predicate against a `Fact`
//! (never two free-variable predicates against each other), so the
//! teacher's general atom-vs-atom unification — and its variable-to-
//! variable canonicalization branch — does not apply here and is not
//! reproduced.

use crate::datalog::term::{Fact, Predicate, Term};
use std::collections::BTreeMap;

/// A partial variable binding built up while unifying a rule body.
pub type Binding = BTreeMap<u32, Term>;

/// Unify `predicate` against `fact`, extending `binding`. Returns the
/// extended binding on success, `None` on mismatch (arity differs, a
/// constant position disagrees, or a variable already bound to a
/// different value).
pub fn unify_predicate_with_fact(
    predicate: &Predicate,
    fact: &Fact,
    binding: &Binding,
) -> Option<Binding> {
    let fact = fact.predicate();
    if predicate.name != fact.name || predicate.terms.len() != fact.terms.len() {
        return None;
    }
    let mut extended = binding.clone();
    for (rule_term, fact_term) in predicate.terms.iter().zip(fact.terms.iter()) {
        match rule_term {
            Term::Variable(id) => match extended.get(id) {
                Some(bound) if bound != fact_term => return None,
                Some(_) => {}
                None => {
                    extended.insert(*id, fact_term.clone());
                }
            },
            constant => {
                if constant != fact_term {
                    return None;
                }
            }
        }
    }
    Some(extended)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_matching_constant_and_binds_variable() {
        let predicate = Predicate::new(0, vec![Term::String(10), Term::Variable(0)]);
        let fact = Fact::new(Predicate::new(0, vec![Term::String(10), Term::Integer(7)]));
        let binding = unify_predicate_with_fact(&predicate, &fact, &Binding::new()).unwrap();
        assert_eq!(binding.get(&0), Some(&Term::Integer(7)));
    }

    #[test]
    fn rejects_constant_mismatch() {
        let predicate = Predicate::new(0, vec![Term::String(10)]);
        let fact = Fact::new(Predicate::new(0, vec![Term::String(11)]));
        assert!(unify_predicate_with_fact(&predicate, &fact, &Binding::new()).is_none());
    }

    #[test]
    fn rejects_inconsistent_rebinding() {
        let predicate = Predicate::new(0, vec![Term::Variable(0), Term::Variable(0)]);
        let fact = Fact::new(Predicate::new(0, vec![Term::Integer(1), Term::Integer(2)]));
        assert!(unify_predicate_with_fact(&predicate, &fact, &Binding::new()).is_none());
    }

    #[test]
    fn rejects_arity_mismatch() {
        let predicate = Predicate::new(0, vec![Term::Variable(0)]);
        let fact = Fact::new(Predicate::new(0, vec![Term::Integer(1), Term::Integer(2)]));
        assert!(unify_predicate_with_fact(&predicate, &fact, &Binding::new()).is_none());
    }
}
