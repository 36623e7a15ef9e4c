//! World: the fact/rule containers and the semi-naive saturation
//! evaluator.

use crate::datalog::rule::Rule;
use crate::datalog::term::{Fact, Predicate, Term};
use crate::datalog::unification::{unify_predicate_with_fact, Binding};
use crate::error::{CoreError, Result};
use crate::symbol::SymbolTable;
use ahash::AHashSet as HashSet;
use std::time::{Duration, Instant};
use tracing::trace;

/// Resource budgets enforced by `World::run`. Exceeding any of them
/// fails with `EvaluationLimitExceeded` rather than looping forever or
/// exhausting memory on attacker-crafted rule sets.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_iterations: usize,
    pub max_facts: usize,
    pub max_time: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        RunLimits {
            max_iterations: 1000,
            max_facts: 1_000_000,
            max_time: Duration::from_secs(1),
        }
    }
}

/// The evaluator state: a fact set and a rule set.
#[derive(Debug, Clone, Default)]
pub struct World {
    facts: HashSet<Fact>,
    rules: Vec<Rule>,
}

impl World {
    pub fn new() -> Self {
        World::default()
    }

    /// Idempotent insert; returns `true` if the fact set grew.
    pub fn add_fact(&mut self, fact: Fact) -> bool {
        self.facts.insert(fact)
    }

    /// Append a rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Read-only view of the fact set.
    pub fn facts(&self) -> &HashSet<Fact> {
        &self.facts
    }

    /// Read-only view of the rule set.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Drop all rules, retaining facts. Used between pipeline layers so
    /// a later block's rules cannot fire retroactively on earlier
    /// facts.
    pub fn reset_rules(&mut self) {
        self.rules.clear();
    }

    /// Saturate the world: repeatedly apply every rule and add produced
    /// facts until a full pass adds nothing new. Semi-naive: each
    /// iteration after the first only re-joins rule bodies against
    /// facts produced in the *previous* iteration (the delta), not the
    /// whole accumulated set, while still reaching the identical
    /// fixpoint as naive evaluation.
    pub fn run(&mut self, symbols: &SymbolTable, limits: &RunLimits) -> Result<()> {
        let start = Instant::now();
        let mut delta: HashSet<Fact> = self.facts.clone();
        let mut iterations = 0usize;

        loop {
            if start.elapsed() > limits.max_time {
                return Err(CoreError::EvaluationLimitExceeded(format!(
                    "wall-clock budget of {:?} exceeded",
                    limits.max_time
                )));
            }
            if iterations >= limits.max_iterations {
                return Err(CoreError::EvaluationLimitExceeded(format!(
                    "iteration budget of {} exceeded",
                    limits.max_iterations
                )));
            }
            iterations += 1;

            let mut new_facts: HashSet<Fact> = HashSet::default();
            for rule in &self.rules {
                for head in derive_heads(rule, &self.facts, &delta, symbols) {
                    if !self.facts.contains(&head) {
                        new_facts.insert(head);
                    }
                }
            }

            if new_facts.is_empty() {
                trace!(iterations, total_facts = self.facts.len(), "world saturated");
                return Ok(());
            }

            if self.facts.len() + new_facts.len() > limits.max_facts {
                return Err(CoreError::EvaluationLimitExceeded(format!(
                    "fact budget of {} exceeded",
                    limits.max_facts
                )));
            }

            for f in &new_facts {
                self.facts.insert(f.clone());
            }
            delta = new_facts;
        }
    }

    /// Produce the head-tuples of all bindings that satisfy `rule`
    /// against the current fact set, without mutating the world.
    pub fn query_rule(&self, rule: &Rule, symbols: &SymbolTable) -> HashSet<Fact> {
        derive_heads(rule, &self.facts, &self.facts, symbols)
    }
}

/// Enumerate every binding that satisfies `rule`'s body against
/// `all_facts`, requiring that at least one body position matches a
/// fact from `delta` (the semi-naive restriction — a binding entirely
/// drawn from facts older than the last iteration was already produced
/// in a prior pass). Filter by expressions, then ground the head.
fn derive_heads(
    rule: &Rule,
    all_facts: &HashSet<Fact>,
    delta: &HashSet<Fact>,
    symbols: &SymbolTable,
) -> Vec<Fact> {
    if rule.body.is_empty() {
        return ground_head(&rule.head, &Binding::new())
            .into_iter()
            .filter(|_| rule.expressions.iter().all(|e| {
                e.evaluate_with_symbols(&Binding::new(), symbols) == Some(true)
            }))
            .collect();
    }

    let mut heads = Vec::new();
    for touched_position in 0..rule.body.len() {
        let bindings = join_body_with_delta(&rule.body, touched_position, all_facts, delta);
        for binding in bindings {
            if !rule
                .expressions
                .iter()
                .all(|e| e.evaluate_with_symbols(&binding, symbols) == Some(true))
            {
                continue;
            }
            heads.extend(ground_head(&rule.head, &binding));
        }
    }
    heads
}

/// Join all body predicates, requiring the predicate at
/// `touched_position` to match a fact drawn from `delta` and every
/// other position to match a fact from `all_facts`. Iterating
/// `touched_position` across the whole body and taking the union
/// (duplicates are harmless — callers dedupe via set semantics) is the
/// standard semi-naive rewrite of `new_i = body_1..i-1(all) ⋈ body_i(delta) ⋈ body_i+1..(all)`.
fn join_body_with_delta(
    body: &[Predicate],
    touched_position: usize,
    all_facts: &HashSet<Fact>,
    delta: &HashSet<Fact>,
) -> Vec<Binding> {
    let mut bindings = vec![Binding::new()];
    for (position, predicate) in body.iter().enumerate() {
        let source = if position == touched_position {
            delta
        } else {
            all_facts
        };
        let mut next = Vec::new();
        for binding in &bindings {
            for fact in source {
                if let Some(extended) = unify_predicate_with_fact(predicate, fact, binding) {
                    next.push(extended);
                }
            }
        }
        bindings = next;
        if bindings.is_empty() {
            break;
        }
    }
    bindings
}

fn ground_head(head: &Predicate, binding: &Binding) -> Option<Fact> {
    let mut terms = Vec::with_capacity(head.terms.len());
    for term in &head.terms {
        match term {
            Term::Variable(id) => {
                let bound = binding.get(id)?;
                terms.push(bound.clone());
            }
            constant => terms.push(constant.clone()),
        }
    }
    Some(Fact::new(Predicate::new(head.name, terms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datalog::expression::{BinaryOp, Expr, Op};

    fn symbols() -> SymbolTable {
        SymbolTable::empty()
    }

    #[test]
    fn fact_insertion_is_idempotent() {
        let mut w = World::new();
        let f = Fact::new(Predicate::new(0, vec![Term::Integer(1)]));
        assert!(w.add_fact(f.clone()));
        assert!(!w.add_fact(f));
        assert_eq!(w.facts().len(), 1);
    }

    #[test]
    fn single_hop_rule_fires() {
        let mut w = World::new();
        w.add_fact(Fact::new(Predicate::new(0, vec![Term::Integer(1)])));
        // derived(X) :- base(X)
        let rule = Rule::new(
            Predicate::new(1, vec![Term::Variable(0)]),
            vec![Predicate::new(0, vec![Term::Variable(0)])],
            vec![],
        )
        .unwrap();
        w.add_rule(rule);
        w.run(&symbols(), &RunLimits::default()).unwrap();
        assert!(w
            .facts()
            .contains(&Fact::new(Predicate::new(1, vec![Term::Integer(1)]))));
    }

    #[test]
    fn transitive_closure_saturates() {
        let mut w = World::new();
        // edge(1,2), edge(2,3)
        w.add_fact(Fact::new(Predicate::new(
            0,
            vec![Term::Integer(1), Term::Integer(2)],
        )));
        w.add_fact(Fact::new(Predicate::new(
            0,
            vec![Term::Integer(2), Term::Integer(3)],
        )));
        // path(X,Y) :- edge(X,Y)
        w.add_rule(
            Rule::new(
                Predicate::new(1, vec![Term::Variable(0), Term::Variable(1)]),
                vec![Predicate::new(
                    0,
                    vec![Term::Variable(0), Term::Variable(1)],
                )],
                vec![],
            )
            .unwrap(),
        );
        // path(X,Z) :- path(X,Y), edge(Y,Z)
        w.add_rule(
            Rule::new(
                Predicate::new(1, vec![Term::Variable(0), Term::Variable(2)]),
                vec![
                    Predicate::new(1, vec![Term::Variable(0), Term::Variable(1)]),
                    Predicate::new(0, vec![Term::Variable(1), Term::Variable(2)]),
                ],
                vec![],
            )
            .unwrap(),
        );
        w.run(&symbols(), &RunLimits::default()).unwrap();
        assert!(w.facts().contains(&Fact::new(Predicate::new(
            1,
            vec![Term::Integer(1), Term::Integer(3)]
        ))));
    }

    #[test]
    fn expression_filters_binding() {
        let mut w = World::new();
        w.add_fact(Fact::new(Predicate::new(0, vec![Term::Integer(5)])));
        w.add_fact(Fact::new(Predicate::new(0, vec![Term::Integer(-5)])));
        // positive(X) :- base(X), X > 0
        let expr = Expr::new()
            .push(Op::Value(Term::Variable(0)))
            .push(Op::Value(Term::Integer(0)))
            .push(Op::Binary(BinaryOp::GreaterThan));
        let rule = Rule::new(
            Predicate::new(1, vec![Term::Variable(0)]),
            vec![Predicate::new(0, vec![Term::Variable(0)])],
            vec![expr],
        )
        .unwrap();
        w.add_rule(rule);
        w.run(&symbols(), &RunLimits::default()).unwrap();
        assert!(w
            .facts()
            .contains(&Fact::new(Predicate::new(1, vec![Term::Integer(5)]))));
        assert!(!w
            .facts()
            .contains(&Fact::new(Predicate::new(1, vec![Term::Integer(-5)]))));
    }

    #[test]
    fn run_is_idempotent() {
        let mut w = World::new();
        w.add_fact(Fact::new(Predicate::new(0, vec![Term::Integer(1)])));
        w.add_rule(
            Rule::new(
                Predicate::new(1, vec![Term::Variable(0)]),
                vec![Predicate::new(0, vec![Term::Variable(0)])],
                vec![],
            )
            .unwrap(),
        );
        w.run(&symbols(), &RunLimits::default()).unwrap();
        let after_first = w.facts().clone();
        w.run(&symbols(), &RunLimits::default()).unwrap();
        assert_eq!(after_first, *w.facts());
    }

    #[test]
    fn iteration_budget_is_enforced() {
        // A three-hop predicate chain takes three saturation passes to
        // fully derive (each hop's fact only becomes visible to the
        // next rule on the following pass); a budget of two must fail
        // before the chain completes.
        let mut w = World::new();
        w.add_fact(Fact::new(Predicate::new(0, vec![Term::Integer(0)])));
        w.add_rule(
            Rule::new(
                Predicate::new(1, vec![Term::Variable(0)]),
                vec![Predicate::new(0, vec![Term::Variable(0)])],
                vec![],
            )
            .unwrap(),
        );
        w.add_rule(
            Rule::new(
                Predicate::new(2, vec![Term::Variable(0)]),
                vec![Predicate::new(1, vec![Term::Variable(0)])],
                vec![],
            )
            .unwrap(),
        );
        w.add_rule(
            Rule::new(
                Predicate::new(3, vec![Term::Variable(0)]),
                vec![Predicate::new(2, vec![Term::Variable(0)])],
                vec![],
            )
            .unwrap(),
        );
        let limits = RunLimits {
            max_iterations: 2,
            ..RunLimits::default()
        };
        let result = w.run(&symbols(), &limits);
        assert!(matches!(result, Err(CoreError::EvaluationLimitExceeded(_))));
    }
}
