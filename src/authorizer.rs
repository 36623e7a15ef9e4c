//! The authorization pipeline: combines a biscuit's blocks with
//! authorizer-supplied facts, rules, checks, and policies to render a
//! verdict.

use crate::biscuit::Biscuit;
use crate::block::Block;
use crate::datalog::{Check, Fact, Predicate, Rule, RunLimits, Term, World};
use crate::error::{CoreError, Result};
use crate::policy::{Policy, PolicyKind};
use crate::symbol::SymbolTable;
use tracing::{debug, instrument, trace};

/// Where the authorizer is in its lifecycle. `Dirty` after the first
/// `run`/`query`/`authorize`; `reset` restores `Fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Dirty,
}

/// The verdict produced by `authorize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An allow policy matched and no check failed.
    Ok(usize),
}

/// Accumulates authorizer-local facts/rules/checks/policies, then
/// evaluates them against a `Biscuit`'s block chain.
pub struct Authorizer {
    symbols: SymbolTable,
    facts: Vec<Fact>,
    rules: Vec<Rule>,
    checks: Vec<Check>,
    policies: Vec<Policy>,
    limits: RunLimits,
    state: State,
    world: Option<World>,
}

impl Authorizer {
    /// A fresh authorizer with the default base symbol table and
    /// default resource limits.
    pub fn new() -> Self {
        Authorizer {
            symbols: SymbolTable::new(),
            facts: Vec::new(),
            rules: Vec::new(),
            checks: Vec::new(),
            policies: Vec::new(),
            limits: RunLimits::default(),
            state: State::Fresh,
            world: None,
        }
    }

    /// Override the default resource budgets.
    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Mutable access to the authorizer's symbol table, for interning
    /// terms to pass into `add_fact`/`add_rule`/`add_check`/`add_policy`.
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn add_fact(&mut self, fact: Fact) {
        self.facts.push(fact);
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn add_check(&mut self, check: Check) {
        self.checks.push(check);
    }

    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Restore the authorizer to its post-construction state: no
    /// accumulated facts/rules/checks/policies, no evaluated world.
    pub fn reset(&mut self) {
        self.symbols = SymbolTable::new();
        self.facts.clear();
        self.rules.clear();
        self.checks.clear();
        self.policies.clear();
        self.world = None;
        self.state = State::Fresh;
    }

    /// Ad-hoc query over the current world. Requires at least one
    /// prior `run` (via `authorize`); the world otherwise has nothing
    /// to query.
    pub fn query(&mut self, rule: &Rule) -> Result<Vec<Fact>> {
        self.state = State::Dirty;
        let world = self
            .world
            .as_ref()
            .ok_or_else(|| CoreError::EvaluationLimitExceeded("no run has occurred yet".into()))?;
        Ok(world.query_rule(rule, &self.symbols).into_iter().collect())
    }

    /// Whether the authorizer has evaluated at least once since
    /// construction or the last `reset`.
    pub fn is_dirty(&self) -> bool {
        self.state == State::Dirty
    }

    /// Externalise authorizer *inputs* (facts/rules/checks/policies),
    /// not the post-evaluation fact set. Fails with
    /// `SerializeAfterRun` once the authorizer has evaluated, since
    /// only pre-evaluation input is meant to round-trip.
    pub fn serialize_policies(&self) -> Result<Vec<u8>> {
        if self.state == State::Dirty {
            return Err(CoreError::SerializeAfterRun);
        }
        #[derive(serde::Serialize)]
        struct Envelope<'a> {
            facts: &'a [Fact],
            policies_count: usize,
            checks_count: usize,
        }
        let envelope = Envelope {
            facts: &self.facts,
            policies_count: self.policies.len(),
            checks_count: self.checks.len(),
        };
        serde_json::to_vec(&envelope)
            .map_err(|e| CoreError::InvalidTerm(format!("serialization failure: {e}")))
    }

    /// Human-readable dump of the last-evaluated world, for debugging.
    pub fn print_world(&self) -> String {
        match &self.world {
            Some(world) => {
                let mut facts: Vec<String> = world.facts().iter().map(|f| f.to_string()).collect();
                facts.sort();
                let mut rules: Vec<String> = world.rules().iter().map(|r| r.head.to_string()).collect();
                rules.sort();
                format!("World {{\n  facts: {:#?}\n  rules: {:#?}\n}}", facts, rules)
            }
            None => "World { <not yet evaluated> }".to_string(),
        }
    }

    /// Render a rendered-check message as required by §7's error
    /// taxonomy, without depending on a text pretty-printer for terms.
    fn render_check(scope: &str, index: usize) -> String {
        format!("failed to verify {scope} check #{index}")
    }

    /// The `Authorize()` procedure (spec.md §4.D).
    #[instrument(skip(self, biscuit))]
    pub fn authorize(&mut self, biscuit: &Biscuit) -> Result<Verdict> {
        self.state = State::Dirty;
        let mut errors: Vec<String> = Vec::new();

        // 1. Import authority facts/rules, translated into our symbol table.
        let mut world = World::new();
        for fact in &self.facts {
            world.add_fact(fact.clone());
        }
        for rule in &self.rules {
            world.add_rule(rule.clone());
        }
        import_block(&mut world, biscuit.authority(), &mut self.symbols)?;

        // 2. Saturate.
        world.run(&self.symbols, &self.limits)?;
        trace!(facts = world.facts().len(), "authority layer saturated");

        // 3. Check the authorizer's own checks.
        for (i, check) in self.checks.iter().enumerate() {
            if !check_matches(check, &world, &self.symbols) {
                errors.push(Self::render_check("authorizer", i));
            }
        }

        // 4. Check authority (block 0) checks.
        for (i, check) in biscuit.authority().checks.iter().enumerate() {
            if !check_matches(check, &world, &self.symbols) {
                errors.push(Self::render_check("block 0", i));
            }
        }

        // 5. Apply policies in order; first match wins.
        let mut policy_result: Option<std::result::Result<usize, usize>> = None;
        for (i, policy) in self.policies.iter().enumerate() {
            if policy.queries.iter().any(|q| rule_matches(q, &world, &self.symbols)) {
                policy_result = Some(match policy.kind {
                    PolicyKind::Allow => Ok(i),
                    PolicyKind::Deny => Err(i),
                });
                break;
            }
        }

        // 6. Freeze the rule layer: facts remain, rules are dropped so
        // later blocks cannot be retroactively influenced.
        world.reset_rules();
        let base_world = world;
        let mut last_world = base_world.clone();

        // 7. Attenuation blocks, each in its own cloned-and-extended world.
        for (i, block) in biscuit.attenuation_blocks().iter().enumerate() {
            let block_id = i + 1;
            let mut block_world = base_world.clone();
            import_block(&mut block_world, block, &mut self.symbols)?;
            block_world.run(&self.symbols, &self.limits)?;
            debug!(block_id, "attenuation block evaluated");

            for (j, check) in block.checks.iter().enumerate() {
                if !check_matches(check, &block_world, &self.symbols) {
                    errors.push(Self::render_check(&format!("block {block_id}"), j));
                }
            }
            block_world.reset_rules();
            last_world = block_world;
        }

        // 8. Finalise. Retain the last-evaluated world (the base world
        // if there were no attenuation blocks, else the final block's
        // world) for `print_world`/`query` inspection, win or lose.
        self.world = Some(last_world);
        if !errors.is_empty() {
            return Err(CoreError::VerificationFailed(errors));
        }
        match policy_result {
            Some(Ok(i)) => Ok(Verdict::Ok(i)),
            Some(Err(i)) => Err(CoreError::PolicyDenied(i)),
            None => Err(CoreError::NoMatchingPolicy),
        }
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Authorizer::new()
    }
}

/// Decode a block's facts/rules from its own symbol table into the
/// authorizer's table (round-trip: translate through text, re-intern),
/// adding the results to `world`. Fatal on failure: symbol conversion
/// failures abort `authorize` naming the offending block.
fn import_block(world: &mut World, block: &Block, symbols: &mut SymbolTable) -> Result<()> {
    for fact in &block.facts {
        world.add_fact(translate_fact(fact, &block.symbols, symbols));
    }
    for rule in &block.rules {
        world.add_rule(translate_rule(rule, &block.symbols, symbols));
    }
    Ok(())
}

/// Round-trip a predicate's symbol-indexed terms from `source`'s table
/// into `target`'s table.
fn translate_predicate(predicate: &Predicate, source: &SymbolTable, target: &mut SymbolTable) -> Predicate {
    let terms = predicate
        .terms
        .iter()
        .map(|t| translate_term(t, source, target))
        .collect();
    let name_text = source.str(predicate.name).unwrap_or("").to_string();
    let name = target.insert(&name_text);
    Predicate::new(name, terms)
}

fn translate_term(term: &Term, source: &SymbolTable, target: &mut SymbolTable) -> Term {
    match term {
        Term::String(idx) => {
            let text = source.str(*idx).unwrap_or("").to_string();
            Term::String(target.insert(&text))
        }
        Term::Set(elements) => {
            // A set's elements may themselves be strings carrying
            // source-table indices; re-home every element the same way
            // a bare String term is translated. The set was already
            // validated (non-empty, homogeneous, variable-free,
            // non-nested) at construction, and translation is a pure
            // renaming, so the result is valid by construction too.
            let translated: std::collections::BTreeSet<Term> = elements
                .iter()
                .map(|e| translate_term(e, source, target))
                .collect();
            Term::Set(std::sync::Arc::new(translated))
        }
        other => other.clone(),
    }
}

fn translate_fact(fact: &Fact, source: &SymbolTable, target: &mut SymbolTable) -> Fact {
    Fact::new(translate_predicate(fact.predicate(), source, target))
}

fn translate_rule(rule: &Rule, source: &SymbolTable, target: &mut SymbolTable) -> Rule {
    let head = translate_predicate(&rule.head, source, target);
    let body = rule
        .body
        .iter()
        .map(|p| translate_predicate(p, source, target))
        .collect();
    // Expressions carry only Variable/Integer/Date/Bool/Bytes/Set
    // literals plus Strings that are already interned relative to the
    // rule's own source table; re-home any String literal the same way
    // predicates are translated.
    let expressions = rule
        .expressions
        .iter()
        .map(|e| crate::datalog::Expr {
            ops: e
                .ops
                .iter()
                .map(|op| match op {
                    crate::datalog::Op::Value(t) => {
                        crate::datalog::Op::Value(translate_term(t, source, target))
                    }
                    other => other.clone(),
                })
                .collect(),
        })
        .collect();
    // Rule was already validated well-formed at construction time; the
    // translation above is a pure renaming and cannot invalidate it.
    Rule {
        head,
        body,
        expressions,
    }
}

fn rule_matches(rule: &Rule, world: &World, symbols: &SymbolTable) -> bool {
    !world.query_rule(rule, symbols).is_empty()
}

fn check_matches(check: &Check, world: &World, symbols: &SymbolTable) -> bool {
    check.queries.iter().any(|q| rule_matches(q, world, symbols))
}
