//! Rules and checks.

use crate::datalog::expression::Expr;
use crate::datalog::term::Predicate;
use crate::error::{CoreError, Result};
use std::collections::HashSet;

/// `Head :- Body, Expressions`. Well-formedness: every variable in
/// `head` and every variable in `expressions` must also appear in some
/// `body` predicate.
#[derive(Debug, Clone)]
pub struct Rule {
    pub head: Predicate,
    pub body: Vec<Predicate>,
    pub expressions: Vec<Expr>,
}

impl Rule {
    /// Build a rule, validating well-formedness. Returns
    /// `UnboundHeadVariable` if a head or expression variable does not
    /// appear in the body.
    pub fn new(head: Predicate, body: Vec<Predicate>, expressions: Vec<Expr>) -> Result<Self> {
        let body_vars: HashSet<u32> = body.iter().flat_map(Predicate::variables).collect();

        for v in head.variables() {
            if !body_vars.contains(&v) {
                return Err(CoreError::UnboundHeadVariable(format!(
                    "head variable ${} does not appear in the rule body",
                    v
                )));
            }
        }
        for expr in &expressions {
            for v in expr.variables() {
                if !body_vars.contains(&v) {
                    return Err(CoreError::UnboundHeadVariable(format!(
                        "expression variable ${} does not appear in the rule body",
                        v
                    )));
                }
            }
        }
        Ok(Rule {
            head,
            body,
            expressions,
        })
    }

    /// A rule with an empty body and no expressions, always true and
    /// contributing its head unconditionally — used to express
    /// unconditional facts as one-query checks/policies (e.g. a
    /// trivially-matching default-deny policy).
    pub fn unconditional(head: Predicate) -> Self {
        Rule {
            head,
            body: Vec::new(),
            expressions: Vec::new(),
        }
    }
}

/// A disjunction of rules (OR-of-queries). A check succeeds on a world
/// when at least one of its queries matches at least one tuple.
#[derive(Debug, Clone)]
pub struct Check {
    pub queries: Vec<Rule>,
}

impl Check {
    pub fn new(queries: Vec<Rule>) -> Self {
        Check { queries }
    }
}
