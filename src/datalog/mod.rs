//! The Datalog model and evaluator: terms, predicates, facts, rules,
//! expressions, and the semi-naive saturation engine that computes
//! their fixpoint over a world.
//!
//! This is a restricted Datalog: no recursion through negation (there
//! is no negated body atom at all), every head variable must appear in
//! the positive body, and expressions draw from a fixed opcode set
//! rather than arbitrary user-defined functions.

pub mod expression;
pub mod rule;
pub mod term;
pub mod unification;
pub mod world;

pub use expression::{BinaryOp, Expr, Op, UnaryOp};
pub use rule::{Check, Rule};
pub use term::{Fact, Predicate, Term};
pub use unification::{unify_predicate_with_fact, Binding};
pub use world::{RunLimits, World};
