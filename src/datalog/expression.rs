//! The expression VM: a stack machine evaluating boolean/value
//! programs over a variable binding. Used both to filter rule bodies
//! and to evaluate checks.

use crate::datalog::term::Term;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Unary opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Boolean negation.
    Negate,
    /// Identity; a grouping marker retained for debug output.
    Parens,
    /// Cardinality of a string, bytes, or set.
    Length,
}

/// Binary opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Equal,
    Contains,
    Prefix,
    Suffix,
    Regex,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Intersection,
    Union,
}

/// A single opcode in an expression program.
#[derive(Debug, Clone)]
pub enum Op {
    /// Push a term, substituting variables from the current binding.
    Value(Term),
    /// Pop one operand, push the result.
    Unary(UnaryOp),
    /// Pop two operands, push the result.
    Binary(BinaryOp),
}

/// A stack program returning a boolean. Built from ground/variable
/// `Value`s and `Unary`/`Binary` combinators.
#[derive(Debug, Clone, Default)]
pub struct Expr {
    pub ops: Vec<Op>,
}

impl Expr {
    /// An empty expression (builders append ops via `push`).
    pub fn new() -> Self {
        Expr { ops: Vec::new() }
    }

    /// Append an opcode, builder-style.
    pub fn push(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    /// All variable ids referenced by `Value` opcodes.
    pub fn variables(&self) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Value(Term::Variable(id)) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Evaluate the expression under `binding`. A type mismatch, an
    /// unbound variable, arithmetic overflow, or division by zero fails
    /// the expression (returns `None`) rather than propagating an
    /// error: ill-typed comparisons are defined as non-matches.
    pub fn evaluate(&self, binding: &BTreeMap<u32, Term>) -> Option<bool> {
        let mut stack: Vec<Term> = Vec::new();
        for op in &self.ops {
            match op {
                Op::Value(term) => {
                    let substituted = match term {
                        Term::Variable(id) => binding.get(id)?.clone(),
                        other => other.clone(),
                    };
                    stack.push(substituted);
                }
                Op::Unary(unary) => {
                    let operand = stack.pop()?;
                    stack.push(eval_unary(*unary, operand)?);
                }
                Op::Binary(binary) => {
                    let right = stack.pop()?;
                    let left = stack.pop()?;
                    stack.push(eval_binary(*binary, left, right)?);
                }
            }
        }
        match stack.pop() {
            Some(Term::Bool(b)) if stack.is_empty() => Some(b),
            _ => None,
        }
    }
}

fn eval_unary(op: UnaryOp, operand: Term) -> Option<Term> {
    match (op, operand) {
        (UnaryOp::Negate, Term::Bool(b)) => Some(Term::Bool(!b)),
        (UnaryOp::Parens, t) => Some(t),
        (UnaryOp::Length, Term::Bytes(b)) => Some(Term::Integer(b.len() as i64)),
        (UnaryOp::Length, Term::Set(s)) => Some(Term::Integer(s.len() as i64)),
        (UnaryOp::Length, Term::String(_)) => None, // needs symbol table; not evaluable here
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, left: Term, right: Term) -> Option<Term> {
    use BinaryOp::*;
    match op {
        And => match (left, right) {
            (Term::Bool(a), Term::Bool(b)) => Some(Term::Bool(a && b)),
            _ => None,
        },
        Or => match (left, right) {
            (Term::Bool(a), Term::Bool(b)) => Some(Term::Bool(a || b)),
            _ => None,
        },
        Equal => Some(Term::Bool(left == right)),
        LessThan | LessOrEqual | GreaterThan | GreaterOrEqual => {
            let ordering = match (&left, &right) {
                (Term::Integer(a), Term::Integer(b)) => a.partial_cmp(b),
                (Term::Date(a), Term::Date(b)) => a.partial_cmp(b),
                _ => None,
            }?;
            let result = match op {
                LessThan => ordering.is_lt(),
                LessOrEqual => ordering.is_le(),
                GreaterThan => ordering.is_gt(),
                GreaterOrEqual => ordering.is_ge(),
                _ => unreachable!(),
            };
            Some(Term::Bool(result))
        }
        Add => arith(left, right, i64::checked_add),
        Sub => arith(left, right, i64::checked_sub),
        Mul => arith(left, right, i64::checked_mul),
        Div => match (left, right) {
            (Term::Integer(a), Term::Integer(b)) if b != 0 => a.checked_div(b).map(Term::Integer),
            _ => None,
        },
        Contains => match (left, right) {
            (Term::Set(a), Term::Set(b)) => Some(Term::Bool(b.is_subset(&a))),
            (Term::Set(set), elem) => Some(Term::Bool(set.contains(&elem))),
            (Term::Bytes(haystack), Term::Bytes(needle)) => Some(Term::Bool(
                contains_subslice(&haystack, &needle),
            )),
            _ => None,
        },
        Prefix | Suffix => None,
        Regex => None,
        Intersection => set_op(left, right, |a, b| a.intersection(b).cloned().collect()),
        Union => set_op(left, right, |a, b| a.union(b).cloned().collect()),
    }
}

fn arith(left: Term, right: Term, f: fn(i64, i64) -> Option<i64>) -> Option<Term> {
    match (left, right) {
        (Term::Integer(a), Term::Integer(b)) => f(a, b).map(Term::Integer),
        _ => None,
    }
}

fn set_op(
    left: Term,
    right: Term,
    f: impl Fn(&BTreeSet<Term>, &BTreeSet<Term>) -> BTreeSet<Term>,
) -> Option<Term> {
    match (left, right) {
        (Term::Set(a), Term::Set(b)) => {
            let result = f(&a, &b);
            if result.is_empty() {
                None
            } else {
                Some(Term::Set(Arc::new(result)))
            }
        }
        _ => None,
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Opcodes needing string-level operations (substring containment,
/// prefix/suffix, regex, string length) require the symbol table to
/// resolve `Term::String` indices back into text; this is handled by
/// `evaluate_with_symbols`, which falls back to `evaluate` for
/// string-free programs.
impl Expr {
    /// Evaluate with access to a symbol table, resolving string-typed
    /// operands (substring containment, prefix/suffix, regex, string
    /// length) that `evaluate` alone cannot handle.
    pub fn evaluate_with_symbols(
        &self,
        binding: &BTreeMap<u32, Term>,
        symbols: &crate::symbol::SymbolTable,
    ) -> Option<bool> {
        let mut stack: Vec<Term> = Vec::new();
        for op in &self.ops {
            match op {
                Op::Value(term) => {
                    let substituted = match term {
                        Term::Variable(id) => binding.get(id)?.clone(),
                        other => other.clone(),
                    };
                    stack.push(substituted);
                }
                Op::Unary(unary) => {
                    let operand = stack.pop()?;
                    stack.push(eval_unary_symbolic(*unary, operand, symbols)?);
                }
                Op::Binary(binary) => {
                    let right = stack.pop()?;
                    let left = stack.pop()?;
                    stack.push(eval_binary_symbolic(*binary, left, right, symbols)?);
                }
            }
        }
        match stack.pop() {
            Some(Term::Bool(b)) if stack.is_empty() => Some(b),
            _ => None,
        }
    }
}

fn eval_unary_symbolic(
    op: UnaryOp,
    operand: Term,
    symbols: &crate::symbol::SymbolTable,
) -> Option<Term> {
    if let (UnaryOp::Length, Term::String(idx)) = (op, &operand) {
        let s = symbols.str(*idx)?;
        return Some(Term::Integer(s.chars().count() as i64));
    }
    eval_unary(op, operand)
}

fn eval_binary_symbolic(
    op: BinaryOp,
    left: Term,
    right: Term,
    symbols: &crate::symbol::SymbolTable,
) -> Option<Term> {
    match op {
        BinaryOp::Contains => match (&left, &right) {
            (Term::String(a), Term::String(b)) => {
                let a = symbols.str(*a)?;
                let b = symbols.str(*b)?;
                Some(Term::Bool(a.contains(b)))
            }
            _ => eval_binary(op, left, right),
        },
        BinaryOp::Prefix => match (&left, &right) {
            (Term::String(a), Term::String(b)) => {
                let a = symbols.str(*a)?;
                let b = symbols.str(*b)?;
                Some(Term::Bool(a.starts_with(b)))
            }
            _ => None,
        },
        BinaryOp::Suffix => match (&left, &right) {
            (Term::String(a), Term::String(b)) => {
                let a = symbols.str(*a)?;
                let b = symbols.str(*b)?;
                Some(Term::Bool(a.ends_with(b)))
            }
            _ => None,
        },
        BinaryOp::Regex => match (&left, &right) {
            (Term::String(a), Term::String(b)) => {
                let a = symbols.str(*a)?;
                let b = symbols.str(*b)?;
                let re = regex::Regex::new(b).ok()?;
                Some(Term::Bool(re.is_match(a)))
            }
            _ => None,
        },
        _ => eval_binary(op, left, right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> BTreeMap<u32, Term> {
        BTreeMap::new()
    }

    #[test]
    fn equal_ints() {
        let e = Expr::new()
            .push(Op::Value(Term::Integer(2)))
            .push(Op::Value(Term::Integer(2)))
            .push(Op::Binary(BinaryOp::Equal));
        assert_eq!(e.evaluate(&binding()), Some(true));
    }

    #[test]
    fn less_than_dates() {
        let e = Expr::new()
            .push(Op::Value(Term::Date(100)))
            .push(Op::Value(Term::Date(200)))
            .push(Op::Binary(BinaryOp::LessThan));
        assert_eq!(e.evaluate(&binding()), Some(true));
    }

    #[test]
    fn type_mismatch_fails_not_errors() {
        let e = Expr::new()
            .push(Op::Value(Term::Bool(true)))
            .push(Op::Value(Term::Integer(1)))
            .push(Op::Binary(BinaryOp::LessThan));
        assert_eq!(e.evaluate(&binding()), None);
    }

    #[test]
    fn division_by_zero_fails() {
        let e = Expr::new()
            .push(Op::Value(Term::Integer(1)))
            .push(Op::Value(Term::Integer(0)))
            .push(Op::Binary(BinaryOp::Div));
        assert_eq!(e.evaluate(&binding()), None);
    }

    #[test]
    fn overflow_fails() {
        let e = Expr::new()
            .push(Op::Value(Term::Integer(i64::MAX)))
            .push(Op::Value(Term::Integer(1)))
            .push(Op::Binary(BinaryOp::Add));
        assert_eq!(e.evaluate(&binding()), None);
    }

    #[test]
    fn variable_substitution() {
        let mut b = BTreeMap::new();
        b.insert(0, Term::Integer(42));
        let e = Expr::new()
            .push(Op::Value(Term::Variable(0)))
            .push(Op::Value(Term::Integer(42)))
            .push(Op::Binary(BinaryOp::Equal));
        assert_eq!(e.evaluate(&b), Some(true));
    }

    #[test]
    fn set_contains() {
        let set = Term::set(vec![Term::Integer(1), Term::Integer(2)]).unwrap();
        let e = Expr::new()
            .push(Op::Value(set))
            .push(Op::Value(Term::Integer(1)))
            .push(Op::Binary(BinaryOp::Contains));
        assert_eq!(e.evaluate(&binding()), Some(true));
    }

    #[test]
    fn set_contains_set_tests_subset() {
        let left = Term::set(vec![Term::Integer(1), Term::Integer(2), Term::Integer(3)]).unwrap();
        let subset = Term::set(vec![Term::Integer(1), Term::Integer(2)]).unwrap();
        let e = Expr::new()
            .push(Op::Value(left.clone()))
            .push(Op::Value(subset))
            .push(Op::Binary(BinaryOp::Contains));
        assert_eq!(e.evaluate(&binding()), Some(true));

        let not_subset = Term::set(vec![Term::Integer(1), Term::Integer(9)]).unwrap();
        let e = Expr::new()
            .push(Op::Value(left))
            .push(Op::Value(not_subset))
            .push(Op::Binary(BinaryOp::Contains));
        assert_eq!(e.evaluate(&binding()), Some(false));
    }

    #[test]
    fn regex_with_symbols() {
        let mut symbols = crate::symbol::SymbolTable::empty();
        let text = symbols.insert("file42.txt");
        let pattern = symbols.insert("^file[0-9]+\\.txt$");
        let e = Expr::new()
            .push(Op::Value(Term::String(text)))
            .push(Op::Value(Term::String(pattern)))
            .push(Op::Binary(BinaryOp::Regex));
        assert_eq!(
            e.evaluate_with_symbols(&binding(), &symbols),
            Some(true)
        );
    }
}
