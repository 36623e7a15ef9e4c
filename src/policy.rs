//! Allow/deny policies: evaluated the same way as a check, but their
//! kind becomes the authorization verdict on first match.

use crate::datalog::Rule;

/// Whether a matching policy grants or denies the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Allow,
    Deny,
}

/// A kind plus an ordered disjunction of query rules.
#[derive(Debug, Clone)]
pub struct Policy {
    pub kind: PolicyKind,
    pub queries: Vec<Rule>,
}

impl Policy {
    pub fn allow(queries: Vec<Rule>) -> Self {
        Policy {
            kind: PolicyKind::Allow,
            queries,
        }
    }

    pub fn deny(queries: Vec<Rule>) -> Self {
        Policy {
            kind: PolicyKind::Deny,
            queries,
        }
    }
}
