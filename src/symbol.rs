//! Symbol table: bidirectional interning of strings into small integers.

use crate::error::{CoreError, Result};
use std::collections::HashMap;

/// The fixed base table every working table starts from. Order is
/// bit-exact and MUST NOT change: wire-compatible implementations
/// depend on these indices.
pub const BASE_SYMBOLS: &[&str] = &[
    "read",
    "write",
    "resource",
    "operation",
    "right",
    "time",
    "role",
    "owner",
    "tenant",
    "namespace",
    "user",
    "team",
    "service",
    "admin",
    "email",
    "group",
    "member",
    "ip_address",
    "client",
    "client_ip",
    "domain",
    "path",
    "version",
    "cluster",
    "node",
    "hostname",
    "nonce",
    "query",
];

/// An ordered, append-only sequence of distinct UTF-8 strings, indexed
/// by position. The table is its own index: inserting a string returns
/// its position, appending it if it was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    strings: Vec<String>,
    index: HashMap<String, u64>,
}

impl SymbolTable {
    /// A fresh table containing only the base symbols.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            strings: Vec::with_capacity(BASE_SYMBOLS.len()),
            index: HashMap::with_capacity(BASE_SYMBOLS.len()),
        };
        for s in BASE_SYMBOLS {
            table.insert(s);
        }
        table
    }

    /// An empty table with no base symbols, used for block-local tables
    /// that are later composed with a base-carrying table via `extend`.
    pub fn empty() -> Self {
        SymbolTable {
            strings: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert `s`, returning its index. Idempotent: inserting an
    /// already-present string returns its existing index.
    pub fn insert(&mut self, s: &str) -> u64 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u64;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// The string at `idx`, if any.
    pub fn str(&self, idx: u64) -> Option<&str> {
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    /// The index of `s`, if it has been interned.
    pub fn sym(&self, s: &str) -> Option<u64> {
        self.index.get(s).copied()
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table holds no strings.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Whether `self` and `other` share no string.
    pub fn is_disjoint(&self, other: &SymbolTable) -> bool {
        self.index.keys().all(|s| !other.index.contains_key(s))
    }

    /// Append `other`'s strings after `self`'s, shifting `other`'s
    /// indices by `self.len()`. Fails with `SymbolTableOverlap` if the
    /// two tables share any string.
    pub fn extend(&mut self, other: &SymbolTable) -> Result<()> {
        if !self.is_disjoint(other) {
            let overlap: Vec<String> = self
                .index
                .keys()
                .filter(|s| other.index.contains_key(*s))
                .cloned()
                .collect();
            return Err(CoreError::SymbolTableOverlap(overlap));
        }
        for s in &other.strings {
            self.insert(s);
        }
        Ok(())
    }

    /// Split off and return the tail `[n..]`, shrinking `self` to
    /// `[0..n)`. Used to isolate the symbols a block newly interned
    /// after composing it onto a shared table.
    pub fn split_off(&mut self, n: usize) -> SymbolTable {
        let tail_strings: Vec<String> = self.strings.split_off(n);
        for s in &tail_strings {
            self.index.remove(s);
        }
        let mut tail_index = HashMap::with_capacity(tail_strings.len());
        for (i, s) in tail_strings.iter().enumerate() {
            tail_index.insert(s.clone(), i as u64);
        }
        SymbolTable {
            strings: tail_strings,
            index: tail_index,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}
