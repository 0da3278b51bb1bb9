//! String interning for alias and channel names.
//!
//! A [`SymbolPool`] hands out small copyable [`Symbol`] handles. Interning
//! the same text twice returns the same handle, so handles compare in O(1)
//! and are used as map keys everywhere inside a rule set.

use std::collections::HashMap;
use std::sync::Arc;

/// Interned name handle, valid for the pool that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Position of the symbol inside its pool.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only string interner.
#[derive(Debug, Default, Clone)]
pub struct SymbolPool {
    lookup: HashMap<Arc<str>, Symbol>,
    names: Vec<Arc<str>>,
}

impl SymbolPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing handle on duplicates.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&symbol) = self.lookup.get(name) {
            return symbol;
        }
        let symbol = Symbol(u32::try_from(self.names.len()).unwrap_or(u32::MAX));
        let shared: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&shared));
        self.lookup.insert(shared, symbol);
        symbol
    }

    /// Handle of an already interned name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.lookup.get(name).copied()
    }

    /// Text of a symbol.
    ///
    /// Returns an empty string for handles from a different pool.
    #[must_use]
    pub fn resolve(&self, symbol: Symbol) -> &str {
        self.names.get(symbol.index()).map_or("", |name| name)
    }

    /// Shared text of a symbol, cheap to clone into result tables.
    #[must_use]
    pub fn resolve_shared(&self, symbol: Symbol) -> Arc<str> {
        self.names
            .get(symbol.index())
            .map_or_else(|| Arc::from(""), Arc::clone)
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Forget every name. Outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.lookup.clear();
        self.names.clear();
    }
}
