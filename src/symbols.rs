//! Name-to-id interning for variables and function names.
//!
//! The toolchain proper never stores variable names in tokens; it stores a
//! [`VarId`] handed out by this table. Ids are 1-based so there is no
//! "id zero" that could be confused with an empty storage slot.

use std::num::NonZeroUsize;

use indexmap::IndexMap;

/// A reference into the symbol table. Ids start at 1 and are stable for the
/// lifetime of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(NonZeroUsize);

impl VarId {
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps source names to stable [`VarId`]s.
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: IndexMap<String, VarId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, allocating the next id on first sight.
    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(id) = self.names.get(name) {
            return *id;
        }
        let next = self.names.len() + 1;
        let id = VarId(NonZeroUsize::new(next).unwrap_or(NonZeroUsize::MIN));
        self.names.insert(name.to_string(), id);
        id
    }

    /// Look up the name behind an id.
    pub fn resolve(&self, id: VarId) -> Option<&str> {
        self.names
            .get_index(id.get() - 1)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut table = SymbolTable::new();
        let x = table.intern("x");
        let y = table.intern("y");
        assert_ne!(x, y);
        assert_eq!(table.intern("x"), x);
        assert_eq!(table.intern("y"), y);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ids_are_one_based() {
        let mut table = SymbolTable::new();
        let first = table.intern("first");
        assert_eq!(first.get(), 1);
    }

    #[test]
    fn test_resolve() {
        let mut table = SymbolTable::new();
        let id = table.intern("counter");
        assert_eq!(table.resolve(id), Some("counter"));
    }
}
