//! String interning.
//!
//! Class names, type-parameter names, and qualifier names are interned once
//! and carried around as `Atom`s. `Atom` comparison is O(1) and `Atom` is
//! `Copy`, which keeps the type nodes cheap to clone and hash.

use std::fmt;
use std::sync::RwLock;

use dashmap::DashMap;

/// An interned string.
///
/// Atoms are only meaningful relative to the [`Interner`] that produced
/// them; two interners may assign the same index to different strings.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.0)
    }
}

/// Thread-safe string interner.
///
/// Interning is lock-free in the common (already-interned) case via the
/// `DashMap` index; only first-time interning takes the write lock on the
/// reverse table.
pub struct Interner {
    index: DashMap<String, Atom>,
    strings: RwLock<Vec<String>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        Self {
            index: DashMap::new(),
            strings: RwLock::new(Vec::new()),
        }
    }

    /// Intern `s`, returning its atom. Idempotent.
    pub fn intern(&self, s: &str) -> Atom {
        if let Some(existing) = self.index.get(s) {
            return *existing;
        }
        let mut strings = self.strings.write().expect("interner poisoned");
        // Re-check under the lock: another thread may have interned `s`
        // between the fast-path miss and the lock acquisition.
        if let Some(existing) = self.index.get(s) {
            return *existing;
        }
        let atom = Atom(u32::try_from(strings.len()).expect("interner overflow"));
        strings.push(s.to_owned());
        self.index.insert(s.to_owned(), atom);
        atom
    }

    /// Resolve an atom back to its string.
    ///
    /// Panics if `atom` was not produced by this interner.
    pub fn resolve(&self, atom: Atom) -> String {
        let strings = self.strings.read().expect("interner poisoned");
        strings
            .get(atom.0 as usize)
            .unwrap_or_else(|| panic!("unknown atom {:?}", atom))
            .clone()
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.read().expect("interner poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let interner = Interner::new();
        let a = interner.intern("java.lang.Object");
        let b = interner.intern("java.lang.Object");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_atoms() {
        let interner = Interner::new();
        let a = interner.intern("nonnull");
        let b = interner.intern("nullable");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "nonnull");
        assert_eq!(interner.resolve(b), "nullable");
    }

    #[test]
    #[should_panic(expected = "unknown atom")]
    fn resolving_a_foreign_atom_panics() {
        let interner = Interner::new();
        interner.resolve(Atom(42));
    }
}
