//! String interning for identifiers and module names

pub use lasso::Spur as Symbol;
use lasso::ThreadedRodeo;
use std::sync::Arc;

/// Cheap-to-clone string interner handle
#[derive(Clone, Debug, Default)]
pub struct Interner {
    inner: Arc<ThreadedRodeo>,
}

impl Interner {
    /// Creates an empty interner
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ThreadedRodeo::new()),
        }
    }

    /// Interns a string, returning its symbol
    pub fn intern(&self, text: &str) -> Symbol {
        self.inner.get_or_intern(text)
    }

    /// Looks up an already-interned string without interning it
    pub fn get(&self, text: &str) -> Option<Symbol> {
        self.inner.get(text)
    }

    /// Resolves a symbol back to its string
    pub fn resolve(&self, sym: &Symbol) -> String {
        self.inner.resolve(sym).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_across_clones() {
        let interner = Interner::new();
        let sym = interner.intern("main");
        let clone = interner.clone();
        assert_eq!(clone.intern("main"), sym);
        assert_eq!(clone.resolve(&sym), "main");
    }
}
