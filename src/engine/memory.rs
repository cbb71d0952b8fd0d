/*! String interning for control sequence names. */

use rustc_hash::FxBuildHasher;
use string_interner::backend::BufferBackend;
use string_interner::{DefaultSymbol, StringInterner};

/// The name of a control sequence, interned as a symbol.
///
/// Cheap to copy and compare; resolve it back to text through the
/// [`CsInterner`] that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CsName(DefaultSymbol);

/// Owns the symbol table for control sequence names.
///
/// A handful of names the engine itself needs are interned up front.
#[derive(Clone)]
pub struct CsInterner {
    interner: StringInterner<BufferBackend, FxBuildHasher>,
    pub par: CsName,
    pub relax: CsName,
    pub empty: CsName,
}

impl CsInterner {
    pub fn new() -> Self {
        let mut interner = StringInterner::<BufferBackend, FxBuildHasher>::new();
        CsInterner {
            par: CsName(interner.get_or_intern_static("par")),
            relax: CsName(interner.get_or_intern_static("relax")),
            empty: CsName(interner.get_or_intern_static("")),
            interner,
        }
    }

    pub fn intern(&mut self, s: &str) -> CsName {
        CsName(self.interner.get_or_intern(s))
    }

    pub fn intern_static(&mut self, s: &'static str) -> CsName {
        CsName(self.interner.get_or_intern_static(s))
    }

    /// The text of an interned name. Symbols from a different interner yield `""`.
    pub fn resolve(&self, cs: CsName) -> &str {
        self.interner.resolve(cs.0).unwrap_or("")
    }
}

impl Default for CsInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut int = CsInterner::new();
        let a = int.intern("foo");
        let b = int.intern("foo");
        assert_eq!(a, b);
        assert_eq!(int.resolve(a), "foo");
        assert_ne!(a, int.intern("bar"));
        assert_eq!(int.resolve(int.par), "par");
        assert_eq!(int.resolve(int.empty), "");
    }
}
