//! Symbols and the interning table.
//!
//! Interning canonicalizes names: equal names map to the same symbol
//! object, and equality is pointer identity. Renamed (gensym'd) symbols
//! carry a surface name like any other but are never entered into the
//! table, so each one is distinct from every other symbol, including the
//! interned symbol of the same name. The expander uses them as hygienic
//! binding identifiers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// A Scheme symbol. Cheap to clone; equality is identity.
#[derive(Clone)]
pub struct Symbol {
    data: Rc<SymbolData>,
}

struct SymbolData {
    name: Rc<str>,
    interned: bool,
}

impl Symbol {
    fn new(name: Rc<str>, interned: bool) -> Symbol {
        Symbol { data: Rc::new(SymbolData { name, interned }) }
    }

    /// The surface name. Distinct symbols may share one.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// False for gensym'd symbols.
    pub fn is_interned(&self) -> bool {
        self.data.interned
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.data) as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data.interned {
            write!(f, "{}", self.data.name)
        } else {
            write!(f, "{}#{:p}", self.data.name, Rc::as_ptr(&self.data))
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data.name)
    }
}

/// The interpreter's interning table.
///
/// Owns one strong reference per interned name. Cleared once at teardown;
/// symbols still referenced elsewhere keep their names alive until the last
/// handle drops.
#[derive(Default)]
pub struct SymbolTable {
    names: FxHashMap<Rc<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// The canonical symbol for `name`, creating it on first sight.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.names.get(name) {
            return sym.clone();
        }
        let key: Rc<str> = Rc::from(name);
        let sym = Symbol::new(key.clone(), true);
        self.names.insert(key, sym.clone());
        sym
    }

    /// The interned symbol for `name`, if any.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.names.get(name).cloned()
    }

    /// A fresh uninterned symbol with `base`'s surface name.
    pub fn gensym(&self, base: &Symbol) -> Symbol {
        Symbol::new(base.data.name.clone(), false)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable").field("interned", &self.names.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_canonical() {
        let mut table = SymbolTable::new();
        let a = table.intern("lambda");
        let b = table.intern("lambda");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn gensym_is_fresh_but_keeps_the_name() {
        let mut table = SymbolTable::new();
        let base = table.intern("define");
        let renamed = table.gensym(&base);
        assert_eq!(renamed.name(), "define");
        assert_ne!(base, renamed);
        assert!(!renamed.is_interned());
        // The table itself is untouched.
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_gensyms_are_unequal() {
        let mut table = SymbolTable::new();
        let base = table.intern("x");
        assert_ne!(table.gensym(&base), table.gensym(&base));
    }
}
