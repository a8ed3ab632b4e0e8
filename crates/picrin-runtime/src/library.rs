//! Scheme library objects.
//!
//! A library pairs a name (a list of symbols such as `(picrin base)`) with
//! a syntactic environment mapping surface symbols to their hygienic
//! bindings, and an export table in the same shape. Full `define-library`
//! handling belongs to the expander; bootstrap only needs to create the two
//! base libraries, bind the syntactic keywords, and import one into the
//! other.

use std::cell::RefCell;
use std::fmt;

use picrin_error::CoreError;
use picrin_heap::HeapObject;
use rustc_hash::FxHashMap;

use crate::symbol::Symbol;
use crate::value::{Value, list_to_vec};

/// A Scheme library.
pub struct Library {
    /// Name as a list of symbols.
    pub name: Value,
    /// Surface symbol to hygienic binding.
    pub env: RefCell<FxHashMap<Symbol, Symbol>>,
    /// Exported surface symbols and the bindings they resolve to.
    pub exports: RefCell<FxHashMap<Symbol, Symbol>>,
}

impl HeapObject for Library {}

impl Library {
    /// The name rendered back to its source form, e.g. `"(picrin base)"`.
    pub fn name_string(&self) -> String {
        let Some(parts) = list_to_vec(&self.name) else {
            return String::from("(?)");
        };
        let words: Vec<&str> =
            parts.iter().filter_map(|v| v.as_sym()).map(|s| s.name()).collect();
        format!("({})", words.join(" "))
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<library {}>", self.name_string())
    }
}

/// Split a textual library spec into its words.
pub(crate) fn parse_spec(spec: &str) -> Result<Vec<&str>, CoreError> {
    let trimmed = spec.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| CoreError::bad_argument(format!("malformed library name: {spec}")))?;
    let words: Vec<&str> = inner.split_whitespace().collect();
    if words.is_empty() {
        return Err(CoreError::bad_argument(format!("malformed library name: {spec}")));
    }
    Ok(words)
}
