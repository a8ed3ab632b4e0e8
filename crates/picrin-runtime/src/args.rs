//! Argument extraction for native primitives.
//!
//! Primitives receive their arguments as a value slice; the helpers here
//! check arity, coerce kinds, and validate indices and ranges, raising the
//! matching condition on failure.

use picrin_error::CoreError;

use crate::error::{Raised, Result};
use crate::string::Str;
use crate::symbol::Symbol;
use crate::value::Value;

/// Exactly `n` arguments.
pub fn exact(argv: &[Value], n: usize) -> Result<()> {
    if argv.len() != n {
        return Err(Raised::new(CoreError::ArityMismatch { required: n, got: argv.len() }));
    }
    Ok(())
}

/// At least `n` arguments.
pub fn at_least(argv: &[Value], n: usize) -> Result<()> {
    if argv.len() < n {
        return Err(Raised::new(CoreError::ArityMismatch { required: n, got: argv.len() }));
    }
    Ok(())
}

/// Between `min` and `max` arguments inclusive.
pub fn between(argv: &[Value], min: usize, max: usize) -> Result<()> {
    if argv.len() < min {
        return Err(Raised::new(CoreError::ArityMismatch { required: min, got: argv.len() }));
    }
    if argv.len() > max {
        return Err(Raised::new(CoreError::ArityMismatch { required: max, got: argv.len() }));
    }
    Ok(())
}

fn arg<'a>(argv: &'a [Value], i: usize) -> Result<&'a Value> {
    argv.get(i)
        .ok_or_else(|| Raised::new(CoreError::ArityMismatch { required: i + 1, got: argv.len() }))
}

fn mismatch(expected: &'static str, found: &Value) -> Raised {
    Raised::with_irritants(
        CoreError::TypeMismatch { expected, found: found.type_name() },
        vec![found.clone()],
    )
}

pub fn string(argv: &[Value], i: usize) -> Result<Str> {
    match arg(argv, i)? {
        Value::Str(s) => Ok(s.clone()),
        other => Err(mismatch("string", other)),
    }
}

pub fn symbol(argv: &[Value], i: usize) -> Result<Symbol> {
    match arg(argv, i)? {
        Value::Sym(s) => Ok(s.clone()),
        other => Err(mismatch("symbol", other)),
    }
}

pub fn character(argv: &[Value], i: usize) -> Result<u8> {
    match arg(argv, i)? {
        Value::Char(c) => Ok(*c),
        other => Err(mismatch("char", other)),
    }
}

pub fn integer(argv: &[Value], i: usize) -> Result<i64> {
    match arg(argv, i)? {
        Value::Int(n) => Ok(*n),
        other => Err(mismatch("integer", other)),
    }
}

pub fn procedure(argv: &[Value], i: usize) -> Result<Value> {
    match arg(argv, i)? {
        v @ Value::Proc(_) => Ok(v.clone()),
        other => Err(mismatch("procedure", other)),
    }
}

/// Validate `0 <= k < len`, returning the index as `usize`.
pub fn index(k: i64, len: usize) -> Result<usize> {
    if k < 0 || k as u64 >= len as u64 {
        return Err(Raised::new(CoreError::IndexOutOfRange { index: k, len }));
    }
    Ok(k as usize)
}

/// Validate `0 <= start <= end <= len`.
pub fn check_range(start: i64, end: i64, len: usize) -> Result<(usize, usize)> {
    if start < 0 || end < start || end as u64 > len as u64 {
        return Err(Raised::new(CoreError::RangeOutOfBounds { start, end, len }));
    }
    Ok((start as usize, end as usize))
}

/// Optional `start`/`end` arguments beginning at position `first`.
///
/// Defaults cascade deliberately: a call that supplies neither argument gets
/// `start = 0` and falls through to `end = len`; a call that supplies only
/// `start` still falls through to `end = len`. Both are then validated as a
/// range over `len`.
pub fn optional_range(argv: &[Value], first: usize, len: usize) -> Result<(usize, usize)> {
    let start = match argv.get(first) {
        Some(_) => integer(argv, first)?,
        None => 0,
    };
    let end = match argv.get(first + 1) {
        Some(_) => integer(argv, first + 1)?,
        None => len as i64,
    };
    check_range(start, end, len)
}

/// Validate a destination position for a copy of `span` bytes into a buffer
/// of `to_len` bytes: `0 <= at` and `at + span <= to_len`.
pub fn at_range(to_len: usize, at: i64, span: usize) -> Result<usize> {
    if at < 0 || at as u64 > to_len as u64 {
        return Err(Raised::new(CoreError::IndexOutOfRange { index: at, len: to_len }));
    }
    let at = at as usize;
    if at + span > to_len {
        return Err(Raised::new(CoreError::RangeOutOfBounds {
            start: at as i64,
            end: (at + span) as i64,
            len: to_len,
        }));
    }
    Ok(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_range_defaults_cascade() {
        let argv = [Value::Nil]; // only the subject argument
        assert_eq!(optional_range(&argv, 1, 7).map_err(|e| e.error), Ok((0, 7)));

        let argv = [Value::Nil, Value::Int(2)];
        assert_eq!(optional_range(&argv, 1, 7).map_err(|e| e.error), Ok((2, 7)));

        let argv = [Value::Nil, Value::Int(2), Value::Int(5)];
        assert_eq!(optional_range(&argv, 1, 7).map_err(|e| e.error), Ok((2, 5)));
    }

    #[test]
    fn index_rejects_len_and_negatives() {
        assert!(index(4, 5).is_ok());
        assert!(index(5, 5).is_err());
        assert!(index(-1, 5).is_err());
    }

    #[test]
    fn range_bounds_are_inclusive_of_len() {
        assert!(check_range(0, 5, 5).is_ok());
        assert!(check_range(5, 5, 5).is_ok());
        assert!(check_range(3, 2, 5).is_err());
        assert!(check_range(0, 6, 5).is_err());
    }

    #[test]
    fn at_range_accepts_the_no_op_copy_at_the_end() {
        // Copying zero bytes at position len is valid.
        assert_eq!(at_range(5, 5, 0).map_err(|e| e.error), Ok(5));
        assert!(at_range(5, 4, 2).is_err());
    }
}
