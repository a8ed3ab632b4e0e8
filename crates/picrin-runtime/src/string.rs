//! Scheme string values and the string primitive library.
//!
//! A [`Str`] is a handle whose interior is a replaceable rope root. Reads go
//! straight to the rope; the destructive primitives (`string-set!`,
//! `string-copy!`, `string-fill!`) are copy-on-write: they assemble a new
//! rope out of slices of the old one plus the changed span, then swap the
//! root. Other strings sharing rope structure with the old root are
//! untouched.
//!
//! Strings are byte indexed; each character occupies one byte slot.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::ffi::CString;
use std::rc::{Rc, Weak};

use picrin_error::CoreError;
use picrin_heap::HeapObject;
use picrin_rope::{FlatBytes, Rope};

use crate::args;
use crate::error::{Raised, Result};
use crate::state::Interp;
use crate::value::Value;

/// A Scheme string: a shared handle over a rope root.
#[derive(Clone)]
pub struct Str {
    cell: Rc<StrCell>,
}

/// The heap cell behind a string value.
pub struct StrCell {
    rope: RefCell<Rope>,
}

impl StrCell {
    pub(crate) fn new(rope: Rope) -> StrCell {
        StrCell { rope: RefCell::new(rope) }
    }
}

impl HeapObject for StrCell {}

impl Str {
    pub(crate) fn from_cell(cell: Rc<StrCell>) -> Str {
        Str { cell }
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.cell.rope.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contiguous bytes of the string. Flattens the rope on first use of a
    /// concatenated value; later calls are O(1).
    pub fn bytes(&self) -> FlatBytes {
        self.cell.rope.borrow().flatten()
    }

    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes().get(index).copied()
    }

    /// The bytes as a C string. Raises `EmbeddedNull` (with this string as
    /// irritant) when any content byte is NUL.
    pub fn to_c_string(&self) -> Result<CString> {
        CString::new(self.bytes().to_vec()).map_err(|_| {
            Raised::with_irritants(CoreError::EmbeddedNull, vec![Value::Str(self.clone())])
        })
    }

    /// DJB-style byte hash with 32-bit wraparound.
    pub fn hash32(&self) -> i32 {
        let mut h: i32 = 0;
        for &b in self.bytes().iter() {
            h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(b as i32);
        }
        h
    }

    /// Lexicographic byte comparison; a proper prefix compares less.
    pub fn byte_cmp(&self, other: &Str) -> Ordering {
        self.bytes().as_bytes().cmp(other.bytes().as_bytes())
    }

    /// A new handle on the current rope root.
    pub fn root(&self) -> Rope {
        self.cell.rope.borrow().clone()
    }

    /// Swap in a new rope root. The old root drops here; strings sharing it
    /// keep their own references.
    pub(crate) fn replace_root(&self, rope: Rope) {
        *self.cell.rope.borrow_mut() = rope;
    }

    /// Whether two handles designate the same string object.
    pub fn ptr_eq(a: &Str, b: &Str) -> bool {
        Rc::ptr_eq(&a.cell, &b.cell)
    }

    pub(crate) fn downgrade(&self) -> Weak<StrCell> {
        Rc::downgrade(&self.cell)
    }

    pub(crate) fn is_cell(&self, cell: &Rc<StrCell>) -> bool {
        Rc::ptr_eq(&self.cell, cell)
    }
}

impl std::fmt::Debug for Str {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes()))
    }
}

// --- primitives ---

fn prim_string_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Str(_))))
}

fn prim_string(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    let mut buf = Vec::with_capacity(argv.len());
    for i in 0..argv.len() {
        buf.push(args::character(argv, i)?);
    }
    interp.str_value(&buf)
}

fn prim_make_string(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 2)?;
    let len = args::integer(argv, 0)?;
    if len < 0 {
        return Err(Raised::with_irritants(
            CoreError::bad_argument("make-string: negative length given"),
            vec![Value::Int(len)],
        ));
    }
    let fill = if argv.len() > 1 { args::character(argv, 1)? } else { b' ' };
    interp.make_str(Rope::filled(len as usize, fill))
}

fn prim_string_length(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let s = args::string(argv, 0)?;
    Ok(Value::Int(s.len() as i64))
}

fn prim_string_ref(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let s = args::string(argv, 0)?;
    let k = args::index(args::integer(argv, 1)?, s.len())?;
    match s.byte_at(k) {
        Some(b) => Ok(Value::Char(b)),
        None => Err(Raised::new(CoreError::IndexOutOfRange { index: k as i64, len: s.len() })),
    }
}

fn prim_string_set(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let s = args::string(argv, 0)?;
    let len = s.len();
    let k = args::index(args::integer(argv, 1)?, len)?;
    let c = args::character(argv, 2)?;

    let root = s.root();
    let head = root.slice(0, k);
    let mid = Rope::filled(1, c);
    let tail = root.slice(k + 1, len);
    s.replace_root(head.concat(&mid.concat(&tail)));
    Ok(Value::Undef)
}

fn prim_string_copy(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 3)?;
    let s = args::string(argv, 0)?;
    let (start, end) = args::optional_range(argv, 1, s.len())?;
    interp.make_str(s.root().slice(start, end))
}

fn prim_string_copy_ip(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 3, 5)?;
    let to = args::string(argv, 0)?;
    let at = args::integer(argv, 1)?;
    let from = args::string(argv, 2)?;
    let to_len = to.len();
    let from_len = from.len();
    let (start, end) = args::optional_range(argv, 3, from_len)?;
    let at = args::at_range(to_len, at, end - start)?;

    let to_root = to.root();
    let head = to_root.slice(0, at);
    let mid = from.root().slice(start, end);
    let tail = to_root.slice(at + (end - start), to_len);
    to.replace_root(head.concat(&mid.concat(&tail)));
    Ok(Value::Undef)
}

fn prim_string_fill_ip(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 2, 4)?;
    let s = args::string(argv, 0)?;
    let c = args::character(argv, 1)?;
    let len = s.len();
    let (start, end) = args::optional_range(argv, 2, len)?;

    let root = s.root();
    let head = root.slice(0, start);
    let mid = Rope::filled(end - start, c);
    let tail = root.slice(end, len);
    s.replace_root(head.concat(&mid.concat(&tail)));
    Ok(Value::Undef)
}

fn prim_string_append(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    let mut rope = Rope::from_literal("");
    for arg in argv {
        let Some(s) = arg.as_str() else {
            return Err(Raised::new(CoreError::TypeMismatch {
                expected: "string",
                found: arg.type_name(),
            }));
        };
        rope = rope.concat(&s.root());
    }
    interp.make_str(rope)
}

/// Shortest length across the string arguments; raises when none are given.
fn walk_length(name: &str, strings: &[Value]) -> Result<(Vec<Str>, usize)> {
    if strings.is_empty() {
        return Err(Raised::new(CoreError::bad_argument(format!(
            "{name}: one or more strings expected, but got zero"
        ))));
    }
    let mut collected = Vec::with_capacity(strings.len());
    let mut len = usize::MAX;
    for i in 0..strings.len() {
        let s = args::string(strings, i)?;
        len = len.min(s.len());
        collected.push(s);
    }
    Ok((collected, len))
}

fn prim_string_map(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::at_least(argv, 1)?;
    let proc = args::procedure(argv, 0)?;
    let (strings, len) = walk_length("string-map", &argv[1..])?;

    let mut buf = Vec::with_capacity(len);
    for i in 0..len {
        let slot: Vec<Value> =
            strings.iter().filter_map(|s| s.byte_at(i)).map(Value::Char).collect();
        let result = interp.apply(&proc, &slot)?;
        match result {
            Value::Char(c) => buf.push(c),
            other => {
                return Err(Raised::new(CoreError::TypeMismatch {
                    expected: "char",
                    found: other.type_name(),
                }));
            }
        }
    }
    interp.str_value(&buf)
}

fn prim_string_for_each(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::at_least(argv, 1)?;
    let proc = args::procedure(argv, 0)?;
    let (strings, len) = walk_length("string-for-each", &argv[1..])?;

    for i in 0..len {
        let slot: Vec<Value> =
            strings.iter().filter_map(|s| s.byte_at(i)).map(Value::Char).collect();
        interp.apply(&proc, &slot)?;
    }
    Ok(Value::Undef)
}

fn prim_list_to_string(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let Some(items) = crate::value::list_to_vec(&argv[0]) else {
        return Err(Raised::new(CoreError::TypeMismatch {
            expected: "list",
            found: argv[0].type_name(),
        }));
    };
    let mut buf = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Value::Char(c) => buf.push(*c),
            other => {
                return Err(Raised::new(CoreError::TypeMismatch {
                    expected: "char",
                    found: other.type_name(),
                }));
            }
        }
    }
    interp.str_value(&buf)
}

fn prim_string_to_list(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 3)?;
    let s = args::string(argv, 0)?;
    let (start, end) = args::optional_range(argv, 1, s.len())?;

    let bytes = s.bytes();
    let mut list = Value::Nil;
    for i in (start..end).rev() {
        list = interp.cons(Value::Char(bytes[i]), list)?;
    }
    Ok(list)
}

/// Fold a variadic comparison chain. Mirrors the classic behavior: an empty
/// argument list or any non-string argument answers `#f` rather than
/// raising.
fn fold_comparison(argv: &[Value], accept: fn(Ordering) -> bool) -> Result<Value> {
    let Some(Value::Str(first)) = argv.first() else {
        return Ok(Value::Bool(false));
    };
    let mut prev = first.clone();
    for arg in &argv[1..] {
        let Some(next) = arg.as_str() else {
            return Ok(Value::Bool(false));
        };
        if !accept(prev.byte_cmp(next)) {
            return Ok(Value::Bool(false));
        }
        prev = next.clone();
    }
    Ok(Value::Bool(true))
}

fn prim_string_eq(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_comparison(argv, |o| o == Ordering::Equal)
}

fn prim_string_lt(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_comparison(argv, |o| o == Ordering::Less)
}

fn prim_string_gt(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_comparison(argv, |o| o == Ordering::Greater)
}

fn prim_string_le(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_comparison(argv, |o| o != Ordering::Greater)
}

fn prim_string_ge(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_comparison(argv, |o| o != Ordering::Less)
}

pub(crate) fn init_str(interp: &mut Interp) -> Result<()> {
    interp.defun("string?", prim_string_p)?;
    interp.defun("string", prim_string)?;
    interp.defun("make-string", prim_make_string)?;
    interp.defun("string-length", prim_string_length)?;
    interp.defun("string-ref", prim_string_ref)?;
    interp.defun("string-set!", prim_string_set)?;
    interp.defun("string-copy", prim_string_copy)?;
    interp.defun("string-copy!", prim_string_copy_ip)?;
    interp.defun("string-fill!", prim_string_fill_ip)?;
    interp.defun("string-append", prim_string_append)?;
    interp.defun("string-map", prim_string_map)?;
    interp.defun("string-for-each", prim_string_for_each)?;
    interp.defun("list->string", prim_list_to_string)?;
    interp.defun("string->list", prim_string_to_list)?;

    interp.defun("string=?", prim_string_eq)?;
    interp.defun("string<?", prim_string_lt)?;
    interp.defun("string>?", prim_string_gt)?;
    interp.defun("string<=?", prim_string_le)?;
    interp.defun("string>=?", prim_string_ge)?;
    Ok(())
}
