//! The string primitive library end to end: construction, access,
//! copy-on-write mutation, comparison chains, and traversal.

use std::rc::Rc;

use picrin_error::CoreError;
use picrin_heap::SystemAllocator;
use picrin_runtime::value::list_to_vec;
use picrin_runtime::{Interp, Result, Str, Value};
use pretty_assertions::assert_eq;

fn open_default() -> Interp {
    Interp::open(Vec::new(), Vec::new(), Rc::new(SystemAllocator)).expect("bootstrap failed")
}

fn string_of(value: &Value) -> Str {
    value.as_str().expect("expected a string value").clone()
}

fn chars(text: &[u8]) -> Vec<Value> {
    text.iter().map(|&b| Value::Char(b)).collect()
}

#[test]
fn append_builds_hello_world() {
    let mut interp = open_default();
    let s1 = interp.str_value(b"hello").expect("alloc");
    let sep = interp.lit_value(" ").expect("alloc");
    let s2 = interp.str_value(b"world").expect("alloc");

    let s3 = interp.call("string-append", &[s1, sep, s2]).expect("string-append");
    let len = interp.call("string-length", &[s3.clone()]).expect("string-length");
    assert!(matches!(len, Value::Int(11)));
    assert_eq!(&*string_of(&s3).bytes(), b"hello world");
}

#[test]
fn make_string_fill_and_set() {
    let mut interp = open_default();
    let s = interp
        .call("make-string", &[Value::Int(5), Value::Char(b'a')])
        .expect("make-string");
    interp
        .call("string-set!", &[s.clone(), Value::Int(2), Value::Char(b'Z')])
        .expect("string-set!");

    let listed = interp.call("string->list", &[s]).expect("string->list");
    let items = list_to_vec(&listed).expect("proper list");
    let bytes: Vec<u8> = items
        .iter()
        .map(|v| match v {
            Value::Char(c) => *c,
            other => panic!("expected char, got {other:?}"),
        })
        .collect();
    assert_eq!(bytes, b"aaZaa");
}

#[test]
fn make_string_defaults_to_spaces() {
    let mut interp = open_default();
    let s = interp.call("make-string", &[Value::Int(3)]).expect("make-string");
    assert_eq!(&*string_of(&s).bytes(), b"   ");
}

#[test]
fn make_string_of_length_zero_is_empty() {
    let mut interp = open_default();
    let s = interp.call("make-string", &[Value::Int(0)]).expect("make-string");
    assert_eq!(string_of(&s).len(), 0);
}

#[test]
fn make_string_rejects_negative_lengths() {
    let mut interp = open_default();
    let err = interp
        .call("make-string", &[Value::Int(-1)])
        .expect_err("negative length must raise");
    assert!(matches!(err.error, CoreError::BadArgument(_)));
    assert_eq!(err.irritants.len(), 1);
}

#[test]
fn copied_substrings_do_not_share_mutations() {
    let mut interp = open_default();
    let s = interp.str_value(b"abcdefgh").expect("alloc");
    let sub = interp
        .call("string-copy", &[s.clone(), Value::Int(2), Value::Int(6)])
        .expect("string-copy");
    assert_eq!(&*string_of(&sub).bytes(), b"cdef");

    interp
        .call("string-set!", &[sub.clone(), Value::Int(0), Value::Char(b'X')])
        .expect("string-set!");
    assert_eq!(&*string_of(&sub).bytes(), b"Xdef");
    assert_eq!(&*string_of(&s).bytes(), b"abcdefgh", "source must be unaffected");
}

#[test]
fn mutating_one_handle_leaves_other_strings_alone() {
    let mut interp = open_default();
    let a = interp.str_value(b"shared").expect("alloc");
    let b = interp.call("string-copy", &[a.clone()]).expect("string-copy");

    interp
        .call("string-fill!", &[a.clone(), Value::Char(b'-'), Value::Int(1), Value::Int(5)])
        .expect("string-fill!");
    assert_eq!(&*string_of(&a).bytes(), b"s----d");
    assert_eq!(&*string_of(&b).bytes(), b"shared");
}

#[test]
fn string_ref_bounds() {
    let mut interp = open_default();
    let s = interp.str_value(b"abc").expect("alloc");

    let last = interp.call("string-ref", &[s.clone(), Value::Int(2)]).expect("in range");
    assert!(matches!(last, Value::Char(b'c')));

    let err = interp
        .call("string-ref", &[s, Value::Int(3)])
        .expect_err("index == length must raise");
    assert_eq!(err.error, CoreError::IndexOutOfRange { index: 3, len: 3 });
    assert!(interp.last_error().is_some());
}

#[test]
fn string_copy_ip_no_op_at_the_far_edge() {
    let mut interp = open_default();
    let to = interp.str_value(b"dest").expect("alloc");
    let from = interp.str_value(b"src").expect("alloc");
    interp
        .call(
            "string-copy!",
            &[to.clone(), Value::Int(4), from, Value::Int(0), Value::Int(0)],
        )
        .expect("zero-byte copy at the end is a no-op");
    assert_eq!(&*string_of(&to).bytes(), b"dest");
}

#[test]
fn string_copy_ip_replaces_the_window() {
    let mut interp = open_default();
    let to = interp.str_value(b"0123456789").expect("alloc");
    let from = interp.str_value(b"abcdef").expect("alloc");
    interp
        .call(
            "string-copy!",
            &[to.clone(), Value::Int(3), from, Value::Int(1), Value::Int(4)],
        )
        .expect("string-copy!");
    assert_eq!(&*string_of(&to).bytes(), b"012bcd6789");
}

#[test]
fn list_string_round_trip() {
    let mut interp = open_default();
    let listed = interp.call("list", &chars(b"round trip")).expect("list");
    let s = interp.call("list->string", &[listed]).expect("list->string");
    assert_eq!(&*string_of(&s).bytes(), b"round trip");

    let back = interp.call("string->list", &[s]).expect("string->list");
    let items = list_to_vec(&back).expect("proper list");
    assert_eq!(items.len(), 10);
    assert!(matches!(items[0], Value::Char(b'r')));
    assert!(matches!(items[9], Value::Char(b'p')));
}

#[test]
fn append_with_empty_is_identity_on_bytes() {
    let mut interp = open_default();
    let a = interp.str_value(b"payload").expect("alloc");
    let empty = interp.lit_value("").expect("alloc");

    let left = interp.call("string-append", &[a.clone(), empty.clone()]).expect("append");
    let right = interp.call("string-append", &[empty, a.clone()]).expect("append");
    assert_eq!(&*string_of(&left).bytes(), b"payload");
    assert_eq!(&*string_of(&right).bytes(), b"payload");
}

#[test]
fn comparison_chains() {
    let mut interp = open_default();
    let a = interp.str_value(b"apple").expect("alloc");
    let b = interp.str_value(b"banana").expect("alloc");
    let c = interp.str_value(b"cherry").expect("alloc");

    let lt = interp
        .call("string<?", &[a.clone(), b.clone(), c.clone()])
        .expect("string<?");
    assert!(matches!(lt, Value::Bool(true)));

    let lt = interp.call("string<?", &[b.clone(), a.clone()]).expect("string<?");
    assert!(matches!(lt, Value::Bool(false)));

    let eq = interp.call("string=?", &[a.clone(), a.clone()]).expect("string=?");
    assert!(matches!(eq, Value::Bool(true)));

    // A non-string argument answers #f instead of raising.
    let mixed = interp.call("string=?", &[a.clone(), Value::Int(3)]).expect("string=?");
    assert!(matches!(mixed, Value::Bool(false)));

    // A proper prefix compares less.
    let prefix = interp.str_value(b"app").expect("alloc");
    let le = interp.call("string<?", &[prefix, a]).expect("string<?");
    assert!(matches!(le, Value::Bool(true)));
}

#[test]
fn comparison_is_antisymmetric() {
    let interp = open_default();
    let x = interp.str_value(b"left").expect("alloc");
    let y = interp.str_value(b"right").expect("alloc");
    let (x, y) = (string_of(&x), string_of(&y));
    assert_eq!(x.byte_cmp(&y), y.byte_cmp(&x).reverse());
    assert_eq!(x.byte_cmp(&x), std::cmp::Ordering::Equal);
    assert!(Str::ptr_eq(&x, &x));
}

fn first_char_upcased(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    match argv.first() {
        Some(Value::Char(c)) => Ok(Value::Char(c.to_ascii_uppercase())),
        _ => Ok(Value::Char(b'?')),
    }
}

fn count_call(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    // Returns its first argument; used to observe traversal lengths.
    Ok(argv.first().cloned().unwrap_or(Value::Undef))
}

#[test]
fn string_map_truncates_to_the_shortest_argument() {
    let mut interp = open_default();
    let upcase = interp.defun("test-upcase", first_char_upcased).expect("defun");
    let long = interp.str_value(b"abcdef").expect("alloc");
    let short = interp.str_value(b"xy").expect("alloc");

    let mapped = interp
        .call("string-map", &[upcase, long, short])
        .expect("string-map");
    assert_eq!(&*string_of(&mapped).bytes(), b"AB");
}

#[test]
fn string_map_requires_at_least_one_string() {
    let mut interp = open_default();
    let upcase = interp.defun("test-upcase-2", first_char_upcased).expect("defun");
    let err = interp.call("string-map", &[upcase]).expect_err("zero strings must raise");
    assert!(matches!(err.error, CoreError::BadArgument(_)));
}

#[test]
fn string_for_each_visits_every_slot() {
    let mut interp = open_default();
    let identity = interp.defun("test-identity", count_call).expect("defun");
    let s = interp.str_value(b"walk").expect("alloc");
    let out = interp.call("string-for-each", &[identity, s]).expect("string-for-each");
    assert!(matches!(out, Value::Undef));
}

#[test]
fn c_string_conversion_rejects_embedded_nul() {
    let mut interp = open_default();
    let s = interp
        .call("string", &[Value::Char(b'a'), Value::Char(0), Value::Char(b'b')])
        .expect("string");
    let err = string_of(&s).to_c_string().expect_err("embedded NUL must raise");
    assert_eq!(err.error, CoreError::EmbeddedNull);
    assert_eq!(err.irritants.len(), 1);

    let clean = interp.str_value(b"clean").expect("alloc");
    let cstr = string_of(&clean).to_c_string().expect("clean string converts");
    assert_eq!(cstr.as_bytes(), b"clean");
}

#[test]
fn formatting_builds_strings() {
    let interp = open_default();
    let v = interp.strf(format_args!("{}+{} = {}", 1, 2, 1 + 2)).expect("strf");
    assert_eq!(&*string_of(&v).bytes(), b"1+2 = 3");
}

#[test]
fn hashing_is_stable_and_content_based() {
    let interp = open_default();
    let a = string_of(&interp.str_value(b"hash me").expect("alloc"));
    let b = string_of(&interp.str_value(b"hash me").expect("alloc"));
    let c = string_of(&interp.str_value(b"hash you").expect("alloc"));
    assert_eq!(a.hash32(), b.hash32());
    assert_ne!(a.hash32(), c.hash32());
    assert_eq!(string_of(&interp.str_value(b"").expect("alloc")).hash32(), 0);
}

#[test]
fn deep_append_chain_flattens() {
    let mut interp = open_default();
    let x = interp.str_value(b"x").expect("alloc");
    let mut acc = interp.lit_value("").expect("alloc");
    let mark = interp.arena_save();
    for _ in 0..10_000 {
        acc = interp.call("string-append", &[acc, x.clone()]).expect("append");
    }
    let len = interp.call("string-length", &[acc.clone()]).expect("string-length");
    assert!(matches!(len, Value::Int(10_000)));
    let flat = string_of(&acc).bytes();
    assert_eq!(flat.len(), 10_000);
    assert!(flat.iter().all(|&b| b == b'x'));
    interp.arena_restore(mark);
}

#[test]
fn string_predicate_distinguishes_kinds() {
    let mut interp = open_default();
    let s = interp.str_value(b"yes").expect("alloc");
    let yes = interp.call("string?", &[s]).expect("string?");
    assert!(matches!(yes, Value::Bool(true)));
    let no = interp.call("string?", &[Value::Int(1)]).expect("string?");
    assert!(matches!(no, Value::Bool(false)));
}
