//! Primitive registration for every runtime subsystem.
//!
//! Bootstrap runs one initializer per subsystem, each bracketed by a GC
//! arena watermark so transient allocations never pile up. The string
//! initializer lives with the string engine in [`crate::string`]; the rest
//! register the primitive operators the value model supports directly.
//! Subsystems whose substance lives in other crates (the VM, the reader,
//! the expander) register their surface stubs here and nothing more.

use picrin_error::CoreError;
use tracing::debug;

use crate::args;
use crate::error::{Raised, Result};
use crate::state::Interp;
use crate::string;
use crate::value::{Value, list_to_vec};

pub(crate) fn init_all(interp: &mut Interp) -> Result<()> {
    let inits: &[(&str, fn(&mut Interp) -> Result<()>)] = &[
        ("undef", init_undef),
        ("bool", init_bool),
        ("pair", init_pair),
        ("port", init_port),
        ("number", init_number),
        ("proc", init_proc),
        ("symbol", init_symbol),
        ("vector", init_vector),
        ("blob", init_blob),
        ("cont", init_cont),
        ("char", init_char),
        ("error", init_error),
        ("str", string::init_str),
        ("macro", init_macro),
        ("var", init_var),
        ("write", init_write),
        ("read", init_read),
        ("dict", init_dict),
        ("record", init_record),
        ("eval", init_eval),
        ("lib", init_lib),
        ("attr", init_attr),
        ("reg", init_reg),
    ];
    for (name, init) in inits {
        let mark = interp.arena_save();
        debug!("registering {name} primitives");
        init(interp)?;
        interp.arena_restore(mark);
    }
    Ok(())
}

// The undefined value has no surface procedures.
fn init_undef(_interp: &mut Interp) -> Result<()> {
    Ok(())
}

// --- bool ---

fn prim_boolean_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Bool(_))))
}

fn prim_not(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(!argv[0].is_truthy()))
}

fn prim_boolean_eq(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    for arg in argv {
        if !matches!(arg, Value::Bool(_)) {
            return Ok(Value::Bool(false));
        }
    }
    let ok = argv.windows(2).all(|w| Value::eqv(&w[0], &w[1]));
    Ok(Value::Bool(ok))
}

fn init_bool(interp: &mut Interp) -> Result<()> {
    interp.defun("boolean?", prim_boolean_p)?;
    interp.defun("not", prim_not)?;
    interp.defun("boolean=?", prim_boolean_eq)?;
    Ok(())
}

// --- pair ---

fn expect_pair(value: &Value) -> Result<std::rc::Rc<crate::value::Pair>> {
    match value {
        Value::Pair(p) => Ok(p.clone()),
        other => Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "pair", found: other.type_name() },
            vec![other.clone()],
        )),
    }
}

fn prim_pair_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Pair(_))))
}

fn prim_cons(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    interp.cons(argv[0].clone(), argv[1].clone())
}

fn prim_car(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let pair = expect_pair(&argv[0])?;
    let car = pair.car.borrow().clone();
    Ok(car)
}

fn prim_cdr(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let pair = expect_pair(&argv[0])?;
    let cdr = pair.cdr.borrow().clone();
    Ok(cdr)
}

fn prim_set_car(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let pair = expect_pair(&argv[0])?;
    *pair.car.borrow_mut() = argv[1].clone();
    Ok(Value::Undef)
}

fn prim_set_cdr(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let pair = expect_pair(&argv[0])?;
    *pair.cdr.borrow_mut() = argv[1].clone();
    Ok(Value::Undef)
}

fn prim_null_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Nil)))
}

fn prim_list(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    let mut list = Value::Nil;
    for arg in argv.iter().rev() {
        list = interp.cons(arg.clone(), list)?;
    }
    Ok(list)
}

fn init_pair(interp: &mut Interp) -> Result<()> {
    interp.defun("pair?", prim_pair_p)?;
    interp.defun("cons", prim_cons)?;
    interp.defun("car", prim_car)?;
    interp.defun("cdr", prim_cdr)?;
    interp.defun("set-car!", prim_set_car)?;
    interp.defun("set-cdr!", prim_set_cdr)?;
    interp.defun("null?", prim_null_p)?;
    interp.defun("list", prim_list)?;
    Ok(())
}

// --- port ---

fn prim_port_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Port(_))))
}

fn prim_input_port_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(&argv[0], Value::Port(p) if p.is_input())))
}

fn prim_output_port_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(&argv[0], Value::Port(p) if p.is_output())))
}

fn init_port(interp: &mut Interp) -> Result<()> {
    interp.defun("port?", prim_port_p)?;
    interp.defun("input-port?", prim_input_port_p)?;
    interp.defun("output-port?", prim_output_port_p)?;
    Ok(())
}

// --- number ---

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Result<Num> {
        match value {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(n) => Ok(Num::Float(*n)),
            other => Err(Raised::with_irritants(
                CoreError::TypeMismatch { expected: "number", found: other.type_name() },
                vec![other.clone()],
            )),
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(n) => n,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(n) => Value::Float(n),
        }
    }
}

fn num_add(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => {
            x.checked_add(y).map(Num::Int).unwrap_or(Num::Float(x as f64 + y as f64))
        }
        _ => Num::Float(a.to_f64() + b.to_f64()),
    }
}

fn num_sub(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => {
            x.checked_sub(y).map(Num::Int).unwrap_or(Num::Float(x as f64 - y as f64))
        }
        _ => Num::Float(a.to_f64() - b.to_f64()),
    }
}

fn num_mul(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => {
            x.checked_mul(y).map(Num::Int).unwrap_or(Num::Float(x as f64 * y as f64))
        }
        _ => Num::Float(a.to_f64() * b.to_f64()),
    }
}

fn prim_number_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Int(_) | Value::Float(_))))
}

fn prim_add(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    let mut acc = Num::Int(0);
    for arg in argv {
        acc = num_add(acc, Num::of(arg)?);
    }
    Ok(acc.into_value())
}

fn prim_sub(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::at_least(argv, 1)?;
    let first = Num::of(&argv[0])?;
    if argv.len() == 1 {
        return Ok(num_sub(Num::Int(0), first).into_value());
    }
    let mut acc = first;
    for arg in &argv[1..] {
        acc = num_sub(acc, Num::of(arg)?);
    }
    Ok(acc.into_value())
}

fn prim_mul(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    let mut acc = Num::Int(1);
    for arg in argv {
        acc = num_mul(acc, Num::of(arg)?);
    }
    Ok(acc.into_value())
}

fn prim_div(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::at_least(argv, 1)?;
    let first = Num::of(&argv[0])?.to_f64();
    if argv.len() == 1 {
        return Ok(Value::Float(1.0 / first));
    }
    let mut acc = first;
    for arg in &argv[1..] {
        acc /= Num::of(arg)?.to_f64();
    }
    Ok(Value::Float(acc))
}

fn fold_numeric_chain(argv: &[Value], accept: fn(f64, f64) -> bool) -> Result<Value> {
    args::at_least(argv, 2)?;
    let mut prev = Num::of(&argv[0])?.to_f64();
    for arg in &argv[1..] {
        let next = Num::of(arg)?.to_f64();
        if !accept(prev, next) {
            return Ok(Value::Bool(false));
        }
        prev = next;
    }
    Ok(Value::Bool(true))
}

fn prim_num_eq(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_numeric_chain(argv, |a, b| a == b)
}

fn prim_num_lt(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_numeric_chain(argv, |a, b| a < b)
}

fn prim_num_le(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_numeric_chain(argv, |a, b| a <= b)
}

fn prim_num_gt(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_numeric_chain(argv, |a, b| a > b)
}

fn prim_num_ge(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    fold_numeric_chain(argv, |a, b| a >= b)
}

fn init_number(interp: &mut Interp) -> Result<()> {
    interp.defun("number?", prim_number_p)?;
    interp.defun("+", prim_add)?;
    interp.defun("-", prim_sub)?;
    interp.defun("*", prim_mul)?;
    interp.defun("/", prim_div)?;
    interp.defun("=", prim_num_eq)?;
    interp.defun("<", prim_num_lt)?;
    interp.defun("<=", prim_num_le)?;
    interp.defun(">", prim_num_gt)?;
    interp.defun(">=", prim_num_ge)?;
    Ok(())
}

// --- proc ---

fn prim_procedure_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Proc(_))))
}

fn prim_apply(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::at_least(argv, 2)?;
    let proc = args::procedure(argv, 0)?;
    let mut call_args: Vec<Value> = argv[1..argv.len() - 1].to_vec();
    let Some(tail) = list_to_vec(&argv[argv.len() - 1]) else {
        return Err(Raised::new(CoreError::TypeMismatch {
            expected: "list",
            found: argv[argv.len() - 1].type_name(),
        }));
    };
    call_args.extend(tail);
    interp.apply(&proc, &call_args)
}

fn init_proc(interp: &mut Interp) -> Result<()> {
    interp.defun("procedure?", prim_procedure_p)?;
    interp.defun("apply", prim_apply)?;
    Ok(())
}

// --- symbol ---

fn prim_symbol_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Sym(_))))
}

fn prim_symbol_to_string(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let sym = args::symbol(argv, 0)?;
    interp.str_value(sym.name().as_bytes())
}

fn prim_string_to_symbol(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let s = args::string(argv, 0)?;
    let bytes = s.bytes();
    let name = std::str::from_utf8(&bytes).map_err(|_| {
        Raised::with_irritants(
            CoreError::bad_argument("string->symbol: invalid symbol name"),
            vec![argv[0].clone()],
        )
    })?;
    let sym = interp.intern(name);
    Ok(Value::Sym(sym))
}

fn prim_symbol_eq(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    for arg in argv {
        if !matches!(arg, Value::Sym(_)) {
            return Ok(Value::Bool(false));
        }
    }
    let ok = argv.windows(2).all(|w| Value::eqv(&w[0], &w[1]));
    Ok(Value::Bool(ok))
}

fn init_symbol(interp: &mut Interp) -> Result<()> {
    interp.defun("symbol?", prim_symbol_p)?;
    interp.defun("symbol->string", prim_symbol_to_string)?;
    interp.defun("string->symbol", prim_string_to_symbol)?;
    interp.defun("symbol=?", prim_symbol_eq)?;
    Ok(())
}

// --- vector ---

fn expect_vector(value: &Value) -> Result<std::rc::Rc<crate::value::Vector>> {
    match value {
        Value::Vector(v) => Ok(v.clone()),
        other => Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "vector", found: other.type_name() },
            vec![other.clone()],
        )),
    }
}

fn prim_vector_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Vector(_))))
}

fn prim_make_vector(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 2)?;
    let len = args::integer(argv, 0)?;
    if len < 0 {
        return Err(Raised::with_irritants(
            CoreError::bad_argument("make-vector: negative length given"),
            vec![Value::Int(len)],
        ));
    }
    let fill = argv.get(1).cloned().unwrap_or(Value::Undef);
    interp.make_vector(len as usize, fill)
}

fn prim_vector_length(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let v = expect_vector(&argv[0])?;
    let len = v.elems.borrow().len();
    Ok(Value::Int(len as i64))
}

fn prim_vector_ref(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let v = expect_vector(&argv[0])?;
    let len = v.elems.borrow().len();
    let k = args::index(args::integer(argv, 1)?, len)?;
    let item = v.elems.borrow()[k].clone();
    Ok(item)
}

fn prim_vector_set(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let v = expect_vector(&argv[0])?;
    let len = v.elems.borrow().len();
    let k = args::index(args::integer(argv, 1)?, len)?;
    v.elems.borrow_mut()[k] = argv[2].clone();
    Ok(Value::Undef)
}

fn init_vector(interp: &mut Interp) -> Result<()> {
    interp.defun("vector?", prim_vector_p)?;
    interp.defun("make-vector", prim_make_vector)?;
    interp.defun("vector-length", prim_vector_length)?;
    interp.defun("vector-ref", prim_vector_ref)?;
    interp.defun("vector-set!", prim_vector_set)?;
    Ok(())
}

// --- blob ---

fn expect_blob(value: &Value) -> Result<std::rc::Rc<crate::value::Blob>> {
    match value {
        Value::Blob(b) => Ok(b.clone()),
        other => Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "bytevector", found: other.type_name() },
            vec![other.clone()],
        )),
    }
}

fn prim_bytevector_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Blob(_))))
}

fn prim_make_bytevector(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 2)?;
    let len = args::integer(argv, 0)?;
    if len < 0 {
        return Err(Raised::with_irritants(
            CoreError::bad_argument("make-bytevector: negative length given"),
            vec![Value::Int(len)],
        ));
    }
    let fill = if argv.len() > 1 {
        let byte = args::integer(argv, 1)?;
        u8::try_from(byte).map_err(|_| {
            Raised::with_irritants(
                CoreError::bad_argument("make-bytevector: fill byte out of range"),
                vec![Value::Int(byte)],
            )
        })?
    } else {
        0
    };
    interp.make_blob(len as usize, fill)
}

fn prim_bytevector_length(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let b = expect_blob(&argv[0])?;
    let len = b.data.borrow().len();
    Ok(Value::Int(len as i64))
}

fn prim_bytevector_u8_ref(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let b = expect_blob(&argv[0])?;
    let len = b.data.borrow().len();
    let k = args::index(args::integer(argv, 1)?, len)?;
    let byte = b.data.borrow()[k];
    Ok(Value::Int(byte as i64))
}

fn prim_bytevector_u8_set(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let b = expect_blob(&argv[0])?;
    let len = b.data.borrow().len();
    let k = args::index(args::integer(argv, 1)?, len)?;
    let byte = args::integer(argv, 2)?;
    let byte = u8::try_from(byte).map_err(|_| {
        Raised::with_irritants(
            CoreError::bad_argument("bytevector-u8-set!: byte out of range"),
            vec![Value::Int(byte)],
        )
    })?;
    b.data.borrow_mut()[k] = byte;
    Ok(Value::Undef)
}

fn init_blob(interp: &mut Interp) -> Result<()> {
    interp.defun("bytevector?", prim_bytevector_p)?;
    interp.defun("make-bytevector", prim_make_bytevector)?;
    interp.defun("bytevector-length", prim_bytevector_length)?;
    interp.defun("bytevector-u8-ref", prim_bytevector_u8_ref)?;
    interp.defun("bytevector-u8-set!", prim_bytevector_u8_set)?;
    Ok(())
}

// --- cont ---

/// `dynamic-wind` at the checkpoint level: the full continuation machinery
/// lives in the VM crate, but winding in and out of an extent is runtime
/// bookkeeping, and teardown depends on it.
fn prim_dynamic_wind(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let before = args::procedure(argv, 0)?;
    let thunk = args::procedure(argv, 1)?;
    let after = args::procedure(argv, 2)?;

    interp.apply(&before, &[])?;
    interp.push_checkpoint(Some(before.clone()), Some(after.clone()));
    let outcome = interp.apply(&thunk, &[]);
    interp.pop_checkpoint();
    let unwound = interp.apply(&after, &[]);

    match (outcome, unwound) {
        (Ok(value), Ok(_)) => Ok(value),
        (Err(raised), _) => Err(raised),
        (_, Err(raised)) => Err(raised),
    }
}

fn init_cont(interp: &mut Interp) -> Result<()> {
    interp.defun("dynamic-wind", prim_dynamic_wind)?;
    Ok(())
}

// --- char ---

fn prim_char_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Char(_))))
}

fn prim_char_to_integer(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let c = args::character(argv, 0)?;
    Ok(Value::Int(c as i64))
}

fn prim_integer_to_char(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let n = args::integer(argv, 0)?;
    let byte = u8::try_from(n).map_err(|_| {
        Raised::with_irritants(
            CoreError::bad_argument("integer->char: code point out of range"),
            vec![Value::Int(n)],
        )
    })?;
    Ok(Value::Char(byte))
}

fn prim_char_eq(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    for arg in argv {
        if !matches!(arg, Value::Char(_)) {
            return Ok(Value::Bool(false));
        }
    }
    let ok = argv.windows(2).all(|w| Value::eqv(&w[0], &w[1]));
    Ok(Value::Bool(ok))
}

fn init_char(interp: &mut Interp) -> Result<()> {
    interp.defun("char?", prim_char_p)?;
    interp.defun("char->integer", prim_char_to_integer)?;
    interp.defun("integer->char", prim_integer_to_char)?;
    interp.defun("char=?", prim_char_eq)?;
    Ok(())
}

// --- error ---

/// The error-raise primitive: a message plus any irritants, through the
/// interpreter's error channel.
fn prim_error(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::at_least(argv, 1)?;
    let message = args::string(argv, 0)?;
    let text = String::from_utf8_lossy(&message.bytes()).into_owned();
    Err(interp.raise(CoreError::Message(text), argv[1..].to_vec()))
}

fn init_error(interp: &mut Interp) -> Result<()> {
    interp.defun("error", prim_error)?;
    Ok(())
}

// --- macro ---

fn prim_gensym(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 0, 1)?;
    let base = match argv.first() {
        Some(Value::Sym(sym)) => sym.clone(),
        Some(Value::Str(s)) => {
            let bytes = s.bytes();
            let name = String::from_utf8_lossy(&bytes).into_owned();
            interp.intern(&name)
        }
        Some(other) => {
            return Err(Raised::with_irritants(
                CoreError::TypeMismatch { expected: "symbol", found: other.type_name() },
                vec![other.clone()],
            ));
        }
        None => interp.intern("g"),
    };
    Ok(Value::Sym(interp.gensym(&base)))
}

fn init_macro(interp: &mut Interp) -> Result<()> {
    interp.defun("gensym", prim_gensym)?;
    Ok(())
}

// --- var ---

fn prim_make_parameter(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 2)?;
    // A converter procedure, when given, is applied by the evaluator's
    // parameterize; the runtime stores the initial value as-is.
    interp.make_parameter(argv[0].clone())
}

fn init_var(interp: &mut Interp) -> Result<()> {
    interp.defun("make-parameter", prim_make_parameter)?;
    Ok(())
}

// --- write ---

fn display_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Str(s) => s.bytes().to_vec(),
        Value::Char(c) => vec![*c],
        Value::Sym(sym) => sym.name().as_bytes().to_vec(),
        Value::Int(n) => n.to_string().into_bytes(),
        Value::Float(n) => n.to_string().into_bytes(),
        Value::Bool(true) => b"#t".to_vec(),
        Value::Bool(false) => b"#f".to_vec(),
        Value::Nil => b"()".to_vec(),
        other => format!("{other:?}").into_bytes(),
    }
}

fn prim_display(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 1, 2)?;
    let port = match argv.get(1) {
        Some(Value::Port(p)) => p.clone(),
        Some(other) => {
            return Err(Raised::with_irritants(
                CoreError::TypeMismatch { expected: "port", found: other.type_name() },
                vec![other.clone()],
            ));
        }
        None => interp.stdout_port().ok_or_else(|| {
            Raised::new(CoreError::bad_argument("no standard output port"))
        })?,
    };
    port.write_all(&display_bytes(&argv[0]))?;
    Ok(Value::Undef)
}

fn prim_newline(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::between(argv, 0, 1)?;
    let port = match argv.first() {
        Some(Value::Port(p)) => p.clone(),
        Some(other) => {
            return Err(Raised::with_irritants(
                CoreError::TypeMismatch { expected: "port", found: other.type_name() },
                vec![other.clone()],
            ));
        }
        None => interp.stdout_port().ok_or_else(|| {
            Raised::new(CoreError::bad_argument("no standard output port"))
        })?,
    };
    port.write_all(b"\n")?;
    port.flush()?;
    Ok(Value::Undef)
}

fn init_write(interp: &mut Interp) -> Result<()> {
    interp.defun("display", prim_display)?;
    interp.defun("newline", prim_newline)?;
    Ok(())
}

// --- read ---

fn prim_eof_object(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 0)?;
    Ok(Value::Eof)
}

fn prim_eof_object_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Eof)))
}

fn init_read(interp: &mut Interp) -> Result<()> {
    interp.defun("eof-object", prim_eof_object)?;
    interp.defun("eof-object?", prim_eof_object_p)?;
    Ok(())
}

// --- dict ---

fn expect_dict(value: &Value) -> Result<std::rc::Rc<crate::value::Dict>> {
    match value {
        Value::Dict(d) => Ok(d.clone()),
        other => Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "dictionary", found: other.type_name() },
            vec![other.clone()],
        )),
    }
}

fn prim_make_dictionary(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 0)?;
    interp.make_dict()
}

fn prim_dictionary_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Dict(_))))
}

fn prim_dictionary_ref(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let dict = expect_dict(&argv[0])?;
    let key = args::symbol(argv, 1)?;
    let found = dict.map.borrow().get(&key).cloned();
    found.ok_or_else(|| {
        Raised::with_irritants(
            CoreError::bad_argument(format!("dictionary-ref: key not found: {key}")),
            vec![argv[0].clone()],
        )
    })
}

fn prim_dictionary_set(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let dict = expect_dict(&argv[0])?;
    let key = args::symbol(argv, 1)?;
    dict.map.borrow_mut().insert(key, argv[2].clone());
    Ok(Value::Undef)
}

fn prim_dictionary_has_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let dict = expect_dict(&argv[0])?;
    let key = args::symbol(argv, 1)?;
    let has = dict.map.borrow().contains_key(&key);
    Ok(Value::Bool(has))
}

fn prim_dictionary_size(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let dict = expect_dict(&argv[0])?;
    let len = dict.map.borrow().len();
    Ok(Value::Int(len as i64))
}

fn init_dict(interp: &mut Interp) -> Result<()> {
    interp.defun("make-dictionary", prim_make_dictionary)?;
    interp.defun("dictionary?", prim_dictionary_p)?;
    interp.defun("dictionary-ref", prim_dictionary_ref)?;
    interp.defun("dictionary-set!", prim_dictionary_set)?;
    interp.defun("dictionary-has?", prim_dictionary_has_p)?;
    interp.defun("dictionary-size", prim_dictionary_size)?;
    Ok(())
}

// --- record ---

fn expect_record(value: &Value) -> Result<std::rc::Rc<crate::value::Record>> {
    match value {
        Value::Record(r) => Ok(r.clone()),
        other => Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "record", found: other.type_name() },
            vec![other.clone()],
        )),
    }
}

fn prim_make_record(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    interp.make_record(argv[0].clone())
}

fn prim_record_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Record(_))))
}

fn prim_record_type(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let record = expect_record(&argv[0])?;
    Ok(record.rtype.clone())
}

fn prim_record_ref(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let record = expect_record(&argv[0])?;
    let slot = args::symbol(argv, 1)?;
    let found = record.fields.borrow().get(&slot).cloned();
    found.ok_or_else(|| {
        Raised::with_irritants(
            CoreError::bad_argument(format!("record-ref: unbound slot: {slot}")),
            vec![argv[0].clone()],
        )
    })
}

fn prim_record_set(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let record = expect_record(&argv[0])?;
    let slot = args::symbol(argv, 1)?;
    record.fields.borrow_mut().insert(slot, argv[2].clone());
    Ok(Value::Undef)
}

fn init_record(interp: &mut Interp) -> Result<()> {
    interp.defun("make-record", prim_make_record)?;
    interp.defun("record?", prim_record_p)?;
    interp.defun("record-type", prim_record_type)?;
    interp.defun("record-ref", prim_record_ref)?;
    interp.defun("record-set!", prim_record_set)?;
    Ok(())
}

// --- eval ---

fn prim_eval(_interp: &mut Interp, _argv: &[Value]) -> Result<Value> {
    // The bytecode compiler and VM attach through the source-loader seam;
    // until one is installed, eval cannot run.
    Err(Raised::new(CoreError::Message(String::from(
        "eval: no evaluator is installed in this runtime",
    ))))
}

fn init_eval(interp: &mut Interp) -> Result<()> {
    interp.defun("eval", prim_eval)?;
    Ok(())
}

// --- lib ---

fn prim_features(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 0)?;
    Ok(interp.features().clone())
}

fn prim_libraries(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 0)?;
    Ok(interp.libs().clone())
}

fn init_lib(interp: &mut Interp) -> Result<()> {
    interp.defun("features", prim_features)?;
    interp.defun("libraries", prim_libraries)?;
    Ok(())
}

// --- attr ---

/// Per-object attribute dictionary, created on first access and dying with
/// its object.
fn prim_attribute(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    let attrs = interp
        .attrs()
        .ok_or_else(|| Raised::new(CoreError::bad_argument("attribute table is not available")))?;
    if let Some(existing) = attrs.get(&argv[0]) {
        return Ok(existing);
    }
    let dict = interp.make_dict()?;
    if !attrs.set(&argv[0], dict.clone()) {
        return Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "heap object", found: argv[0].type_name() },
            vec![argv[0].clone()],
        ));
    }
    Ok(dict)
}

fn init_attr(interp: &mut Interp) -> Result<()> {
    interp.defun("attribute", prim_attribute)?;
    Ok(())
}

// --- reg ---

fn expect_reg(value: &Value) -> Result<std::rc::Rc<crate::value::Reg>> {
    match value {
        Value::Reg(r) => Ok(r.clone()),
        other => Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "registry", found: other.type_name() },
            vec![other.clone()],
        )),
    }
}

fn prim_make_registry(interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 0)?;
    let reg = interp.make_reg()?;
    interp.push_reg(reg.clone())?;
    Ok(reg)
}

fn prim_registry_p(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 1)?;
    Ok(Value::Bool(matches!(argv[0], Value::Reg(_))))
}

fn prim_registry_ref(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 2)?;
    let reg = expect_reg(&argv[0])?;
    reg.get(&argv[1]).ok_or_else(|| {
        Raised::with_irritants(
            CoreError::bad_argument("registry-ref: key not registered"),
            vec![argv[1].clone()],
        )
    })
}

fn prim_registry_set(_interp: &mut Interp, argv: &[Value]) -> Result<Value> {
    args::exact(argv, 3)?;
    let reg = expect_reg(&argv[0])?;
    if !reg.set(&argv[1], argv[2].clone()) {
        return Err(Raised::with_irritants(
            CoreError::TypeMismatch { expected: "heap object", found: argv[1].type_name() },
            vec![argv[1].clone()],
        ));
    }
    Ok(Value::Undef)
}

fn init_reg(interp: &mut Interp) -> Result<()> {
    interp.defun("make-registry", prim_make_registry)?;
    interp.defun("registry?", prim_registry_p)?;
    interp.defun("registry-ref", prim_registry_ref)?;
    interp.defun("registry-set!", prim_registry_set)?;
    Ok(())
}
