//! Bootstrap and teardown scenarios: allocator accounting, feature
//! detection, symbol rosters, libraries, and dynamic-wind cleanup.

use std::cell::Cell;
use std::rc::Rc;

use picrin_heap::{Allocator, CountingAllocator, SystemAllocator};
use picrin_runtime::value::list_to_vec;
use picrin_runtime::{Interp, OpenError, Result, RuntimeConfig, Value};
use pretty_assertions::assert_eq;

fn open_default() -> Interp {
    Interp::open(Vec::new(), Vec::new(), Rc::new(SystemAllocator)).expect("bootstrap failed")
}

fn feature_names(interp: &Interp) -> Vec<String> {
    list_to_vec(&interp.features().clone())
        .expect("features must be a proper list")
        .iter()
        .filter_map(|v| v.as_sym())
        .map(|s| s.name().to_owned())
        .collect()
}

#[test]
fn open_then_close_returns_every_byte() {
    let alloc = Rc::new(CountingAllocator::new());
    let mut interp =
        Interp::open(Vec::new(), Vec::new(), alloc.clone()).expect("bootstrap failed");

    // Exercise the runtime a little so the ledger is not trivially empty.
    let s = interp.str_value(b"transient").expect("alloc");
    let _ = interp.call("string-length", &[s]).expect("call");
    assert!(alloc.live_bytes() > 0);

    interp.close();
    assert_eq!(alloc.live_bytes(), 0, "allocator must report zero live bytes after close");
}

#[test]
fn dropping_an_instance_tears_down_too() {
    let alloc = Rc::new(CountingAllocator::new());
    {
        let _interp =
            Interp::open(Vec::new(), Vec::new(), alloc.clone()).expect("bootstrap failed");
    }
    assert_eq!(alloc.live_bytes(), 0);
}

#[test]
fn failing_the_third_allocation_aborts_open_cleanly() {
    let alloc = Rc::new(CountingAllocator::new());
    alloc.fail_nth_take(3);
    let outcome = Interp::open(Vec::new(), Vec::new(), alloc.clone());
    assert!(matches!(outcome, Err(OpenError::Alloc(_))));
    assert_eq!(alloc.live_bytes(), 0, "partial bootstrap must unwind completely");
}

#[test]
fn failing_a_late_allocation_also_unwinds() {
    // Fail deep into bootstrap, well past the raw-memory phase.
    let alloc = Rc::new(CountingAllocator::new());
    alloc.fail_nth_take(40);
    let outcome = Interp::open(Vec::new(), Vec::new(), alloc.clone());
    assert!(outcome.is_err());
    assert_eq!(alloc.live_bytes(), 0);
}

#[test]
fn features_contain_the_required_symbols() {
    let interp = open_default();
    let names = feature_names(&interp);

    assert!(names.iter().any(|n| n == "picrin"));
    assert!(names.iter().any(|n| n == "ieee-float"));

    let endian = names.iter().filter(|n| n.ends_with("-endian")).count();
    assert_eq!(endian, 1, "exactly one endianness symbol, got {names:?}");
}

#[test]
fn add_feature_pushes_onto_the_list() {
    let mut interp = open_default();
    interp.add_feature("my-extension").expect("add_feature");
    assert!(feature_names(&interp).iter().any(|n| n == "my-extension"));
}

#[test]
fn keyword_symbols_are_interned_and_renamed() {
    let interp = open_default();
    let core = interp.core_syms().clone();
    let renamed = interp.renamed_syms().clone();

    assert_eq!(core.define.name(), "define");
    assert_eq!(core.set_bang.name(), "set!");
    assert_eq!(core.tailcall_with_values.name(), "tailcall-with-values");
    assert!(core.define.is_interned());

    // The hygienic twin shares the surface name but not the identity.
    assert_eq!(renamed.define.name(), "define");
    assert_ne!(renamed.define, core.define);
    assert!(!renamed.define.is_interned());
}

#[test]
fn base_libraries_exist_and_user_is_current() {
    let interp = open_default();
    assert!(interp.find_library("(picrin base)").is_some());
    assert!(interp.find_library("(picrin user)").is_some());
    let current = interp.current_library().expect("current library");
    assert_eq!(current.name_string(), "(picrin user)");
    assert_eq!(
        interp.base_library().map(|l| l.name_string()),
        Some(String::from("(picrin base)"))
    );
    assert_eq!(
        interp.user_library().map(|l| l.name_string()),
        Some(String::from("(picrin user)"))
    );
}

#[test]
fn root_tables_are_populated_after_bootstrap() {
    let interp = open_default();
    assert!(interp.globals_dict().is_some());
    assert!(interp.macros_dict().is_some());
    // One empty parameterization frame.
    assert_eq!(list_to_vec(interp.parameterization()).map(|v| v.len()), Some(1));
    // The attribute registry is on the registry list.
    assert_eq!(list_to_vec(interp.registries()).map(|v| v.len()), Some(1));
    // Root checkpoint: depth zero, chain intact.
    assert_eq!(interp.checkpoint_depth(), Some(0));
}

#[test]
fn standard_ports_are_wired_up() {
    let mut interp = open_default();
    let stdin = interp.stdin_port().expect("stdin port");
    let stdout = interp.stdout_port().expect("stdout port");
    let stderr = interp.stderr_port().expect("stderr port");
    assert!(stdin.is_input());
    assert!(stdout.is_output());
    assert!(stderr.is_output());

    let yes = interp
        .call("input-port?", &[Value::Port(stdin)])
        .expect("input-port?");
    assert!(matches!(yes, Value::Bool(true)));
    let no = interp
        .call("input-port?", &[Value::Port(stdout)])
        .expect("input-port?");
    assert!(matches!(no, Value::Bool(false)));
}

#[test]
fn make_registry_registers_on_the_registry_list() {
    let mut interp = open_default();
    let before = list_to_vec(interp.registries()).map(|v| v.len());
    let reg = interp.call("make-registry", &[]).expect("make-registry");
    assert!(matches!(reg, Value::Reg(_)));
    let after = list_to_vec(interp.registries()).map(|v| v.len());
    assert_eq!(after, before.map(|n| n + 1));
}

#[test]
fn base_exports_are_visible_from_the_user_library() {
    let interp = open_default();
    for name in ["string-length", "cons", "dynamic-wind", "make-parameter", "string=?"] {
        assert!(interp.resolve(name).is_some(), "{name} should resolve after import");
    }
}

#[test]
fn boot_source_queues_until_an_evaluator_attaches() {
    let mut interp = open_default();
    let pending = interp.drain_pending_sources();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].contains("define-syntax let"));
    // Draining is one-shot.
    assert!(interp.drain_pending_sources().is_empty());
}

#[test]
fn custom_config_sizes_the_stacks() {
    let config = RuntimeConfig {
        stack_size: 64,
        callinfo_size: 32,
        rescue_size: 8,
        arena_size: 128,
    };
    let interp = Interp::open_with(config, Vec::new(), Vec::new(), Rc::new(SystemAllocator), None)
        .expect("bootstrap failed");
    assert!(interp.value_stack_capacity() >= 64);
    assert!(interp.callinfo_capacity() >= 32);
    assert!(interp.rescue_capacity() >= 8);
    assert_eq!(interp.config().arena_size, 128);
}

#[test]
fn command_line_is_passed_through() {
    let interp = Interp::open(
        vec![String::from("picrin"), String::from("script.scm")],
        vec![(String::from("LANG"), String::from("C"))],
        Rc::new(SystemAllocator),
    )
    .expect("bootstrap failed");
    assert_eq!(interp.argv().len(), 2);
    assert_eq!(interp.envp()[0].0, "LANG");
}

#[test]
fn instances_are_independent() {
    let mut a = open_default();
    let mut b = open_default();
    a.add_feature("only-in-a").expect("add_feature");
    assert!(feature_names(&a).iter().any(|n| n == "only-in-a"));
    assert!(!feature_names(&b).iter().any(|n| n == "only-in-a"));
    let s = b.str_value(b"b's string").expect("alloc");
    assert_eq!(s.as_str().map(|s| s.len()), Some(10));
    a.close();
    // b still works after a is gone.
    let v = b.call("string-length", &[s]).expect("call");
    assert!(matches!(v, Value::Int(10)));
}

thread_local! {
    static WOUND_OUT: Cell<u32> = const { Cell::new(0) };
    static WOUND_IN: Cell<u32> = const { Cell::new(0) };
}

fn note_out(_interp: &mut Interp, _argv: &[Value]) -> Result<Value> {
    WOUND_OUT.with(|c| c.set(c.get() + 1));
    Ok(Value::Undef)
}

fn note_in(_interp: &mut Interp, _argv: &[Value]) -> Result<Value> {
    WOUND_IN.with(|c| c.set(c.get() + 1));
    Ok(Value::Undef)
}

fn body_thunk(_interp: &mut Interp, _argv: &[Value]) -> Result<Value> {
    Ok(Value::Int(7))
}

#[test]
fn close_runs_pending_exit_thunks_deepest_first() {
    WOUND_OUT.with(|c| c.set(0));
    let mut interp = open_default();
    let out = interp.defun("test-exit-thunk", note_out).expect("defun");

    interp.push_checkpoint(None, Some(out.clone()));
    interp.push_checkpoint(None, Some(out));
    assert_eq!(interp.checkpoint_depth(), Some(2));

    interp.close();
    assert_eq!(WOUND_OUT.with(|c| c.get()), 2, "both exit thunks must run at close");
}

#[test]
fn dynamic_wind_winds_in_and_out() {
    WOUND_OUT.with(|c| c.set(0));
    WOUND_IN.with(|c| c.set(0));
    let mut interp = open_default();
    let before = interp.defun("test-wind-in", note_in).expect("defun");
    let thunk = interp.defun("test-wind-body", body_thunk).expect("defun");
    let after = interp.defun("test-wind-out", note_out).expect("defun");

    let depth_before = interp.checkpoint_depth();
    let result = interp.call("dynamic-wind", &[before, thunk, after]).expect("dynamic-wind");
    assert!(matches!(result, Value::Int(7)));
    assert_eq!(WOUND_IN.with(|c| c.get()), 1);
    assert_eq!(WOUND_OUT.with(|c| c.get()), 1);
    assert_eq!(interp.checkpoint_depth(), depth_before, "checkpoint chain must unwind");
}

#[test]
fn raised_errors_land_in_the_error_slot() {
    let mut interp = open_default();
    let msg = interp.str_value(b"boom").expect("alloc");
    let err = interp.call("error", &[msg, Value::Int(1)]).expect_err("error must raise");
    assert_eq!(err.to_string(), "boom (1 irritant)");
    assert!(interp.last_error().is_some());

    interp.clear_error();
    assert!(interp.last_error().is_none());
}

#[test]
fn parameters_hold_and_replace_their_value() {
    let mut interp = open_default();
    let param = interp.call("make-parameter", &[Value::Int(42)]).expect("make-parameter");
    let got = interp.apply(&param, &[]).expect("read");
    assert!(matches!(got, Value::Int(42)));

    interp.apply(&param, &[Value::Int(7)]).expect("write");
    let got = interp.apply(&param, &[]).expect("read");
    assert!(matches!(got, Value::Int(7)));
}

#[test]
fn attributes_are_per_object_and_stable() {
    let mut interp = open_default();
    let subject = interp.str_value(b"subject").expect("alloc");
    let first = interp.call("attribute", &[subject.clone()]).expect("attribute");
    let second = interp.call("attribute", &[subject]).expect("attribute");
    assert!(Value::eqv(&first, &second), "same object must map to the same attribute dict");
}

#[test]
fn gc_reclaims_dropped_objects() {
    let mut interp = open_default();
    let before = interp.live_objects();
    let mark = interp.arena_save();
    for _ in 0..16 {
        interp.str_value(b"short-lived").expect("alloc");
    }
    assert!(interp.live_objects() >= before + 16);
    interp.arena_restore(mark);
    interp.gc_run();
    assert_eq!(interp.live_objects(), before);
}
