//! Runtime core of picrin-rs, a Rust port of the Picrin R7RS Scheme
//! interpreter.
//!
//! This crate owns the two subsystems everything else hangs off:
//!
//! 1. **Interpreter state lifecycle** — [`Interp::open`] allocates the VM
//!    stacks, GC arena, heap, and symbol table, interns the syntactic
//!    keywords and primitive operators, constructs the standard ports and
//!    the `(picrin base)` / `(picrin user)` libraries, registers every
//!    subsystem's primitives, and queues the embedded boot source.
//!    [`Interp::close`] (or dropping the instance) tears all of that down in
//!    reverse dependency order, running any active dynamic-wind exit thunks
//!    first.
//! 2. **String values** — Scheme strings are copy-on-write handles over the
//!    persistent rope in `picrin-rope`; the full R7RS string primitive set
//!    is registered by the string subsystem initializer.
//!
//! The bytecode VM, reader/printer, and macro expander are separate crates;
//! this one exposes the seams they plug into ([`SourceLoader`], the value
//! and call-info stacks, the checkpoint chain).
//!
//! An interpreter instance is strictly single threaded. Multiple instances
//! may coexist in one process as long as they share no objects.
//!
//! # Usage
//!
//! ```
//! use std::rc::Rc;
//! use picrin_heap::SystemAllocator;
//! use picrin_runtime::{Interp, Value};
//!
//! let mut interp = Interp::open(Vec::new(), Vec::new(), Rc::new(SystemAllocator))
//!     .expect("bootstrap");
//! let s = interp.str_value(b"hello").expect("alloc");
//! let len = interp.call("string-length", &[s]).expect("call");
//! assert!(matches!(len, Value::Int(5)));
//! interp.close();
//! ```

pub mod args;
mod boot;
pub mod checkpoint;
mod error;
mod library;
pub mod port;
mod prims;
mod state;
pub mod string;
pub mod symbol;
pub mod value;

pub use error::{Raised, Result};
pub use library::Library;
pub use picrin_error::CoreError;
pub use state::{CallInfo, CoreSyms, Interp, OpenError, RenamedSyms, RuntimeConfig, SourceLoader};
pub use string::Str;
pub use symbol::Symbol;
pub use value::Value;
