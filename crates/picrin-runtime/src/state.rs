//! The interpreter state and its lifecycle.
//!
//! [`Interp::open`] runs the bootstrap phases in their dependency order:
//!
//! - **A** raw memory: the state container, VM stacks, and GC arena are
//!   charged to the allocator; the first refusal unwinds everything taken
//!   so far and `open` fails with no partial state. Collection stays
//!   disabled throughout bootstrap until every root is initialized.
//! - **B** tables: heap open, empty symbol table, sentinel roots.
//! - **C** interned symbols: the syntactic keywords and primitive operator
//!   names, stored in named slots.
//! - **D** renamed symbols: a fresh uninterned twin for every keyword the
//!   expander binds hygienically.
//! - **E** root tables: globals/macros dictionaries, the attribute
//!   registry, the root checkpoint, the standard ports, the empty
//!   parameterization frame, and the `(picrin base)` / `(picrin user)`
//!   libraries.
//! - **F** collection is enabled and the feature symbols are emitted.
//! - **G** base library load: syntactic keywords are bound to their renamed
//!   forms, every subsystem initializer runs under an arena watermark, the
//!   embedded boot source is loaded, and `(picrin base)` is imported into
//!   `(picrin user)`.
//!
//! [`Interp::close`] tears down in reverse: dynamic-wind exit thunks run
//! deepest first, the symbol table and every root are cleared, a final
//! sweep reclaims the now-unreachable objects, and the heap, stacks, and
//! state container return their bytes to the allocator.

use std::fmt::Arguments;
use std::mem;
use std::rc::Rc;

use picrin_error::CoreError;
use picrin_heap::{AllocError, Allocator, Arena, Heap};
use picrin_rope::Rope;
use thiserror::Error;
use tracing::{debug, warn};

use crate::boot;
use crate::checkpoint::Checkpoint;
use crate::error::{Raised, Result};
use crate::library::{self, Library};
use crate::port::Port;
use crate::prims;
use crate::string::{Str, StrCell};
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{Blob, Dict, NativeFn, Pair, Proc, ProcKind, Record, Reg, Value, Vector};

/// Capacities of the per-instance stacks and arena.
///
/// The defaults match the classic runtime's compiled-in sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeConfig {
    /// Value stack slots.
    pub stack_size: usize,
    /// Call-info stack slots.
    pub callinfo_size: usize,
    /// Rescue (exception handler) stack slots.
    pub rescue_size: usize,
    /// GC arena root slots.
    pub arena_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> RuntimeConfig {
        RuntimeConfig { stack_size: 1024, callinfo_size: 1024, rescue_size: 30, arena_size: 1000 }
    }
}

/// One frame of the call-info stack. Filled in and consumed by the VM
/// execution loop; the lifecycle only allocates and resets the stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallInfo {
    pub argc: usize,
    pub retc: usize,
    /// Frame pointer into the value stack.
    pub fp: usize,
    /// Saved instruction pointer.
    pub ip: usize,
}

/// Bootstrap failure. No partial interpreter state survives one of these.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("bootstrap allocation failed: {0}")]
    Alloc(#[from] AllocError),
    #[error("bootstrap failed: {0}")]
    Init(#[from] Raised),
}

/// The evaluator seam.
///
/// The VM and reader live in separate crates; whatever implements this
/// trait receives the embedded boot source during bootstrap and any source
/// handed to [`Interp::load`] afterwards. With no loader installed, sources
/// queue up on the state for a later evaluator to drain.
pub trait SourceLoader {
    fn load(&mut self, interp: &mut Interp, source: &str) -> Result<()>;
}

/// Interned symbols for the syntactic keywords and primitive operators.
///
/// One slot per reserved name, so the expander and codegen never pay a
/// table lookup for them.
#[derive(Debug, Clone)]
pub struct CoreSyms {
    pub define: Symbol,
    pub lambda: Symbol,
    pub if_: Symbol,
    pub begin: Symbol,
    pub set_bang: Symbol,
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub define_syntax: Symbol,
    pub import: Symbol,
    pub export: Symbol,
    pub define_library: Symbol,
    pub in_library: Symbol,
    pub cond_expand: Symbol,
    pub and_: Symbol,
    pub or_: Symbol,
    pub else_: Symbol,
    pub library: Symbol,
    pub only: Symbol,
    pub rename: Symbol,
    pub prefix: Symbol,
    pub except: Symbol,
    pub cons: Symbol,
    pub car: Symbol,
    pub cdr: Symbol,
    pub null_p: Symbol,
    pub symbol_p: Symbol,
    pub pair_p: Symbol,
    pub add: Symbol,
    pub sub: Symbol,
    pub mul: Symbol,
    pub div: Symbol,
    pub minus: Symbol,
    pub eq: Symbol,
    pub lt: Symbol,
    pub le: Symbol,
    pub gt: Symbol,
    pub ge: Symbol,
    pub not_: Symbol,
    pub read: Symbol,
    pub file: Symbol,
    pub call: Symbol,
    pub tail_call: Symbol,
    pub gref: Symbol,
    pub lref: Symbol,
    pub cref: Symbol,
    pub return_: Symbol,
    pub call_with_values: Symbol,
    pub tailcall_with_values: Symbol,
}

impl CoreSyms {
    fn intern_all(t: &mut SymbolTable) -> CoreSyms {
        CoreSyms {
            define: t.intern("define"),
            lambda: t.intern("lambda"),
            if_: t.intern("if"),
            begin: t.intern("begin"),
            set_bang: t.intern("set!"),
            quote: t.intern("quote"),
            quasiquote: t.intern("quasiquote"),
            unquote: t.intern("unquote"),
            unquote_splicing: t.intern("unquote-splicing"),
            define_syntax: t.intern("define-syntax"),
            import: t.intern("import"),
            export: t.intern("export"),
            define_library: t.intern("define-library"),
            in_library: t.intern("in-library"),
            cond_expand: t.intern("cond-expand"),
            and_: t.intern("and"),
            or_: t.intern("or"),
            else_: t.intern("else"),
            library: t.intern("library"),
            only: t.intern("only"),
            rename: t.intern("rename"),
            prefix: t.intern("prefix"),
            except: t.intern("except"),
            cons: t.intern("cons"),
            car: t.intern("car"),
            cdr: t.intern("cdr"),
            null_p: t.intern("null?"),
            symbol_p: t.intern("symbol?"),
            pair_p: t.intern("pair?"),
            add: t.intern("+"),
            sub: t.intern("-"),
            mul: t.intern("*"),
            div: t.intern("/"),
            minus: t.intern("minus"),
            eq: t.intern("="),
            lt: t.intern("<"),
            le: t.intern("<="),
            gt: t.intern(">"),
            ge: t.intern(">="),
            not_: t.intern("not"),
            read: t.intern("read"),
            file: t.intern("file"),
            call: t.intern("call"),
            tail_call: t.intern("tail-call"),
            gref: t.intern("gref"),
            lref: t.intern("lref"),
            cref: t.intern("cref"),
            return_: t.intern("return"),
            call_with_values: t.intern("call-with-values"),
            tailcall_with_values: t.intern("tailcall-with-values"),
        }
    }
}

/// Fresh renamed (gensym'd) twins of the keywords the expander binds.
#[derive(Debug, Clone)]
pub struct RenamedSyms {
    pub define: Symbol,
    pub lambda: Symbol,
    pub if_: Symbol,
    pub begin: Symbol,
    pub set_bang: Symbol,
    pub quote: Symbol,
    pub define_syntax: Symbol,
    pub import: Symbol,
    pub export: Symbol,
    pub define_library: Symbol,
    pub in_library: Symbol,
    pub cond_expand: Symbol,
    pub cons: Symbol,
    pub car: Symbol,
    pub cdr: Symbol,
    pub null_p: Symbol,
    pub symbol_p: Symbol,
    pub pair_p: Symbol,
    pub add: Symbol,
    pub sub: Symbol,
    pub mul: Symbol,
    pub div: Symbol,
    pub eq: Symbol,
    pub lt: Symbol,
    pub le: Symbol,
    pub gt: Symbol,
    pub ge: Symbol,
    pub not_: Symbol,
    pub values: Symbol,
    pub call_with_values: Symbol,
}

impl RenamedSyms {
    fn fresh(t: &mut SymbolTable) -> RenamedSyms {
        let mut fresh = |name: &str| {
            let base = t.intern(name);
            t.gensym(&base)
        };
        RenamedSyms {
            define: fresh("define"),
            lambda: fresh("lambda"),
            if_: fresh("if"),
            begin: fresh("begin"),
            set_bang: fresh("set!"),
            quote: fresh("quote"),
            define_syntax: fresh("define-syntax"),
            import: fresh("import"),
            export: fresh("export"),
            define_library: fresh("define-library"),
            in_library: fresh("in-library"),
            cond_expand: fresh("cond-expand"),
            cons: fresh("cons"),
            car: fresh("car"),
            cdr: fresh("cdr"),
            null_p: fresh("null?"),
            symbol_p: fresh("symbol?"),
            pair_p: fresh("pair?"),
            add: fresh("+"),
            sub: fresh("-"),
            mul: fresh("*"),
            div: fresh("/"),
            eq: fresh("="),
            lt: fresh("<"),
            le: fresh("<="),
            gt: fresh(">"),
            ge: fresh(">="),
            not_: fresh("not"),
            values: fresh("values"),
            call_with_values: fresh("call-with-values"),
        }
    }
}

/// Releases phase-A charges in reverse order if bootstrap fails before the
/// state takes ownership of them.
struct RawCharges {
    alloc: Rc<dyn Allocator>,
    taken: Vec<usize>,
    armed: bool,
}

impl RawCharges {
    fn new(alloc: Rc<dyn Allocator>) -> RawCharges {
        RawCharges { alloc, taken: Vec::new(), armed: true }
    }

    fn take(&mut self, bytes: usize) -> std::result::Result<(), AllocError> {
        if !self.alloc.take(bytes) {
            return Err(AllocError { requested: bytes });
        }
        self.taken.push(bytes);
        Ok(())
    }

    fn into_sizes(mut self) -> Vec<usize> {
        self.armed = false;
        mem::take(&mut self.taken)
    }
}

impl Drop for RawCharges {
    fn drop(&mut self) {
        if self.armed {
            for &bytes in self.taken.iter().rev() {
                self.alloc.release(bytes);
            }
        }
    }
}

/// One interpreter instance: every runtime root lives here.
///
/// Instances are independent; several can coexist in one process as long as
/// no objects are shared between them. An instance must only ever be
/// touched from the thread that opened it.
pub struct Interp {
    config: RuntimeConfig,
    alloc: Rc<dyn Allocator>,
    raw_sizes: Vec<usize>,

    // VM stacks. The execution loop lives elsewhere; the lifecycle
    // allocates, resets, and frees them.
    stack: Vec<Value>,
    callinfo: Vec<CallInfo>,
    rescue: Vec<Value>,

    arena: Arena<Value>,
    heap: Heap,
    gc_enable: bool,

    syms: SymbolTable,
    core: CoreSyms,
    renamed: RenamedSyms,

    globals: Option<Rc<Dict>>,
    macros: Option<Rc<Dict>>,
    attrs: Option<Rc<Reg>>,
    features: Value,
    libs: Value,
    lib: Option<Rc<Library>>,
    ptable: Value,
    regs: Value,
    err: Option<Raised>,
    cp: Option<Rc<Checkpoint>>,

    stdin_port: Option<Rc<Port>>,
    stdout_port: Option<Rc<Port>>,
    stderr_port: Option<Rc<Port>>,

    base_lib: Option<Rc<Library>>,
    user_lib: Option<Rc<Library>>,

    loader: Option<Box<dyn SourceLoader>>,
    pending_sources: Vec<String>,

    argv: Vec<String>,
    envp: Vec<(String, String)>,

    closed: bool,
}

impl Interp {
    /// Bootstrap an interpreter with the default configuration.
    pub fn open(
        argv: Vec<String>,
        envp: Vec<(String, String)>,
        alloc: Rc<dyn Allocator>,
    ) -> std::result::Result<Interp, OpenError> {
        Interp::open_with(RuntimeConfig::default(), argv, envp, alloc, None)
    }

    /// Bootstrap with explicit configuration and an optional evaluator.
    pub fn open_with(
        config: RuntimeConfig,
        argv: Vec<String>,
        envp: Vec<(String, String)>,
        alloc: Rc<dyn Allocator>,
        loader: Option<Box<dyn SourceLoader>>,
    ) -> std::result::Result<Interp, OpenError> {
        // Phase A: raw memory. Order matters; teardown releases in reverse.
        debug!("bootstrap phase A: raw memory");
        let mut charges = RawCharges::new(alloc.clone());
        charges.take(mem::size_of::<Interp>())?;
        charges.take(config.stack_size * mem::size_of::<Value>())?;
        charges.take(config.callinfo_size * mem::size_of::<CallInfo>())?;
        charges.take(config.rescue_size * mem::size_of::<Value>())?;
        charges.take(config.arena_size * mem::size_of::<Value>())?;

        let stack = Vec::with_capacity(config.stack_size);
        let callinfo = Vec::with_capacity(config.callinfo_size);
        let rescue = Vec::with_capacity(config.rescue_size);
        let arena: Arena<Value> = Arena::with_capacity(config.arena_size);

        // Phase B: tables.
        debug!("bootstrap phase B: heap and symbol table");
        let heap = Heap::open(alloc.clone())?;
        let mut syms = SymbolTable::new();

        // Phase C: interned symbols.
        debug!("bootstrap phase C: interned symbols");
        let mark = arena.save();
        let core = CoreSyms::intern_all(&mut syms);
        arena.restore(mark);

        // Phase D: renamed symbols.
        debug!("bootstrap phase D: renamed symbols");
        let renamed = RenamedSyms::fresh(&mut syms);
        arena.restore(mark);

        let mut interp = Interp {
            config,
            alloc,
            raw_sizes: Vec::new(),
            stack,
            callinfo,
            rescue,
            arena,
            heap,
            gc_enable: false,
            syms,
            core,
            renamed,
            globals: None,
            macros: None,
            attrs: None,
            features: Value::Nil,
            libs: Value::Nil,
            lib: None,
            ptable: Value::Nil,
            regs: Value::Nil,
            err: None,
            cp: None,
            stdin_port: None,
            stdout_port: None,
            stderr_port: None,
            base_lib: None,
            user_lib: None,
            loader,
            pending_sources: Vec::new(),
            argv,
            envp,
            closed: false,
        };
        interp.raw_sizes = charges.into_sizes();

        if let Err(err) = interp.bootstrap_roots() {
            interp.close_internal();
            return Err(OpenError::Init(err));
        }
        Ok(interp)
    }

    /// Phases E through G; runs on the assembled state so initializers see
    /// the same interface user code does.
    fn bootstrap_roots(&mut self) -> Result<()> {
        // Phase E: root tables.
        debug!("bootstrap phase E: root tables, ports, libraries");
        let mark = self.arena.save();

        self.globals = Some(self.adopt(Dict::default())?);
        self.macros = Some(self.adopt(Dict::default())?);
        self.attrs = Some(self.adopt(Reg::default())?);
        let attrs_value = Value::Reg(self.attrs.clone().ok_or_else(internal_error)?);
        let regs_tail = mem::replace(&mut self.regs, Value::Nil);
        self.regs = self.cons(attrs_value, regs_tail)?;

        // Root checkpoint: depth zero, no thunks.
        self.push_checkpoint(None, None);

        self.stdin_port = Some(self.adopt(Port::standard_input())?);
        self.stdout_port = Some(self.adopt(Port::standard_output())?);
        self.stderr_port = Some(self.adopt(Port::standard_error())?);

        // Empty parameterization frame.
        let frame = Value::Dict(self.adopt(Dict::default())?);
        let ptable_tail = mem::replace(&mut self.ptable, Value::Nil);
        self.ptable = self.cons(frame, ptable_tail)?;

        let base = self.make_library("(picrin base)")?;
        let user = self.make_library("(picrin user)")?;
        self.base_lib = Some(base);
        self.user_lib = Some(user.clone());
        self.lib = Some(user);

        self.arena.restore(mark);

        // Phase F: collection on, feature detection.
        debug!("bootstrap phase F: gc enabled, feature detection");
        self.gc_enable = true;
        self.init_features()?;

        // Phase G: base library load.
        self.init_core()?;
        self.arena.restore(mark);
        Ok(())
    }

    fn init_features(&mut self) -> Result<()> {
        self.add_feature("picrin")?;
        self.add_feature("ieee-float")?;

        if cfg!(unix) {
            self.add_feature("posix")?;
            self.add_feature("unix")?;
        }
        if cfg!(windows) {
            self.add_feature("windows")?;
        }
        if cfg!(target_os = "linux") {
            self.add_feature("gnu-linux")?;
        }
        if cfg!(target_os = "freebsd") {
            self.add_feature("freebsd")?;
        }

        if cfg!(target_arch = "x86") {
            self.add_feature("i386")?;
        } else if cfg!(target_arch = "x86_64") {
            self.add_feature("x86-64")?;
        } else if cfg!(target_arch = "powerpc") {
            self.add_feature("ppc")?;
        } else if cfg!(target_arch = "sparc64") {
            self.add_feature("sparc")?;
        }

        if cfg!(target_pointer_width = "32") {
            self.add_feature("ilp32")?;
        } else if cfg!(target_pointer_width = "64") {
            self.add_feature("lp64")?;
        }

        if cfg!(target_endian = "little") {
            self.add_feature("little-endian")?;
        } else {
            self.add_feature("big-endian")?;
        }
        Ok(())
    }

    fn init_core(&mut self) -> Result<()> {
        debug!("bootstrap phase G: base library load");
        let base = self.base_lib.clone().ok_or_else(internal_error)?;
        let prev = self.lib.take();
        self.lib = Some(base.clone());

        let mark = self.arena.save();
        let keywords = [
            (self.core.define.clone(), self.renamed.define.clone()),
            (self.core.set_bang.clone(), self.renamed.set_bang.clone()),
            (self.core.quote.clone(), self.renamed.quote.clone()),
            (self.core.lambda.clone(), self.renamed.lambda.clone()),
            (self.core.if_.clone(), self.renamed.if_.clone()),
            (self.core.begin.clone(), self.renamed.begin.clone()),
            (self.core.define_syntax.clone(), self.renamed.define_syntax.clone()),
        ];
        for (sym, rename) in keywords {
            self.define_syntactic_keyword(&base, &sym, &rename);
        }

        prims::init_all(self)?;

        self.load_source(&boot::source())?;
        self.arena.restore(mark);

        self.lib = prev;
        self.import_library(&base)?;
        Ok(())
    }

    // --- allocation and construction ---

    pub(crate) fn adopt<T: picrin_heap::HeapObject>(&self, object: T) -> Result<Rc<T>> {
        self.heap.adopt(object).map_err(Raised::from)
    }

    /// Allocate a pair. The fresh value is anchored on the GC arena until
    /// the caller's watermark is restored.
    pub fn cons(&self, car: Value, cdr: Value) -> Result<Value> {
        let pair = self.adopt(Pair {
            car: std::cell::RefCell::new(car),
            cdr: std::cell::RefCell::new(cdr),
        })?;
        let value = Value::Pair(pair);
        self.arena.push(value.clone());
        Ok(value)
    }

    pub fn make_dict(&self) -> Result<Value> {
        let dict = self.adopt(Dict::default())?;
        let value = Value::Dict(dict);
        self.arena.push(value.clone());
        Ok(value)
    }

    pub fn make_vector(&self, len: usize, fill: Value) -> Result<Value> {
        let vector = self.adopt(Vector { elems: std::cell::RefCell::new(vec![fill; len]) })?;
        let value = Value::Vector(vector);
        self.arena.push(value.clone());
        Ok(value)
    }

    pub fn make_blob(&self, len: usize, fill: u8) -> Result<Value> {
        let blob = self.adopt(Blob { data: std::cell::RefCell::new(vec![fill; len]) })?;
        let value = Value::Blob(blob);
        self.arena.push(value.clone());
        Ok(value)
    }

    pub fn make_reg(&self) -> Result<Value> {
        let reg = self.adopt(Reg::default())?;
        let value = Value::Reg(reg);
        self.arena.push(value.clone());
        Ok(value)
    }

    pub fn make_record(&self, rtype: Value) -> Result<Value> {
        let record = self.adopt(Record { rtype, fields: std::cell::RefCell::new(Default::default()) })?;
        let value = Value::Record(record);
        self.arena.push(value.clone());
        Ok(value)
    }

    /// Wrap a rope in a fresh string value.
    pub fn make_str(&self, rope: Rope) -> Result<Value> {
        let cell = self.adopt(StrCell::new(rope))?;
        let value = Value::Str(Str::from_cell(cell));
        self.arena.push(value.clone());
        Ok(value)
    }

    /// A string value copying `bytes`. Empty input shares the static empty
    /// string instead of allocating a buffer.
    pub fn str_value(&self, bytes: &[u8]) -> Result<Value> {
        if bytes.is_empty() {
            return self.lit_value("");
        }
        self.make_str(Rope::from_bytes(bytes))
    }

    /// A string value borrowing a literal. Never copies.
    pub fn lit_value(&self, text: &'static str) -> Result<Value> {
        self.make_str(Rope::from_literal(text))
    }

    /// A string value from format arguments: `interp.strf(format_args!(...))`.
    pub fn strf(&self, fmt: Arguments<'_>) -> Result<Value> {
        self.str_value(std::fmt::format(fmt).as_bytes())
    }

    /// A parameter object holding `value`.
    pub fn make_parameter(&mut self, value: Value) -> Result<Value> {
        let name = self.intern("parameter");
        let proc = self.adopt(Proc {
            name,
            kind: ProcKind::Parameter(std::cell::RefCell::new(value)),
        })?;
        let value = Value::Proc(proc);
        self.arena.push(value.clone());
        Ok(value)
    }

    // --- symbols ---

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.syms.intern(name)
    }

    pub fn gensym(&self, base: &Symbol) -> Symbol {
        self.syms.gensym(base)
    }

    pub fn core_syms(&self) -> &CoreSyms {
        &self.core
    }

    pub fn renamed_syms(&self) -> &RenamedSyms {
        &self.renamed
    }

    pub fn symbol_count(&self) -> usize {
        self.syms.len()
    }

    // --- libraries ---

    /// Create a library from a textual spec such as `"(picrin base)"` and
    /// register it on the library list.
    pub fn make_library(&mut self, spec: &str) -> Result<Rc<Library>> {
        let words = library::parse_spec(spec).map_err(Raised::from)?;
        let canonical = format!("({})", words.join(" "));
        if self.find_library(&canonical).is_some() {
            return Err(Raised::new(CoreError::bad_argument(format!(
                "library already exists: {canonical}"
            ))));
        }

        let mut name = Value::Nil;
        for word in words.iter().rev() {
            let sym = self.intern(word);
            name = self.cons(Value::Sym(sym), name)?;
        }
        let lib = self.adopt(Library {
            name,
            env: std::cell::RefCell::new(Default::default()),
            exports: std::cell::RefCell::new(Default::default()),
        })?;

        let value = Value::Lib(lib.clone());
        self.arena.push(value.clone());
        let tail = mem::replace(&mut self.libs, Value::Nil);
        self.libs = self.cons(value, tail)?;
        Ok(lib)
    }

    /// Look a library up by its rendered name.
    pub fn find_library(&self, spec: &str) -> Option<Rc<Library>> {
        let mut cursor = self.libs.clone();
        while let Value::Pair(pair) = cursor {
            let car = pair.car.borrow().clone();
            if let Value::Lib(lib) = car {
                if lib.name_string() == spec {
                    return Some(lib);
                }
            }
            let next = pair.cdr.borrow().clone();
            cursor = next;
        }
        None
    }

    /// Copy `lib`'s exports into the current library's environment.
    pub fn import_library(&self, lib: &Rc<Library>) -> Result<()> {
        let current = self.lib.as_ref().ok_or_else(internal_error)?;
        let exports = lib.exports.borrow();
        let mut env = current.env.borrow_mut();
        for (sym, rename) in exports.iter() {
            env.insert(sym.clone(), rename.clone());
        }
        Ok(())
    }

    /// Bind `sym` to its renamed form in `lib`'s environment and exports.
    pub fn define_syntactic_keyword(&self, lib: &Rc<Library>, sym: &Symbol, rename: &Symbol) {
        lib.env.borrow_mut().insert(sym.clone(), rename.clone());
        lib.exports.borrow_mut().insert(sym.clone(), rename.clone());
    }

    pub fn current_library(&self) -> Option<Rc<Library>> {
        self.lib.clone()
    }

    pub fn set_current_library(&mut self, lib: Rc<Library>) {
        self.lib = Some(lib);
    }

    // --- procedures ---

    /// Define a native procedure in the current library under `name`.
    pub fn defun(&mut self, name: &str, f: NativeFn) -> Result<Value> {
        let sym = self.intern(name);
        let rename = self.syms.gensym(&sym);
        let proc = self.adopt(Proc { name: sym.clone(), kind: ProcKind::Native(f) })?;
        let value = Value::Proc(proc);
        self.arena.push(value.clone());

        let globals = self.globals.as_ref().ok_or_else(internal_error)?;
        globals.map.borrow_mut().insert(rename.clone(), value.clone());
        if let Some(lib) = &self.lib {
            lib.env.borrow_mut().insert(sym.clone(), rename.clone());
            lib.exports.borrow_mut().insert(sym, rename);
        }
        Ok(value)
    }

    /// Resolve `name` through the current library's environment to its
    /// global binding.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        let sym = self.syms.get(name)?;
        let lib = self.lib.as_ref()?;
        let rename = lib.env.borrow().get(&sym).cloned()?;
        let globals = self.globals.as_ref()?;
        let found = globals.map.borrow().get(&rename).cloned();
        found
    }

    /// Apply a procedure value to arguments.
    ///
    /// Restores the arena watermark around the call and re-anchors the
    /// result, so native procedures can allocate intermediates freely.
    pub fn apply(&mut self, proc: &Value, argv: &[Value]) -> Result<Value> {
        let Value::Proc(p) = proc else {
            let raised = Raised::with_irritants(
                CoreError::TypeMismatch { expected: "procedure", found: proc.type_name() },
                vec![proc.clone()],
            );
            self.err = Some(raised.clone());
            return Err(raised);
        };
        let p = p.clone();

        let mark = self.arena.save();
        let outcome = match &p.kind {
            ProcKind::Native(f) => f(self, argv),
            ProcKind::Parameter(cell) => match argv.len() {
                0 => Ok(cell.borrow().clone()),
                1 => {
                    *cell.borrow_mut() = argv[0].clone();
                    Ok(Value::Undef)
                }
                got => Err(Raised::new(CoreError::ArityMismatch { required: 1, got })),
            },
        };
        self.arena.restore(mark);

        match outcome {
            Ok(value) => {
                self.arena.push(value.clone());
                Ok(value)
            }
            Err(raised) => {
                self.err = Some(raised.clone());
                Err(raised)
            }
        }
    }

    /// Resolve and apply in one step.
    pub fn call(&mut self, name: &str, argv: &[Value]) -> Result<Value> {
        match self.resolve(name) {
            Some(proc) => self.apply(&proc, argv),
            None => Err(self.raise(
                CoreError::bad_argument(format!("unbound variable: {name}")),
                Vec::new(),
            )),
        }
    }

    // --- error channel ---

    /// Raise a condition: records it in the error slot and returns the
    /// raised value for propagation with `?`.
    pub fn raise(&mut self, error: CoreError, irritants: Vec<Value>) -> Raised {
        let raised = Raised::with_irritants(error, irritants);
        self.err = Some(raised.clone());
        raised
    }

    /// The most recently raised error, until handled or cleared.
    pub fn last_error(&self) -> Option<&Raised> {
        self.err.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.err = None;
    }

    // --- features ---

    /// Push an interned feature symbol onto the feature list.
    pub fn add_feature(&mut self, name: &str) -> Result<()> {
        let sym = self.intern(name);
        let tail = mem::replace(&mut self.features, Value::Nil);
        self.features = self.cons(Value::Sym(sym), tail)?;
        Ok(())
    }

    pub fn features(&self) -> &Value {
        &self.features
    }

    pub(crate) fn push_reg(&mut self, reg: Value) -> Result<()> {
        let tail = mem::replace(&mut self.regs, Value::Nil);
        self.regs = self.cons(reg, tail)?;
        Ok(())
    }

    pub(crate) fn attrs(&self) -> Option<Rc<Reg>> {
        self.attrs.clone()
    }

    pub(crate) fn libs(&self) -> &Value {
        &self.libs
    }

    // --- roots consumed by the expander and collector layers ---

    pub fn globals_dict(&self) -> Option<Rc<Dict>> {
        self.globals.clone()
    }

    pub fn macros_dict(&self) -> Option<Rc<Dict>> {
        self.macros.clone()
    }

    /// The parameterization stack: a list of dictionaries, innermost first.
    pub fn parameterization(&self) -> &Value {
        &self.ptable
    }

    /// The registry list, the attribute registry included.
    pub fn registries(&self) -> &Value {
        &self.regs
    }

    pub fn base_library(&self) -> Option<Rc<Library>> {
        self.base_lib.clone()
    }

    pub fn user_library(&self) -> Option<Rc<Library>> {
        self.user_lib.clone()
    }

    // --- gc ---

    /// Run a collection cycle, unless collection is disabled.
    pub fn gc_run(&mut self) -> usize {
        if !self.gc_enable {
            return 0;
        }
        self.heap.sweep()
    }

    pub fn gc_enabled(&self) -> bool {
        self.gc_enable
    }

    pub fn arena_save(&self) -> usize {
        self.arena.save()
    }

    pub fn arena_restore(&self, mark: usize) {
        self.arena.restore(mark);
    }

    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    // --- checkpoints ---

    pub fn push_checkpoint(&mut self, in_thunk: Option<Value>, out_thunk: Option<Value>) {
        let prev = self.cp.clone();
        let depth = prev.as_ref().map_or(0, |cp| cp.depth + 1);
        self.cp = Some(Rc::new(Checkpoint { prev, depth, in_thunk, out_thunk }));
    }

    pub fn pop_checkpoint(&mut self) {
        if let Some(cp) = self.cp.take() {
            self.cp = cp.prev.clone();
        }
    }

    pub fn checkpoint_depth(&self) -> Option<usize> {
        self.cp.as_ref().map(|cp| cp.depth)
    }

    // --- sources ---

    /// Feed source text to the installed evaluator, or queue it when none
    /// is installed yet.
    pub fn load(&mut self, source: &str) -> Result<()> {
        self.load_source(source)
    }

    fn load_source(&mut self, source: &str) -> Result<()> {
        if let Some(mut loader) = self.loader.take() {
            let outcome = loader.load(self, source);
            self.loader = Some(loader);
            outcome
        } else {
            debug!("no evaluator installed; queuing {} bytes of source", source.len());
            self.pending_sources.push(source.to_owned());
            Ok(())
        }
    }

    pub fn set_source_loader(&mut self, loader: Box<dyn SourceLoader>) {
        self.loader = Some(loader);
    }

    /// Hand queued sources to a newly attached evaluator.
    pub fn drain_pending_sources(&mut self) -> Vec<String> {
        mem::take(&mut self.pending_sources)
    }

    // --- plumbing accessors ---

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn envp(&self) -> &[(String, String)] {
        &self.envp
    }

    pub fn stdin_port(&self) -> Option<Rc<Port>> {
        self.stdin_port.clone()
    }

    pub fn stdout_port(&self) -> Option<Rc<Port>> {
        self.stdout_port.clone()
    }

    pub fn stderr_port(&self) -> Option<Rc<Port>> {
        self.stderr_port.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn value_stack_capacity(&self) -> usize {
        self.stack.capacity()
    }

    pub fn callinfo_capacity(&self) -> usize {
        self.callinfo.capacity()
    }

    pub fn rescue_capacity(&self) -> usize {
        self.rescue.capacity()
    }

    // --- teardown ---

    /// Tear the instance down now instead of at drop.
    pub fn close(mut self) {
        self.close_internal();
    }

    fn close_internal(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // 1. Dynamic-wind exit thunks, deepest first.
        debug!("teardown: running dynamic-wind exit thunks");
        let mut cursor = self.cp.take();
        while let Some(frame) = cursor {
            if let Some(out) = frame.out_thunk.clone() {
                if let Err(raised) = self.apply(&out, &[]) {
                    warn!("dynamic-wind exit thunk raised during close: {raised}");
                }
            }
            cursor = frame.prev.clone();
        }

        // 2. Symbol table: names are released exactly once, here.
        self.syms.clear();

        // 3. Clear every root back to its sentinel.
        self.stack.clear();
        self.callinfo.clear();
        self.rescue.clear();
        self.arena.restore(0);
        self.err = None;
        self.globals = None;
        self.macros = None;
        self.attrs = None;
        self.features = Value::Nil;
        self.libs = Value::Nil;
        self.lib = None;
        self.base_lib = None;
        self.user_lib = None;
        self.ptable = Value::Nil;
        self.regs = Value::Nil;
        self.stdin_port = None;
        self.stdout_port = None;
        self.stderr_port = None;
        self.loader = None;
        self.pending_sources.clear();

        // 4. Every object is unreachable now; reclaim the accounting.
        self.heap.sweep();

        // 5. Close the heap (the evaluator seam has nothing to close).
        self.heap.close();

        // 6-8. Return the raw buffers and the state container.
        for &bytes in self.raw_sizes.iter().skip(1).rev() {
            self.alloc.release(bytes);
        }
        if let Some(&state_bytes) = self.raw_sizes.first() {
            self.alloc.release(state_bytes);
        }
        self.raw_sizes.clear();
        debug!("teardown complete");
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        self.close_internal();
    }
}

fn internal_error() -> Raised {
    Raised::new(CoreError::bad_argument("interpreter state is not fully initialized"))
}

impl std::fmt::Debug for Interp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interp")
            .field("gc_enable", &self.gc_enable)
            .field("symbols", &self.syms.len())
            .field("live_objects", &self.heap.live_objects())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_classic_sizes() {
        let config = RuntimeConfig::default();
        assert_eq!(config.stack_size, 1024);
        assert_eq!(config.callinfo_size, 1024);
        assert_eq!(config.rescue_size, 30);
        assert_eq!(config.arena_size, 1000);
    }
}
