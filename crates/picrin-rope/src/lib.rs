//! Persistent rope engine backing Picrin Scheme strings.
//!
//! A [`Rope`] is an immutable, cheaply clonable byte string built from three
//! leaf shapes and one interior shape:
//!
//! - an *owned* leaf carrying its own buffer,
//! - a *literal* leaf borrowing program-static storage,
//! - a *slice* leaf borrowing a range of another owned buffer,
//! - a *branch* concatenating two child ropes.
//!
//! Concatenation is O(1) and never copies. Slicing is O(depth) and shares
//! the underlying buffers. [`Rope::flatten`] materializes a contiguous view
//! of the bytes and, while doing so, rewrites every branch it visits into a
//! slice over the materialized buffer, so a second flatten of the same rope
//! (or of any subtree it passed through) is O(1) and allocation-free.
//!
//! Sharing is plain reference counting (`Rc`); the runtime is single
//! threaded per interpreter instance, so no atomics are involved. Cloning a
//! `Rope` is the incref, dropping it is the decref, and dropping the last
//! handle releases children and buffers recursively.
//!
//! # Usage
//!
//! ```
//! use picrin_rope::Rope;
//!
//! let hello = Rope::from_bytes(b"hello");
//! let world = Rope::from_literal(" world");
//! let both = hello.concat(&world);
//! assert_eq!(both.len(), 11);
//! assert_eq!(&*both.flatten(), b"hello world");
//!
//! let sub = both.slice(6, 11);
//! assert_eq!(&*sub.flatten(), b"world");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

thread_local! {
    static LIVE_NODES: Cell<usize> = const { Cell::new(0) };
}

/// Number of rope nodes currently alive on this thread.
///
/// Every constructor increments the count and every node release decrements
/// it, so a balanced sequence of operations returns the counter to its
/// starting value. Used by leak tests in place of a counting allocator.
pub fn live_node_count() -> usize {
    LIVE_NODES.with(|c| c.get())
}

/// An immutable, shareable byte string.
///
/// Cloning a `Rope` is one refcount bump; all heavy data is shared.
#[derive(Clone)]
pub struct Rope {
    node: Rc<Node>,
}

struct Node {
    /// Total byte length of the string this node represents.
    weight: usize,
    /// Interior mutability is needed only for flatten's path compression,
    /// which rewrites a branch into a slice with identical contents.
    seg: RefCell<Seg>,
}

enum Seg {
    /// Inline buffer of `weight + 1` bytes; the final byte is always NUL.
    Owned(Rc<[u8]>),
    /// Borrowed program-static storage, exactly `weight` bytes.
    Literal(&'static [u8]),
    /// Borrowed range of another owned buffer. Holding the `Rc` is what
    /// keeps the owner alive.
    Slice { owner: Rc<[u8]>, start: usize },
    /// Concatenation of two children.
    Branch { left: Rope, right: Rope },
}

impl Node {
    fn make(weight: usize, seg: Seg) -> Rc<Node> {
        LIVE_NODES.with(|c| c.set(c.get() + 1));
        Rc::new(Node { weight, seg: RefCell::new(seg) })
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        LIVE_NODES.with(|c| c.set(c.get() - 1));
    }
}

impl Rope {
    /// Copy `bytes` into a fresh owned leaf.
    pub fn from_bytes(bytes: &[u8]) -> Rope {
        let mut buf = Vec::with_capacity(bytes.len() + 1);
        buf.extend_from_slice(bytes);
        buf.push(0);
        Rope { node: Node::make(bytes.len(), Seg::Owned(buf.into())) }
    }

    /// Owned leaf of `len` copies of `byte`.
    ///
    /// This is the allocate-then-fill path behind `make-string` and
    /// `string-fill!`.
    pub fn filled(len: usize, byte: u8) -> Rope {
        let mut buf = vec![byte; len + 1];
        buf[len] = 0;
        Rope { node: Node::make(len, Seg::Owned(buf.into())) }
    }

    /// Leaf borrowing a string literal. Never copies.
    pub fn from_literal(text: &'static str) -> Rope {
        Rope { node: Node::make(text.len(), Seg::Literal(text.as_bytes())) }
    }

    /// Byte length of the represented string.
    pub fn len(&self) -> usize {
        self.node.weight
    }

    pub fn is_empty(&self) -> bool {
        self.node.weight == 0
    }

    /// Concatenate without copying. The result holds a reference to each
    /// operand; depth is unbounded and only [`Rope::flatten`] rebalances.
    pub fn concat(&self, other: &Rope) -> Rope {
        let weight = self.node.weight + other.node.weight;
        Rope { node: Node::make(weight, Seg::Branch { left: self.clone(), right: other.clone() }) }
    }

    /// The substring covering byte range `start..end`.
    ///
    /// Requires `start <= end <= self.len()`; callers validate Scheme-level
    /// ranges before reaching this point. A full-range slice returns a new
    /// handle to the same node. Slicing a leaf yields a borrowed leaf over
    /// the ultimate owning buffer, so chains of slices never stack up
    /// indirection.
    pub fn slice(&self, start: usize, end: usize) -> Rope {
        debug_assert!(start <= end && end <= self.node.weight);

        if start == 0 && end == self.node.weight {
            return self.clone();
        }

        let weight = end - start;
        let seg = self.node.seg.borrow();
        match &*seg {
            Seg::Owned(buf) => {
                Rope { node: Node::make(weight, Seg::Slice { owner: buf.clone(), start }) }
            }
            Seg::Literal(bytes) => {
                Rope { node: Node::make(weight, Seg::Literal(&bytes[start..end])) }
            }
            Seg::Slice { owner, start: base } => {
                Rope { node: Node::make(weight, Seg::Slice { owner: owner.clone(), start: base + start }) }
            }
            Seg::Branch { left, right } => {
                let lw = left.node.weight;
                if end <= lw {
                    left.slice(start, end)
                } else if lw <= start {
                    right.slice(start - lw, end - lw)
                } else {
                    let l = left.slice(start, lw);
                    let r = right.slice(0, end - lw);
                    l.concat(&r)
                }
            }
        }
    }

    /// A contiguous view of all bytes.
    ///
    /// Leaves are already contiguous and return in O(1). A branch root
    /// materializes one owned buffer (with a trailing NUL, like every owned
    /// buffer) and rewrites each branch node visited into a slice over it at
    /// the offset where its subtree landed. The rewrite preserves the
    /// observable byte sequence and the node's weight, so repeated flattens
    /// allocate nothing.
    pub fn flatten(&self) -> FlatBytes {
        {
            let seg = self.node.seg.borrow();
            match &*seg {
                Seg::Owned(buf) => {
                    return FlatBytes {
                        repr: Repr::Shared { buf: buf.clone(), start: 0, len: self.node.weight },
                    };
                }
                Seg::Literal(bytes) => return FlatBytes { repr: Repr::Literal(bytes) },
                Seg::Slice { owner, start } => {
                    return FlatBytes {
                        repr: Repr::Shared { buf: owner.clone(), start: *start, len: self.node.weight },
                    };
                }
                Seg::Branch { .. } => {}
            }
        }

        let mut out = vec![0u8; self.node.weight + 1];
        let mut branches = Vec::new();
        copy_out(self, &mut out, &mut branches);
        let buf: Rc<[u8]> = out.into();

        // Path compression: every branch becomes a slice into the
        // materialized buffer. The former children drop here.
        for (rope, offset) in branches {
            *rope.node.seg.borrow_mut() = Seg::Slice { owner: buf.clone(), start: offset };
        }

        FlatBytes { repr: Repr::Shared { buf, start: 0, len: self.node.weight } }
    }

    /// Strong count on the underlying node. Test support for refcount
    /// balance checks.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.node)
    }

    /// Whether two handles designate the same node.
    pub fn ptr_eq(a: &Rope, b: &Rope) -> bool {
        Rc::ptr_eq(&a.node, &b.node)
    }
}

impl Default for Rope {
    fn default() -> Rope {
        Rope::from_literal("")
    }
}

impl fmt::Debug for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &*self.node.seg.borrow() {
            Seg::Owned(_) => "owned",
            Seg::Literal(_) => "literal",
            Seg::Slice { .. } => "slice",
            Seg::Branch { .. } => "branch",
        };
        write!(f, "Rope({shape}, {} bytes)", self.node.weight)
    }
}

// Iterative walk: concatenation never rebalances, so chains of appends can
// be deeper than the native stack allows.
fn copy_out(root: &Rope, out: &mut [u8], branches: &mut Vec<(Rope, usize)>) {
    let mut work = vec![(root.clone(), 0usize)];
    while let Some((rope, offset)) = work.pop() {
        let weight = rope.node.weight;
        let children = {
            let seg = rope.node.seg.borrow();
            match &*seg {
                Seg::Owned(buf) => {
                    out[offset..offset + weight].copy_from_slice(&buf[..weight]);
                    None
                }
                Seg::Literal(bytes) => {
                    out[offset..offset + weight].copy_from_slice(bytes);
                    None
                }
                Seg::Slice { owner, start } => {
                    out[offset..offset + weight].copy_from_slice(&owner[*start..*start + weight]);
                    None
                }
                Seg::Branch { left, right } => Some((left.clone(), right.clone())),
            }
        };
        if let Some((left, right)) = children {
            let lw = left.node.weight;
            work.push((right, offset + lw));
            work.push((left, offset));
            branches.push((rope, offset));
        }
    }
}

/// Contiguous bytes produced by [`Rope::flatten`].
///
/// Holds a reference to the backing storage, so the view stays valid for as
/// long as the value lives, independent of the rope it came from.
pub struct FlatBytes {
    repr: Repr,
}

enum Repr {
    Shared { buf: Rc<[u8]>, start: usize, len: usize },
    Literal(&'static [u8]),
}

impl FlatBytes {
    pub fn as_bytes(&self) -> &[u8] {
        self
    }

    /// True when the backing buffer carries a NUL byte immediately after the
    /// content, which makes C-string handoff copy-free.
    pub fn is_nul_terminated(&self) -> bool {
        match &self.repr {
            Repr::Shared { buf, start, len } => buf.get(start + len) == Some(&0),
            Repr::Literal(_) => false,
        }
    }
}

impl Deref for FlatBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.repr {
            Repr::Shared { buf, start, len } => &buf[*start..*start + *len],
            Repr::Literal(bytes) => bytes,
        }
    }
}

impl AsRef<[u8]> for FlatBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for FlatBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlatBytes({} bytes)", self.len())
    }
}
