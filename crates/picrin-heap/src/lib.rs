//! Memory layer of the Picrin runtime: the injectable allocator seam, the
//! object heap the collector manages, and the GC arena that anchors freshly
//! created objects while native code is still assembling a result.
//!
//! The runtime is single threaded per interpreter instance; all interior
//! mutability here is `Cell`/`RefCell`.

mod alloc;
mod arena;
mod heap;

pub use alloc::{AllocError, Allocator, CountingAllocator, SystemAllocator};
pub use arena::Arena;
pub use heap::{Heap, HeapObject};
