//! The object heap.
//!
//! Reference counts in this runtime are precise, so the heap does not trace:
//! it is the registry the collector interface is built on. Every Scheme
//! object is adopted here at birth, its size charged to the allocator; a
//! sweep discards registry entries whose object has since died and returns
//! their bytes. Teardown clears the roots first, so the final sweep observes
//! every object dead and the allocator ledger returns to zero.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::alloc::{AllocError, Allocator};

/// Fixed charge for the heap's own bookkeeping structures.
const HEAP_FOOTPRINT: usize = 16 * 1024;

/// Marker for types whose instances live on the interpreter heap.
pub trait HeapObject: Any {}

/// Registry of live heap objects with byte accounting.
pub struct Heap {
    alloc: Rc<dyn Allocator>,
    entries: RefCell<Vec<(Weak<dyn HeapObject>, usize)>>,
    closed: Cell<bool>,
}

impl Heap {
    /// Open a heap against an allocator, charging the bookkeeping footprint.
    pub fn open(alloc: Rc<dyn Allocator>) -> Result<Heap, AllocError> {
        if !alloc.take(HEAP_FOOTPRINT) {
            return Err(AllocError { requested: HEAP_FOOTPRINT });
        }
        Ok(Heap { alloc, entries: RefCell::new(Vec::new()), closed: Cell::new(false) })
    }

    /// Move `object` onto the heap, returning the shared handle.
    ///
    /// The object's size is charged to the allocator up front and returned
    /// by the sweep that first observes the object dead.
    pub fn adopt<T: HeapObject>(&self, object: T) -> Result<Rc<T>, AllocError> {
        let size = mem::size_of::<T>();
        if !self.alloc.take(size) {
            return Err(AllocError { requested: size });
        }
        let handle = Rc::new(object);
        let tracked: Rc<dyn HeapObject> = handle.clone();
        self.entries.borrow_mut().push((Rc::downgrade(&tracked), size));
        Ok(handle)
    }

    /// One collection cycle: discard entries for dead objects and return
    /// their bytes to the allocator. Returns the number of objects
    /// reclaimed.
    pub fn sweep(&self) -> usize {
        let mut reclaimed = 0usize;
        let mut bytes = 0usize;
        self.entries.borrow_mut().retain(|(weak, size)| {
            if weak.strong_count() == 0 {
                reclaimed += 1;
                bytes += size;
                false
            } else {
                true
            }
        });
        if bytes > 0 {
            self.alloc.release(bytes);
        }
        debug!("heap sweep reclaimed {reclaimed} objects ({bytes} bytes)");
        reclaimed
    }

    /// Number of registered objects still strongly referenced.
    pub fn live_objects(&self) -> usize {
        self.entries.borrow().iter().filter(|(weak, _)| weak.strong_count() > 0).count()
    }

    /// Release all accounting and mark the heap closed. Objects still
    /// strongly referenced at this point are a caller bug; their bytes are
    /// returned regardless, matching a heap whose pages are being freed.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let survivors = self.live_objects();
        if survivors > 0 {
            warn!("heap closed with {survivors} objects still referenced");
        }
        let bytes: usize = self.entries.borrow().iter().map(|(_, size)| size).sum();
        if bytes > 0 {
            self.alloc.release(bytes);
        }
        self.entries.borrow_mut().clear();
        self.alloc.release(HEAP_FOOTPRINT);
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("entries", &self.entries.borrow().len())
            .field("closed", &self.closed.get())
            .finish()
    }
}
