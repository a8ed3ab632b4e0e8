//! The GC arena: a bounded root stack anchoring freshly created objects.
//!
//! Native code that builds a compound result allocates intermediates faster
//! than it can root them anywhere the collector sees. Each such allocation
//! is pushed here; the caller snapshots the high-water mark with
//! [`Arena::save`] beforehand and rewinds with [`Arena::restore`] once the
//! result is safely held elsewhere.

use std::cell::RefCell;

use tracing::debug;

/// Bounded stack of strong references with save/restore watermarks.
///
/// The capacity is a soft bound: overflow grows the stack rather than
/// failing, since bootstrap already brackets every batch of allocations with
/// a watermark and real pressure stays far below the configured size.
#[derive(Debug)]
pub struct Arena<T> {
    slots: RefCell<Vec<T>>,
    capacity: usize,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Arena<T> {
        Arena { slots: RefCell::new(Vec::with_capacity(capacity)), capacity }
    }

    /// Anchor a value until the enclosing watermark is restored.
    pub fn push(&self, value: T) {
        let mut slots = self.slots.borrow_mut();
        if slots.len() == self.capacity {
            debug!("gc arena grew past its configured capacity of {}", self.capacity);
        }
        slots.push(value);
    }

    /// Current high-water mark.
    pub fn save(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Rewind to a previously saved mark, dropping everything above it.
    pub fn restore(&self, mark: usize) {
        self.slots.borrow_mut().truncate(mark);
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_restore_rewind_the_stack() {
        let arena: Arena<i32> = Arena::with_capacity(8);
        arena.push(1);
        let mark = arena.save();
        arena.push(2);
        arena.push(3);
        assert_eq!(arena.len(), 3);
        arena.restore(mark);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn overflow_grows_instead_of_failing() {
        let arena: Arena<u8> = Arena::with_capacity(2);
        for i in 0..5 {
            arena.push(i);
        }
        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn restore_drops_anchored_values() {
        use std::rc::Rc;

        let arena: Arena<Rc<str>> = Arena::with_capacity(4);
        let value: Rc<str> = Rc::from("anchored");
        arena.push(value.clone());
        assert_eq!(Rc::strong_count(&value), 2);
        arena.restore(0);
        assert_eq!(Rc::strong_count(&value), 1);
    }
}
