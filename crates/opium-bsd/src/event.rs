//! Ordered multi-subscriber callback registry.
//!
//! Callbacks run synchronously on the caller's stack, in registration order.
//!
//! # Re-entrancy
//!
//! `notify` holds `&mut self` for its whole duration, so a callback cannot
//! subscribe or unsubscribe on the same handler directly. When the handler is
//! shared behind a `RefCell` (as the device table does), doing so from inside
//! a callback panics with a borrow error. Callers must not mutate a handler
//! while it is notifying.

use alloc::boxed::Box;
use alloc::vec::Vec;

/// Stable handle returned by [`EventHandler::add`].
pub type HandlerId = u32;

struct Entry<T: ?Sized> {
    id: HandlerId,
    callback: Box<dyn FnMut(&T)>,
}

/// Ordered list of callbacks taking `&T`.
pub struct EventHandler<T: ?Sized> {
    entries: Vec<Entry<T>>,
    next_id: HandlerId,
}

impl<T: ?Sized> Default for EventHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> EventHandler<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a callback. The returned ID is never reused.
    pub fn add<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut(&T) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Unregister a callback. Returns false if the ID was unknown.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Invoke every registered callback with `args`.
    pub fn notify(&mut self, args: &T) {
        for entry in self.entries.iter_mut() {
            (entry.callback)(args);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
