use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// A fixed-capacity FIFO handing items between threads.
///
/// `push` blocks while the queue is full and `pop` blocks while it is empty,
/// so a fast producer is held back instead of buffering without bound.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    /// Signalled when space frees up.
    push_ready: Condvar,
    /// Signalled when an item arrives.
    pop_ready: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        BoundedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            push_ready: Condvar::new(),
            pop_ready: Condvar::new(),
        }
    }

    /// Append an item, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            self.push_ready.wait(&mut items);
        }
        items.push_back(item);
        self.pop_ready.notify_one();
    }

    /// Take the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.push_ready.notify_one();
                return item;
            }
            self.pop_ready.wait(&mut items);
        }
    }

    /// Take the oldest item if one is buffered; never blocks.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.items.lock();
        let item = items.pop_front();
        if item.is_some() {
            self.push_ready.notify_one();
        }
        item
    }

    /// Discard all buffered items, releasing any blocked producers.
    pub fn clear(&self) {
        let mut items = self.items.lock();
        items.clear();
        self.push_ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
