//! Bounded drop-oldest buffer bridging device threads and the scheduler.
//!
//! The producer never blocks: when the buffer is full the oldest entry is
//! evicted. This is the only channel between the capture threads and the
//! async domain.

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct DropOldestBuffer<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> DropOldestBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Push a value, evicting the oldest when full. Returns `true` if an
    /// entry was evicted.
    pub fn push(&self, value: T) -> bool {
        let mut inner = self.inner.lock().expect("buffer lock poisoned");
        let evicted = if inner.len() >= self.capacity {
            inner.pop_front();
            true
        } else {
            false
        };
        inner.push_back(value);
        evicted
    }

    /// Pop the oldest entry, if any.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().expect("buffer lock poisoned").pop_front()
    }

    /// Drain up to `max` of the oldest entries.
    pub fn drain_up_to(&self, max: usize) -> Vec<T> {
        let mut inner = self.inner.lock().expect("buffer lock poisoned");
        let take = max.min(inner.len());
        inner.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_fifo() {
        let buffer = DropOldestBuffer::new(4);
        for i in 0..4 {
            assert!(!buffer.push(i));
        }
        assert_eq!(buffer.try_pop(), Some(0));
        assert_eq!(buffer.try_pop(), Some(1));
    }

    #[test]
    fn overflow_drops_oldest() {
        let buffer = DropOldestBuffer::new(3);
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        assert!(buffer.push(4));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.try_pop(), Some(2));
    }

    #[test]
    fn drain_takes_oldest_first() {
        let buffer = DropOldestBuffer::new(10);
        for i in 0..6 {
            buffer.push(i);
        }
        let drained = buffer.drain_up_to(4);
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn producer_thread_never_blocks() {
        use std::sync::Arc;

        let buffer = Arc::new(DropOldestBuffer::new(8));
        let producer = Arc::clone(&buffer);
        let handle = std::thread::spawn(move || {
            for i in 0..10_000 {
                producer.push(i);
            }
        });
        handle.join().unwrap();
        assert_eq!(buffer.len(), 8);
        // Oldest surviving entry is the first of the final window.
        assert_eq!(buffer.try_pop(), Some(9992));
    }
}
