//! Fixed-capacity FIFO buffer that overwrites its oldest entry when full.
//!
//! Backs the error reporter's in-memory history: the newest N records are
//! retained, everything older is silently dropped. All operations are O(1)
//! except [`recent`](RingBuffer::recent), which is O(n) in the requested
//! count.

use std::collections::VecDeque;

/// Fixed-capacity circular buffer keeping insertion order.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` elements.
    ///
    /// A zero capacity is clamped to 1 so `push` always retains the newest
    /// element.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append an element, evicting the oldest if the buffer is full.
    ///
    /// Returns the evicted element, if any.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted =
            if self.items.len() == self.capacity { self.items.pop_front() } else { None };
        self.items.push_back(value);
        evicted
    }

    /// The last `n` elements, oldest of those first.
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).collect()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_below_capacity_evicts_nothing() {
        let mut buf = RingBuffer::new(3);
        assert_eq!(buf.push(1), None);
        assert_eq!(buf.push(2), None);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn push_at_capacity_evicts_oldest() {
        let mut buf = RingBuffer::new(2);
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.push("c"), Some("a"));
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn recent_returns_newest_slice_in_order() {
        let mut buf = RingBuffer::new(5);
        for i in 0..5 {
            buf.push(i);
        }
        assert_eq!(buf.recent(2), vec![&3, &4]);
        // Asking for more than is stored returns everything.
        assert_eq!(buf.recent(100).len(), 5);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(7);
        assert_eq!(buf.push(8), Some(7));
        assert_eq!(buf.recent(1), vec![&8]);
    }

    #[test]
    fn clear_empties_without_shrinking_capacity() {
        let mut buf = RingBuffer::new(4);
        buf.push(1);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
    }
}
