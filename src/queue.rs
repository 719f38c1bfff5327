/// how many slots the command queue has by default; one slot is always left
/// free to tell "full" from "empty", so it holds one fewer command
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-size FIFO ring buffer. Pushing into a full buffer evicts the oldest
/// entry instead of blocking or growing.
///
/// * empty when `head == tail`
/// * full when `(head + 1) % capacity == tail`
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
}

impl<T> RingBuffer<T> {
    /// capacities below 2 can't hold anything, so they're bumped up to 2
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        RingBuffer {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
        }
    }

    /// number of slots, not number of storable entries
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        (self.head + self.capacity() - self.tail) % self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.head + 1) % self.capacity() == self.tail
    }

    /// add to the back; if there was no room the oldest entry is dropped out
    /// of the front first and handed back
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.is_full() {
            let oldest = self.slots[self.tail].take();
            self.tail = self.advance(self.tail);
            oldest
        } else {
            None
        };
        self.slots[self.head] = Some(value);
        self.head = self.advance(self.head);
        evicted
    }

    /// take from the front
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.tail].take();
        self.tail = self.advance(self.tail);
        value
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
