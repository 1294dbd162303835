use crate::config::{MAX_HISTORY_CAPACITY, MIN_HISTORY_CAPACITY};

/// Fixed-capacity circular buffer.
///
/// Holds at most `capacity` items (clamped to
/// [`MIN_HISTORY_CAPACITY`]–[`MAX_HISTORY_CAPACITY`]).  Once full, every push
/// overwrites the oldest item in place; nothing is ever shifted.
///
/// `slots` grows until it reaches `capacity` and is then written cyclically at
/// `head`, so every slot in it is live.  `head` is the oldest item once the buffer
/// is full, and `0` before that.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = Self::clamp_capacity(capacity);
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Appends `item`, overwriting the oldest item if the buffer is full.
    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// The most recently pushed item.
    pub fn newest_mut(&mut self) -> Option<&mut T> {
        let idx = self.newest_index()?;
        self.slots.get_mut(idx)
    }

    /// Iterates oldest → newest.  Call `.rev()` for newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        let len = self.slots.len();
        (0..len).map(move |i| &self.slots[(self.head + i) % len])
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every item.  Capacity is unchanged.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    fn newest_index(&self) -> Option<usize> {
        let len = self.slots.len();
        (len > 0).then(|| (self.head + len - 1) % len)
    }

    fn clamp_capacity(capacity: usize) -> usize {
        capacity.clamp(MIN_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY)
    }
}
