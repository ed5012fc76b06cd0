//! Double-buffered per-iteration state
//!
//! One slot is the read-only "current" state, the other the write-only
//! "next" state. Roles swap only at iteration boundaries.

/// Index of one of the two buffer slots
pub type BufferIndex = usize;

/// Pair of buffers with alternating read/write roles
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    read: BufferIndex,
    swaps: u64,
}

impl<T> DoubleBuffer<T> {
    /// Create with slot 0 as the read slot
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            read: 0,
            swaps: 0,
        }
    }

    /// Slot holding the current (read-only) state
    #[must_use]
    pub const fn read_index(&self) -> BufferIndex {
        self.read
    }

    /// Slot receiving the next state; never equal to [`Self::read_index`]
    #[must_use]
    pub const fn write_index(&self) -> BufferIndex {
        1 - self.read
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> &T {
        &self.slots[self.read]
    }

    /// Next state, writable
    pub fn next_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.read]
    }

    /// Both slots, split by role: `(current, next)`
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.read == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Slot by index
    #[must_use]
    pub fn slot(&self, index: BufferIndex) -> &T {
        &self.slots[index]
    }

    /// Exchange roles: the slot just written becomes current
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
        self.swaps += 1;
    }

    /// Number of completed swaps
    #[must_use]
    pub const fn swaps(&self) -> u64 {
        self.swaps
    }
}
