use std::fmt;

/// Fixed-capacity FIFO that evicts its oldest entry when a push would overflow.
#[derive(Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > 0,
            "RingBuffer capacity must be greater than zero"
        );
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    fn physical(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity()
    }

    /// Append `value` at the tail, returning the evicted head when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.is_full() {
            let idx = self.head;
            self.head = (self.head + 1) % self.capacity();
            return self.slots[idx].replace(value);
        }

        let idx = self.physical(self.len);
        debug_assert!(
            self.slots[idx].is_none(),
            "Slot should be vacant when buffer is not full"
        );
        self.len += 1;
        self.slots[idx] = Some(value);
        None
    }

    /// Entry at logical position `index`, where 0 is the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    pub fn newest(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }

        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }

    /// Resize the buffer, keeping the newest entries that still fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        assert!(
            capacity > 0,
            "RingBuffer capacity must be greater than zero"
        );
        if capacity == self.capacity() {
            return;
        }

        let mut retained: Vec<T> = Vec::with_capacity(self.len.min(capacity));
        let skip = self.len.saturating_sub(capacity);
        for logical in 0..self.len {
            let idx = self.physical(logical);
            if let Some(value) = self.slots[idx].take()
                && logical >= skip
            {
                retained.push(value);
            }
        }

        self.slots.clear();
        self.slots.resize_with(capacity, || None);
        self.head = 0;
        self.len = retained.len();
        for (slot, value) in self.slots.iter_mut().zip(retained) {
            *slot = Some(value);
        }
    }

    pub fn iter(&self) -> RingBufferIter<'_, T> {
        RingBufferIter {
            buffer: self,
            front: 0,
            back: self.len,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

/// Oldest-to-newest iterator over a `RingBuffer`.
pub struct RingBufferIter<'a, T> {
    buffer: &'a RingBuffer<T>,
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for RingBufferIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.buffer.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for RingBufferIter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.buffer.get(self.back)
    }
}

impl<T> ExactSizeIterator for RingBufferIter<'_, T> {}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = RingBufferIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be greater than zero")]
    fn zero_capacity_panics() {
        let _buffer: RingBuffer<i32> = RingBuffer::with_capacity(0);
    }

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut buffer = RingBuffer::with_capacity(2);
        assert!(buffer.push(1).is_none());
        assert!(buffer.push(2).is_none());
        assert_eq!(buffer.push(3), Some(1));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(0), Some(&2));
        assert_eq!(buffer.get(1), Some(&3));
        assert_eq!(buffer.get(2), None);
    }

    #[test]
    fn iterates_oldest_first_and_reverses() {
        let mut buffer = RingBuffer::with_capacity(3);
        for value in 0..5 {
            buffer.push(value);
        }
        let forward: Vec<_> = buffer.iter().copied().collect();
        let backward: Vec<_> = buffer.iter().rev().copied().collect();
        assert_eq!(forward, vec![2, 3, 4]);
        assert_eq!(backward, vec![4, 3, 2]);
        assert_eq!(buffer.newest(), Some(&4));
    }

    #[test]
    fn shrinking_keeps_newest_entries() {
        let mut buffer = RingBuffer::with_capacity(4);
        for value in 0..6 {
            buffer.push(value);
        }
        buffer.set_capacity(2);
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![4, 5]);

        buffer.set_capacity(5);
        buffer.push(6);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![4, 5, 6]);
    }

    #[test]
    fn clear_resets_length() {
        let mut buffer = RingBuffer::with_capacity(2);
        buffer.push('a');
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.newest().is_none());
        buffer.push('b');
        assert_eq!(buffer.get(0), Some(&'b'));
    }
}
