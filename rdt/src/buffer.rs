//! Growable byte buffer holding reassembled, not-yet-consumed stream data.

use std::collections::VecDeque;

/// Contiguous in-order bytes waiting for the application.
///
/// Appends grow the backing storage geometrically (amortised O(1)); reads
/// consume from the front without shifting the remainder.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    bytes: VecDeque<u8>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes ready for the application.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append `data` at the back.
    ///
    /// Returns `false` (leaving the buffer untouched) if the extra capacity
    /// could not be allocated.
    pub fn try_append(&mut self, data: &[u8]) -> bool {
        if self.bytes.try_reserve(data.len()).is_err() {
            return false;
        }
        self.bytes.extend(data.iter().copied());
        true
    }

    /// Move up to `buf.len()` bytes from the front into `buf`.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.bytes.len());
        for (dst, src) in buf[..n].iter_mut().zip(self.bytes.drain(..n)) {
            *dst = src;
        }
        n
    }

    /// Release memory once the buffer has been drained.
    pub fn shrink_if_empty(&mut self) {
        if self.bytes.is_empty() {
            self.bytes.shrink_to_fit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_preserves_order() {
        let mut b = ReassemblyBuffer::new();
        assert!(b.try_append(b"hello "));
        assert!(b.try_append(b"world"));
        assert_eq!(b.len(), 11);

        let mut out = [0u8; 11];
        assert_eq!(b.read(&mut out), 11);
        assert_eq!(&out, b"hello world");
        assert!(b.is_empty());
    }

    #[test]
    fn partial_read_leaves_remainder_at_front() {
        let mut b = ReassemblyBuffer::new();
        b.try_append(b"abcdef");

        let mut out = [0u8; 4];
        assert_eq!(b.read(&mut out), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(b.len(), 2);

        let mut rest = [0u8; 8];
        assert_eq!(b.read(&mut rest), 2);
        assert_eq!(&rest[..2], b"ef");
    }

    #[test]
    fn read_from_empty_returns_zero() {
        let mut b = ReassemblyBuffer::new();
        let mut out = [0u8; 4];
        assert_eq!(b.read(&mut out), 0);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut b = ReassemblyBuffer::new();
        let chunk = [7u8; 1000];
        for _ in 0..10 {
            assert!(b.try_append(&chunk));
        }
        assert_eq!(b.len(), 10_000);
        b.shrink_if_empty();
        assert_eq!(b.len(), 10_000);
    }
}
