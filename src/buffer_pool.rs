//! Buffer pool for reusing row payload allocations across cursors.

use std::sync::{Arc, LazyLock};

use crossbeam_queue::ArrayQueue;

const POOL_CAPACITY: usize = 128;

/// Buffers that grew past this are dropped instead of pooled.
const MAX_POOLED_CAPACITY: usize = 1 << 20;

/// Global buffer pool shared by all cursors.
pub static GLOBAL_BUFFER_POOL: LazyLock<Arc<BufferPool>> =
    LazyLock::new(|| Arc::new(BufferPool::default()));

/// Pool of payload buffers.
///
/// A row takes the read buffer that holds its DataRow payload and hands the
/// source a pooled buffer in exchange; when the row is consumed its payload
/// goes back to the pool.
#[derive(Debug)]
pub struct BufferPool {
    buffers: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    /// Create a new buffer pool with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: ArrayQueue::new(capacity),
        }
    }

    /// Get an empty buffer from the pool, or a fresh one if the pool is empty.
    pub fn get(&self) -> Vec<u8> {
        self.buffers.pop().unwrap_or_default()
    }

    /// Return a buffer to the pool.
    pub fn put(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() == 0 || buffer.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        // Clear buffer but preserve capacity
        buffer.clear();
        // Ignore if pool is full
        let _ = self.buffers.push(buffer);
    }

    /// Number of buffers currently pooled.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Check if no buffers are pooled.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_buffers_are_cleared_and_reused() {
        let pool = BufferPool::new(2);
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(b"payload");
        pool.put(buf);
        assert_eq!(pool.len(), 1);

        let reused = pool.get();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 64);
        assert!(pool.is_empty());
    }

    #[test]
    fn oversized_and_overflowing_buffers_are_dropped() {
        let pool = BufferPool::new(1);
        pool.put(Vec::with_capacity(MAX_POOLED_CAPACITY + 1));
        assert!(pool.is_empty());

        pool.put(Vec::with_capacity(8));
        pool.put(Vec::with_capacity(8));
        assert_eq!(pool.len(), 1);
    }
}
