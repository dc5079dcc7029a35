//! Reusable byte-buffer pool
//!
//! Each relay takes one accumulation buffer at start and hands it back when
//! the [`PooledBuffer`] guard drops, including on early-exit paths.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;

/// Concurrent pool of `BytesMut` accumulation buffers
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<BytesMut>>,
    buffer_capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Create an empty pool; buffers are allocated lazily
    pub fn new(buffer_capacity: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            buffer_capacity,
            max_idle,
        }
    }

    /// Take a buffer from the pool, allocating when none is idle
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let buffer = self
            .lock_idle()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.buffer_capacity));

        PooledBuffer {
            buffer: Some(buffer),
            pool: Arc::clone(self),
        }
    }

    /// Number of buffers currently waiting for reuse
    pub fn idle(&self) -> usize {
        self.lock_idle().len()
    }

    fn release(&self, mut buffer: BytesMut) {
        buffer.clear();
        if buffer.capacity() < self.buffer_capacity {
            buffer.reserve(self.buffer_capacity);
        }

        let mut idle = self.lock_idle();
        if idle.len() < self.max_idle {
            idle.push(buffer);
        }
    }

    // The critical sections never panic, but a poisoned pool is still usable.
    fn lock_idle(&self) -> MutexGuard<'_, Vec<BytesMut>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scoped buffer that returns itself to the pool on drop
#[derive(Debug)]
pub struct PooledBuffer {
    buffer: Option<BytesMut>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        // Only `None` after `drop` has taken it.
        self.buffer.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buffer.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
