// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recycling pools for the per-frame vertex and index streams.
//!
//! Stream storage handed to the backend inside a [`Recording`] travels as a
//! [`PooledStream`] that returns its allocation to the originating pool when
//! dropped. The backend may drop it from any thread once the upload has
//! completed, so the free list is mutex-guarded. The critical sections are
//! bump operations on a `Vec` and never block on user code.
//!
//! [`Recording`]: crate::recording::Recording

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

pub(crate) struct StreamPool<T> {
    free: Mutex<Vec<Vec<T>>>,
}

impl<T> StreamPool<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
        })
    }

    /// Checks out storage with at least `capacity` elements reserved.
    pub fn acquire(&self, capacity: usize) -> Vec<T> {
        let mut buf = self.free.lock().pop().unwrap_or_default();
        buf.clear();
        if buf.capacity() < capacity {
            buf.reserve(capacity - buf.len());
        }
        buf
    }

    fn release(&self, mut buf: Vec<T>) {
        buf.clear();
        self.free.lock().push(buf);
    }

    #[cfg(test)]
    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

/// Stream storage owned by the backend for the duration of an upload.
pub struct PooledStream<T: Send + 'static> {
    data: Vec<T>,
    pool: Arc<StreamPool<T>>,
}

impl<T: Send + 'static> PooledStream<T> {
    pub(crate) fn new(data: Vec<T>, pool: Arc<StreamPool<T>>) -> Self {
        Self { data, pool }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: bytemuck::Pod + Send> PooledStream<T> {
    /// Byte view of the stream for the backend's upload path.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

impl<T: Send + 'static> Drop for PooledStream<T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.data));
    }
}

impl<T: Send + 'static> fmt::Debug for PooledStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledStream")
            .field("len", &self.data.len())
            .finish()
    }
}
