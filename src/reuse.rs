//! Context reuse manager (spec.md §4.8): bounded pools of stream contexts
//! and output buffers, the primary steady-state allocation-avoidance
//! mechanism.
//!
//! The teacher has no equivalent pool -- `carllerche-h2` allocates a fresh
//! `state::Stream` per stream and relies on the allocator. This module is
//! new, grounded in the general checkout/return shape of
//! `carllerche-h2/src/proto/streams/store.rs`'s slab (a `Stream` is moved
//! into storage on `insert`, moved back out on `remove`) generalized to a
//! bounded pool that recycles instances instead of freeing them.

use std::sync::Mutex;

use crate::frame::StreamId;
use crate::io::OutputBuffer;
use crate::proto::stream::Stream;

/// A bounded pool of `Stream` contexts. `checkout` hands over ownership of
/// a zeroed, ready-to-use instance; `release` resets and returns it.
/// Exhaustion returns `None`, which callers map to `REFUSED_STREAM`
/// (spec.md §4.8).
#[derive(Debug)]
pub struct StreamPool {
    free: Mutex<Vec<Stream>>,
    capacity: usize,
    default_initial_window: u32,
}

impl StreamPool {
    pub fn new(capacity: usize, default_initial_window: u32) -> StreamPool {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(Stream::new(StreamId::CONNECTION, default_initial_window));
        }
        StreamPool {
            free: Mutex::new(free),
            capacity,
            default_initial_window,
        }
    }

    pub fn checkout(&self, id: StreamId, initial_window: u32) -> Option<Stream> {
        let mut free = self.free.lock().unwrap();
        match free.pop() {
            Some(mut stream) => {
                stream.reset_for_reuse(id, initial_window);
                Some(stream)
            }
            None if self.unbounded() => Some(Stream::new(id, initial_window)),
            None => None,
        }
    }

    pub fn release(&self, stream: Stream) {
        let mut free = self.free.lock().unwrap();
        if free.len() < self.capacity || self.unbounded() {
            free.push(stream);
        }
    }

    fn unbounded(&self) -> bool {
        self.capacity == 0
    }
}

/// A bounded pool of `OutputBuffer`s, built fresh at the configured
/// capacity since an `OutputBuffer` carries no per-request state worth
/// preserving beyond its backing allocation.
pub struct OutputBufferPool {
    free: Mutex<Vec<OutputBuffer>>,
    buffer_capacity: usize,
    pool_capacity: usize,
}

impl OutputBufferPool {
    pub fn new(pool_capacity: usize, buffer_capacity: usize) -> OutputBufferPool {
        let mut free = Vec::with_capacity(pool_capacity);
        for _ in 0..pool_capacity {
            free.push(OutputBuffer::new(buffer_capacity));
        }
        OutputBufferPool {
            free: Mutex::new(free),
            buffer_capacity,
            pool_capacity,
        }
    }

    pub fn checkout(&self) -> OutputBuffer {
        let mut free = self.free.lock().unwrap();
        free.pop().unwrap_or_else(|| OutputBuffer::new(self.buffer_capacity))
    }

    pub fn release(&self, mut buffer: OutputBuffer) {
        buffer.reset();
        let mut free = self.free.lock().unwrap();
        if free.len() < self.pool_capacity {
            free.push(buffer);
        }
    }
}
