//! The connection's stream table: a concurrent map from stream id to
//! `Stream`, plus the reuse-pool checkout path (spec.md §4.6, §4.8).
//!
//! Grounded in `carllerche-h2/src/proto/streams/store.rs`'s slab +
//! `HashMap<StreamId, usize>` storage, simplified: the teacher's `store.rs`
//! additionally threads an intrusive linked list (`Queue`/`Next`) through
//! the slab for send-side prioritization ordering, which this crate drops
//! since priority scheduling is a non-goal (spec.md §1).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use slab::Slab;

use crate::frame::StreamId;
use crate::proto::stream::Stream;
use crate::reuse::StreamPool;

/// How many just-closed stream ids are remembered so a frame that races a
/// stream's closure can be told apart from one addressed to an id that was
/// never opened (spec.md's state table: `CLOSED | any other` is a
/// stream-scoped `STREAM_CLOSED`, not connection teardown).
const CLOSED_TOMBSTONE_CAPACITY: usize = 1024;

/// A bounded, FIFO-evicted record of recently-closed stream ids.
#[derive(Debug, Default)]
struct ClosedTombstones {
    set: HashSet<StreamId>,
    order: VecDeque<StreamId>,
}

impl ClosedTombstones {
    fn insert(&mut self, id: StreamId) {
        if !self.set.insert(id) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > CLOSED_TOMBSTONE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }

    fn contains(&self, id: StreamId) -> bool {
        self.set.contains(&id)
    }
}

/// Owns every stream currently known to the connection. Reads and writes
/// happen from the connection-driving task; removal is also triggered from
/// whatever task a `Dispatcher` runs a handler on, once that handler's
/// `ResponseSink` finishes the response (spec.md §5), so every method here
/// takes `&self` and the table is shared behind an `Arc`.
#[derive(Debug)]
pub struct Streams {
    slab: Mutex<Slab<Stream>>,
    ids: Mutex<HashMap<StreamId, usize>>,
    highest_stream_id: AtomicU32,
    last_successful_stream_id: AtomicU32,
    closed_ids: Mutex<ClosedTombstones>,
}

impl Streams {
    pub fn new() -> Streams {
        Streams {
            slab: Mutex::new(Slab::new()),
            ids: Mutex::new(HashMap::new()),
            highest_stream_id: AtomicU32::new(0),
            last_successful_stream_id: AtomicU32::new(0),
            closed_ids: Mutex::new(ClosedTombstones::default()),
        }
    }

    pub fn highest_stream_id(&self) -> StreamId {
        StreamId::new(self.highest_stream_id.load(Ordering::Acquire))
    }

    pub fn last_successful_stream_id(&self) -> StreamId {
        StreamId::new(self.last_successful_stream_id.load(Ordering::Acquire))
    }

    /// Stream-id discipline (spec.md §4.6): client-initiated ids must be
    /// odd and strictly greater than every id seen so far.
    pub fn validate_new_stream_id(&self, id: StreamId) -> bool {
        id.is_client_initiated() && id.as_u32() > self.highest_stream_id.load(Ordering::Acquire)
    }

    /// Checks a stream context out of the reuse pool, inserts it under
    /// `id`, and records `id` as the new high-water mark.
    pub fn open(&self, id: StreamId, pool: &StreamPool, initial_window: u32) -> Option<()> {
        if !self.validate_new_stream_id(id) {
            return None;
        }

        let stream = pool.checkout(id, initial_window)?;
        let mut slab = self.slab.lock().unwrap();
        let key = slab.insert(stream);
        self.ids.lock().unwrap().insert(id, key);
        self.highest_stream_id.store(id.as_u32(), Ordering::Release);
        Some(())
    }

    pub fn with_stream<F, R>(&self, id: StreamId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Stream) -> R,
    {
        let key = *self.ids.lock().unwrap().get(&id)?;
        let mut slab = self.slab.lock().unwrap();
        slab.get_mut(key).map(f)
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.ids.lock().unwrap().contains_key(&id)
    }

    /// True if `id` was opened and has since been removed by `close`. Lets
    /// a caller distinguish a frame racing a just-finished stream (stream
    /// error) from one addressed to a stream id that was never valid at all
    /// (connection error).
    pub fn was_recently_closed(&self, id: StreamId) -> bool {
        self.closed_ids.lock().unwrap().contains(id)
    }

    /// Removes a stream and returns it to the reuse pool once it reaches
    /// `Closed` (spec.md §4.5/§4.8). Updates `last_successful_stream_id`
    /// when the stream completed without a mid-flight error.
    pub fn close(&self, id: StreamId, pool: &StreamPool, completed_successfully: bool) {
        let key = match self.ids.lock().unwrap().remove(&id) {
            Some(key) => key,
            None => return,
        };

        let stream = self.slab.lock().unwrap().remove(key);
        self.closed_ids.lock().unwrap().insert(id);
        if completed_successfully {
            self.last_successful_stream_id
                .fetch_max(id.as_u32(), Ordering::AcqRel);
        }
        pool.release(stream);
    }

    /// Applies a signed delta (from a changed INITIAL_WINDOW_SIZE setting)
    /// to every open stream's send window (spec.md §4.7).
    pub fn apply_initial_window_delta(&self, delta: i64) -> Result<(), crate::error::FrameError> {
        let ids: Vec<usize> = self.ids.lock().unwrap().values().copied().collect();
        let mut slab = self.slab.lock().unwrap();
        for key in ids {
            if let Some(stream) = slab.get_mut(key) {
                stream.send_flow.apply_settings_delta(delta)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }
}

impl Default for Streams {
    fn default() -> Self {
        Streams::new()
    }
}
