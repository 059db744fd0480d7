//! Thread-safe, min-ordered priority queues (§3 "RangeQueue"/"DataQueue",
//! §4.C, §9 "Priority queues").
//!
//! Both queues are backed by a `BinaryHeap` (a max-heap) wrapped with
//! `Reverse` so the *smallest* key comes out first, guarded by a `Mutex` and
//! signalled with a `Condvar` — the std-only equivalent of the priority
//! request queue in `cascette-protocol`'s CDN streaming optimizer, adapted
//! here to block the calling thread instead of an async task.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One `max_size`-byte window of the resource, `(start, end)` inclusive.
pub type SubRange = (u64, u64);

/// A priority queue of pending sub-ranges, ordered by start offset
/// ascending (§3 "RangeQueue").
pub struct RangeQueue {
    heap: Mutex<BinaryHeap<Reverse<SubRange>>>,
    ready: Condvar,
}

impl RangeQueue {
    pub fn new() -> RangeQueue {
        RangeQueue {
            heap: Mutex::new(BinaryHeap::new()),
            ready: Condvar::new(),
        }
    }

    /// Enqueues sub-ranges in bulk (used once by the range planner, §4.B).
    pub fn extend(&self, ranges: impl IntoIterator<Item = SubRange>) {
        let mut heap = self.heap.lock().unwrap();
        heap.extend(ranges.into_iter().map(Reverse));
        self.ready.notify_all();
    }

    /// Re-enqueues a single sub-range (partial-failure recovery, §4.D step
    /// 6, and the backpressure-gate push-back in step 4).
    pub fn put(&self, range: SubRange) {
        let mut heap = self.heap.lock().unwrap();
        heap.push(Reverse(range));
        self.ready.notify_one();
    }

    /// Pops the smallest-start sub-range, waiting up to `timeout` for one to
    /// appear. `None` means the queue was empty for the whole timeout, which
    /// tells a worker to retire (§4.D step 3).
    pub fn get(&self, timeout: Duration) -> Option<SubRange> {
        let mut heap = self.heap.lock().unwrap();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(Reverse(range)) = heap.pop() {
                return Some(range);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.ready
                .wait_timeout(heap, deadline - now).unwrap();
            heap = guard;
            if result.timed_out() && heap.is_empty() {
                return None;
            }
        }
    }
}

/// One `(offset, bytes)` chunk published by a worker (§3 "Chunk").
pub type Chunk = (u64, Vec<u8>);

#[derive(Eq, PartialEq)]
struct HeapChunk(u64, Vec<u8>);

impl Ord for HeapChunk {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse on offset only: chunk bytes don't need (and for large
        // chunks, shouldn't pay for) a comparison.
        other.0.cmp(&self.0)
    }
}

impl PartialOrd for HeapChunk {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A priority queue of chunks awaiting serialization, ordered by offset
/// ascending (§3 "DataQueue", §4.C).
///
/// Exposes a timed peek-min so the serializer can detect a head-of-line
/// stall without consuming a chunk it isn't ready to write yet (§4.C).
pub struct DataQueue {
    heap: Mutex<BinaryHeap<HeapChunk>>,
    ready: Condvar,
}

impl DataQueue {
    pub fn new() -> DataQueue {
        DataQueue {
            heap: Mutex::new(BinaryHeap::new()),
            ready: Condvar::new(),
        }
    }

    /// Publishes a chunk (workers only, §4.D step 6).
    pub fn push(&self, offset: u64, bytes: Vec<u8>) {
        let mut heap = self.heap.lock().unwrap();
        heap.push(HeapChunk(offset, bytes));
        self.ready.notify_one();
    }

    /// Number of chunks currently buffered; used by the backpressure gate
    /// and rate controller to estimate buffered bytes as `qsize * bufsize`
    /// (§4.D, §4.E).
    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    /// Waits up to `timeout` for a chunk to appear, then returns its
    /// offset without removing it (§4.C "peek-min with timeout").
    pub fn peek_offset(&self, timeout: Duration) -> Option<u64> {
        let mut heap = self.heap.lock().unwrap();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(chunk) = heap.peek() {
                return Some(chunk.0);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.ready
                .wait_timeout(heap, deadline - now).unwrap();
            heap = guard;
            if result.timed_out() && heap.is_empty() {
                return None;
            }
        }
    }

    /// Removes and returns the minimum-offset chunk. Only valid to call
    /// right after `peek_offset` returned `Some` for the same offset — the
    /// serializer is the sole consumer so there is no race on the pop
    /// itself, only on producers pushing concurrently (§5 "single consumer
    /// (serializer) from DataQueue").
    pub fn pop_min(&self) -> Option<Chunk> {
        let mut heap = self.heap.lock().unwrap();
        heap.pop().map(|HeapChunk(offset, bytes)| (offset, bytes))
    }
}
