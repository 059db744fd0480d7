//! Session data model (§3) and the glue that wires the worker pool, rate
//! controller, and serializer into the `RangeFetch` engine described across
//! §4.D–§4.F.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::pool::{Pool, Response};
use crate::queue::{DataQueue, RangeQueue};
use crate::worker;

/// The probe response (§4.B), held until worker 0's first iteration adopts
/// it (§4.D step 2).
pub struct ProbeState {
    pub start: u64,
    pub end: u64,
    pub response: Response,
}

/// One inbound GET's worth of state (§3 "Session"), shared across the
/// serializer thread and every worker thread it spawns.
pub struct Session {
    pub pool: Pool,
    pub url: Mutex<String>,
    pub headers: Vec<(String, String)>,
    pub bufsize: u64,
    pub length: u64,
    pub max_threads: usize,
    pub delay_cache_size: u64,
    pub delay_star_size: u64,
    pub down_rate_min: u64,
    pub down_rate_max: u64,
    pub check_size: u64,

    /// `_stopped` (§3, §4.D, §4.F): the live worker watermark. `-1` means
    /// "terminate every worker"; otherwise live count is `stopped + 1`.
    pub stopped: AtomicI64,
    /// `expect_begin` (§3): the next byte offset the serializer will write.
    pub expect_begin: AtomicU64,

    pub range_queue: RangeQueue,
    pub data_queue: DataQueue,
    pub probe: Mutex<Option<ProbeState>>,
}

/// Staggered growth delay between newly spawned worker identities (§4.E).
const SPAWN_DELAY: Duration = Duration::from_millis(500);
/// Worker range-queue poll timeout (§4.D step 3, §5).
pub const RANGE_GET_TIMEOUT: Duration = Duration::from_secs(1);
/// Backpressure-gate recheck interval (§4.D step 4, §5).
pub const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(100);

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Pool,
        url: String,
        headers: Vec<(String, String)>,
        bufsize: u64,
        length: u64,
        max_size: u64,
        threads: usize,
        max_threads: usize,
        down_rate_min: u64,
        down_rate_max: u64,
        expect_begin: u64,
        probe: ProbeState,
        sub_ranges: impl IntoIterator<Item = (u64, u64)>,
    ) -> Arc<Session> {
        let delay_cache_size = max_size * threads as u64 * 2;
        let session = Arc::new(Session {
            pool,
            url: Mutex::new(url),
            headers,
            bufsize,
            length,
            max_threads,
            delay_cache_size,
            delay_star_size: delay_cache_size * 2,
            down_rate_min,
            down_rate_max,
            check_size: 512 * 1024,
            stopped: AtomicI64::new(-1),
            expect_begin: AtomicU64::new(expect_begin),
            range_queue: RangeQueue::new(),
            data_queue: DataQueue::new(),
            probe: Mutex::new(Some(probe)),
        });
        session.range_queue.extend(sub_ranges);
        session
    }

    /// Whether worker `id` must retire at its next checkpoint (§4.D,
    /// invariant 5).
    pub fn is_retired(&self, id: usize) -> bool {
        id as i64 > self.stopped.load(Ordering::SeqCst)
    }

    /// Number of live workers right now.
    pub fn live_workers(&self) -> usize {
        (self.stopped.load(Ordering::SeqCst) + 1).max(0) as usize
    }

    /// Grows or shrinks the live worker count (§4.E). Shrinking just moves
    /// the watermark; growing spawns one thread per new identity, each
    /// after a staggered `0.5s * k` delay so they don't all strike the
    /// origin at once. This is also how the very first batch of workers is
    /// started (from `live_workers() == 0`), matching the original
    /// implementation's single code path for both initial ramp-up and
    /// later resizing.
    pub fn adjust_threads(self: &Arc<Self>, new_threads: usize) {
        let old_threads = self.live_workers();
        if old_threads == new_threads {
            return;
        }
        self.stopped.store(new_threads as i64 - 1, Ordering::SeqCst);
        if old_threads > new_threads {
            return;
        }
        for (k, id) in (old_threads..new_threads).enumerate() {
            let delay = SPAWN_DELAY * k as u32;
            let session = self.clone();
            thread::spawn(move || {
                thread::sleep(delay);
                worker::run(id, session);
            });
        }
    }

    /// Terminates the whole session: every worker retires at its next
    /// checkpoint (§4.F "Terminates cleanly ... `_stopped` is set to -1").
    pub fn stop(&self) {
        self.stopped.store(-1, Ordering::SeqCst);
    }
}
