//! Worker pool (component D, §4.D): one thread per live identity, pulling
//! sub-ranges, fetching them, and publishing chunks into the reassembly
//! buffer.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use crate::pool::Response;
use crate::session::{Session, BACKPRESSURE_SLEEP, RANGE_GET_TIMEOUT};

/// Runs worker `id` until it retires or the range queue drains (§4.D).
pub fn run(id: usize, session: Arc<Session>) {
    loop {
        if session.is_retired(id) {
            return;
        }

        if id == 0 {
            let probe = session.probe.lock().unwrap().take();
            if let Some(probe) = probe {
                let mut response = probe.response;
                publish_sub_range(&session, id, &mut response, probe.start, probe.end);
                continue;
            }
        }

        let (start, end) = match session.range_queue.get(RANGE_GET_TIMEOUT) {
            Some(range) => range,
            None => return,
        };

        if !wait_out_backpressure(&session, id, start, end) {
            // Retired while waiting; the sub-range was already pushed back.
            return;
        }

        let mut url = session.url.lock().unwrap().clone();
        match session.pool.fetch(&mut url, &session.headers, start, Some(end)) {
            Ok(mut response) => {
                *session.url.lock().unwrap() = url;
                publish_sub_range(&session, id, &mut response, start, end);
            }
            Err(_) => {
                // Exhausted retries/redirects: drop this attempt and let
                // another worker (or a future pass by this one) pick the
                // sub-range back up (§7 "Sub-range fetch failure").
                session.range_queue.put((start, end));
            }
        }
    }
}

/// Backpressure gate (§4.D step 4): defers a far-future sub-range while the
/// reassembly buffer is already comfortably full, so workers racing ahead
/// don't stall the serializer behind a wall of unconsumed bytes. Returns
/// `false` if the worker retired while waiting (the sub-range has already
/// been pushed back onto the queue in that case).
fn wait_out_backpressure(session: &Arc<Session>, id: usize, start: u64, end: u64) -> bool {
    loop {
        let expect = session.expect_begin.load(Ordering::SeqCst);
        let cached_bytes = session.data_queue.len() as u64 * session.bufsize;
        let far_ahead = start.saturating_sub(expect) > session.delay_star_size;
        let buffer_full = cached_bytes > session.delay_cache_size;
        if !(far_ahead && buffer_full) {
            return true;
        }
        if session.is_retired(id) {
            session.range_queue.put((start, end));
            return false;
        }
        thread::sleep(BACKPRESSURE_SLEEP);
    }
}

/// Reads one sub-range's response body in `bufsize` chunks, publishing
/// `(offset, chunk)` into the data queue as they arrive (§4.D step 6).
///
/// Mirrors the original's `try/except/finally`: whatever remains unread —
/// because of a read error, because the worker retired mid-stream, or any
/// other early exit — is re-enqueued so another worker resumes from the
/// first unacknowledged byte. Nothing is re-enqueued if the sub-range was
/// read to completion.
fn publish_sub_range(session: &Arc<Session>, id: usize, response: &mut Response, start: u64, end: u64) {
    let mut buf = vec![0u8; session.bufsize as usize];
    let mut cursor = start;
    loop {
        if session.is_retired(id) {
            break;
        }
        match response.read_body(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                session.data_queue.push(cursor, buf[..n].to_vec());
                cursor += n as u64;
            }
            Err(_) => break,
        }
    }
    if cursor < end + 1 {
        session.range_queue.put((cursor, end));
    }
}
