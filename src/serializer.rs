//! Serializer / writer loop (component F, §4.F): the single consumer of
//! the reassembly buffer, in strict ascending offset order, with the rate
//! controller (component E) sampled inline between writes.

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::SessionError;
use crate::rate::{RateController, RateSample};
use crate::session::Session;

/// Data-queue peek timeout (§4.F step 1, §5).
const PEEK_TIMEOUT: Duration = Duration::from_secs(30);
/// Gap-retry sleep when the head of the queue is ahead of `expect_begin`
/// (§4.F step 3).
const GAP_SLEEP: Duration = Duration::from_millis(100);

/// Drains `session`'s data queue in order, writing each chunk to `client`,
/// until the whole requested span has been delivered or a fatal condition
/// ends the session early. Always retires every worker on the way out
/// (§4.F "Terminates cleanly ... `_stopped` is set to -1"), regardless of
/// which outcome occurred.
pub fn run(session: &Arc<Session>, client: &mut impl Write) -> Result<(), SessionError> {
    let rate = RateController {
        down_rate_min: session.down_rate_min,
        down_rate_max: session.down_rate_max,
        check_size: session.check_size,
    };
    let mut sample = RateSample::new(session.expect_begin.load(Ordering::SeqCst));

    let result = loop {
        let expect = session.expect_begin.load(Ordering::SeqCst);
        if expect >= session.length {
            break Ok(());
        }

        let cached_bytes = session.data_queue.len() as u64 * session.bufsize;
        if let Some(new_threads) = rate.poll(
            &mut sample, expect, cached_bytes, session.live_workers(), session.max_threads,
        ) {
            session.adjust_threads(new_threads);
        }

        match session.data_queue.peek_offset(PEEK_TIMEOUT) {
            None => break Err(SessionError::Starvation),
            Some(offset) if offset < expect => {
                break Err(SessionError::OrderingViolation(expect, offset));
            }
            Some(offset) if offset > expect => {
                thread::sleep(GAP_SLEEP);
            }
            Some(_) => {
                let (offset, bytes) = session.data_queue.pop_min()
                    .expect("peeked offset must still be present: sole consumer");
                debug_assert_eq!(offset, expect);
                if let Err(e) = client.write_all(&bytes) {
                    break Err(SessionError::ClientGone(e));
                }
                session.expect_begin.fetch_add(bytes.len() as u64, Ordering::SeqCst);
            }
        }
    };

    session.stop();
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pool::Pool;
    use crate::queue::RangeQueue;
    use crate::session::ProbeState;
    use std::sync::atomic::{AtomicI64, AtomicU64};
    use std::sync::Mutex;

    fn test_session(length: u64, expect_begin: u64) -> Arc<Session> {
        // Constructing a full Session requires a live probe Response; for
        // serializer-only tests we instead build the struct directly since
        // all its fields are `pub` within the crate.
        Arc::new(Session {
            pool: Pool::new(std::sync::Arc::new(crate::config::Config::new())),
            url: Mutex::new("http://example.com/".into()),
            headers: vec![],
            bufsize: 4096,
            length,
            max_threads: 8,
            delay_cache_size: 1 << 20,
            delay_star_size: 1 << 21,
            down_rate_min: 160 * 1024,
            down_rate_max: 360 * 1024,
            check_size: 512 * 1024,
            stopped: AtomicI64::new(-1),
            expect_begin: AtomicU64::new(expect_begin),
            range_queue: RangeQueue::new(),
            data_queue: crate::queue::DataQueue::new(),
            probe: Mutex::new(None::<ProbeState>),
        })
    }

    #[test]
    fn writes_in_order_and_terminates_at_length() {
        let session = test_session(10, 0);
        session.data_queue.push(0, vec![1, 2, 3, 4, 5]);
        session.data_queue.push(5, vec![6, 7, 8, 9, 10]);
        let mut out = Vec::new();
        let result = run(&session, &mut out);
        assert!(result.is_ok());
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(session.live_workers(), 0);
    }

    #[test]
    fn ordering_violation_is_fatal() {
        let session = test_session(10, 5);
        session.data_queue.push(0, vec![1, 2, 3]);
        let mut out = Vec::new();
        let result = run(&session, &mut out);
        assert!(matches!(result, Err(SessionError::OrderingViolation(5, 0))));
    }

    #[test]
    fn starvation_times_out() {
        let session = test_session(10, 0);
        let mut out = Vec::new();
        let result = run(&session, &mut out);
        assert!(matches!(result, Err(SessionError::Starvation)));
    }

    struct FailingWriter;
    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn client_disconnect_is_reported() {
        let session = test_session(10, 0);
        session.data_queue.push(0, vec![1, 2, 3]);
        let mut out = FailingWriter;
        let result = run(&session, &mut out);
        assert!(matches!(result, Err(SessionError::ClientGone(_))));
    }

    #[test]
    fn gap_waits_for_fill_in() {
        let session = test_session(6, 0);
        session.data_queue.push(3, vec![4, 5, 6]);
        let session2 = session.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            session2.data_queue.push(0, vec![1, 2, 3]);
        });
        let mut out = Vec::new();
        let result = run(&session, &mut out);
        assert!(result.is_ok());
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
    }
}
