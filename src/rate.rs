//! Rate controller (component E, §4.E): samples throughput and proposes a
//! new live worker count. Pure computation — the caller (the serializer,
//! §4.F) decides when to sample and what to do with the result.

use std::time::Instant;

/// Rolling state between samples; named after the `speedtest` dict in the
/// original implementation (§10.6).
pub struct RateSample {
    prev_begin: u64,
    prev_cache: u64,
    prev_time: Instant,
}

impl RateSample {
    pub fn new(begin: u64) -> RateSample {
        RateSample { prev_begin: begin, prev_cache: 0, prev_time: Instant::now() }
    }
}

pub struct RateController {
    pub down_rate_min: u64,
    pub down_rate_max: u64,
    pub check_size: u64,
}

impl RateController {
    /// Looks at how much progress has been made (bytes flushed to the
    /// client plus bytes sitting cached in the reassembly buffer) since the
    /// last sample. Below `check_size` of progress, does nothing. Past it,
    /// computes a throughput and proposes a worker-count delta clamped to
    /// `[1, max_threads]`; `None` means no change.
    pub fn poll(
        &self,
        sample: &mut RateSample,
        expect_begin: u64,
        cached_bytes: u64,
        current_threads: usize,
        max_threads: usize,
    ) -> Option<usize> {
        let delta_begin = expect_begin as i64 - sample.prev_begin as i64;
        let delta_cache = cached_bytes as i64 - sample.prev_cache as i64;
        let progress = delta_begin + delta_cache;
        if progress <= self.check_size as i64 {
            return None;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(sample.prev_time).as_secs_f64() + 0.1;
        let rate = progress as f64 / elapsed;

        sample.prev_begin = expect_begin;
        sample.prev_cache = cached_bytes;
        sample.prev_time = now;

        let adjust: i64 = if rate < self.down_rate_min as f64 {
            ((self.down_rate_min as f64 * 2.0) / rate) as i64
        } else if rate > self.down_rate_max as f64 {
            -(((rate * 2.0) / self.down_rate_max as f64) as i64)
        } else {
            0
        };
        if adjust == 0 {
            return None;
        }

        let new_threads = (current_threads as i64 + adjust).max(1) as usize;
        Some(new_threads.min(max_threads))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn controller() -> RateController {
        RateController {
            down_rate_min: 160 * 1024,
            down_rate_max: 360 * 1024,
            check_size: 512 * 1024,
        }
    }

    #[test]
    fn below_check_size_is_a_no_op() {
        let ctl = controller();
        let mut sample = RateSample::new(0);
        assert_eq!(ctl.poll(&mut sample, 100, 0, 8, 24), None);
    }

    #[test]
    fn explicit_slow_rate_grows_threads() {
        let ctl = RateController {
            down_rate_min: 1_000_000,
            down_rate_max: 2_000_000,
            check_size: 10,
        };
        let mut sample = RateSample::new(0);
        sample.prev_time = Instant::now() - Duration::from_secs(1);
        // 100 bytes/sec, far under down_rate_min of 1e6.
        let result = ctl.poll(&mut sample, 100, 0, 8, 24);
        assert!(result.is_some());
        assert!(result.unwrap() > 8);
    }

    #[test]
    fn explicit_fast_rate_shrinks_threads() {
        let ctl = RateController {
            down_rate_min: 10,
            down_rate_max: 20,
            check_size: 10,
        };
        let mut sample = RateSample::new(0);
        sample.prev_time = Instant::now() - Duration::from_secs(1);
        // 1,000,000 bytes/sec, far over down_rate_max of 20.
        let result = ctl.poll(&mut sample, 1_000_000, 0, 8, 24);
        assert!(result.is_some());
        assert!(result.unwrap() < 8);
    }

    #[test]
    fn clamped_to_max_threads() {
        let ctl = RateController {
            down_rate_min: 1_000_000_000,
            down_rate_max: 2_000_000_000,
            check_size: 10,
        };
        let mut sample = RateSample::new(0);
        sample.prev_time = Instant::now() - Duration::from_secs(1);
        let result = ctl.poll(&mut sample, 100, 0, 20, 24);
        assert_eq!(result, Some(24));
    }

    #[test]
    fn clamped_to_at_least_one() {
        let ctl = RateController {
            down_rate_min: 10,
            down_rate_max: 20,
            check_size: 10,
        };
        let mut sample = RateSample::new(0);
        sample.prev_time = Instant::now() - Duration::from_secs(1);
        let result = ctl.poll(&mut sample, 100_000_000, 0, 2, 24);
        assert_eq!(result, Some(1));
    }
}
