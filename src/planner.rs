//! Range planner (component B, §4.B): turns the probe's `Content-Range`
//! plus the client's requested range into an outbound status/`Content-Range`
//! and the list of sub-ranges still to fetch.

use crate::queue::SubRange;
use crate::status::Status;

/// The outcome of planning one session's delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// 200 or 206 (§4.B).
    pub status: Status,
    /// First byte delivered to the client; equals the probe's start.
    pub range_start: u64,
    /// Last byte delivered to the client (inclusive).
    pub range_end: u64,
    /// Total resource length, from the probe's `Content-Range`.
    pub length: u64,
    /// Sub-ranges covering `(probe_end, range_end]`, in ascending order,
    /// ready to hand to `RangeQueue::extend`.
    pub sub_ranges: Vec<SubRange>,
}

impl Plan {
    /// `Content-Length` for the outbound response: always `range_end + 1 -
    /// range_start`, which collapses to the full resource length when the
    /// status is 200 (§4.B).
    pub fn content_length(&self) -> u64 {
        self.range_end + 1 - self.range_start
    }

    /// `Content-Range` header value; only meaningful (and only sent) for a
    /// 206 response.
    pub fn content_range_header(&self) -> String {
        format!("bytes {}-{}/{}", self.range_start, self.range_end, self.length)
    }
}

/// Plans a session's delivery and sub-range enumeration.
///
/// `probe_start`/`probe_end`/`length` come from the probe's `Content-Range`.
/// `client_range_end` is the client's requested end, `0` meaning "to EOF"
/// (§3 "Session"). `client_sent_range` records whether the client sent a
/// `Range` header at all, since an absent header plus a whole-body request
/// forces status 200 even though the probe itself still used `Range`
/// internally (§4.B).
pub fn plan(
    probe_start: u64,
    probe_end: u64,
    length: u64,
    client_range_end: u64,
    client_sent_range: bool,
    max_size: u64,
) -> Plan {
    let last = length - 1;
    let whole_body = probe_start == 0
        && (client_range_end == 0 || client_range_end == last)
        && !client_sent_range;

    let (status, range_end) = if whole_body {
        (Status::Ok, last)
    } else {
        let requested_end = if client_range_end == 0 { last } else { client_range_end };
        (Status::PartialContent, requested_end.min(last))
    };

    let sub_ranges = enumerate_sub_ranges(probe_end, range_end, max_size);

    Plan {
        status,
        range_start: probe_start,
        range_end,
        length,
        sub_ranges,
    }
}

/// Partitions `(after, end]` into `max_size`-byte windows, with a final
/// short window for the remainder (§4.B).
fn enumerate_sub_ranges(after: u64, end: u64, max_size: u64) -> Vec<SubRange> {
    let mut ranges = Vec::new();
    let delivery_end = end + 1;
    let mut a = after + 1;
    if a >= delivery_end {
        return ranges;
    }
    let n = (delivery_end - a) / max_size;
    let mut b = after;
    for _ in 0..n {
        b += max_size;
        ranges.push((a, b));
        a = b + 1;
    }
    if delivery_end > a {
        ranges.push((a, delivery_end - 1));
    }
    ranges
}
