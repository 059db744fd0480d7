use std::io;

use httparse;

quick_error! {
    /// Errors from the connection pool / HTTP client half (component A).
    #[derive(Debug)]
    pub enum PoolError {
        /// Networking failure talking to the upstream (or upstream proxy).
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// The upstream response's status line or headers did not parse.
        Header(err: httparse::Error) {
            description("bad response headers")
            display("bad response headers: {}", err)
            from()
        }
        /// A `scheme://host` this pool does not know how to dial.
        UnsupportedScheme {
            description("scheme of this url is not supported")
        }
        /// A redirect chain exceeded the per-fetch cap (§9 "Redirect loop").
        TooManyRedirects {
            description("too many redirects")
        }
        /// The upstream answered something other than 206 to a ranged GET,
        /// after exhausting retries. §9: this must never be treated as an
        /// absent/nullable response — it is always a hard probe/fetch
        /// failure.
        UnexpectedStatus(code: u16) {
            description("upstream did not honor the range request")
            display("upstream responded {} to a range request", code)
        }
    }
}

quick_error! {
    /// Fatal, session-terminating conditions raised by the serializer (§4.F,
    /// §7). None of these escalate beyond the one session.
    #[derive(Debug)]
    pub enum SessionError {
        /// `head_offset < expect_begin`: a byte was about to be delivered
        /// twice. Always a bug in the reassembly bookkeeping.
        OrderingViolation(expect: u64, got: u64) {
            description("reassembly ordering violation")
            display("ordering violation: expected >= {}, got {}", expect, got)
        }
        /// The data queue produced nothing eligible for 30s (§4.F step 5).
        Starvation {
            description("reassembly buffer starved")
        }
        /// Writing to the client socket failed (client disconnected).
        ClientGone(err: io::Error) {
            description("client disconnected")
            display("client disconnected: {}", err)
            from()
        }
        /// The probe fetch failed outright; no bytes have been sent yet so
        /// the handler can still answer with a clean 500.
        ProbeFailed(err: PoolError) {
            description("probe fetch failed")
            display("probe fetch failed: {}", err)
            from()
        }
    }
}
