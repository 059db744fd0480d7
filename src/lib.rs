//! RangeFetch: a local HTTP proxy that accelerates byte-range-capable
//! downloads by splitting them into concurrent sub-range fetches, ordered
//! by a priority-queue reassembly buffer, with the worker count adapting to
//! observed throughput. Blocking I/O on OS threads throughout, no async
//! runtime.

#[macro_use(quick_error)] extern crate quick_error;

pub mod config;
pub mod error;
pub mod handler;
pub mod headers;
pub mod listener;
pub mod planner;
pub mod pool;
pub mod queue;
pub mod rate;
pub mod serializer;
pub mod session;
pub mod status;
pub mod worker;

pub use config::Config;

use std::sync::Arc;

/// Starts serving on `config.bind:config.port`. Blocks forever.
pub fn run_server(config: Arc<Config>) -> std::io::Result<()> {
    listener::run(config)
}
