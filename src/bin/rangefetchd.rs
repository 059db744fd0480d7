extern crate rangefetch;
extern crate argparse;
extern crate env_logger;
#[macro_use] extern crate log;

use std::env;

use argparse::{ArgumentParser, Store, ParseOption, StoreTrue};
use rangefetch::config::{Config, Scheme};

pub fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let mut bind = "127.0.0.1".to_string();
    let mut port: u16 = 8806;
    let mut threads: usize = 8;
    let mut first_size: u64 = 32 * 1024;
    let mut max_size: u64 = 32 * 1024;
    let mut down_rate: Option<u64> = None;
    let mut proxy: Option<String> = None;
    let mut https = false;

    {
        let mut ap = ArgumentParser::new();
        ap.set_description("RangeFetch: a local proxy that accelerates \
                             range-capable downloads with concurrent \
                             sub-range fetches.");
        ap.refer(&mut bind)
            .add_option(&["-b", "--bind"], Store, "Address to listen on");
        ap.refer(&mut port)
            .add_option(&["-p", "--port"], Store, "Port to listen on");
        ap.refer(&mut threads)
            .add_option(&["-t", "--threads"], Store, "Initial worker count");
        ap.refer(&mut first_size)
            .add_option(&["--first-size"], Store, "Probe range size, in bytes");
        ap.refer(&mut max_size)
            .add_option(&["--max-size"], Store, "Sub-range size, in bytes");
        ap.refer(&mut down_rate)
            .add_option(&["--down-rate"], ParseOption,
                "Target bytes/sec per worker; sets the rate-controller band");
        ap.refer(&mut proxy)
            .add_option(&["--proxy"], ParseOption, "Upstream proxy URL");
        ap.refer(&mut https)
            .add_option(&["--https"], StoreTrue, "Speak HTTPS to the origin");
        ap.parse_args_or_exit();
    }

    let mut config = Config::new();
    config.bind(bind).port(port).threads(threads)
        .first_size(first_size).max_size(max_size);
    if let Some(rate) = down_rate {
        config.down_rate(rate);
    }
    if let Some(proxy) = proxy {
        config.proxy(proxy);
    }
    if https {
        config.scheme(Scheme::Https);
    }
    let config = config.done();

    info!("rangefetchd starting on {}:{}", config.bind, config.port);
    if let Err(e) = rangefetch::run_server(config) {
        error!("server exited: {}", e);
        std::process::exit(1);
    }
}
