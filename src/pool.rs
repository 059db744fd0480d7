//! HTTP connection pool (component A, §4.A): issues single ranged GETs,
//! follows redirects, and optionally routes everything through an upstream
//! proxy. Unlike the teacher's tokio-based client, every operation here
//! blocks the calling thread — each worker owns its socket for the
//! duration of one sub-range fetch (§5 "Scheduling model").

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use httparse;
use native_tls::TlsConnector;
use url::Url;

use crate::config::{Config, Scheme};
use crate::error::PoolError;

const MAX_HEADERS: usize = 64;
const MAX_REDIRECTS: u32 = 5;
const MAX_TRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

enum Stream {
    Plain(TcpStream),
    Tls(Box<native_tls::TlsStream<TcpStream>>),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

/// A streamed upstream response: status/headers are parsed eagerly, the
/// body is read incrementally by the caller (§4.A "Responses are
/// streamed").
pub struct Response {
    pub status: u16,
    headers: Vec<(String, String)>,
    stream: Stream,
    leftover: Vec<u8>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Reads up to `buf.len()` bytes of the body, draining any bytes the
    /// header parser had already buffered before touching the socket.
    pub fn read_body(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.leftover.is_empty() {
            let n = self.leftover.len().min(buf.len());
            buf[..n].copy_from_slice(&self.leftover[..n]);
            self.leftover.drain(..n);
            return Ok(n);
        }
        self.stream.read(buf)
    }
}

/// Connects to `url`'s authority (through `proxy` if configured), performs
/// one ranged GET, and parses the response line/headers. Does not follow
/// redirects or retry — that's `Pool::fetch`'s job.
fn request_once(
    url: &Url,
    proxy: Option<&Url>,
    headers: &[(String, String)],
    start: u64,
    end: Option<u64>,
) -> Result<Response, PoolError> {
    let dial_url = proxy.unwrap_or(url);
    let host = dial_url.host_str().ok_or(PoolError::UnsupportedScheme)?;
    let port = dial_url.port_or_known_default()
        .ok_or(PoolError::UnsupportedScheme)?;

    let tcp = TcpStream::connect((host, port))?;
    tcp.set_nodelay(true)?;

    let mut stream = if dial_url.scheme() == "https" {
        let connector = TlsConnector::new()
            .map_err(|e| PoolError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        let tls = connector.connect(host, tcp)
            .map_err(|e| PoolError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        Stream::Tls(Box::new(tls))
    } else {
        Stream::Plain(tcp)
    };

    // When proxied, the request target is the absolute URL; otherwise the
    // plain path+query (§4.A, §6 "Outbound HTTP").
    let target = if proxy.is_some() {
        url.as_str().to_string()
    } else {
        let mut t = url.path().to_string();
        if let Some(q) = url.query() {
            t.push('?');
            t.push_str(q);
        }
        t
    };

    let mut request = format!("GET {} HTTP/1.1\r\n", target);
    request.push_str(&format!("Host: {}\r\n", authority(url)));
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("host") {
            continue;
        }
        request.push_str(&format!("{}: {}\r\n", name, value));
    }
    match end {
        Some(end) => request.push_str(&format!("Range: bytes={}-{}\r\n", start, end)),
        None => request.push_str(&format!("Range: bytes={}-\r\n", start)),
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes())?;
    stream.flush()?;

    read_response(stream)
}

fn authority(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or(""), port),
        None => url.host_str().unwrap_or("").to_string(),
    }
}

fn read_response(mut stream: Stream) -> Result<Response, PoolError> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(PoolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof, "connection closed before headers")));
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut headers);
        match parsed.parse(&buf)? {
            httparse::Status::Complete(body_start) => {
                let status = parsed.code.unwrap_or(0);
                let headers = parsed.headers.iter()
                    .map(|h| (h.name.to_string(),
                              String::from_utf8_lossy(h.value).into_owned()))
                    .collect();
                let leftover = buf[body_start..].to_vec();
                return Ok(Response { status, headers, stream, leftover });
            }
            httparse::Status::Partial => {
                if buf.len() > 64 * 1024 {
                    return Err(PoolError::Io(io::Error::new(
                        io::ErrorKind::InvalidData, "response headers too large")));
                }
                continue;
            }
        }
    }
}

/// Resolves a `Location` header the way the original implementation does:
/// absolute URLs pass through, everything else becomes root-relative on the
/// current scheme+host — even a bare word with no leading slash (§6
/// "Outbound HTTP").
fn resolve_redirect(location: &str, scheme: &str, host: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        let path = if location.starts_with('/') {
            location.to_string()
        } else {
            format!("/{}", location)
        };
        format!("{}://{}{}", scheme, host, path)
    }
}

/// The HTTP connection pool (§4.A). Holds the server-wide config; owns no
/// persistent sockets of its own since every fetch is a fresh blocking
/// connection — the "pool" is really a concurrency cap enforced by the
/// bounded worker count, not a free list of reusable sockets (§5 "Connection
/// pool: internally synchronized; capped at `max_threads` concurrent
/// sockets").
pub struct Pool {
    config: Arc<Config>,
    proxy: Option<Url>,
}

impl Pool {
    pub fn new(config: Arc<Config>) -> Pool {
        let proxy = config.proxy.as_deref()
            .and_then(|p| Url::parse(p).ok());
        Pool { config, proxy }
    }

    /// Fetches `bytes=start-end` (or `start-` for an open end) from `url`,
    /// following redirects (capped) and retrying non-206 responses up to
    /// `MAX_TRIES` times with a backoff (§4.D step 5, §4.G PROBE).
    ///
    /// On a redirect, `*url` is updated in place so later fetches for the
    /// same session reuse the resolved location (§3 "Session").
    pub fn fetch(
        &self,
        url: &mut String,
        headers: &[(String, String)],
        start: u64,
        end: Option<u64>,
    ) -> Result<Response, PoolError> {
        let mut tries = 0;
        loop {
            match self.fetch_following_redirects(url, headers, start, end) {
                Ok(resp) if resp.status == 206 => return Ok(resp),
                Ok(resp) => {
                    tries += 1;
                    if tries >= MAX_TRIES {
                        return Err(PoolError::UnexpectedStatus(resp.status));
                    }
                    thread::sleep(RETRY_BACKOFF);
                }
                Err(e) => {
                    tries += 1;
                    if tries >= MAX_TRIES {
                        return Err(e);
                    }
                    thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }

    fn fetch_following_redirects(
        &self,
        url: &mut String,
        headers: &[(String, String)],
        start: u64,
        end: Option<u64>,
    ) -> Result<Response, PoolError> {
        for _ in 0..MAX_REDIRECTS {
            let parsed = Url::parse(url).map_err(|_| PoolError::UnsupportedScheme)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(PoolError::UnsupportedScheme);
            }
            let resp = request_once(&parsed, self.proxy.as_ref(), headers, start, end)?;
            if (300..400).contains(&resp.status) {
                if let Some(location) = resp.header("location") {
                    let scheme = match self.config.scheme {
                        Scheme::Https => "https",
                        Scheme::Http => "http",
                    };
                    let host = authority(&parsed);
                    *url = resolve_redirect(location, scheme, &host);
                    continue;
                }
            }
            return Ok(resp);
        }
        Err(PoolError::TooManyRedirects)
    }
}
