//! Inbound GET handler (component G, §4.G): parses the request line, probes
//! the origin, plans the delivery, writes response headers, and hands off
//! to the worker pool and serializer for the body.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::config::Config;
use crate::error::PoolError;
use crate::headers::{self, ParsedRange};
use crate::planner::{self, Plan};
use crate::pool::Pool;
use crate::session::{ProbeState, Session};
use crate::status::{HttpStatus, Status};
use crate::serializer;

/// One parsed inbound request line plus headers (§4.G PARSE).
struct Request {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
}

/// Handles one accepted connection end to end. Errors are logged by the
/// caller (the listener); this never panics on a malformed or hostile
/// request, it answers with a status line instead.
pub fn handle(config: &Arc<Config>, mut client: TcpStream, bufsize: u64) -> io::Result<()> {
    let peer = client.peer_addr().ok();
    let request = match read_request(&client) {
        Ok(req) => req,
        Err(_) => {
            write_error(&mut client, Status::InternalServerError)?;
            return Ok(());
        }
    };

    if request.method != "GET" {
        log::warn!("rejecting {} from {:?}: only GET is supported", request.method, peer);
        write_error(&mut client, Status::NotImplemented)?;
        return Ok(());
    }

    match run_session(config, &request, &mut client, bufsize) {
        Ok(()) => {}
        Err(HandlerError::BadRequest) => {
            write_error(&mut client, Status::InternalServerError)?;
        }
        Err(HandlerError::Probe(e)) => {
            log::warn!("probe failed for {}: {}", request.url, e);
            write_error(&mut client, Status::InternalServerError)?;
        }
    }
    Ok(())
}

enum HandlerError {
    BadRequest,
    Probe(PoolError),
}

/// PARSE + DECIDE_RANGE + PROBE + EMIT_HEADERS + handoff (§4.G).
fn run_session(config: &Arc<Config>, request: &Request, client: &mut TcpStream, bufsize: u64) -> Result<(), HandlerError> {
    // `live=1`, `range=`, and bare `range/` query markers indicate a request
    // this proxy does not understand how to accelerate (§4.G PARSE, §1
    // Non-goals): answer 500 rather than silently fetching the whole body.
    if request.url.contains("live=1")
        || request.url.contains("range=")
        || request.url.contains("range/")
    {
        return Err(HandlerError::BadRequest);
    }

    let client_range = request.headers.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("range"))
        .map(|(_, value)| value.as_str());

    let parsed_range: Option<ParsedRange> = match client_range {
        Some(value) => {
            let parsed = headers::parse_range(value).ok_or(HandlerError::BadRequest)?;
            Some(parsed)
        }
        None => None,
    };

    let pool = Pool::new(config.clone());
    let forward_headers = headers::forwardable_headers(&request.headers);

    let first_end = parsed_range
        .map(|r| r.start + config.first_size - 1)
        .unwrap_or(config.first_size - 1);
    let probe_start = parsed_range.map(|r| r.start).unwrap_or(0);

    let mut url = request.url.clone();
    let response = pool.fetch(&mut url, &forward_headers, probe_start, Some(first_end))
        .map_err(HandlerError::Probe)?;

    let content_range = response.header("content-range").ok_or(HandlerError::BadRequest)?;
    let (probe_resp_start, probe_resp_end, length) =
        headers::parse_content_range(content_range).ok_or(HandlerError::BadRequest)?;

    let client_range_end = parsed_range.and_then(|r| r.end).unwrap_or(0);
    let plan: Plan = planner::plan(
        probe_resp_start, probe_resp_end, length,
        client_range_end, client_range.is_some(), config.max_size,
    );

    write_headers(client, &plan).map_err(|_| HandlerError::BadRequest)?;

    let probe = ProbeState { start: probe_resp_start, end: probe_resp_end, response };
    let session = Session::new(
        pool, url, forward_headers,
        bufsize, plan.content_length(), config.max_size,
        config.threads, config.max_threads(),
        config.down_rate_min, config.down_rate_max,
        plan.range_start, probe, plan.sub_ranges,
    );
    session.adjust_threads(config.threads);

    serializer::run(&session, client).map_err(|_| HandlerError::BadRequest)
}

fn write_headers(client: &mut TcpStream, plan: &Plan) -> io::Result<()> {
    write!(client, "HTTP/1.1 {} {}\r\n", plan.status.code(), plan.status.reason())?;
    write!(client, "Content-Length: {}\r\n", plan.content_length())?;
    if plan.status == Status::PartialContent {
        write!(client, "Content-Range: {}\r\n", plan.content_range_header())?;
    }
    write!(client, "Accept-Ranges: bytes\r\n")?;
    write!(client, "Connection: keep-alive\r\n")?;
    write!(client, "\r\n")?;
    client.flush()
}

fn write_error(client: &mut TcpStream, status: Status) -> io::Result<()> {
    let body = status.reason();
    write!(client, "HTTP/1.1 {} {}\r\n", status.code(), status.reason())?;
    write!(client, "Content-Length: {}\r\n", body.len())?;
    write!(client, "Connection: keep-alive\r\n\r\n")?;
    write!(client, "{}", body)?;
    client.flush()
}

fn read_request(client: &TcpStream) -> io::Result<Request> {
    let mut reader = BufReader::new(client.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.trim_end().splitn(3, ' ');
    let method = parts.next().unwrap_or("").to_string();
    let url = parts.next().unwrap_or("").to_string();
    if method.is_empty() || url.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad request line"));
    }

    let mut headers = Vec::new();
    loop {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line)? == 0 {
            break;
        }
        let trimmed = header_line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    Ok(Request { method, url, headers })
}
