//! TCP accept loop: one OS thread per accepted connection (§5 "Scheduling
//! model"), with the listening socket tuned the way a long-lived local
//! proxy daemon is expected to be (`SO_REUSEADDR`, a deep backlog). Each
//! accepted socket's `SO_SNDBUF` is read back and handed to the handler as
//! the session's chunk `bufsize` (§5, §10.6).

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::Config;
use crate::handler;

const LISTEN_BACKLOG: i32 = 1024;

/// Binds `config.bind:config.port` and serves forever, dispatching each
/// accepted connection to its own thread (§5).
pub fn run(config: Arc<Config>) -> std::io::Result<()> {
    let addr = SocketAddr::from_str(&format!("{}:{}", config.bind, config.port))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    let listener: std::net::TcpListener = socket.into();

    log::info!("listening on {}", addr);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("accept failed: {}", e);
                continue;
            }
        };
        let _ = stream.set_nodelay(true);
        let sndbuf = match stream.try_clone() {
            Ok(dup) => Socket::from(dup).send_buffer_size()
                .map(|n| n as u64)
                .unwrap_or(config.max_size),
            Err(_) => config.max_size,
        };
        let config = config.clone();
        thread::spawn(move || {
            let peer = stream.peer_addr().ok();
            if let Err(e) = handler::handle(&config, stream, sndbuf) {
                log::warn!("connection {:?} ended with an error: {}", peer, e);
            }
        });
    }
    Ok(())
}
