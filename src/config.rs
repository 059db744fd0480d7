use std::sync::Arc;

/// Outbound scheme for the leg between this proxy and the origin (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// Server-wide configuration, set once at startup and shared read-only by
/// every session (§6 "Configuration").
///
/// Builder-style, following `client::Config` / `server::Config` in the
/// crate this one is descended from: construct with `Config::new()`, chain
/// setters, and finish with `.done()` to get the `Arc` every session holds.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub first_size: u64,
    pub max_size: u64,
    pub threads: usize,
    pub down_rate_min: u64,
    pub down_rate_max: u64,
    pub proxy: Option<String>,
    pub scheme: Scheme,
}

impl Config {
    /// Create a config with the defaults from §6.
    pub fn new() -> Config {
        Config {
            bind: String::new(),
            port: 8806,
            first_size: 32 * 1024,
            max_size: 32 * 1024,
            threads: 8,
            down_rate_min: 160 * 1024,
            down_rate_max: 360 * 1024,
            proxy: None,
            scheme: Scheme::Http,
        }
    }

    pub fn bind(&mut self, value: impl Into<String>) -> &mut Self {
        self.bind = value.into();
        self
    }

    pub fn port(&mut self, value: u16) -> &mut Self {
        self.port = value;
        self
    }

    pub fn first_size(&mut self, value: u64) -> &mut Self {
        self.first_size = value;
        self
    }

    pub fn max_size(&mut self, value: u64) -> &mut Self {
        self.max_size = value;
        self
    }

    pub fn threads(&mut self, value: usize) -> &mut Self {
        self.threads = value;
        self
    }

    /// Sets `down_rate_min = 1.5x`, `down_rate_max = 2.5x`, per §6.
    pub fn down_rate(&mut self, value: u64) -> &mut Self {
        self.down_rate_min = value * 3 / 2;
        self.down_rate_max = value * 5 / 2;
        self
    }

    pub fn proxy(&mut self, value: impl Into<String>) -> &mut Self {
        self.proxy = Some(value.into());
        self
    }

    pub fn scheme(&mut self, value: Scheme) -> &mut Self {
        self.scheme = value;
        self
    }

    /// Bound on live worker count for a session started with `threads`
    /// initial workers (§4.E).
    pub fn max_threads(&self) -> usize {
        (self.threads * 2).min(24)
    }

    /// Create an `Arc`'d config clone to pass to the listener.
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
