//! Server Configuration
//!
//! Compile-time defaults plus the [`ServerConfig`] struct the binary fills in
//! from command-line arguments. There are three wire profiles:
//!
//! | Profile         | Handshake | Framing | Disconnect sentinel        |
//! |-----------------|-----------|---------|----------------------------|
//! | `open`          | none      | raw     | any chunk containing `q`   |
//! | `auth`          | user/pass | raw     | exactly `DISCONNECT`       |
//! | `http`          | none      | HTTP    | any chunk containing `q`   |

use crate::protocol::{Framing, Sentinel};
use std::fmt;
use std::str::FromStr;

/// The default host to bind to (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default port to listen on
pub const DEFAULT_PORT: u16 = 8080;

/// Pending-connection backlog passed to `listen(2)`
pub const LISTEN_BACKLOG: i32 = 128;

/// Maximum readiness events handled per reactor wake
pub const MAX_EVENTS: usize = 10;

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 8;

/// Size of a single `recv` on a client socket
pub const READ_BUFFER_SIZE: usize = 1024;

/// Built-in credential used by the `auth` profile
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "password";

/// Which wire protocol variant the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Open,
    Auth,
    Http,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Profile::Open),
            "auth" => Ok(Profile::Auth),
            "http" => Ok(Profile::Http),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Open => "open",
            Profile::Auth => "auth",
            Profile::Http => "http",
        };
        f.write_str(name)
    }
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Readiness events handled per reactor wake
    pub max_events: usize,
    /// Bytes requested per `recv`
    pub read_buffer_size: usize,
    /// Response framing
    pub framing: Framing,
    /// Token that ends a command session
    pub sentinel: Sentinel,
    /// When set, clients must authenticate before running commands
    pub credentials: Option<Credentials>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Open)
    }
}

impl ServerConfig {
    /// Builds the configuration preset for a wire profile.
    pub fn for_profile(profile: Profile) -> Self {
        let base = Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            max_events: MAX_EVENTS,
            read_buffer_size: READ_BUFFER_SIZE,
            framing: Framing::Raw,
            sentinel: Sentinel::legacy(),
            credentials: None,
        };

        match profile {
            Profile::Open => base,
            Profile::Auth => Self {
                sentinel: Sentinel::disconnect(),
                credentials: Some(Credentials::default()),
                ..base
            },
            Profile::Http => Self {
                framing: Framing::Http,
                ..base
            },
        }
    }

    /// Turns on the handshake with an explicit username and/or password,
    /// filling the missing half from the defaults.
    ///
    /// An authenticated session always ends on `DISCONNECT`, whatever
    /// profile the configuration started from.
    pub fn with_credentials(self, username: Option<String>, password: Option<String>) -> Self {
        if username.is_none() && password.is_none() {
            return self;
        }

        let defaults = Credentials::default();
        Self {
            credentials: Some(Credentials::new(
                username.unwrap_or(defaults.username),
                password.unwrap_or(defaults.password),
            )),
            sentinel: Sentinel::disconnect(),
            ..self
        }
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
