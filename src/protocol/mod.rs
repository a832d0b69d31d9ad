//! Wire Protocol
//!
//! The protocol is deliberately thin: inbound chunks are raw text, outbound
//! replies are raw output or a minimal HTTP response.
//!
//! ## Modules
//!
//! - `types`: Reply framing and the fixed handshake messages
//! - `parser`: Interpretation of inbound chunks (line trimming, sentinels)
//!
//! ## Example
//!
//! ```
//! use rexecd::protocol::{Framing, Sentinel};
//!
//! let sentinel = Sentinel::disconnect();
//! assert!(sentinel.matches("DISCONNECT\n"));
//!
//! let reply = Framing::Http.encode(b"ok\n");
//! assert!(reply.starts_with(b"HTTP/1.1 200 OK"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode_chunk, trim_line, Sentinel, DISCONNECT_TOKEN};
pub use types::{Framing, AUTH_FAILURE, AUTH_SUCCESS};
