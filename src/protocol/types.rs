//! Wire Reply Types
//!
//! The server has no structured protocol. A reply is either the raw bytes a
//! command produced or, with HTTP framing, those bytes wrapped in a minimal
//! single-shot `200 OK` response.
//!
//! ## Formats
//!
//! Raw: `<output>`
//!
//! HTTP:
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/plain\r\n
//! Content-Length: <len>\r\n
//! Connection: close\r\n
//! \r\n
//! <output>
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// The CRLF terminator used in HTTP headers
pub const CRLF: &[u8] = b"\r\n";

/// Sent after a successful handshake
pub const AUTH_SUCCESS: &[u8] = b"Authentication successful\n";

/// Sent before the connection is dropped on a bad handshake
pub const AUTH_FAILURE: &[u8] = b"Authentication failed\n";

/// How command output is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Output bytes are written as-is and the session continues.
    #[default]
    Raw,

    /// Output is wrapped in an `HTTP/1.1 200 OK` response and the
    /// connection is closed once it has been written.
    Http,
}

impl Framing {
    /// Returns true if the connection must close after one reply.
    pub fn is_single_shot(&self) -> bool {
        matches!(self, Framing::Http)
    }

    /// Frames command output for the wire.
    ///
    /// # Example
    /// ```
    /// use rexecd::protocol::Framing;
    /// assert_eq!(&Framing::Raw.encode(b"hi\n")[..], b"hi\n");
    /// ```
    pub fn encode(&self, output: &[u8]) -> Bytes {
        match self {
            Framing::Raw => Bytes::copy_from_slice(output),
            Framing::Http => {
                let mut buf = BytesMut::with_capacity(output.len() + 128);
                buf.put_slice(b"HTTP/1.1 200 OK");
                buf.put_slice(CRLF);
                buf.put_slice(b"Content-Type: text/plain");
                buf.put_slice(CRLF);
                buf.put_slice(format!("Content-Length: {}", output.len()).as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(b"Connection: close");
                buf.put_slice(CRLF);
                buf.put_slice(CRLF);
                buf.put_slice(output);
                buf.freeze()
            }
        }
    }
}
