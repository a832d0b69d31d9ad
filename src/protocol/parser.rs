//! Inbound Chunk Interpretation
//!
//! There is no framing on the inbound side: whatever a single `recv` returns
//! is one message (a username, a password, or a command). A command split
//! across two TCP segments is therefore seen as two commands. This module only
//! decides what a chunk *means*; it never buffers across reads.

use std::borrow::Cow;

/// Token that ends an authenticated session
pub const DISCONNECT_TOKEN: &str = "DISCONNECT";

/// Strips the trailing line terminator a line-oriented client adds.
///
/// Only `\r` and `\n` at the end are removed; interior whitespace and
/// leading spaces are significant.
pub fn trim_line(chunk: &str) -> &str {
    chunk.trim_end_matches(['\r', '\n'])
}

/// Decodes a received chunk as text, replacing invalid UTF-8.
pub fn decode_chunk(chunk: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(chunk)
}

/// A reserved value in the inbound stream that ends the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sentinel {
    /// Any chunk containing this character disconnects.
    ///
    /// This is the legacy behaviour of the open profile and it collides with
    /// ordinary commands such as `quota` or `sqlite3`.
    ContainsChar(char),

    /// The chunk, minus its line terminator, must equal the token exactly.
    Exact(String),
}

impl Sentinel {
    /// The collision-prone `q` sentinel of the open profile.
    pub fn legacy() -> Self {
        Sentinel::ContainsChar('q')
    }

    /// The `DISCONNECT` sentinel of the auth profile.
    pub fn disconnect() -> Self {
        Sentinel::Exact(DISCONNECT_TOKEN.to_string())
    }

    /// Returns true if `chunk` asks the server to end the session.
    pub fn matches(&self, chunk: &str) -> bool {
        match self {
            Sentinel::ContainsChar(c) => chunk.contains(*c),
            Sentinel::Exact(token) => trim_line(chunk) == token,
        }
    }
}

impl Default for Sentinel {
    fn default() -> Self {
        Self::legacy()
    }
}
