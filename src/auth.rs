//! Credential Verification
//!
//! The handshake only needs a yes/no answer for a (username, password) pair,
//! so verification is a single-method capability that sessions receive by
//! injection.

use crate::config::Credentials;

/// Decides whether a username/password pair may open a command session.
pub trait Authenticator: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Accepts exactly one configured credential pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Authenticator for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        self.credentials.username == username && self.credentials.password == password
    }
}
