//! HTTP Basic credentials for the WebSocket handshake.
//!
//! The server authenticates the upgrade request with an
//! `Authorization: Basic base64(username:password)` header on top of the
//! client certificate. The password and the derived header are held in
//! [`Zeroizing`] buffers so they are wiped from memory when dropped.

use base64::prelude::*;
use zeroize::Zeroizing;

/// Username and password used for the handshake.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: Zeroizing<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the full `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> Zeroizing<String> {
        basic_authorization(&self.username, &self.password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Encodes `username:password` as an HTTP Basic authorization value.
#[must_use]
pub fn basic_authorization(username: &str, password: &str) -> Zeroizing<String> {
    let pair = Zeroizing::new(format!("{username}:{password}"));
    Zeroizing::new(format!("Basic {}", BASE64_STANDARD.encode(pair.as_bytes())))
}
