//! Client identifier type.

use std::fmt;
use std::net::SocketAddr;

/// Prefix for identities synthesized on behalf of legacy senders.
const LEGACY_PREFIX: &str = "legacy_";

/// Opaque identifier for a heartbeat client.
///
/// Identity is the string the client announces in its `HELLO`/`HEARTBEAT`
/// messages, not its network address; a client keeps its session across
/// address changes. Senders speaking the legacy no-id protocol get an
/// identity synthesized from their IP via [`ClientId::legacy`], which is
/// stable across calls as long as the sender's address is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client ID from a client-supplied string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesize a deterministic ID for a legacy sender.
    ///
    /// Uses only the IP, not the port, so repeated datagrams from the same
    /// host map to the same session even when the source port changes.
    pub fn legacy(addr: &SocketAddr) -> Self {
        Self(format!("{}{}", LEGACY_PREFIX, addr.ip()))
    }

    /// Whether this ID was synthesized for a legacy sender.
    pub fn is_legacy(&self) -> bool {
        self.0.starts_with(LEGACY_PREFIX)
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
