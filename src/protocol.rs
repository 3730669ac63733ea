//! Wire codec for the warden's UDP text protocol.
//!
//! Datagrams are short UTF-8 strings, at most two fields separated by `|`,
//! with case-insensitive keywords. Anything the codec does not recognize
//! decodes to [`Message::Unknown`] rather than an error: a stray or
//! malformed datagram must never disturb message processing. The only hard
//! decode failure is a datagram that is not UTF-8 at all.

use std::fmt;

use thiserror::Error;

use crate::session::ClientId;

/// Upper bound on inbound datagram size, in bytes.
///
/// Matches the protocol contract (messages are well under this); longer
/// datagrams are truncated by the read buffer and will decode as `Unknown`.
pub const MAX_DATAGRAM_LEN: usize = 512;

/// Field separator within a message.
pub const DELIMITER: char = '|';

/// An inbound protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `AYA`: liveness-of-service query; carries no payload.
    Probe,
    /// `START_HEARTBEAT`: global start-of-activity request.
    Trigger,
    /// `HELLO|<id>`: handshake announcing a new or returning client.
    Hello(ClientId),
    /// `<id>|HEARTBEAT`: liveness signal for an existing or new client.
    Heartbeat(ClientId),
    /// `<id>|KILL`: explicit departure notice for one client.
    Kill(ClientId),
    /// Bare `HEARTBEAT`, the no-id form; the dispatcher synthesizes an
    /// identity from the sender's address.
    LegacyHeartbeat,
    /// Bare `KILL`, the no-id form; an operator override that terminates
    /// the active phase regardless of remaining clients.
    LegacyKill,
    /// Anything else. Never an error; handled as a logged no-op.
    Unknown(String),
}

/// A reply the warden sends back to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `NO`: probe answer while dormant, the service is not active yet.
    NotReady,
    /// `YES|READY`: probe answer while active.
    Ready,
    /// `ACK`: trigger acknowledgment.
    Ack,
    /// `WELCOME`: handshake acknowledgment.
    Welcome,
}

/// Error for a datagram that cannot be decoded as text at all.
///
/// Unrecognized but well-formed text never errors; it decodes to
/// [`Message::Unknown`].
#[derive(Debug, Error)]
#[error("datagram is not valid UTF-8: {0}")]
pub struct DecodeError(#[from] std::str::Utf8Error);

impl Message {
    /// Decode a datagram.
    ///
    /// Surrounding whitespace is trimmed and keywords are matched
    /// case-insensitively. The message splits on the first `|` into at most
    /// two fields; which variant a two-field message maps to is decided by
    /// the fields present, so a first field that is not a reserved keyword
    /// means the `<id>|<command>` form.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(Self::from_text(text))
    }

    fn from_text(text: &str) -> Self {
        let msg = text.trim();

        if msg.eq_ignore_ascii_case("AYA") {
            return Message::Probe;
        }
        if msg.eq_ignore_ascii_case("START_HEARTBEAT") {
            return Message::Trigger;
        }

        if let Some((first, second)) = msg.split_once(DELIMITER) {
            // HELLO is reserved; everything else in first position is an id.
            if first.eq_ignore_ascii_case("HELLO") && !second.is_empty() {
                return Message::Hello(ClientId::new(second));
            }
            if !first.is_empty() && !first.eq_ignore_ascii_case("HELLO") {
                if second.eq_ignore_ascii_case("HEARTBEAT") {
                    return Message::Heartbeat(ClientId::new(first));
                }
                if second.eq_ignore_ascii_case("KILL") {
                    return Message::Kill(ClientId::new(first));
                }
            }
            return Message::Unknown(msg.to_string());
        }

        if msg.eq_ignore_ascii_case("HEARTBEAT") {
            return Message::LegacyHeartbeat;
        }
        if msg.eq_ignore_ascii_case("KILL") {
            return Message::LegacyKill;
        }

        Message::Unknown(msg.to_string())
    }

    /// Encode this message to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Probe => f.write_str("AYA"),
            Message::Trigger => f.write_str("START_HEARTBEAT"),
            Message::Hello(id) => write!(f, "HELLO{}{}", DELIMITER, id),
            Message::Heartbeat(id) => write!(f, "{}{}HEARTBEAT", id, DELIMITER),
            Message::Kill(id) => write!(f, "{}{}KILL", id, DELIMITER),
            Message::LegacyHeartbeat => f.write_str("HEARTBEAT"),
            Message::LegacyKill => f.write_str("KILL"),
            Message::Unknown(s) => f.write_str(s),
        }
    }
}

impl Reply {
    /// The wire text of this reply.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reply::NotReady => "NO",
            Reply::Ready => "YES|READY",
            Reply::Ack => "ACK",
            Reply::Welcome => "WELCOME",
        }
    }

    /// The wire bytes of this reply.
    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(s: &str) -> Message {
        Message::decode(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_decode_probe() {
        assert_eq!(decode("AYA"), Message::Probe);
        assert_eq!(decode("aya"), Message::Probe);
        assert_eq!(decode("  AYA \n"), Message::Probe);
    }

    #[test]
    fn test_decode_trigger() {
        assert_eq!(decode("START_HEARTBEAT"), Message::Trigger);
        assert_eq!(decode("start_heartbeat"), Message::Trigger);
    }

    #[test]
    fn test_decode_hello() {
        assert_eq!(decode("HELLO|nas-01"), Message::Hello(ClientId::new("nas-01")));
        assert_eq!(decode("hello|nas-01"), Message::Hello(ClientId::new("nas-01")));
    }

    #[test]
    fn test_decode_heartbeat_with_id() {
        assert_eq!(
            decode("nas-01|HEARTBEAT"),
            Message::Heartbeat(ClientId::new("nas-01"))
        );
        assert_eq!(
            decode("nas-01|heartbeat"),
            Message::Heartbeat(ClientId::new("nas-01"))
        );
    }

    #[test]
    fn test_decode_kill_with_id() {
        assert_eq!(decode("nas-01|KILL"), Message::Kill(ClientId::new("nas-01")));
    }

    #[test]
    fn test_decode_legacy_forms() {
        assert_eq!(decode("HEARTBEAT"), Message::LegacyHeartbeat);
        assert_eq!(decode("heartbeat"), Message::LegacyHeartbeat);
        assert_eq!(decode("KILL"), Message::LegacyKill);
    }

    #[test]
    fn test_decode_unknown() {
        assert!(matches!(decode("PING"), Message::Unknown(_)));
        assert!(matches!(decode(""), Message::Unknown(_)));
        assert!(matches!(decode("nas-01|RESTART"), Message::Unknown(_)));
    }

    #[test]
    fn test_decode_bars_only_is_unknown() {
        // "|||" splits into "" and "||": neither field is usable.
        assert!(matches!(decode("|||"), Message::Unknown(_)));
    }

    #[test]
    fn test_decode_empty_id_is_unknown() {
        // An empty id is not a usable identity; degrade instead of
        // registering a session keyed by "".
        assert!(matches!(decode("HELLO|"), Message::Unknown(_)));
        assert!(matches!(decode("|HEARTBEAT"), Message::Unknown(_)));
        assert!(matches!(decode("|KILL"), Message::Unknown(_)));
    }

    #[test]
    fn test_decode_splits_on_first_delimiter_only() {
        // The id is everything before the first bar; the rest must still
        // name a known command.
        assert!(matches!(decode("a|b|c"), Message::Unknown(_)));
        assert_eq!(decode("HELLO|a|b"), Message::Hello(ClientId::new("a|b")));
    }

    #[test]
    fn test_decode_hello_keyword_takes_precedence() {
        // A sender may not claim the reserved HELLO keyword as an id.
        assert_eq!(
            decode("HELLO|HEARTBEAT"),
            Message::Hello(ClientId::new("HEARTBEAT"))
        );
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = Message::decode(&[0xff, 0xfe, b'A']).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_encode_message_forms() {
        assert_eq!(Message::Probe.encode(), b"AYA");
        assert_eq!(Message::Trigger.encode(), b"START_HEARTBEAT");
        assert_eq!(
            Message::Hello(ClientId::new("nas-01")).encode(),
            b"HELLO|nas-01"
        );
        assert_eq!(
            Message::Heartbeat(ClientId::new("nas-01")).encode(),
            b"nas-01|HEARTBEAT"
        );
        assert_eq!(Message::Kill(ClientId::new("nas-01")).encode(), b"nas-01|KILL");
        assert_eq!(Message::LegacyKill.encode(), b"KILL");
    }

    #[test]
    fn test_reply_wire_text() {
        assert_eq!(Reply::NotReady.as_bytes(), b"NO");
        assert_eq!(Reply::Ready.as_bytes(), b"YES|READY");
        assert_eq!(Reply::Ack.as_bytes(), b"ACK");
        assert_eq!(Reply::Welcome.as_bytes(), b"WELCOME");
    }
}
