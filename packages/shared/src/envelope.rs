//! Message envelope exchanged between server and client.
//!
//! Every protocol message is a `(kind, user, payload)` triple. On the wire it is
//! a single JSON object:
//!
//! ```json
//! {"type":"MESSAGE","user":"alice","payload":"hello"}
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::username::{ROSTER_SEPARATOR, Username};

/// Payload sent with a LOGIN envelope
pub const LOGIN_PAYLOAD: &str = "User just logged in.";

/// Payload sent with a LOGOUT envelope
pub const LOGOUT_PAYLOAD: &str = "User just logged out.";

/// The four message kinds of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Login,
    Whoisin,
    Message,
    Logout,
}

impl EnvelopeKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Whoisin => "WHOISIN",
            Self::Message => "MESSAGE",
            Self::Logout => "LOGOUT",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvelopeKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(DecodeError::EmptyType),
            "LOGIN" => Ok(Self::Login),
            "WHOISIN" => Ok(Self::Whoisin),
            "MESSAGE" => Ok(Self::Message),
            "LOGOUT" => Ok(Self::Logout),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }
}

/// Errors produced while decoding an envelope
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not a JSON object with exactly the `type`, `user` and `payload` fields
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The `type` field is empty
    #[error("envelope type is empty")]
    EmptyType,

    /// The `type` field names no known message kind
    #[error("unknown envelope type '{0}'")]
    UnknownType(String),
}

/// Errors produced while encoding an envelope
#[derive(Debug, Error)]
#[error("failed to encode envelope: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// One protocol message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: EnvelopeKind,
    user: String,
    payload: String,
}

impl Envelope {
    pub fn new(kind: EnvelopeKind, user: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind,
            user: user.into(),
            payload: payload.into(),
        }
    }

    /// LOGIN announcing `user`
    pub fn login(user: &Username) -> Self {
        Self::new(EnvelopeKind::Login, user.as_str(), LOGIN_PAYLOAD)
    }

    /// WHOISIN sent by a client to ask for the roster
    pub fn whoisin_request(user: &Username) -> Self {
        Self::new(EnvelopeKind::Whoisin, user.as_str(), "")
    }

    /// WHOISIN carrying the roster, in registration order
    pub fn whoisin(user: &Username, users: &[Username]) -> Self {
        Self::new(EnvelopeKind::Whoisin, user.as_str(), roster_payload(users))
    }

    /// Chat line from `user`
    pub fn message(user: &Username, text: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::Message, user.as_str(), text)
    }

    /// LOGOUT announcing `user`
    pub fn logout(user: &Username) -> Self {
        Self::new(EnvelopeKind::Logout, user.as_str(), LOGOUT_PAYLOAD)
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} : {})", self.kind, self.user, self.payload)
    }
}

#[derive(Serialize)]
struct WireEnvelopeRef<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    user: &'a str,
    payload: &'a str,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    user: String,
    payload: String,
}

/// Serialize an envelope to its single-line JSON form.
pub fn encode(envelope: &Envelope) -> Result<String, EncodeError> {
    let wire = WireEnvelopeRef {
        kind: envelope.kind.as_str(),
        user: &envelope.user,
        payload: &envelope.payload,
    };
    Ok(serde_json::to_string(&wire)?)
}

/// Parse an envelope from its JSON form.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let wire: WireEnvelope = serde_json::from_str(text)?;
    let kind = wire.kind.parse()?;
    Ok(Envelope {
        kind,
        user: wire.user,
        payload: wire.payload,
    })
}

/// Join usernames into a WHOISIN payload.
pub fn roster_payload(users: &[Username]) -> String {
    let separator = ROSTER_SEPARATOR.to_string();
    users
        .iter()
        .map(Username::as_str)
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

/// Split a WHOISIN payload back into usernames.
///
/// Empty items are dropped, so a trailing separator is tolerated. Items that
/// are not valid usernames are skipped.
pub fn parse_roster_payload(payload: &str) -> Vec<Username> {
    payload
        .split(ROSTER_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match Username::new(item) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Skipping invalid roster entry '{}': {}", item, e);
                None
            }
        })
        .collect()
}
