use std::time::Duration;

use tokio_tungstenite::tungstenite;

use crate::types::events::server::ErrorEvent;
use crate::types::CodecError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handshake was rejected because of the credentials.
    #[error("authentication failed (HTTP {status}): check your API key")]
    Authentication { status: u16 },

    /// The transport could not be established or dropped unexpectedly.
    #[error("connection failed: {0} (is the server reachable?)")]
    Connection(String),

    /// The server closed the socket.
    #[error("connection closed by server (code {code}): {reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// The session was closed locally.
    #[error("session closed")]
    Closed,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[cfg(feature = "utils")]
    #[error(transparent)]
    Device(#[from] crate::utils::DeviceError),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An `error` message sent by the server.
    #[error("server error {code} ({slug}): {message}")]
    Protocol {
        code: String,
        slug: String,
        message: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classifies a failed WebSocket handshake.
    pub(crate) fn from_handshake(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => {
                let status = response.status().as_u16();
                if status == 401 || status == 403 {
                    Error::Authentication { status }
                } else {
                    Error::Connection(format!("handshake rejected with HTTP {}", status))
                }
            }
            other => Error::Connection(other.to_string()),
        }
    }

    /// Maps a non-success REST status, keeping credential failures distinct.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Error::Authentication {
                status: status.as_u16(),
            },
            code => Error::Protocol {
                code: code.to_string(),
                slug: status.canonical_reason().unwrap_or("http_error").to_string(),
                message: body,
            },
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }
}

impl From<ErrorEvent> for Error {
    fn from(event: ErrorEvent) -> Self {
        Error::Protocol {
            code: event.code().to_string(),
            slug: event.slug().to_string(),
            message: event.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    fn rejected(status: u16) -> tungstenite::Error {
        let response = Response::builder().status(status).body(None).unwrap();
        tungstenite::Error::Http(response)
    }

    #[test]
    fn handshake_auth_rejection_is_distinct() {
        assert!(matches!(
            Error::from_handshake(rejected(401)),
            Error::Authentication { status: 401 }
        ));
        assert!(matches!(
            Error::from_handshake(rejected(403)),
            Error::Authentication { status: 403 }
        ));
        assert!(matches!(Error::from_handshake(rejected(502)), Error::Connection(_)));
        assert!(matches!(
            Error::from_handshake(tungstenite::Error::ConnectionClosed),
            Error::Connection(_)
        ));
    }

    #[test]
    fn messages_tell_bad_key_from_unreachable() {
        let auth = Error::Authentication { status: 401 }.to_string();
        let conn = Error::Connection("connection refused".to_string()).to_string();
        assert!(auth.contains("API key"));
        assert!(conn.contains("reachable"));
        assert!(!conn.contains("API key"));
    }

    #[test]
    fn error_events_become_protocol_errors() {
        let event = ErrorEvent::new("E0100", "bad request").with_slug("invalid_message");
        match Error::from(event) {
            Error::Protocol { code, slug, message } => {
                assert_eq!(code, "E0100");
                assert_eq!(slug, "invalid_message");
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
