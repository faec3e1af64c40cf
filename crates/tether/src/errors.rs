//! The tagged error surfaced to callers and carried on the wire.

use serde::{Deserialize, Serialize};
use tether_dnode::{ArgumentError, Partial};

/// A kite-level error: a tagged `{type, message}` object.
///
/// Protocol-layer errors never unwind a session; they are reported to the
/// originating caller when one is discernible and logged otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl Error {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Outbound transport failure.
    pub fn send(message: impl std::fmt::Display) -> Self {
        Error::new("sendError", message.to_string())
    }

    /// No reply within the deadline.
    pub fn timeout(message: impl Into<String>) -> Self {
        Error::new("timeout", message)
    }

    /// Session lost before the reply arrived.
    pub fn disconnect() -> Self {
        Error::new("disconnect", "remote kite has disconnected")
    }

    /// Named method missing in the remote handler table.
    pub fn method_not_found(method: &str) -> Self {
        Error::new("methodNotFound", format!("method {method:?} is not found"))
    }

    /// Numeric callback ID not registered locally.
    pub fn callback_not_found(id: u64) -> Self {
        Error::new("callbackNotFound", format!("callback {id} is not found"))
    }

    /// Missing, unknown-type, or rejected credentials.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::new("authenticationError", message)
    }

    /// Deserialization or extraction failure on handler input.
    pub fn argument(message: impl Into<String>) -> Self {
        Error::new("argumentError", message)
    }

    /// Reply payload malformed.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Error::new("invalidResponse", message)
    }

    /// Anything else. The originating panic or failure is logged, not
    /// propagated.
    pub fn generic(message: impl Into<String>) -> Self {
        Error::new("genericError", message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tether error {} - {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<ArgumentError> for Error {
    fn from(e: ArgumentError) -> Self {
        Error::argument(e.message().to_owned())
    }
}

/// Failure while processing one inbound frame. These route through the
/// session's central error handler; only transport failures end the loop.
#[derive(Debug)]
pub(crate) enum ProcessError {
    Decode(serde_json::Error),
    Parse(tether_dnode::ParseError),
    MethodNotFound { method: String, args: Partial },
    CallbackNotFound { id: u64 },
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Decode(e) => write!(f, "malformed message: {e}"),
            ProcessError::Parse(e) => write!(f, "callback reconstruction failed: {e}"),
            ProcessError::MethodNotFound { method, .. } => {
                write!(f, "method {method:?} is not found")
            }
            ProcessError::CallbackNotFound { id } => write!(f, "callback {id} is not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_is_type_and_message() {
        let err = Error::timeout("no response to \"slow\" in 100ms");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"type": "timeout", "message": "no response to \"slow\" in 100ms"})
        );

        let back: Error = serde_json::from_value(json!({
            "type": "methodNotFound",
            "message": "method \"nope\" is not found"
        }))
        .unwrap();
        assert_eq!(back.kind, "methodNotFound");
    }

    #[test]
    fn argument_errors_convert() {
        let err: Error = ArgumentError::new("expected a sequence").into();
        assert_eq!(err.kind, "argumentError");
        assert!(err.message.contains("expected a sequence"));
    }
}
