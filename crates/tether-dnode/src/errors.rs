//! Codec-level error types.

use crate::message::Path;

/// Error from scrubbing an outbound argument tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrubError {
    /// A callable was found at the root of the tree. Callbacks must be
    /// nested inside a sequence or mapping so they have an addressable path.
    CallbackAtRoot,
}

impl std::fmt::Display for ScrubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrubError::CallbackAtRoot => {
                write!(f, "root element must be a sequence or mapping, not a function")
            }
        }
    }
}

impl std::error::Error for ScrubError {}

/// Error from reconstructing inbound callback positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A callback ID key was not a decimal unsigned integer.
    BadCallbackId(String),
    /// A path element did not match the shape of the argument tree at that
    /// position (integer over a non-array, key over a non-object, index out
    /// of range, missing intermediate key).
    PathMismatch { id: u64, path: Path },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::BadCallbackId(id) => write!(f, "invalid callback id: {id:?}"),
            ParseError::PathMismatch { id, path } => {
                write!(f, "callback {id} path {path:?} does not match arguments")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Error from typed extraction out of a [`Partial`](crate::Partial).
///
/// Handlers propagate these with `?`; the session reports them to the caller
/// as `argumentError` replies instead of tearing anything down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentError(String);

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        ArgumentError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "argument error: {}", self.0)
    }
}

impl std::error::Error for ArgumentError {}
