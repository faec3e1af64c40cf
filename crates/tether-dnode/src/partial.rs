//! Lazily-typed access to a decoded argument fragment.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::arg::{CallbackSender, Function};
use crate::errors::ArgumentError;
use crate::parse::CALLBACK_STAMP;

/// A decoded JSON fragment handed to handlers and callbacks.
///
/// Sub-fragments produced by [`get`](Partial::get), [`at`](Partial::at),
/// [`one`](Partial::one) and friends share the parent's sender, so a
/// reconstructed callback found anywhere in the tree stays invokable.
/// Extraction helpers return [`ArgumentError`] rather than panicking.
#[derive(Clone)]
pub struct Partial {
    value: Value,
    sender: Option<CallbackSender>,
}

impl Partial {
    /// Wrap a fragment with the session sender used to invoke any
    /// reconstructed callbacks inside it.
    pub fn new(value: Value, sender: CallbackSender) -> Self {
        Partial {
            value,
            sender: Some(sender),
        }
    }

    /// Wrap a fragment with no sender. Reconstructed callbacks inside it
    /// cannot be invoked.
    pub fn plain(value: Value) -> Self {
        Partial {
            value,
            sender: None,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    fn child(&self, value: Value) -> Partial {
        Partial {
            value,
            sender: self.sender.clone(),
        }
    }

    /// The elements of a sequence fragment.
    pub fn slice(&self) -> Result<Vec<Partial>, ArgumentError> {
        match &self.value {
            Value::Array(items) => Ok(items.iter().map(|v| self.child(v.clone())).collect()),
            other => Err(ArgumentError::new(format!(
                "expected a sequence, got: {other}"
            ))),
        }
    }

    /// The elements of a sequence fragment of exactly length `n`.
    pub fn slice_of_length(&self, n: usize) -> Result<Vec<Partial>, ArgumentError> {
        let items = self.slice()?;
        if items.len() != n {
            return Err(ArgumentError::new(format!(
                "expected a sequence of length {n}, got length {}",
                items.len()
            )));
        }
        Ok(items)
    }

    /// The single element of a one-element sequence.
    pub fn one(&self) -> Result<Partial, ArgumentError> {
        Ok(self.slice_of_length(1)?.remove(0))
    }

    /// Member of a mapping fragment, if present.
    pub fn get(&self, key: &str) -> Option<Partial> {
        self.value
            .as_object()
            .and_then(|map| map.get(key))
            .map(|v| self.child(v.clone()))
    }

    /// Element of a sequence fragment, if in range.
    pub fn at(&self, index: usize) -> Option<Partial> {
        self.value
            .as_array()
            .and_then(|items| items.get(index))
            .map(|v| self.child(v.clone()))
    }

    /// Deserialize the fragment into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ArgumentError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| ArgumentError::new(e.to_string()))
    }

    /// True if this fragment is a reconstructed callback position.
    pub fn is_function(&self) -> bool {
        self.stamp_id().is_some()
    }

    /// Turn a reconstructed callback position into an invokable proxy.
    ///
    /// Returns `None` if the fragment is not a callback position or the
    /// fragment carries no sender.
    pub fn as_function(&self) -> Option<Function> {
        let id = self.stamp_id()?;
        let sender = self.sender.clone()?;
        Some(Function::remote(id, sender))
    }

    fn stamp_id(&self) -> Option<u64> {
        self.value
            .as_object()
            .and_then(|map| map.get(CALLBACK_STAMP))
            .and_then(Value::as_u64)
    }
}

impl std::fmt::Debug for Partial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Partial").field(&self.value).finish()
    }
}
