//! The wire message and the path coordinates used to locate callbacks.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit on the wire: one JSON object per websocket text frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Named handler or numeric callback ID.
    pub method: Method,
    /// Ordered sequence of JSON values. Functions are absent here; their
    /// positions are advertised in `callbacks`. Empty argument lists are
    /// `[]`, never `null`.
    pub arguments: Value,
    /// Callback ID (decimal string of a u64) to the path of the callable
    /// inside `arguments`.
    #[serde(default)]
    pub callbacks: HashMap<String, Path>,
    /// Reserved.
    #[serde(default)]
    pub links: Vec<Value>,
}

/// The `method` slot is a sum over named handlers and callback IDs.
///
/// Dispatch follows the JSON token kind: the string `"1"` is a method named
/// `"1"`, never callback 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// A named handler in the remote's handler table.
    Name(String),
    /// A callback ID in the remote's scrubber registry.
    Id(u64),
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Method::Name(name) => serializer.serialize_str(name),
            Method::Id(id) => serializer.serialize_u64(*id),
        }
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MethodVisitor;

        impl<'de> Visitor<'de> for MethodVisitor {
            type Value = Method;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a method name string or a non-negative callback id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Method, E> {
                Ok(Method::Name(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Method, E> {
                Ok(Method::Name(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Method, E> {
                Ok(Method::Id(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Method, E> {
                u64::try_from(v)
                    .map(Method::Id)
                    .map_err(|_| E::custom("callback id must be non-negative"))
            }
        }

        deserializer.deserialize_any(MethodVisitor)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Name(name) => f.write_str(name),
            Method::Id(id) => write!(f, "{id}"),
        }
    }
}

/// A coordinate into a nested argument tree.
pub type Path = Vec<PathElement>;

/// One step of a [`Path`]: integers index sequences, strings index mappings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Index(usize),
    Key(String),
}

impl From<usize> for PathElement {
    fn from(i: usize) -> Self {
        PathElement::Index(i)
    }
}

impl From<&str> for PathElement {
    fn from(k: &str) -> Self {
        PathElement::Key(k.to_owned())
    }
}
