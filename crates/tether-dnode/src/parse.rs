//! Inbound callback reconstruction.
//!
//! The wire placeholder at a callback position is ignored; the authority is
//! the message's `callbacks` map. Each advertised position is rewritten to a
//! reconstruction stamp, and [`Partial::as_function`](crate::Partial::as_function)
//! later turns a stamped slot into a proxy bound to the session's sender.

use serde_json::{json, Value};

use crate::errors::ParseError;
use crate::message::{Message, Path, PathElement};

/// Key of the reconstruction stamp written at callback positions.
pub const CALLBACK_STAMP: &str = "__rpc_callback__";

/// Rewrite every advertised callback position in `msg.arguments` into a
/// reconstruction stamp `{"__rpc_callback__": <id>}`.
///
/// Integers index sequences and strings index mappings. The final path
/// element may name a mapping key that is absent from the serialized
/// arguments (method-derived callbacks have no JSON presence); the entry is
/// created. Every intermediate element must match the tree.
///
/// Any stamp-shaped key already present in the raw arguments is removed
/// first: a position is a callback only when the `callbacks` map says so.
pub fn parse_callbacks(msg: &mut Message) -> Result<(), ParseError> {
    strip_stamps(&mut msg.arguments);
    for (id_str, path) in &msg.callbacks {
        let id: u64 = id_str
            .parse()
            .map_err(|_| ParseError::BadCallbackId(id_str.clone()))?;
        stamp(&mut msg.arguments, path, id)?;
    }
    Ok(())
}

fn strip_stamps(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(strip_stamps),
        Value::Object(map) => {
            map.remove(CALLBACK_STAMP);
            map.values_mut().for_each(strip_stamps);
        }
        _ => {}
    }
}

fn stamp(root: &mut Value, path: &Path, id: u64) -> Result<(), ParseError> {
    let mismatch = || ParseError::PathMismatch {
        id,
        path: path.clone(),
    };

    let Some((last, prefix)) = path.split_last() else {
        // An empty path would replace the whole argument array.
        return Err(mismatch());
    };

    let mut slot = root;
    for elem in prefix {
        slot = match (elem, slot) {
            (PathElement::Index(i), Value::Array(items)) => {
                items.get_mut(*i).ok_or_else(mismatch)?
            }
            (PathElement::Key(k), Value::Object(map)) => map.get_mut(k).ok_or_else(mismatch)?,
            _ => return Err(mismatch()),
        };
    }

    match (last, slot) {
        (PathElement::Index(i), Value::Array(items)) => {
            let target = items.get_mut(*i).ok_or_else(mismatch)?;
            *target = json!({ CALLBACK_STAMP: id });
        }
        (PathElement::Key(k), Value::Object(map)) => {
            map.insert(k.clone(), json!({ CALLBACK_STAMP: id }));
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}
