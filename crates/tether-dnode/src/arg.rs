//! Outbound argument trees and the callable envelope.
//!
//! Callables cannot be discovered by reflection here, so callers build the
//! outbound tree explicitly: plain JSON stays plain JSON, and positions that
//! carry callables use [`Function`] or [`ArgObject`]. The scrubber walks
//! this tree; serialization replaces every callable position with the
//! `"[Function]"` sentinel, which readers ignore in favor of the message's
//! `callbacks` map.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::partial::Partial;

/// The canonical callable signature: one raw argument blob in, nothing out.
pub type Callback = Arc<dyn Fn(Partial) + Send + Sync>;

/// Future returned by a [`CallbackSender`].
pub type SendFuture = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;

/// Send hook a session binds into reconstructed functions: invoking a proxy
/// with arguments `V` emits a message with `method = id` and `arguments = V`.
pub type CallbackSender = Arc<dyn Fn(u64, Value) -> SendFuture + Send + Sync>;

/// The canonical envelope around a callable.
///
/// Locally constructed functions wrap a [`Callback`] and are registered by
/// the scrubber when sent. Reconstructed functions (built from an inbound
/// callback position) wrap a callback ID and a sender; calling one invokes
/// the callable on the remote side. Sending a reconstructed function onward
/// registers it again under a fresh local ID whose callback forwards each
/// invocation back through the originating session.
#[derive(Clone)]
pub struct Function {
    kind: FunctionKind,
}

#[derive(Clone)]
enum FunctionKind {
    Local(Callback),
    Remote { id: u64, sender: CallbackSender },
}

impl Function {
    /// Wrap a local callable so it can travel inside an argument tree.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Partial) + Send + Sync + 'static,
    {
        Function {
            kind: FunctionKind::Local(Arc::new(f)),
        }
    }

    /// Build a proxy for a remote callable.
    pub fn remote(id: u64, sender: CallbackSender) -> Self {
        Function {
            kind: FunctionKind::Remote { id, sender },
        }
    }

    /// A callable view of this function, suitable for the scrubber's
    /// registry. A local function yields its own callback. A remote proxy
    /// yields a forwarding callback: invoking it relays the argument blob
    /// through the proxy's sender on its own task, so a capability received
    /// from one peer and sent onward to another keeps working as a
    /// double-hop proxy.
    pub(crate) fn to_callback(&self) -> Callback {
        match &self.kind {
            FunctionKind::Local(cb) => cb.clone(),
            FunctionKind::Remote { id, sender } => {
                let id = *id;
                let sender = sender.clone();
                Arc::new(move |args: Partial| {
                    let send = sender(id, args.into_value());
                    tokio::spawn(async move {
                        if let Err(e) = send.await {
                            warn!("forwarded callback send failed: {e}");
                        }
                    });
                })
            }
        }
    }

    /// The remote callback ID, if this is a reconstructed proxy.
    pub fn remote_id(&self) -> Option<u64> {
        match &self.kind {
            FunctionKind::Local(_) => None,
            FunctionKind::Remote { id, .. } => Some(*id),
        }
    }

    /// Invoke the callable with an argument list.
    ///
    /// A remote proxy sends `method = id, arguments = args` through its
    /// sender; a local function is applied directly.
    pub async fn call(&self, args: Vec<Value>) -> io::Result<()> {
        match &self.kind {
            FunctionKind::Local(cb) => {
                cb(Partial::plain(Value::Array(args)));
                Ok(())
            }
            FunctionKind::Remote { id, sender } => sender(*id, Value::Array(args)).await,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::Local(_) => f.write_str("Function(local)"),
            FunctionKind::Remote { id, .. } => write!(f, "Function(remote {id})"),
        }
    }
}

/// A node of an outbound argument tree.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Plain JSON. Contributes nothing to callback collection.
    Value(Value),
    /// Ordered sequence, traversed by index.
    Array(Vec<Arg>),
    /// Composite with named members and exported methods.
    Object(ArgObject),
    /// A callable position.
    Function(Function),
}

impl Arg {
    /// Convenience constructor from anything serde can serialize.
    ///
    /// Serialization failures collapse to `null`; callers with fallible
    /// payloads should serialize first and pass the `Value`.
    pub fn json<T: Serialize>(value: T) -> Arg {
        Arg::Value(serde_json::to_value(value).unwrap_or(Value::Null))
    }

    /// Serialized form of the tree. Callable positions become the
    /// `"[Function]"` sentinel; methods of composites do not serialize.
    pub fn to_value(&self) -> Value {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Array(items) => Value::Array(items.iter().map(Arg::to_value).collect()),
            Arg::Object(obj) => Value::Object(obj.to_map()),
            Arg::Function(_) => Value::String(FUNCTION_PLACEHOLDER.to_owned()),
        }
    }
}

/// Wire placeholder written at callable positions. Readers must trust the
/// message's `callbacks` map, never this value.
pub(crate) const FUNCTION_PLACEHOLDER: &str = "[Function]";

/// A composite argument: ordered named members plus exported methods.
///
/// Members always serialize; methods never do (they exist only as callback
/// registrations at `path + camelCased(name)`). A member added with
/// [`skip_callbacks`](ArgObject::skip_callbacks) serializes normally but is
/// not walked for callbacks, and [`embed`](ArgObject::embed) splices another
/// composite's members and methods in at the current path level.
#[derive(Debug, Clone, Default)]
pub struct ArgObject {
    pub(crate) members: Vec<Member>,
    pub(crate) methods: Vec<(String, Function)>,
}

#[derive(Debug, Clone)]
pub(crate) enum Member {
    Field {
        name: String,
        value: Arg,
        collect: bool,
    },
    Embedded(ArgObject),
}

impl ArgObject {
    pub fn new() -> Self {
        ArgObject::default()
    }

    /// Add a named member.
    pub fn field(mut self, name: impl Into<String>, value: Arg) -> Self {
        self.members.push(Member::Field {
            name: name.into(),
            value,
            collect: true,
        });
        self
    }

    /// Add a named member that is serialized but skipped for callback
    /// collection.
    pub fn skip_callbacks(mut self, name: impl Into<String>, value: Arg) -> Self {
        self.members.push(Member::Field {
            name: name.into(),
            value,
            collect: false,
        });
        self
    }

    /// Splice another composite in anonymously: its members and methods
    /// contribute at this composite's path level.
    pub fn embed(mut self, other: ArgObject) -> Self {
        self.members.push(Member::Embedded(other));
        self
    }

    /// Register an exported method. The callback path appends the
    /// camel-cased name (first character lowercased, rest untouched).
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Partial) + Send + Sync + 'static,
    {
        self.methods.push((name.into(), Function::new(f)));
        self
    }

    pub(crate) fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        self.fill_map(&mut map);
        map
    }

    fn fill_map(&self, map: &mut Map<String, Value>) {
        for member in &self.members {
            match member {
                Member::Field { name, value, .. } => {
                    map.insert(name.clone(), value.to_value());
                }
                Member::Embedded(inner) => inner.fill_map(map),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn functions_serialize_as_placeholder() {
        let arg = Arg::Array(vec![
            Arg::json("hello"),
            Arg::Function(Function::new(|_| {})),
        ]);
        assert_eq!(arg.to_value(), json!(["hello", "[Function]"]));
    }

    #[test]
    fn object_members_serialize_methods_do_not() {
        let obj = ArgObject::new()
            .field("topic", Arg::json("news"))
            .skip_callbacks("meta", Arg::json(json!({"v": 1})))
            .method("DoThing", |_| {});
        let value = Arg::Object(obj).to_value();
        assert_eq!(value, json!({"topic": "news", "meta": {"v": 1}}));
    }

    #[test]
    fn embedded_members_land_at_the_same_level() {
        let inner = ArgObject::new().field("nested", Arg::json(true));
        let outer = ArgObject::new().field("own", Arg::json(1)).embed(inner);
        assert_eq!(
            Arg::Object(outer).to_value(),
            json!({"own": 1, "nested": true})
        );
    }

    #[tokio::test]
    async fn local_function_call_applies_directly() {
        let (tx, rx) = std::sync::mpsc::channel();
        let f = Function::new(move |args| {
            tx.send(args.value().clone()).unwrap();
        });

        f.call(vec![json!(42)]).await.unwrap();
        assert_eq!(rx.recv().unwrap(), json!([42]));
    }
}
