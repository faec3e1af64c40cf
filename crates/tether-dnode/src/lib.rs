#![deny(unsafe_code)]

//! tether-dnode: the message encoding that carries cross-boundary callable
//! references inline with data.
//!
//! A message is a JSON object `{method, arguments, callbacks, links}` sent as
//! one websocket text frame. Functions never appear in the serialized
//! arguments; their *positions* do. Each side keeps a [`Scrubber`]: outbound
//! argument trees are walked, every callable is extracted into the registry
//! under a fresh numeric ID, and the ID-to-path map travels in the message's
//! `callbacks` field. Inbound, [`parse_callbacks`] rewrites each advertised
//! position into a reconstruction stamp that [`Partial::as_function`] turns
//! back into an invokable proxy bound to the session's sender.
//!
//! Rust has no runtime reflection, so the outbound tree is built explicitly
//! from [`Arg`] nodes; composites with named members and exported methods are
//! declared through [`ArgObject`].

mod arg;
mod errors;
mod message;
mod parse;
mod partial;
mod scrub;

pub use arg::{Arg, ArgObject, Callback, CallbackSender, Function, SendFuture};
pub use errors::{ArgumentError, ParseError, ScrubError};
pub use message::{Message, Method, Path, PathElement};
pub use parse::{parse_callbacks, CALLBACK_STAMP};
pub use partial::Partial;
pub use scrub::{CallbackMap, Scrubber};
