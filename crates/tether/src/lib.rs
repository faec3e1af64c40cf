#![deny(unsafe_code)]

//! tether: a peer-to-peer RPC fabric in which every participant serves and
//! consumes methods over persistent bidirectional websocket sessions.
//!
//! A [`Kite`] is the process-local node: identity, handler table,
//! authenticators, and a listener for inbound sessions. A [`Client`] is one
//! session with a remote kite, whichever side opened it. Messages are
//! dnode-encoded JSON ([`dnode`]): arguments may carry callables in either
//! direction, and every outbound request attaches an ephemeral response
//! callback the remote invokes to reply.
//!
//! ```no_run
//! use serde_json::json;
//! use tether::{Arg, Kite};
//!
//! # async fn demo() -> Result<(), tether::Error> {
//! let kite = Kite::new("mathworker", "0.0.1");
//! kite.handle_func("square", |request| async move {
//!     let n: f64 = request
//!         .args
//!         .ok_or_else(|| tether::Error::argument("missing arguments"))?
//!         .one()?
//!         .decode()?;
//!     Ok(json!(n * n))
//! });
//!
//! let client = kite.new_client_string("ws://127.0.0.1:3636/kite")?;
//! client.dial().await?;
//! let result = client.tell("square", vec![Arg::json(4)]).await?;
//! assert_eq!(result.decode::<f64>()?, 16.0);
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod errors;
mod kite;
mod protocol;
mod request;

pub use backoff::RetryPolicy;
pub use client::{CallResponse, Client, DEFAULT_TELL_TIMEOUT, PRINT_RECV_ENV, PRINT_SEND_ENV};
pub use errors::Error;
pub use kite::{Config, HandlerFuture, HandlerResult, Kite, Listener};
pub use protocol::{Authentication, KiteDescriptor};
pub use request::{Request, Response};

pub use tether_dnode as dnode;
pub use tether_dnode::{Arg, ArgObject, Function, Partial};
