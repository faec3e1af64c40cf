//! The local node: identity, handler table, authenticators, listener.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::MaybeTlsStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::Client;
use crate::errors::Error;
use crate::protocol::KiteDescriptor;
use crate::request::Request;

/// Value returned by a method handler.
pub type HandlerResult = Result<Value, Error>;

/// Boxed future produced by a method handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

pub(crate) type HandlerFunc = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

pub(crate) type AuthenticatorFunc =
    Arc<dyn Fn(&mut Request) -> Result<(), Error> + Send + Sync>;

type FirstRequestHook = Arc<dyn Fn(&Client) + Send + Sync>;

/// Node-level configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Skip authentication of inbound requests.
    pub disable_authentication: bool,
}

/// A network participant: simultaneously serves and consumes methods.
///
/// A `Kite` holds the process-local state shared by all of its sessions:
/// its self-description, the named-handler table, the authenticator table,
/// and hooks fired when a session learns its remote identity. Clones share
/// the same node.
#[derive(Clone)]
pub struct Kite {
    inner: Arc<KiteInner>,
}

struct KiteInner {
    descriptor: RwLock<KiteDescriptor>,
    config: RwLock<Config>,
    handlers: RwLock<HashMap<String, HandlerFunc>>,
    authenticators: RwLock<HashMap<String, AuthenticatorFunc>>,
    on_first_request: RwLock<Vec<FirstRequestHook>>,
}

impl Kite {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Kite {
        let descriptor = KiteDescriptor {
            name: name.into(),
            version: version.into(),
            hostname: std::env::var("HOSTNAME").unwrap_or_default(),
            ..KiteDescriptor::default()
        };
        Kite {
            inner: Arc::new(KiteInner {
                descriptor: RwLock::new(descriptor),
                config: RwLock::new(Config::default()),
                handlers: RwLock::new(HashMap::new()),
                authenticators: RwLock::new(HashMap::new()),
                on_first_request: RwLock::new(Vec::new()),
            }),
        }
    }

    /// The self-description sent with every outbound request.
    pub fn descriptor(&self) -> KiteDescriptor {
        self.inner.descriptor.read().clone()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        self.inner.descriptor.write().username = username.into();
    }

    pub fn set_environment(&self, environment: impl Into<String>) {
        self.inner.descriptor.write().environment = environment.into();
    }

    /// Skip authentication of inbound requests on this node.
    pub fn disable_authentication(&self) {
        self.inner.config.write().disable_authentication = true;
    }

    pub(crate) fn config(&self) -> Config {
        self.inner.config.read().clone()
    }

    /// Register a named handler. Later registrations overwrite.
    pub fn handle_func<F, Fut>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: HandlerFunc = Arc::new(move |request| Box::pin(f(request)));
        self.inner.handlers.write().insert(method.into(), handler);
    }

    pub(crate) fn handler(&self, method: &str) -> Option<HandlerFunc> {
        self.inner.handlers.read().get(method).cloned()
    }

    /// Register an authenticator for an authentication type string. The
    /// authenticator sets the request's username on success.
    pub fn authenticator<F>(&self, auth_type: impl Into<String>, f: F)
    where
        F: Fn(&mut Request) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.inner
            .authenticators
            .write()
            .insert(auth_type.into(), Arc::new(f));
    }

    pub(crate) fn authenticator_for(&self, auth_type: &str) -> Option<AuthenticatorFunc> {
        self.inner.authenticators.read().get(auth_type).cloned()
    }

    /// Register a hook fired once per inbound session, on the first
    /// named-method call that carries the remote's self-description.
    pub fn on_first_request<F>(&self, f: F)
    where
        F: Fn(&Client) + Send + Sync + 'static,
    {
        self.inner.on_first_request.write().push(Arc::new(f));
    }

    pub(crate) fn call_on_first_request(&self, client: &Client) {
        let hooks: Vec<FirstRequestHook> =
            self.inner.on_first_request.read().iter().cloned().collect();
        for hook in hooks {
            if catch_unwind(AssertUnwindSafe(|| hook(client))).is_err() {
                warn!("first-request hook panicked");
            }
        }
    }

    /// Construct an outbound, unconnected session to a remote kite.
    pub fn new_client(&self, url: Url) -> Client {
        Client::outbound(self.clone(), url)
    }

    /// Construct an outbound session from a URL string.
    pub fn new_client_string(&self, url: &str) -> Result<Client, Error> {
        let parsed = Url::parse(url).map_err(|e| Error::generic(format!("invalid url: {e}")))?;
        Ok(self.new_client(parsed))
    }

    /// Serve inbound sessions: accept websocket upgrades and run one
    /// receive loop per connection. Sessions accepted here carry the peer
    /// address, which makes their requests subject to authentication.
    pub async fn listen(&self, addr: &str) -> io::Result<Listener> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, kite = %self.descriptor(), "listening");

        let kite = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };
                let kite = kite.clone();
                tokio::spawn(async move {
                    let ws =
                        match tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream)).await
                        {
                            Ok(ws) => ws,
                            Err(e) => {
                                warn!(%peer, "websocket handshake failed: {e}");
                                return;
                            }
                        };
                    debug!(%peer, "accepted session");
                    Client::accepted(kite, ws, peer);
                });
            }
        });

        Ok(Listener { local_addr, handle })
    }
}

/// Handle on a running accept loop. Dropping it stops accepting new
/// sessions; already-established sessions keep running.
pub struct Listener {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl Listener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
