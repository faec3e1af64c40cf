//! The connected session: full-duplex message loop over a websocket.
//!
//! A `Client` is one persistent bidirectional channel to a remote kite.
//! Only the receive loop reads frames; every frame is processed on its own
//! task (awaited per-frame in serial mode). Sends are serialized through an
//! async mutex over the write half. On a read failure the session fires its
//! disconnect hooks, fans out to in-flight waiters by closing and rotating
//! the disconnect signal, and redials under exponential backoff when
//! reconnect is enabled.

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use tether_dnode::{
    parse_callbacks, Arg, ArgObject, Callback, CallbackMap, CallbackSender, Function, Message,
    Method, Partial, PathElement, Scrubber,
};

use crate::backoff::{Backoff, RetryPolicy};
use crate::errors::{Error, ProcessError};
use crate::kite::Kite;
use crate::protocol::{Authentication, KiteDescriptor};
use crate::request::Response;

/// Default deadline for replies to [`Client::tell`].
pub const DEFAULT_TELL_TIMEOUT: Duration = Duration::from_secs(4);

/// Echo every sent frame to stderr when set.
pub const PRINT_SEND_ENV: &str = "TETHER_PRINT_SEND";
/// Echo every received frame to stderr when set.
pub const PRINT_RECV_ENV: &str = "TETHER_PRINT_RECV";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// One reply to an outbound call. An error reply may still carry a result
/// fragment sent by the remote.
#[derive(Debug)]
pub struct CallResponse {
    pub result: Option<Partial>,
    pub error: Option<Error>,
}

/// A session with a remote kite. Clones share the same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    local: Kite,
    remote: RwLock<KiteDescriptor>,
    url: Mutex<Option<Url>>,
    authentication: Mutex<Option<Authentication>>,
    /// Peer address for accepted sessions; empty for sessions we dialed.
    remote_addr: Mutex<String>,
    reconnect: AtomicBool,
    concurrent: AtomicBool,
    tell_timeout: Mutex<Duration>,
    redial: Mutex<RetryPolicy>,
    scrubber: Scrubber,
    sink: AsyncMutex<Option<WsSink>>,
    disconnect: DisconnectSignal,
    on_connect: RwLock<Vec<Hook>>,
    on_disconnect: RwLock<Vec<Hook>>,
    first_request: Once,
}

/// Broadcast to in-flight waiters on disconnect: the current channel is
/// closed to fan out, then replaced with a fresh one. Waiters must capture
/// a snapshot with [`subscribe`](DisconnectSignal::subscribe) before
/// waiting.
struct DisconnectSignal {
    tx: Mutex<watch::Sender<bool>>,
}

impl DisconnectSignal {
    fn new() -> Self {
        DisconnectSignal {
            tx: Mutex::new(watch::channel(false).0),
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.lock().subscribe()
    }

    fn fire(&self) {
        let fresh = watch::channel(false).0;
        let old = std::mem::replace(&mut *self.tx.lock(), fresh);
        let _ = old.send(true);
    }
}

impl Client {
    fn with_inner(
        local: Kite,
        url: Option<Url>,
        remote_addr: String,
        sink: Option<WsSink>,
    ) -> Client {
        Client {
            inner: Arc::new(ClientInner {
                local,
                remote: RwLock::new(KiteDescriptor::default()),
                url: Mutex::new(url),
                authentication: Mutex::new(None),
                remote_addr: Mutex::new(remote_addr),
                reconnect: AtomicBool::new(false),
                concurrent: AtomicBool::new(true),
                tell_timeout: Mutex::new(DEFAULT_TELL_TIMEOUT),
                redial: Mutex::new(RetryPolicy::default()),
                scrubber: Scrubber::new(),
                sink: AsyncMutex::new(sink),
                disconnect: DisconnectSignal::new(),
                on_connect: RwLock::new(Vec::new()),
                on_disconnect: RwLock::new(Vec::new()),
                first_request: Once::new(),
            }),
        }
    }

    /// An outbound, unconnected session. Call [`dial`](Client::dial) or
    /// [`dial_forever`](Client::dial_forever) before making requests.
    pub(crate) fn outbound(local: Kite, url: Url) -> Client {
        Client::with_inner(local, Some(url), String::new(), None)
    }

    /// Wrap an accepted websocket in a session and start its receive loop.
    /// Accepted sessions never redial; the remote owns reconnection.
    pub(crate) fn accepted(local: Kite, ws: WsStream, peer: SocketAddr) -> Client {
        let (sink, source) = ws.split();
        let client = Client::with_inner(local, None, peer.to_string(), Some(sink));
        client.spawn_run(source);
        client
    }

    /// Adopt the caller's self-description and fire the node's
    /// first-request hooks, exactly once per session.
    pub(crate) fn notify_first_request(&self, descriptor: KiteDescriptor) {
        self.inner.first_request.call_once(|| {
            self.set_remote_kite(descriptor);
            self.inner.local.call_on_first_request(self);
        });
    }

    // ------------------------------------------------------------------
    // Session state
    // ------------------------------------------------------------------

    /// The node this session belongs to.
    pub fn local_kite(&self) -> Kite {
        self.inner.local.clone()
    }

    /// The remote's self-description. For accepted sessions this is copied
    /// from the first inbound request and its username is overwritten by
    /// the authenticator, so it is trustworthy only after one authenticated
    /// call has succeeded.
    pub fn remote_kite(&self) -> KiteDescriptor {
        self.inner.remote.read().clone()
    }

    pub(crate) fn set_remote_kite(&self, descriptor: KiteDescriptor) {
        *self.inner.remote.write() = descriptor;
    }

    pub(crate) fn set_remote_username(&self, username: &str) {
        self.inner.remote.write().username = username.to_owned();
    }

    /// Peer address of an accepted session; empty when we initiated.
    pub fn remote_addr(&self) -> String {
        self.inner.remote_addr.lock().clone()
    }

    /// Credentials attached to every outbound request.
    pub fn set_authentication(&self, auth: Option<Authentication>) {
        *self.inner.authentication.lock() = auth;
    }

    pub fn authentication(&self) -> Option<Authentication> {
        self.inner.authentication.lock().clone()
    }

    /// Reconnect after a lost connection?
    pub fn set_reconnect(&self, reconnect: bool) {
        self.inner.reconnect.store(reconnect, Ordering::SeqCst);
    }

    /// Process inbound messages in parallel (default) or strictly one at a
    /// time in arrival order.
    pub fn set_concurrent(&self, concurrent: bool) {
        self.inner.concurrent.store(concurrent, Ordering::SeqCst);
    }

    /// Deadline used by [`tell`](Client::tell) when a call passes zero.
    pub fn set_tell_timeout(&self, timeout: Duration) {
        *self.inner.tell_timeout.lock() = timeout;
    }

    /// Backoff schedule used when redialing.
    pub fn set_retry_policy(&self, policy: RetryPolicy) {
        *self.inner.redial.lock() = policy;
    }

    /// Number of live callback registrations held for the remote.
    pub fn callback_count(&self) -> usize {
        self.inner.scrubber.callback_count()
    }

    /// Register a hook to run on every connect. Hooks run on their own
    /// task; a panicking hook does not prevent the others from firing.
    pub fn on_connect<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        self.inner.on_connect.write().push(Arc::new(hook));
    }

    /// Register a hook to run on every disconnect.
    pub fn on_disconnect<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        self.inner.on_disconnect.write().push(Arc::new(hook));
    }

    fn call_hooks(&self, list: &RwLock<Vec<Hook>>) {
        let hooks: Vec<Hook> = list.read().iter().cloned().collect();
        for hook in hooks {
            if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                warn!("session hook panicked");
            }
        }
    }

    // ------------------------------------------------------------------
    // Connecting
    // ------------------------------------------------------------------

    /// Connect to the remote kite and start the receive loop.
    pub async fn dial(&self) -> Result<(), Error> {
        info!(kite = %self.remote_kite(), "dialing remote kite");
        let source = self.connect_once().await?;
        self.spawn_run(source);
        Ok(())
    }

    /// Enable reconnect and retry connecting under exponential backoff
    /// until the first connection is established.
    pub async fn dial_forever(&self) -> Result<(), Error> {
        info!(kite = %self.remote_kite(), "dialing remote kite");
        self.inner.reconnect.store(true, Ordering::SeqCst);
        match self.redial().await {
            Some(source) => {
                self.spawn_run(source);
                Ok(())
            }
            None => Err(Error::timeout("could not connect before the redial deadline")),
        }
    }

    async fn connect_once(&self) -> Result<WsSource, Error> {
        let url = self
            .inner
            .url
            .lock()
            .clone()
            .ok_or_else(|| Error::generic("session has no remote url to dial"))?;
        let url = fix_port(url)?;

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::send(e))?;
        let (sink, source) = ws.split();
        *self.inner.sink.lock().await = Some(sink);

        // Connect hooks run alongside message processing; a hook may itself
        // wait on a response from the remote.
        let this = self.clone();
        tokio::spawn(async move { this.call_hooks(&this.inner.on_connect) });

        Ok(source)
    }

    /// Retry connecting until it works, reconnect is turned off, or the
    /// policy's cumulative deadline passes. A fresh [`Backoff`] per call is
    /// what resets the wait time after every successful connect.
    async fn redial(&self) -> Option<WsSource> {
        let mut backoff = Backoff::new(self.inner.redial.lock().clone());
        loop {
            if !self.inner.reconnect.load(Ordering::SeqCst) {
                return None;
            }
            match self.connect_once().await {
                Ok(source) => return Some(source),
                Err(e) => match backoff.next_delay() {
                    Some(delay) => {
                        debug!("dial failed: {e}; retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!("giving up redialing: {e}");
                        return None;
                    }
                },
            }
        }
    }

    /// Turn off reconnect and close the transport. Terminal.
    pub async fn close(&self) {
        self.inner.reconnect.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.inner.sink.lock().await.take() {
            let _ = sink.send(WsMessage::Close(None)).await;
            let _ = sink.close().await;
        }
    }

    // ------------------------------------------------------------------
    // Receive loop
    // ------------------------------------------------------------------

    fn spawn_run(&self, source: WsSource) {
        let this = self.clone();
        tokio::spawn(async move { this.run(source).await });
    }

    async fn run(&self, mut source: WsSource) {
        loop {
            let err = self.read_loop(&mut source).await;
            debug!(kite = %self.remote_kite(), "session lost: {err}");

            *self.inner.sink.lock().await = None;
            self.call_hooks(&self.inner.on_disconnect);
            self.inner.disconnect.fire();

            if !self.inner.reconnect.load(Ordering::SeqCst) {
                return;
            }
            match self.redial().await {
                Some(new_source) => source = new_source,
                None => return,
            }
        }
    }

    /// Read frames until the transport fails. Each frame is processed on
    /// its own task; serial mode awaits it before the next read.
    async fn read_loop(&self, source: &mut WsSource) -> Error {
        loop {
            let frame = match source.next().await {
                Some(Ok(WsMessage::Text(text))) => text.to_string(),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("dropping non-utf8 frame");
                        continue;
                    }
                },
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => return Error::disconnect(),
                Some(Err(e)) => return Error::generic(format!("transport read failed: {e}")),
            };

            if frame_echo(PRINT_RECV_ENV) {
                eprintln!("\nReceived: {frame}");
            }

            let this = self.clone();
            let task = tokio::spawn(async move {
                if let Err(err) = this.process_message(frame).await {
                    this.on_error(err).await;
                }
            });
            if !self.inner.concurrent.load(Ordering::SeqCst) {
                let _ = task.await;
            }
        }
    }

    /// Process a single frame: reconstruct callbacks, then dispatch to a
    /// local callback (numeric method) or a named handler.
    async fn process_message(&self, data: String) -> Result<(), ProcessError> {
        let mut msg: Message = serde_json::from_str(&data).map_err(ProcessError::Decode)?;
        parse_callbacks(&mut msg).map_err(ProcessError::Parse)?;

        let Message {
            method, arguments, ..
        } = msg;
        let args = Partial::new(arguments, self.callback_sender());

        match method {
            Method::Id(id) => {
                let Some(callback) = self.inner.scrubber.callback(id) else {
                    return Err(ProcessError::CallbackNotFound { id });
                };
                self.run_callback(callback, args);
                Ok(())
            }
            Method::Name(method) => {
                let Some(handler) = self.inner.local.handler(&method) else {
                    return Err(ProcessError::MethodNotFound { method, args });
                };
                self.run_method(&method, handler, args).await;
                Ok(())
            }
        }
    }

    fn run_callback(&self, callback: Callback, args: Partial) {
        if catch_unwind(AssertUnwindSafe(|| callback(args))).is_err() {
            warn!("callback panicked");
        }
    }

    /// Central error handler for message processing. A missing method whose
    /// originating call carried a response callback is reported back to the
    /// caller; everything else is logged.
    async fn on_error(&self, err: ProcessError) {
        warn!("error processing message: {err}");

        if let ProcessError::MethodNotFound { method, args } = err {
            let Ok(options) = args.one() else { return };
            let Some(callback) = options
                .get("responseCallback")
                .and_then(|p| p.as_function())
            else {
                return;
            };
            let response = Response {
                error: Some(Error::method_not_found(&method)),
                result: None,
            };
            let Ok(value) = serde_json::to_value(&response) else { return };
            if let Err(e) = callback.call(vec![value]).await {
                warn!("could not report missing method to caller: {e}");
            }
        }
    }

    /// Send hook bound into reconstructed functions: invoking a proxy emits
    /// a message whose method is the callback ID.
    pub(crate) fn callback_sender(&self) -> CallbackSender {
        let this = self.clone();
        Arc::new(move |id, arguments| {
            let this = this.clone();
            Box::pin(async move {
                let args = match arguments {
                    Value::Array(items) => items.into_iter().map(Arg::Value).collect(),
                    other => vec![Arg::Value(other)],
                };
                this.marshal_and_send(Method::Id(id), &args)
                    .await
                    .map(|_| ())
                    .map_err(|e| std::io::Error::other(e.to_string()))
            })
        })
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Scrub the arguments, assemble and serialize the message, and hand it
    /// to the transport. On any failure past scrubbing, the callbacks this
    /// call registered are removed again before the error propagates.
    pub(crate) async fn marshal_and_send(
        &self,
        method: Method,
        arguments: &[Arg],
    ) -> Result<CallbackMap, Error> {
        let tree = Arg::Array(arguments.to_vec());
        let callbacks = self
            .inner
            .scrubber
            .scrub(&tree)
            .map_err(|e| Error::generic(e.to_string()))?;

        match self.encode_and_send(method, &tree, &callbacks).await {
            Ok(()) => Ok(callbacks),
            Err(e) => {
                for id in callbacks.keys() {
                    if let Ok(id) = id.parse::<u64>() {
                        self.inner.scrubber.remove_callback(id);
                    }
                }
                Err(e)
            }
        }
    }

    async fn encode_and_send(
        &self,
        method: Method,
        tree: &Arg,
        callbacks: &CallbackMap,
    ) -> Result<(), Error> {
        let msg = Message {
            method,
            arguments: tree.to_value(),
            callbacks: callbacks.clone(),
            links: Vec::new(),
        };
        let data = serde_json::to_string(&msg)
            .map_err(|e| Error::generic(format!("could not encode message: {e}")))?;
        self.send_data(data).await
    }

    async fn send_data(&self, data: String) -> Result<(), Error> {
        if frame_echo(PRINT_SEND_ENV) {
            eprintln!("\nSending: {data}");
        }
        let mut guard = self.inner.sink.lock().await;
        let sink = guard.as_mut().ok_or_else(|| Error::send("not connected"))?;
        sink.send(WsMessage::Text(data.into()))
            .await
            .map_err(|e| Error::send(e))
    }

    // ------------------------------------------------------------------
    // Request/response layer
    // ------------------------------------------------------------------

    /// Blocking call: send `method` and wait for the single reply within
    /// the session's default timeout.
    pub async fn tell(&self, method: &str, args: Vec<Arg>) -> Result<Partial, Error> {
        self.tell_with_timeout(method, Duration::ZERO, args).await
    }

    /// Like [`tell`](Client::tell) with an explicit deadline. A zero
    /// timeout means the session default.
    pub async fn tell_with_timeout(
        &self,
        method: &str,
        timeout: Duration,
        args: Vec<Arg>,
    ) -> Result<Partial, Error> {
        let mut rx = self.go_with_timeout(method, timeout, args).await;
        match rx.recv().await {
            Some(CallResponse {
                error: Some(err), ..
            }) => Err(err),
            Some(CallResponse { result, .. }) => {
                Ok(result.unwrap_or_else(|| Partial::plain(Value::Null)))
            }
            None => Err(Error::generic("response channel closed")),
        }
    }

    /// Non-blocking call: returns a capacity-1 channel that will receive
    /// the single reply, a `disconnect`, or a `timeout`.
    pub async fn go(&self, method: &str, args: Vec<Arg>) -> mpsc::Receiver<CallResponse> {
        self.go_with_timeout(method, Duration::ZERO, args).await
    }

    pub async fn go_with_timeout(
        &self,
        method: &str,
        timeout: Duration,
        args: Vec<Arg>,
    ) -> mpsc::Receiver<CallResponse> {
        let (response_tx, response_rx) = mpsc::channel(1);
        self.send_method(method, args, timeout, response_tx).await;
        response_rx
    }

    async fn send_method(
        &self,
        method: &str,
        args: Vec<Arg>,
        timeout: Duration,
        response_tx: mpsc::Sender<CallResponse>,
    ) {
        debug!(method, kite = %self.remote_kite(), "calling method");

        // The response callback and the timeout waiter race to drain this
        // and evict the callback; eviction is idempotent.
        let (remove_tx, remove_rx) = std::sync::mpsc::sync_channel::<u64>(1);
        let remove_rx = Arc::new(Mutex::new(remove_rx));

        // The response callback forwards the reply here.
        let (done_tx, mut done_rx) = mpsc::channel::<CallResponse>(1);

        let callback = self.make_response_callback(done_tx, remove_rx.clone(), method);
        let wrapped = self.wrap_method_args(args, callback);

        let callbacks = match self
            .marshal_and_send(Method::Name(method.to_owned()), &wrapped)
            .await
        {
            Ok(callbacks) => callbacks,
            Err(e) => {
                let error = if e.kind == "sendError" { e } else { Error::send(e) };
                let _ = response_tx.try_send(CallResponse {
                    result: None,
                    error: Some(error),
                });
                return;
            }
        };

        let timeout = if timeout.is_zero() {
            *self.inner.tell_timeout.lock()
        } else {
            timeout
        };

        // Snapshot the disconnect signal before waiting; it is rotated on
        // every disconnect event.
        let mut disconnect = self.inner.disconnect.subscribe();

        let this = self.clone();
        let method = method.to_owned();
        let waiter_remove_rx = remove_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                reply = done_rx.recv() => {
                    let reply = reply.unwrap_or_else(|| CallResponse {
                        result: None,
                        error: Some(Error::generic("reply channel closed")),
                    });
                    let _ = response_tx.try_send(reply);
                }
                _ = async { let _ = disconnect.wait_for(|fired| *fired).await; } => {
                    let _ = response_tx.try_send(CallResponse {
                        result: None,
                        error: Some(Error::disconnect()),
                    });
                }
                _ = tokio::time::sleep(timeout) => {
                    let _ = response_tx.try_send(CallResponse {
                        result: None,
                        error: Some(Error::timeout(format!(
                            "no response to {method:?} method in {timeout:?}"
                        ))),
                    });
                    // Evict the orphaned response callback so registrations
                    // do not accumulate across timed-out calls.
                    if let Ok(id) = waiter_remove_rx.lock().try_recv() {
                        this.inner.scrubber.remove_callback(id);
                    }
                }
            }
        });

        send_callback_id(&callbacks, remove_tx);
    }

    /// Wrap user arguments into the call-options object that is the single
    /// element of every named-method argument array.
    fn wrap_method_args(&self, args: Vec<Arg>, response_callback: Function) -> Vec<Arg> {
        let options = ArgObject::new()
            .skip_callbacks("kite", Arg::json(self.inner.local.descriptor()))
            .field("authentication", Arg::json(self.authentication()))
            .field("withArgs", Arg::Array(args))
            .field("responseCallback", Arg::Function(response_callback));
        vec![Arg::Object(options)]
    }

    /// The ephemeral callback attached to every outbound call to receive
    /// the single reply.
    fn make_response_callback(
        &self,
        done_tx: mpsc::Sender<CallResponse>,
        remove_rx: Arc<Mutex<std::sync::mpsc::Receiver<u64>>>,
        method: &str,
    ) -> Function {
        let client = self.clone();
        let method = method.to_owned();
        Function::new(move |arguments| {
            // One-shot cleanup of our own registration.
            if let Ok(id) = remove_rx.lock().try_recv() {
                client.inner.scrubber.remove_callback(id);
            }

            let reply = decode_response(&arguments);
            if let Some(err) = &reply.error {
                warn!(%method, "error received from remote kite: {err}");
            }
            let _ = done_tx.try_send(reply);
        })
    }
}

/// Decode the single argument of a response callback into a reply.
fn decode_response(arguments: &Partial) -> CallResponse {
    let invalid = |message: String| CallResponse {
        result: None,
        error: Some(Error::invalid_response(message)),
    };

    let arg = match arguments.slice_of_length(1) {
        Ok(mut items) => items.remove(0),
        Err(e) => return invalid(e.to_string()),
    };

    let Some(fields) = arg.value().as_object() else {
        return invalid("response is not an object".to_owned());
    };

    // At least one of result or error must be sent.
    if !fields.contains_key("result") && !fields.contains_key("error") {
        return invalid("remote has sent invalid response arguments".to_owned());
    }

    let error = match fields.get("error") {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<Error>(value.clone()) {
            Ok(err) => Some(err),
            Err(e) => return invalid(format!("malformed error object: {e}")),
        },
    };

    CallResponse {
        result: arg.get("result"),
        error,
    }
}

/// Forward the response callback's ID for late cleanup, or close the
/// channel when the call carried none. The response callback is always the
/// `responseCallback` member of the call-options object at position 0.
fn send_callback_id(callbacks: &CallbackMap, tx: std::sync::mpsc::SyncSender<u64>) {
    for (id, path) in callbacks {
        if path.len() != 2 {
            continue;
        }
        if path[0] != PathElement::Index(0) {
            continue;
        }
        if path[1] != PathElement::Key("responseCallback".to_owned()) {
            continue;
        }
        if let Ok(id) = id.parse::<u64>() {
            let _ = tx.send(id);
            return;
        }
    }
    // Dropping the sender closes the channel.
}

/// Default the port when the URL has none: 80 for `ws`, 443 for `wss`.
fn fix_port(mut url: Url) -> Result<Url, Error> {
    if url.port().is_none() {
        let port = match url.scheme() {
            "ws" => 80,
            "wss" => 443,
            other => return Err(Error::generic(format!("unknown scheme: {other}"))),
        };
        let _ = url.set_port(Some(port));
    }
    Ok(url)
}

fn frame_echo(var: &str) -> bool {
    std::env::var_os(var).is_some_and(|v| !v.is_empty())
}
