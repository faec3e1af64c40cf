//! End-to-end session scenarios over real websocket pairs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tether::{Arg, ArgObject, Authentication, Error, Function, Kite, Listener, RetryPolicy};

async fn serve(kite: &Kite) -> (Listener, String) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let listener = kite.listen("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/kite", listener.local_addr());
    (listener, url)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(100),
        backoff_multiplier: 1.5,
        max_elapsed: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn plain_call_round_trips() {
    let server = Kite::new("echo-server", "0.0.1");
    server.disable_authentication();
    server.handle_func("echo", |request| async move {
        let text: String = request
            .args
            .ok_or_else(|| Error::argument("missing arguments"))?
            .one()?
            .decode()?;
        Ok(json!(text))
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("caller", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.dial().await.unwrap();

    let result = client.tell("echo", vec![Arg::json("hi")]).await.unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "hi");

    client.close().await;
}

#[tokio::test]
async fn callbacks_flow_through_arguments() {
    let server = Kite::new("publisher", "0.0.1");
    server.disable_authentication();
    server.handle_func("subscribe", |request| async move {
        let on_message = request
            .args
            .ok_or_else(|| Error::argument("missing arguments"))?
            .one()?
            .get("onMessage")
            .and_then(|p| p.as_function())
            .ok_or_else(|| Error::argument("onMessage must be a function"))?;

        // Two invocations: the registration survives until the
        // connection closes, not just one call.
        for n in [42, 43] {
            on_message
                .call(vec![json!(n)])
                .await
                .map_err(|e| Error::generic(e.to_string()))?;
        }
        Ok(json!("subscribed"))
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("subscriber", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.dial().await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let subscription = Arg::Object(ArgObject::new().field(
        "onMessage",
        Arg::Function(Function::new(move |args| {
            let _ = tx.send(args.value().clone());
        })),
    ));

    let result = client.tell("subscribe", vec![subscription]).await.unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "subscribed");

    assert_eq!(rx.recv().await.unwrap(), json!([42]));
    assert_eq!(rx.recv().await.unwrap(), json!([43]));

    client.close().await;
}

#[tokio::test]
async fn exported_methods_arrive_camel_cased() {
    let server = Kite::new("inspector", "0.0.1");
    server.disable_authentication();
    server.handle_func("inspect", |request| async move {
        let obj = request
            .args
            .ok_or_else(|| Error::argument("missing arguments"))?
            .one()?;
        let is_function = obj.get("doThing").is_some_and(|p| p.is_function());
        Ok(json!(is_function))
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("caller", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.dial().await.unwrap();

    let composite = Arg::Object(ArgObject::new().method("DoThing", |_| {}));
    let result = client.tell("inspect", vec![composite]).await.unwrap();
    assert!(result.decode::<bool>().unwrap());

    client.close().await;
}

#[tokio::test]
async fn timeout_evicts_the_orphaned_response_callback() {
    let server = Kite::new("sleeper", "0.0.1");
    server.disable_authentication();
    server.handle_func("slow", |_request| async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(json!("late"))
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("impatient", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.dial().await.unwrap();

    let baseline = client.callback_count();
    let err = client
        .tell_with_timeout("slow", Duration::from_millis(100), vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind, "timeout");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.callback_count(), baseline);

    // The late reply targets the evicted callback; the session must survive
    // it and keep serving calls.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let result = client
        .tell_with_timeout("slow", Duration::from_secs(2), vec![])
        .await
        .unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "late");

    client.close().await;
}

#[tokio::test]
async fn disconnect_completes_pending_calls_and_reconnect_recovers() {
    let server = Kite::new("flaky", "0.0.1");
    server.disable_authentication();
    server.handle_func("drop", |request| async move {
        // Tear the transport down before replying; the caller must see a
        // disconnect, not a timeout.
        request.client.close().await;
        Err(Error::generic("connection dropped"))
    });
    server.handle_func("echo", |request| async move {
        let value = request
            .args
            .and_then(|args| args.one().ok())
            .map(|p| p.value().clone())
            .unwrap_or(Value::Null);
        Ok(value)
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("caller", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.set_retry_policy(fast_retry());
    client.dial_forever().await.unwrap();

    let err = client.tell("drop", vec![]).await.unwrap_err();
    assert_eq!(err.kind, "disconnect");

    // The session redials on its own; a later call succeeds again.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let result = client.tell("echo", vec![Arg::json("back")]).await.unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "back");

    client.close().await;
}

#[tokio::test]
async fn authenticator_overrides_self_reported_username() {
    let server = Kite::new("secure", "0.0.1");
    server.authenticator("token", |request| {
        match request.authentication.as_ref().map(|a| a.key.as_str()) {
            Some("sekrit") => {
                request.username = "alice".to_owned();
                Ok(())
            }
            _ => Err(Error::authentication("invalid token")),
        }
    });
    server.handle_func("whoami", |request| async move {
        Ok(json!(request.client.remote_kite().username))
    });
    let (_listener, url) = serve(&server).await;

    let caller = Kite::new("caller", "0.0.1");
    caller.set_username("root");
    let client = caller.new_client_string(&url).unwrap();
    client.set_authentication(Some(Authentication::new("token", "sekrit")));
    client.dial().await.unwrap();

    let result = client.tell("whoami", vec![]).await.unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "alice");
    client.close().await;

    // A bad key is rejected before the handler runs.
    let mallory = Kite::new("mallory", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    mallory.set_authentication(Some(Authentication::new("token", "wrong")));
    mallory.dial().await.unwrap();
    let err = mallory.tell("whoami", vec![]).await.unwrap_err();
    assert_eq!(err.kind, "authenticationError");
    mallory.close().await;

    // So is a request with no credentials at all.
    let anon = Kite::new("anon", "0.0.1").new_client_string(&url).unwrap();
    anon.dial().await.unwrap();
    let err = anon.tell("whoami", vec![]).await.unwrap_err();
    assert_eq!(err.kind, "authenticationError");
    anon.close().await;
}

#[tokio::test]
async fn panicking_authenticator_still_replies() {
    let server = Kite::new("grumpy", "0.0.1");
    server.authenticator("token", |_request| panic!("authenticator bug"));
    server.handle_func("ping", |_request| async move { Ok(json!("pong")) });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("caller", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.set_authentication(Some(Authentication::new("token", "whatever")));
    client.dial().await.unwrap();

    // The reply must arrive well before the call deadline; a lost request
    // would surface as a timeout here instead.
    let err = client
        .tell_with_timeout("ping", Duration::from_secs(2), vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind, "genericError");

    client.close().await;
}

#[tokio::test]
async fn missing_methods_are_reported_to_the_caller() {
    let server = Kite::new("empty", "0.0.1");
    server.disable_authentication();
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("caller", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.dial().await.unwrap();

    let err = client.tell("nope", vec![]).await.unwrap_err();
    assert_eq!(err.kind, "methodNotFound");

    client.close().await;
}

#[tokio::test]
async fn serial_sessions_process_in_arrival_order() {
    let server = Kite::new("streamer", "0.0.1");
    server.disable_authentication();
    server.handle_func("publish", |request| async move {
        let sink = request
            .args
            .ok_or_else(|| Error::argument("missing arguments"))?
            .one()?
            .get("sink")
            .and_then(|p| p.as_function())
            .ok_or_else(|| Error::argument("sink must be a function"))?;
        for n in 0..16 {
            sink.call(vec![json!(n)])
                .await
                .map_err(|e| Error::generic(e.to_string()))?;
        }
        Ok(json!("done"))
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("collector", "0.0.1")
        .new_client_string(&url)
        .unwrap();
    client.set_concurrent(false);
    client.dial().await.unwrap();

    let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let sink = Arg::Object(ArgObject::new().field(
        "sink",
        Arg::Function(Function::new(move |args| {
            if let Some(n) = args.value().get(0).and_then(Value::as_i64) {
                record.lock().unwrap().push(n);
            }
        })),
    ));

    let result = client.tell("publish", vec![sink]).await.unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "done");
    assert_eq!(*seen.lock().unwrap(), (0..16).collect::<Vec<i64>>());

    client.close().await;
}

#[tokio::test]
async fn lifecycle_hooks_fire_and_panics_stay_isolated() {
    let server = Kite::new("hooked", "0.0.1");
    server.disable_authentication();
    server.handle_func("ping", |_request| async move { Ok(json!("pong")) });

    let first_seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = first_seen.clone();
    server.on_first_request(move |session| {
        record.lock().unwrap().push(session.remote_kite().name);
    });
    let (_listener, url) = serve(&server).await;

    let client = Kite::new("caller", "0.0.1")
        .new_client_string(&url)
        .unwrap();

    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let connected = events.clone();
    client.on_connect(move || connected.lock().unwrap().push("connect"));
    client.on_connect(|| panic!("misbehaving hook"));
    let also_connected = events.clone();
    client.on_connect(move || also_connected.lock().unwrap().push("connect-too"));
    let disconnected = events.clone();
    client.on_disconnect(move || disconnected.lock().unwrap().push("disconnect"));

    client.dial().await.unwrap();
    let result = client.tell("ping", vec![]).await.unwrap();
    assert_eq!(result.decode::<String>().unwrap(), "pong");

    client.close().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let events = events.lock().unwrap().clone();
    assert!(events.contains(&"connect"));
    // The panicking hook did not stop later hooks from firing.
    assert!(events.contains(&"connect-too"));
    assert!(events.contains(&"disconnect"));

    assert_eq!(first_seen.lock().unwrap().as_slice(), ["caller"]);
}
