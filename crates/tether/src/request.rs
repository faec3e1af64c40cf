//! Inbound named-method handling: request construction, authentication,
//! handler invocation, and the reply through the response callback.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use tether_dnode::{Function, Partial};

use crate::client::Client;
use crate::errors::Error;
use crate::kite::HandlerFunc;
use crate::protocol::{Authentication, CallOptions};

/// The object returned to the caller through the response callback, and the
/// single argument every response callback receives.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub error: Option<Error>,
    pub result: Option<Value>,
}

/// An inbound named-method call.
pub struct Request {
    pub method: String,
    /// The caller's argument list (`withArgs`). Reconstructed callbacks
    /// inside it are invokable.
    pub args: Option<Partial>,
    /// The session the call arrived on.
    pub client: Client,
    pub authentication: Option<Authentication>,
    /// Set by the authenticator; empty until authentication has run.
    pub username: String,
}

impl Request {
    /// Run the authenticator matching the request's authentication type.
    ///
    /// Sessions we initiated are trusted without credentials: the remote
    /// address is empty exactly when this side dialed. On success the
    /// verified username overwrites the remote kite's self-reported one,
    /// which is what stops a kite from impersonating someone else.
    pub fn authenticate(&mut self) -> Result<(), Error> {
        if self.client.remote_addr().is_empty() {
            return Ok(());
        }

        let Some(auth) = self.authentication.clone() else {
            return Err(Error::authentication(
                "no authentication information is provided",
            ));
        };

        let Some(authenticator) = self
            .client
            .local_kite()
            .authenticator_for(&auth.auth_type)
        else {
            return Err(Error::authentication(format!(
                "unknown authentication type: {}",
                auth.auth_type
            )));
        };

        authenticator(self).map_err(|e| Error::authentication(e.message))?;

        self.client.set_remote_username(&self.username);
        Ok(())
    }
}

impl Client {
    /// Run a named handler for one inbound call and reply through the
    /// response callback when one was provided. Handler errors of every
    /// shape, panics included, become typed error replies; nothing here
    /// unwinds the session.
    pub(crate) async fn run_method(&self, method: &str, handler: HandlerFunc, args: Partial) {
        let constructed = catch_unwind(AssertUnwindSafe(|| self.new_request(method, &args)));
        let (request, response_callback) = match constructed {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(method, "could not construct request: {e}");
                return;
            }
            Err(_) => {
                warn!(method, "request construction panicked");
                return;
            }
        };
        let mut request = request;

        let mut result: Option<Value> = None;
        let mut kite_err: Option<Error> = None;

        if !self.local_kite().config().disable_authentication
            && !self.remote_addr().is_empty()
        {
            // Authenticators are user code; a panicking one still produces a
            // typed error reply, same as a panicking handler below.
            match catch_unwind(AssertUnwindSafe(|| request.authenticate())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => kite_err = Some(e),
                Err(_) => {
                    warn!(method, "authenticator panicked");
                    kite_err = Some(Error::generic("authentication failed"));
                }
            }
        }

        if kite_err.is_none() {
            // The handler gets its own task so a panic becomes a typed
            // error instead of taking the processing task down with it.
            match tokio::spawn(handler(request)).await {
                Ok(Ok(value)) => result = Some(value),
                Ok(Err(err)) => kite_err = Some(err),
                Err(join_err) => {
                    warn!(method, "handler panicked: {join_err}");
                    kite_err = Some(Error::generic(format!("handler failed: {join_err}")));
                }
            }
        }

        if let Some(err) = &kite_err {
            warn!(method, "error in received message: {err}");
        }

        let Some(callback) = response_callback else {
            return;
        };
        let response = Response {
            error: kite_err,
            result,
        };
        match serde_json::to_value(&response) {
            Ok(value) => {
                if let Err(e) = callback.call(vec![value]).await {
                    warn!(method, "could not send response: {e}");
                }
            }
            Err(e) => warn!(method, "could not encode response: {e}"),
        }
    }

    /// Unwrap the call-options object from the argument array and build the
    /// request. The first inbound call on an accepted session also adopts
    /// the caller's self-description and fires first-request hooks.
    fn new_request(
        &self,
        method: &str,
        args: &Partial,
    ) -> Result<(Request, Option<Function>), Error> {
        let options = args.one()?;
        let call_options: CallOptions = options.decode()?;
        let response_callback = options
            .get("responseCallback")
            .and_then(|p| p.as_function());

        if !self.remote_addr().is_empty() {
            self.notify_first_request(call_options.kite);
        }

        let request = Request {
            method: method.to_owned(),
            args: options.get("withArgs"),
            client: self.clone(),
            authentication: call_options.authentication,
            username: String::new(),
        };

        Ok((request, response_callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kite::Kite;
    use serde_json::json;

    #[test]
    fn response_always_carries_both_keys() {
        let response = Response {
            error: None,
            result: Some(json!("hi")),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": null, "result": "hi"})
        );

        let failed = Response {
            error: Some(Error::method_not_found("nope")),
            result: None,
        };
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["error"]["type"], "methodNotFound");
        assert_eq!(value["result"], json!(null));
    }

    #[test]
    fn outbound_sessions_are_trusted_without_credentials() {
        let kite = Kite::new("tester", "0.0.1");
        let client = kite.new_client_string("ws://127.0.0.1:3999").unwrap();
        let mut request = Request {
            method: "echo".to_owned(),
            args: None,
            client,
            authentication: None,
            username: String::new(),
        };
        assert!(request.authenticate().is_ok());
    }
}
