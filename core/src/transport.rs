//! Transport collaborator: sends an `HttpRequest` and hands back the status,
//! headers and an unread body stream.
//!
//! # Design
//! The core never talks to the network directly. `Fetch` owns a `Transport`
//! chosen by the caller. `UreqTransport` is the default and uses `ureq` with
//! its stock connection, TLS and redirect behavior.

use std::fmt;
use std::io::Read;

use tracing::warn;
use ureq::http::{self, HeaderName, HeaderValue, Method};
use ureq::{Agent, AsSendBody};

use crate::error::FetchError;
use crate::http::HttpRequest;

/// Status, headers and the not-yet-read body of a response.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read>,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends one request. Implementations must be safe to call repeatedly; each
/// call gets its own request and returns its own body stream.
pub trait Transport {
    fn send(&self, request: HttpRequest) -> Result<TransportResponse, FetchError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// Non-2xx statuses are returned as responses, not errors, so callers always
/// get the body text back.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use an agent configured by the caller.
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }

    fn run<S: AsSendBody>(
        &self,
        request: &HttpRequest,
        body: S,
    ) -> Result<TransportResponse, FetchError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| FetchError::TransportError(format!("invalid method {}: {e}", request.method)))?;
        let mut outgoing = http::Request::builder()
            .method(method)
            .uri(request.url.as_str())
            .body(body)
            .map_err(|e| FetchError::TransportError(e.to_string()))?;

        // insert, not append: a later header with the same name replaces an
        // earlier one
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::TransportError(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::TransportError(format!("invalid header value for {name}: {e}")))?;
            outgoing.headers_mut().insert(name, value);
        }

        let outgoing = match request.timeout {
            Some(timeout) => self
                .agent
                .configure_request(outgoing)
                .timeout_global(Some(timeout))
                .build(),
            None => outgoing,
        };

        let response = self.agent.run(outgoing).map_err(|e| {
            warn!(method = %request.method, url = %request.url, error = %e, "transport failed");
            FetchError::TransportError(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.into_body().into_reader();

        Ok(TransportResponse {
            status,
            headers,
            body: Box::new(body),
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, mut request: HttpRequest) -> Result<TransportResponse, FetchError> {
        match request.body.take() {
            Some(body) => self.run(&request, body),
            None => self.run(&request, ()),
        }
    }
}
