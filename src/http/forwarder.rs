//! Webhook forwarding.
//!
//! # Responsibilities
//! - Build the outbound request (method, destination, headers, buffered body)
//! - Execute it through the injected transport
//! - Relay upstream status, headers and body verbatim
//!
//! # Design Decisions
//! - No retries: POST is not idempotent and the body is already committed
//! - Multi-value headers are copied value by value, in order
//! - `Host` comes from the destination, `Transfer-Encoding` from the new body
//! - Upstream body is streamed, not buffered; dropping the stream closes it
//! - The request URI is parsed from the raw target, so the inbound query
//!   is never re-encoded

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{header, HeaderName, Request, Uri};
use axum::response::Response;

use crate::error::ForwardError;
use crate::http::transport::Transport;
use crate::routing::Destination;

/// Request headers that describe the inbound connection, not the payload.
fn is_connection_header(name: &HeaderName) -> bool {
    *name == header::HOST || *name == header::TRANSFER_ENCODING
}

/// Forwards committed requests to their resolved destination.
#[derive(Debug)]
pub struct Forwarder<T> {
    transport: T,
}

impl<T: Transport> Forwarder<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Send the request upstream and relay the answer as received.
    pub async fn forward(
        &self,
        parts: &Parts,
        body: Bytes,
        destination: &Destination,
    ) -> Result<Response, ForwardError> {
        let outbound = build_outbound(parts, body, destination)?;
        Ok(self.transport.send(outbound).await?)
    }
}

/// Build the outbound request from the inbound head and buffered body.
pub fn build_outbound(
    parts: &Parts,
    body: Bytes,
    destination: &Destination,
) -> Result<Request<Body>, ForwardError> {
    let url = destination.url();
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ForwardError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ForwardError::MissingHost);
    }

    let uri: Uri = destination
        .as_str()
        .parse()
        .map_err(|source| ForwardError::InvalidTarget {
            target: destination.to_string(),
            source,
        })?;

    let mut request = Request::new(Body::from(body));
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = uri;

    let headers = request.headers_mut();
    for (name, value) in parts.headers.iter() {
        if is_connection_header(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    Ok(request)
}
