//! Pass-through handler for traffic the router does not redirect.
//!
//! # Responsibilities
//! - Relay the request unchanged to the configured downstream service
//! - Answer 404 when no downstream is configured
//!
//! # Design Decisions
//! - Single upstream; load balancing belongs to whatever sits behind it
//! - Upstream failures surface as 502, like forwarded webhooks

use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

/// Downstream relay used as the router's next handler.
#[derive(Clone)]
pub struct NextUpstream {
    upstream: Option<Authority>,
    client: Client<HttpConnector, Body>,
}

impl NextUpstream {
    pub fn new(upstream: Option<SocketAddr>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            upstream: upstream.and_then(|addr| Authority::from_str(&addr.to_string()).ok()),
            client,
        }
    }

    pub fn upstream(&self) -> Option<&Authority> {
        self.upstream.as_ref()
    }

    /// Point the request at the downstream service.
    fn rewrite(&self, authority: &Authority, uri: Uri) -> Option<Uri> {
        let mut parts = uri.into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().ok()?);
        }
        Uri::from_parts(parts).ok()
    }
}

/// Axum fallback handler relaying to the downstream service.
pub async fn next_handler(State(next): State<NextUpstream>, request: Request<Body>) -> Response {
    let Some(authority) = next.upstream.clone() else {
        return (StatusCode::NOT_FOUND, "No upstream configured").into_response();
    };

    let (mut parts, body) = request.into_parts();
    let Some(uri) = next.rewrite(&authority, parts.uri.clone()) else {
        tracing::warn!(uri = %parts.uri, "Could not rewrite request URI");
        return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
    };
    parts.uri = uri;

    match next.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => into_axum(response),
        Err(e) => {
            tracing::error!(upstream = %authority, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

fn into_axum(response: axum::http::Response<Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
