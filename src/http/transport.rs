//! Outbound transport for forwarded webhooks.
//!
//! The forwarder owns its transport instead of reaching for a global
//! client, so timeout and pooling policy come from configuration and tests
//! can substitute their own.
//!
//! Requests go out with the URI exactly as built by the forwarder. Nothing
//! here re-parses or re-encodes the target.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::TransportError;

/// Sends one fully built outbound request.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request<Body>) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Pooled hyper client speaking plain HTTP and HTTPS.
///
/// Without a timeout the call lasts as long as the inbound request does.
/// The timeout covers the upstream response head; the relayed body then
/// streams for as long as the caller keeps reading.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: HttpsClient,
    timeout: Option<Duration>,
}

impl HyperTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, rustls::Error> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(https),
            timeout,
        })
    }
}

impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response, TransportError> {
        let pending = self.client.request(request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| TransportError::Timeout)??,
            None => pending.await?,
        };
        Ok(response.map(Body::new))
    }
}
