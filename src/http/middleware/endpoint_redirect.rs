//! Endpoint redirect middleware.
//!
//! Wraps the next handler. Webhook POSTs whose JSON body names a known
//! endpoint are forwarded to that endpoint's destination and the upstream
//! answer is relayed to the caller; everything else reaches the next
//! handler with its body intact.
//!
//! Once a request is forwarded there is no way back: transport failures
//! become 500/502/504 responses, never a pass-through.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{header, Request};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::config::RedirectConfig;
use crate::error::{ForwardError, RedirectError};
use crate::http::body::{capture_body, CapturedBody};
use crate::http::forwarder::Forwarder;
use crate::http::request::REQUEST_ID_HEADER;
use crate::http::transport::{HyperTransport, Transport};
use crate::observability::metrics;
use crate::routing::{Classifier, Destination, InterceptDecision, PassReason};

/// Name used in logs when none is given.
pub const DEFAULT_NAME: &str = "endpoint-redirect";

/// Immutable state shared by every clone of the service.
struct Shared<T> {
    name: String,
    classifier: Classifier,
    forwarder: Forwarder<T>,
    max_body_bytes: usize,
}

impl<T: Transport> Shared<T> {
    fn new(name: String, config: &RedirectConfig, transport: T) -> Result<Self, RedirectError> {
        Ok(Self {
            name,
            classifier: Classifier::new(config)?,
            forwarder: Forwarder::new(transport),
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn handle<S>(&self, request: Request<Body>, next: S) -> Result<Response, S::Error>
    where
        S: Service<Request<Body>, Response = Response>,
    {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let (mut parts, body) = request.into_parts();

        if let Err(reason) = self.classifier.screen(&parts) {
            return self.pass_through(next, parts, body, reason, &request_id).await;
        }

        let bytes = match capture_body(&parts.headers, body, self.max_body_bytes).await {
            CapturedBody::Complete(bytes) => bytes,
            CapturedBody::Oversized(body) => {
                tracing::warn!(
                    middleware = %self.name,
                    request_id = %request_id,
                    path = %parts.uri.path(),
                    max_body_bytes = self.max_body_bytes,
                    "Webhook body over limit, not inspected"
                );
                return self
                    .pass_through(next, parts, body, PassReason::BodyTooLarge, &request_id)
                    .await;
            }
            CapturedBody::Failed(e) => {
                tracing::debug!(middleware = %self.name, request_id = %request_id, error = %e, "Failed to read request body");
                parts.headers.remove(header::CONTENT_LENGTH);
                return self
                    .pass_through(next, parts, Body::empty(), PassReason::BodyUnreadable, &request_id)
                    .await;
            }
        };

        match self.classifier.classify_payload(parts.uri.query(), &bytes) {
            InterceptDecision::PassThrough(reason) => {
                self.pass_through(next, parts, Body::from(bytes), reason, &request_id)
                    .await
            }
            InterceptDecision::Forward(destination) => {
                Ok(self.forward(parts, bytes, destination, &request_id).await)
            }
        }
    }

    async fn pass_through<S>(
        &self,
        mut next: S,
        parts: Parts,
        body: Body,
        reason: PassReason,
        request_id: &str,
    ) -> Result<Response, S::Error>
    where
        S: Service<Request<Body>, Response = Response>,
    {
        tracing::debug!(
            middleware = %self.name,
            request_id = %request_id,
            path = %parts.uri.path(),
            reason = reason.as_str(),
            "Passing request to next handler"
        );
        metrics::record_decision("pass_through", reason.as_str());
        next.call(Request::from_parts(parts, body)).await
    }

    async fn forward(
        &self,
        parts: Parts,
        body: Bytes,
        destination: Destination,
        request_id: &str,
    ) -> Response {
        let start = Instant::now();
        metrics::record_decision("forward", "resolved");
        tracing::info!(
            middleware = %self.name,
            request_id = %request_id,
            destination = %destination,
            "Forwarding webhook"
        );

        match self.forwarder.forward(&parts, body, &destination).await {
            Ok(response) => {
                tracing::debug!(
                    request_id = %request_id,
                    status = response.status().as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                metrics::record_forward(response.status().as_u16(), start);
                response
            }
            Err(e) => {
                let (status, message) = e.status_and_message();
                match &e {
                    ForwardError::Transport(_) => {
                        tracing::warn!(request_id = %request_id, error = %e, "Forwarding failed")
                    }
                    _ => {
                        tracing::error!(request_id = %request_id, error = %e, "Could not build forwarded request")
                    }
                }
                metrics::record_forward(status.as_u16(), start);
                (status, message).into_response()
            }
        }
    }
}

/// Layer producing [`EndpointRedirect`] around any next handler.
pub struct EndpointRedirectLayer<T = HyperTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> EndpointRedirectLayer<T> {
    /// Validate `config` and build the layer. Fails on any unparseable URL.
    pub fn new(config: RedirectConfig, transport: T) -> Result<Self, RedirectError> {
        Self::named(DEFAULT_NAME, config, transport)
    }

    /// Like [`new`](Self::new) with an instance name for log fields.
    pub fn named(
        name: impl Into<String>,
        config: RedirectConfig,
        transport: T,
    ) -> Result<Self, RedirectError> {
        let shared = Shared::new(name.into(), &config, transport)?;
        Ok(Self {
            shared: Arc::new(shared),
        })
    }
}

impl<T> Clone for EndpointRedirectLayer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for EndpointRedirectLayer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRedirectLayer")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl<S, T> Layer<S> for EndpointRedirectLayer<T> {
    type Service = EndpointRedirect<S, T>;

    fn layer(&self, next: S) -> Self::Service {
        EndpointRedirect {
            next,
            shared: self.shared.clone(),
        }
    }
}

/// Body-routing middleware service.
pub struct EndpointRedirect<S, T = HyperTransport> {
    next: S,
    shared: Arc<Shared<T>>,
}

impl<S, T: Transport> EndpointRedirect<S, T> {
    /// Wrap `next`. Fails on any unparseable destination URL.
    pub fn new(next: S, config: RedirectConfig, transport: T) -> Result<Self, RedirectError> {
        Ok(EndpointRedirectLayer::new(config, transport)?.layer(next))
    }
}

impl<S: Clone, T> Clone for EndpointRedirect<S, T> {
    fn clone(&self) -> Self {
        Self {
            next: self.next.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<S, T> fmt::Debug for EndpointRedirect<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRedirect")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl<S, T> Service<Request<Body>> for EndpointRedirect<S, T>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    T: Transport,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Keep the instance that was driven to readiness
        let clone = self.next.clone();
        let next = std::mem::replace(&mut self.next, clone);
        let shared = self.shared.clone();

        Box::pin(async move { shared.handle(request, next).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use futures_util::stream;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::util::BoxCloneService;
    use tower::{service_fn, ServiceExt};

    type InfallibleNext = BoxCloneService<Request<Body>, Response, Infallible>;

    /// An outbound request as the transport received it.
    struct Sent {
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    }

    /// Records outbound requests and answers with a canned response.
    #[derive(Default)]
    struct MockTransport {
        seen: Mutex<Vec<Sent>>,
        fail: Option<fn() -> TransportError>,
    }

    impl MockTransport {
        fn failing(fail: fn() -> TransportError) -> Self {
            Self {
                fail: Some(fail),
                ..Self::default()
            }
        }
    }

    impl Transport for Arc<MockTransport> {
        async fn send(&self, request: Request<Body>) -> Result<Response, TransportError> {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            self.seen.lock().unwrap().push(Sent {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            let response = axum::http::Response::builder()
                .status(StatusCode::CREATED)
                .header("x-upstream", "one")
                .header("x-upstream", "two")
                .body(Body::from("Forwarded successfully"))
                .unwrap();
            Ok(response)
        }
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Transport whose upstream never answers.
    struct HangingTransport {
        dropped: Arc<AtomicBool>,
    }

    impl Transport for HangingTransport {
        async fn send(&self, _request: Request<Body>) -> Result<Response, TransportError> {
            let _in_flight = DropFlag(self.dropped.clone());
            std::future::pending().await
        }
    }

    /// Next handler that echoes the body it received.
    fn echo_next() -> InfallibleNext {
        InfallibleNext::new(service_fn(|req: Request<Body>| async move {
            let content_length = req.headers().get(header::CONTENT_LENGTH).cloned();
            let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
            let mut response = Response::new(Body::from(body));
            response.headers_mut().insert("x-next", "called".parse().unwrap());
            if let Some(len) = content_length {
                response.headers_mut().insert("x-next-content-length", len);
            }
            Ok::<_, Infallible>(response)
        }))
    }

    fn config() -> RedirectConfig {
        let mut config = RedirectConfig::default();
        config
            .redirect_mappings
            .insert("KHUID000001".into(), "https://api.example.com/webhook1".into());
        config
    }

    fn service(
        config: RedirectConfig,
        transport: Arc<MockTransport>,
    ) -> EndpointRedirect<InfallibleNext, Arc<MockTransport>> {
        EndpointRedirect::new(echo_next(), config, transport).unwrap()
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_of(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_forwards_mapped_request() {
        let transport = Arc::new(MockTransport::default());
        let svc = service(config(), transport.clone());

        let payload = r#"{"type": "DOCUMENT.RECEIVED", "endpoint_id": "KHUID000001"}"#;
        let mut request = post("/webhooks?a=1", payload);
        request.headers_mut().append("x-signature", "first".parse().unwrap());
        request.headers_mut().append("x-signature", "second".parse().unwrap());

        let response = svc.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("x-next").is_none());
        let upstream: Vec<_> = response.headers().get_all("x-upstream").iter().collect();
        assert_eq!(upstream, ["one", "two"]);
        assert_eq!(&body_of(response).await[..], b"Forwarded successfully");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let outbound = &seen[0];
        assert_eq!(outbound.uri, "https://api.example.com/webhook1?a=1");
        assert_eq!(outbound.method, Method::POST);
        let signatures: Vec<_> = outbound.headers.get_all("x-signature").iter().collect();
        assert_eq!(signatures, ["first", "second"]);
        assert_eq!(&outbound.body[..], payload.as_bytes());
    }

    #[tokio::test]
    async fn test_forwarded_query_is_verbatim() {
        let transport = Arc::new(MockTransport::default());
        let svc = service(config(), transport.clone());

        let response = svc
            .oneshot(post("/webhooks?name=it's&x=%7Bq%7D", r#"{"endpoint_id": "KHUID000001"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].uri.query(), Some("name=it's&x=%7Bq%7D"));
    }

    #[tokio::test]
    async fn test_invalid_json_restores_body() {
        let transport = Arc::new(MockTransport::default());
        let svc = service(config(), transport.clone());

        let response = svc.oneshot(post("/webhooks", "invalid json")).await.unwrap();

        assert_eq!(response.headers()["x-next"], "called");
        assert_eq!(&body_of(response).await[..], b"invalid json");
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_body_passes_through_empty() {
        let transport = Arc::new(MockTransport::default());
        let svc = service(config(), transport.clone());

        let broken = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"endpoint_id\"")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhooks")
            .header(header::CONTENT_LENGTH, "30")
            .body(Body::from_stream(broken))
            .unwrap();

        let response = svc.oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-next"], "called");
        assert!(response.headers().get("x-next-content-length").is_none());
        assert!(body_of(response).await.is_empty());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_without_default_passes_through() {
        let transport = Arc::new(MockTransport::default());
        let svc = service(config(), transport.clone());

        let payload = r#"{"endpoint_id": "UNKNOWN_ID"}"#;
        let response = svc.oneshot(post("/webhooks", payload)).await.unwrap();

        assert_eq!(response.headers()["x-next"], "called");
        assert_eq!(&body_of(response).await[..], payload.as_bytes());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_uses_default() {
        let transport = Arc::new(MockTransport::default());
        let mut config = config();
        config.default_redirect = "https://example.com/webhook?b=2".into();
        let svc = service(config, transport.clone());

        let response = svc
            .oneshot(post("/webhooks?a=1", r#"{"endpoint_id": "UNKNOWN_ID"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].uri, "https://example.com/webhook?b=2&a=1");
    }

    #[tokio::test]
    async fn test_get_and_foreign_paths_pass_through() {
        let transport = Arc::new(MockTransport::default());
        let svc = service(config(), transport.clone());

        let get = Request::builder()
            .method(Method::GET)
            .uri("/webhooks")
            .body(Body::empty())
            .unwrap();
        let response = svc.clone().oneshot(get).await.unwrap();
        assert_eq!(response.headers()["x-next"], "called");

        let payload = r#"{"endpoint_id": "KHUID000001"}"#;
        let response = svc.oneshot(post("/other-path", payload)).await.unwrap();
        assert_eq!(response.headers()["x-next"], "called");
        assert_eq!(&body_of(response).await[..], payload.as_bytes());

        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_passes_through_intact() {
        let transport = Arc::new(MockTransport::default());
        let mut config = config();
        config.max_body_bytes = 8;
        let svc = service(config, transport.clone());

        let payload = r#"{"endpoint_id": "KHUID000001"}"#;
        let response = svc.oneshot(post("/webhooks", payload)).await.unwrap();

        assert_eq!(response.headers()["x-next"], "called");
        assert_eq!(&body_of(response).await[..], payload.as_bytes());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_bad_gateway() {
        let transport = Arc::new(MockTransport::failing(|| {
            TransportError::Failed("connection refused".into())
        }));
        let svc = service(config(), transport);

        let response = svc
            .oneshot(post("/webhooks", r#"{"endpoint_id": "KHUID000001"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get("x-next").is_none());
        assert_eq!(&body_of(response).await[..], b"Failed to forward request");
    }

    #[tokio::test]
    async fn test_transport_timeout_is_gateway_timeout() {
        let transport = Arc::new(MockTransport::failing(|| TransportError::Timeout));
        let svc = service(config(), transport);

        let response = svc
            .oneshot(post("/webhooks", r#"{"endpoint_id": "KHUID000001"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_dropping_request_cancels_forward() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = HangingTransport {
            dropped: dropped.clone(),
        };
        let svc = EndpointRedirect::new(echo_next(), config(), transport).unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            svc.oneshot(post("/webhooks", r#"{"endpoint_id": "KHUID000001"}"#)),
        )
        .await;

        assert!(outcome.is_err(), "forward should still be pending");
        assert!(dropped.load(Ordering::SeqCst), "outbound call outlived the request");
    }

    #[tokio::test]
    async fn test_unforwardable_destination_is_internal_error() {
        let transport = Arc::new(MockTransport::default());
        let mut config = config();
        config
            .redirect_mappings
            .insert("OPS".into(), "mailto:ops@example.com".into());
        let svc = service(config, transport.clone());

        let response = svc
            .oneshot(post("/webhooks", r#"{"endpoint_id": "OPS"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body_of(response).await[..], b"Failed to create redirect request");
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_urls_refuse_construction() {
        let mut config = config();
        config
            .redirect_mappings
            .insert("KHUID000002".into(), "://invalid-url".into());
        let result = EndpointRedirect::new(echo_next(), config, Arc::new(MockTransport::default()));
        assert!(result.is_err());

        let config = RedirectConfig {
            default_redirect: "://invalid-url".into(),
            ..RedirectConfig::default()
        };
        let result = EndpointRedirectLayer::new(config, Arc::new(MockTransport::default()));
        assert!(matches!(result, Err(RedirectError::InvalidDefault { .. })));
    }
}
