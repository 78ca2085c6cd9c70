//! Request body capture.
//!
//! The body is read into one buffer. Whichever path the request takes
//! receives a fresh `Body` built from that buffer; nothing relies on
//! rewinding a stream.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use futures_util::{stream, StreamExt};

/// Result of reading a request body for inspection.
#[derive(Debug)]
pub enum CapturedBody {
    /// Whole body, within the limit.
    Complete(Bytes),
    /// Over the limit. Carries a body equivalent to the original: the
    /// already-read prefix chained with the unread remainder.
    Oversized(Body),
    /// The stream failed mid-read.
    Failed(axum::Error),
}

/// Read `body` fully unless it exceeds `limit` bytes.
pub async fn capture_body(headers: &HeaderMap, body: Body, limit: usize) -> CapturedBody {
    if declared_length(headers).is_some_and(|len| len > limit as u64) {
        return CapturedBody::Oversized(body);
    }

    let mut data = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = data.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return CapturedBody::Failed(e),
        };

        buf.extend_from_slice(&chunk);
        if buf.len() > limit {
            let prefix = Bytes::from(buf);
            let restored = stream::iter([Ok::<_, axum::Error>(prefix)]).chain(data);
            return CapturedBody::Oversized(Body::from_stream(restored));
        }
    }

    CapturedBody::Complete(Bytes::from(buf))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
