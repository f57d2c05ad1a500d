//! Outgoing HTTP response type.
//!
//! A [`Response`] is what the [`Dispatcher`](crate::Dispatcher) hands back to
//! the transport once the chain has unwound. Middleware and handlers never
//! build one directly: they finalize the response held by the
//! [`Context`](crate::Context).

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::de::DeserializeOwned;

use crate::envelope::ErrorBody;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Context::respond`](crate::Context::respond).
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json; charset=utf-8
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        })
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A finalized HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Response {
    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// An error envelope produced outside any chain (transport-level rejects).
    pub(crate) fn error(status: StatusCode, body: &ErrorBody) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, ContentType::Json.header_value());
        // ErrorBody holds only strings; serializing it cannot fail.
        let body = serde_json::to_vec(body).unwrap_or_default();
        Self { status, headers, body: Bytes::from(body) }
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn error_response_carries_envelope() {
        let res = Response::error(StatusCode::METHOD_NOT_ALLOWED, &ErrorBody::new("nope"));
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("content-type"), Some("application/json; charset=utf-8"));
        let body: Value = res.json().unwrap();
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn into_http_keeps_status_and_headers() {
        let res = Response::error(StatusCode::BAD_REQUEST, &ErrorBody::new("bad")).into_http();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().contains_key("content-type"));
    }
}
