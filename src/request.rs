//! Incoming HTTP request type.

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;
use crate::method::Method;

/// An incoming HTTP request, as delivered by the transport.
///
/// Immutable once received: middleware annotate the [`Context`](crate::Context),
/// never the request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Starts building a request for `target` (`/path` or `/path?query`).
    ///
    /// Transports and tests use this; handlers only ever read requests.
    pub fn builder(method: Method, target: &str) -> RequestBuilder {
        RequestBuilder {
            inner: Ok(Request::new(method, target, HeaderMap::new(), Bytes::new(), None)),
        }
    }

    pub(crate) fn new(
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
            None => (target.to_owned(), None),
        };
        Self { method, path, query, headers, body, remote_addr }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Non-ASCII values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The path with the raw query string re-attached, as it appears in access logs.
    pub fn target(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.path),
            _ => self.path.clone(),
        }
    }

    /// Best guess at the originating client.
    ///
    /// Behind a reverse proxy the peer address is the proxy, so the first
    /// `X-Forwarded-For` hop wins, then `X-Real-IP`, then the peer.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());

        forwarded
            .or_else(|| self.header("x-real-ip").and_then(|ip| ip.trim().parse().ok()))
            .or_else(|| self.remote_addr.map(|a| a.ip()))
    }
}

/// Builder returned by [`Request::builder`].
///
/// Header errors are deferred to [`build`](RequestBuilder::build), in the
/// manner of `http::request::Builder`.
pub struct RequestBuilder {
    inner: Result<Request, Error>,
}

impl RequestBuilder {
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.inner = self.inner.and_then(|mut req| {
            let name = HeaderName::try_from(name)
                .map_err(|e| Error::InvalidHeader(e.into().to_string()))?;
            let value = HeaderValue::try_from(value)
                .map_err(|e| Error::InvalidHeader(e.into().to_string()))?;
            req.headers.append(name, value);
            Ok(req)
        });
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        if let Ok(req) = &mut self.inner {
            req.body = body.into();
        }
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        if let Ok(req) = &mut self.inner {
            req.remote_addr = Some(addr);
        }
        self
    }

    pub fn build(self) -> Result<Request, Error> {
        self.inner
    }
}
