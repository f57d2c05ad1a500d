//! Per-request state threaded through a chain.
//!
//! A [`Context`] is created by the [`Dispatcher`](crate::Dispatcher) for one
//! request and dropped once that request's [`Response`] has been produced.
//! It owns three things:
//!
//! - the immutable [`Request`],
//! - a string-keyed bag of annotations (`"user_id"`, `"param:id"`, …),
//! - the response under construction.
//!
//! The response is finalized at most once. After that, the chain runner stops
//! advancing and every further `respond_*` / `abort*` call is an
//! [`Error::AlreadyFinalized`].

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::ErrorBody;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Prefix under which the dispatcher stores path parameters.
pub(crate) const PARAM_PREFIX: &str = "param:";

#[derive(Debug)]
pub struct Context {
    request: Request,
    values: HashMap<String, Value>,

    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finalized: bool,
    aborted: bool,

    /// How many chain steps have started. Lets the runner tell whether a
    /// middleware passed control on.
    steps: usize,

    /// Text of the first failure that escaped a middleware or handler.
    failure: Option<String>,
}

impl Context {
    /// A fresh context for `request` with an open `200 OK` response.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            values: HashMap::new(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finalized: false,
            aborted: false,
            steps: 0,
            failure: None,
        }
    }

    pub fn request(&self) -> &Request { &self.request }

    // ── Annotations ───────────────────────────────────────────────────────────

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Reads an annotation. `None` means nothing was stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Reads an annotation that holds a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// A path parameter captured by the route pattern (`/users/{id}` → `"id"`).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.get_str(&format!("{PARAM_PREFIX}{name}"))
    }

    // ── Response ──────────────────────────────────────────────────────────────

    /// Status of the response so far. `200` until something finalizes it.
    pub fn status(&self) -> StatusCode { self.status }

    pub fn response_headers(&self) -> &HeaderMap { &self.headers }

    pub fn is_finalized(&self) -> bool { self.finalized }

    /// `true` once a middleware has called [`abort`](Self::abort) or
    /// [`abort_with_status`](Self::abort_with_status), or a failure was recovered.
    pub fn is_aborted(&self) -> bool { self.aborted }

    /// The recorded failure, if one escaped the chain. Never sent to the client.
    pub fn failure(&self) -> Option<&str> { self.failure.as_deref() }

    /// Sets a response header, replacing any previous value for `name`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Sets a response header from already-validated parts.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<()> {
        self.ensure_open()?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Finalizes the response with a JSON body.
    pub fn respond_json<T: Serialize + ?Sized>(&mut self, status: StatusCode, payload: &T) -> Result<()> {
        self.ensure_open()?;
        let body = serde_json::to_vec(payload)?;
        self.finalize(status, Some(ContentType::Json), Bytes::from(body));
        Ok(())
    }

    /// Finalizes the response with an arbitrary body.
    pub fn respond(&mut self, status: StatusCode, content_type: ContentType, body: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        self.finalize(status, Some(content_type), body.into());
        Ok(())
    }

    /// Finalizes the response with a JSON body and stops the chain.
    ///
    /// Nothing after the caller runs. Code that already ran before the caller
    /// still gets its post-processing step as the chain unwinds.
    pub fn abort<T: Serialize + ?Sized>(&mut self, status: StatusCode, payload: &T) -> Result<()> {
        self.respond_json(status, payload)?;
        self.aborted = true;
        Ok(())
    }

    /// Finalizes an empty response and stops the chain.
    pub fn abort_with_status(&mut self, status: StatusCode) -> Result<()> {
        self.ensure_open()?;
        self.finalize(status, None, Bytes::new());
        self.aborted = true;
        Ok(())
    }

    /// Records a failure and replaces the response with the generic `500`
    /// envelope. Only the first failure counts.
    ///
    /// This is the one write allowed after finalization: a response built by
    /// a chain that then failed is not trusted.
    pub(crate) fn fail(&mut self, error: &Error) {
        if self.failure.is_some() {
            return;
        }
        self.failure = Some(error.to_string());
        // ErrorBody holds only strings; serializing it cannot fail.
        let body = serde_json::to_vec(&ErrorBody::internal()).unwrap_or_default();
        self.finalize(StatusCode::INTERNAL_SERVER_ERROR, Some(ContentType::Json), Bytes::from(body));
        self.aborted = true;
    }

    /// Marks the start of a chain step and returns its sequence number.
    pub(crate) fn enter_step(&mut self) -> usize {
        self.steps += 1;
        self.steps
    }

    /// Sequence number of the most recently started step.
    pub(crate) fn steps(&self) -> usize { self.steps }

    pub(crate) fn into_response(self) -> Response {
        Response { status: self.status, headers: self.headers, body: self.body }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized { status: self.status });
        }
        Ok(())
    }

    fn finalize(&mut self, status: StatusCode, content_type: Option<ContentType>, body: Bytes) {
        self.status = status;
        match content_type {
            Some(ct) => { self.headers.insert(CONTENT_TYPE, ct.header_value()); }
            None => { self.headers.remove(CONTENT_TYPE); }
        }
        self.body = body;
        self.finalized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use serde_json::json;

    fn ctx() -> Context {
        Context::new(Request::builder(Method::Get, "/").build().unwrap())
    }

    #[test]
    fn set_overwrites_and_get_reads() {
        let mut ctx = ctx();
        assert!(ctx.get("user_id").is_none());
        ctx.set("user_id", "a");
        ctx.set("user_id", "b");
        assert_eq!(ctx.get_str("user_id"), Some("b"));
        ctx.set("count", 3);
        assert_eq!(ctx.get("count"), Some(&json!(3)));
    }

    #[test]
    fn param_reads_prefixed_annotation() {
        let mut ctx = ctx();
        ctx.set("param:id", "42");
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("other"), None);
    }

    #[test]
    fn respond_json_finalizes_once() {
        let mut ctx = ctx();
        ctx.respond_json(StatusCode::CREATED, &json!({ "ok": true })).unwrap();
        assert!(ctx.is_finalized());
        assert!(!ctx.is_aborted());

        let err = ctx.respond_json(StatusCode::OK, &json!({})).unwrap_err();
        assert!(matches!(err, Error::AlreadyFinalized { status } if status == StatusCode::CREATED));
        assert!(matches!(ctx.abort(StatusCode::OK, &json!({})), Err(Error::AlreadyFinalized { .. })));
        assert!(matches!(ctx.set_header("x-late", "1"), Err(Error::AlreadyFinalized { .. })));

        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.json::<Value>().unwrap(), json!({ "ok": true }));
    }

    #[test]
    fn abort_with_status_has_no_body() {
        let mut ctx = ctx();
        ctx.set_header("x-kept", "yes").unwrap();
        ctx.abort_with_status(StatusCode::NO_CONTENT).unwrap();
        assert!(ctx.is_aborted());

        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert_eq!(res.header("x-kept"), Some("yes"));
        assert!(res.header("content-type").is_none());
    }

    #[test]
    fn fail_overrides_and_hides_detail() {
        let mut ctx = ctx();
        ctx.respond_json(StatusCode::OK, &json!({ "secret": 1 })).unwrap();
        ctx.fail(&Error::internal("db password rejected"));
        ctx.fail(&Error::internal("second failure"));

        assert_eq!(ctx.failure(), Some("internal: db password rejected"));
        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = res.json().unwrap();
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(!String::from_utf8_lossy(res.body()).contains("password"));
    }

    #[test]
    fn insert_header_respects_finalization() {
        let mut ctx = ctx();
        ctx.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain")).unwrap();
        ctx.abort_with_status(StatusCode::NO_CONTENT).unwrap();
        let late = ctx.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(matches!(late, Err(Error::AlreadyFinalized { .. })));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut ctx = ctx();
        assert!(matches!(ctx.set_header("bad name", "v"), Err(Error::InvalidHeader(_))));
    }
}
