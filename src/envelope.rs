//! The two JSON envelopes every built-in response uses.
//!
//! ```text
//! { "status": "success", "data": <payload> }
//! { "status": "error", "message": "...", "hint": "...", "code": "..." }
//! ```
//!
//! `hint` and `code` are omitted when unset. `code` is the machine-checkable
//! part; `message` and `hint` are for humans.

use serde::Serialize;

/// `{"status":"success","data":...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Success<T> {
    status: &'static str,
    pub data: T,
}

impl<T: Serialize> Success<T> {
    pub fn new(data: T) -> Self {
        Self { status: "success", data }
    }
}

/// `{"status":"error","message":...}` with optional `hint` and `code`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: "error", message: message.into(), hint: None, code: None }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The body sent for any failure that escaped the chain. Deliberately
    /// says nothing about the failure itself.
    pub(crate) fn internal() -> Self {
        Self::new("internal server error").code("INTERNAL_ERROR")
    }

    pub(crate) fn not_found() -> Self {
        Self::new("route not found").code("NOT_FOUND")
    }
}
