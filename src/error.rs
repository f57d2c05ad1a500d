//! Unified error type.

use thiserror::Error;

/// Shorthand for `Result<T, kasane::Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by kasane's fallible operations.
///
/// Client mistakes (a missing credential, a malformed id) are *responses*,
/// never `Error`s. An `Error` means one of three things:
///
/// - the router was configured wrongly (reported by [`Router::build`](crate::Router::build)),
/// - a middleware or handler broke its contract (finalizing twice, panicking,
///   stopping the chain without a response),
/// - the transport failed (binding, accepting).
///
/// Errors that escape a chain are turned into a generic `500` envelope. Their
/// text is logged, never sent to the client.
#[derive(Debug, Error)]
pub enum Error {
    /// `respond_json` / `abort` was called on a response that is already final.
    #[error("response already finalized with status {status}")]
    AlreadyFinalized { status: http::StatusCode },

    /// A route pattern was rejected by the radix tree (syntax error or conflict).
    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// A route or group prefix that does not start with `/`.
    #[error("invalid route `{0}`: paths must start with `/`")]
    InvalidRoute(String),

    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A middleware returned without calling `next` and without finalizing
    /// the response.
    #[error("middleware `{middleware}` neither called next nor finalized the response")]
    Unfinalized { middleware: &'static str },

    /// A middleware or handler panicked. Holds the panic message only.
    #[error("panicked: {0}")]
    Panic(String),

    /// A handler reported a defect it could not turn into a response.
    #[error("internal: {0}")]
    Internal(String),

    #[error("invalid socket address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shortcut for [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(e: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(e.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(e.to_string())
    }
}
