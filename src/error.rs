//! Error handling for cssorbot.
//!
//! Provides a unified error type based on gRPC status codes, with mappings
//! from the transport, codec and storage errors the client runs into.
//!
//! # Error Categories
//!
//! Errors are categorized into standard kinds that map to HTTP status codes:
//! * Authentication/authorization failures (401, 403)
//! * Resource state (404, 409)
//! * Client errors (400, 429)
//! * Server errors (500, 501, 503)
//! * Timeouts and cancellation (499, 504)
//!
//! # Login Escalation
//!
//! A rejected or missing credential is terminal: the client navigates to the
//! login page and every caller up the stack must stop what it is doing. That
//! condition is carried as an [`ErrorKind::Unauthenticated`] error wrapping
//! [`LoginRedirect`], and is recognized with [`Error::is_login_redirect`].
//!
//! ```rust
//! use cssorbot::error::{Error, ErrorKind};
//!
//! let err = Error::login_redirect();
//! assert_eq!(err.kind, ErrorKind::Unauthenticated);
//! assert!(err.is_login_redirect());
//! assert!(!Error::unauthenticated("bad password").is_login_redirect());
//! ```

#![allow(clippy::enum_glob_use)]

use std::{fmt, sync::Arc};

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type combining error kind and details.
///
/// The details are reference counted so that errors can be cloned. This is
/// needed to share one result between all callers of a single-flight
/// operation, and to keep a failure inside a request state that is observed
/// by several consumers.
#[derive(Clone, Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Arc<dyn std::error::Error + Send + Sync>,
}

/// Standard result type for cssorbot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories based on gRPC status codes.
///
/// See [gRPC status codes](https://github.com/googleapis/googleapis/blob/master/google/rpc/code.proto)
/// for the original definitions.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    /// HTTP Mapping: 499 Client Closed Request
    #[error("operation was cancelled")]
    Cancelled = 1,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("unknown error")]
    Unknown = 2,

    /// HTTP Mapping: 400 Bad Request
    #[error("invalid argument specified")]
    InvalidArgument = 3,

    /// HTTP Mapping: 504 Gateway Timeout
    #[error("operation timed out")]
    DeadlineExceeded = 4,

    /// HTTP Mapping: 404 Not Found
    #[error("not found")]
    NotFound = 5,

    /// HTTP Mapping: 409 Conflict
    #[error("attempt to create what already exists")]
    AlreadyExists = 6,

    /// HTTP Mapping: 403 Forbidden
    #[error("permission denied")]
    PermissionDenied = 7,

    /// HTTP Mapping: 401 Unauthorized
    #[error("no valid authentication credentials")]
    Unauthenticated = 16,

    /// HTTP Mapping: 429 Too Many Requests
    #[error("resource has been exhausted")]
    ResourceExhausted = 8,

    /// HTTP Mapping: 400 Bad Request
    #[error("invalid state")]
    FailedPrecondition = 9,

    /// HTTP Mapping: 409 Conflict
    #[error("operation aborted")]
    Aborted = 10,

    /// HTTP Mapping: 400 Bad Request
    #[error("out of range")]
    OutOfRange = 11,

    /// HTTP Mapping: 501 Not Implemented
    #[error("not implemented")]
    Unimplemented = 12,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("internal error")]
    Internal = 13,

    /// HTTP Mapping: 503 Service Unavailable
    #[error("service unavailable")]
    Unavailable = 14,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("unrecoverable data loss or corruption")]
    DataLoss = 15,
}

/// The client is navigating away to the login page.
///
/// Never recovered in place: whoever receives it should stop further work.
#[derive(Clone, Copy, Debug, Default, Eq, Error, Hash, PartialEq)]
#[error("redirecting to login page")]
pub struct LoginRedirect;

macro_rules! constructor {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        pub fn $name<E>(error: E) -> Self
        where
            E: Into<Box<dyn std::error::Error + Send + Sync>>,
        {
            Self::new(ErrorKind::$kind, error)
        }
    };
}

impl Error {
    /// Creates a new error with specified kind and details.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cssorbot::error::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::NotFound, "playlist not found");
    /// assert_eq!(err.kind, ErrorKind::NotFound);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: Arc::from(error.into()),
        }
    }

    constructor!(
        /// Maps to HTTP 409 Conflict.
        aborted => Aborted
    );
    constructor!(
        /// Maps to HTTP 409 Conflict. Use when creating what already exists.
        already_exists => AlreadyExists
    );
    constructor!(
        /// Maps to HTTP 499 Client Closed Request.
        cancelled => Cancelled
    );
    constructor!(
        /// Maps to HTTP 500. Use when data was corrupted or lost.
        data_loss => DataLoss
    );
    constructor!(
        /// Maps to HTTP 504 Gateway Timeout.
        deadline_exceeded => DeadlineExceeded
    );
    constructor!(
        /// Maps to HTTP 400. Use when the current state forbids the operation.
        failed_precondition => FailedPrecondition
    );
    constructor!(
        /// Maps to HTTP 500. Use for errors that should not happen.
        internal => Internal
    );
    constructor!(
        /// Maps to HTTP 400 Bad Request.
        invalid_argument => InvalidArgument
    );
    constructor!(
        /// Maps to HTTP 404 Not Found.
        not_found => NotFound
    );
    constructor!(
        /// Maps to HTTP 400 Bad Request. Use when a value exceeds its bounds.
        out_of_range => OutOfRange
    );
    constructor!(
        /// Maps to HTTP 403 Forbidden.
        permission_denied => PermissionDenied
    );
    constructor!(
        /// Maps to HTTP 429 Too Many Requests.
        resource_exhausted => ResourceExhausted
    );
    constructor!(
        /// Maps to HTTP 401 Unauthorized.
        ///
        /// Note that this does not imply a login redirect; see
        /// [`Error::login_redirect`].
        unauthenticated => Unauthenticated
    );
    constructor!(
        /// Maps to HTTP 503 Service Unavailable.
        unavailable => Unavailable
    );
    constructor!(
        /// Maps to HTTP 501 Not Implemented.
        unimplemented => Unimplemented
    );
    constructor!(
        /// Maps to HTTP 500. Use when nothing else fits.
        unknown => Unknown
    );

    /// Creates the terminal error that signals a redirect to the login page.
    #[must_use]
    pub fn login_redirect() -> Self {
        Self::unauthenticated(LoginRedirect)
    }

    /// Whether this error signals that the client is navigating to the login
    /// page, as opposed to an ordinary failure.
    #[must_use]
    pub fn is_login_redirect(&self) -> bool {
        self.kind == ErrorKind::Unauthenticated && self.downcast::<LoginRedirect>().is_some()
    }

    /// Creates an error from an unsuccessful HTTP status and response body.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let details = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };

        match status.as_u16() {
            400 | 422 => Self::invalid_argument(details),
            401 => Self::unauthenticated(details),
            403 => Self::permission_denied(details),
            404 => Self::not_found(details),
            409 => Self::already_exists(details),
            412 => Self::failed_precondition(details),
            429 => Self::resource_exhausted(details),
            499 => Self::cancelled(details),
            501 => Self::unimplemented(details),
            502 | 503 => Self::unavailable(details),
            504 => Self::deadline_exceeded(details),
            500..=599 => Self::internal(details),
            _ => Self::unknown(details),
        }
    }

    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats the error as "{kind}: {details}".
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: {}", self.kind, self.error)
    }
}

impl From<LoginRedirect> for Error {
    fn from(_: LoginRedirect) -> Self {
        Self::login_redirect()
    }
}

/// Converts IO errors into appropriate error kinds.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            PermissionDenied => Self::permission_denied(err),
            AddrInUse | AlreadyExists => Self::already_exists(err),
            AddrNotAvailable | ConnectionRefused | NotConnected => Self::unavailable(err),
            BrokenPipe | ConnectionReset | ConnectionAborted => Self::aborted(err),
            Interrupted | WouldBlock => Self::cancelled(err),
            UnexpectedEof => Self::data_loss(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            WriteZero => Self::resource_exhausted(err),
            _ => Self::unknown(err),
        }
    }
}

/// Converts HTTP client errors into appropriate error kinds.
///
/// Status errors keep the kind of their status code, so that a 401 raised by
/// `error_for_status` still reads as `Unauthenticated`.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            let mut mapped = Self::from_status(status, "");
            mapped.error = Arc::new(err);
            return mapped;
        }

        if err.is_body() {
            return Self::data_loss(err);
        }

        if err.is_decode() {
            return Self::invalid_argument(err);
        }

        if err.is_builder() {
            return Self::internal(err);
        }

        if err.is_connect() {
            return Self::unavailable(err);
        }

        if err.is_redirect() {
            return Self::resource_exhausted(err);
        }

        if err.is_timeout() {
            return Self::deadline_exceeded(err);
        }

        Self::unknown(err)
    }
}

/// Converts WebSocket errors into appropriate error kinds.
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error::*;
        match err {
            ConnectionClosed => Self::cancelled(err),
            AlreadyClosed => Self::unavailable(err),
            Io(err) => Self::data_loss(err),
            Http(ref response) if response.status() == StatusCode::UNAUTHORIZED => {
                Self::unauthenticated(err)
            }
            Http(_) | Tls(_) | HttpFormat(_) | Protocol(_) | Url(_) => Self::unknown(err),
            Capacity(err) => Self::out_of_range(err),
            Utf8 => Self::invalid_argument(err),
            WriteBufferFull(_) => Self::resource_exhausted(err),
            AttackAttempt => Self::permission_denied(err),
        }
    }
}

/// Converts JSON errors through IO error mapping.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

/// Converts configuration parsing errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e)
    }
}

/// Converts header size errors to `OutOfRange`.
impl From<http::header::MaxSizeReached> for Error {
    fn from(e: http::header::MaxSizeReached) -> Self {
        Self::out_of_range(e.to_string())
    }
}

/// Converts invalid header errors to `Internal`.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts URL parsing errors to `Internal`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts task join errors: cancelled tasks to `Cancelled`, panics to
/// `Internal`.
impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Self::cancelled(e.to_string())
        } else {
            Self::internal(e.to_string())
        }
    }
}

/// Converts mutex poisoning errors to `Internal`.
impl<T> From<std::sync::PoisonError<std::sync::MutexGuard<'_, T>>> for Error {
    fn from(e: std::sync::PoisonError<std::sync::MutexGuard<'_, T>>) -> Self {
        Self::internal(e.to_string())
    }
}
