//! Login request for `POST /auth/login`.
//!
//! The response to both login and refresh is a
//! [`Credential`](crate::credential::Credential).
//!
//! # Example Request
//!
//! ```json
//! {
//!     "code": "authorization_code_from_redirect"
//! }
//! ```

use serde::Serialize;
use veil::Redact;

/// Exchanges an OAuth authorization code for a credential.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Redact)]
pub struct LoginRequest {
    /// Authorization code from the OAuth redirect
    #[redact]
    pub code: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}
