//! Authentication credential issued by the cssorbot API.
//!
//! A [`Credential`] is the triple returned by both `POST /auth/login` and
//! `POST /auth/refresh-token`:
//!
//! ```json
//! {
//!     "idToken": "eyJhbGciOi...",
//!     "refreshToken": "eyJhbGciOi...",
//!     "expiresAt": 1700000000
//! }
//! ```
//!
//! The id token authenticates API calls and the event stream; the refresh
//! token is only ever sent to the refresh endpoint. `expiresAt` is in unix
//! seconds and refers to the id token.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use serde_with::{formats::Flexible, serde_as, TimestampSeconds};
use veil::Redact;

/// Id token, refresh token and id token expiry.
///
/// Both tokens are redacted from `Debug` output.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Redact)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Bearer token for API calls and the event stream
    #[redact]
    pub id_token: String,

    /// Bearer token for `POST /auth/refresh-token`
    #[redact]
    pub refresh_token: String,

    /// When the id token expires
    #[serde_as(as = "TimestampSeconds<i64, Flexible>")]
    pub expires_at: SystemTime,
}

impl Credential {
    /// Time until the id token expires, or zero if it already has.
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the id token expires at or before the current instant.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

/// Shows the expiry only, never the tokens.
impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expires_at.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since_epoch) => write!(f, "credential expiring at {}", since_epoch.as_secs()),
            Err(_) => write!(f, "credential expired before epoch"),
        }
    }
}
