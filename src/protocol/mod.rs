//! JSON wire types of the cssorbot API.
//!
//! # Submodules
//!
//! * [`auth`] - Login with an OAuth authorization code
//! * [`lookup`] - Track and playlist lookup
//! * [`playlists`] - The user's playlists
//! * [`servers`] - Discord servers the bot plays in
//!
//! Push events are defined in [`events`](crate::events).
//!
//! # Usage Example
//!
//! ```
//! use cssorbot::protocol::{self, playlists::PlaylistsResponse};
//!
//! let response: PlaylistsResponse = protocol::json(r#"{"playlists":[]}"#, "playlists")?;
//! // Logged at TRACE level if successful, at ERROR level with the raw
//! // text if the body is not JSON at all.
//! # Ok::<(), cssorbot::error::Error>(())
//! ```

pub mod auth;
pub mod lookup;
pub mod playlists;
pub mod servers;

use crate::error::Result;
use serde::Deserialize;
use std::fmt::Debug;

/// Parses and logs JSON bodies received from the API or the event stream.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of the endpoint or channel for logging
///
/// # Type Parameters
///
/// * `T` - Response type that implements `Deserialize` and `Debug`
///
/// # Returns
///
/// * `Ok(T)` - Successfully parsed response
/// * `Err` - Parse error with debug logging of response
///
/// # Errors
///
/// Returns error if:
/// * Response body is not valid JSON
/// * JSON structure doesn't match type `T`
/// * Deserialization fails for any field
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{}: {result:#?}", origin);
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{}: {json:#?}", origin);
            } else {
                error!("{}: failed parsing response ({e:?})", origin);
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
