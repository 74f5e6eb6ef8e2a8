//! Lookup of a track or playlist by free text or URL.
//!
//! `GET /lookup?q=<query>` answers with whatever the backend could resolve,
//! or `null`:
//!
//! ```json
//! {
//!     "result": {
//!         "type": "com.cssorbot.api.routes.lookup.Response.Result.Track",
//!         "title": "Song",
//!         "cover": "https://...",
//!         "duration": 215
//!     }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};

/// Tag of a track result.
pub const RESULT_TRACK: &str = "com.cssorbot.api.routes.lookup.Response.Result.Track";

/// Tag of a playlist result.
pub const RESULT_PLAYLIST: &str = "com.cssorbot.api.routes.lookup.Response.Result.Playlist";

/// Body of a lookup response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct LookupResponse {
    /// Resolved item, `None` when nothing matched
    pub result: Option<LookupResult>,
}

/// A resolved lookup, discriminated by the backend's type name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type")]
pub enum LookupResult {
    #[serde(rename = "com.cssorbot.api.routes.lookup.Response.Result.Track")]
    Track(Track),
    #[serde(rename = "com.cssorbot.api.routes.lookup.Response.Result.Playlist")]
    Playlist(PlaylistSummary),
}

/// Single track.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Track {
    pub title: String,
    pub cover: Option<String>,

    /// Track length, sent in seconds
    #[serde_as(as = "DurationSeconds<u64, Flexible>")]
    pub duration: Duration,
}

/// Playlist with the tracks it contains.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub cover: Option<String>,

    /// Number of tracks in the playlist
    pub size: u64,

    pub tracks: Vec<Track>,
}
