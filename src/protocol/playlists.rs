//! Playlists owned by the user.
//!
//! Served by `GET /playlists`, created with `POST /playlists`, and pushed
//! over the event stream whenever they change.

use serde::{Deserialize, Serialize};

/// Where a playlist was imported from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Spotify,
    Youtube,
}

/// A playlist and, once loaded or pushed, its items.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub cover: Option<String>,
    pub source: Option<Source>,
    pub source_url: Option<String>,
    pub created_by: String,

    /// Absent until the items are individually loaded or pushed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<PlaylistItem>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    pub title: String,
    pub cover: Option<String>,
}

/// Body of `GET /playlists`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistsResponse {
    pub playlists: Vec<Playlist>,
}

/// Body of `POST /playlists`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
}

/// Response to `POST /playlists`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CreatePlaylistResponse {
    pub playlist: Playlist,
}
