//! Events pushed by the server over the event stream.
//!
//! Every frame is a JSON object discriminated by its `type` field:
//!
//! ```json
//! {"type": "playlistsChanged", "playlists": [...]}
//! {"type": "playlistItemsChanged", "playlistId": "p1", "playlistItems": [...]}
//! {"type": "queueChanged", "queue": [{"title": "...", "duration": 215, "cover": null}]}
//! ```
//!
//! # Example
//!
//! ```rust
//! use cssorbot::events::{Event, EventType};
//!
//! fn handle_event(event: &Event) {
//!     match event {
//!         Event::PlaylistsChanged { playlists } => println!("{} playlists", playlists.len()),
//!         Event::PlaylistItemsChanged { playlist_id, .. } => println!("{playlist_id} changed"),
//!         Event::QueueChanged { queue } => println!("{} queued", queue.len()),
//!     }
//! }
//! ```

use std::{fmt, time::Duration};

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};

use crate::protocol::playlists::{Playlist, PlaylistItem};

/// Server-originated change notification.
///
/// Each event carries enough identity to route it to exactly one
/// reconciliation rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// The full list of playlists, replacing whatever was known before.
    PlaylistsChanged { playlists: Vec<Playlist> },

    /// The items of one playlist.
    #[serde(rename_all = "camelCase")]
    PlaylistItemsChanged {
        playlist_id: String,
        playlist_items: Vec<PlaylistItem>,
    },

    /// The playback queue.
    QueueChanged { queue: Vec<QueueEntry> },
}

/// Entry of the playback queue.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct QueueEntry {
    pub title: String,

    #[serde_as(as = "DurationSeconds<u64, Flexible>")]
    pub duration: Duration,

    pub cover: Option<String>,
}

/// Discriminant of an [`Event`], used to select which events a subscriber
/// receives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    PlaylistsChanged,
    PlaylistItemsChanged,
    QueueChanged,
}

impl Event {
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PlaylistsChanged { .. } => EventType::PlaylistsChanged,
            Self::PlaylistItemsChanged { .. } => EventType::PlaylistItemsChanged,
            Self::QueueChanged { .. } => EventType::QueueChanged,
        }
    }
}

/// Formats the event type as its wire tag.
impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaylistsChanged => write!(f, "playlistsChanged"),
            Self::PlaylistItemsChanged => write!(f, "playlistItemsChanged"),
            Self::QueueChanged => write!(f, "queueChanged"),
        }
    }
}
