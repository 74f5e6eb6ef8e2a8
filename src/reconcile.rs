//! Applies pushed events to fetched state.
//!
//! Push events only ever refine a state that a fetch already produced. Each
//! rule is guarded on the cell being in `Success`: events arriving while a
//! cell is `Pending`, `InProgress` or `Error` are dropped, and the fetch that
//! is in progress (or the next one) supplies a consistent baseline.
//!
//! Two rules exist:
//! * Collection replaced: the whole collection is overwritten by the pushed
//!   one, dropping members that are not in it
//! * Member patched: the member with the given id gets its sub-collection
//!   replaced; unknown ids are ignored

use std::sync::Arc;

use crate::{
    events::{Event, EventType},
    protocol::playlists::{Playlist, PlaylistItem, PlaylistsResponse},
    request::RequestState,
    store::Cell,
    stream::{EventStream, Subscription},
};

/// Collection whose members can be patched by id.
pub trait Collection {
    type Member: Member;

    fn members_mut(&mut self) -> &mut Vec<Self::Member>;
}

/// Identified member with a replaceable sub-collection.
pub trait Member {
    type Item;

    fn id(&self) -> &str;
    fn set_items(&mut self, items: Vec<Self::Item>);
}

impl Collection for PlaylistsResponse {
    type Member = Playlist;

    fn members_mut(&mut self) -> &mut Vec<Playlist> {
        &mut self.playlists
    }
}

impl Member for Playlist {
    type Item = PlaylistItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_items(&mut self, items: Vec<PlaylistItem>) {
        self.items = Some(items);
    }
}

/// Overwrites the collection if `state` is `Success`.
///
/// Returns whether the state changed.
pub fn replace_collection<C: Collection>(
    state: &mut RequestState<C>,
    members: Vec<C::Member>,
) -> bool {
    let status = state.status();
    let Some(collection) = state.data_mut() else {
        trace!("dropping collection replacement: {status}");
        return false;
    };

    *collection.members_mut() = members;
    true
}

/// Replaces the items of member `id` if `state` is `Success` and the member
/// exists.
///
/// Returns whether the state changed.
pub fn patch_member<C: Collection>(
    state: &mut RequestState<C>,
    id: &str,
    items: Vec<<C::Member as Member>::Item>,
) -> bool {
    let status = state.status();
    let Some(collection) = state.data_mut() else {
        trace!("dropping patch of {id}: {status}");
        return false;
    };

    match collection
        .members_mut()
        .iter_mut()
        .find(|member| member.id() == id)
    {
        Some(member) => {
            member.set_items(items);
            true
        }
        None => {
            trace!("dropping patch of unknown member {id}");
            false
        }
    }
}

/// Applies `event` to the playlists state.
///
/// Returns whether the state changed. Queue changes do not touch playlists.
pub fn apply(state: &mut RequestState<PlaylistsResponse>, event: &Event) -> bool {
    match event {
        Event::PlaylistsChanged { playlists } => replace_collection(state, playlists.clone()),
        Event::PlaylistItemsChanged {
            playlist_id,
            playlist_items,
        } => patch_member(state, playlist_id, playlist_items.clone()),
        Event::QueueChanged { .. } => false,
    }
}

/// Keeps the playlists cell in sync with the event stream while alive.
#[derive(Debug)]
pub struct PlaylistsListener {
    _subscription: Subscription,
}

impl PlaylistsListener {
    /// Subscribes to playlist events and applies them to `cell`.
    #[must_use]
    pub fn attach(stream: &Arc<EventStream>, cell: Cell<PlaylistsResponse>) -> Self {
        let subscription = stream.subscribe(
            [EventType::PlaylistsChanged, EventType::PlaylistItemsChanged],
            move |event| {
                if cell.update_if(|state| apply(state, event)) {
                    debug!("applied {}", event.event_type());
                }
            },
        );

        Self {
            _subscription: subscription,
        }
    }
}
