//! Shared reactive store of request states.
//!
//! A [`Store`] holds named cells, each containing a [`RequestState`]. Cells
//! are created on first use in the `Pending` state and live as long as the
//! store. Several consumers can hold the same [`Cell`]: the fetch path writes
//! results into it, push events patch it, and observers get notified of
//! every change through [`Cell::subscribe`].
//!
//! The store is an ordinary value passed to whoever needs it; there is no
//! process-wide instance.
//!
//! # Example
//!
//! ```rust
//! use cssorbot::store::{keys, Store};
//!
//! let store = Store::new();
//! let playlists = store.cell(&keys::PLAYLISTS)?;
//! assert!(playlists.get().is_pending());
//! ```

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use tokio::sync::watch;

use crate::{
    error::{Error, Result},
    request::RequestState,
};

/// Typed name of a cell.
pub struct Key<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Well-known cells.
pub mod keys {
    use super::Key;
    use crate::protocol::{playlists::PlaylistsResponse, servers::Server};

    pub const PLAYLISTS: Key<PlaylistsResponse> = Key::new("playlists");
    pub const SERVERS: Key<Server> = Key::new("servers");
}

/// Observable slot holding a request state.
///
/// Clones refer to the same slot.
pub struct Cell<T> {
    sender: Arc<watch::Sender<RequestState<T>>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> Default for Cell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Cell<T> {
    /// Creates a standalone cell in the `Pending` state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(RequestState::Pending);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn get(&self) -> RequestState<T>
    where
        T: Clone,
    {
        self.sender.borrow().clone()
    }

    /// Reads the current state without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&RequestState<T>) -> R) -> R {
        f(&self.sender.borrow())
    }

    /// Replaces the state and notifies observers.
    pub fn set(&self, state: RequestState<T>) {
        self.sender.send_replace(state);
    }

    /// Patches the state in place and notifies observers.
    ///
    /// The patch must leave the state consistent: switching to `Success`
    /// requires supplying the data.
    pub fn update(&self, patch: impl FnOnce(&mut RequestState<T>)) {
        self.sender.send_modify(patch);
    }

    /// Patches the state in place, notifying observers only if `patch`
    /// returns `true`.
    pub fn update_if(&self, patch: impl FnOnce(&mut RequestState<T>) -> bool) -> bool {
        self.sender.send_if_modified(patch)
    }

    /// Observes changes of the state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.sender.subscribe()
    }

    /// Whether both handles refer to the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.sender, &other.sender)
    }
}

impl<T: fmt::Debug> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cell").field(&*self.sender.borrow()).finish()
    }
}

/// Named cells shared between consumers.
#[derive(Default)]
pub struct Store {
    cells: Mutex<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell named by `key`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` if a cell of that name exists with a
    /// different type.
    pub fn cell<T>(&self, key: &Key<T>) -> Result<Cell<T>>
    where
        T: Send + Sync + 'static,
    {
        let mut cells = self.cells.lock()?;
        let entry = cells.entry(key.name).or_insert_with(|| {
            trace!("creating cell {}", key.name);
            Box::new(Cell::<T>::new())
        });

        entry.downcast_ref::<Cell<T>>().cloned().ok_or_else(|| {
            Error::failed_precondition(format!("cell {} holds another type", key.name))
        })
    }

    /// Number of cells created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.lock().map_or(0, |cells| cells.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .cells
            .lock()
            .map(|cells| cells.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("Store").field("cells", &names).finish()
    }
}
