//! Lifecycle of an asynchronous API request.
//!
//! A [`Request`] pairs a [`RequestConfig`] with a [`Cell`] and drives the
//! cell through the states of a fetch:
//!
//! ```text
//! Pending ──fetch()──> InProgress ──ok──> Success(data)
//!                          │
//!                          └────err─────> Error(error)
//! ```
//!
//! `fetch()` may be called again from any state; it moves back to
//! `InProgress`, dropping previous data or error. When fetches overlap, the
//! one that settles last determines the final state.
//!
//! # Example
//!
//! ```rust
//! use cssorbot::{api::RequestConfig, request::Request, store::keys};
//!
//! let playlists = Request::new(client, RequestConfig::get("/playlists"), store.cell(&keys::PLAYLISTS)?);
//! playlists.fetch(None).await?;
//! if let Some(data) = playlists.state().data() {
//!     println!("{} playlists", data.playlists.len());
//! }
//! ```

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde::Deserialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    api::{Client, RequestConfig},
    error::{Error, Result},
    store::Cell,
};

/// Tag of a [`RequestState`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    InProgress,
    Success,
    Error,
}

/// Formats the status as `pending`, `in_progress`, `success` or `error`.
impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// State of a request. Data is present only on success, an error only on
/// failure.
#[derive(Clone, Debug)]
pub enum RequestState<T> {
    Pending,
    InProgress,
    Success(T),
    Error(Error),
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self::Pending
    }
}

impl<T> RequestState<T> {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Pending => Status::Pending,
            Self::InProgress => Status::InProgress,
            Self::Success(_) => Status::Success,
            Self::Error(_) => Status::Error,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether a fetch is in progress.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Whether data has been fetched successfully.
    #[must_use]
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether neither data nor a fetch in progress is available.
    #[must_use]
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Self::Success(_) | Self::InProgress)
    }

    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl<T> From<Result<T>> for RequestState<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(e) => Self::Error(e),
        }
    }
}

/// Request bound to the cell it reports into.
pub struct Request<T> {
    client: Client,
    config: RequestConfig,
    cell: Cell<T>,
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            cell: self.cell.clone(),
        }
    }
}

impl<T> Request<T>
where
    T: for<'de> Deserialize<'de> + fmt::Debug + Clone + Send + Sync + 'static,
{
    /// Creates a request reporting into a shared cell.
    #[must_use]
    pub fn new(client: Client, config: RequestConfig, cell: Cell<T>) -> Self {
        Self {
            client,
            config,
            cell,
        }
    }

    /// Creates a request with a private cell.
    #[must_use]
    pub fn local(client: Client, config: RequestConfig) -> Self {
        Self::new(client, config, Cell::new())
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> RequestState<T> {
        self.cell.get()
    }

    #[must_use]
    pub fn cell(&self) -> &Cell<T> {
        &self.cell
    }

    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Observes state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.cell.subscribe()
    }

    /// Starts a fetch, with `overrides` layered over the base configuration.
    ///
    /// The state is `InProgress` when this returns. The request runs in the
    /// background and settles into `Success` or `Error` whether or not the
    /// returned [`Fetch`] is awaited.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn fetch(&self, overrides: Option<&RequestConfig>) -> Fetch {
        let config = match overrides {
            Some(overrides) => self.config.merge(overrides),
            None => self.config.clone(),
        };

        self.cell.set(RequestState::InProgress);

        let client = self.client.clone();
        let cell = self.cell.clone();
        let handle = tokio::spawn(async move {
            let result = client.send::<T>(&config).await;
            if let Err(ref e) = result {
                debug!(
                    "{}: {e}",
                    config.url.as_deref().unwrap_or_default()
                );
            }

            let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
            cell.set(result.into());
            outcome
        });

        Fetch { handle }
    }

    /// Starts a fetch unless data is present or a fetch is in progress.
    pub fn fetch_if_needed(&self) -> Option<Fetch> {
        if self.cell.with(RequestState::needs_fetch) {
            Some(self.fetch(None))
        } else {
            None
        }
    }

    /// Patches the state in place, outside of the fetch lifecycle.
    ///
    /// The patch must keep the state consistent: switching to `Success`
    /// requires supplying the data.
    pub fn update_state(&self, patch: impl FnOnce(&mut RequestState<T>)) {
        self.cell.update(patch);
    }

    /// Returns to `Pending`, dropping data or error.
    pub fn reset(&self) {
        self.cell.set(RequestState::Pending);
    }
}

/// Handle on a fetch running in the background.
///
/// Resolves once the state has settled, to `Ok` if it settled into
/// `Success`. Dropping the handle does not cancel the fetch.
#[derive(Debug)]
#[must_use = "dropping a fetch does not cancel it"]
pub struct Fetch {
    handle: JoinHandle<Result<()>>,
}

impl Fetch {
    /// Cancels the fetch. The state is left as it is, typically
    /// `InProgress`, for the next fetch to overwrite.
    pub fn abort(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for Fetch {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.map_err(Error::from).and_then(|result| result))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::*;
    use crate::{
        api::{lookup_request, routes},
        error::ErrorKind,
        protocol::{lookup::LookupResponse, playlists::PlaylistsResponse},
        testing::{credential, Harness},
    };

    fn playlists_harness() -> Harness {
        Harness::new(Some(credential("id", 3600)), |request| {
            match request.query.as_deref() {
                Some("fail=1") => (StatusCode::SERVICE_UNAVAILABLE, String::new()),
                _ => (
                    StatusCode::OK,
                    r#"{"playlists":[{"id":"p1","name":"Mine","cover":null,"source":null,
                        "sourceUrl":null,"createdBy":"u1"}]}"#
                        .to_owned(),
                ),
            }
        })
    }

    #[tokio::test]
    async fn lookup_with_null_result_succeeds() {
        let harness = Harness::new(Some(credential("id", 3600)), |_| {
            (StatusCode::OK, r#"{"result":null}"#.to_owned())
        });
        let lookup =
            Request::<LookupResponse>::local(harness.client.clone(), lookup_request("test"));

        lookup.fetch(None).await.unwrap();

        let state = lookup.state();
        assert_eq!(state.status(), Status::Success);
        assert_eq!(state.data().map(|data| data.result.clone()), Some(None));
        assert!(state.error().is_none());
        assert_eq!(
            harness.transport.requests()[0].query.as_deref(),
            Some("q=test")
        );
    }

    #[tokio::test]
    async fn fetch_is_in_progress_immediately() {
        let harness = playlists_harness().with_delay(Duration::from_millis(20));
        let playlists = Request::<PlaylistsResponse>::local(
            harness.client.clone(),
            RequestConfig::get(routes::PLAYLISTS),
        );
        assert!(playlists.state().is_pending());

        let fetch = playlists.fetch(None);
        let state = playlists.state();
        assert!(state.is_fetching());
        assert!(state.data().is_none() && state.error().is_none());

        fetch.await.unwrap();
        assert_eq!(playlists.state().data().unwrap().playlists.len(), 1);
    }

    #[tokio::test]
    async fn refetch_clears_previous_data() {
        let harness = playlists_harness().with_delay(Duration::from_millis(20));
        let playlists = Request::<PlaylistsResponse>::local(
            harness.client.clone(),
            RequestConfig::get(routes::PLAYLISTS),
        );
        playlists.fetch(None).await.unwrap();
        assert!(playlists.state().is_fetched());

        let overrides = RequestConfig::default().param("fail", "1");
        let fetch = playlists.fetch(Some(&overrides));
        assert!(playlists.state().data().is_none());

        let err = fetch.await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
        let state = playlists.state();
        assert_eq!(state.status(), Status::Error);
        assert!(state.data().is_none());
        assert_eq!(state.error().unwrap().kind, ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn dropped_handle_still_settles() {
        let harness = playlists_harness();
        let playlists = Request::<PlaylistsResponse>::local(
            harness.client.clone(),
            RequestConfig::get(routes::PLAYLISTS),
        );
        let mut rx = playlists.subscribe();

        drop(playlists.fetch(None));
        rx.wait_for(RequestState::is_fetched).await.unwrap();
    }

    #[tokio::test]
    async fn aborted_fetch_leaves_state() {
        let harness = playlists_harness().with_delay(Duration::from_secs(60));
        let playlists = Request::<PlaylistsResponse>::local(
            harness.client.clone(),
            RequestConfig::get(routes::PLAYLISTS),
        );

        let fetch = playlists.fetch(None);
        fetch.abort();
        let err = fetch.await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert!(playlists.state().is_fetching());
    }

    #[tokio::test]
    async fn fetch_if_needed_skips_success_and_in_progress() {
        let harness = playlists_harness().with_delay(Duration::from_millis(20));
        let playlists = Request::<PlaylistsResponse>::local(
            harness.client.clone(),
            RequestConfig::get(routes::PLAYLISTS),
        );

        let fetch = playlists.fetch_if_needed().unwrap();
        assert!(playlists.fetch_if_needed().is_none());
        fetch.await.unwrap();
        assert!(playlists.fetch_if_needed().is_none());
        assert_eq!(harness.transport.calls(routes::PLAYLISTS), 1);

        playlists.reset();
        assert!(playlists.state().is_pending());
        playlists.fetch_if_needed().unwrap().await.unwrap();
        assert_eq!(harness.transport.calls(routes::PLAYLISTS), 2);
    }

    #[tokio::test]
    async fn update_state_patches_success_in_place() {
        let harness = playlists_harness();
        let playlists = Request::<PlaylistsResponse>::local(
            harness.client.clone(),
            RequestConfig::get(routes::PLAYLISTS),
        );
        playlists.fetch(None).await.unwrap();

        playlists.update_state(|state| {
            if let Some(data) = state.data_mut() {
                data.playlists[0].name = "Renamed".to_owned();
            }
        });
        let state = playlists.state();
        assert_eq!(state.status(), Status::Success);
        assert_eq!(state.data().unwrap().playlists[0].name, "Renamed");
    }

    #[test]
    fn status_names() {
        assert_eq!(RequestState::<()>::default().status().to_string(), "pending");
        assert_eq!(Status::InProgress.to_string(), "in_progress");
    }
}
