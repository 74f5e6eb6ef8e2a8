//! Client core for the cssorbot music player.
//!
//! Authenticates against the cssorbot API with an OAuth-derived credential,
//! keeps that credential fresh, fetches data into observable request states,
//! and keeps those states in sync with events pushed over a websocket.
//!
//! # Layers
//!
//! * [`session`] - The stored credential, single-flight refresh and
//!   escalation to login
//! * [`api`] - HTTP client attaching the credential and reacting to
//!   rejections
//! * [`request`] and [`store`] - Request lifecycles reported into shared,
//!   observable cells
//! * [`stream`] and [`reconcile`] - Pushed events and how they patch fetched
//!   state
//!
//! # Example
//!
//! ```ignore
//! let session = Arc::new(Session::new(base_url, store, transport, escalation));
//! let client = api::Client::new(Arc::clone(&session));
//!
//! let store = Store::new();
//! let playlists = Request::new(
//!     client.clone(),
//!     RequestConfig::get(routes::PLAYLISTS),
//!     store.cell(&keys::PLAYLISTS)?,
//! );
//!
//! let stream = Arc::new(EventStream::new(ws_url, session));
//! let _listener = PlaylistsListener::attach(&stream, playlists.cell().clone());
//!
//! playlists.fetch(None).await?;
//! stream.run().await?;
//! ```
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod http;
pub mod login;
pub mod protocol;
pub mod reconcile;
pub mod request;
pub mod session;
pub mod signal;
pub mod store;
pub mod stream;
pub mod token_store;
pub mod util;

#[cfg(test)]
mod testing;
