//! Event stream client.
//!
//! Keeps a single websocket connection to the server and fans pushed
//! [`Event`]s out to any number of subscribers.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──run()──> AwaitingCredential ──> Connected
//!       ^                                            │
//!       └───────────── transport error ──────────────┘
//! ```
//!
//! * A valid credential is resolved before connecting. If that escalates to
//!   login, the stream stays disconnected for good.
//! * The id token is passed as the `Authorization` query parameter.
//! * Shortly before that token expires, the connection is renewed with a
//!   freshly refreshed credential. Tokens too short-lived for that keep their
//!   connection until the server closes it.
//! * When the server closes the connection, it is re-opened after a short
//!   jittered delay.
//! * Any transport error is treated as an authentication failure and
//!   escalates to login.
//!
//! # Delivery
//!
//! Text frames are parsed as JSON events and delivered synchronously to every
//! subscriber whose [`Filter`] matches, at most once per frame each. Frames
//! that are not text, or do not parse, are logged and dropped without
//! affecting the connection.
//!
//! # Example
//!
//! ```rust
//! use cssorbot::{events::EventType, stream::EventStream};
//!
//! let stream = Arc::new(EventStream::new(config.ws_api_host.clone(), session));
//! let _subscription = stream.subscribe(EventType::QueueChanged, |event| println!("{event:?}"));
//! stream.run().await?;
//! ```

use std::{
    fmt,
    ops::ControlFlow,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    credential::Credential,
    error::Result,
    events::{Event, EventType},
    protocol,
    session::Session,
};

/// Where the stream is in its connection lifecycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    AwaitingCredential,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::AwaitingCredential => write!(f, "awaiting credential"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Selects the events a subscriber receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    All,
    Only(Vec<EventType>),
}

impl Filter {
    #[must_use]
    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            Self::All => true,
            Self::Only(types) => types.contains(&event_type),
        }
    }
}

impl From<EventType> for Filter {
    fn from(event_type: EventType) -> Self {
        Self::Only(vec![event_type])
    }
}

impl<const N: usize> From<[EventType; N]> for Filter {
    fn from(event_types: [EventType; N]) -> Self {
        Self::Only(event_types.to_vec())
    }
}

impl From<Vec<EventType>> for Filter {
    fn from(event_types: Vec<EventType>) -> Self {
        Self::Only(event_types)
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscriber {
    id: u64,
    filter: Filter,
    handler: Handler,
}

/// Keeps a subscriber registered; unsubscribes when dropped.
#[must_use = "dropping a subscription unsubscribes"]
pub struct Subscription {
    id: u64,
    stream: Weak<EventStream>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.upgrade() {
            stream.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}

/// Why a connection ended without an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Outcome {
    Shutdown,
    Renew,
    Closed,
}

pub struct EventStream {
    url: Url,
    session: Arc<Session>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl EventStream {
    /// Renew the connection this long before the credential expires.
    const RENEWAL_THRESHOLD: Duration = Duration::from_secs(60);

    /// Do not parse exceedingly large messages to prevent out of memory
    /// conditions.
    const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    #[must_use]
    pub fn new(url: Url, session: Arc<Session>) -> Self {
        Self {
            url,
            session,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            state: watch::Sender::new(ConnectionState::Disconnected),
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers `handler` for events matching `filter`.
    ///
    /// Handlers run synchronously on the task driving [`run`](Self::run) and
    /// should return quickly.
    pub fn subscribe<F>(self: &Arc<Self>, filter: impl Into<Filter>, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let filter = filter.into();
        trace!("subscriber {id}: {filter:?}");

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                filter,
                handler: Arc::new(handler),
            });

        Subscription {
            id,
            stream: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        trace!("subscriber {id}: unsubscribed");
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.id != id);
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observes connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("event stream {state}");
        }
    }

    /// Stops [`run`](Self::run) and closes the connection.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Connects and delivers events until closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::login_redirect`](crate::error::Error::login_redirect)
    /// when no credential can be resolved or the connection fails.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        let mut renew = false;

        let result = loop {
            self.set_state(ConnectionState::AwaitingCredential);

            let credential = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break Ok(()),
                credential = self.resolve_credential(renew) => credential,
            };

            let credential = match credential {
                Ok(credential) => credential,
                Err(e) if e.is_login_redirect() => {
                    info!("event stream not connecting: login required");
                    break Err(e);
                }
                Err(e) => {
                    error!("resolving credential failed: {e}");
                    break Err(self.session.escalation().redirect());
                }
            };

            match self.connect(&credential).await {
                Ok(Outcome::Shutdown) => break Ok(()),
                Ok(Outcome::Renew) => renew = true,
                Ok(Outcome::Closed) => {
                    renew = false;
                    self.set_state(ConnectionState::Disconnected);

                    // Sleep with jitter to prevent thundering herds when the
                    // server restarts.
                    let duration = Duration::from_millis(fastrand::u64(5_000..6_000));
                    info!("reconnecting in {:.1}s", duration.as_secs_f32());
                    tokio::select! {
                        () = self.shutdown.cancelled() => break Ok(()),
                        () = tokio::time::sleep(duration) => {}
                    }
                }
                Err(e) => {
                    error!("event stream failed: {e}");
                    break Err(self.session.escalation().redirect());
                }
            }
        };

        self.set_state(ConnectionState::Disconnected);
        result
    }

    async fn resolve_credential(self: &Arc<Self>, renew: bool) -> Result<Credential> {
        if renew {
            self.session.refresh().await
        } else {
            self.session.valid_credential().await
        }
    }

    /// Time after which a connection opened with a token living for
    /// `time_to_live` is renewed.
    ///
    /// Tokens that would not keep a connection open for at least
    /// [`RENEWAL_THRESHOLD`](Self::RENEWAL_THRESHOLD) are not renewed at all.
    fn renewal_delay(time_to_live: Duration) -> Option<Duration> {
        time_to_live
            .checked_sub(Self::RENEWAL_THRESHOLD)
            .filter(|delay| *delay >= Self::RENEWAL_THRESHOLD)
    }

    async fn connect(&self, credential: &Credential) -> Result<Outcome> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("Authorization", &credential.id_token);

        // Set timer for renewal a short while before the token expires. The
        // token is never re-sent on an open connection.
        let renewal = Self::renewal_delay(credential.time_to_live())
            .map(|delay| tokio::time::Instant::now() + delay);
        if renewal.is_none() {
            warn!("credential expires too soon to renew, keeping connection until closed");
        }
        let renewal = async move {
            match renewal {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(renewal);

        debug!("connecting to {}", self.url);
        let (ws_stream, _) = tokio::select! {
            biased;

            () = self.shutdown.cancelled() => return Ok(Outcome::Shutdown),
            result = tokio_tungstenite::connect_async(url.as_str()) => result?,
        };
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        info!("event stream connected");

        let outcome = loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break Outcome::Shutdown,

                () = &mut renewal => {
                    debug!("renewing connection before credential expires");
                    break Outcome::Renew;
                }

                message = ws_rx.next() => match message {
                    Some(Ok(message)) => {
                        if let ControlFlow::Break(()) = self.handle_message(message) {
                            break Outcome::Closed;
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break Outcome::Closed,
                },
            }
        };

        if outcome != Outcome::Closed {
            if let Err(e) = ws_tx.send(Message::Close(None)).await {
                debug!("closing connection: {e}");
            }
        }

        Ok(outcome)
    }

    fn handle_message(&self, message: Message) -> ControlFlow<()> {
        let message_size = message.len();
        if message_size > Self::MAX_MESSAGE_SIZE {
            warn!("ignoring oversized message with {message_size} bytes");
            return ControlFlow::Continue(());
        }

        match message {
            Message::Text(text) => {
                self.dispatch(text.as_str());
            }
            Message::Binary(data) => {
                warn!("ignoring binary message with {} bytes", data.len());
            }
            Message::Close(frame) => {
                info!("connection closed by server: {frame:?}");
                return ControlFlow::Break(());
            }
            // Pings are answered by `tungstenite` itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                trace!("control frame");
            }
        }

        ControlFlow::Continue(())
    }

    /// Parses a text frame and delivers it to matching subscribers.
    ///
    /// Returns to how many subscribers the event was delivered.
    pub fn dispatch(&self, text: &str) -> usize {
        let Ok(event) = protocol::json::<Event>(text, "event stream") else {
            warn!("ignoring malformed event");
            return 0;
        };

        let event_type = event.event_type();
        trace!("received {event_type}");

        // Snapshot, so that handlers may subscribe or unsubscribe.
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|subscriber| subscriber.filter.matches(event_type))
            .map(|subscriber| Arc::clone(&subscriber.handler))
            .collect();

        for handler in &handlers {
            handler(&event);
        }

        handlers.len()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use reqwest::StatusCode;
    use tokio::{net::TcpListener, sync::mpsc};
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as Handshake, Response,
    };

    use super::*;
    use crate::{
        api::routes,
        reconcile::PlaylistsListener,
        request::RequestState,
        store::{keys, Store},
        testing::{credential, credential_json, Harness},
    };

    const PLAYLISTS_CHANGED: &str = r#"{"type":"playlistsChanged","playlists":[
        {"id":"p9","name":"Pushed","cover":null,"source":"youtube","sourceUrl":null,"createdBy":"u1"}]}"#;
    const QUEUE_CHANGED: &str = r#"{"type":"queueChanged","queue":[]}"#;

    fn stream(harness: &Harness) -> Arc<EventStream> {
        Arc::new(EventStream::new(
            Url::parse("wss://api.test/ws").unwrap(),
            Arc::clone(&harness.session),
        ))
    }

    /// How the loopback server treats an accepted connection.
    #[derive(Copy, Clone, Debug)]
    enum Peer {
        /// Pushes a queue event, then keeps the connection open.
        Hold,
        /// Drops the socket without a close frame.
        Hangup,
        /// Closes the first connection, holds later ones.
        CloseFirst,
    }

    struct Server {
        url: Url,
        /// Request target of every accepted handshake.
        uris: mpsc::UnboundedReceiver<String>,
        connections: Arc<AtomicUsize>,
    }

    async fn serve(peer: Peer) -> Server {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}/ws", listener.local_addr().unwrap())).unwrap();
        let (uri_tx, uris) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let n = accepted.fetch_add(1, Ordering::SeqCst);
                let uri_tx = uri_tx.clone();
                tokio::spawn(async move {
                    let mut uri = String::new();
                    let callback = |request: &Handshake,
                                    response: Response|
                     -> std::result::Result<Response, ErrorResponse> {
                        uri = request.uri().to_string();
                        Ok(response)
                    };
                    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tcp, callback).await
                    else {
                        return;
                    };
                    let _ = uri_tx.send(uri);

                    match peer {
                        Peer::Hangup => return,
                        Peer::CloseFirst if n == 0 => {
                            let _ = ws.send(Message::Close(None)).await;
                        }
                        Peer::Hold | Peer::CloseFirst => {
                            let _ = ws.send(Message::Text(QUEUE_CHANGED.into())).await;
                        }
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        Server {
            url,
            uris,
            connections,
        }
    }

    fn connected_stream(harness: &Harness, server: &Server) -> Arc<EventStream> {
        Arc::new(EventStream::new(
            server.url.clone(),
            Arc::clone(&harness.session),
        ))
    }

    fn spawn_run(stream: &Arc<EventStream>) -> tokio::task::JoinHandle<Result<()>> {
        let stream = Arc::clone(stream);
        tokio::spawn(async move { stream.run().await })
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Event) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = Arc::clone(&count);
        (count, move |_: &Event| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn delivers_only_matching_events() {
        let harness = Harness::new(None, |_| (StatusCode::OK, String::new()));
        let stream = stream(&harness);

        let (queue_count, queue_handler) = counter();
        let (all_count, all_handler) = counter();
        let _queue = stream.subscribe(EventType::QueueChanged, queue_handler);
        let _all = stream.subscribe(Filter::All, all_handler);

        assert_eq!(stream.dispatch(QUEUE_CHANGED), 2);
        assert_eq!(stream.dispatch(PLAYLISTS_CHANGED), 1);

        assert_eq!(queue_count.load(Ordering::SeqCst), 1);
        assert_eq!(all_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let harness = Harness::new(None, |_| (StatusCode::OK, String::new()));
        let stream = stream(&harness);

        let (count, handler) = counter();
        let subscription = stream.subscribe(Filter::All, handler);
        assert_eq!(stream.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(stream.subscriber_count(), 0);
        assert_eq!(stream.dispatch(QUEUE_CHANGED), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let harness = Harness::new(None, |_| (StatusCode::OK, String::new()));
        let stream = stream(&harness);
        let (count, handler) = counter();
        let _all = stream.subscribe(Filter::All, handler);

        assert_eq!(stream.dispatch("not json"), 0);
        assert_eq!(stream.dispatch(r#"{"type":"unknownEvent"}"#), 0);
        assert_eq!(
            stream.handle_message(Message::Binary(vec![1, 2, 3].into())),
            ControlFlow::Continue(())
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert_eq!(
            stream.handle_message(Message::Text(QUEUE_CHANGED.into())),
            ControlFlow::Continue(())
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            stream.handle_message(Message::Close(None)),
            ControlFlow::Break(())
        );
    }

    #[tokio::test]
    async fn run_without_credential_stays_disconnected() {
        let harness = Harness::new(None, |_| (StatusCode::OK, String::new()));
        let stream = stream(&harness);

        let err = stream.run().await.unwrap_err();
        assert!(err.is_login_redirect());
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert!(harness.transport.requests().is_empty());
        assert_eq!(harness.navigator.visited().len(), 1);
    }

    #[tokio::test]
    async fn closed_stream_does_not_connect() {
        let harness = Harness::new(Some(credential("id", 3600)), |_| {
            (StatusCode::OK, String::new())
        });
        let stream = stream(&harness);

        stream.close();
        stream.run().await.unwrap();
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert!(harness.navigator.visited().is_empty());
    }

    #[test]
    fn renewal_leaves_time_connected() {
        assert_eq!(EventStream::renewal_delay(Duration::ZERO), None);
        assert_eq!(EventStream::renewal_delay(Duration::from_secs(60)), None);
        assert_eq!(EventStream::renewal_delay(Duration::from_secs(90)), None);
        assert_eq!(
            EventStream::renewal_delay(Duration::from_secs(120)),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            EventStream::renewal_delay(Duration::from_secs(3600)),
            Some(Duration::from_secs(3540))
        );
    }

    #[tokio::test]
    async fn connects_with_id_token_in_query() {
        let mut server = serve(Peer::Hold).await;
        let harness = Harness::new(Some(credential("id", 3600)), |_| {
            (StatusCode::OK, String::new())
        });
        let stream = connected_stream(&harness, &server);

        let (event_tx, mut events) = mpsc::unbounded_channel();
        let _queue = stream.subscribe(EventType::QueueChanged, move |event| {
            let _ = event_tx.send(event.event_type());
        });
        let runner = spawn_run(&stream);

        assert_eq!(server.uris.recv().await.unwrap(), "/ws?Authorization=id");
        assert_eq!(events.recv().await, Some(EventType::QueueChanged));
        assert_eq!(stream.state(), ConnectionState::Connected);

        stream.close();
        runner.await.unwrap().unwrap();
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert!(harness.transport.requests().is_empty());
        assert!(harness.navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn transport_error_escalates_to_login() {
        let server = serve(Peer::Hangup).await;
        let harness = Harness::new(Some(credential("id", 3600)), |_| {
            (StatusCode::OK, String::new())
        });
        let stream = connected_stream(&harness, &server);

        let result = tokio::time::timeout(Duration::from_secs(10), stream.run())
            .await
            .unwrap();
        assert!(result.unwrap_err().is_login_redirect());
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert_eq!(server.connections.load(Ordering::SeqCst), 1);
        assert_eq!(harness.navigator.visited().len(), 1);
    }

    #[tokio::test]
    async fn server_close_reconnects_after_delay() {
        let mut server = serve(Peer::CloseFirst).await;
        let harness = Harness::new(Some(credential("id", 3600)), |_| {
            (StatusCode::OK, String::new())
        });
        let stream = connected_stream(&harness, &server);
        let runner = spawn_run(&stream);

        let first = server.uris.recv().await.unwrap();
        let started = tokio::time::Instant::now();
        let second = tokio::time::timeout(Duration::from_secs(15), server.uris.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(first, second);

        stream.close();
        runner.await.unwrap().unwrap();
        assert!(harness.transport.requests().is_empty());
        assert!(harness.navigator.visited().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connection_is_renewed_before_expiry() {
        let mut server = serve(Peer::Hold).await;
        let harness = Harness::new(Some(credential("old", 3600)), |request| {
            match request.path.as_str() {
                routes::REFRESH_TOKEN => (StatusCode::OK, credential_json("new", 3600)),
                _ => (StatusCode::NOT_FOUND, String::new()),
            }
        });
        let stream = connected_stream(&harness, &server);
        let runner = spawn_run(&stream);

        assert_eq!(server.uris.recv().await.unwrap(), "/ws?Authorization=old");
        assert_eq!(server.uris.recv().await.unwrap(), "/ws?Authorization=new");

        stream.close();
        runner.await.unwrap().unwrap();
        assert!(harness.transport.calls(routes::REFRESH_TOKEN) >= 1);
        assert!(harness.navigator.visited().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn short_lived_credential_keeps_connection() {
        let mut server = serve(Peer::Hold).await;
        let harness = Harness::new(Some(credential("old", 30)), |_| {
            (StatusCode::OK, credential_json("new", -5))
        });
        let stream = connected_stream(&harness, &server);
        let runner = spawn_run(&stream);

        assert_eq!(server.uris.recv().await.unwrap(), "/ws?Authorization=old");
        stream
            .watch_state()
            .wait_for(|state| *state == ConnectionState::Connected)
            .await
            .unwrap();

        // Well past the token's lifetime.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(server.connections.load(Ordering::SeqCst), 1);
        assert!(harness.transport.requests().is_empty());
        assert_eq!(stream.state(), ConnectionState::Connected);

        stream.close();
        runner.await.unwrap().unwrap();
    }

    #[test]
    fn pushed_playlists_reach_fetched_cell_only() {
        let harness = Harness::new(None, |_| (StatusCode::OK, String::new()));
        let stream = stream(&harness);
        let store = Store::new();
        let cell = store.cell(&keys::PLAYLISTS).unwrap();
        let _listener = PlaylistsListener::attach(&stream, cell.clone());

        assert_eq!(stream.dispatch(PLAYLISTS_CHANGED), 1);
        assert!(cell.get().is_pending());

        cell.set(RequestState::Success(Default::default()));
        stream.dispatch(PLAYLISTS_CHANGED);
        let state = cell.get();
        let playlists = &state.data().unwrap().playlists;
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].id, "p9");

        // Queue events are not routed to the listener.
        assert_eq!(stream.dispatch(QUEUE_CHANGED), 0);
    }
}
