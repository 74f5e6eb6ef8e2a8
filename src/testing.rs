//! Test doubles shared by the unit tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, SystemTime},
};

use futures_util::{future::BoxFuture, FutureExt};
use reqwest::{header::AUTHORIZATION, Method, StatusCode, Url};

use crate::{
    api,
    config::{OAuthConfig, DEFAULT_AUTHORIZE_URL},
    credential::Credential,
    error::{Error, Result},
    http::Transport,
    login::{Escalation, Navigator},
    session::Session,
    token_store::{MemoryStore, TokenStore},
};

pub const BASE_URL: &str = "https://api.test/";

/// What the transport saw of a request.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<String>,
}

impl From<&reqwest::Request> for Recorded {
    fn from(request: &reqwest::Request) -> Self {
        Self {
            method: request.method().clone(),
            path: request.url().path().to_owned(),
            query: request.url().query().map(str::to_owned),
            authorization: request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            body: request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

type Responder = dyn Fn(&Recorded) -> (StatusCode, String) + Send + Sync;

/// Transport answering from a closure, recording every request.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<Recorded>>,
    delay: Mutex<Duration>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Recorded) -> (StatusCode, String) + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>> {
        let recorded = Recorded::from(&request);
        let (status, body) = (self.responder)(&recorded);
        self.requests.lock().unwrap().push(recorded);
        let delay = *self.delay.lock().unwrap();

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let response = ::http::Response::builder()
                .status(status)
                .body(body)
                .map_err(Error::internal)?;
            Ok(response.into())
        }
        .boxed()
    }
}

/// Navigator remembering where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<Url> {
        self.visited.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.visited.lock().unwrap().push(url.clone());
    }
}

/// In-memory store counting how often the credential is read.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    loads: AtomicUsize,
}

impl CountingStore {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl TokenStore for CountingStore {
    fn load(&self) -> Option<Credential> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load()
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.inner.save(credential)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

/// Credential whose id token expires `expires_in` seconds from now, in the
/// past when negative.
pub fn credential(id: &str, expires_in: i64) -> Credential {
    let offset = Duration::from_secs(expires_in.unsigned_abs());
    let expires_at = if expires_in < 0 {
        SystemTime::now() - offset
    } else {
        SystemTime::now() + offset
    };

    Credential {
        id_token: id.to_owned(),
        refresh_token: format!("refresh-{id}"),
        expires_at,
    }
}

/// Wire form of [`credential`].
pub fn credential_json(id: &str, expires_in: i64) -> String {
    serde_json::to_string(&credential(id, expires_in)).unwrap()
}

pub fn oauth() -> OAuthConfig {
    OAuthConfig {
        authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL).unwrap(),
        client_id: "1234".to_owned(),
        redirect_url: Url::parse("https://app.test/login").unwrap(),
        scopes: vec!["identify".to_owned(), "guilds".to_owned()],
    }
}

/// Session and API client wired to test doubles.
pub struct Harness {
    pub store: Arc<CountingStore>,
    pub transport: Arc<ScriptedTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub session: Arc<Session>,
    pub client: api::Client,
}

impl Harness {
    pub fn new<F>(stored: Option<Credential>, responder: F) -> Self
    where
        F: Fn(&Recorded) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let store = Arc::new(CountingStore::default());
        if let Some(credential) = stored {
            store.inner.save(&credential).unwrap();
        }

        let transport = Arc::new(ScriptedTransport::new(responder));
        let navigator = Arc::new(RecordingNavigator::default());
        let session = Arc::new(Session::new(
            Url::parse(BASE_URL).unwrap(),
            store.clone(),
            transport.clone(),
            Escalation::new(&oauth(), navigator.clone()),
        ));
        let client = api::Client::new(Arc::clone(&session));

        Self {
            store,
            transport,
            navigator,
            session,
            client,
        }
    }

    /// Delays every response.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.transport.set_delay(delay);
        self
    }
}
