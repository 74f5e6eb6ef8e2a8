//! Client for the cssorbot HTTP API.
//!
//! Every request passes through two interceptors around the transport:
//!
//! * Before sending: unless the request skips authentication or already
//!   carries an `Authorization` header, a credential that has not expired is
//!   obtained from the [`Session`] (refreshing it if needed) and attached as
//!   a bearer token.
//! * After receiving: a `401 Unauthorized` response escalates to login, and
//!   the escalation error is returned to the caller.
//!
//! Requests are described by a [`RequestConfig`], so that a base description
//! can be combined with per-call overrides.
//!
//! # Example
//!
//! ```rust
//! use cssorbot::api::{Client, RequestConfig};
//!
//! let client = Client::new(session);
//! let playlists = client.playlists().await?;
//!
//! let lookup = RequestConfig::get("/lookup").param("q", "never gonna");
//! let result: LookupResponse = client.send(&lookup).await?;
//! ```

use std::{fmt::Debug, sync::Arc};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Method, StatusCode,
};
use serde::Deserialize;

use crate::{
    credential::Credential,
    error::{Error, Result},
    http,
    protocol::{
        auth::LoginRequest,
        lookup::LookupResponse,
        playlists::{CreatePlaylistRequest, CreatePlaylistResponse, PlaylistsResponse},
        servers::Server,
    },
    session::Session,
};

/// Paths of the API endpoints, relative to the base URL.
pub mod routes {
    pub const LOGIN: &str = "/auth/login";
    pub const REFRESH_TOKEN: &str = "/auth/refresh-token";
    pub const LOOKUP: &str = "/lookup";
    pub const SERVERS: &str = "/servers";
    pub const PLAYLISTS: &str = "/playlists";
}

/// Description of a request.
///
/// Every field is optional so that configurations can be layered with
/// [`merge`](Self::merge).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestConfig {
    /// Defaults to `GET`
    pub method: Option<Method>,

    /// Path relative to the API base URL, or an absolute URL
    pub url: Option<String>,

    /// Query parameters
    pub params: Option<Vec<(String, String)>>,

    /// JSON body
    pub data: Option<serde_json::Value>,

    pub headers: Option<HeaderMap>,

    /// Send without attaching a credential
    pub skip_auth: Option<bool>,
}

impl RequestConfig {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(name, value);
        self
    }

    /// Marks the request to be sent without a credential.
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = Some(true);
        self
    }

    /// Layers `overrides` on top of this configuration.
    ///
    /// Every field set in `overrides` replaces the field here as a whole; no
    /// deep merging is done.
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        let overrides = overrides.clone();
        let base = self.clone();
        Self {
            method: overrides.method.or(base.method),
            url: overrides.url.or(base.url),
            params: overrides.params.or(base.params),
            data: overrides.data.or(base.data),
            headers: overrides.headers.or(base.headers),
            skip_auth: overrides.skip_auth.or(base.skip_auth),
        }
    }

    fn skips_auth(&self) -> bool {
        self.skip_auth.unwrap_or(false)
    }
}

/// Authenticated API client.
#[derive(Clone, Debug)]
pub struct Client {
    session: Arc<Session>,
}

impl Client {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Sends a request and decodes its JSON response.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * No credential can be attached ([`Error::login_redirect`])
    /// * The server rejects the credential ([`Error::login_redirect`])
    /// * The request fails or answers with another unsuccessful status
    /// * The response does not decode into `T`
    pub async fn send<T>(&self, config: &RequestConfig) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        let method = config.method.clone().unwrap_or(Method::GET);
        let Some(path) = config.url.as_deref() else {
            return Err(Error::invalid_argument("request has no url"));
        };

        let mut url = http::endpoint(self.session.base_url(), path)?;
        if let Some(params) = config.params.as_ref().filter(|params| !params.is_empty()) {
            url.query_pairs_mut().extend_pairs(params);
        }

        let mut request = http::request(method, url, config.data.as_ref())?;
        if let Some(headers) = &config.headers {
            request.headers_mut().extend(headers.clone());
        }

        if !config.skips_auth() && !request.headers().contains_key(AUTHORIZATION) {
            let credential = self.session.valid_credential().await?;
            let mut authorization =
                HeaderValue::from_str(&format!("Bearer {}", credential.id_token))?;
            authorization.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, authorization);
        }

        trace!("{} {}", request.method(), request.url());
        let response = self.session.transport().execute(request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("{path}: credential rejected");
            return Err(self.session.escalation().redirect());
        }

        http::decode(response, path).await
    }

    /// Exchanges an OAuth authorization code for a credential and stores it.
    pub async fn login(&self, code: &str) -> Result<Credential> {
        let body = serde_json::to_value(LoginRequest::new(code))?;
        let config = RequestConfig::post(routes::LOGIN).json(body).skip_auth();

        let credential: Credential = self.send(&config).await?;
        self.session.set_credential(&credential)?;
        info!("logged in, {credential}");

        Ok(credential)
    }

    /// Forgets the stored credential.
    pub fn logout(&self) -> Result<()> {
        self.session.clear_credential()
    }

    /// Refreshes the stored credential, see [`Session::refresh`].
    pub async fn refresh_token(&self) -> Result<Credential> {
        self.session.refresh().await
    }

    pub async fn lookup(&self, query: &str) -> Result<LookupResponse> {
        self.send(&lookup_request(query)).await
    }

    pub async fn servers(&self) -> Result<Server> {
        self.send(&RequestConfig::get(routes::SERVERS)).await
    }

    pub async fn playlists(&self) -> Result<PlaylistsResponse> {
        self.send(&RequestConfig::get(routes::PLAYLISTS)).await
    }

    pub async fn create_playlist(&self, name: &str) -> Result<CreatePlaylistResponse> {
        let body = serde_json::to_value(CreatePlaylistRequest {
            name: name.to_owned(),
        })?;
        self.send(&RequestConfig::post(routes::PLAYLISTS).json(body))
            .await
    }
}

/// Request for `GET /lookup?q=<query>`.
#[must_use]
pub fn lookup_request(query: &str) -> RequestConfig {
    RequestConfig::get(routes::LOOKUP).param("q", query)
}
