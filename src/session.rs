//! Session management: the one gateway to the stored credential.
//!
//! The [`Session`] reads and writes the credential through a
//! [`TokenStore`], refreshes it when it expires, and escalates to the login
//! page when no usable credential can be obtained.
//!
//! # Single-flight refresh
//!
//! Concurrent callers of [`Session::refresh`] while a refresh is in flight
//! all receive the same shared future, so only one call is ever made to
//! `POST /auth/refresh-token` at a time:
//!
//! 1. The first caller stores the shared future before anything is awaited
//! 2. Later callers clone the stored future
//! 3. The future clears the stored slot when it completes, successfully or
//!    not, so that the next call starts a fresh refresh
//!
//! # Escalation
//!
//! * No stored credential: escalate without touching the network
//! * Refresh fails: clear the credential, then escalate
//!
//! Both surface as
//! [`Error::login_redirect`](crate::error::Error::login_redirect).
//!
//! # Example
//!
//! ```rust
//! let session = Arc::new(Session::new(base_url, store, transport, escalation));
//!
//! // Never expired when it returns
//! let credential = session.valid_credential().await?;
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Method, Url,
};

use crate::{
    api::routes,
    credential::Credential,
    error::Result,
    http::{self, Transport},
    login::Escalation,
    token_store::TokenStore,
};

/// Refresh in flight, shared by every caller that asked for it.
pub type SharedRefresh = Shared<BoxFuture<'static, Result<Credential>>>;

pub struct Session {
    base_url: Url,
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn Transport>,
    escalation: Escalation,

    /// Refresh in flight, if any.
    refreshing: Mutex<Option<SharedRefresh>>,
}

impl Session {
    #[must_use]
    pub fn new(
        base_url: Url,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
        escalation: Escalation,
    ) -> Self {
        Self {
            base_url,
            store,
            transport,
            escalation,
            refreshing: Mutex::new(None),
        }
    }

    /// Returns the stored credential, if any. Never fails.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.store.load()
    }

    /// Persists `credential`, replacing any prior one.
    pub fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.store.save(credential)
    }

    /// Removes the stored credential.
    pub fn clear_credential(&self) -> Result<()> {
        self.store.clear()
    }

    /// Where and how to escalate to login.
    #[must_use]
    pub fn escalation(&self) -> &Escalation {
        &self.escalation
    }

    /// Base URL of the HTTP API.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Refreshes the credential, joining a refresh that is already in
    /// flight.
    ///
    /// The returned future resolves to the new credential, which has already
    /// been persisted, or to [`Error::login_redirect`](crate::error::Error::login_redirect).
    pub fn refresh(self: &Arc<Self>) -> SharedRefresh {
        let mut refreshing = self
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(in_flight) = refreshing.as_ref() {
            trace!("joining refresh in flight");
            return in_flight.clone();
        }

        let this = Arc::clone(self);
        let refresh = async move {
            let result = this.refresh_once().await;
            this.refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            result
        }
        .boxed()
        .shared();

        *refreshing = Some(refresh.clone());
        refresh
    }

    /// Returns a credential that has not expired, refreshing it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::login_redirect`](crate::error::Error::login_redirect)
    /// if there is no stored credential or the refresh fails.
    pub async fn valid_credential(self: &Arc<Self>) -> Result<Credential> {
        let Some(credential) = self.credential() else {
            debug!("no stored credential");
            return Err(self.escalation.redirect());
        };

        if credential.is_expired() {
            debug!("credential expired, refreshing");
            return self.refresh().await;
        }

        Ok(credential)
    }

    /// Succeeds when a credential is stored, escalates to login otherwise.
    ///
    /// The credential may still be expired; it is refreshed on first use.
    pub fn ensure_authenticated(&self) -> Result<()> {
        if self.credential().is_some() {
            Ok(())
        } else {
            Err(self.escalation.redirect())
        }
    }

    async fn refresh_once(&self) -> Result<Credential> {
        let Some(current) = self.credential() else {
            debug!("cannot refresh without a stored credential");
            return Err(self.escalation.redirect());
        };

        match self.request_refresh(&current).await {
            Ok(credential) => {
                self.set_credential(&credential)?;
                info!("refreshed {credential}");
                Ok(credential)
            }
            Err(e) => {
                error!("refreshing credential failed: {e}");
                if let Err(e) = self.clear_credential() {
                    error!("clearing credential failed: {e}");
                }
                Err(self.escalation.redirect())
            }
        }
    }

    async fn request_refresh(&self, current: &Credential) -> Result<Credential> {
        let url = http::endpoint(&self.base_url, routes::REFRESH_TOKEN)?;
        let mut request = http::request(Method::POST, url, None)?;

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", current.refresh_token))?;
        authorization.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, authorization);

        let response = self.transport.execute(request).await?;
        http::decode(response, routes::REFRESH_TOKEN).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("escalation", &self.escalation)
            .finish_non_exhaustive()
    }
}
