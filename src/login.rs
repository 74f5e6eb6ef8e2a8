//! Escalation to the interactive login flow.
//!
//! When the client has no usable credential, it gives up on the current
//! operation and sends the user to the OAuth authorization page. The URL is
//! only constructed and handed to a [`Navigator`]; it is never fetched.
//!
//! Escalation is terminal for whoever triggered it: [`Escalation::redirect`]
//! returns [`Error::login_redirect`], which callers propagate with `?` and
//! recognize with [`Error::is_login_redirect`].

use std::sync::Arc;

use url::Url;

use crate::{config::OAuthConfig, error::Error};

/// Builds the OAuth authorization URL for the configured application.
///
/// The URL carries `client_id`, `redirect_uri`, `response_type=code` and the
/// space separated `scope`.
#[must_use]
pub fn login_url(oauth: &OAuthConfig) -> Url {
    let mut url = oauth.authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &oauth.client_id)
        .append_pair("redirect_uri", oauth.redirect_url.as_str())
        .append_pair("response_type", "code")
        .append_pair("scope", &oauth.scopes.join(" "));
    url
}

/// Takes the user somewhere else.
///
/// In a browser this would replace the current location. Headless builds log
/// the URL so the user can open it themselves.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Navigator that tells the user where to log in.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &Url) {
        warn!("login required, open {url} to continue");
    }
}

/// Target of a login escalation, together with how to get there.
#[derive(Clone)]
pub struct Escalation {
    url: Url,
    navigator: Arc<dyn Navigator>,
}

impl Escalation {
    #[must_use]
    pub fn new(oauth: &OAuthConfig, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            url: login_url(oauth),
            navigator,
        }
    }

    /// Authorization URL the user is sent to.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Navigates to the login page and returns the terminal error to
    /// propagate.
    #[must_use]
    pub fn redirect(&self) -> Error {
        debug!("escalating to login");
        self.navigator.navigate(&self.url);
        Error::login_redirect()
    }
}

impl std::fmt::Debug for Escalation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Escalation")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}
