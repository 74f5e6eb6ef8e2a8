//! Client configuration.
//!
//! Read from a TOML file, `cssorbot.toml` by default:
//!
//! ```toml
//! http_api_host = "https://api.cssorbot.com/"
//! ws_api_host = "wss://api.cssorbot.com/ws"
//!
//! [oauth]
//! client_id = "123456789012345678"
//! redirect_url = "https://cssorbot.com/login"
//! scopes = ["identify", "guilds"]
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Default OAuth authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";

/// Prevent out-of-memory condition: the configuration file should be small.
const MAX_FILE_SIZE: u64 = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Base URL of the HTTP API
    pub http_api_host: Url,

    /// URL of the event stream
    pub ws_api_host: Url,

    pub oauth: OAuthConfig,

    /// Directory for the stored credential
    ///
    /// Defaults to the working directory.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// `User-Agent` sent on every request
    #[serde(skip, default = "user_agent")]
    pub user_agent: String,
}

/// OAuth application used for the login redirect.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_authorize_url")]
    pub authorize_url: Url,

    pub client_id: String,

    /// Where the provider sends the user back with an authorization code
    pub redirect_url: Url,

    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Config {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is too large, or is not a
    /// valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file_size = fs::metadata(path)?.len();
        if file_size > MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// Directory for the stored credential.
    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        self.storage_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;

        for (name, url) in [
            ("http_api_host", &config.http_api_host),
            ("ws_api_host", &config.ws_api_host),
        ] {
            if url.cannot_be_a_base() {
                return Err(Error::invalid_argument(format!(
                    "{name} must be an absolute URL: {url}"
                )));
            }
        }

        if !matches!(config.ws_api_host.scheme(), "ws" | "wss") {
            return Err(Error::invalid_argument(format!(
                "ws_api_host must use ws or wss: {}",
                config.ws_api_host
            )));
        }

        if config.oauth.client_id.is_empty() {
            return Err(Error::invalid_argument("oauth client_id is empty"));
        }

        Ok(config)
    }
}

fn default_authorize_url() -> Url {
    Url::parse(DEFAULT_AUTHORIZE_URL).expect("default authorize url is invalid")
}

/// Builds the `User-Agent` string: `app/version (Rust; os/version)`.
#[must_use]
pub fn user_agent() -> String {
    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");

    let os_name = match std::env::consts::OS {
        "macos" => "osx",
        other => other,
    };

    // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
    let illegal_chars = |chr| chr == '/' || chr == ';';
    let os_version = sysinfo::System::os_version()
        .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
        .unwrap_or_else(|| String::from("0"));

    let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
    trace!("user agent: {user_agent}");
    user_agent
}
