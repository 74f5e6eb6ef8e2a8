//! HTTP transport with rate limiting for the cssorbot API.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting to go easy on the backend
//! * Consistent timeouts and headers
//!
//! Requests are executed through the [`Transport`] trait, so that the layers
//! above (session refresh and the API client) do not depend on a live
//! network.
//!
//! # Rate Limiting
//!
//! * 50 calls per 5-second interval
//! * Allows bursts up to the maximum calls per interval
//! * Requests that would exceed the limit are delayed
//!
//! # Example
//!
//! ```rust
//! use cssorbot::http::{self, Client, Transport};
//! use reqwest::Method;
//!
//! let client = Client::new(&config)?;
//! let request = http::request(Method::GET, url, None)?;
//! let response = client.execute(request).await?;
//! ```

use std::{num::NonZeroU32, time::Duration};

use futures_util::{future::BoxFuture, FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    header::{HeaderValue, ACCEPT, CONTENT_TYPE},
    Method, Url,
};
use serde::Deserialize;

use crate::{
    config::Config,
    error::{Error, Result},
    protocol,
};

/// Executes HTTP requests.
pub trait Transport: Send + Sync {
    /// Sends `request` and resolves to the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns error if the request could not be sent or no response was
    /// received.
    fn execute(&self, request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>>;
}

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Direct access to the underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Rolling window in which at most [`Self::RATE_LIMIT_CALLS_PER_INTERVAL`]
    /// calls are made.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(5);

    /// Maximum calls per interval. Requests beyond this limit are delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 50;

    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for establishing a connection.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }
}

impl Transport for Client {
    /// Executes a request after waiting for the rate limiter.
    fn execute(&self, request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>> {
        // No need to await with jitter because the level of concurrency is low.
        let throttle = self.rate_limiter.until_ready();
        throttle
            .then(|()| self.unlimited.execute(request).map_err(Into::into))
            .boxed()
    }
}

/// Builds a request with specified method, URL and optional JSON body.
///
/// # Errors
///
/// Returns error if `body` cannot be serialized.
pub fn request(
    method: Method,
    url: Url,
    body: Option<&serde_json::Value>,
) -> Result<reqwest::Request> {
    let mut request = reqwest::Request::new(method, url);

    if let Some(body) = body {
        let json = serde_json::to_vec(body)?;
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(json.into());
    }

    Ok(request)
}

/// Resolves `path` against the API base URL.
///
/// Unlike [`Url::join`], the last segment of `base` is kept whether or not it
/// ends with a slash, so `https://host/api` and `https://host/api/` both
/// resolve `playlists` to `https://host/api/playlists`. Absolute URLs are
/// returned as is.
///
/// # Errors
///
/// Returns error if the result is not a valid URL.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(Url::parse(path)?);
    }

    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Reads a response and parses its JSON body.
///
/// # Errors
///
/// Returns error if the status is not successful, the body cannot be read, or
/// the body does not parse into `T`.
pub async fn decode<T>(response: reqwest::Response, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + std::fmt::Debug,
{
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        debug!("{origin}: {status}");
        return Err(Error::from_status(status, &body));
    }

    protocol::json(&body, origin)
}
