//! Shared HTTP session for native fetches
//!
//! One [`Session`] is built per [`BatchFetcher`](crate::BatchFetcher) and shared
//! by every native fetch it runs. All requests go through the same cookie
//! store, so a consent or login cookie set by one response is presented on
//! every later request of the run.

use crate::config::HttpConfig;
use crate::error::Result;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::sync::{Arc, Mutex};
use url::Url;

/// Shared client, cookie store and the most recently observed cookie set
pub struct Session {
    client: reqwest::Client,
    jar: Arc<Jar>,
    last_cookies: Mutex<Option<HeaderValue>>,
    user_agent: String,
    max_redirects: usize,
}

impl Session {
    /// Build the client with the shared cookie store and a bounded redirect policy
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let max_redirects = config.max_redirects;

        // `previous` holds the original URL plus every hop already followed
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error(format!("stopped after {max_redirects} redirects"))
            } else {
                attempt.follow()
            }
        });

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(policy)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            jar,
            last_cookies: Mutex::new(None),
            user_agent: config.user_agent.clone(),
            max_redirects,
        })
    }

    /// HTTP client bound to the shared cookie store
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The shared cookie store
    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// User-Agent presented on every request
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Redirect hop limit
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Record the cookies the store would present for `url`
    pub(crate) fn observe_cookies(&self, url: &Url) {
        let cookies = self.jar.cookies(url);
        if let Ok(mut last) = self.last_cookies.lock() {
            *last = cookies;
        }
    }

    /// Cookie header most recently presented by any native fetch
    pub fn last_cookies(&self) -> Option<String> {
        self.last_cookies
            .lock()
            .ok()
            .and_then(|last| last.as_ref().and_then(|v| v.to_str().ok().map(str::to_string)))
    }
}
