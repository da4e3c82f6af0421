use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;

/// Network seam used by the resolver.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GETs `url` with the given extra headers and returns the body as text.
    async fn fetch(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String, FetchError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua.to_string());
        }
        let client = builder.build().map_err(|e| FetchError::Transport {
            url: String::new(),
            reason: format!("building http client: {e}"),
        })?;
        Ok(Self { client })
    }
}

fn header_map(url: &str, headers: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = || FetchError::InvalidHeader {
            url: url.to_string(),
            name: name.clone(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self
            .client
            .get(url)
            .headers(header_map(url, headers)?)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(transport)?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }
}

/// In-memory [`Fetcher`] serving canned bodies. Not for production, but good for tests and dry runs.
///
/// Unknown URLs fail with a transport error, as an unreachable host would.
#[derive(Default)]
pub struct MemoryFetcher {
    routes: Mutex<HashMap<String, Result<String, u16>>>,
    requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`, replacing any earlier route.
    pub fn serve(&self, url: &str, body: &str) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.to_string()));
        self
    }

    /// Answers `url` with a non-success status.
    pub fn fail(&self, url: &str, status: u16) -> &Self {
        self.routes.lock().unwrap().insert(url.to_string(), Err(status));
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Headers sent with the most recent request to `url`.
    pub fn headers_for(&self, url: &str) -> Option<BTreeMap<String, String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        match self.routes.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Transport {
                url: url.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String, FetchError> {
        (**self).fetch(url, headers).await
    }
}
