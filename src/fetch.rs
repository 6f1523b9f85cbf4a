//! Fetching site assets: template fragments, translation documents and the
//! menu document.
//!
//! Paths are site-relative (`assets/lang/en.json`). Every backend reports the
//! same [`FetchError`] so callers can log and degrade without caring where the
//! document came from.

use parking_lot::Mutex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {path} failed: {message}")]
    Network { path: String, message: String },

    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of site documents.
#[allow(async_fn_in_trait)]
pub trait Fetcher: Send + Sync {
    /// Fetch a document as text. Non-success responses are errors.
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError>;
}

/// Fetch and decode a JSON document.
pub async fn fetch_json<F, T>(fetcher: &F, path: &str) -> Result<T, FetchError>
where
    F: Fetcher + ?Sized,
    T: DeserializeOwned,
{
    let body = fetcher.fetch_text(path).await?;
    serde_json::from_str(&body).map_err(|source| FetchError::Decode {
        path: path.to_string(),
        source,
    })
}

// ==================== HTTP ====================

/// Fetches documents from the deployed site over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpFetcher {
    /// `base` is the site root; a missing trailing slash is added so relative
    /// paths resolve beneath it (the role the `<base>` tag plays in the page).
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let url = self.base.join(path).map_err(|e| FetchError::Network {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Network {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

// ==================== Local directory ====================

/// Serves documents from a checked-out copy of the site.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        // Never leave the site root
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl Fetcher for DirFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let Some(file) = self.resolve(path) else {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: 403,
            });
        };

        match tokio::fs::read_to_string(&file).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::Status {
                path: path.to_string(),
                status: 404,
            }),
            Err(e) => Err(FetchError::Network {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

// ==================== In memory ====================

/// Serves documents registered up front and records every request.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: Mutex<HashMap<String, Result<String, u16>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, body: impl Into<String>) -> Self {
        self.insert(path, body);
        self
    }

    pub fn with_status(self, path: &str, status: u16) -> Self {
        self.documents.lock().insert(path.to_string(), Err(status));
        self
    }

    pub fn insert(&self, path: &str, body: impl Into<String>) {
        self.documents
            .lock()
            .insert(path.to_string(), Ok(body.into()));
    }

    /// Paths requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|p| *p == path).count()
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        self.requests.lock().push(path.to_string());

        match self.documents.lock().get(path) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                path: path.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                path: path.to_string(),
                status: 404,
            }),
        }
    }
}
