// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote read-only user endpoint.
//!
//! `GET <endpoint>` returns a JSON array of users, `GET <endpoint>/{id}` a
//! single user. Nothing is ever written back.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::errors::FetchError;
use crate::record::User;

pub const DEFAULT_USERS_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/users";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type FetchFuture<T> = BoxFuture<'static, Result<T, FetchError>>;

/// Source of user records.
///
/// Futures are `'static` so a single in-flight fetch can be shared between
/// callers that do not outlive each other.
pub trait RecordSource: Send + Sync {
    fn fetch_all(&self) -> FetchFuture<Vec<User>>;

    fn fetch_one(&self, id: u64) -> FetchFuture<User>;

    /// Endpoint description for logging and error reporting.
    fn endpoint(&self) -> &str;
}

/// [`RecordSource`] backed by an HTTP JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRecordSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl Default for HttpRecordSource {
    fn default() -> Self {
        Self::new(DEFAULT_USERS_ENDPOINT, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl RecordSource for HttpRecordSource {
    fn fetch_all(&self) -> FetchFuture<Vec<User>> {
        let client = self.client.clone();
        let url = self.base_url.clone();
        let timeout = self.timeout;
        async move { get_json(&client, &url, timeout).await }.boxed()
    }

    fn fetch_one(&self, id: u64) -> FetchFuture<User> {
        let client = self.client.clone();
        let url = format!("{}/{}", self.base_url, id);
        let timeout = self.timeout;
        async move { get_json(&client, &url, timeout).await }.boxed()
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

async fn get_json<T>(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<T, FetchError>
where
    T: serde::de::DeserializeOwned,
{
    debug!(%url, "GET");
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .timeout(timeout)
        .send()
        .await
        .map_err(|error| FetchError::Transport(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|error| FetchError::Decode(error.to_string()))
}

/// In-memory [`RecordSource`] for fixtures and offline sessions.
///
/// The response can be swapped at runtime, which makes failure and retry
/// paths reproducible.
pub struct StaticRecordSource {
    response: Mutex<Result<Vec<User>, FetchError>>,
    calls: AtomicUsize,
    label: String,
}

impl StaticRecordSource {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            response: Mutex::new(Ok(users)),
            calls: AtomicUsize::new(0),
            label: "static".to_string(),
        }
    }

    pub fn failing(error: FetchError) -> Self {
        let source = Self::new(Vec::new());
        source.set_error(error);
        source
    }

    /// Load a JSON array of users, e.g. a saved copy of the endpoint.
    pub fn from_json_file(path: &Path) -> Result<Self, FetchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|error| FetchError::Transport(format!("{}: {error}", path.display())))?;
        let users: Vec<User> = serde_json::from_str(&content)
            .map_err(|error| FetchError::Decode(format!("{}: {error}", path.display())))?;
        let mut source = Self::new(users);
        source.label = path.display().to_string();
        Ok(source)
    }

    pub fn set_users(&self, users: Vec<User>) {
        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = Ok(users);
    }

    pub fn set_error(&self, error: FetchError) {
        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = Err(error);
    }

    /// Number of `fetch_all` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Result<Vec<User>, FetchError> {
        self.response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordSource for StaticRecordSource {
    fn fetch_all(&self) -> FetchFuture<Vec<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.snapshot();
        async move {
            tokio::task::yield_now().await;
            response
        }
        .boxed()
    }

    fn fetch_one(&self, id: u64) -> FetchFuture<User> {
        let url = format!("{}/{}", self.label, id);
        let response = self.snapshot().and_then(|users| {
            users
                .into_iter()
                .find(|user| user.id == id)
                .ok_or(FetchError::Status { status: 404, url })
        });
        async move { response }.boxed()
    }

    fn endpoint(&self) -> &str {
        &self.label
    }
}
