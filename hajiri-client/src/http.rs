//! HTTP access to the Sajilo Hajiri backend
//!
//! [`ApiClient`] wraps a `reqwest::Client` and adds what every call needs:
//! path normalization, the bearer token from the injected
//! [`TokenProvider`], uniform error mapping, and coalescing of concurrent
//! identical GETs. Writes are never coalesced.

use hajiri_common::api::auth::TokenProvider;
use hajiri_common::config::ClientSettings;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::inflight::InFlight;

const USER_AGENT: &str = concat!("SajiloHajiri/", env!("CARGO_PKG_VERSION"));

/// Query parameters, kept sorted so that insertion order never matters
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query(BTreeMap<String, String>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    /// Add a parameter only when a value is present
    pub fn with_opt<T: ToString>(self, key: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Identity of a read request for coalescing purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub path: String,
    pub query: Query,
}

impl RequestKey {
    /// Normalize `path` and fold any inline `?a=b` parameters into `query`
    pub fn new(path: &str, query: &Query) -> Self {
        let mut query = query.clone();
        let normalized = normalize_path(path);

        let path = match normalized.split_once('?') {
            Some((bare, inline)) => {
                for pair in inline.split('&').filter(|p| !p.is_empty()) {
                    let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                    // Explicit parameters win over inline ones
                    if !query.0.contains_key(k) {
                        query.insert(k, v);
                    }
                }
                bare.to_string()
            }
            None => normalized,
        };

        Self { path, query }
    }
}

/// Normalize a backend path
///
/// - empty → `/api/`
/// - absolute `http://` / `https://` URLs are left alone
/// - anything else gets exactly one leading `/`
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/api/".to_string();
    }
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
        return path.to_string();
    }
    format!("/{}", path.trim_start_matches('/'))
}

/// Extract a human-readable message from an error response body
///
/// Prefers `detail`, then `error`, then the JSON itself, then the raw text.
pub fn extract_error_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("Request failed with status {}", status);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["detail", "error", "message"]
            .iter()
            .find_map(|field| match map.get(*field) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Ok(other) => other.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Backend API client
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    reads: InFlight<RequestKey, Value, ClientError>,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings, tokens: Arc<dyn TokenProvider>) -> ClientResult<Self> {
        Self::with_timeout(&settings.base_url, settings.request_timeout, tokens)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            reads: InFlight::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of coalesced GETs currently awaiting a response
    pub fn pending_reads(&self) -> usize {
        self.reads.pending()
    }

    fn url_for(&self, path: &str) -> String {
        let path = normalize_path(path);
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url_for(path);
        tracing::debug!(method = %method, url = %url, "Backend request");

        let builder = self.http.request(method, url);
        match self.tokens.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET returning raw JSON, coalesced with identical pending GETs
    pub async fn get_value(&self, path: &str, query: &Query) -> ClientResult<Value> {
        let key = RequestKey::new(path, query);
        let builder = self.request(Method::GET, &key.path);
        let params: Vec<(String, String)> = key
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.reads
            .run(key, move || async move {
                let response = builder
                    .query(&params)
                    .send()
                    .await
                    .map_err(network_error)?;
                read_json(response).await
            })
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ClientResult<T> {
        let value = self.get_value(path, query).await?;
        decode(value)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<Value> {
        let response = self
            .request(Method::DELETE, path)
            .send()
            .await
            .map_err(network_error)?;
        read_json(response).await
    }

    /// Send a multipart form (registration with photo)
    pub async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> ClientResult<T> {
        let response = self
            .request(method, path)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;
        decode(read_json(response).await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(method, path)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        decode(read_json(response).await?)
    }
}

fn network_error(err: reqwest::Error) -> ClientError {
    tracing::warn!(error = %err, "Backend unreachable");
    ClientError::Network(err.to_string())
}

/// Map the status and read the body; empty bodies become `null`
async fn read_json(response: Response) -> ClientResult<Value> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(extract_error_message(
            status.as_u16(),
            &body,
        )));
    }

    if !status.is_success() {
        let message = extract_error_message(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), message = %message, "Backend request failed");
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))
}
