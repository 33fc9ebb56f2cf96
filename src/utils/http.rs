//! Request shaping and response classification shared by the auth and
//! event clients.

use crate::error::{remote_error, CalResult, Error};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Message used when the backend gives no usable error body
const FALLBACK_MESSAGE: &str = "An error occurred";

/// Error body convention of the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Thin wrapper around a `reqwest::Client` bound to the API base URL
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the given base URL. The URL must end with a
    /// slash so relative paths are appended to it.
    pub fn new(base_url: Url, timeout: Duration) -> CalResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path relative to the base URL
    pub fn url(&self, path: &str) -> CalResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.http.post(url)
    }

    pub fn put(&self, url: Url) -> RequestBuilder {
        self.http.put(url)
    }

    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.http.delete(url)
    }
}

/// Attach the session token as a bearer credential
pub fn with_bearer(request: RequestBuilder, token: &str) -> RequestBuilder {
    request.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Send a request, mapping transport failures to `Error::Network`
pub async fn send(request: RequestBuilder) -> CalResult<Response> {
    request
        .send()
        .await
        .map_err(|e| Error::Network(format!("Request could not complete: {}", e)))
}

/// Decode a successful JSON response or classify the failure
pub async fn read_json<T: DeserializeOwned>(response: Response) -> CalResult<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
}

/// Accept any 2xx response and discard its body
pub async fn read_empty(response: Response) -> CalResult<()> {
    check_status(response).await.map(|_| ())
}

/// Pass 2xx responses through. 401/403 become `Error::Auth`, every other
/// status becomes `Error::Remote` with the backend's message.
async fn check_status(response: Response) -> CalResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    if is_auth_failure(status) {
        return Err(Error::Auth(message));
    }

    Err(remote_error(status.as_u16(), &message))
}

/// Statuses that end the current session
pub fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Pull the human readable message out of an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
