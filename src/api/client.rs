//! Authorized fetch client.

use std::sync::Arc;

use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::model::{Connection, Job, JobSubmission, NewConnection, Profile, ProfileSubmission};
use crate::auth::TokenHolder;
use crate::error::ApiError;

/// HTTP client for the backend. Attaches the bearer token from the
/// [`TokenHolder`] to every call and classifies every failure as an
/// [`ApiError`]. It never touches session or resource state.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    holder: Arc<TokenHolder>,
}

impl ApiClient {
    /// `base_url` should end with a slash; see [`crate::config::parse_base_url`].
    pub fn new(base_url: Url, holder: Arc<TokenHolder>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            holder,
        }
    }

    /// Use a custom HTTP client (connection pool reuse, proxies, tests).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn holder(&self) -> &Arc<TokenHolder> {
        &self.holder
    }

    /// Issue a request against a path relative to the base URL.
    ///
    /// Returns the parsed JSON body on 2xx (`Value::Null` for an empty body).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let Some(session) = self.holder.current_session() else {
            debug!(%method, path, "Refusing request without a live session");
            return Err(ApiError::Unauthenticated);
        };

        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Network(format!("invalid request path {path:?}: {e}")))?;

        let mut builder = self
            .http
            .request(method.clone(), url)
            .bearer_auth(session.bearer_token())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "Backend responded");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                detail: extract_detail(&bytes, status.as_u16()),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Malformed(e.to_string()))
    }

    /// GET and decode into `T`. A shape mismatch is `Malformed`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request(Method::GET, path, None).await?;
        decode(value)
    }

    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Malformed(format!("request body: {e}")))?;
        self.request(method, path, Some(&body)).await
    }

    // ── Endpoints ───────────────────────────────────────────────────

    /// `GET /users/me/` — 404 means the profile was never created.
    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.get_as("users/me/").await
    }

    pub async fn list_connections(&self) -> Result<Vec<Connection>, ApiError> {
        self.get_as("connections/").await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>, ApiError> {
        self.get_as("jobs/").await
    }

    pub async fn create_connection(&self, body: &NewConnection) -> Result<Value, ApiError> {
        self.send_json(Method::POST, "connections/", body).await
    }

    pub async fn delete_connection(&self, id: Uuid) -> Result<(), ApiError> {
        self.request(Method::DELETE, &format!("connections/{id}/"), None)
            .await
            .map(|_| ())
    }

    pub async fn submit_job(&self, body: &JobSubmission) -> Result<Value, ApiError> {
        self.send_json(Method::POST, "jobs/", body).await
    }

    pub async fn submit_profile(&self, body: &ProfileSubmission) -> Result<Value, ApiError> {
        self.send_json(Method::POST, "users/", body).await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Pull the `detail` field out of an error body, or fall back to a generic
/// message.
fn extract_detail(body: &[u8], status: u16) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| match v.get("detail")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });
    detail.unwrap_or_else(|| format!("request failed with status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_extracted() {
        let body = br#"{"detail": "Connection not found."}"#;
        assert_eq!(extract_detail(body, 404), "Connection not found.");
    }

    #[test]
    fn detail_missing_falls_back() {
        let body = br#"{"error": "User not found."}"#;
        assert_eq!(extract_detail(body, 404), "request failed with status 404");
        assert_eq!(extract_detail(b"<html>oops</html>", 502), "request failed with status 502");
        assert_eq!(extract_detail(b"", 500), "request failed with status 500");
    }

    #[test]
    fn non_string_detail_rendered() {
        let body = br#"{"detail": ["bad bucket"]}"#;
        assert_eq!(extract_detail(body, 400), r#"["bad bucket"]"#);
    }

    #[test]
    fn decode_shape_mismatch_is_malformed() {
        let err = decode::<Vec<Connection>>(serde_json::json!({"not": "a list"})).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[tokio::test]
    async fn unauthenticated_never_reaches_network() {
        // Nothing listens on this address; a network attempt would be a
        // Network error, not Unauthenticated.
        let client = ApiClient::new(
            Url::parse("http://127.0.0.1:9/").unwrap(),
            TokenHolder::new(),
        );
        let err = client.list_jobs().await.unwrap_err();
        assert_eq!(err, ApiError::Unauthenticated);
    }
}
