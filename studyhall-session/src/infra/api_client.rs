use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use studyhall_model::{ApiReply, AuthErrorCode};
use tokio::sync::RwLock;

use crate::domains::session::errors::{GatewayError, GatewayResult};
use crate::domains::session::security::AccessToken;

/// API client with bearer-token support
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token_store: Arc<RwLock<Option<AccessToken>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field(
                "has_token",
                &self
                    .token_store
                    .try_read()
                    .map(|t| t.is_some())
                    .unwrap_or(false),
            )
            .finish()
    }
}

/// Add a scheme when missing and trim the trailing slash.
pub(crate) fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let normalized = if trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
    {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    if normalized != raw {
        warn!(
            "[ApiClient] Normalized base URL from '{}' to '{}'",
            raw, normalized
        );
    }
    normalized
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "[ApiClient] Creating new API client with base URL: {}",
            base_url
        );

        Ok(Self {
            client,
            base_url,
            token_store: Arc::new(RwLock::new(None)),
        })
    }

    pub fn build_url(&self, path: impl AsRef<str>) -> String {
        let path = path.as_ref();
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<AccessToken>) {
        *self.token_store.write().await = token;
    }

    pub async fn get_token(&self) -> Option<AccessToken> {
        self.token_store.read().await.clone()
    }

    /// Build a request with authentication headers
    pub async fn build_request(
        &self,
        builder: RequestBuilder,
    ) -> RequestBuilder {
        match self.token_store.read().await.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and unwrap the `{success, code, message}` envelope.
    ///
    /// Returns the whole reply object so callers can decode the operation
    /// specific fields from it.
    async fn execute(&self, request: RequestBuilder) -> GatewayResult<Value> {
        let response = request.send().await.map_err(|e| {
            GatewayError::transport(format!("Request failed: {}", e))
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            GatewayError::transport(format!("Failed to read response: {}", e))
        })?;

        let value = match serde_json::from_slice::<Value>(&body) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Err(Self::error_without_body(status)),
        };

        let reply: ApiReply =
            serde_json::from_value(value.clone()).map_err(|e| {
                GatewayError::invalid_response(format!(
                    "Malformed reply envelope: {}",
                    e
                ))
            })?;
        // Some endpoints omit `success` on plain 2xx replies.
        let success = value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(status.is_success());

        if status.is_success() && success {
            return Ok(value);
        }

        let code = match reply.code {
            Some(code) => Some(code),
            None if status == StatusCode::UNAUTHORIZED => {
                Some(AuthErrorCode::InvalidCredentials)
            }
            None => None,
        };
        let message = reply.message.unwrap_or_else(|| {
            format!("Request failed with status {}", status)
        });
        debug!(
            "[ApiClient] Request rejected with status {} (code: {:?})",
            status, code
        );
        Err(GatewayError::rejected(code, message))
    }

    fn error_without_body(status: StatusCode) -> GatewayError {
        if status == StatusCode::UNAUTHORIZED {
            GatewayError::rejected(
                Some(AuthErrorCode::InvalidCredentials),
                "Unauthorized",
            )
        } else if status.is_server_error() {
            GatewayError::transport(format!("Server error: {}", status))
        } else if status.is_success() {
            GatewayError::invalid_response(format!(
                "Expected a JSON object in {} response",
                status
            ))
        } else {
            GatewayError::rejected(
                None,
                format!("Request failed with status {}", status),
            )
        }
    }

    fn decode<R: DeserializeOwned>(value: Value) -> GatewayResult<R> {
        serde_json::from_value(value).map_err(|e| {
            GatewayError::invalid_response(format!(
                "Failed to decode reply: {}",
                e
            ))
        })
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> GatewayResult<R> {
        let url = self.build_url(path);
        let request = self.build_request(self.client.get(&url)).await;
        Self::decode(self.execute(request).await?)
    }

    pub async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> GatewayResult<R> {
        let url = self.build_url(path);
        let request =
            self.build_request(self.client.post(&url).json(body)).await;
        Self::decode(self.execute(request).await?)
    }

    /// POST with no body whose reply carries only the status envelope.
    pub async fn post_empty(&self, path: &str) -> GatewayResult<()> {
        let url = self.build_url(path);
        let request = self.build_request(self.client.post(&url)).await;
        self.execute(request).await.map(|_| ())
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> GatewayResult<()> {
        let url = self.build_url(path);
        let request =
            self.build_request(self.client.put(&url).json(body)).await;
        self.execute(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(
            normalize_base_url("localhost:3000/api/"),
            "http://localhost:3000/api"
        );
        assert_eq!(
            normalize_base_url("https://api.example.test"),
            "https://api.example.test"
        );
    }

    #[test]
    fn build_url_joins_relative_paths() {
        let client =
            ApiClient::new("https://api.example.test/v1/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.build_url("/auth/me"),
            "https://api.example.test/v1/auth/me"
        );
        assert_eq!(
            client.build_url("http://other.test/x"),
            "http://other.test/x"
        );
    }

    #[test]
    fn bodiless_errors_are_classified_by_status() {
        let unauthorized =
            ApiClient::error_without_body(StatusCode::UNAUTHORIZED);
        assert_eq!(
            unauthorized.code(),
            Some(&AuthErrorCode::InvalidCredentials)
        );
        let server = ApiClient::error_without_body(StatusCode::BAD_GATEWAY);
        assert_eq!(
            server.kind,
            crate::domains::session::errors::GatewayErrorKind::Transport
        );
    }
}
