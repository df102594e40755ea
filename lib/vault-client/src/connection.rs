//! Thin HTTP connection to the Vault API.
//!
//! Holds the active session token. Every call is a single request/response;
//! recovery from expired tokens happens one layer up in [`crate::VaultClient`].

use crate::error::VaultError;
use crate::models::Secret;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const LOOKUP_SELF_PATH: &str = "auth/token/lookup-self";
const REVOKE_SELF_PATH: &str = "auth/token/revoke-self";

pub struct Connection {
    http: reqwest::Client,
    base_url: String,
    namespace: Option<String>,
    token: RwLock<String>,
}

impl Connection {
    pub fn new(
        base_url: impl Into<String>,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VaultError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::RequestError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace,
            token: RwLock::new(String::new()),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        *self.token.get_mut() = token.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Currently installed session token (empty before any login)
    pub async fn token(&self) -> String {
        self.token.read().await.clone()
    }

    /// Install a new session token for all subsequent calls
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = token.into();
    }

    /// POST credentials to a login endpoint. Sent without a session token.
    pub async fn login(&self, path: &str, payload: &Value) -> Result<Option<Secret>, VaultError> {
        let request = self.http.post(self.url(path)).json(payload);
        self.send(request, None, false).await
    }

    /// Look up the active session token
    pub async fn lookup_self(&self) -> Result<Secret, VaultError> {
        let token = self.token().await;
        self.lookup_token(&token).await
    }

    /// Look up an arbitrary token without installing it
    pub async fn lookup_token(&self, token: &str) -> Result<Secret, VaultError> {
        let request = self.http.get(self.url(LOOKUP_SELF_PATH));
        self.send(request, Some(token), false)
            .await?
            .ok_or_else(|| VaultError::InvalidResponse("empty token lookup response".to_string()))
    }

    pub async fn revoke_self(&self) -> Result<(), VaultError> {
        self.call(Method::POST, REVOKE_SELF_PATH, None, false).await?;
        Ok(())
    }

    /// Raw read. A 404 yields `Ok(None)`.
    pub async fn read(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        self.call(Method::GET, path, None, true).await
    }

    pub async fn write(&self, path: &str, data: &Value) -> Result<Option<Secret>, VaultError> {
        self.call(Method::POST, path, Some(data), false).await
    }

    pub async fn delete(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        self.call(Method::DELETE, path, None, false).await
    }

    /// Raw list (`?list=true`). A 404 yields `Ok(None)`.
    pub async fn list(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        let token = self.token().await;
        let request = self.http.get(self.url(path)).query(&[("list", "true")]);
        self.send(request, Some(&token), true).await
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        allow_missing: bool,
    ) -> Result<Option<Secret>, VaultError> {
        let token = self.token().await;
        let mut request = self.http.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request, Some(&token), allow_missing).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        mut request: RequestBuilder,
        token: Option<&str>,
        allow_missing: bool,
    ) -> Result<Option<Secret>, VaultError> {
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(ref namespace) = self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::RequestError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND && allow_missing {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VaultError::ClientError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| VaultError::RequestError(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))
    }
}

/// Flatten Vault's `{"errors": [...]}` body, falling back to the raw text
fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        errors: Vec<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join(", "),
        _ => body.trim().to_string(),
    }
}
