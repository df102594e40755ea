use crate::auth::{AuthCache, AuthConfig, AuthMethod, Credentials, TokenCachePolicy};
use crate::connection::Connection;
use crate::error::VaultError;
use crate::models::Secret;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra attempts allowed after a successful re-authentication
const MAX_REAUTH_RETRIES: usize = 1;

pub struct VaultClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    namespace: Option<String>,
    auth_config: AuthConfig,
    request_timeout: Duration,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            namespace: None,
            auth_config: AuthConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn min_token_ttl(mut self, ttl: Duration) -> Self {
        self.auth_config.min_token_ttl = ttl;
        self
    }

    pub fn reauth_cooldown(mut self, cooldown: Duration) -> Self {
        self.auth_config.reauth_cooldown = cooldown;
        self
    }

    pub fn token_cache_policy(mut self, policy: TokenCachePolicy) -> Self {
        self.auth_config.token_cache_policy = policy;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn resolve_config(&self) -> Result<ResolvedConfig, VaultError> {
        let base_url = self
            .base_url
            .clone()
            .or_else(|| std::env::var("VAULT_ADDR").ok())
            .ok_or(VaultError::VaultNotDetected)?;

        let token = self
            .token
            .clone()
            .or_else(|| std::env::var("VAULT_TOKEN").ok())
            .filter(|t| !t.is_empty());

        let namespace = self
            .namespace
            .clone()
            .or_else(|| std::env::var("VAULT_NAMESPACE").ok())
            .filter(|ns| !ns.is_empty());

        Ok(ResolvedConfig {
            base_url,
            token,
            namespace,
        })
    }

    pub fn build(self) -> Result<VaultClient, VaultError> {
        let config = self.resolve_config()?;

        let mut connection =
            Connection::new(config.base_url, config.namespace, self.request_timeout)?;
        let mut cache = AuthCache::new();

        if let Some(token) = config.token {
            cache.begin_login(Credentials::Token);
            cache.record_success(AuthMethod::Token);
            connection = connection.with_token(token);
        }

        Ok(VaultClient {
            connection,
            auth: Mutex::new(cache),
            config: self.auth_config,
        })
    }
}

struct ResolvedConfig {
    base_url: String,
    token: Option<String>,
    namespace: Option<String>,
}

/// Vault client that re-authenticates once when an operation fails because
/// the session token expired
pub struct VaultClient {
    pub(crate) connection: Connection,
    pub(crate) auth: Mutex<AuthCache>,
    pub(crate) config: AuthConfig,
}

impl VaultClient {
    pub fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::new().build()
    }

    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        self.connection.base_url()
    }

    pub fn auth_config(&self) -> &AuthConfig {
        &self.config
    }

    pub async fn current_token(&self) -> String {
        self.connection.token().await
    }

    pub async fn auth_method(&self) -> AuthMethod {
        self.auth.lock().await.method()
    }

    /// Unix seconds of the last login attempt or recovery check
    pub async fn last_auth_attempt(&self) -> i64 {
        self.auth.lock().await.last_attempt()
    }

    /// Run `operation`, and if it fails and re-authentication succeeds, run
    /// it exactly once more. The second result is returned as is.
    ///
    /// When re-authentication is refused the operation's own error is
    /// returned; the reason is only logged.
    pub async fn perform_with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T, VaultError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VaultError>>,
    {
        let mut retries = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if retries >= MAX_REAUTH_RETRIES {
                return Err(err);
            }
            retries += 1;

            if let Err(reason) = self.check_auth_needed().await {
                if reason.is_recovery_failure() {
                    tracing::warn!(error = %err, reason = %reason, "Vault re-authentication failed");
                } else {
                    tracing::debug!(error = %err, reason = %reason, "Not retrying Vault operation");
                }
                return Err(err);
            }
            tracing::debug!(error = %err, "Retrying Vault operation after re-authentication");
        }
    }

    /// Raw read. Missing paths are `SecretNotFound`.
    pub async fn read(&self, path: &str) -> Result<Secret, VaultError> {
        self.perform_with_retry(move || self.connection.read(path))
            .await?
            .ok_or_else(|| VaultError::SecretNotFound {
                path: path.to_string(),
            })
    }

    /// Raw write. Some endpoints answer with no body.
    pub async fn write(&self, path: &str, data: &Value) -> Result<Option<Secret>, VaultError> {
        self.perform_with_retry(move || self.connection.write(path, data))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<(), VaultError> {
        self.perform_with_retry(move || self.connection.delete(path))
            .await?;
        Ok(())
    }

    /// Keys under a metadata path
    pub async fn list(&self, path: &str) -> Result<Vec<String>, VaultError> {
        let secret = self
            .perform_with_retry(move || self.connection.list(path))
            .await?
            .ok_or_else(|| VaultError::SecretNotFound {
                path: path.to_string(),
            })?;

        let keys = secret
            .data
            .as_ref()
            .and_then(|data| data.get("keys"))
            .and_then(Value::as_array)
            .ok_or_else(|| VaultError::SecretNotFound {
                path: path.to_string(),
            })?;

        Ok(keys
            .iter()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect())
    }
}
