use super::{AuthCache, AuthMethod, CredentialStore, TokenLookup};
use crate::VaultError;
use crate::client::VaultClient;
use std::time::Duration;

const DEFAULT_MIN_TOKEN_TTL: Duration = Duration::from_secs(5);
const DEFAULT_REAUTH_COOLDOWN: Duration = Duration::from_secs(5);

/// What to do when a fresh approle token cannot be written to its cache file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenCachePolicy {
    /// Report `TokenCacheWriteFailed` even though the token is installed
    #[default]
    Strict,
    /// Log a warning and report success
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Tokens with less remaining TTL are considered expired
    pub min_token_ttl: Duration,
    /// Minimum time between two recovery attempts
    pub reauth_cooldown: Duration,
    pub token_cache_policy: TokenCachePolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_token_ttl: DEFAULT_MIN_TOKEN_TTL,
            reauth_cooldown: DEFAULT_REAUTH_COOLDOWN,
            token_cache_policy: TokenCachePolicy::default(),
        }
    }
}

impl CredentialStore {
    /// Whether enough parameters are stored to replay `method`
    pub fn is_configured(&self, method: AuthMethod) -> bool {
        match method {
            AuthMethod::Approle => self.approle.is_file_backed() || !self.approle.role_id.is_empty(),
            AuthMethod::Kubernetes => {
                self.kubernetes.jwt_file.is_some() || !self.kubernetes.jwt.is_empty()
            }
            AuthMethod::Ldap => !self.ldap.username.is_empty(),
            AuthMethod::Token => true,
            AuthMethod::None => false,
        }
    }
}

impl VaultClient {
    /// Decide whether a failed operation may be retried.
    ///
    /// `Ok(())` means a new token was installed (or, for a static token, that
    /// a retry is worth trying). Any error means the caller must surface the
    /// original failure instead.
    pub async fn check_auth_needed(&self) -> Result<(), VaultError> {
        let mut cache = self.auth.lock().await;

        let elapsed = cache.since_last_attempt();
        cache.record_attempt();
        if elapsed < self.config.reauth_cooldown {
            return Err(VaultError::CooldownActive {
                elapsed,
                window: self.config.reauth_cooldown,
            });
        }

        if !self.token_needs_refresh(self.config.min_token_ttl).await {
            return Err(VaultError::NotAuthRelated);
        }

        let method = cache.method();
        tracing::info!(method = %method, "Vault token expired, re-authenticating");
        self.replay_locked(&mut cache, method).await
    }

    /// Log in again with the stored parameters of `method`, without cooldown
    pub async fn reauthenticate(&self, method: AuthMethod) -> Result<(), VaultError> {
        let mut cache = self.auth.lock().await;
        self.replay_locked(&mut cache, method).await
    }

    async fn replay_locked(
        &self,
        cache: &mut AuthCache,
        method: AuthMethod,
    ) -> Result<(), VaultError> {
        if !cache.credentials().is_configured(method) {
            return Err(VaultError::UnknownAuthMethod);
        }

        match method {
            AuthMethod::Approle => {
                let credentials = cache.credentials().approle.clone();
                if credentials.is_file_backed() {
                    self.init_approle_locked(cache, credentials).await?;
                } else {
                    self.approle_login_locked(cache, credentials).await?;
                }
            }
            AuthMethod::Kubernetes => {
                let credentials = cache.credentials().kubernetes.clone();
                self.kubernetes_login_locked(cache, credentials).await?;
            }
            AuthMethod::Ldap => {
                let credentials = cache.credentials().ldap.clone();
                self.ldap_login_locked(cache, credentials).await?;
            }
            AuthMethod::Token => {
                // A bare token cannot renew itself; let the next call find out.
                cache.record_attempt();
                tracing::debug!("Static Vault token in use, retrying without re-authentication");
            }
            AuthMethod::None => return Err(VaultError::UnknownAuthMethod),
        }

        Ok(())
    }

    /// Look up the active token
    pub async fn token_lookup(&self) -> Result<TokenLookup, VaultError> {
        let secret = self.connection.lookup_self().await?;
        TokenLookup::from_secret(&secret)
    }

    /// Remaining TTL of the active token in seconds
    pub async fn token_ttl(&self) -> Result<i64, VaultError> {
        Ok(self.token_lookup().await?.ttl)
    }

    /// An unreadable token is treated as expired
    pub async fn token_needs_refresh(&self, min_ttl: Duration) -> bool {
        match self.token_lookup().await {
            Ok(lookup) => lookup.needs_refresh(min_ttl),
            Err(e) => {
                tracing::debug!(error = %e, "Token lookup failed, assuming refresh needed");
                true
            }
        }
    }

    pub(crate) async fn token_needs_refresh_for(&self, token: &str) -> bool {
        let lookup = match self.connection.lookup_token(token).await {
            Ok(secret) => TokenLookup::from_secret(&secret),
            Err(e) => Err(e),
        };
        lookup.map_or(true, |l| l.needs_refresh(self.config.min_token_ttl))
    }
}
