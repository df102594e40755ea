mod approle;
mod cache;
mod kubernetes;
mod ldap;
mod recovery;
mod token;
mod token_info;

pub use approle::ApproleAuth;
pub use cache::{
    ApproleCredentials, AuthCache, CredentialStore, Credentials, KubernetesCredentials,
    LdapCredentials,
};
pub use kubernetes::{DEFAULT_JWT_PATH, KubernetesAuth};
pub use ldap::LdapAuth;
pub use recovery::{AuthConfig, TokenCachePolicy};
pub use token_info::{TokenInfo, TokenLookup};

use crate::VaultError;
use crate::client::VaultClient;
use crate::connection::Connection;
use async_trait::async_trait;
use std::fmt;

/// Which login flow produced the active session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// No authentication performed yet
    #[default]
    None,
    Approle,
    Kubernetes,
    Ldap,
    /// Pre-supplied token, cannot re-authenticate by itself
    Token,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMethod::None => "none",
            AuthMethod::Approle => "approle",
            AuthMethod::Kubernetes => "kubernetes",
            AuthMethod::Ldap => "ldap",
            AuthMethod::Token => "token",
        };
        f.write_str(name)
    }
}

/// A credential exchange against a Vault login endpoint
#[async_trait]
pub trait LoginMethod: Send + Sync {
    /// Full login path, e.g. `auth/approle/login`
    fn login_path(&self) -> String;

    /// JSON body sent to the login endpoint
    fn payload(&self) -> serde_json::Value;

    /// Perform exactly one login call
    async fn authenticate(&self, connection: &Connection) -> Result<TokenInfo, VaultError> {
        let secret = connection
            .login(&self.login_path(), &self.payload())
            .await
            .map_err(VaultError::login_failed)?;

        let auth = secret
            .and_then(|s| s.auth)
            .ok_or_else(|| VaultError::login_failed(VaultError::NoAuthInfo))?;

        Ok(TokenInfo::from_auth(auth))
    }
}

/// Use `path` as the auth mount unless it is empty
pub(crate) fn resolve_auth_path(path: &str, default: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        default.to_string()
    } else {
        path.to_string()
    }
}

impl VaultClient {
    /// Shared tail of every network login flow.
    ///
    /// The method and its parameters are recorded and the attempt is stamped
    /// before the call; the token is installed only after the backend returned
    /// an auth payload.
    pub(crate) async fn run_login(
        &self,
        cache: &mut AuthCache,
        credentials: Credentials,
        login: &dyn LoginMethod,
    ) -> Result<TokenInfo, VaultError> {
        let method = credentials.method();
        cache.begin_login(credentials);

        let path = login.login_path();
        tracing::debug!(method = %method, path = %path, "Logging in to Vault");

        let token_info = match login.authenticate(&self.connection).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(method = %method, path = %path, error = %e, "Vault login failed");
                return Err(e);
            }
        };

        cache.record_success(method);
        self.connection.set_token(token_info.token.clone()).await;
        tracing::info!(method = %method, lease = ?token_info.lease_duration, "Authenticated to Vault");

        Ok(token_info)
    }
}
