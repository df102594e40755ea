use super::recovery::TokenCachePolicy;
use super::{
    ApproleCredentials, AuthCache, AuthMethod, Credentials, LoginMethod, resolve_auth_path,
};
use crate::VaultError;
use crate::client::VaultClient;
use std::path::Path;

const DEFAULT_APPROLE_PATH: &str = "auth/approle";

/// Role-id / secret-id login
pub struct ApproleAuth {
    pub role_id: String,
    pub secret_id: String,
    pub auth_path: String,
}

impl ApproleAuth {
    pub fn new(role_id: String, secret_id: String, auth_path: &str) -> Self {
        Self {
            role_id,
            secret_id,
            auth_path: resolve_auth_path(auth_path, DEFAULT_APPROLE_PATH),
        }
    }
}

impl LoginMethod for ApproleAuth {
    fn login_path(&self) -> String {
        format!("{}/login", self.auth_path)
    }

    fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "role_id": self.role_id,
            "secret_id": self.secret_id,
        })
    }
}

/// Read a single-value credential file, dropping one trailing newline
pub(crate) async fn read_credential_file(path: &Path) -> Result<String, VaultError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| VaultError::CredentialSourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(content
        .strip_suffix('\n')
        .map(str::to_string)
        .unwrap_or(content))
}

impl VaultClient {
    /// Log in with a role-id and secret-id
    pub async fn approle_login(
        &self,
        role_id: &str,
        secret_id: &str,
        auth_path: &str,
    ) -> Result<String, VaultError> {
        let credentials = ApproleCredentials {
            role_id: role_id.to_string(),
            secret_id: secret_id.to_string(),
            auth_path: resolve_auth_path(auth_path, DEFAULT_APPROLE_PATH),
            ..Default::default()
        };

        let mut cache = self.auth.lock().await;
        self.approle_login_locked(&mut cache, credentials).await
    }

    /// Obtain a token from role-id / secret-id files, reusing `token_file`
    /// when it still holds a healthy token
    pub async fn init_approle(
        &self,
        role_id_file: impl AsRef<Path>,
        secret_id_file: impl AsRef<Path>,
        token_file: impl AsRef<Path>,
        auth_path: &str,
    ) -> Result<String, VaultError> {
        let credentials = ApproleCredentials {
            role_id_file: Some(role_id_file.as_ref().to_path_buf()),
            secret_id_file: Some(secret_id_file.as_ref().to_path_buf()),
            token_file: Some(token_file.as_ref().to_path_buf()),
            auth_path: resolve_auth_path(auth_path, DEFAULT_APPROLE_PATH),
            ..Default::default()
        };

        let mut cache = self.auth.lock().await;
        self.init_approle_locked(&mut cache, credentials).await
    }

    pub(crate) async fn approle_login_locked(
        &self,
        cache: &mut AuthCache,
        credentials: ApproleCredentials,
    ) -> Result<String, VaultError> {
        let login = ApproleAuth::new(
            credentials.role_id.clone(),
            credentials.secret_id.clone(),
            &credentials.auth_path,
        );
        let token_info = self
            .run_login(cache, Credentials::Approle(credentials), &login)
            .await?;
        Ok(token_info.token)
    }

    pub(crate) async fn init_approle_locked(
        &self,
        cache: &mut AuthCache,
        mut credentials: ApproleCredentials,
    ) -> Result<String, VaultError> {
        let (Some(role_id_file), Some(secret_id_file)) = (
            credentials.role_id_file.clone(),
            credentials.secret_id_file.clone(),
        ) else {
            return self.approle_login_locked(cache, credentials).await;
        };

        cache.begin_login(Credentials::Approle(credentials.clone()));

        credentials.role_id = read_credential_file(&role_id_file).await?;
        credentials.secret_id = read_credential_file(&secret_id_file).await?;
        let token_file = credentials.token_file.clone();

        if let Some(ref path) = token_file {
            if let Some(token) = self.cached_token(path).await {
                cache.begin_login(Credentials::Approle(credentials));
                cache.record_success(AuthMethod::Approle);
                self.connection.set_token(token.clone()).await;
                tracing::debug!(path = %path.display(), "Reusing cached Vault token");
                return Ok(token);
            }
        }

        let token = self.approle_login_locked(cache, credentials).await?;

        if let Some(path) = token_file {
            self.persist_token(&path, &token).await?;
        }

        Ok(token)
    }

    /// Token from the cache file, if present and not close to expiry
    async fn cached_token(&self, path: &Path) -> Option<String> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        let token = content.strip_suffix('\n').unwrap_or(&content);
        if token.is_empty() {
            return None;
        }

        if self.token_needs_refresh_for(token).await {
            tracing::debug!(path = %path.display(), "Cached Vault token is stale");
            return None;
        }

        Some(token.to_string())
    }

    async fn persist_token(&self, path: &Path, token: &str) -> Result<(), VaultError> {
        let result = tokio::fs::write(path, token).await;
        match (result, self.config.token_cache_policy) {
            (Ok(()), _) => Ok(()),
            (Err(source), TokenCachePolicy::Strict) => Err(VaultError::TokenCacheWriteFailed {
                path: path.to_path_buf(),
                source,
            }),
            (Err(e), TokenCachePolicy::BestEffort) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to cache Vault token");
                Ok(())
            }
        }
    }
}
