use super::{AuthMethod, Credentials};
use crate::VaultError;
use crate::client::VaultClient;

impl VaultClient {
    /// Use a pre-supplied token. It cannot be refreshed, so recovery for this
    /// method only re-stamps the attempt time and retries optimistically.
    pub async fn set_token(&self, token: &str) {
        let mut cache = self.auth.lock().await;
        cache.begin_login(Credentials::Token);
        cache.record_success(AuthMethod::Token);
        self.connection.set_token(token).await;
    }

    /// Revoke the active session token
    pub async fn revoke_self(&self) -> Result<(), VaultError> {
        self.connection.revoke_self().await
    }
}
