use super::{AuthCache, Credentials, LdapCredentials, LoginMethod, resolve_auth_path};
use crate::VaultError;
use crate::client::VaultClient;

const DEFAULT_LDAP_PATH: &str = "auth/ldap";

/// Directory bind login, posted to `<mount>/login/<username>`
pub struct LdapAuth {
    pub username: String,
    pub password: String,
    pub auth_path: String,
}

impl LdapAuth {
    pub fn new(username: String, password: String, auth_path: &str) -> Self {
        Self {
            username,
            password,
            auth_path: resolve_auth_path(auth_path, DEFAULT_LDAP_PATH),
        }
    }
}

impl LoginMethod for LdapAuth {
    fn login_path(&self) -> String {
        format!("{}/login/{}", self.auth_path, self.username)
    }

    fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "password": self.password })
    }
}

impl VaultClient {
    pub async fn ldap_login(
        &self,
        username: &str,
        password: &str,
        auth_path: &str,
    ) -> Result<String, VaultError> {
        let credentials = LdapCredentials {
            username: username.to_string(),
            password: password.to_string(),
            auth_path: resolve_auth_path(auth_path, DEFAULT_LDAP_PATH),
        };

        let mut cache = self.auth.lock().await;
        self.ldap_login_locked(&mut cache, credentials).await
    }

    pub(crate) async fn ldap_login_locked(
        &self,
        cache: &mut AuthCache,
        credentials: LdapCredentials,
    ) -> Result<String, VaultError> {
        let login = LdapAuth::new(
            credentials.username.clone(),
            credentials.password.clone(),
            &credentials.auth_path,
        );
        let token_info = self
            .run_login(cache, Credentials::Ldap(credentials), &login)
            .await?;
        Ok(token_info.token)
    }
}
