use super::approle::read_credential_file;
use super::{AuthCache, Credentials, KubernetesCredentials, LoginMethod, resolve_auth_path};
use crate::VaultError;
use crate::client::VaultClient;
use std::path::Path;

pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const DEFAULT_KUBERNETES_PATH: &str = "auth/kubernetes";

/// Service account (JWT) login
pub struct KubernetesAuth {
    pub jwt: String,
    pub role: String,
    pub auth_path: String,
}

impl KubernetesAuth {
    pub fn new(jwt: String, role: String, auth_path: &str) -> Self {
        Self {
            jwt,
            role,
            auth_path: resolve_auth_path(auth_path, DEFAULT_KUBERNETES_PATH),
        }
    }
}

impl LoginMethod for KubernetesAuth {
    fn login_path(&self) -> String {
        format!("{}/login", self.auth_path)
    }

    fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "jwt": self.jwt,
            "role": self.role,
        })
    }
}

impl VaultClient {
    /// Log in with a service account JWT.
    ///
    /// `auth_path` is the mount (`auth/kubernetes` when empty); `/login` is
    /// appended to it.
    pub async fn kubernetes_login(
        &self,
        jwt: &str,
        role: &str,
        auth_path: &str,
    ) -> Result<String, VaultError> {
        let credentials = KubernetesCredentials {
            jwt: jwt.to_string(),
            jwt_file: None,
            role: role.to_string(),
            auth_path: resolve_auth_path(auth_path, DEFAULT_KUBERNETES_PATH),
        };

        let mut cache = self.auth.lock().await;
        self.kubernetes_login_locked(&mut cache, credentials).await
    }

    /// Log in with the JWT stored in `jwt_file`. The file is re-read on every
    /// re-authentication so rotated service account tokens are picked up.
    pub async fn init_kubernetes(
        &self,
        jwt_file: impl AsRef<Path>,
        role: &str,
        auth_path: &str,
    ) -> Result<String, VaultError> {
        let credentials = KubernetesCredentials {
            jwt: String::new(),
            jwt_file: Some(jwt_file.as_ref().to_path_buf()),
            role: role.to_string(),
            auth_path: resolve_auth_path(auth_path, DEFAULT_KUBERNETES_PATH),
        };

        let mut cache = self.auth.lock().await;
        self.kubernetes_login_locked(&mut cache, credentials).await
    }

    pub(crate) async fn kubernetes_login_locked(
        &self,
        cache: &mut AuthCache,
        mut credentials: KubernetesCredentials,
    ) -> Result<String, VaultError> {
        if let Some(ref path) = credentials.jwt_file {
            cache.begin_login(Credentials::Kubernetes(credentials.clone()));
            credentials.jwt = read_credential_file(path).await?;
        }

        let login = KubernetesAuth::new(
            credentials.jwt.clone(),
            credentials.role.clone(),
            &credentials.auth_path,
        );
        let token_info = self
            .run_login(cache, Credentials::Kubernetes(credentials), &login)
            .await?;
        Ok(token_info.token)
    }
}
