use crate::client::VaultClient;
use crate::error::VaultError;
use serde_json::{Map, Value};

const SYS_AUTH_PATH: &str = "sys/auth";

impl VaultClient {
    /// Type of the auth backend mounted at `path` (e.g. `ldap`)
    pub async fn auth_type(&self, path: &str) -> Result<String, VaultError> {
        let mount = normalize_mount(path);
        let mounts = self.auth_mounts().await?;

        let config = mounts
            .get(&mount)
            .ok_or_else(|| VaultError::MountNotFound {
                mount: mount.clone(),
            })?;

        mount_type(config)
            .map(str::to_string)
            .ok_or_else(|| VaultError::InvalidResponse("failed to work with data from sys/auth".to_string()))
    }

    /// Auth mounts of `auth_type` whose name starts with `prefix`, sorted
    pub async fn auth_mounts_by_type(
        &self,
        auth_type: &str,
        prefix: &str,
    ) -> Result<Vec<String>, VaultError> {
        let mounts = self.auth_mounts().await?;

        let mut matching = Vec::new();
        for (mount, config) in &mounts {
            let kind = mount_type(config).ok_or_else(|| {
                VaultError::InvalidResponse("failed to work with data from sys/auth".to_string())
            })?;
            if mount.starts_with(prefix) && kind == auth_type {
                matching.push(mount.clone());
            }
        }

        matching.sort();
        Ok(matching)
    }

    async fn auth_mounts(&self) -> Result<Map<String, Value>, VaultError> {
        Ok(self.read(SYS_AUTH_PATH).await?.data_or_empty())
    }
}

/// `auth/ldap` -> `ldap/`, matching how sys/auth keys its mounts
fn normalize_mount(path: &str) -> String {
    let path = path.strip_prefix("auth/").unwrap_or(path);
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

fn mount_type(config: &Value) -> Option<&str> {
    config.as_object()?.get("type")?.as_str()
}
