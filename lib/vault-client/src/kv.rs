use crate::client::VaultClient;
use crate::error::VaultError;
use crate::models::Secret;
use serde_json::{Map, Value};

impl VaultClient {
    /// Read a KV secret (v1 or v2).
    ///
    /// With `only_data` the inner `data` object of a KV v2 response is
    /// returned instead of the whole `data` envelope.
    pub async fn get_kv(
        &self,
        path: &str,
        only_data: bool,
    ) -> Result<Map<String, Value>, VaultError> {
        let secret = self.read(path).await?;
        let data = secret.data_or_empty();

        if !only_data {
            return Ok(data);
        }

        match data.get("data") {
            Some(Value::Object(inner)) => Ok(inner.clone()),
            _ => Err(VaultError::InvalidResponse(format!(
                "unable to read requested secret at {}",
                path
            ))),
        }
    }

    /// Write a KV v2 secret, wrapping `data` in the `{"data": ...}` envelope
    pub async fn put_kv2(
        &self,
        path: &str,
        data: Map<String, Value>,
    ) -> Result<Option<Secret>, VaultError> {
        let body = serde_json::json!({ "data": data });
        self.write(path, &body).await
    }
}

/// Turn a KV v2 `.../data/...` path into its `.../metadata/...` form
pub fn kv2_metadata_path(path: &str) -> String {
    if path.contains("/metadata/") {
        path.to_string()
    } else {
        path.replacen("/data/", "/metadata/", 1)
    }
}
