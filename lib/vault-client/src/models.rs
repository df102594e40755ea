use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic Vault response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub auth: Option<SecretAuth>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl Secret {
    /// `data` or an empty map when the response carried none
    pub fn data_or_empty(&self) -> Map<String, Value> {
        self.data.clone().unwrap_or_default()
    }
}

/// Auth payload returned by login endpoints
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretAuth {
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

impl std::fmt::Debug for SecretAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretAuth")
            .field("client_token", &"<redacted>")
            .field("accessor", &self.accessor)
            .field("policies", &self.policies)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}
