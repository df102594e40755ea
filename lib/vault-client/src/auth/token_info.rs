use crate::VaultError;
use crate::models::{Secret, SecretAuth};
use std::time::Duration;

/// Token obtained from a login flow
#[derive(Clone)]
pub struct TokenInfo {
    pub token: String,
    pub lease_duration: Duration,
    pub renewable: bool,
}

impl TokenInfo {
    pub fn new(token: String, lease_duration: Duration, renewable: bool) -> Self {
        Self {
            token,
            lease_duration,
            renewable,
        }
    }

    pub fn from_auth(auth: SecretAuth) -> Self {
        Self::new(
            auth.client_token,
            Duration::from_secs(auth.lease_duration),
            auth.renewable,
        )
    }
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("token", &"<redacted>")
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}

/// Result of `auth/token/lookup-self`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLookup {
    /// Remaining time to live in seconds
    pub ttl: i64,
    pub renewable: bool,
}

impl TokenLookup {
    pub fn from_secret(secret: &Secret) -> Result<Self, VaultError> {
        let data = secret
            .data
            .as_ref()
            .ok_or_else(|| VaultError::InvalidResponse("token lookup without data".to_string()))?;

        let ttl = data
            .get("ttl")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| VaultError::InvalidResponse("token lookup without ttl".to_string()))?;

        let renewable = data
            .get("renewable")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(Self { ttl, renewable })
    }

    /// True iff the remaining TTL is strictly below `min_ttl`
    pub fn needs_refresh(&self, min_ttl: Duration) -> bool {
        self.ttl < min_ttl.as_secs() as i64
    }
}
