use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault not detected: VAULT_ADDR not set")]
    VaultNotDetected,

    #[error("Secret not found: {path}")]
    SecretNotFound { path: String },

    #[error("Auth mount not found: {mount}")]
    MountNotFound { mount: String },

    #[error("Vault client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Vault request error: {0}")]
    RequestError(String),

    #[error("Invalid response from Vault: {0}")]
    InvalidResponse(String),

    #[error("Login was attempted {elapsed:?} ago (cooldown {window:?}), not retrying")]
    CooldownActive { elapsed: Duration, window: Duration },

    #[error("Vault token does not need refreshing, failure is not auth related")]
    NotAuthRelated,

    #[error("Unknown previous auth method or no authentication performed")]
    UnknownAuthMethod,

    #[error("Login failed: {0}")]
    LoginFailed(#[source] Box<VaultError>),

    #[error("No auth info returned")]
    NoAuthInfo,

    #[error("Unable to read credential from {path}: {source}")]
    CredentialSourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write vault token file {path}: {source}")]
    TokenCacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn login_failed(err: VaultError) -> Self {
        match err {
            already @ VaultError::LoginFailed(_) => already,
            other => VaultError::LoginFailed(Box::new(other)),
        }
    }

    /// Re-authentication was attempted and broke, as opposed to being
    /// skipped by the cooldown or health check
    pub fn is_recovery_failure(&self) -> bool {
        matches!(
            self,
            VaultError::LoginFailed(_)
                | VaultError::CredentialSourceUnavailable { .. }
                | VaultError::TokenCacheWriteFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failed_does_not_nest() {
        let err = VaultError::login_failed(VaultError::login_failed(VaultError::NoAuthInfo));
        match err {
            VaultError::LoginFailed(inner) => assert!(matches!(*inner, VaultError::NoAuthInfo)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cooldown_message_mentions_window() {
        let err = VaultError::CooldownActive {
            elapsed: Duration::from_secs(2),
            window: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("not retrying"));
    }

    #[test]
    fn test_recovery_failure_classification() {
        assert!(VaultError::login_failed(VaultError::NoAuthInfo).is_recovery_failure());
        assert!(
            VaultError::CredentialSourceUnavailable {
                path: PathBuf::from("/etc/vault/secret-id"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .is_recovery_failure()
        );
        assert!(!VaultError::NotAuthRelated.is_recovery_failure());
        assert!(!VaultError::UnknownAuthMethod.is_recovery_failure());
        assert!(
            !VaultError::CooldownActive {
                elapsed: Duration::ZERO,
                window: Duration::from_secs(5),
            }
            .is_recovery_failure()
        );
    }

    #[test]
    fn test_mount_not_found_message() {
        let err = VaultError::MountNotFound {
            mount: "ldap/".to_string(),
        };
        assert_eq!(err.to_string(), "Auth mount not found: ldap/");
    }
}
