use super::AuthMethod;
use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Approle parameters, either given directly or sourced from files
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApproleCredentials {
    pub role_id: String,
    pub secret_id: String,
    pub role_id_file: Option<PathBuf>,
    pub secret_id_file: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub auth_path: String,
}

impl ApproleCredentials {
    /// Re-authentication should re-read files instead of replaying ids
    pub fn is_file_backed(&self) -> bool {
        self.role_id_file.is_some() && self.secret_id_file.is_some()
    }
}

impl fmt::Debug for ApproleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApproleCredentials")
            .field("role_id", &self.role_id)
            .field("secret_id", &"<redacted>")
            .field("role_id_file", &self.role_id_file)
            .field("secret_id_file", &self.secret_id_file)
            .field("token_file", &self.token_file)
            .field("auth_path", &self.auth_path)
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct KubernetesCredentials {
    pub jwt: String,
    pub jwt_file: Option<PathBuf>,
    pub role: String,
    pub auth_path: String,
}

impl fmt::Debug for KubernetesCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubernetesCredentials")
            .field("jwt", &"<redacted>")
            .field("jwt_file", &self.jwt_file)
            .field("role", &self.role)
            .field("auth_path", &self.auth_path)
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct LdapCredentials {
    pub username: String,
    pub password: String,
    pub auth_path: String,
}

impl fmt::Debug for LdapCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_path", &self.auth_path)
            .finish()
    }
}

/// Parameters of one login attempt, tagged by method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Approle(ApproleCredentials),
    Kubernetes(KubernetesCredentials),
    Ldap(LdapCredentials),
    Token,
}

impl Credentials {
    pub fn method(&self) -> AuthMethod {
        match self {
            Credentials::Approle(_) => AuthMethod::Approle,
            Credentials::Kubernetes(_) => AuthMethod::Kubernetes,
            Credentials::Ldap(_) => AuthMethod::Ldap,
            Credentials::Token => AuthMethod::Token,
        }
    }
}

/// Last known parameters for every method
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    pub approle: ApproleCredentials,
    pub kubernetes: KubernetesCredentials,
    pub ldap: LdapCredentials,
}

/// Which method was used last, when, and with what parameters.
///
/// Only the most recently used method is ever replayed; parameters of the
/// other methods are kept so switching back does not lose them.
#[derive(Debug, Default)]
pub struct AuthCache {
    method: AuthMethod,
    last_attempt: i64,
    last_success: Option<i64>,
    credentials: CredentialStore,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    /// Unix seconds of the last login attempt or recovery check
    pub fn last_attempt(&self) -> i64 {
        self.last_attempt
    }

    pub fn last_success(&self) -> Option<i64> {
        self.last_success
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Time since the last stamp, saturating at zero if the clock went back
    pub fn since_last_attempt(&self) -> Duration {
        let elapsed = now_unix().saturating_sub(self.last_attempt).max(0);
        Duration::from_secs(elapsed as u64)
    }

    /// Stamp the current time. Never moves the stamp backwards.
    pub fn record_attempt(&mut self) -> i64 {
        self.last_attempt = self.last_attempt.max(now_unix());
        self.last_attempt
    }

    /// Mark `credentials` as the active method and keep its parameters
    pub fn begin_login(&mut self, credentials: Credentials) {
        self.method = credentials.method();
        match credentials {
            Credentials::Approle(c) => self.credentials.approle = c,
            Credentials::Kubernetes(c) => self.credentials.kubernetes = c,
            Credentials::Ldap(c) => self.credentials.ldap = c,
            Credentials::Token => {}
        }
        self.record_attempt();
    }

    pub fn record_success(&mut self, method: AuthMethod) {
        self.method = method;
        self.last_success = Some(self.record_attempt());
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, secs: i64) {
        self.last_attempt = now_unix() - secs;
    }
}

fn now_unix() -> i64 {
    Utc::now().timestamp()
}
