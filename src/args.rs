//! Command line arguments of `vault-session`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vault_client::auth::DEFAULT_JWT_PATH;

/// Run a single Vault operation with a session that re-authenticates once
/// when its token has expired.
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None, version)]
pub struct ProgramArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Seconds between re-authentication attempts
    #[clap(env, long, default_value_t = 5)]
    pub vault_reauth_cooldown: u64,

    /// Tokens with a TTL below this many seconds are treated as expired
    #[clap(env, long, default_value_t = 5)]
    pub vault_min_token_ttl: u64,

    /// Keep the fresh token even when the approle token file cannot be written
    #[clap(env, long)]
    pub vault_token_cache_best_effort: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Login options. The first complete group wins, in declaration order.
#[derive(Args, Debug, Default)]
pub struct AuthArgs {
    /// Vault server URL
    #[clap(env, long)]
    pub vault_addr: Option<String>,

    /// Vault namespace sent as `X-Vault-Namespace`
    #[clap(env, long)]
    pub vault_namespace: Option<String>,

    /// Static token
    #[clap(env, long, hide_env_values = true)]
    pub vault_token: Option<String>,

    /// File holding the approle role-id
    #[clap(env, long)]
    pub vault_role_id_file: Option<PathBuf>,

    /// File holding the approle secret-id
    #[clap(env, long)]
    pub vault_secret_id_file: Option<PathBuf>,

    /// File used to cache the approle token between runs
    #[clap(env, long)]
    pub vault_token_file: Option<PathBuf>,

    #[clap(env, long)]
    pub vault_role_id: Option<String>,

    #[clap(env, long, hide_env_values = true)]
    pub vault_secret_id: Option<String>,

    /// Mount of the approle backend, `auth/approle` when empty
    #[clap(env, long, default_value = "")]
    pub vault_approle_path: String,

    /// Kubernetes role to log in as
    #[clap(env, long)]
    pub vault_k8s_role: Option<String>,

    /// Service account JWT, re-read on every re-authentication
    #[clap(env, long, default_value = DEFAULT_JWT_PATH)]
    pub vault_k8s_jwt_file: PathBuf,

    /// Mount of the kubernetes backend, `auth/kubernetes` when empty
    #[clap(env, long, default_value = "")]
    pub vault_k8s_path: String,

    #[clap(env, long)]
    pub vault_ldap_username: Option<String>,

    #[clap(env, long, hide_env_values = true)]
    pub vault_ldap_password: Option<String>,

    /// Mount of the ldap backend, `auth/ldap` when empty
    #[clap(env, long, default_value = "")]
    pub vault_ldap_path: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a secret and print its data
    Read { path: String },
    /// Write a JSON object to a path
    Write { path: String, json: String },
    Delete { path: String },
    /// List the keys under a path
    List { path: String },
    /// Read a KV secret
    KvGet {
        path: String,
        /// Print only the inner `data` object of a KV v2 secret
        #[clap(long)]
        only_data: bool,
    },
    /// Write a JSON object as a KV v2 secret
    KvPut { path: String, json: String },
    /// Print the remaining TTL of the session token
    Ttl,
    /// Print the backend type of an auth mount
    AuthType { path: String },
}

/// Login flow picked from [`AuthArgs`]
#[derive(Debug, PartialEq)]
pub enum LoginFlow {
    Token,
    ApproleFiles {
        role_id_file: PathBuf,
        secret_id_file: PathBuf,
        token_file: PathBuf,
        auth_path: String,
    },
    Approle {
        role_id: String,
        secret_id: String,
        auth_path: String,
    },
    Kubernetes {
        jwt_file: PathBuf,
        role: String,
        auth_path: String,
    },
    Ldap {
        username: String,
        password: String,
        auth_path: String,
    },
    None,
}

impl AuthArgs {
    pub fn login_flow(&self) -> LoginFlow {
        if self.vault_token.as_deref().is_some_and(|t| !t.is_empty()) {
            return LoginFlow::Token;
        }

        if let (Some(role_id_file), Some(secret_id_file), Some(token_file)) = (
            &self.vault_role_id_file,
            &self.vault_secret_id_file,
            &self.vault_token_file,
        ) {
            return LoginFlow::ApproleFiles {
                role_id_file: role_id_file.clone(),
                secret_id_file: secret_id_file.clone(),
                token_file: token_file.clone(),
                auth_path: self.vault_approle_path.clone(),
            };
        }

        if let (Some(role_id), Some(secret_id)) = (&self.vault_role_id, &self.vault_secret_id) {
            return LoginFlow::Approle {
                role_id: role_id.clone(),
                secret_id: secret_id.clone(),
                auth_path: self.vault_approle_path.clone(),
            };
        }

        if let Some(role) = &self.vault_k8s_role {
            return LoginFlow::Kubernetes {
                jwt_file: self.vault_k8s_jwt_file.clone(),
                role: role.clone(),
                auth_path: self.vault_k8s_path.clone(),
            };
        }

        if let (Some(username), Some(password)) =
            (&self.vault_ldap_username, &self.vault_ldap_password)
        {
            return LoginFlow::Ldap {
                username: username.clone(),
                password: password.clone(),
                auth_path: self.vault_ldap_path.clone(),
            };
        }

        LoginFlow::None
    }
}
