use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::{Map, Value};
use vault_client::auth::TokenCachePolicy;
use vault_client::{VaultClient, VaultClientBuilder};

mod args;
mod logging;

use args::{Command, LoginFlow, ProgramArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ProgramArgs::parse();
    let _guard = logging::init_logger()?;

    let client = connect(&args).await?;
    let output = run(&client, args.command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn connect(args: &ProgramArgs) -> anyhow::Result<VaultClient> {
    let auth = &args.auth;
    let policy = if args.vault_token_cache_best_effort {
        TokenCachePolicy::BestEffort
    } else {
        TokenCachePolicy::Strict
    };

    let mut builder = VaultClientBuilder::new()
        .reauth_cooldown(Duration::from_secs(args.vault_reauth_cooldown))
        .min_token_ttl(Duration::from_secs(args.vault_min_token_ttl))
        .token_cache_policy(policy);
    if let Some(addr) = &auth.vault_addr {
        builder = builder.base_url(addr);
    }
    if let Some(namespace) = &auth.vault_namespace {
        builder = builder.namespace(namespace);
    }

    let flow = auth.login_flow();
    if flow == LoginFlow::Token {
        if let Some(token) = &auth.vault_token {
            builder = builder.token(token);
        }
    }

    let client = builder.build().context("unable to configure vault client")?;

    match flow {
        LoginFlow::Token | LoginFlow::None => {}
        LoginFlow::ApproleFiles {
            role_id_file,
            secret_id_file,
            token_file,
            auth_path,
        } => {
            client
                .init_approle(&role_id_file, &secret_id_file, &token_file, &auth_path)
                .await
                .context("approle login failed")?;
        }
        LoginFlow::Approle {
            role_id,
            secret_id,
            auth_path,
        } => {
            client
                .approle_login(&role_id, &secret_id, &auth_path)
                .await
                .context("approle login failed")?;
        }
        LoginFlow::Kubernetes {
            jwt_file,
            role,
            auth_path,
        } => {
            client
                .init_kubernetes(&jwt_file, &role, &auth_path)
                .await
                .context("kubernetes login failed")?;
        }
        LoginFlow::Ldap {
            username,
            password,
            auth_path,
        } => {
            client
                .ldap_login(&username, &password, &auth_path)
                .await
                .context("ldap login failed")?;
        }
    }

    tracing::debug!(method = %client.auth_method().await, "vault session ready");
    Ok(client)
}

async fn run(client: &VaultClient, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Read { path } => Value::Object(client.read(&path).await?.data_or_empty()),
        Command::Write { path, json } => {
            let body: Value = serde_json::from_str(&json).context("payload is not valid JSON")?;
            let secret = client.write(&path, &body).await?;
            Value::Object(secret.map(|s| s.data_or_empty()).unwrap_or_default())
        }
        Command::Delete { path } => {
            client.delete(&path).await?;
            Value::Null
        }
        Command::List { path } => serde_json::to_value(client.list(&path).await?)?,
        Command::KvGet { path, only_data } => Value::Object(client.get_kv(&path, only_data).await?),
        Command::KvPut { path, json } => {
            let data: Map<String, Value> =
                serde_json::from_str(&json).context("payload is not a JSON object")?;
            let secret = client.put_kv2(&path, data).await?;
            Value::Object(secret.map(|s| s.data_or_empty()).unwrap_or_default())
        }
        Command::Ttl => serde_json::json!({ "ttl": client.token_ttl().await? }),
        Command::AuthType { path } => serde_json::json!({ "type": client.auth_type(&path).await? }),
    };
    Ok(output)
}
