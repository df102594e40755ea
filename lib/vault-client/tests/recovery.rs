// lib/vault-client/tests/recovery.rs

use std::time::Duration;
use tempfile::TempDir;
use vault_client::auth::TokenCachePolicy;
use vault_client::{AuthMethod, VaultClient, VaultError};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_response(token: &str) -> serde_json::Value {
    serde_json::json!({
        "request_id": "login",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "auth": {
            "client_token": token,
            "accessor": "accessor",
            "policies": ["default"],
            "lease_duration": 3600,
            "renewable": true
        }
    })
}

fn lookup_response(ttl: i64) -> serde_json::Value {
    serde_json::json!({ "data": { "ttl": ttl, "renewable": true, "policies": ["default"] } })
}

fn kv2_response(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "request_id": "read",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": {
            "data": data,
            "metadata": { "version": 1, "destroyed": false }
        },
        "auth": null
    })
}

fn permission_denied() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(serde_json::json!({"errors": ["permission denied"]}))
}

/// Client whose cooldown never blocks, so every failure may trigger recovery
fn eager_client(server: &MockServer) -> VaultClient {
    VaultClient::builder()
        .base_url(server.uri())
        .reauth_cooldown(Duration::ZERO)
        .build()
        .unwrap()
}

async fn mount_lookup(server: &MockServer, token: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", token))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_approle_files_login_and_token_file_rotation() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let role_id_file = dir.path().join("role-id");
    let secret_id_file = dir.path().join("secret-id");
    let token_file = dir.path().join("token");
    std::fs::write(&role_id_file, "role-id\n").unwrap();
    std::fs::write(&secret_id_file, "secret-id\n").unwrap();

    let login_body = serde_json::json!({"role_id": "role-id", "secret_id": "secret-id"});
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(body_json(&login_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-1")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(body_json(&login_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-2")))
        .expect(1)
        .mount(&server)
        .await;

    mount_lookup(&server, "t-1", permission_denied()).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv2_response(
            serde_json::json!({"password": "secret123"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = eager_client(&server);
    let token = client
        .init_approle(&role_id_file, &secret_id_file, &token_file, "")
        .await
        .unwrap();

    assert_eq!(token, "t-1");
    assert_eq!(client.auth_method().await, AuthMethod::Approle);
    let now = chrono::Utc::now().timestamp();
    assert!((now - client.last_auth_attempt().await).abs() <= 2);
    assert_eq!(std::fs::read_to_string(&token_file).unwrap(), "t-1");

    let data = client.get_kv("secret/data/app", true).await.unwrap();

    assert_eq!(data.get("password").unwrap(), "secret123");
    assert_eq!(client.current_token().await, "t-2");
    assert_eq!(std::fs::read_to_string(&token_file).unwrap(), "t-2");
}

#[tokio::test]
async fn test_approle_healthy_cached_token_skips_login() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let role_id_file = dir.path().join("role-id");
    let secret_id_file = dir.path().join("secret-id");
    let token_file = dir.path().join("token");
    std::fs::write(&role_id_file, "role-id\n").unwrap();
    std::fs::write(&secret_id_file, "secret-id\n").unwrap();
    std::fs::write(&token_file, "t-cached\n").unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-new")))
        .expect(0)
        .mount(&server)
        .await;
    mount_lookup(
        &server,
        "t-cached",
        ResponseTemplate::new(200).set_body_json(lookup_response(3600)),
    )
    .await;

    let client = eager_client(&server);
    let token = client
        .init_approle(&role_id_file, &secret_id_file, &token_file, "")
        .await
        .unwrap();

    assert_eq!(token, "t-cached");
    assert_eq!(client.current_token().await, "t-cached");
    assert_eq!(client.auth_method().await, AuthMethod::Approle);
}

#[tokio::test]
async fn test_approle_missing_secret_id_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let role_id_file = dir.path().join("role-id");
    std::fs::write(&role_id_file, "role-id\n").unwrap();

    let client = eager_client(&server);
    let result = client
        .init_approle(
            &role_id_file,
            dir.path().join("missing"),
            dir.path().join("token"),
            "",
        )
        .await;

    assert!(matches!(
        result,
        Err(VaultError::CredentialSourceUnavailable { .. })
    ));
    assert_eq!(client.auth_method().await, AuthMethod::Approle);
}

#[tokio::test]
async fn test_token_cache_write_failure_policies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let role_id_file = dir.path().join("role-id");
    let secret_id_file = dir.path().join("secret-id");
    let unwritable = dir.path().join("no-such-dir").join("token");
    std::fs::write(&role_id_file, "role-id").unwrap();
    std::fs::write(&secret_id_file, "secret-id").unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-1")))
        .expect(2)
        .mount(&server)
        .await;

    let strict = eager_client(&server);
    let result = strict
        .init_approle(&role_id_file, &secret_id_file, &unwritable, "")
        .await;
    assert!(matches!(result, Err(VaultError::TokenCacheWriteFailed { .. })));
    // The session itself is authenticated
    assert_eq!(strict.current_token().await, "t-1");
    assert_eq!(strict.auth_method().await, AuthMethod::Approle);

    let lenient = VaultClient::builder()
        .base_url(server.uri())
        .token_cache_policy(TokenCachePolicy::BestEffort)
        .build()
        .unwrap();
    let token = lenient
        .init_approle(&role_id_file, &secret_id_file, &unwritable, "")
        .await
        .unwrap();
    assert_eq!(token, "t-1");
}

#[tokio::test]
async fn test_single_reauth_and_single_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-1")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-2")))
        .expect(1)
        .mount(&server)
        .await;
    mount_lookup(&server, "t-1", permission_denied()).await;
    mount_lookup(&server, "t-2", permission_denied()).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .respond_with(permission_denied())
        .expect(2)
        .mount(&server)
        .await;

    let client = eager_client(&server);
    client.ldap_login("alice", "pw", "").await.unwrap();

    let result = client.read("secret/data/app").await;

    assert!(matches!(result, Err(VaultError::ClientError { status: 403, .. })));
    assert_eq!(client.current_token().await, "t-2");
}

#[tokio::test]
async fn test_healthy_token_surfaces_original_error() {
    let server = MockServer::start().await;

    mount_lookup(
        &server,
        "t-1",
        ResponseTemplate::new(200).set_body_json(lookup_response(3600)),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v1/secret/data/app"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"errors": ["internal error"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = eager_client(&server);
    client.set_token("t-1").await;

    let result = client
        .write("secret/data/app", &serde_json::json!({"data": {"k": "v"}}))
        .await;

    match result {
        Err(VaultError::ClientError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal error");
        }
        other => panic!("expected original error, got {:?}", other),
    }
    assert_eq!(client.current_token().await, "t-1");
}

#[tokio::test]
async fn test_failure_inside_cooldown_skips_recovery() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(permission_denied())
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/secret/data/app"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;

    let client = VaultClient::builder()
        .base_url(server.uri())
        .build()
        .unwrap();
    client.ldap_login("alice", "pw", "").await.unwrap();

    let result = client.delete("secret/data/app").await;
    assert!(matches!(result, Err(VaultError::ClientError { status: 403, .. })));
}

#[tokio::test]
async fn test_ldap_default_login_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .and(body_json(serde_json::json!({"password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-ldap")))
        .expect(1)
        .mount(&server)
        .await;

    let client = eager_client(&server);
    let token = client.ldap_login("alice", "pw", "").await.unwrap();

    assert_eq!(token, "t-ldap");
    assert_eq!(client.current_token().await, "t-ldap");
    assert_eq!(client.auth_method().await, AuthMethod::Ldap);
}

#[tokio::test]
async fn test_login_without_auth_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
        .mount(&server)
        .await;

    let client = eager_client(&server);
    client.set_token("t-0").await;
    let result = client.kubernetes_login("jwt", "app", "").await;

    match result {
        Err(VaultError::LoginFailed(inner)) => assert!(matches!(*inner, VaultError::NoAuthInfo)),
        other => panic!("expected LoginFailed, got {:?}", other),
    }
    assert_eq!(client.auth_method().await, AuthMethod::Kubernetes);
    assert_eq!(client.current_token().await, "t-0");
}

#[tokio::test]
async fn test_concurrent_failures_reauthenticate_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-1")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-2")))
        .expect(1)
        .mount(&server)
        .await;
    mount_lookup(&server, "t-1", permission_denied()).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv2_response(
            serde_json::json!({"k": "v"}),
        )))
        .mount(&server)
        .await;

    let client = VaultClient::builder()
        .base_url(server.uri())
        .reauth_cooldown(Duration::from_secs(1))
        .build()
        .unwrap();
    client.ldap_login("alice", "pw", "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (a, b) = tokio::join!(
        client.read("secret/data/app"),
        client.read("secret/data/app")
    );

    assert!(a.is_ok() || b.is_ok());
    assert_eq!(client.current_token().await, "t-2");
}

/// LDAP session that starts on `t-1`, which the backend reports expired, and
/// re-authenticates exactly once to `t-2`
async fn expiring_ldap_session(server: &MockServer) -> VaultClient {
    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-1")))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("t-2")))
        .expect(1)
        .mount(server)
        .await;
    mount_lookup(server, "t-1", permission_denied()).await;

    let client = eager_client(server);
    client.ldap_login("alice", "pw", "").await.unwrap();
    client
}

#[tokio::test]
async fn test_write_retried_after_reauth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/kv/x"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/kv/x"))
        .and(header("X-Vault-Token", "t-2"))
        .and(body_json(serde_json::json!({"foo": "bar"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = expiring_ldap_session(&server).await;
    let result = client
        .write("kv/x", &serde_json::json!({"foo": "bar"}))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(client.current_token().await, "t-2");
}

#[tokio::test]
async fn test_list_retried_after_reauth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/secret/metadata/apps"))
        .and(query_param("list", "true"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/metadata/apps"))
        .and(query_param("list", "true"))
        .and(header("X-Vault-Token", "t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "keys": ["billing"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = expiring_ldap_session(&server).await;
    let keys = client.list("secret/metadata/apps").await.unwrap();

    assert_eq!(keys, vec!["billing".to_string()]);
}

#[tokio::test]
async fn test_delete_retried_after_reauth() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = expiring_ldap_session(&server).await;
    client.delete("secret/data/app").await.unwrap();

    assert_eq!(client.current_token().await, "t-2");
}

#[tokio::test]
async fn test_put_kv2_retried_after_reauth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t-2"))
        .and(body_json(serde_json::json!({"data": {"password": "s3cret"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "version": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = expiring_ldap_session(&server).await;
    let mut data = serde_json::Map::new();
    data.insert("password".to_string(), serde_json::json!("s3cret"));

    let secret = client.put_kv2("secret/data/app", data).await.unwrap().unwrap();
    assert_eq!(secret.data.unwrap().get("version").unwrap(), 2);
}

#[tokio::test]
async fn test_auth_type_retried_after_reauth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sys/auth"))
        .and(header("X-Vault-Token", "t-1"))
        .respond_with(permission_denied())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/auth"))
        .and(header("X-Vault-Token", "t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "ldap/": { "type": "ldap" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = expiring_ldap_session(&server).await;

    assert_eq!(client.auth_type("auth/ldap").await.unwrap(), "ldap");
}
