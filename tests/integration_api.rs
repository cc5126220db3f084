//! End-to-end tests against the real binary and a real Postgres.
//!
//! Each test provisions a throwaway container, applies the schema, and
//! spawns the `keywarden` binary as a supervised child process, then drives
//! it over HTTP. TOTP code checks are disabled and the recovery lockout
//! window is shortened so time-based paths finish in test time.

mod support;

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::{
    net::TcpListener,
    process::{Child, Command, Stdio},
    time::Duration,
};
use support::Postgres;
use tokio::time::sleep;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));
const RECOVERY_LOCKOUT_SECONDS: u64 = 2;
const PASSWORD: &str = "correct horse battery staple";
const RECOVERY_SECRET: &str = "emerald-window-42";

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

struct TestServer {
    _postgres: Postgres,
    _child: ChildGuard,
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    /// `None` means no container runtime is available and the test should
    /// pass trivially.
    async fn start() -> Result<Option<Self>> {
        if let Err(err) = support::ensure_container_runtime() {
            eprintln!("Skipping integration test: {err}");
            return Ok(None);
        }

        let postgres = Postgres::start().await?;
        postgres.wait_until_ready().await?;
        postgres.apply_schema(SCHEMA_SQL).await?;

        let port = pick_port()?;
        let mut command = Command::new(env!("CARGO_BIN_EXE_keywarden"));
        // Host env must not leak into the child's clap defaults.
        for variable in [
            "KEYWARDEN_PORT",
            "KEYWARDEN_DSN",
            "KEYWARDEN_SKIP_TOTP_CODE",
            "KEYWARDEN_RECOVERY_LOCKOUT_SECONDS",
            "KEYWARDEN_LOG_LEVEL",
        ] {
            command.env_remove(variable);
        }
        let child = ChildGuard(
            command
                .args([
                    "--port",
                    &port.to_string(),
                    "--dsn",
                    &postgres.dsn(),
                    "--skip-totp-code",
                    "--recovery-lockout-seconds",
                    &RECOVERY_LOCKOUT_SECONDS.to_string(),
                    "-vv",
                ])
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .spawn()
                .context("Failed to spawn keywarden binary")?,
        );

        let base = format!("http://127.0.0.1:{port}");
        let client = reqwest::Client::new();
        wait_for_ready(&client, &base).await?;

        Ok(Some(Self {
            _postgres: postgres,
            _child: child,
            base,
            client,
        }))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}{path}", self.base))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))
    }

    async fn post_auth(&self, path: &str, token: &str, body: &Value) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}{path}", self.base))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))
    }

    async fn get_auth(&self, path: &str, token: &str) -> Result<reqwest::Response> {
        self.client
            .get(format!("{}{path}", self.base))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))
    }

    /// Register a user; returns the response body (`uri` + `salt`).
    async fn register(&self, username: &str) -> Result<Value> {
        let response = self
            .post("/register", &json!({"username": username, "password": PASSWORD}))
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        Ok(response.json().await?)
    }

    async fn confirm_2fa(&self, username: &str) -> Result<()> {
        let response = self
            .post("/confirm2fa", &json!({"username": username}))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    async fn set_recovery(&self, username: &str, secret: &str) -> Result<()> {
        let response = self
            .post(
                "/recovery",
                &json!({
                    "username": username,
                    "secret": secret,
                    "password": {"0": 10, "1": 11},
                    "iv": {"0": 12},
                }),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    async fn login(&self, username: &str) -> Result<String> {
        let response = self
            .post("/token", &json!({"username": username, "password": PASSWORD}))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await?;
        Ok(body["accessToken"]
            .as_str()
            .context("missing accessToken")?
            .to_string())
    }

    /// Full enrollment: register, confirm the device, escrow a recovery
    /// secret, and log in. Returns the access token.
    async fn enroll(&self, username: &str) -> Result<String> {
        self.register(username).await?;
        self.confirm_2fa(username).await?;
        self.set_recovery(username, RECOVERY_SECRET).await?;
        self.login(username).await
    }
}

fn pick_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind a local port")?;
    Ok(listener
        .local_addr()
        .context("Failed to read local port")?
        .port())
}

async fn wait_for_ready(client: &reqwest::Client, base: &str) -> Result<()> {
    for _ in 0..40 {
        match client.get(format!("{base}/health")).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            _ => sleep(Duration::from_millis(250)).await,
        }
    }
    bail!("keywarden did not become ready at {base}");
}

fn entry(name: &str) -> Value {
    json!({
        "name": name,
        "username": "alice@example.com",
        "password": {"0": 1, "1": 2},
        "iv": {"0": 9},
    })
}

#[tokio::test]
async fn duplicate_registration_conflicts_and_keeps_the_first_account() -> Result<()> {
    let Some(server) = TestServer::start().await? else {
        return Ok(());
    };

    let body = server.register("bob").await?;
    let salt = body["salt"].as_str().context("missing salt")?.to_string();
    assert_eq!(salt.len(), 32);

    let response = server
        .post("/register", &json!({"username": "bob", "password": "other"}))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The losing insert left nothing behind: the first account still
    // enrolls and logs in with its original password and salt.
    server.confirm_2fa("bob").await?;
    server.set_recovery("bob", RECOVERY_SECRET).await?;
    let token = server.login("bob").await?;

    let response = server.get_auth("/salt", &token).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["salt"].as_str(), Some(salt.as_str()));

    Ok(())
}

#[tokio::test]
async fn incomplete_login_deletes_the_account_and_frees_the_username() -> Result<()> {
    let Some(server) = TestServer::start().await? else {
        return Ok(());
    };

    // No recovery secret: first login destroys the account.
    server.register("dave").await?;
    let response = server
        .post("/token", &json!({"username": "dave", "password": PASSWORD}))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["code"].as_str(), Some("no_recovery"));

    // The username is reclaimable, so the delete committed.
    server.register("dave").await?;

    // Recovery set but device never confirmed: same destructive gate,
    // distinct code.
    server.set_recovery("dave", RECOVERY_SECRET).await?;
    let response = server
        .post("/token", &json!({"username": "dave", "password": PASSWORD}))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["code"].as_str(), Some("no_2fa"));

    server.register("dave").await?;

    Ok(())
}

#[tokio::test]
async fn recovery_lockout_rate_limits_then_releases_after_window() -> Result<()> {
    let Some(server) = TestServer::start().await? else {
        return Ok(());
    };

    server.register("frank").await?;
    server.confirm_2fa("frank").await?;
    server.set_recovery("frank", "first-secret").await?;

    let verify = |secret: &str| {
        json!({
            "username": "frank",
            "secret": secret,
            "verify": true,
        })
    };

    for _ in 0..3 {
        let response = server.post("/recovery", &verify("wrong")).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The counter is full: even the correct secret is refused.
    let response = server.post("/recovery", &verify("wrong")).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let response = server.post("/recovery", &verify("first-secret")).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Storing a fresh secret replaces the escrow but must not clear a
    // live lockout.
    let response = server
        .post(
            "/recovery",
            &json!({
                "username": "frank",
                "secret": "second-secret",
                "password": {"0": 21},
                "iv": {"0": 3},
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = server.post("/recovery", &verify("second-secret")).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Once the window has elapsed the counter resets and the new escrow
    // is released.
    sleep(Duration::from_millis(RECOVERY_LOCKOUT_SECONDS * 1000 + 500)).await;
    let response = server.post("/recovery", &verify("second-secret")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["password"], json!({"0": 21}));
    assert_eq!(body["iv"], json!({"0": 3}));
    assert!(body["salt"].as_str().is_some_and(|salt| salt.len() == 32));

    Ok(())
}

#[tokio::test]
async fn vault_operations_reject_foreign_principals() -> Result<()> {
    let Some(server) = TestServer::start().await? else {
        return Ok(());
    };

    let alice = server.enroll("alice").await?;
    let mallory = server.enroll("mallory").await?;

    let response = server.post_auth("/vault/add", &alice, &entry("gmail")).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    let entry_id = body["id"].as_str().context("missing entry id")?.to_string();

    let edit = json!({
        "id": entry_id,
        "name": "stolen",
        "username": "mallory",
        "password": {"0": 6},
        "iv": {"0": 6},
    });
    let response = server.post_auth("/vault/edit", &mallory, &edit).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .post_auth("/vault/delete", &mallory, &json!({"id": entry_id}))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let file = json!({
        "id": entry_id,
        "name": "notes.txt",
        "file": {"0": 1, "1": 2},
        "iv": {"0": 3},
    });
    let response = server.post_auth("/vault/files/add", &mallory, &file).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The owner attaches the file, and a foreign delete of it bounces too.
    let response = server.post_auth("/vault/files/add", &alice, &file).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = server.get_auth("/vault/retrieve", &alice).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let entries: Value = response.json().await?;
    let files = entries[0]["files"].as_array().context("missing files")?;
    assert_eq!(files.len(), 1);
    let file_id = files[0]["id"].as_str().context("missing file id")?;

    let response = server
        .post_auth("/vault/files/delete", &mallory, &json!({"id": file_id}))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Nothing of mallory's probing stuck.
    let response = server.get_auth("/vault/retrieve", &alice).await?;
    let entries: Value = response.json().await?;
    assert_eq!(entries[0]["name"].as_str(), Some("gmail"));
    assert_eq!(entries[0]["files"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn add_batch_persists_survivors_around_a_conflict() -> Result<()> {
    let Some(server) = TestServer::start().await? else {
        return Ok(());
    };

    let eve = server.enroll("eve").await?;

    let response = server.post_auth("/vault/add", &eve, &entry("dup")).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let batch = json!({"entries": [entry("one"), entry("dup"), entry("three")]});
    let response = server.post_auth("/vault/add-batch", &eve, &batch).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    let errors = body["errors"].as_array().context("missing errors")?;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["key"].as_str(), Some("dup"));
    assert_eq!(errors[0]["code"].as_str(), Some("conflict"));

    // Items before and after the conflicting one were persisted.
    let response = server.get_auth("/vault/retrieve", &eve).await?;
    let entries: Value = response.json().await?;
    let mut names: Vec<&str> = entries
        .as_array()
        .context("expected an array")?
        .iter()
        .filter_map(|item| item["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["dup", "one", "three"]);

    Ok(())
}
