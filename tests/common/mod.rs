#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use devcamper_api::auth::hash_password;
use devcamper_api::config::AppConfig;
use devcamper_api::database::{DataAccessor, MemoryStore};
use devcamper_api::{app, models, AppState};

/// A router bound to its own port and backed by a fresh in-memory store.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: Client,
    /// Direct handle on the backing store, for setting up state no route exposes.
    pub store: MemoryStore,
}

impl TestServer {
    async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let store = MemoryStore::with_collections(&models::ALL);
        let router = app(AppState::new(Arc::new(store.clone()), AppConfig::for_tests()));
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { port, base_url, client: Client::new(), store })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Absolute URL for a path under `/api/v1`.
    pub fn api(&self, path: &str) -> String {
        self.url(&format!("/api/v1{}", path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.api(path))
    }

    pub fn post(&self, path: &str, token: Option<&str>, body: Value) -> RequestBuilder {
        with_token(self.client.post(self.api(path)), token).json(&body)
    }

    pub fn put(&self, path: &str, token: Option<&str>, body: Value) -> RequestBuilder {
        with_token(self.client.put(self.api(path)), token).json(&body)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.delete(self.api(path)), token)
    }

    /// Registers a user and returns its token.
    pub async fn register(&self, name: &str, email: &str, role: &str) -> Result<String> {
        let res = self
            .post(
                "/auth/register",
                None,
                json!({"name": name, "email": email, "password": "123456", "role": role}),
            )
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());
        let body = res.json::<Value>().await?;
        body["token"].as_str().map(str::to_string).context("register returned no token")
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let res = self.post("/auth/login", None, json!({"email": email, "password": password})).send().await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body = res.json::<Value>().await?;
        body["token"].as_str().map(str::to_string).context("login returned no token")
    }

    /// Admins cannot self-register, so the record goes straight into the store.
    pub async fn admin_token(&self) -> Result<String> {
        let password = hash_password("123456", &AppConfig::for_tests().security)?;
        let admin = json!({"name": "Admin", "email": "admin@gmail.com", "role": "admin", "password": password});
        self.store
            .insert(models::USERS.name, admin.as_object().cloned().context("admin record")?)
            .await?;
        self.login("admin@gmail.com", "123456").await
    }

    /// Creates a bootcamp as the given user and returns its id.
    pub async fn create_bootcamp(&self, token: &str, body: Value) -> Result<String> {
        let res = self.post("/bootcamps", Some(token), body).send().await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "bootcamp create failed: {}", res.status());
        let body = res.json::<Value>().await?;
        body["data"]["_id"].as_str().map(str::to_string).context("bootcamp without id")
    }
}

fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

pub async fn spawn_server() -> Result<TestServer> {
    let server = TestServer::spawn().await?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Minimal valid bootcamp body.
pub fn bootcamp(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} teaches web development", name),
        "address": "233 Bay State Rd Boston MA 02215",
        "careers": ["Web Development", "UI/UX"],
    })
}
